//! Plays a gif file through the decoder and reports what it saw.
//!
//! Basic usage: `cargo run --features std --example gifinfo -- GIF_FILE`
//!
//! More usage and arguments can be listed by running
//! `cargo run --features std --example gifinfo -- --help`

use anigif::{
    BackedFramebuffer, FrameStatus, GifDecoder, IoStream, Pacing, Renderer, StdClock,
};
use clap::{ArgEnum, Parser};
use embedded_graphics::{pixelcolor::Rgb888, prelude::*};
use std::{fs::File, io::BufReader, path::PathBuf};

const MAX_SIZE: usize = 256;

#[derive(Copy, Clone, PartialEq, Eq, ArgEnum)]
enum Output {
    /// One line per frame
    Info,
    /// Frame lines plus the last frame as ascii art
    Ascii,
}

#[derive(Parser)]
struct Args {
    /// Number of passes over the file
    #[clap(long, default_value = "1")]
    cycles: u32,

    /// Hold each frame for its delay
    #[clap(long)]
    realtime: bool,

    #[clap(long, arg_enum, default_value = "info")]
    output: Output,

    /// GIF file
    gif_file: PathBuf,
}

/// Keeps the screen as colors so it can be printed.
struct AsciiScreen {
    width: usize,
    pixels: Vec<Rgb888>,
    clears: usize,
}

impl AsciiScreen {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            pixels: vec![Rgb888::BLACK; width * height],
            clears: 0,
        }
    }

    fn print(&self, size: Size) {
        const RAMP: &[u8] = b" .:-=+*#%@";
        let width = (size.width as usize).min(self.width);
        for row in self.pixels.chunks(self.width).take(size.height as usize) {
            let line: String = row[..width]
                .iter()
                .map(|c| {
                    let luma =
                        (u32::from(c.r()) * 3 + u32::from(c.g()) * 6 + u32::from(c.b())) / 10;
                    RAMP[luma as usize * (RAMP.len() - 1) / 255] as char
                })
                .collect();
            println!("{}", line);
        }
    }
}

impl Renderer for AsciiScreen {
    fn clear_screen(&mut self) {
        self.clears += 1;
        self.pixels.fill(Rgb888::BLACK);
    }

    fn draw_pixel(&mut self, point: Point, color: Rgb888) {
        let idx = point.y as usize * self.width + point.x as usize;
        if let Some(px) = self.pixels.get_mut(idx) {
            *px = color;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let file = BufReader::new(File::open(&args.gif_file)?);
    let pacing = if args.realtime {
        Pacing::Block
    } else {
        Pacing::Off
    };
    let mut gif = GifDecoder::new(
        IoStream::new(file),
        AsciiScreen::new(MAX_SIZE, MAX_SIZE),
        BackedFramebuffer::<MAX_SIZE, MAX_SIZE>::new(),
    )
    .with_clock(StdClock::new(), pacing);
    gif.start_decoding()?;

    let screen = *gif.screen();
    println!(
        "{:?} {}x{}, background {}, color resolution {}, aspect {}",
        screen.version,
        screen.width,
        screen.height,
        screen.background_index,
        screen.color_resolution + 1,
        screen.aspect_ratio
    );
    if usize::from(screen.width) > MAX_SIZE || usize::from(screen.height) > MAX_SIZE {
        println!("larger than {0}x{0}, output is clipped", MAX_SIZE);
    }

    while gif.cycle_number() <= args.cycles {
        match gif.decode_frame()? {
            FrameStatus::Decoded => {
                let area = gif.frame_area();
                println!(
                    "frame {:3} at {:?} size {:?}, {} ms",
                    gif.frame_number(),
                    area.top_left,
                    area.size,
                    gif.frame_delay_ms()
                );
            }
            FrameStatus::DoneParsing => {
                println!(
                    "pass {} done: {} frames, {} ms, loop count {:?}",
                    gif.cycle_number() - 1,
                    gif.frame_count(),
                    gif.cycle_time_ms(),
                    gif.loop_count()
                );
            }
            FrameStatus::Waiting => {}
        }
    }

    if args.output == Output::Ascii {
        let screen = gif.renderer();
        println!("{} screen clears", screen.clears);
        screen.print(gif.size());
    }
    Ok(())
}
