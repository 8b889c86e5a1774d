use std::{cell::Cell, rc::Rc, vec::Vec};

use embedded_graphics::{
    pixelcolor::{Rgb565, Rgb888},
    prelude::*,
};

use crate::render::{Clock, Renderer};

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// In-memory RGB565 display for checking what a renderer drew.
pub(crate) struct Framebuffer<const WIDTH: usize, const HEIGHT: usize> {
    pub pixels: [[Rgb565; WIDTH]; HEIGHT],
}

impl<const WIDTH: usize, const HEIGHT: usize> Framebuffer<WIDTH, HEIGHT> {
    pub fn new() -> Self {
        let color = Rgb565::BLACK;

        Self {
            pixels: [[color; WIDTH]; HEIGHT],
        }
    }
}

impl<const WIDTH: usize, const HEIGHT: usize> DrawTarget for Framebuffer<WIDTH, HEIGHT> {
    type Error = std::convert::Infallible;
    type Color = Rgb565;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Rgb565>>,
    {
        for Pixel(p, c) in pixels {
            assert!(
                (p.x as usize) < WIDTH && (p.y as usize) < HEIGHT,
                "pixel {:?} off screen",
                p
            );
            self.pixels[p.y as usize][p.x as usize] = c;
        }

        Ok(())
    }
}

impl<const WIDTH: usize, const HEIGHT: usize> OriginDimensions for Framebuffer<WIDTH, HEIGHT> {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Clear,
    StartDrawing,
    Present,
}

/// Keeps every callback the decoder makes.
#[derive(Default)]
pub(crate) struct RecordingRenderer {
    pub events: Vec<Event>,
    pub pixels: Vec<(Point, Rgb888)>,
}

impl Renderer for RecordingRenderer {
    fn clear_screen(&mut self) {
        self.events.push(Event::Clear);
    }

    fn start_drawing(&mut self) {
        self.events.push(Event::StartDrawing);
    }

    fn present_frame(&mut self) {
        self.events.push(Event::Present);
    }

    fn draw_pixel(&mut self, point: Point, color: Rgb888) {
        self.pixels.push((point, color));
    }
}

/// Test controlled time. Clones share the same counter; every reading moves it forward by
/// `step` so busy waits finish.
#[derive(Clone)]
pub(crate) struct ManualClock {
    now: Rc<Cell<u32>>,
    step: u32,
}

impl ManualClock {
    pub fn new(step: u32) -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
            step,
        }
    }

    pub fn now(&self) -> u32 {
        self.now.get()
    }

    pub fn advance(&self, micros: u32) {
        self.now.set(self.now.get() + micros);
    }
}

impl Clock for ManualClock {
    fn micros(&mut self) -> u32 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

/// Smallest exponent `b >= 1` with `2^b >= colors`.
fn table_bits(colors: usize) -> u8 {
    let mut bits = 1;
    while (1usize << bits) < colors {
        bits += 1;
    }
    bits
}

/// Assembles gif files block by block.
pub(crate) struct GifBuilder {
    bytes: Vec<u8>,
    global_bits: u8,
}

impl GifBuilder {
    pub fn new(width: u16, height: u16, global: &[[u8; 3]], background: u8) -> Self {
        let bits = table_bits(global.len());
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());
        // global table, 8 bits per primary
        bytes.push(0x80 | 0x70 | (bits - 1));
        bytes.push(background);
        bytes.push(0);
        push_table(&mut bytes, global, bits);
        Self {
            bytes,
            global_bits: bits,
        }
    }

    pub fn graphic_control(mut self, disposal: u8, delay_cs: u16, transparent: Option<u8>) -> Self {
        let packed = (disposal << 2) | u8::from(transparent.is_some());
        self.bytes.extend_from_slice(&[0x21, 0xf9, 4, packed]);
        self.bytes.extend_from_slice(&delay_cs.to_le_bytes());
        self.bytes.push(transparent.unwrap_or(0));
        self.bytes.push(0);
        self
    }

    pub fn image(self, left: u16, top: u16, width: u16, height: u16, pixels: &[u8]) -> Self {
        let bits = self.global_bits;
        self.push_image([left, top, width, height], 0, None, bits, pixels)
    }

    /// `pixels` are in stream order, i.e. already interlaced.
    pub fn interlaced_image(
        self,
        left: u16,
        top: u16,
        width: u16,
        height: u16,
        pixels: &[u8],
    ) -> Self {
        let bits = self.global_bits;
        self.push_image([left, top, width, height], 0x40, None, bits, pixels)
    }

    pub fn local_image(
        self,
        left: u16,
        top: u16,
        width: u16,
        height: u16,
        table: &[[u8; 3]],
        pixels: &[u8],
    ) -> Self {
        let bits = table_bits(table.len());
        self.push_image([left, top, width, height], 0x80, Some(table), bits, pixels)
    }

    fn push_image(
        mut self,
        rect: [u16; 4],
        flags: u8,
        table: Option<&[[u8; 3]]>,
        bits: u8,
        pixels: &[u8],
    ) -> Self {
        self.bytes.push(0x2c);
        for field in rect {
            self.bytes.extend_from_slice(&field.to_le_bytes());
        }
        match table {
            Some(table) => {
                self.bytes.push(flags | (bits - 1));
                push_table(&mut self.bytes, table, bits);
            }
            None => self.bytes.push(flags),
        }

        let code_size = bits.max(2);
        let data = weezl::encode::Encoder::new(weezl::BitOrder::Lsb, code_size)
            .encode(pixels)
            .unwrap();
        self.bytes.push(code_size);
        push_sub_blocks(&mut self.bytes, &data);
        self
    }

    pub fn comment(mut self, text: &[u8]) -> Self {
        self.bytes.extend_from_slice(&[0x21, 0xfe]);
        push_sub_blocks(&mut self.bytes, text);
        self
    }

    pub fn netscape_loop(mut self, count: u16) -> Self {
        self.bytes.extend_from_slice(&[0x21, 0xff, 11]);
        self.bytes.extend_from_slice(b"NETSCAPE2.0");
        self.bytes.extend_from_slice(&[3, 1]);
        self.bytes.extend_from_slice(&count.to_le_bytes());
        self.bytes.push(0);
        self
    }

    pub fn plain_text(mut self) -> Self {
        self.bytes.extend_from_slice(&[0x21, 0x01, 12]);
        self.bytes.extend_from_slice(&[0, 0, 0, 0, 8, 0, 8, 0, 8, 8, 1, 0]);
        push_sub_blocks(&mut self.bytes, b"hello");
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// The file without a trailer.
    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes.push(0x3b);
        self.bytes
    }
}

fn push_table(bytes: &mut Vec<u8>, table: &[[u8; 3]], bits: u8) {
    for i in 0..1usize << bits {
        bytes.extend_from_slice(&table.get(i).copied().unwrap_or([0; 3]));
    }
}

fn push_sub_blocks(bytes: &mut Vec<u8>, data: &[u8]) {
    for block in data.chunks(255) {
        bytes.push(block.len() as u8);
        bytes.extend_from_slice(block);
    }
    bytes.push(0);
}
