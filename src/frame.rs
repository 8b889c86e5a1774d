use embedded_graphics::{prelude::*, primitives::Rectangle};

use crate::{
    canvas::{Canvas, DirtyRect},
    common::{Block, DecodeError, DisposalMethod, ExtensionLabel, FrameStatus},
    header::{
        eat_comment, eat_plain_text, parse_header, ApplicationExtension, GraphicsControl,
        ImageDescriptor, Palette, ScreenDescriptor,
    },
    lzw::LzwDecoder,
    render::{Clock, NoClock, Pacing, Renderer},
    stream::{ByteReader, SeekableStream},
};

/// Row visiting order of an image, interlaced images come in four passes.
fn row_order(height: usize, interlaced: bool) -> impl Iterator<Item = usize> {
    const PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];
    let passes: &'static [(usize, usize)] = if interlaced { &PASSES } else { &[(0, 1)] };
    passes
        .iter()
        .flat_map(move |&(start, step)| (start..height).step_by(step))
}

/// Plays a gif from a [`SeekableStream`] onto a [`Renderer`], one frame per
/// [`GifDecoder::decode_frame`] call, looping forever.
///
/// `C` decides how much of the screen is kept in memory (see [`crate::canvas`]), `K` and
/// [`Pacing`] whether the decoder honours frame delays, and `TABLE` the LZW dictionary size.
pub struct GifDecoder<S, R, C, K = NoClock, const TABLE: usize = 4096> {
    reader: ByteReader<S>,
    renderer: R,
    canvas: C,
    clock: K,
    pacing: Pacing,
    lzw: LzwDecoder<TABLE>,
    started: bool,

    screen: ScreenDescriptor,
    palette: Palette,
    /// Graphic control for the next image block
    control: GraphicsControl,
    image: ImageDescriptor,
    loop_count: Option<u16>,

    key_frame: bool,
    prev_disposal: DisposalMethod,
    prev_background: u8,
    dirty: DirtyRect,

    cycle_number: u32,
    frame_number: u32,
    frame_count: u32,
    cycle_time_ms: u32,
    frame_start_us: u32,
    presented_delay_cs: u16,
}

impl<S, R, C> GifDecoder<S, R, C>
where
    S: SeekableStream,
    R: Renderer,
    C: Canvas,
{
    pub fn new(stream: S, renderer: R, canvas: C) -> Self {
        Self::with_parts(stream, renderer, canvas, NoClock, Pacing::Off)
    }
}

impl<S, R, C, K, const TABLE: usize> GifDecoder<S, R, C, K, TABLE>
where
    S: SeekableStream,
    R: Renderer,
    C: Canvas,
    K: Clock,
{
    pub fn with_parts(stream: S, renderer: R, canvas: C, clock: K, pacing: Pacing) -> Self {
        Self {
            reader: ByteReader::new(stream),
            renderer,
            canvas,
            clock,
            pacing,
            lzw: LzwDecoder::new(),
            started: false,
            screen: ScreenDescriptor::default(),
            palette: Palette::default(),
            control: GraphicsControl::default(),
            image: ImageDescriptor::default(),
            loop_count: None,
            key_frame: true,
            prev_disposal: DisposalMethod::None,
            prev_background: 0,
            dirty: DirtyRect::default(),
            cycle_number: 0,
            frame_number: 0,
            frame_count: 0,
            cycle_time_ms: 0,
            frame_start_us: 0,
            presented_delay_cs: 0,
        }
    }

    /// Swaps in a clock and a pacing policy.
    pub fn with_clock<K2: Clock>(
        self,
        clock: K2,
        pacing: Pacing,
    ) -> GifDecoder<S, R, C, K2, TABLE> {
        GifDecoder {
            reader: self.reader,
            renderer: self.renderer,
            canvas: self.canvas,
            clock,
            pacing,
            lzw: self.lzw,
            started: self.started,
            screen: self.screen,
            palette: self.palette,
            control: self.control,
            image: self.image,
            loop_count: self.loop_count,
            key_frame: self.key_frame,
            prev_disposal: self.prev_disposal,
            prev_background: self.prev_background,
            dirty: self.dirty,
            cycle_number: self.cycle_number,
            frame_number: self.frame_number,
            frame_count: self.frame_count,
            cycle_time_ms: self.cycle_time_ms,
            frame_start_us: self.frame_start_us,
            presented_delay_cs: self.presented_delay_cs,
        }
    }

    /// Validates the header and reads the logical screen and global color table. Resets all
    /// animation state; may be called again at any time to restart from the first frame.
    pub fn start_decoding(&mut self) -> Result<(), DecodeError> {
        self.started = false;
        self.cycle_number = 0;
        self.frame_number = 0;
        self.frame_count = 0;
        self.cycle_time_ms = 0;
        self.loop_count = None;
        self.presented_delay_cs = 0;
        self.frame_start_us = self.clock.micros();
        self.control = GraphicsControl::default();
        self.begin_cycle()?;
        self.started = true;
        Ok(())
    }

    /// Seeks to the start of the file and reads everything up to the first block.
    fn begin_cycle(&mut self) -> Result<(), DecodeError> {
        self.key_frame = true;
        self.prev_disposal = DisposalMethod::None;
        self.control.transparent = None;
        self.control.disposal = DisposalMethod::None;

        self.reader.seek_to(0)?;
        let version = parse_header(&mut self.reader)?;
        self.screen = ScreenDescriptor::parser(&mut self.reader, version)?;

        // the frame count is only known once a whole pass has been made
        self.frame_count = if self.cycle_number > 0 {
            self.frame_number
        } else {
            0
        };
        self.cycle_number += 1;

        if self.screen.has_global_table {
            self.palette
                .read(&mut self.reader, self.screen.global_color_count())?;
        }
        log::debug!(
            "cycle {} of {:?} {}x{}, {} frames",
            self.cycle_number,
            self.screen.version,
            self.screen.width,
            self.screen.height,
            self.frame_count
        );
        Ok(())
    }

    /// Decodes and emits the next frame.
    ///
    /// Returns [`FrameStatus::DoneParsing`] instead of a frame at the end of each pass over the
    /// file; the next call starts over at the first frame.
    pub fn decode_frame(&mut self) -> Result<FrameStatus, DecodeError> {
        if !self.started {
            self.start_decoding()?;
        }

        if self.pacing == Pacing::Yield && K::ADVANCES && !self.delay_elapsed() {
            return Ok(FrameStatus::Waiting);
        }

        match self.parse_data() {
            Ok(FrameStatus::DoneParsing) => {
                self.begin_cycle()?;
                Ok(FrameStatus::DoneParsing)
            }
            Err(err) => {
                log::error!("{} while decoding frame {}", err, self.frame_number + 1);
                Err(err)
            }
            status => status,
        }
    }

    fn delay_elapsed(&mut self) -> bool {
        let elapsed = self.clock.micros().wrapping_sub(self.frame_start_us);
        elapsed >= u32::from(self.presented_delay_cs) * 10_000
    }

    /// Walks blocks until an image has been drawn or the pass is over.
    fn parse_data(&mut self) -> Result<FrameStatus, DecodeError> {
        loop {
            let tag = match self.reader.take_byte() {
                Ok(tag) => tag,
                Err(_) => {
                    log::warn!("file ends without a trailer");
                    return Ok(FrameStatus::DoneParsing);
                }
            };

            match Block::from_u8(tag) {
                Some(Block::Image) => {
                    self.parse_table_based_image()?;
                    return Ok(FrameStatus::Decoded);
                }
                Some(Block::Extension) => self.parse_extension()?,
                _ => {
                    self.reader.rewind(1)?;
                    if tag == Block::Trailer as u8 {
                        log::trace!("trailer at {}", self.reader.get_offset());
                        return Ok(FrameStatus::DoneParsing);
                    }
                    // padding or garbage instead of a trailer still loops
                    log::warn!(
                        "{} at {}, starting over",
                        DecodeError::MalformedTerminator(tag),
                        self.reader.get_offset()
                    );
                    return Ok(FrameStatus::DoneParsing);
                }
            }
        }
    }

    fn parse_extension(&mut self) -> Result<(), DecodeError> {
        let label = self.reader.take_byte()?;
        match ExtensionLabel::from_u8(label) {
            Ok(ExtensionLabel::Graphics) => {
                self.control = GraphicsControl::parse(&mut self.reader, self.control)?;
            }
            Ok(ExtensionLabel::App) => {
                let app = ApplicationExtension::parse(&mut self.reader)?;
                if app.loop_count.is_some() {
                    self.loop_count = app.loop_count;
                }
            }
            Ok(ExtensionLabel::Text) => eat_plain_text(&mut self.reader)?,
            Ok(ExtensionLabel::Comment) => eat_comment(&mut self.reader)?,
            Err(err) => {
                log::error!("unknown control extension 0x{:02x}", label);
                return Err(err);
            }
        }
        Ok(())
    }

    fn parse_table_based_image(&mut self) -> Result<(), DecodeError> {
        let image = ImageDescriptor::parser(&mut self.reader)?;
        if image.has_local_table {
            self.palette
                .read(&mut self.reader, image.local_color_count())?;
        }
        self.image = image;

        if self.key_frame {
            self.frame_number = 0;
            self.canvas.fill(
                self.control
                    .transparent
                    .unwrap_or(self.screen.background_index),
            );
            self.key_frame = false;
            self.dirty = DirtyRect::full(C::WIDTH, C::HEIGHT);
        }

        if self.prev_disposal.clears_screen() {
            self.renderer.clear_screen();
        }
        match self.prev_disposal {
            DisposalMethod::Background => self.canvas.fill_rect(&self.dirty, self.prev_background),
            DisposalMethod::Restore => self.canvas.restore_rect(&self.dirty),
            DisposalMethod::None | DisposalMethod::Leave => {}
        }

        self.prev_disposal = self.control.disposal;
        if self.control.disposal != DisposalMethod::None {
            self.dirty = DirtyRect::clipped(
                image.left.into(),
                image.top.into(),
                image.width.into(),
                image.height.into(),
                C::WIDTH,
                C::HEIGHT,
            );
            match self.control.disposal {
                DisposalMethod::Background => {
                    self.prev_background = self
                        .control
                        .transparent
                        .unwrap_or(self.screen.background_index);
                }
                DisposalMethod::Restore => self.canvas.save_rect(&self.dirty),
                DisposalMethod::None | DisposalMethod::Leave => {}
            }
        }

        let code_size = self.reader.take_byte()?;
        let before = self.reader.get_offset();
        self.reader.skip_sub_blocks()?;
        let after = self.reader.get_offset();
        self.reader.seek_to(before)?;
        log::trace!("image data {}..{}, code size {}", before, after, code_size);

        let result = match self.lzw.init(code_size) {
            Ok(()) => self.decompress_and_display(after),
            Err(err) => Err(err),
        };
        if result.is_err() {
            self.reader.seek_to(after)?;
        }

        // graphic control only covers a single image
        self.control.transparent = None;
        self.control.disposal = DisposalMethod::None;
        result
    }

    /// Unpacks one row of the current image into the canvas' scratch line, starting at column
    /// `x`.
    fn decode_row(&mut self, x: usize, width: usize) -> Result<usize, DecodeError> {
        let line = self.canvas.line_mut();
        let out = line.get_mut(x..).unwrap_or(&mut []);
        self.lzw.decode(&mut self.reader, out, width)
    }

    fn decompress_and_display(&mut self, after: usize) -> Result<(), DecodeError> {
        let prior_delay_us = u32::from(self.presented_delay_cs) * 10_000;
        let image = self.image;
        let (x, top, width) = (
            usize::from(image.left),
            usize::from(image.top),
            usize::from(image.width),
        );
        let transparent = self.control.transparent;
        self.frame_number += 1;
        log::debug!(
            "frame {} at {},{} {}x{}, delay {}cs, transparent {:?}, disposal {:?}",
            self.frame_number,
            image.left,
            image.top,
            image.width,
            image.height,
            self.control.delay_cs,
            transparent,
            self.control.disposal
        );

        if C::PERSISTENT {
            for y in row_order(image.height.into(), image.interlaced) {
                let produced = self.decode_row(x, width)?;
                self.canvas
                    .composite_line(top + y, x, produced.min(width), transparent);
            }
            self.reader.seek_to(after)?;

            self.renderer.start_drawing();
            let rect = DirtyRect::clipped(
                x,
                top,
                width,
                image.height.into(),
                C::WIDTH,
                C::HEIGHT,
            );
            for y in rect.rows() {
                self.renderer.draw_line(
                    Point::new(rect.x as i32, y as i32),
                    &self.canvas.row(y)[rect.columns()],
                    &self.palette,
                    transparent,
                );
            }
        } else {
            self.renderer.start_drawing();
            // rows of an image disposed to background go out full width over the background
            let background = (self.control.disposal == DisposalMethod::Background)
                .then_some(self.prev_background);
            let screen_width = usize::from(self.screen.width).min(C::WIDTH);

            for y in row_order(image.height.into(), image.interlaced) {
                if let Some(index) = background {
                    self.canvas.fill(index);
                }
                let produced = self.decode_row(x, width)?;
                let row = top + y;
                if row >= C::HEIGHT {
                    continue;
                }

                let (start, len, skip) = match background {
                    Some(_) => (0, screen_width, None),
                    None => (x, produced.min(width), transparent),
                };
                if start >= C::WIDTH {
                    continue;
                }
                let end = (start + len).min(C::WIDTH);
                self.renderer.draw_line(
                    Point::new(start as i32, row as i32),
                    &self.canvas.line()[start..end],
                    &self.palette,
                    skip,
                );
            }
            self.reader.seek_to(after)?;
        }

        self.present(prior_delay_us);
        Ok(())
    }

    fn present(&mut self, prior_delay_us: u32) {
        let mut now = self.clock.micros();
        if self.pacing == Pacing::Block && K::ADVANCES {
            while now.wrapping_sub(self.frame_start_us) < prior_delay_us {
                now = self.clock.micros();
            }
        }
        self.cycle_time_ms += u32::from(self.control.delay_cs) * 10;
        self.renderer.present_frame();
        self.frame_start_us = now;
        self.presented_delay_cs = self.control.delay_cs;
    }

    /// Logical screen size
    pub fn size(&self) -> Size {
        self.screen.size()
    }

    pub fn screen(&self) -> &ScreenDescriptor {
        &self.screen
    }

    /// Number of passes over the file so far, starting at 1.
    pub fn cycle_number(&self) -> u32 {
        self.cycle_number
    }

    /// Sum of the delays of all frames presented since [`GifDecoder::start_decoding`].
    pub fn cycle_time_ms(&self) -> u32 {
        self.cycle_time_ms
    }

    /// Frames per pass; 0 until the first pass is complete.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// 1-based index of the last decoded frame within the current pass.
    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    pub fn frame_delay_ms(&self) -> u32 {
        u32::from(self.control.delay_cs) * 10
    }

    /// Area of the last decoded image.
    pub fn frame_area(&self) -> Rectangle {
        self.image.bounding_box()
    }

    /// NETSCAPE2.0 repetition count, 0 meaning forever.
    pub fn loop_count(&self) -> Option<u16> {
        self.loop_count
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn into_parts(self) -> (S, R, C) {
        (self.reader.into_inner(), self.renderer, self.canvas)
    }
}

impl<S, R, C, K, const TABLE: usize> OriginDimensions for GifDecoder<S, R, C, K, TABLE>
where
    S: SeekableStream,
    R: Renderer,
    C: Canvas,
    K: Clock,
{
    fn size(&self) -> Size {
        self.screen.size()
    }
}
