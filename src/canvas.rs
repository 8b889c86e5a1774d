//! Palette index storage the compositor draws into.
//!
//! The canvas size is fixed at compile time. Three strategies trade memory for features:
//! [`Framebuffer`] keeps the composited screen, [`BackedFramebuffer`] adds the backup copy that
//! restore-to-previous needs, and [`LineBuffer`] keeps a single row and streams it to the
//! renderer as soon as it is decoded.

use embedded_graphics::{prelude::*, primitives::Rectangle};

/// Region a disposal method acts upon, always inside the canvas.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DirtyRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl DirtyRect {
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Clips an image rectangle to a `canvas_width` x `canvas_height` canvas. A rectangle that
    /// starts outside the canvas becomes empty.
    pub fn clipped(
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        canvas_width: usize,
        canvas_height: usize,
    ) -> Self {
        if x >= canvas_width || y >= canvas_height {
            return Self::default();
        }
        Self {
            x,
            y,
            width: width.min(canvas_width - x),
            height: height.min(canvas_height - y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn rows(&self) -> core::ops::Range<usize> {
        self.y..self.y + self.height
    }

    pub fn columns(&self) -> core::ops::Range<usize> {
        self.x..self.x + self.width
    }
}

impl From<DirtyRect> for Rectangle {
    fn from(rect: DirtyRect) -> Self {
        Rectangle::new(
            Point::new(rect.x as i32, rect.y as i32),
            Size::new(rect.width as u32, rect.height as u32),
        )
    }
}

/// Storage for decoded palette indices.
pub trait Canvas {
    const WIDTH: usize;
    const HEIGHT: usize;
    /// Whether rows written by [`Canvas::composite_line`] are kept after the frame is decoded.
    /// Non persistent canvases are drawn row by row during decoding instead.
    const PERSISTENT: bool;

    fn fill(&mut self, index: u8);

    fn fill_rect(&mut self, rect: &DirtyRect, index: u8);

    /// Copies `rect` of the live canvas into the backup.
    fn save_rect(&mut self, rect: &DirtyRect);

    /// Copies `rect` of the backup into the live canvas.
    fn restore_rect(&mut self, rect: &DirtyRect);

    /// `WIDTH` long scratch row the LZW decoder unpacks into.
    fn line(&self) -> &[u8];

    fn line_mut(&mut self) -> &mut [u8];

    /// Merges `line[x..x + len]` into row `y`, leaving pixels that are `transparent` in the
    /// line untouched on the canvas.
    fn composite_line(&mut self, y: usize, x: usize, len: usize, transparent: Option<u8>);

    /// Row `y` of the canvas.
    fn row(&self, y: usize) -> &[u8];
}

fn merge(dst: &mut [u8], src: &[u8], transparent: Option<u8>) {
    match transparent {
        Some(t) => {
            for (d, &px) in dst.iter_mut().zip(src) {
                if px != t {
                    *d = px;
                }
            }
        }
        None => dst.copy_from_slice(src),
    }
}

fn copy_rect<const W: usize, const H: usize>(
    dst: &mut [[u8; W]; H],
    src: &[[u8; W]; H],
    rect: &DirtyRect,
) {
    for y in rect.rows() {
        dst[y][rect.columns()].copy_from_slice(&src[y][rect.columns()]);
    }
}

/// Full screen of palette indices, no backup: restore-to-previous leaves the canvas as is.
pub struct Framebuffer<const W: usize, const H: usize> {
    pixels: [[u8; W]; H],
    line: [u8; W],
}

impl<const W: usize, const H: usize> Framebuffer<W, H> {
    pub fn new() -> Self {
        Self {
            pixels: [[0; W]; H],
            line: [0; W],
        }
    }

    pub fn pixels(&self) -> &[[u8; W]; H] {
        &self.pixels
    }
}

impl<const W: usize, const H: usize> Default for Framebuffer<W, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const W: usize, const H: usize> Canvas for Framebuffer<W, H> {
    const WIDTH: usize = W;
    const HEIGHT: usize = H;
    const PERSISTENT: bool = true;

    fn fill(&mut self, index: u8) {
        for row in &mut self.pixels {
            row.fill(index);
        }
    }

    fn fill_rect(&mut self, rect: &DirtyRect, index: u8) {
        for y in rect.rows() {
            self.pixels[y][rect.columns()].fill(index);
        }
    }

    fn save_rect(&mut self, _rect: &DirtyRect) {}

    fn restore_rect(&mut self, _rect: &DirtyRect) {}

    fn line(&self) -> &[u8] {
        &self.line
    }

    fn line_mut(&mut self) -> &mut [u8] {
        &mut self.line
    }

    fn composite_line(&mut self, y: usize, x: usize, len: usize, transparent: Option<u8>) {
        if y < H && x < W {
            let end = (x + len).min(W);
            merge(&mut self.pixels[y][x..end], &self.line[x..end], transparent);
        }
    }

    fn row(&self, y: usize) -> &[u8] {
        match self.pixels.get(y) {
            Some(row) => &row[..],
            None => &[],
        }
    }
}

/// [`Framebuffer`] plus the backup screen restore-to-previous copies from. Twice the memory.
pub struct BackedFramebuffer<const W: usize, const H: usize> {
    live: Framebuffer<W, H>,
    backup: [[u8; W]; H],
}

impl<const W: usize, const H: usize> BackedFramebuffer<W, H> {
    pub fn new() -> Self {
        Self {
            live: Framebuffer::new(),
            backup: [[0; W]; H],
        }
    }

    pub fn pixels(&self) -> &[[u8; W]; H] {
        self.live.pixels()
    }
}

impl<const W: usize, const H: usize> Default for BackedFramebuffer<W, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const W: usize, const H: usize> Canvas for BackedFramebuffer<W, H> {
    const WIDTH: usize = W;
    const HEIGHT: usize = H;
    const PERSISTENT: bool = true;

    fn fill(&mut self, index: u8) {
        self.live.fill(index);
    }

    fn fill_rect(&mut self, rect: &DirtyRect, index: u8) {
        self.live.fill_rect(rect, index);
    }

    fn save_rect(&mut self, rect: &DirtyRect) {
        copy_rect(&mut self.backup, &self.live.pixels, rect);
    }

    fn restore_rect(&mut self, rect: &DirtyRect) {
        copy_rect(&mut self.live.pixels, &self.backup, rect);
    }

    fn line(&self) -> &[u8] {
        self.live.line()
    }

    fn line_mut(&mut self) -> &mut [u8] {
        self.live.line_mut()
    }

    fn composite_line(&mut self, y: usize, x: usize, len: usize, transparent: Option<u8>) {
        self.live.composite_line(y, x, len, transparent);
    }

    fn row(&self, y: usize) -> &[u8] {
        self.live.row(y)
    }
}

/// One row of a `W` x `H` screen. Nothing is kept between rows, so disposal only reaches the
/// renderer as screen clears and background filled rows.
pub struct LineBuffer<const W: usize, const H: usize> {
    line: [u8; W],
}

impl<const W: usize, const H: usize> LineBuffer<W, H> {
    pub fn new() -> Self {
        Self { line: [0; W] }
    }
}

impl<const W: usize, const H: usize> Default for LineBuffer<W, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const W: usize, const H: usize> Canvas for LineBuffer<W, H> {
    const WIDTH: usize = W;
    const HEIGHT: usize = H;
    const PERSISTENT: bool = false;

    fn fill(&mut self, index: u8) {
        self.line.fill(index);
    }

    fn fill_rect(&mut self, _rect: &DirtyRect, _index: u8) {}

    fn save_rect(&mut self, _rect: &DirtyRect) {}

    fn restore_rect(&mut self, _rect: &DirtyRect) {}

    fn line(&self) -> &[u8] {
        &self.line
    }

    fn line_mut(&mut self) -> &mut [u8] {
        &mut self.line
    }

    fn composite_line(&mut self, _y: usize, _x: usize, _len: usize, _transparent: Option<u8>) {}

    fn row(&self, y: usize) -> &[u8] {
        if y < H {
            &self.line[..]
        } else {
            &[]
        }
    }
}
