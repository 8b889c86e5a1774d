//! Collaborators the decoder hands pixels and timing questions to.

use crate::header::Palette;
use embedded_graphics::{
    pixelcolor::Rgb888,
    prelude::{DrawTarget, PixelColor, Point, RgbColor},
    Pixel,
};

/// Receives the decoded animation.
///
/// Only [`Renderer::draw_pixel`] is required. Devices that take whole rows should override
/// [`Renderer::draw_line`], which gets the raw palette indices together with the palette and its
/// RGB565 form ([`Palette::packed`]).
pub trait Renderer {
    /// The previous frame asked for its area to be disposed of.
    fn clear_screen(&mut self) {}

    /// Called once per frame before the first pixel is emitted.
    fn start_drawing(&mut self) {}

    /// All pixels of a frame have been emitted.
    fn present_frame(&mut self) {}

    fn draw_pixel(&mut self, point: Point, color: Rgb888);

    /// `indices` are consecutive pixels starting at `origin`. Pixels equal to `skip` must be
    /// left alone.
    fn draw_line(&mut self, origin: Point, indices: &[u8], palette: &Palette, skip: Option<u8>) {
        for (dx, &index) in indices.iter().enumerate() {
            if Some(index) != skip {
                self.draw_pixel(origin + Point::new(dx as i32, 0), palette.get(index));
            }
        }
    }
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn clear_screen(&mut self) {
        (**self).clear_screen()
    }

    fn start_drawing(&mut self) {
        (**self).start_drawing()
    }

    fn present_frame(&mut self) {
        (**self).present_frame()
    }

    fn draw_pixel(&mut self, point: Point, color: Rgb888) {
        (**self).draw_pixel(point, color)
    }

    fn draw_line(&mut self, origin: Point, indices: &[u8], palette: &Palette, skip: Option<u8>) {
        (**self).draw_line(origin, indices, palette, skip)
    }
}

/// Renders onto an embedded-graphics [`DrawTarget`].
///
/// `DrawTarget` errors can't travel through the decoder, so the first one is kept until
/// [`DrawTargetRenderer::take_error`] is called and later draws are dropped.
pub struct DrawTargetRenderer<D: DrawTarget> {
    target: D,
    clear_color: D::Color,
    error: Option<D::Error>,
}

impl<D> DrawTargetRenderer<D>
where
    D: DrawTarget,
    D::Color: PixelColor + From<Rgb888>,
{
    /// Screen clears paint black.
    pub fn new(target: D) -> Self {
        Self::with_clear_color(target, Rgb888::BLACK.into())
    }

    pub fn with_clear_color(target: D, clear_color: D::Color) -> Self {
        Self {
            target,
            clear_color,
            error: None,
        }
    }

    pub fn target(&self) -> &D {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut D {
        &mut self.target
    }

    pub fn into_inner(self) -> D {
        self.target
    }

    pub fn take_error(&mut self) -> Option<D::Error> {
        self.error.take()
    }

    fn check(&mut self, result: Result<(), D::Error>) {
        if let Err(err) = result {
            if self.error.is_none() {
                log::error!("draw target failed");
                self.error = Some(err);
            }
        }
    }
}

impl<D> Renderer for DrawTargetRenderer<D>
where
    D: DrawTarget,
    D::Color: PixelColor + From<Rgb888>,
{
    fn clear_screen(&mut self) {
        if self.error.is_none() {
            let result = self.target.clear(self.clear_color);
            self.check(result);
        }
    }

    fn draw_pixel(&mut self, point: Point, color: Rgb888) {
        if self.error.is_none() {
            let result = self
                .target
                .draw_iter(core::iter::once(Pixel(point, color.into())));
            self.check(result);
        }
    }

    fn draw_line(&mut self, origin: Point, indices: &[u8], palette: &Palette, skip: Option<u8>) {
        if self.error.is_some() {
            return;
        }
        let result = self.target.draw_iter(
            indices
                .iter()
                .enumerate()
                .filter(|&(_, &index)| Some(index) != skip)
                .map(|(dx, &index)| {
                    Pixel(
                        origin + Point::new(dx as i32, 0),
                        palette.get(index).into(),
                    )
                }),
        );
        self.check(result);
    }
}

/// Microsecond time source for frame pacing. Only differences are used, so it may wrap.
pub trait Clock {
    /// False for clocks that never move. Pacing is skipped for them instead of waiting forever.
    const ADVANCES: bool = true;

    fn micros(&mut self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &mut C {
    const ADVANCES: bool = C::ADVANCES;

    fn micros(&mut self) -> u32 {
        (**self).micros()
    }
}

/// Time stands still; used when pacing is off. Any [`Pacing`] with this clock behaves like
/// [`Pacing::Off`].
#[derive(Debug, Default, Copy, Clone)]
pub struct NoClock;

impl Clock for NoClock {
    const ADVANCES: bool = false;

    fn micros(&mut self) -> u32 {
        0
    }
}

/// Wall clock time since construction.
#[cfg(any(test, feature = "std"))]
#[derive(Debug, Copy, Clone)]
pub struct StdClock {
    start: std::time::Instant,
}

#[cfg(any(test, feature = "std"))]
impl StdClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "std"))]
impl Clock for StdClock {
    fn micros(&mut self) -> u32 {
        self.start.elapsed().as_micros() as u32
    }
}

/// How [`crate::GifDecoder::decode_frame`] honours frame delays.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Pacing {
    /// Frames are produced as fast as they are asked for.
    #[default]
    Off,
    /// Spin on the clock until the previous frame's delay is over, then present.
    Block,
    /// Return [`crate::FrameStatus::Waiting`] until the previous frame's delay is over.
    Yield,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{ByteReader, SliceStream};
    use crate::test_utils::{Framebuffer, RecordingRenderer};
    use embedded_graphics::pixelcolor::Rgb565;

    fn palette() -> Palette {
        let data = [0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255];
        let mut palette = Palette::default();
        palette
            .read(&mut ByteReader::new(SliceStream::new(&data)), 4)
            .unwrap();
        palette
    }

    #[test]
    fn default_line_falls_back_to_pixels() {
        let mut rec = RecordingRenderer::default();
        rec.draw_line(Point::new(2, 3), &[1, 3, 2], &palette(), Some(3));
        assert_eq!(
            rec.pixels,
            vec![
                (Point::new(2, 3), Rgb888::new(255, 0, 0)),
                (Point::new(4, 3), Rgb888::new(0, 255, 0)),
            ]
        );
    }

    #[test]
    fn draw_target_gets_converted_colors() {
        let mut renderer = DrawTargetRenderer::new(Framebuffer::<4, 2>::new());
        renderer.draw_line(Point::new(0, 1), &[1, 2, 3, 0], &palette(), Some(0));
        renderer.draw_pixel(Point::new(0, 0), Rgb888::WHITE);

        let fb = renderer.into_inner();
        assert_eq!(fb.pixels[1][0], Rgb565::RED);
        assert_eq!(fb.pixels[1][1], Rgb565::GREEN);
        assert_eq!(fb.pixels[1][2], Rgb565::BLUE);
        assert_eq!(fb.pixels[1][3], Rgb565::BLACK);
        assert_eq!(fb.pixels[0][0], Rgb565::WHITE);
    }

    #[test]
    fn clear_uses_clear_color() {
        let mut renderer =
            DrawTargetRenderer::with_clear_color(Framebuffer::<2, 2>::new(), Rgb565::BLUE);
        renderer.clear_screen();
        assert!(renderer.take_error().is_none());
        assert_eq!(renderer.target().pixels, [[Rgb565::BLUE; 2]; 2]);
    }
}
