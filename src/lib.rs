//! A fixed memory footprint animated gif player, primarily for embedded, no-std environments but
//! usable anywhere.
//!
//! The decoder reads a gif through a small [`SeekableStream`] trait, so files can stay on flash or
//! an SD card and only one image's worth of bookkeeping is held in memory. Frames are decoded one
//! per [`GifDecoder::decode_frame`] call, composited according to their disposal method, and
//! emitted to a [`Renderer`]: pixel by pixel, row by row, or onto any [`embedded_graphics`]
//! [`DrawTarget`] through [`DrawTargetRenderer`]. At the end of the file the decoder starts over,
//! so animations loop forever.
//!
//! Memory is fixed at compile time. The canvas type picks the screen size and how much of it is
//! kept; the LZW dictionary size is a const generic on [`GifDecoder`] that defaults to the 4096
//! entries gif files are written against.
//!
//! ```ignore
//! let mut gif = GifDecoder::new(
//!     SliceStream::new(include_bytes!("animation.gif")),
//!     DrawTargetRenderer::new(display),
//!     Framebuffer::<64, 64>::new(),
//! );
//! gif.start_decoding()?;
//! loop {
//!     gif.decode_frame()?;
//! }
//! ```
//!
//! Diagnostics go through the [`log`] facade.
//!
//! <!-- README-LINKS
//! [`embedded_graphics`]: https://docs.rs/embedded_graphics
//! [`DrawTarget`]: https://docs.rs/embedded-graphics/latest/embedded_graphics/draw_target/trait.DrawTarget.html
//! README-LINKS -->
//!
//! [`DrawTarget`]: embedded_graphics::draw_target::DrawTarget

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod canvas;
mod common;
mod frame;
pub mod header;
mod lzw;
pub mod render;
mod stream;
#[cfg(test)]
mod test_utils;

pub use canvas::{BackedFramebuffer, Canvas, Framebuffer, LineBuffer};
pub use common::{DecodeError, DisposalMethod, FrameStatus};
pub use frame::GifDecoder;
pub use header::Palette;
pub use lzw::LzwDecoder;
pub use render::{Clock, DrawTargetRenderer, NoClock, Pacing, Renderer};
#[cfg(feature = "std")]
pub use render::StdClock;
#[cfg(feature = "std")]
pub use stream::IoStream;
pub use stream::{ByteReader, SeekError, SeekableStream, SliceStream};
