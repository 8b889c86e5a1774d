//! Byte sources and the reader the parser and the LZW decoder pull bytes through.

use crate::common::DecodeError;
use core::mem::size_of;

/// Seeking to an offset failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SeekError;

/// Abstraction over random-access storage holding an entire gif file.
///
/// This is the only contact point between the decoder and the storage medium; SD cards, flash
/// filesystems or memory mapped images all reduce to these four operations.
pub trait SeekableStream {
    /// Goes to byte `offset` of the stream.
    fn seek(&mut self, offset: usize) -> Result<(), SeekError>;

    /// Current absolute offset.
    fn position(&self) -> usize;

    /// Next byte, or `None` at end of stream or on a read error.
    fn read_byte(&mut self) -> Option<u8>;

    /// Fills as much of `buf` as possible and returns the number of bytes read.
    fn read_block(&mut self, buf: &mut [u8]) -> usize;
}

impl<S: SeekableStream + ?Sized> SeekableStream for &mut S {
    fn seek(&mut self, offset: usize) -> Result<(), SeekError> {
        (**self).seek(offset)
    }

    fn position(&self) -> usize {
        (**self).position()
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn read_block(&mut self, buf: &mut [u8]) -> usize {
        (**self).read_block(buf)
    }
}

/// A gif held in memory.
#[derive(Clone, Debug)]
pub struct SliceStream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl SeekableStream for SliceStream<'_> {
    fn seek(&mut self, offset: usize) -> Result<(), SeekError> {
        if offset > self.data.len() {
            return Err(SeekError);
        }
        self.pos = offset;
        Ok(())
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    fn read_block(&mut self, buf: &mut [u8]) -> usize {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        n
    }
}

/// Any `Read + Seek` source, e.g. a `std::fs::File`.
#[cfg(feature = "std")]
pub struct IoStream<R> {
    inner: R,
    pos: usize,
}

#[cfg(feature = "std")]
impl<R: std::io::Read + std::io::Seek> IoStream<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(feature = "std")]
impl<R: std::io::Read + std::io::Seek> SeekableStream for IoStream<R> {
    fn seek(&mut self, offset: usize) -> Result<(), SeekError> {
        match self.inner.seek(std::io::SeekFrom::Start(offset as u64)) {
            Ok(_) => {
                self.pos = offset;
                Ok(())
            }
            Err(err) => {
                log::error!("seek to {} failed: {}", offset, err);
                Err(SeekError)
            }
        }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.read_block(&mut byte) {
            1 => Some(byte[0]),
            _ => None,
        }
    }

    fn read_block(&mut self, buf: &mut [u8]) -> usize {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) => {
                    log::error!("read error at {}: {}", self.pos + filled, err);
                    break;
                }
            }
        }
        self.pos += filled;
        filled
    }
}

/// Structured reads on top of a [`SeekableStream`].
///
/// End of stream while a structure is being read surfaces as
/// [`DecodeError::StreamReadFailure`].
pub struct ByteReader<S> {
    stream: S,
}

impl<S: SeekableStream> ByteReader<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    pub(crate) fn take_byte(&mut self) -> Result<u8, DecodeError> {
        self.stream.read_byte().ok_or_else(|| {
            log::error!("read error or EOF at {}", self.stream.position());
            DecodeError::StreamReadFailure
        })
    }

    /// Little endian, as every multi-byte field in a gif.
    pub(crate) fn take_u16_le(&mut self) -> Result<u16, DecodeError> {
        let bytes: [u8; size_of::<u16>()] = self.take_arr()?;
        Ok(u16::from_le_bytes(bytes))
    }

    #[inline]
    pub(crate) fn take_arr<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut arr = [0u8; N];
        self.fill(&mut arr)?;
        Ok(arr)
    }

    /// Reads exactly `buf.len()` bytes.
    pub(crate) fn fill(&mut self, buf: &mut [u8]) -> Result<(), DecodeError> {
        if self.read_block(buf) != buf.len() {
            log::error!("read error or EOF at {}", self.stream.position());
            return Err(DecodeError::StreamReadFailure);
        }
        Ok(())
    }

    /// Reads up to `buf.len()` bytes, returning how many were actually read.
    pub(crate) fn read_block(&mut self, buf: &mut [u8]) -> usize {
        self.stream.read_block(buf)
    }

    pub(crate) fn get_offset(&self) -> usize {
        self.stream.position()
    }

    pub(crate) fn seek_to(&mut self, offset: usize) -> Result<(), DecodeError> {
        self.stream.seek(offset).map_err(|_| {
            log::error!("seek to {} failed", offset);
            DecodeError::Seek(offset)
        })
    }

    pub(crate) fn seek_by(&mut self, len: usize) -> Result<(), DecodeError> {
        let target = self.get_offset() + len;
        // a skip past the end is a truncated file, not a bad seek
        self.stream
            .seek(target)
            .map_err(|_| DecodeError::StreamReadFailure)
    }

    /// Un-consumes the last `n` bytes.
    pub(crate) fn rewind(&mut self, n: usize) -> Result<(), DecodeError> {
        let offset = self.get_offset().saturating_sub(n);
        self.seek_to(offset)
    }

    /// Walks a chain of length prefixed sub-blocks up to and including the zero length
    /// terminator, without looking at the payload.
    pub(crate) fn skip_sub_blocks(&mut self) -> Result<(), DecodeError> {
        loop {
            match self.take_byte()? {
                0 => return Ok(()),
                len => self.seek_by(len as usize)?,
            }
        }
    }
}
