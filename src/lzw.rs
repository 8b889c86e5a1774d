//! Table based LZW decompression of gif image data.
//!
//! The decoder pulls sub-blocks straight from the [`ByteReader`] and produces color indices on
//! demand, a row at a time, so the only memory it needs is the code table itself.

use crate::common::DecodeError;
use crate::stream::{ByteReader, SeekableStream};

/// One data sub-block, plus the length byte of the block after it. Reading both in one go saves a
/// round trip to the storage medium per block.
struct SubBlock {
    buf: [u8; 256],
    idx: usize,
    size: usize,
    /// `None` before the first length byte of the chain has been read.
    next_len: Option<u8>,
}

impl SubBlock {
    fn new() -> Self {
        Self {
            buf: [0; 256],
            idx: 0,
            size: 0,
            next_len: None,
        }
    }

    fn reset(&mut self) {
        self.idx = 0;
        self.size = 0;
        self.next_len = None;
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.size - self.idx
    }

    /// Loads the next sub-block. Returns false once the chain terminator or the end of the stream
    /// has been reached.
    fn refill<S: SeekableStream>(&mut self, reader: &mut ByteReader<S>) -> bool {
        let len = match self.next_len {
            Some(len) => len as usize,
            None => {
                let mut first = [0u8; 1];
                if reader.read_block(&mut first) == 0 {
                    log::warn!("image data missing at {}", reader.get_offset());
                    self.next_len = Some(0);
                    return false;
                }
                first[0] as usize
            }
        };
        if len == 0 {
            self.next_len = Some(0);
            return false;
        }

        let got = reader.read_block(&mut self.buf[..len + 1]);
        self.idx = 0;
        if got == len + 1 {
            self.size = len;
            self.next_len = Some(self.buf[len]);
        } else {
            log::warn!(
                "image data truncated at {}, wanted {} bytes, got {}",
                reader.get_offset(),
                len + 1,
                got
            );
            self.size = got.min(len);
            self.next_len = Some(0);
        }
        self.size > 0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    Uninitialized,
    Ready,
    Ended,
}

/// Variable width LZW decoder with a `TABLE` entry dictionary.
///
/// `TABLE` must be a power of two between 1024 and 4096; the largest code width is
/// `log2(TABLE)` bits. Gifs are always encoded against a 4096 entry table, so smaller tables
/// only work for files that never grow past them.
pub struct LzwDecoder<const TABLE: usize = 4096> {
    suffix: [u8; TABLE],
    prefix: [u16; TABLE],
    /// Decoded strings come out last byte first; they are reversed through here.
    stack: [u8; TABLE],
    sp: usize,
    block: SubBlock,
    bits: u32,
    nbits: u32,
    code_size: u8,
    cur_size: u8,
    clear_code: u16,
    end_code: u16,
    new_codes: u16,
    slot: u16,
    top_slot: u16,
    old_code: Option<u16>,
    first_char: Option<u8>,
    state: State,
}

impl<const TABLE: usize> Default for LzwDecoder<TABLE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const TABLE: usize> LzwDecoder<TABLE> {
    const VALID_TABLE: () = assert!(
        TABLE.is_power_of_two() && TABLE >= 1024 && TABLE <= 4096,
        "LZW table size must be a power of two between 1024 and 4096"
    );

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_TABLE;
        Self {
            suffix: [0; TABLE],
            prefix: [0; TABLE],
            stack: [0; TABLE],
            sp: 0,
            block: SubBlock::new(),
            bits: 0,
            nbits: 0,
            code_size: 0,
            cur_size: 0,
            clear_code: 0,
            end_code: 0,
            new_codes: 0,
            slot: 0,
            top_slot: 0,
            old_code: None,
            first_char: None,
            state: State::Uninitialized,
        }
    }

    /// Widest code this decoder accepts.
    pub const fn max_bits() -> u8 {
        TABLE.trailing_zeros() as u8
    }

    /// Prepares for a new image. `code_size` is the minimum code size byte that precedes the
    /// image's sub-block chain; the reader must be positioned on the chain's first length byte
    /// when [`LzwDecoder::decode`] is next called.
    pub fn init(&mut self, code_size: u8) -> Result<(), DecodeError> {
        if code_size == 0 || code_size >= Self::max_bits() {
            log::error!("unsupported LZW code size {}", code_size);
            self.state = State::Ended;
            return Err(DecodeError::InvalidCodeSize(code_size));
        }

        self.block.reset();
        self.bits = 0;
        self.nbits = 0;
        self.sp = 0;
        self.code_size = code_size;
        self.clear_code = 1 << code_size;
        self.end_code = self.clear_code + 1;
        self.new_codes = self.clear_code + 2;
        self.reset_table();
        self.state = State::Ready;
        Ok(())
    }

    fn reset_table(&mut self) {
        self.cur_size = self.code_size + 1;
        self.slot = self.new_codes;
        self.top_slot = 1 << self.cur_size;
        self.old_code = None;
        self.first_char = None;
    }

    /// True once the end code, the end of the data, or corrupt data was seen.
    pub fn is_done(&self) -> bool {
        self.state != State::Ready
    }

    fn next_code<S: SeekableStream>(&mut self, reader: &mut ByteReader<S>) -> Option<u16> {
        let width = u32::from(self.cur_size);
        while self.nbits < width {
            if self.block.remaining() == 0 && !self.block.refill(reader) {
                return None;
            }
            let idx = self.block.idx;
            if self.block.remaining() >= 2 {
                let word = u16::from_le_bytes([self.block.buf[idx], self.block.buf[idx + 1]]);
                self.bits |= u32::from(word) << self.nbits;
                self.nbits += 16;
                self.block.idx += 2;
            } else {
                self.bits |= u32::from(self.block.buf[idx]) << self.nbits;
                self.nbits += 8;
                self.block.idx += 1;
            }
        }
        let code = (self.bits & ((1 << width) - 1)) as u16;
        self.bits >>= width;
        self.nbits -= width;
        Some(code)
    }

    /// Produces up to `len` color indices.
    ///
    /// Indices land in `out`; once `out` is full the remaining ones are decoded and dropped, so
    /// an image wider than the buffer stays aligned row to row. Returns the number of indices
    /// produced, which is less than `len` only when the image data ended.
    pub fn decode<S: SeekableStream>(
        &mut self,
        reader: &mut ByteReader<S>,
        out: &mut [u8],
        len: usize,
    ) -> Result<usize, DecodeError> {
        if self.state != State::Ready || len == 0 {
            return Ok(0);
        }

        let mut produced = 0;
        let mut overrun_logged = false;
        loop {
            while self.sp > 0 {
                self.sp -= 1;
                if let Some(px) = out.get_mut(produced) {
                    *px = self.stack[self.sp];
                } else if !overrun_logged {
                    log::debug!("LZW output past the end of a {} byte buffer", out.len());
                    overrun_logged = true;
                }
                produced += 1;
                if produced == len {
                    return Ok(produced);
                }
            }

            let Some(code) = self.next_code(reader) else {
                log::debug!("image data ended without an end code");
                self.state = State::Ended;
                return Ok(produced);
            };

            if code == self.end_code {
                self.state = State::Ended;
                return Ok(produced);
            }
            if code == self.clear_code {
                self.reset_table();
                continue;
            }

            let mut walk = code;
            if code == self.slot && self.first_char.is_some() {
                if let (Some(fc), Some(oc)) = (self.first_char, self.old_code) {
                    self.stack[self.sp] = fc;
                    self.sp += 1;
                    walk = oc;
                }
            } else if code >= self.slot {
                log::error!("LZW code {} beyond next free slot {}", code, self.slot);
                self.state = State::Ended;
                return Err(DecodeError::LzwCorruptStream);
            }

            while walk >= self.new_codes {
                if self.sp >= TABLE {
                    self.state = State::Ended;
                    return Err(DecodeError::LzwCorruptStream);
                }
                self.stack[self.sp] = self.suffix[walk as usize];
                self.sp += 1;
                walk = self.prefix[walk as usize];
            }
            if self.sp >= TABLE {
                self.state = State::Ended;
                return Err(DecodeError::LzwCorruptStream);
            }
            // literal, walk < clear_code here
            let root = walk as u8;
            self.stack[self.sp] = root;
            self.sp += 1;

            if self.slot < self.top_slot {
                if let Some(oc) = self.old_code {
                    self.suffix[self.slot as usize] = root;
                    self.prefix[self.slot as usize] = oc;
                    self.slot += 1;
                }
            }
            self.first_char = Some(root);
            self.old_code = Some(code);

            if self.slot >= self.top_slot && self.cur_size < Self::max_bits() {
                self.cur_size += 1;
                self.top_slot <<= 1;
            }
        }
    }
}
