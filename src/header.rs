use crate::common::{DecodeError, DisposalMethod};
use crate::stream::{ByteReader, SeekableStream};
use embedded_graphics::{
    pixelcolor::Rgb888,
    prelude::*,
    primitives::Rectangle,
};
use smallvec::SmallVec;

const COLOR_TABLE_FLAG: u8 = 0x80;
const INTERLACE_FLAG: u8 = 0x40;
const TRANSPARENT_FLAG: u8 = 0x01;
const USER_INPUT_FLAG: u8 = 0x02;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Version {
    V87a,
    #[default]
    V89a,
}

/// Checks the 6 byte signature at the start of the stream.
pub fn parse_header<S: SeekableStream>(
    reader: &mut ByteReader<S>,
) -> Result<Version, DecodeError> {
    let name: [u8; 6] = reader.take_arr()?;
    match &name {
        b"GIF87a" => Ok(Version::V87a),
        b"GIF89a" => Ok(Version::V89a),
        _ => {
            log::error!("not a GIF file");
            Err(DecodeError::NotAGifFile)
        }
    }
}

/// Logical screen descriptor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ScreenDescriptor {
    pub version: Version,
    pub width: u16,
    pub height: u16,
    pub has_global_table: bool,
    /// Bits per primary color minus one, as stored.
    pub color_resolution: u8,
    pub sorted: bool,
    table_bits: u8,
    pub background_index: u8,
    pub aspect_ratio: u8,
}

impl ScreenDescriptor {
    pub fn parser<S: SeekableStream>(
        reader: &mut ByteReader<S>,
        version: Version,
    ) -> Result<Self, DecodeError> {
        let width = reader.take_u16_le()?;
        let height = reader.take_u16_le()?;
        let packed = reader.take_byte()?;
        let background_index = reader.take_byte()?;
        let aspect_ratio = reader.take_byte()?;

        let screen = Self {
            version,
            width,
            height,
            has_global_table: (packed & COLOR_TABLE_FLAG) != 0,
            color_resolution: (packed & 0x70) >> 4,
            sorted: (packed & 0x08) != 0,
            table_bits: (packed & 0x07) + 1,
            background_index,
            aspect_ratio,
        };
        log::debug!(
            "logical screen {}x{} packed 0x{:02x} background {} aspect {}",
            width,
            height,
            packed,
            background_index,
            aspect_ratio
        );
        Ok(screen)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width.into(), self.height.into())
    }

    /// Number of entries in the global color table, 0 if there is none.
    pub fn global_color_count(&self) -> usize {
        if self.has_global_table {
            1 << self.table_bits
        } else {
            0
        }
    }
}

/// The active color table, plus the same colors packed as RGB565 for line oriented displays.
///
/// A local color table replaces the whole palette; entries past the table's length read as black.
#[derive(Debug, Clone)]
pub struct Palette {
    table: SmallVec<[Rgb888; 256]>,
    packed: [u16; 256],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            table: SmallVec::new(),
            packed: [0; 256],
        }
    }
}

impl Palette {
    /// Reads `len` RGB triples and recomputes the packed form.
    pub fn read<S: SeekableStream>(
        &mut self,
        reader: &mut ByteReader<S>,
        len: usize,
    ) -> Result<(), DecodeError> {
        let len = len.min(256);
        let mut raw = [0u8; 3 * 256];
        reader.fill(&mut raw[..3 * len])?;

        self.table.clear();
        self.table.extend(
            raw[..3 * len]
                .chunks_exact(3)
                .map(|rgb| Rgb888::new(rgb[0], rgb[1], rgb[2])),
        );
        self.repack();
        log::trace!("color table with {} colors", len);
        Ok(())
    }

    fn repack(&mut self) {
        for (idx, packed) in self.packed.iter_mut().enumerate() {
            *packed = self.table.get(idx).map_or(0, |&color| pack_rgb565(color));
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn get(&self, index: u8) -> Rgb888 {
        self.table
            .get(index as usize)
            .copied()
            .unwrap_or(Rgb888::BLACK)
    }

    pub fn rgb565(&self, index: u8) -> u16 {
        self.packed[index as usize]
    }

    pub fn packed(&self) -> &[u16; 256] {
        &self.packed
    }
}

/// `rrrrrggg gggbbbbb`
pub fn pack_rgb565(color: Rgb888) -> u16 {
    (u16::from(color.r() & 0xf8) << 8)
        | (u16::from(color.g() & 0xfc) << 3)
        | u16::from(color.b() >> 3)
}

/// Image descriptor, everything after the `0x2C` separator up to the optional local color table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ImageDescriptor {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub interlaced: bool,
    pub has_local_table: bool,
    table_bits: u8,
}

impl ImageDescriptor {
    pub fn parser<S: SeekableStream>(reader: &mut ByteReader<S>) -> Result<Self, DecodeError> {
        let left = reader.take_u16_le()?;
        let top = reader.take_u16_le()?;
        let width = reader.take_u16_le()?;
        let height = reader.take_u16_le()?;
        let packed = reader.take_byte()?;

        let descriptor = Self {
            left,
            top,
            width,
            height,
            interlaced: (packed & INTERLACE_FLAG) != 0,
            has_local_table: (packed & COLOR_TABLE_FLAG) != 0,
            table_bits: (packed & 0x07) + 1,
        };
        log::trace!(
            "image at {},{} {}x{} packed 0x{:02x}",
            left,
            top,
            width,
            height,
            packed
        );
        Ok(descriptor)
    }

    pub fn local_color_count(&self) -> usize {
        if self.has_local_table {
            1 << self.table_bits
        } else {
            0
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.left.into(), self.top.into())
    }

    pub fn size(&self) -> Size {
        Size::new(self.width.into(), self.height.into())
    }

    pub fn bounding_box(&self) -> Rectangle {
        Rectangle::new(self.origin(), self.size())
    }

    pub fn num_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Graphic control extension. Applies to the next image block only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct GraphicsControl {
    pub disposal: DisposalMethod,
    pub user_input: bool,
    /// Delay time, in hundredths of a second
    pub delay_cs: u16,
    /// table index for a transparent color
    pub transparent: Option<u8>,
}

impl GraphicsControl {
    /// Parses the extension body following the `0xF9` label. `previous` is kept when the block
    /// has an unexpected size and gets skipped.
    pub fn parse<S: SeekableStream>(
        reader: &mut ByteReader<S>,
        previous: GraphicsControl,
    ) -> Result<Self, DecodeError> {
        let len = reader.take_byte()?;
        if len != 4 {
            log::warn!("bad graphic control extension, length {}", len);
            reader.seek_by(len as usize)?;
            reader.skip_sub_blocks()?;
            return Ok(previous);
        }

        let packed = reader.take_byte()?;
        let delay_cs = reader.take_u16_le()?;
        let transparent_idx = reader.take_byte()?;
        // block terminator
        reader.skip_sub_blocks()?;

        let control = Self {
            disposal: DisposalMethod::from_u8((packed >> 2) & 0x07),
            user_input: (packed & USER_INPUT_FLAG) != 0,
            delay_cs,
            transparent: ((packed & TRANSPARENT_FLAG) != 0).then_some(transparent_idx),
        };
        log::trace!("graphic control {:?}", control);
        Ok(control)
    }
}

/// What an application extension turned out to be.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ApplicationExtension {
    pub identifier: [u8; 11],
    /// NETSCAPE2.0 loop count, 0 meaning forever.
    pub loop_count: Option<u16>,
}

impl ApplicationExtension {
    pub fn parse<S: SeekableStream>(reader: &mut ByteReader<S>) -> Result<Self, DecodeError> {
        let len = reader.take_byte()? as usize;
        let mut buf = [0u8; 255];
        reader.fill(&mut buf[..len])?;

        let mut identifier = [0u8; 11];
        let n = len.min(identifier.len());
        identifier[..n].copy_from_slice(&buf[..n]);
        let netscape = &identifier == b"NETSCAPE2.0" || &identifier == b"ANIMEXTS1.0";

        let mut loop_count = None;
        loop {
            let len = reader.take_byte()? as usize;
            if len == 0 {
                break;
            }
            reader.fill(&mut buf[..len])?;
            if netscape && len == 3 && buf[0] == 1 {
                loop_count = Some(u16::from_le_bytes([buf[1], buf[2]]));
            }
        }

        log::debug!(
            "application extension {:?} loop count {:?}",
            core::str::from_utf8(&identifier[..n]).unwrap_or("?"),
            loop_count
        );
        Ok(Self {
            identifier,
            loop_count,
        })
    }
}

/// Plain text extension: a fixed header block followed by text sub-blocks. Rendering text is not
/// supported, so both are skipped.
pub fn eat_plain_text<S: SeekableStream>(reader: &mut ByteReader<S>) -> Result<(), DecodeError> {
    let len = reader.take_byte()?;
    reader.seek_by(len as usize)?;
    reader.skip_sub_blocks()
}

/// Comment extension: sub-blocks of text.
pub fn eat_comment<S: SeekableStream>(reader: &mut ByteReader<S>) -> Result<(), DecodeError> {
    let start = reader.get_offset();
    reader.skip_sub_blocks()?;
    log::trace!("skipped comment of {} bytes", reader.get_offset() - start);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::SliceStream;

    fn reader(data: &[u8]) -> ByteReader<SliceStream<'_>> {
        ByteReader::new(SliceStream::new(data))
    }

    #[test]
    fn header_versions() {
        assert_eq!(parse_header(&mut reader(b"GIF87a")), Ok(Version::V87a));
        assert_eq!(parse_header(&mut reader(b"GIF89a")), Ok(Version::V89a));
        assert_eq!(
            parse_header(&mut reader(b"\x89PNG\r\n")),
            Err(DecodeError::NotAGifFile)
        );
        assert_eq!(
            parse_header(&mut reader(b"GIF")),
            Err(DecodeError::StreamReadFailure)
        );
    }

    #[test]
    fn screen_descriptor_fields() {
        // 10x10, global table of 4 colors, resolution 1, background 3
        let data = [0x0a, 0x00, 0x0a, 0x00, 0x91, 0x03, 0x00];
        let screen = ScreenDescriptor::parser(&mut reader(&data), Version::V89a).unwrap();
        assert_eq!(screen.size(), Size::new(10, 10));
        assert!(screen.has_global_table);
        assert_eq!(screen.color_resolution, 1);
        assert!(!screen.sorted);
        assert_eq!(screen.global_color_count(), 4);
        assert_eq!(screen.background_index, 3);
    }

    #[test]
    fn palette_packs_rgb565() {
        let data = [0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0x08, 0x04, 0x08];
        let mut palette = Palette::default();
        palette.read(&mut reader(&data), 4).unwrap();
        assert_eq!(palette.len(), 4);
        assert_eq!(palette.get(1), Rgb888::new(0xff, 0, 0));
        assert_eq!(palette.rgb565(0), 0xffff);
        assert_eq!(palette.rgb565(1), 0xf800);
        assert_eq!(palette.rgb565(2), 0x001f);
        assert_eq!(palette.rgb565(3), 0x0821);
        assert_eq!(palette.get(200), Rgb888::BLACK);
        assert_eq!(palette.rgb565(200), 0);
        assert_eq!(palette.packed()[..4], [0xffff, 0xf800, 0x001f, 0x0821]);
    }

    #[test]
    fn local_table_replaces_palette() {
        let mut palette = Palette::default();
        palette
            .read(&mut reader(&[1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]), 4)
            .unwrap();
        palette.read(&mut reader(&[9, 9, 9, 8, 8, 8]), 2).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.get(0), Rgb888::new(9, 9, 9));
        assert_eq!(palette.get(2), Rgb888::BLACK);
    }

    #[test]
    fn image_descriptor_flags() {
        let data = [1, 0, 2, 0, 3, 0, 4, 0, 0xc2];
        let image = ImageDescriptor::parser(&mut reader(&data)).unwrap();
        assert_eq!(image.origin(), Point::new(1, 2));
        assert_eq!(image.size(), Size::new(3, 4));
        assert!(image.interlaced);
        assert!(image.has_local_table);
        assert_eq!(image.local_color_count(), 8);
        assert_eq!(image.num_pixels(), 12);
    }

    #[test]
    fn graphic_control_fields() {
        // disposal 2, transparent flag, 25cs, index 7
        let data = [4, 0x09, 25, 0, 7, 0];
        let control =
            GraphicsControl::parse(&mut reader(&data), GraphicsControl::default()).unwrap();
        assert_eq!(control.disposal, DisposalMethod::Background);
        assert_eq!(control.delay_cs, 25);
        assert_eq!(control.transparent, Some(7));
        assert!(!control.user_input);

        // no transparent flag, disposal 5 is out of range
        let data = [4, 0x14, 1, 1, 7, 0];
        let control =
            GraphicsControl::parse(&mut reader(&data), GraphicsControl::default()).unwrap();
        assert_eq!(control.disposal, DisposalMethod::None);
        assert_eq!(control.delay_cs, 0x0101);
        assert_eq!(control.transparent, None);
    }

    #[test]
    fn graphic_control_with_bad_length_is_skipped() {
        let data = [5, 0x08, 1, 0, 7, 9, 0, 0x2c];
        let previous = GraphicsControl {
            delay_cs: 3,
            ..Default::default()
        };
        let mut r = reader(&data);
        assert_eq!(GraphicsControl::parse(&mut r, previous).unwrap(), previous);
        assert_eq!(r.take_byte().unwrap(), 0x2c);
    }

    #[test]
    fn netscape_loop_count() {
        let mut data = vec![11];
        data.extend_from_slice(b"NETSCAPE2.0");
        data.extend_from_slice(&[3, 1, 5, 0, 0, 0x3b]);
        let mut r = reader(&data);
        let ext = ApplicationExtension::parse(&mut r).unwrap();
        assert_eq!(&ext.identifier, b"NETSCAPE2.0");
        assert_eq!(ext.loop_count, Some(5));
        assert_eq!(r.take_byte().unwrap(), 0x3b);
    }

    #[test]
    fn other_application_data_is_skipped() {
        let mut data = vec![11];
        data.extend_from_slice(b"XMP DataXMP");
        data.extend_from_slice(&[2, 1, 2, 1, 9, 0, 0x2c]);
        let mut r = reader(&data);
        let ext = ApplicationExtension::parse(&mut r).unwrap();
        assert_eq!(ext.loop_count, None);
        assert_eq!(r.take_byte().unwrap(), 0x2c);
    }

    #[test]
    fn plain_text_and_comment_are_skipped() {
        let mut data = vec![12];
        data.extend_from_slice(&[0; 12]);
        data.extend_from_slice(&[3, b'a', b'b', b'c', 0, 0x21]);
        let mut r = reader(&data);
        eat_plain_text(&mut r).unwrap();
        assert_eq!(r.take_byte().unwrap(), 0x21);

        let data = [2, b'h', b'i', 0, 0x2c];
        let mut r = reader(&data);
        eat_comment(&mut r).unwrap();
        assert_eq!(r.take_byte().unwrap(), 0x2c);
    }
}
