use core::fmt;

/// Known GIF block labels.
///
/// Note that the block uniquely specifies the layout of bytes that follow and how they are
/// framed. For example, the header always has a fixed length but is followed by a variable amount
/// of additional data. An image descriptor may be followed by a local color table depending on
/// information read in it. Therefore, it doesn't make sense to continue parsing after encountering
/// an unknown block as the semantics of following bytes are unclear.
///
/// The extension block provides a common framing for an arbitrary amount of application specific
/// data which may be ignored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Block {
    /// Image block.
    Image = 0x2C,
    /// Extension block.
    Extension = 0x21,
    /// Image trailer.
    Trailer = 0x3B,
}

impl Block {
    /// Try to parse from u8. The trailer is deliberately not matched here: anything that is not
    /// an image or an extension ends the current pass over the file.
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            0x2C => Some(Block::Image),
            0x21 => Some(Block::Extension),
            _ => None,
        }
    }
}

/// Known GIF Extension labels.
///
/// Only the graphics control extension affects decoding; the others are recognised so that their
/// sub-block chains can be skipped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtensionLabel {
    /// Graphics control extension.
    Graphics = 0xf9,
    /// Application extension.
    App = 0xff,
    /// Text extension.
    Text = 0x01,
    /// Comment extension
    Comment = 0xfe,
}

impl ExtensionLabel {
    pub fn from_u8(n: u8) -> Result<Self, DecodeError> {
        match n {
            0xf9 => Ok(ExtensionLabel::Graphics),
            0xff => Ok(ExtensionLabel::App),
            0x01 => Ok(ExtensionLabel::Text),
            0xfe => Ok(ExtensionLabel::Comment),
            _ => Err(DecodeError::UnknownExtensionLabel(n)),
        }
    }
}

/// Process for displaying next image in the file
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DisposalMethod {
    /// No disposal specified.
    #[default]
    None = 0,
    /// Leave the graphic in place.
    Leave = 1,
    /// Restore the area to the background color.
    Background = 2,
    /// Restore the area to what it was before the graphic was drawn.
    Restore = 3,
}

impl DisposalMethod {
    /// Values above 3 are not defined by GIF89a; they are coerced to `None`.
    pub fn from_u8(n: u8) -> Self {
        match n {
            0 => DisposalMethod::None,
            1 => DisposalMethod::Leave,
            2 => DisposalMethod::Background,
            3 => DisposalMethod::Restore,
            other => {
                log::warn!("invalid disposal value {}, using none", other);
                DisposalMethod::None
            }
        }
    }

    /// Whether a screen clear is needed before the next frame is drawn.
    pub fn clears_screen(self) -> bool {
        matches!(self, DisposalMethod::Background | DisposalMethod::Restore)
    }
}

/// Non-fatal outcome of a decode step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameStatus {
    /// One image block was decoded and emitted.
    Decoded,
    /// The pass over the file ended; the decoder rewound to the first frame.
    DoneParsing,
    /// Frame pacing is active and the previous frame's delay has not elapsed yet.
    Waiting,
}

/// Errors that emerge when decoding a gif stream
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DecodeError {
    /// The stream does not start with `GIF87a` or `GIF89a`.
    NotAGifFile,
    /// A block was expected but the byte is neither a block introducer nor the `0x3B` trailer.
    /// The decoder only logs it and starts the next pass, so animations with padding after the
    /// last image keep looping.
    MalformedTerminator(u8),
    /// Extension introducer followed by an unknown label. The stream position is left in the
    /// middle of the extension; decoding has to restart from offset 0.
    UnknownExtensionLabel(u8),
    /// The byte stream ran dry or failed while a structure was being read.
    StreamReadFailure,
    /// The LZW data referenced a code that is not in the dictionary.
    LzwCorruptStream,
    /// The LZW minimum code size is outside what the decoder supports.
    InvalidCodeSize(u8),
    /// Seeking to the given offset failed.
    Seek(usize),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::NotAGifFile => write!(f, "not a GIF file"),
            DecodeError::MalformedTerminator(byte) => {
                write!(f, "bad GIF file format, terminator byte 0x{:02x}", byte)
            }
            DecodeError::UnknownExtensionLabel(label) => {
                write!(f, "unknown extension label 0x{:02x}", label)
            }
            DecodeError::StreamReadFailure => write!(f, "read error or end of stream"),
            DecodeError::LzwCorruptStream => write!(f, "LZW data references an undefined code"),
            DecodeError::InvalidCodeSize(size) => {
                write!(f, "unsupported LZW minimum code size {}", size)
            }
            DecodeError::Seek(offset) => write!(f, "could not seek to offset {}", offset),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for DecodeError {}
