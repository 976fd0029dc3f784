/// Disk image formats and constants

/// Format constants
pub mod constants;
/// ATR header codec
pub mod header;

pub use constants::*;
pub use header::AtrHeader;

/// Image container type, decided from the first bytes of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// DCM compressed archive
    Dcm,
    /// gzip compressed image (ATZ, XFZ, .atr.gz)
    Gzip,
    /// ATR image with 16-byte header
    Atr,
    /// Raw sector dump without header
    Xfd,
}

impl ImageKind {
    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            ImageKind::Dcm => "DCM",
            ImageKind::Gzip => "gzip",
            ImageKind::Atr => "ATR",
            ImageKind::Xfd => "XFD",
        }
    }

    /// Whether the image has to be expanded to a scratch file before use
    pub fn is_compressed(&self) -> bool {
        matches!(self, ImageKind::Dcm | ImageKind::Gzip)
    }
}

/// Detect the image kind from its leading bytes
pub fn detect_format(magic: &[u8]) -> ImageKind {
    match magic {
        [DCM_MAGIC_SINGLE | DCM_MAGIC_MULTI, ..] => ImageKind::Dcm,
        [GZIP_MAGIC1, GZIP_MAGIC2, ..] => ImageKind::Gzip,
        [ATR_MAGIC1, ATR_MAGIC2, ..] => ImageKind::Atr,
        _ => ImageKind::Xfd,
    }
}
