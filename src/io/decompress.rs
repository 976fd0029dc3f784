/// Decompression collaborators for compressed disk images
///
/// DCM archives and gzip images are never used in place. The mounter expands
/// them into a scratch file through a [`Decompressor`] and mounts the
/// result read-only.

use crate::error::{Result, SioError};
use std::io::{Read, Write};
use std::path::Path;

/// Expands compressed images into plain ATR/XFD data
pub trait Decompressor {
    /// Expand a DCM archive read from `source` into an ATR image
    fn expand_dcm(&mut self, source: &mut dyn Read, target: &mut dyn Write) -> Result<()>;

    /// Expand the gzip file at `path` into the image it contains
    fn expand_gzip(&mut self, path: &Path, target: &mut dyn Write) -> Result<()>;
}

/// Decompressor that rejects every compressed image
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDecompressor;

impl Decompressor for NoDecompressor {
    fn expand_dcm(&mut self, _source: &mut dyn Read, _target: &mut dyn Write) -> Result<()> {
        Err(SioError::unsupported("DCM images need a decompressor"))
    }

    fn expand_gzip(&mut self, path: &Path, _target: &mut dyn Write) -> Result<()> {
        Err(SioError::unsupported(format!(
            "gzip image {} needs a decompressor",
            path.display()
        )))
    }
}
