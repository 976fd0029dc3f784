/// File I/O for disk images

/// Decompression collaborators
pub mod decompress;
/// Open image files and scratch files
pub mod handle;
/// Format detection and geometry discovery
pub mod mounter;

pub use decompress::{Decompressor, NoDecompressor};
pub use handle::ImageHandle;
pub use mounter::{open_image, xfd_geometry, OpenedImage};
