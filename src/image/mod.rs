/// Drive units, disk geometry and the disk image store

/// Geometry and sector addressing
pub mod geometry;
/// The set of drive units
pub mod store;
/// Drive unit state
pub mod unit;

pub use geometry::{BootSectorLayout, Geometry, SectorLocation, BINARY_LOAD_LOCATION};
pub use store::{percom_block, DiskStore, PERCOM_BLOCK_SIZE};
pub use unit::{DriveStatus, DriveUnit, FormatGeometry, IoOutcome, FILENAME_EMPTY, FILENAME_OFF};
