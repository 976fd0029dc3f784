/// Drive unit state

use crate::format::constants::*;
use crate::format::ImageKind;
use crate::image::Geometry;
use crate::io::ImageHandle;
use std::fmt;
use std::path::PathBuf;

/// Filename reported by a unit that is switched off
pub const FILENAME_OFF: &str = "Off";

/// Filename reported by a unit without media
pub const FILENAME_EMPTY: &str = "Empty";

/// Lifecycle state of a drive unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveStatus {
    /// Not connected; does not answer on the bus
    #[default]
    Off,
    /// Connected, no disk inserted
    NoDisk,
    /// Disk inserted, writes refused
    ReadOnly,
    /// Disk inserted and writable
    ReadWrite,
}

impl DriveStatus {
    /// Integer code used in saved state
    pub fn code(&self) -> i32 {
        match self {
            DriveStatus::Off => 0,
            DriveStatus::NoDisk => 1,
            DriveStatus::ReadOnly => 2,
            DriveStatus::ReadWrite => 3,
        }
    }

    /// Decode a saved state code
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(DriveStatus::Off),
            1 => Some(DriveStatus::NoDisk),
            2 => Some(DriveStatus::ReadOnly),
            3 => Some(DriveStatus::ReadWrite),
            _ => None,
        }
    }

    /// Whether a disk is inserted
    pub fn has_media(&self) -> bool {
        matches!(self, DriveStatus::ReadOnly | DriveStatus::ReadWrite)
    }
}

impl fmt::Display for DriveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriveStatus::Off => "off",
            DriveStatus::NoDisk => "no disk",
            DriveStatus::ReadOnly => "read-only",
            DriveStatus::ReadWrite => "read-write",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of the most recent sector operation on a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoOutcome {
    /// No operation has been attempted
    #[default]
    Unknown,
    /// The last operation failed
    Failed,
    /// The last operation succeeded
    Succeeded,
}

/// Geometry the next format command will produce
///
/// Set by the write status block (PERCOM) command. Independent of the
/// mounted image until a format actually happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatGeometry {
    /// Sector size, 128 or 256
    pub sector_size: u16,
    /// Number of sectors
    pub sector_count: u32,
}

impl Default for FormatGeometry {
    fn default() -> Self {
        FormatGeometry {
            sector_size: SD_SECTOR_SIZE,
            sector_count: DEFAULT_SECTOR_COUNT,
        }
    }
}

/// An inserted disk
#[derive(Debug)]
pub(crate) struct Media {
    pub(crate) path: PathBuf,
    pub(crate) handle: ImageHandle,
    pub(crate) geometry: Geometry,
    pub(crate) kind: ImageKind,
}

/// One of the eight drive units on the bus
#[derive(Debug)]
pub struct DriveUnit {
    pub(crate) status: DriveStatus,
    pub(crate) filename: String,
    pub(crate) media: Option<Media>,
    pub(crate) format_geometry: FormatGeometry,
    pub(crate) last_io: IoOutcome,
}

impl Default for DriveUnit {
    fn default() -> Self {
        DriveUnit {
            status: DriveStatus::Off,
            filename: FILENAME_OFF.to_string(),
            media: None,
            format_geometry: FormatGeometry::default(),
            last_io: IoOutcome::Unknown,
        }
    }
}

impl DriveUnit {
    /// Lifecycle state
    pub fn status(&self) -> DriveStatus {
        self.status
    }

    /// Mounted path, or "Off" / "Empty"
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Whether an image is attached
    pub fn is_mounted(&self) -> bool {
        self.media.is_some()
    }

    /// Geometry of the attached image
    pub fn geometry(&self) -> Option<Geometry> {
        self.media.as_ref().map(|m| m.geometry)
    }

    /// Container type of the attached image
    pub fn image_kind(&self) -> Option<ImageKind> {
        self.media.as_ref().map(|m| m.kind)
    }

    /// Scratch file holding the expanded data of a compressed image
    pub fn scratch_path(&self) -> Option<&std::path::Path> {
        self.media.as_ref().and_then(|m| m.handle.scratch_path())
    }

    /// Pending geometry for the next format
    pub fn format_geometry(&self) -> FormatGeometry {
        self.format_geometry
    }

    /// Outcome of the last sector operation
    pub fn last_io(&self) -> IoOutcome {
        self.last_io
    }

    /// Detach the image, keeping the unit connected
    ///
    /// Does nothing when no image is attached.
    pub(crate) fn eject(&mut self) {
        if self.media.take().is_some() {
            self.status = DriveStatus::NoDisk;
            self.filename = FILENAME_EMPTY.to_string();
        }
    }

    /// Set an unmounted state (Off or NoDisk) with its sentinel filename
    pub(crate) fn set_unmounted(&mut self, status: DriveStatus) {
        self.media = None;
        self.status = status;
        self.filename = match status {
            DriveStatus::Off => FILENAME_OFF,
            _ => FILENAME_EMPTY,
        }
        .to_string();
    }
}
