/// Disk geometry and sector addressing

use crate::format::constants::*;
use std::fmt;

/// How the three boot sectors are stored in a double density image
///
/// Boot sectors are always 128 bytes as seen by the computer, but image
/// tools disagreed about how to store them on a 256-byte-sector disk:
/// - `Logical`: packed, 3 * 128 bytes
/// - `Physical`: one 256-byte slot each, data in the first half
/// - `Sio2Pc`: 3 * 128 bytes of data followed by 3 * 128 unused bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootSectorLayout {
    /// Packed 128-byte boot sectors
    #[default]
    Logical,
    /// Boot sectors padded to 256 bytes each
    Physical,
    /// Packed boot sectors followed by 384 bytes of padding
    Sio2Pc,
}

impl fmt::Display for BootSectorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootSectorLayout::Logical => write!(f, "logical"),
            BootSectorLayout::Physical => write!(f, "physical"),
            BootSectorLayout::Sio2Pc => write!(f, "SIO2PC"),
        }
    }
}

/// Position and length of a sector inside an image file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorLocation {
    /// Byte offset from the start of the file
    pub offset: u64,
    /// Sector length in bytes
    pub size: usize,
}

/// Location used for every sector while a binary load is in progress
pub const BINARY_LOAD_LOCATION: SectorLocation = SectorLocation {
    offset: 0,
    size: SD_SECTOR_SIZE as usize,
};

/// Geometry of a mounted image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Bytes preceding sector 1 (0 for XFD, 16 for ATR)
    pub header_size: u64,
    /// Sector size for sectors 4 and up
    pub sector_size: u16,
    /// Number of addressable sectors
    pub sector_count: u32,
    /// Boot sector storage variant
    pub layout: BootSectorLayout,
}

impl Geometry {
    /// Standard 810 single density disk, 720 * 128 bytes, no header
    pub fn single_density() -> Self {
        Geometry {
            header_size: 0,
            sector_size: SD_SECTOR_SIZE,
            sector_count: DEFAULT_SECTOR_COUNT,
            layout: BootSectorLayout::Logical,
        }
    }

    /// Whether sectors 4 and up are 256 bytes
    pub fn is_double_density(&self) -> bool {
        self.sector_size == DD_SECTOR_SIZE
    }

    /// Whether `sector` can be addressed on this disk
    pub fn contains(&self, sector: u16) -> bool {
        sector >= 1 && u32::from(sector) <= self.sector_count
    }

    /// Locate a sector in the image file
    ///
    /// `sector` is 1-based and is not range checked here.
    pub fn locate(&self, sector: u16) -> SectorLocation {
        let sector = u64::from(sector);

        if sector < 4 {
            let slot = match self.layout {
                BootSectorLayout::Physical => u64::from(DD_SECTOR_SIZE),
                _ => u64::from(SD_SECTOR_SIZE),
            };
            SectorLocation {
                offset: self.header_size + sector.saturating_sub(1) * slot,
                size: SD_SECTOR_SIZE as usize,
            }
        } else {
            let boot_area = match self.layout {
                BootSectorLayout::Logical => BOOT_AREA_LOGICAL,
                _ => BOOT_AREA_FULL,
            };
            let size = u64::from(self.sector_size);
            SectorLocation {
                offset: self.header_size + boot_area + (sector - 4) * size,
                size: self.sector_size as usize,
            }
        }
    }

    /// Total image length implied by the geometry, header included
    pub fn image_length(&self) -> u64 {
        if self.sector_count == 0 {
            return self.header_size;
        }
        let last = self.locate(self.sector_count.min(u32::from(u16::MAX)) as u16);
        last.offset + last.size as u64
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sectors of {} bytes ({} boot sectors, {}-byte header)",
            self.sector_count, self.sector_size, self.layout, self.header_size
        )
    }
}
