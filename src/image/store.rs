/// The set of drive units and their images

use crate::error::{Result, SioError};
use crate::format::constants::*;
use crate::format::AtrHeader;
use crate::image::geometry::{SectorLocation, BINARY_LOAD_LOCATION};
use crate::image::unit::{DriveStatus, DriveUnit, FormatGeometry, IoOutcome, Media};
use crate::image::{BootSectorLayout, Geometry};
use crate::io::{open_image, Decompressor, NoDecompressor};
use crate::status::{
    DriveReply, DriveStatusFlags, CONTROLLER_NO_DISK, CONTROLLER_READY, FORMAT_TIMEOUT,
};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Length of a PERCOM configuration block, excluding checksum
pub const PERCOM_BLOCK_SIZE: usize = 12;

/// Status frame reported for every unit while a binary load is running
const BINARY_LOAD_STATUS: [u8; 4] = [
    DriveStatusFlags::MOTOR_ON | DriveStatusFlags::WRITE_PROTECTED,
    CONTROLLER_READY,
    FORMAT_TIMEOUT,
    0,
];

/// Drive units 1-8 and the images mounted in them
///
/// Units are numbered from 1 as on the bus. All sector level operations
/// return the [`DriveReply`] the drive would send; they never fail with an
/// error, since protocol errors are reported to the computer.
pub struct DiskStore {
    units: [DriveUnit; MAX_DRIVES],
    decompressor: Box<dyn Decompressor>,
    binary_loading: bool,
}

impl Default for DiskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskStore {
    /// Create a store with all units switched off
    pub fn new() -> Self {
        DiskStore {
            units: std::array::from_fn(|_| DriveUnit::default()),
            decompressor: Box::new(NoDecompressor),
            binary_loading: false,
        }
    }

    /// Use `decompressor` to expand DCM and gzip images
    pub fn with_decompressor<D: Decompressor + 'static>(mut self, decompressor: D) -> Self {
        self.decompressor = Box::new(decompressor);
        self
    }

    fn index(unit: usize) -> Result<usize> {
        if (1..=MAX_DRIVES).contains(&unit) {
            Ok(unit - 1)
        } else {
            Err(SioError::InvalidUnit {
                unit,
                max: MAX_DRIVES,
            })
        }
    }

    /// Get a unit by its 1-based number
    pub fn unit(&self, unit: usize) -> Option<&DriveUnit> {
        unit.checked_sub(1).and_then(|i| self.units.get(i))
    }

    fn unit_mut(&mut self, unit: usize) -> Option<&mut DriveUnit> {
        unit.checked_sub(1).and_then(|i| self.units.get_mut(i))
    }

    /// Iterate over all units with their 1-based numbers
    pub fn units(&self) -> impl Iterator<Item = (usize, &DriveUnit)> {
        self.units.iter().enumerate().map(|(i, u)| (i + 1, u))
    }

    /// Lifecycle state of a unit (Off for unknown units)
    pub fn status(&self, unit: usize) -> DriveStatus {
        self.unit(unit).map_or(DriveStatus::Off, |u| u.status())
    }

    /// Filename of a unit ("Off" for unknown units)
    pub fn filename(&self, unit: usize) -> &str {
        self.unit(unit).map_or(crate::image::FILENAME_OFF, |u| u.filename())
    }

    /// Whether a unit has an image attached
    pub fn is_mounted(&self, unit: usize) -> bool {
        self.unit(unit).is_some_and(|u| u.is_mounted())
    }

    /// Outcome of the last sector operation on a unit
    pub fn last_io(&self, unit: usize) -> IoOutcome {
        self.unit(unit).map_or(IoOutcome::Unknown, |u| u.last_io())
    }

    /// Geometry of the image mounted on a unit
    pub fn geometry(&self, unit: usize) -> Option<Geometry> {
        self.unit(unit).and_then(|u| u.geometry())
    }

    /// Pending format geometry of a unit
    pub fn format_geometry(&self, unit: usize) -> Option<FormatGeometry> {
        self.unit(unit).map(|u| u.format_geometry())
    }

    /// Mount an image on a unit
    ///
    /// Any image already on the unit is dismounted first. Writable images
    /// are opened read-write unless `read_only` is set; if that fails the
    /// image is opened read-only instead. Compressed images and ATR images
    /// with the write protect flag are always read-only.
    pub fn mount<P: AsRef<Path>>(&mut self, unit: usize, path: P, read_only: bool) -> Result<()> {
        let index = Self::index(unit)?;
        let path = path.as_ref();
        // The name is persisted and reported as text
        let filename = path
            .to_str()
            .ok_or_else(|| SioError::InvalidPath(path.to_path_buf()))?
            .to_string();

        if filename.len() >= MAX_FILENAME_LEN {
            return Err(SioError::PathTooLong {
                len: filename.len(),
                max: MAX_FILENAME_LEN - 1,
            });
        }

        self.units[index].eject();

        let opened = match open_image(path, read_only, self.decompressor.as_mut()) {
            Ok(opened) => opened,
            Err(e) => {
                warn!("D{}: cannot mount {}: {}", unit, filename, e);
                return Err(e);
            }
        };

        let drive = &mut self.units[index];
        drive.status = if opened.read_only {
            DriveStatus::ReadOnly
        } else {
            DriveStatus::ReadWrite
        };
        drive.format_geometry = FormatGeometry {
            sector_size: opened.geometry.sector_size,
            sector_count: opened.geometry.sector_count,
        };
        drive.media = Some(Media {
            path: path.to_path_buf(),
            handle: opened.handle,
            geometry: opened.geometry,
            kind: opened.kind,
        });
        info!("D{}: mounted {} ({})", unit, filename, drive.status);
        drive.filename = filename;
        Ok(())
    }

    /// Remove the image from a unit
    ///
    /// Idempotent. Scratch files of compressed images are deleted.
    pub fn dismount(&mut self, unit: usize) -> Result<()> {
        let index = Self::index(unit)?;
        if self.units[index].is_mounted() {
            debug!("D{}: dismounting {}", unit, self.units[index].filename());
        }
        self.units[index].eject();
        Ok(())
    }

    /// Remove the images from all units
    pub fn dismount_all(&mut self) {
        for drive in self.units.iter_mut() {
            drive.eject();
        }
    }

    /// Switch a unit on without media
    pub fn enable(&mut self, unit: usize) -> Result<()> {
        let index = Self::index(unit)?;
        let drive = &mut self.units[index];
        if drive.status == DriveStatus::Off {
            drive.set_unmounted(DriveStatus::NoDisk);
        }
        Ok(())
    }

    /// Switch a unit off, dismounting its image
    pub fn disable(&mut self, unit: usize) -> Result<()> {
        let index = Self::index(unit)?;
        self.units[index].set_unmounted(DriveStatus::Off);
        Ok(())
    }

    /// Put a unit into an unmounted state, used when restoring saved state
    pub(crate) fn set_unmounted(&mut self, unit: usize, status: DriveStatus) -> Result<()> {
        let index = Self::index(unit)?;
        self.units[index].set_unmounted(status);
        Ok(())
    }

    /// Route every sector access to the start of the image
    ///
    /// Used while a program is being loaded directly from a file.
    pub fn set_binary_loading(&mut self, active: bool) {
        self.binary_loading = active;
    }

    /// Whether a binary load is in progress
    pub fn is_binary_loading(&self) -> bool {
        self.binary_loading
    }

    /// Locate a sector of a unit's image
    ///
    /// Units without media use standard single density addressing.
    pub fn locate(&self, unit: usize, sector: u16) -> SectorLocation {
        if self.binary_loading {
            return BINARY_LOAD_LOCATION;
        }
        self.geometry(unit)
            .unwrap_or_else(Geometry::single_density)
            .locate(sector)
    }

    /// Read a sector into `buffer`
    pub fn read_sector(&mut self, unit: usize, sector: u16, buffer: &mut [u8]) -> DriveReply {
        let binary_loading = self.binary_loading;
        let Some(drive) = self.unit_mut(unit) else {
            return DriveReply::Silent;
        };

        drive.last_io = IoOutcome::Failed;
        if drive.status == DriveStatus::Off {
            return DriveReply::Silent;
        }
        let Some(media) = drive.media.as_mut() else {
            return DriveReply::Nak;
        };
        if !media.geometry.contains(sector) {
            return DriveReply::Error;
        }

        let location = if binary_loading {
            BINARY_LOAD_LOCATION
        } else {
            media.geometry.locate(sector)
        };
        let Some(target) = buffer.get_mut(..location.size) else {
            return DriveReply::Error;
        };

        match media.handle.read_at(location.offset, target) {
            Ok(n) if n == location.size => {
                drive.last_io = IoOutcome::Succeeded;
                DriveReply::Complete
            }
            Ok(n) => {
                debug!("D{}: sector {} short read ({} bytes)", unit, sector, n);
                DriveReply::Error
            }
            Err(e) => {
                warn!("D{}: sector {} read failed: {}", unit, sector, e);
                DriveReply::Error
            }
        }
    }

    /// Write a sector from `data`
    pub fn write_sector(&mut self, unit: usize, sector: u16, data: &[u8]) -> DriveReply {
        let binary_loading = self.binary_loading;
        let Some(drive) = self.unit_mut(unit) else {
            return DriveReply::Silent;
        };

        drive.last_io = IoOutcome::Failed;
        if drive.status == DriveStatus::Off {
            return DriveReply::Silent;
        }
        let Some(media) = drive.media.as_mut() else {
            return DriveReply::Nak;
        };
        if drive.status != DriveStatus::ReadWrite || !media.geometry.contains(sector) {
            return DriveReply::Error;
        }

        let location = if binary_loading {
            BINARY_LOAD_LOCATION
        } else {
            media.geometry.locate(sector)
        };
        let Some(payload) = data.get(..location.size) else {
            return DriveReply::Error;
        };

        match media.handle.write_at(location.offset, payload) {
            Ok(()) => {
                drive.last_io = IoOutcome::Succeeded;
                DriveReply::Complete
            }
            Err(e) => {
                warn!("D{}: sector {} write failed: {}", unit, sector, e);
                DriveReply::Error
            }
        }
    }

    /// Build the four-byte status frame of a unit
    pub fn drive_status(&self, unit: usize) -> (DriveReply, [u8; 4]) {
        if self.binary_loading {
            return (DriveReply::Complete, BINARY_LOAD_STATUS);
        }
        let Some(drive) = self.unit(unit) else {
            return (DriveReply::Silent, [0; 4]);
        };
        if drive.status == DriveStatus::Off {
            return (DriveReply::Silent, [0; 4]);
        }

        let mut flags = DriveStatusFlags::new(DriveStatusFlags::MOTOR_ON);
        if drive.last_io == IoOutcome::Failed {
            flags.set(DriveStatusFlags::OPERATION_FAILED);
        }
        if drive.status == DriveStatus::ReadOnly {
            flags.set(DriveStatusFlags::WRITE_PROTECTED);
        }

        let controller = match drive.geometry() {
            Some(geometry) => {
                if geometry.is_double_density() {
                    flags.set(DriveStatusFlags::DOUBLE_DENSITY);
                }
                if geometry.sector_count == ENHANCED_SECTOR_COUNT {
                    flags.set(DriveStatusFlags::ENHANCED_DENSITY);
                }
                CONTROLLER_READY
            }
            None => CONTROLLER_NO_DISK,
        };

        (DriveReply::Complete, [flags.0, controller, FORMAT_TIMEOUT, 0])
    }

    /// Build the PERCOM configuration block of a unit
    ///
    /// Describes the mounted image, or the pending format geometry when the
    /// unit is empty.
    pub fn read_status_block(&self, unit: usize) -> (DriveReply, [u8; PERCOM_BLOCK_SIZE]) {
        let Some(drive) = self.unit(unit) else {
            return (DriveReply::Silent, [0; PERCOM_BLOCK_SIZE]);
        };
        if drive.status == DriveStatus::Off {
            return (DriveReply::Silent, [0; PERCOM_BLOCK_SIZE]);
        }

        let (sector_size, sector_count) = match drive.geometry() {
            Some(g) => (g.sector_size, g.sector_count),
            None => (
                drive.format_geometry.sector_size,
                drive.format_geometry.sector_count,
            ),
        };
        (DriveReply::Complete, percom_block(sector_size, sector_count))
    }

    /// Apply a PERCOM block to the pending format geometry
    ///
    /// The mounted image is not touched.
    pub fn write_status_block(&mut self, unit: usize, block: &[u8]) -> DriveReply {
        let Some(drive) = self.unit_mut(unit) else {
            return DriveReply::Silent;
        };
        if drive.status == DriveStatus::Off {
            return DriveReply::Silent;
        }
        if block.len() < 8 {
            return DriveReply::Error;
        }

        let size = u16::from_be_bytes([block[6], block[7]]);
        if is_valid_sector_size(size) {
            drive.format_geometry.sector_size = size;
        }

        let tracks = u32::from(block[0]);
        let per_track = u32::from(u16::from_be_bytes([block[2], block[3]]));
        let heads = u32::from(block[4]) + 1;
        let count = tracks * per_track * heads;
        drive.format_geometry.sector_count = if (1..=65535).contains(&count) {
            count
        } else {
            DEFAULT_SECTOR_COUNT
        };

        debug!(
            "D{}: format geometry set to {} x {}",
            unit, drive.format_geometry.sector_count, drive.format_geometry.sector_size
        );
        DriveReply::Complete
    }

    /// Format the disk in a unit
    ///
    /// The image file is rewritten as a blank disk of the given geometry,
    /// keeping its container type, and mounted again.
    pub fn format_disk(&mut self, unit: usize, sector_size: u16, sector_count: u32) -> DriveReply {
        let Some(drive) = self.unit_mut(unit) else {
            return DriveReply::Silent;
        };

        drive.last_io = IoOutcome::Failed;
        if drive.status == DriveStatus::Off {
            return DriveReply::Silent;
        }
        let Some(media) = drive.media.as_ref() else {
            return DriveReply::Nak;
        };
        if drive.status != DriveStatus::ReadWrite {
            return DriveReply::Error;
        }

        let path = media.path.clone();
        let with_header = media.geometry.header_size == ATR_HEADER_SIZE as u64;
        let boot_size =
            if sector_size == DD_SECTOR_SIZE && media.geometry.layout != BootSectorLayout::Logical {
                DD_SECTOR_SIZE
            } else {
                SD_SECTOR_SIZE
            };

        // Close the image so the file can be truncated
        drive.eject();

        if let Err(e) = write_blank_image(&path, with_header, sector_size, sector_count, boot_size)
        {
            warn!("D{}: format of {} failed: {}", unit, path.display(), e);
            return DriveReply::Error;
        }
        if self.mount(unit, &path, false).is_err() {
            return DriveReply::Error;
        }

        info!(
            "D{}: formatted {} as {} x {}",
            unit,
            path.display(),
            sector_count,
            sector_size
        );
        if let Some(drive) = self.unit_mut(unit) {
            drive.last_io = IoOutcome::Succeeded;
        }
        DriveReply::Complete
    }
}

/// Encode a geometry as a PERCOM block
///
/// Standard disks are described as 40 or 80 tracks on one or two sides;
/// anything else as a single track holding every sector.
pub fn percom_block(sector_size: u16, sector_count: u32) -> [u8; PERCOM_BLOCK_SIZE] {
    let mut per_track = sector_count;
    let mut heads = 1u32;
    let tracks: u8;

    if per_track % 40 == 0 {
        per_track /= 40;
        if per_track > 26 && per_track % 2 == 0 {
            heads = 2;
            per_track >>= 1;
            if per_track > 26 && per_track % 2 == 0 {
                tracks = 80;
                per_track >>= 1;
            } else {
                tracks = 40;
            }
        } else {
            tracks = 40;
        }
    } else {
        tracks = 1;
    }

    // A single track of more than 65535 sectors cannot be described
    let per_track = u16::try_from(per_track).unwrap_or(u16::MAX).to_be_bytes();
    let size = sector_size.to_be_bytes();
    [
        tracks,
        1, // step rate
        per_track[0],
        per_track[1],
        (heads - 1) as u8,
        if sector_size == SD_SECTOR_SIZE { 0 } else { 4 },
        size[0],
        size[1],
        1,   // drive online
        192, // transfer speed
        0,
        0,
    ]
}

/// Write an all-zero disk image
fn write_blank_image(
    path: &Path,
    with_header: bool,
    sector_size: u16,
    sector_count: u32,
    boot_size: u16,
) -> std::io::Result<()> {
    let boot_count = sector_count.min(BOOT_SECTOR_COUNT);
    let data_length = u64::from(boot_size) * u64::from(boot_count)
        + u64::from(sector_size) * u64::from(sector_count - boot_count);

    let mut writer = BufWriter::new(File::create(path)?);
    if with_header {
        writer.write_all(&AtrHeader::new(sector_size, data_length).to_bytes())?;
    }

    let blank = vec![0u8; sector_size.max(boot_size) as usize];
    for _ in 0..boot_count {
        writer.write_all(&blank[..boot_size as usize])?;
    }
    for _ in boot_count..sector_count {
        writer.write_all(&blank[..sector_size as usize])?;
    }
    writer.flush()
}
