/// Saving and restoring drive state
///
/// For each of the eight units the saved state holds:
/// - status: i32, little endian (0 off, 1 empty, 2 read-only, 3 read-write)
/// - filename: u16 length, little endian, followed by the path bytes
///
/// Only the mount state is saved; image contents live in their own files.

use crate::error::{Result, SioError};
use crate::format::constants::{MAX_DRIVES, MAX_FILENAME_LEN};
use crate::image::{DiskStore, DriveStatus};
use log::{debug, warn};
use std::io::{Read, Write};

/// Saved state of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedUnit {
    /// Status at save time
    pub status: DriveStatus,
    /// Filename at save time
    pub filename: String,
}

/// Write the mount state of all units
pub fn save_state<W: Write>(store: &DiskStore, writer: &mut W) -> Result<()> {
    for (_, unit) in store.units() {
        write_unit(
            writer,
            &SavedUnit {
                status: unit.status(),
                filename: unit.filename().to_string(),
            },
        )?;
    }
    Ok(())
}

/// Restore the mount state of all units
///
/// Units that were mounted are mounted again from their saved path. A unit
/// whose image can no longer be opened is left empty; this does not stop
/// the remaining units from being restored.
pub fn restore_state<R: Read>(store: &mut DiskStore, reader: &mut R) -> Result<()> {
    let saved = (0..MAX_DRIVES)
        .map(|_| read_unit(reader))
        .collect::<Result<Vec<_>>>()?;

    for (index, saved) in saved.into_iter().enumerate() {
        let unit = index + 1;

        match saved.status {
            status if status.has_media() && !saved.filename.is_empty() => {
                let read_only = saved.status == DriveStatus::ReadOnly;
                if let Err(e) = store.mount(unit, &saved.filename, read_only) {
                    warn!(
                        "D{}: could not restore {}: {}",
                        unit, saved.filename, e
                    );
                    store.set_unmounted(unit, DriveStatus::NoDisk)?;
                }
            }
            status if status.has_media() => store.set_unmounted(unit, DriveStatus::NoDisk)?,
            status => store.set_unmounted(unit, status)?,
        }
        debug!("D{}: restored as {}", unit, store.status(unit));
    }
    Ok(())
}

/// Encode one unit
pub fn write_unit<W: Write>(writer: &mut W, unit: &SavedUnit) -> Result<()> {
    let name = unit.filename.as_bytes();
    let len = u16::try_from(name.len())
        .ok()
        .filter(|&len| usize::from(len) < MAX_FILENAME_LEN)
        .ok_or(SioError::PathTooLong {
            len: name.len(),
            max: MAX_FILENAME_LEN - 1,
        })?;

    writer.write_all(&unit.status.code().to_le_bytes())?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(name)?;
    Ok(())
}

/// Decode one unit
pub fn read_unit<R: Read>(reader: &mut R) -> Result<SavedUnit> {
    let mut code = [0u8; 4];
    reader.read_exact(&mut code)?;
    let code = i32::from_le_bytes(code);
    let status = DriveStatus::from_code(code)
        .ok_or_else(|| SioError::invalid_state(format!("unknown drive status {}", code)))?;

    let mut len = [0u8; 2];
    reader.read_exact(&mut len)?;
    let len = usize::from(u16::from_le_bytes(len));
    if len >= MAX_FILENAME_LEN {
        return Err(SioError::invalid_state(format!(
            "filename length {} exceeds {}",
            len,
            MAX_FILENAME_LEN - 1
        )));
    }

    let mut name = vec![0u8; len];
    reader.read_exact(&mut name)?;
    let filename = String::from_utf8(name)
        .map_err(|_| SioError::invalid_state("filename is not valid UTF-8"))?;

    Ok(SavedUnit { status, filename })
}
