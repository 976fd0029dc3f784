/// Image format detection and geometry discovery
///
/// Opening an image goes through three steps:
/// 1. open the file, falling back to read-only access
/// 2. expand DCM and gzip images into a scratch file
/// 3. derive the geometry from the ATR header, or from the file length for
///    raw XFD images

use crate::error::{Result, SioError};
use crate::format::constants::*;
use crate::format::{detect_format, AtrHeader, ImageKind};
use crate::image::{BootSectorLayout, Geometry};
use crate::io::decompress::Decompressor;
use crate::io::handle::ImageHandle;
use log::{debug, info};
use std::path::Path;

/// An opened image ready to be attached to a drive unit
#[derive(Debug)]
pub struct OpenedImage {
    /// The open file (possibly a scratch file)
    pub handle: ImageHandle,
    /// Detected geometry
    pub geometry: Geometry,
    /// Container type of the original file
    pub kind: ImageKind,
    /// Whether writes must be refused
    pub read_only: bool,
}

/// Open an image file and detect its geometry
pub fn open_image(
    path: &Path,
    read_only: bool,
    decompressor: &mut dyn Decompressor,
) -> Result<OpenedImage> {
    let (mut handle, mut read_only) = open_with_fallback(path, read_only)?;
    let mut header = read_header(&mut handle)?;
    let kind = detect_format(&header);

    match kind {
        ImageKind::Dcm => {
            let mut scratch = ImageHandle::scratch()?;
            decompressor.expand_dcm(handle.rewound()?, scratch.rewound()?)?;
            handle = scratch;
            header = read_header(&mut handle)?;
            read_only = true;
        }
        ImageKind::Gzip => {
            drop(handle);
            let mut scratch = ImageHandle::scratch()?;
            decompressor.expand_gzip(path, scratch.rewound()?)?;
            handle = scratch;
            header = read_header(&mut handle)?;
            read_only = true;
        }
        ImageKind::Atr | ImageKind::Xfd => {}
    }

    // The expanded data decides the layout, whatever the original container was
    let geometry = match AtrHeader::parse(&header) {
        Some(atr) => {
            if atr.write_protected {
                read_only = true;
            }
            atr_geometry(&mut handle, &atr)?
        }
        None => xfd_geometry(handle.len()?),
    };

    let length = handle.len()?;
    if length < geometry.image_length() {
        debug!(
            "{} is {} bytes, {} expected; missing sectors read as errors",
            path.display(),
            length,
            geometry.image_length()
        );
    }

    info!(
        "Opened {} image {}: {}{}",
        kind.name(),
        path.display(),
        geometry,
        if read_only { ", read-only" } else { "" }
    );

    Ok(OpenedImage {
        handle,
        geometry,
        kind,
        read_only,
    })
}

/// Open for writing unless told otherwise, falling back to read-only
fn open_with_fallback(path: &Path, read_only: bool) -> Result<(ImageHandle, bool)> {
    if !read_only {
        match ImageHandle::open(path, true) {
            Ok(handle) => return Ok((handle, false)),
            Err(e) => debug!("{} not writable ({}), retrying read-only", path.display(), e),
        }
    }
    Ok((ImageHandle::open(path, false)?, true))
}

fn read_header(handle: &mut ImageHandle) -> Result<[u8; ATR_HEADER_SIZE]> {
    let mut header = [0u8; ATR_HEADER_SIZE];
    let read = handle.read_at(0, &mut header)?;
    if read != ATR_HEADER_SIZE {
        return Err(SioError::TruncatedHeader {
            read,
            expected: ATR_HEADER_SIZE,
        });
    }
    Ok(header)
}

/// Geometry of an ATR image
///
/// The header stores the data length, not the sector count. For double
/// density the length has to be reconciled with how the boot sectors were
/// stored:
/// - an odd number of 128-byte units means packed (logical) boot sectors
/// - an even number means 256-byte boot slots, which are physical if any
///   byte in 0x190..0x310 is set, and SIO2PC style otherwise
fn atr_geometry(handle: &mut ImageHandle, header: &AtrHeader) -> Result<Geometry> {
    if !is_valid_sector_size(header.sector_size) {
        return Err(SioError::InvalidSectorSize(header.sector_size));
    }

    let mut sector_count = header.single_density_sectors();
    let mut layout = BootSectorLayout::Logical;

    if header.sector_size == DD_SECTOR_SIZE {
        if sector_count & 1 != 0 {
            sector_count += BOOT_SECTOR_COUNT;
        } else {
            let mut probe = [0u8; BOOT_PROBE_LENGTH];
            if handle.read_at(BOOT_PROBE_OFFSET, &mut probe)? != BOOT_PROBE_LENGTH {
                return Err(SioError::truncated(
                    BOOT_PROBE_OFFSET,
                    "boot sector layout probe",
                ));
            }
            layout = boot_layout_from_probe(&probe);
        }
        sector_count >>= 1;
    }

    Ok(Geometry {
        header_size: ATR_HEADER_SIZE as u64,
        sector_size: header.sector_size,
        sector_count,
        layout,
    })
}

/// Tell physical from SIO2PC boot sectors by the padding region
pub fn boot_layout_from_probe(probe: &[u8]) -> BootSectorLayout {
    if probe.iter().any(|&b| b != 0) {
        BootSectorLayout::Physical
    } else {
        BootSectorLayout::Sio2Pc
    }
}

/// Geometry of a raw image, inferred from its length alone
pub fn xfd_geometry(length: u64) -> Geometry {
    if length <= XFD_MAX_SD_LENGTH {
        return Geometry {
            header_size: 0,
            sector_size: SD_SECTOR_SIZE,
            sector_count: (length >> 7) as u32,
            layout: BootSectorLayout::Logical,
        };
    }

    let (sector_count, layout) = if length & 0xFF == 0 {
        ((length >> 8) as u32, BootSectorLayout::Physical)
    } else {
        (((length + BOOT_AREA_LOGICAL) >> 8) as u32, BootSectorLayout::Logical)
    };

    Geometry {
        header_size: 0,
        sector_size: DD_SECTOR_SIZE,
        sector_count,
        layout,
    }
}
