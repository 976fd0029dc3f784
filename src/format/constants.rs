/// ATR/XFD format magic bytes and constants

/// First ATR signature byte (low byte of the 0x0296 "NICKATARI" checksum)
pub const ATR_MAGIC1: u8 = 0x96;

/// Second ATR signature byte
pub const ATR_MAGIC2: u8 = 0x02;

/// First byte of a gzip stream
pub const GZIP_MAGIC1: u8 = 0x1F;

/// Second byte of a gzip stream
pub const GZIP_MAGIC2: u8 = 0x8B;

/// DCM archive type byte for a single-file archive
pub const DCM_MAGIC_SINGLE: u8 = 0xF9;

/// DCM archive type byte for a multi-file archive
pub const DCM_MAGIC_MULTI: u8 = 0xFA;

/// Size of the ATR header
pub const ATR_HEADER_SIZE: usize = 16;

/// Offset of the low byte of the paragraph count
pub const ATR_SECCOUNT_LO_OFFSET: usize = 2;

/// Offset of the second byte of the paragraph count
pub const ATR_SECCOUNT_HI_OFFSET: usize = 3;

/// Offset of the little-endian sector size
pub const ATR_SECSIZE_OFFSET: usize = 4;

/// Offset of the third byte of the paragraph count
pub const ATR_HISECCOUNT_LO_OFFSET: usize = 6;

/// Offset of the high byte of the paragraph count
pub const ATR_HISECCOUNT_HI_OFFSET: usize = 7;

/// Offset of the write protect flag
pub const ATR_WRITE_PROTECT_OFFSET: usize = 15;

/// ATR lengths are stored in 16-byte paragraphs
pub const ATR_PARAGRAPH_SIZE: usize = 16;

/// Single density sector size
pub const SD_SECTOR_SIZE: u16 = 128;

/// Double density sector size
pub const DD_SECTOR_SIZE: u16 = 256;

/// Number of boot sectors at the start of every disk
pub const BOOT_SECTOR_COUNT: u32 = 3;

/// Bytes occupied by three 128-byte boot sectors
pub const BOOT_AREA_LOGICAL: u64 = 0x180;

/// Bytes occupied by three 256-byte boot sector slots
pub const BOOT_AREA_FULL: u64 = 0x300;

/// Start of the region that tells physical from SIO2PC boot sectors
pub const BOOT_PROBE_OFFSET: u64 = 0x190;

/// Length of the boot layout probe region (0x190..0x310)
pub const BOOT_PROBE_LENGTH: usize = 0x180;

/// Largest raw image still treated as single (or enhanced) density
pub const XFD_MAX_SD_LENGTH: u64 = 1040 * 128;

/// Sector count of an enhanced density (1050) disk
pub const ENHANCED_SECTOR_COUNT: u32 = 1040;

/// Sector count of a standard 810 disk
pub const DEFAULT_SECTOR_COUNT: u32 = 720;

/// Number of drive units on the bus
pub const MAX_DRIVES: usize = 8;

/// Longest accepted image path in bytes
pub const MAX_FILENAME_LEN: usize = 4096;

/// Check whether a sector size is one the drive can handle
#[inline]
pub fn is_valid_sector_size(size: u16) -> bool {
    size == SD_SECTOR_SIZE || size == DD_SECTOR_SIZE
}
