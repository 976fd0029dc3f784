/// ATR container header
///
/// Layout of the 16 bytes:
/// - 0-1: magic `0x96 0x02`
/// - 2-3: image length in paragraphs, low word (little endian)
/// - 4-5: sector size (little endian)
/// - 6-7: image length in paragraphs, high word (little endian)
/// - 8-14: unused
/// - 15: write protect flag

use crate::format::constants::*;

/// Parsed ATR header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtrHeader {
    /// Image length (excluding header) in 16-byte paragraphs
    pub paragraphs: u32,
    /// Declared sector size
    pub sector_size: u16,
    /// Write protect flag
    pub write_protected: bool,
    /// Bytes 8-14, preserved so a header survives a parse/encode cycle
    pub reserved: [u8; 7],
}

impl AtrHeader {
    /// Create a header for an image of `data_length` bytes after the header
    pub fn new(sector_size: u16, data_length: u64) -> Self {
        AtrHeader {
            paragraphs: (data_length / ATR_PARAGRAPH_SIZE as u64) as u32,
            sector_size,
            write_protected: false,
            reserved: [0; 7],
        }
    }

    /// Check whether a raw header carries the ATR signature
    pub fn has_magic(raw: &[u8]) -> bool {
        raw.len() >= 2 && raw[0] == ATR_MAGIC1 && raw[1] == ATR_MAGIC2
    }

    /// Parse a header, returning `None` when the signature is missing
    pub fn parse(raw: &[u8; ATR_HEADER_SIZE]) -> Option<Self> {
        if !Self::has_magic(raw) {
            return None;
        }

        let paragraphs = u32::from_le_bytes([
            raw[ATR_SECCOUNT_LO_OFFSET],
            raw[ATR_SECCOUNT_HI_OFFSET],
            raw[ATR_HISECCOUNT_LO_OFFSET],
            raw[ATR_HISECCOUNT_HI_OFFSET],
        ]);
        let sector_size =
            u16::from_le_bytes([raw[ATR_SECSIZE_OFFSET], raw[ATR_SECSIZE_OFFSET + 1]]);

        let mut reserved = [0u8; 7];
        reserved.copy_from_slice(&raw[8..15]);

        Some(AtrHeader {
            paragraphs,
            sector_size,
            write_protected: raw[ATR_WRITE_PROTECT_OFFSET] != 0,
            reserved,
        })
    }

    /// Number of 128-byte units covered by the image
    ///
    /// For single density this is the sector count. Double density images
    /// need the boot layout fix-up applied by the mounter.
    pub fn single_density_sectors(&self) -> u32 {
        self.paragraphs >> 3
    }

    /// Encode the header to its on-disk form
    pub fn to_bytes(&self) -> [u8; ATR_HEADER_SIZE] {
        let mut raw = [0u8; ATR_HEADER_SIZE];
        let count = self.paragraphs.to_le_bytes();
        let size = self.sector_size.to_le_bytes();

        raw[0] = ATR_MAGIC1;
        raw[1] = ATR_MAGIC2;
        raw[ATR_SECCOUNT_LO_OFFSET] = count[0];
        raw[ATR_SECCOUNT_HI_OFFSET] = count[1];
        raw[ATR_SECSIZE_OFFSET] = size[0];
        raw[ATR_SECSIZE_OFFSET + 1] = size[1];
        raw[ATR_HISECCOUNT_LO_OFFSET] = count[2];
        raw[ATR_HISECCOUNT_HI_OFFSET] = count[3];
        raw[8..15].copy_from_slice(&self.reserved);
        raw[ATR_WRITE_PROTECT_OFFSET] = u8::from(self.write_protected);
        raw
    }
}
