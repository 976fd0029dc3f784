/// Command frames and disk drive command codes

use crate::format::constants::MAX_DRIVES;
use crate::sio::checksum::checksum;
use std::fmt;

/// Length of a command frame including its checksum
pub const COMMAND_FRAME_SIZE: usize = 5;

/// Bus device id of drive unit 1 ('1'); units 2-8 follow
pub const DISK_DEVICE_BASE: u8 = 0x31;

/// Disk drive commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskCommand {
    /// 0x21 - format with the pending geometry
    Format,
    /// 0x22 - format enhanced density (1040 x 128)
    FormatEnhanced,
    /// 0x4E - read PERCOM configuration block
    ReadStatusBlock,
    /// 0x4F - write PERCOM configuration block
    WriteStatusBlock,
    /// 0x50, 0x57 and the XF551 high speed 0xD0, 0xD7 - write sector
    WriteSector,
    /// 0x52 and the XF551 high speed 0xD2 - read sector
    ReadSector,
    /// 0x53 - read drive status
    Status,
    /// Anything else
    Unknown(u8),
}

impl DiskCommand {
    /// Decode a command byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x21 => DiskCommand::Format,
            0x22 => DiskCommand::FormatEnhanced,
            0x4E => DiskCommand::ReadStatusBlock,
            0x4F => DiskCommand::WriteStatusBlock,
            0x50 | 0x57 | 0xD0 | 0xD7 => DiskCommand::WriteSector,
            0x52 | 0xD2 => DiskCommand::ReadSector,
            0x53 => DiskCommand::Status,
            other => DiskCommand::Unknown(other),
        }
    }
}

/// A received command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    /// Bus device id
    pub device: u8,
    /// Command byte
    pub command: u8,
    /// First auxiliary byte (sector number low byte)
    pub aux1: u8,
    /// Second auxiliary byte (sector number high byte)
    pub aux2: u8,
    /// Checksum as sent
    pub checksum: u8,
}

impl CommandFrame {
    /// Build a frame from its first five bytes
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        match raw {
            [device, command, aux1, aux2, checksum, ..] => Some(CommandFrame {
                device: *device,
                command: *command,
                aux1: *aux1,
                aux2: *aux2,
                checksum: *checksum,
            }),
            _ => None,
        }
    }

    /// Build a frame for a disk unit, computing the checksum
    pub fn new(unit: usize, command: u8, sector: u16) -> Self {
        let [aux1, aux2] = sector.to_le_bytes();
        let device = DISK_DEVICE_BASE.wrapping_add(unit.wrapping_sub(1) as u8);
        CommandFrame {
            device,
            command,
            aux1,
            aux2,
            checksum: checksum(&[device, command, aux1, aux2]),
        }
    }

    /// Encode to the five bytes sent on the bus
    pub fn to_bytes(&self) -> [u8; COMMAND_FRAME_SIZE] {
        [self.device, self.command, self.aux1, self.aux2, self.checksum]
    }

    /// Addressed disk unit (1-8), if the frame is for a disk drive
    pub fn unit(&self) -> Option<usize> {
        let unit = usize::from(self.device.wrapping_sub(DISK_DEVICE_BASE)) + 1;
        (self.device >= DISK_DEVICE_BASE && unit <= MAX_DRIVES).then_some(unit)
    }

    /// Sector number from the auxiliary bytes
    pub fn sector(&self) -> u16 {
        u16::from_le_bytes([self.aux1, self.aux2])
    }

    /// Decoded command
    pub fn disk_command(&self) -> DiskCommand {
        DiskCommand::from_byte(self.command)
    }

    /// Whether the checksum byte matches the frame
    pub fn checksum_ok(&self) -> bool {
        checksum(&[self.device, self.command, self.aux1, self.aux2]) == self.checksum
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X} {:02X} {:02X} {:02X} {:02X}",
            self.device, self.command, self.aux1, self.aux2, self.checksum
        )
    }
}
