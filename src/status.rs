/// Drive replies and status register definitions
///
/// Based on the Atari 810/1050 drive protocol.

use std::fmt;

/// Single-byte reply a drive sends on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveReply {
    /// Nothing is sent (unit switched off)
    Silent,
    /// 'A' - command or data frame accepted
    Ack,
    /// 'C' - operation complete
    Complete,
    /// 'E' - operation failed
    Error,
    /// 'N' - command or data frame refused
    Nak,
}

impl DriveReply {
    /// Byte value on the bus (0 when silent)
    #[inline]
    pub fn byte(&self) -> u8 {
        match self {
            DriveReply::Silent => 0,
            DriveReply::Ack => b'A',
            DriveReply::Complete => b'C',
            DriveReply::Error => b'E',
            DriveReply::Nak => b'N',
        }
    }

    /// Decode a reply byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(DriveReply::Silent),
            b'A' => Some(DriveReply::Ack),
            b'C' => Some(DriveReply::Complete),
            b'E' => Some(DriveReply::Error),
            b'N' => Some(DriveReply::Nak),
            _ => None,
        }
    }

    /// Check if nothing is sent
    #[inline]
    pub fn is_silent(&self) -> bool {
        matches!(self, DriveReply::Silent)
    }
}

impl fmt::Display for DriveReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveReply::Silent => write!(f, "(none)"),
            other => write!(f, "'{}'", other.byte() as char),
        }
    }
}

/// First byte of the four-byte status frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriveStatusFlags(pub u8);

impl DriveStatusFlags {
    /// Invalid command frame received - Bit 0
    pub const COMMAND_ERROR: u8 = 0x01;

    /// Invalid data frame received - Bit 1
    pub const DATA_ERROR: u8 = 0x02;

    /// Last read/write operation failed - Bit 2
    pub const OPERATION_FAILED: u8 = 0x04;

    /// Disk is write protected - Bit 3
    pub const WRITE_PROTECTED: u8 = 0x08;

    /// Drive motor running - Bit 4
    pub const MOTOR_ON: u8 = 0x10;

    /// Double density (256-byte sectors) - Bit 5
    pub const DOUBLE_DENSITY: u8 = 0x20;

    /// Enhanced density (1040 sectors) - Bit 7
    pub const ENHANCED_DENSITY: u8 = 0x80;

    /// Create from a raw byte
    #[inline]
    pub fn new(value: u8) -> Self {
        DriveStatusFlags(value)
    }

    /// Set the given bits
    #[inline]
    pub fn set(&mut self, bits: u8) {
        self.0 |= bits;
    }

    /// Check if the last operation failed
    #[inline]
    pub fn operation_failed(&self) -> bool {
        (self.0 & Self::OPERATION_FAILED) != 0
    }

    /// Check if the write protect bit is set
    #[inline]
    pub fn write_protected(&self) -> bool {
        (self.0 & Self::WRITE_PROTECTED) != 0
    }

    /// Check if the motor bit is set
    #[inline]
    pub fn motor_on(&self) -> bool {
        (self.0 & Self::MOTOR_ON) != 0
    }

    /// Check if the double density bit is set
    #[inline]
    pub fn double_density(&self) -> bool {
        (self.0 & Self::DOUBLE_DENSITY) != 0
    }

    /// Check if the enhanced density bit is set
    #[inline]
    pub fn enhanced_density(&self) -> bool {
        (self.0 & Self::ENHANCED_DENSITY) != 0
    }
}

impl fmt::Display for DriveStatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if (self.0 & Self::COMMAND_ERROR) != 0 {
            flags.push("CMD");
        }
        if (self.0 & Self::DATA_ERROR) != 0 {
            flags.push("DATA");
        }
        if self.operation_failed() {
            flags.push("FAIL");
        }
        if self.write_protected() {
            flags.push("WP");
        }
        if self.motor_on() {
            flags.push("MOTOR");
        }
        if self.double_density() {
            flags.push("DD");
        }
        if self.enhanced_density() {
            flags.push("ED");
        }
        if flags.is_empty() {
            write!(f, "-")
        } else {
            write!(f, "{}", flags.join("|"))
        }
    }
}

/// Hardware status byte reported with media present (WD177x idle)
pub const CONTROLLER_READY: u8 = 0xFF;

/// Hardware status byte reported without media
pub const CONTROLLER_NO_DISK: u8 = 0x7F;

/// Format timeout reported in the third status byte
pub const FORMAT_TIMEOUT: u8 = 0x01;
