/// Serial I/O bus protocol
///
/// The computer talks to a drive in frames:
/// 1. with the command line asserted it sends a five-byte command frame
/// 2. the drive acknowledges with 'A' (or 'N')
/// 3. for writes the computer sends a data frame, acknowledged with 'A'
/// 4. the drive sends 'C' or 'E', followed by the data frame for reads
///
/// [`SioSession`] is driven one byte at a time by the serial port side. It
/// never waits: after every call it reports how many scan lines the port has
/// to wait before raising the next serial-in or serial-out interrupt.

/// Frame checksum
pub mod checksum;
/// Command frames and command codes
pub mod command;

pub use checksum::{checksum, verify};
pub use command::{CommandFrame, DiskCommand, COMMAND_FRAME_SIZE};

use crate::format::constants::{ENHANCED_SECTOR_COUNT, SD_SECTOR_SIZE};
use crate::image::{DiskStore, DriveStatus, PERCOM_BLOCK_SIZE};
use crate::status::DriveReply;
use log::{debug, trace, warn};

/// Size of the data frame buffer: 256 bytes of payload, reply and checksum
pub const DATA_BUFFER_SIZE: usize = 256 + 3;

/// Where the session is in a frame exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferState {
    /// No transfer in progress
    #[default]
    Idle,
    /// Receiving a command frame
    CommandFrame,
    /// Command frame received, acknowledge pending
    StatusRead,
    /// Receiving a data frame from the computer
    WriteFrame,
    /// Sending a reply and data frame to the computer
    ReadFrame,
    /// Sending the reply to a data frame
    FinalStatus,
}

/// Serial timing, in scan lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SioTiming {
    /// Time to receive one byte from the drive
    pub serin_interval: u32,
    /// Time to send one byte to the drive
    pub serout_interval: u32,
    /// Drive reaction time before an acknowledge
    pub ack_interval: u32,
}

impl Default for SioTiming {
    fn default() -> Self {
        SioTiming {
            serin_interval: 8,
            serout_interval: 8,
            ack_interval: 36,
        }
    }
}

/// Delay directives for the serial port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusDelays {
    /// Raise serial-in after this many scan lines (a byte is ready)
    pub serial_in: Option<u32>,
    /// Raise serial-out after this many scan lines (ready for the next byte)
    pub serial_out: Option<u32>,
}

/// State of the serial bus protocol
///
/// One session serves all drive units, since only one unit is addressed by
/// each command frame.
#[derive(Debug, Clone)]
pub struct SioSession {
    command_frame: [u8; COMMAND_FRAME_SIZE + 1],
    command_index: usize,
    data_buffer: [u8; DATA_BUFFER_SIZE],
    data_index: usize,
    expected_bytes: usize,
    state: TransferState,
    timing: SioTiming,
    delays: BusDelays,
}

impl Default for SioSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SioSession {
    /// Create an idle session with standard timing
    pub fn new() -> Self {
        Self::with_timing(SioTiming::default())
    }

    /// Create an idle session with custom timing
    pub fn with_timing(timing: SioTiming) -> Self {
        SioSession {
            command_frame: [0; COMMAND_FRAME_SIZE + 1],
            command_index: 0,
            data_buffer: [0; DATA_BUFFER_SIZE],
            data_index: 0,
            expected_bytes: 0,
            state: TransferState::Idle,
            timing,
            delays: BusDelays::default(),
        }
    }

    /// Current transfer state
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Timing in use
    pub fn timing(&self) -> SioTiming {
        self.timing
    }

    /// Delay directives produced by the last call
    pub fn delays(&self) -> BusDelays {
        self.delays
    }

    /// Bytes still missing from the frame being received or sent
    pub fn remaining_bytes(&self) -> usize {
        match self.state {
            TransferState::CommandFrame => self.expected_bytes.saturating_sub(self.command_index),
            TransferState::WriteFrame | TransferState::ReadFrame | TransferState::FinalStatus => {
                self.expected_bytes.saturating_sub(self.data_index)
            }
            _ => 0,
        }
    }

    /// The command line changed
    ///
    /// Asserting it starts a new command frame. Releasing it aborts a
    /// command or write in progress, but not a reply the drive is still
    /// sending.
    pub fn set_command_line(&mut self, active: bool) {
        self.delays = BusDelays::default();
        if active {
            self.command_index = 0;
            self.data_index = 0;
            self.expected_bytes = COMMAND_FRAME_SIZE;
            self.state = TransferState::CommandFrame;
        } else {
            if !matches!(
                self.state,
                TransferState::StatusRead | TransferState::Idle | TransferState::ReadFrame
            ) {
                self.state = TransferState::Idle;
            }
            self.command_index = 0;
        }
    }

    /// A byte arrived from the computer
    pub fn put_byte(&mut self, store: &mut DiskStore, byte: u8) -> BusDelays {
        self.delays = BusDelays::default();

        match self.state {
            TransferState::CommandFrame => {
                if self.command_index < self.expected_bytes {
                    self.command_frame[self.command_index] = byte;
                    self.command_index += 1;
                    if self.command_index >= self.expected_bytes {
                        self.end_command_frame();
                    }
                } else {
                    self.state = TransferState::Idle;
                }
            }
            TransferState::WriteFrame => {
                if self.data_index < self.expected_bytes {
                    self.data_buffer[self.data_index] = byte;
                    self.data_index += 1;
                    if self.data_index >= self.expected_bytes {
                        self.end_write_frame(store);
                    }
                }
            }
            state => trace!("Ignoring byte {:02X} in state {:?}", byte, state),
        }

        self.delays.serial_out = Some(self.timing.serout_interval);
        self.delays
    }

    /// The computer reads the next byte from the drive
    ///
    /// Returns 0 when the drive has nothing to send.
    pub fn get_byte(&mut self, store: &mut DiskStore) -> u8 {
        self.delays = BusDelays::default();

        match self.state {
            TransferState::StatusRead => self.execute_command(store),
            TransferState::ReadFrame | TransferState::FinalStatus => {
                if self.data_index < self.expected_bytes {
                    let byte = self.data_buffer[self.data_index];
                    self.data_index += 1;
                    if self.data_index >= self.expected_bytes {
                        self.state = TransferState::Idle;
                    } else {
                        self.delays.serial_in = Some(self.timing.serin_interval);
                    }
                    byte
                } else {
                    warn!("Read past the end of a {:?} frame", self.state);
                    self.state = TransferState::Idle;
                    0
                }
            }
            _ => 0,
        }
    }

    fn acknowledge_delay(&self) -> u32 {
        self.timing.serin_interval + self.timing.ack_interval
    }

    fn frame(&self) -> Option<CommandFrame> {
        CommandFrame::from_bytes(&self.command_frame)
    }

    fn end_command_frame(&mut self) {
        match self.frame().and_then(|f| f.unit()) {
            Some(_) => {
                self.state = TransferState::StatusRead;
                self.delays.serial_in = Some(self.acknowledge_delay());
            }
            None => self.state = TransferState::Idle,
        }
    }

    fn end_write_frame(&mut self, store: &mut DiskStore) {
        let frame_len = self.expected_bytes;

        if verify(&self.data_buffer[..frame_len]) {
            let reply = self.write_back(store, frame_len - 1);
            if reply.is_silent() {
                self.state = TransferState::Idle;
                return;
            }
            self.data_buffer[0] = DriveReply::Ack.byte();
            self.data_buffer[1] = reply.byte();
            self.expected_bytes = 2;
        } else {
            debug!("Data frame checksum mismatch");
            self.data_buffer[0] = DriveReply::Error.byte();
            self.expected_bytes = 1;
        }

        self.data_index = 0;
        self.delays.serial_in = Some(self.acknowledge_delay());
        self.state = TransferState::FinalStatus;
    }

    /// Carry out the command whose data frame has just arrived
    fn write_back(&mut self, store: &mut DiskStore, payload_len: usize) -> DriveReply {
        let Some(frame) = self.frame() else {
            return DriveReply::Silent;
        };
        let Some(unit) = frame.unit() else {
            return DriveReply::Silent;
        };
        let payload = &self.data_buffer[..payload_len];

        match frame.disk_command() {
            DiskCommand::WriteStatusBlock => store.write_status_block(unit, payload),
            DiskCommand::WriteSector => store.write_sector(unit, frame.sector(), payload),
            _ => DriveReply::Error,
        }
    }

    /// Decode the command frame and return the acknowledge byte
    fn execute_command(&mut self, store: &mut DiskStore) -> u8 {
        let Some(frame) = self.frame() else {
            self.state = TransferState::Idle;
            return 0;
        };
        let Some(unit) = frame.unit() else {
            self.state = TransferState::Idle;
            return 0;
        };
        if store.status(unit) == DriveStatus::Off {
            trace!("D{}: off, ignoring {}", unit, frame);
            self.state = TransferState::Idle;
            return 0;
        }
        if !frame.checksum_ok() {
            debug!("D{}: command frame {} has a bad checksum", unit, frame);
        }

        let sector = frame.sector();
        let serin = self.timing.serin_interval;
        self.data_index = 0;

        match frame.disk_command() {
            DiskCommand::ReadSector => {
                let size = store.locate(unit, sector).size;
                let payload = &mut self.data_buffer[1..1 + size];
                payload.fill(0);
                let reply = store.read_sector(unit, sector, payload);
                self.start_read_frame(reply, size);
                // Give the OS time to set up its buffer before the reply
                self.delays.serial_in = Some(serin << 2);
            }
            DiskCommand::Status => {
                let (reply, status) = store.drive_status(unit);
                self.data_buffer[1..1 + status.len()].copy_from_slice(&status);
                self.start_read_frame(reply, status.len());
                self.delays.serial_in = Some(serin);
            }
            DiskCommand::ReadStatusBlock => {
                let (reply, block) = store.read_status_block(unit);
                self.data_buffer[1..1 + PERCOM_BLOCK_SIZE].copy_from_slice(&block);
                self.start_read_frame(reply, PERCOM_BLOCK_SIZE);
                self.delays.serial_in = Some(serin);
            }
            DiskCommand::WriteStatusBlock => {
                self.expected_bytes = PERCOM_BLOCK_SIZE + 1;
                self.state = TransferState::WriteFrame;
            }
            DiskCommand::WriteSector => {
                self.expected_bytes = store.locate(unit, sector).size + 1;
                self.state = TransferState::WriteFrame;
            }
            DiskCommand::Format | DiskCommand::FormatEnhanced => {
                let (size, count) = if frame.disk_command() == DiskCommand::FormatEnhanced {
                    (SD_SECTOR_SIZE, ENHANCED_SECTOR_COUNT)
                } else {
                    let pending = store.format_geometry(unit).unwrap_or_default();
                    (pending.sector_size, pending.sector_count)
                };
                let reply = store.format_disk(unit, size, count);
                // The data frame is the bad sector list: none
                let size = size as usize;
                self.data_buffer[1..1 + size].fill(0xFF);
                self.start_read_frame(reply, size);
                self.delays.serial_in = Some(serin << 3);
            }
            DiskCommand::Unknown(code) => {
                debug!("D{}: unknown command {:02X}", unit, code);
                self.state = TransferState::Idle;
                return DriveReply::Nak.byte();
            }
        }

        DriveReply::Ack.byte()
    }

    /// Queue `[reply, payload.., checksum]` for the computer to read
    fn start_read_frame(&mut self, reply: DriveReply, payload_len: usize) {
        self.data_buffer[0] = reply.byte();
        self.data_buffer[1 + payload_len] = checksum(&self.data_buffer[1..1 + payload_len]);
        self.data_index = 0;
        self.expected_bytes = payload_len + 2;
        self.state = TransferState::ReadFrame;
    }
}
