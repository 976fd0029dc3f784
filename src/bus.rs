/// Memory-mapped I/O plumbing between the CPU side and the serial bus
///
/// [`IoMap`] routes register accesses to the chips mapped into an address
/// range. [`SioPort`] ties the PIA command line, the serial data registers
/// and the drive store to one [`SioSession`].

use crate::image::DiskStore;
use crate::pia::Pia;
use crate::sio::{BusDelays, SioSession};
use log::trace;
use std::ops::RangeInclusive;

/// A chip with memory-mapped registers
pub trait Peripheral {
    /// Read the register at `addr`
    fn get_byte(&mut self, addr: u16) -> u8;

    /// Write the register at `addr`
    fn put_byte(&mut self, addr: u16, byte: u8);
}

/// Value read from an address nothing is mapped to
pub const OPEN_BUS: u8 = 0xFF;

/// Address decoder for memory-mapped peripherals
#[derive(Default)]
pub struct IoMap {
    regions: Vec<(RangeInclusive<u16>, Box<dyn Peripheral>)>,
}

impl IoMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a peripheral into an address range
    ///
    /// Where ranges overlap, the one mapped first wins.
    pub fn map(&mut self, range: RangeInclusive<u16>, peripheral: Box<dyn Peripheral>) {
        self.regions.push((range, peripheral));
    }

    /// Number of mapped regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether nothing is mapped
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    fn find(&mut self, addr: u16) -> Option<&mut Box<dyn Peripheral>> {
        self.regions
            .iter_mut()
            .find(|(range, _)| range.contains(&addr))
            .map(|(_, peripheral)| peripheral)
    }

    /// Read from whichever peripheral decodes `addr`
    pub fn get_byte(&mut self, addr: u16) -> u8 {
        match self.find(addr) {
            Some(peripheral) => peripheral.get_byte(addr),
            None => {
                trace!("Read from unmapped {:04X}", addr);
                OPEN_BUS
            }
        }
    }

    /// Write to whichever peripheral decodes `addr`
    pub fn put_byte(&mut self, addr: u16, byte: u8) {
        match self.find(addr) {
            Some(peripheral) => peripheral.put_byte(addr, byte),
            None => trace!("Write {:02X} to unmapped {:04X}", byte, addr),
        }
    }
}

/// Serial port with disk drives attached
///
/// PIA register writes go through [`Peripheral::put_byte`]; a change of the
/// command line reaches the session as soon as the register is written.
/// Serial data is exchanged with [`SioPort::serial_out`] and
/// [`SioPort::serial_in`].
pub struct SioPort {
    pia: Pia,
    session: SioSession,
    drives: DiskStore,
}

impl SioPort {
    /// Attach a drive store to a fresh PIA and session
    pub fn new(drives: DiskStore) -> Self {
        SioPort {
            pia: Pia::new(),
            session: SioSession::new(),
            drives,
        }
    }

    /// The PIA
    pub fn pia(&self) -> &Pia {
        &self.pia
    }

    /// The protocol session
    pub fn session(&self) -> &SioSession {
        &self.session
    }

    /// The attached drives
    pub fn drives(&self) -> &DiskStore {
        &self.drives
    }

    /// The attached drives, for mounting and persistence
    pub fn drives_mut(&mut self) -> &mut DiskStore {
        &mut self.drives
    }

    /// System reset: PIA outputs return to power-on levels, any transfer is dropped
    ///
    /// Mounted drives are kept.
    pub fn reset(&mut self) {
        self.pia.reset();
        self.session = SioSession::with_timing(self.session.timing());
    }

    /// The computer wrote a byte to the serial output register
    pub fn serial_out(&mut self, byte: u8) -> BusDelays {
        self.session.put_byte(&mut self.drives, byte)
    }

    /// The computer read the serial input register
    pub fn serial_in(&mut self) -> u8 {
        self.session.get_byte(&mut self.drives)
    }
}

impl Peripheral for SioPort {
    fn get_byte(&mut self, addr: u16) -> u8 {
        self.pia.get_byte(addr)
    }

    fn put_byte(&mut self, addr: u16, byte: u8) {
        if let Some(active) = self.pia.put_byte(addr, byte) {
            trace!("Command line {}", if active { "asserted" } else { "released" });
            self.session.set_command_line(active);
        }
    }
}
