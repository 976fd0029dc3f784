/// PIA (6520) port controller
///
/// Only the parts the serial bus depends on are modelled: the port and
/// control registers, and the CB2 output on PBCTL bit 3 which drives the
/// SIO command line (low = asserted).

/// Port A data / direction register
pub const PORTA: u16 = 0x00;
/// Port B data / direction register
pub const PORTB: u16 = 0x01;
/// Port A control register
pub const PACTL: u16 = 0x02;
/// Port B control register
pub const PBCTL: u16 = 0x03;

/// Base address of the PIA on the 400/800/XL/XE
pub const PIA_BASE: u16 = 0xD300;

/// Control register bit selecting data (set) or direction (clear) access
const CTL_DATA_SELECT: u8 = 0x04;

/// PBCTL bit driving the command line; clear means asserted
const CTL_COMMAND_LINE: u8 = 0x08;

/// Bits of a control register that can be read back
const CTL_READ_MASK: u8 = 0x3F;

/// PIA register file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pia {
    pactl: u8,
    pbctl: u8,
    porta: u8,
    portb: u8,
    porta_mask: u8,
    portb_mask: u8,
    port_input: [u8; 2],
}

impl Default for Pia {
    fn default() -> Self {
        Self::new()
    }
}

impl Pia {
    /// Power-on state
    pub fn new() -> Self {
        Pia {
            pactl: 0x3F,
            pbctl: 0x3F,
            porta: 0xFF,
            portb: 0xFF,
            porta_mask: 0xFF,
            portb_mask: 0xFF,
            port_input: [0xFF; 2],
        }
    }

    /// Reset the output registers
    pub fn reset(&mut self) {
        self.porta = 0xFF;
        self.portb = 0xFF;
    }

    /// Set the levels driven onto port A (0) or port B (1) from outside
    pub fn set_input(&mut self, port: usize, value: u8) {
        if let Some(input) = self.port_input.get_mut(port) {
            *input = value;
        }
    }

    /// Whether the SIO command line is currently asserted
    pub fn command_line_active(&self) -> bool {
        self.pbctl & CTL_COMMAND_LINE == 0
    }

    /// Read a register; only the low two address bits are decoded
    pub fn get_byte(&self, addr: u16) -> u8 {
        match addr & 0x03 {
            PACTL => self.pactl & CTL_READ_MASK,
            PBCTL => self.pbctl & CTL_READ_MASK,
            PORTA => {
                if self.pactl & CTL_DATA_SELECT == 0 {
                    !self.porta_mask
                } else {
                    self.port_input[0] & (self.porta | self.porta_mask)
                }
            }
            _ => {
                if self.pbctl & CTL_DATA_SELECT == 0 {
                    !self.portb_mask
                } else {
                    self.port_input[1] & (self.portb | self.portb_mask)
                }
            }
        }
    }

    /// Write a register
    ///
    /// Returns the new command line state when the write toggled it.
    pub fn put_byte(&mut self, addr: u16, byte: u8) -> Option<bool> {
        match addr & 0x03 {
            PACTL => self.pactl = byte,
            PBCTL => {
                let changed = (self.pbctl ^ byte) & CTL_COMMAND_LINE != 0;
                self.pbctl = byte;
                if changed {
                    return Some(self.command_line_active());
                }
            }
            PORTA => {
                if self.pactl & CTL_DATA_SELECT == 0 {
                    self.porta_mask = !byte;
                } else {
                    self.porta = byte;
                }
            }
            _ => {
                if self.pbctl & CTL_DATA_SELECT == 0 {
                    self.portb_mask = !byte;
                } else {
                    self.portb = byte;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_edges() {
        let mut pia = Pia::new();
        assert!(!pia.command_line_active());

        assert_eq!(pia.put_byte(PIA_BASE + PBCTL, 0x34), Some(true));
        assert!(pia.command_line_active());
        // Same level again is not an edge
        assert_eq!(pia.put_byte(PIA_BASE + PBCTL, 0x34), None);
        assert_eq!(pia.put_byte(PIA_BASE + PBCTL, 0x3C), Some(false));
        assert_eq!(pia.put_byte(PIA_BASE + PACTL, 0x30), None);
    }

    #[test]
    fn test_direction_and_data_registers() {
        let mut pia = Pia::new();
        // Direction access: PACTL bit 2 clear
        pia.put_byte(PACTL, 0x38);
        pia.put_byte(PORTA, 0xF0);
        assert_eq!(pia.get_byte(PORTA), 0xF0);

        // Data access: outputs on the high nibble, inputs on the low one
        pia.put_byte(PACTL, 0x3C);
        pia.put_byte(PORTA, 0x5A);
        pia.set_input(0, 0xFE);
        assert_eq!(pia.get_byte(PORTA), 0x5E);
        assert_eq!(pia.get_byte(PACTL), 0x3C);
    }

    #[test]
    fn test_control_read_mask() {
        let mut pia = Pia::new();
        pia.put_byte(PBCTL, 0xFC);
        assert_eq!(pia.get_byte(PBCTL), 0x3C);
    }
}
