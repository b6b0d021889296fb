//! HD44780 4-bit protocol over a shift register.
//!
//! The controller's data lines D7..D4 are wired to the register outputs Q7..Q4, `E` to Q3 and
//! `RS` to Q1. Each byte going to the controller is split in two nibbles, high nibble first,
//! and each nibble takes two register loads: one with `E` high and one with `E` low, so the
//! controller latches it on the falling edge.

use crate::{LcdError, LcdResult};
use log::trace;

/// Enable line (latch pulse).
pub const LCD_ENABLE: u8 = 0x08;
/// Register select line. Low for commands, high for data.
pub const LCD_REG_SEL: u8 = 0x02;

const LCD_SEND_COMMAND: u8 = 0x00;
const LCD_SEND_DATA: u8 = LCD_REG_SEL;

/// Wire bytes needed for a single command or data byte.
pub const ENCODED_LEN: usize = 4;

/// Cold-start synchronization command, seen by an 8-bit controller as "function set, 8-bit".
pub const SET_FUNC_8: u8 = 0x03;
/// Switches a synchronized controller to the 4-bit interface.
pub const SET_FUNC_4: u8 = 0x02;

fn encode(value: u8, rs: u8) -> [u8; ENCODED_LEN] {
    let high = (value & 0xF0) | rs;
    let low = (value << 4) | rs;
    [high | LCD_ENABLE, high, low | LCD_ENABLE, low]
}

/// Encodes a command byte (RS low).
pub fn encode_command(command: u8) -> [u8; ENCODED_LEN] {
    encode(command, LCD_SEND_COMMAND)
}

/// Encodes a data byte (RS high).
pub fn encode_data(data: u8) -> [u8; ENCODED_LEN] {
    encode(data, LCD_SEND_DATA)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing data.
    Left,
    /// Moves the cursor to the right after writing data.
    Right,
}

/// HD44780 instruction set, expressed on top of raw command/data sends.
pub trait Hd44780Commands {
    /// Queues a command (RS = 0).
    fn send_command(&mut self, command: u8);

    /// Queues a data byte (RS = 1).
    fn send_data(&mut self, data: u8);

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) {
        self.send_command(0b00000001)
    }

    /// Sets the cursor to the home position.
    fn return_home(&mut self) {
        self.send_command(0b00000010)
    }

    /// Sets the cursor direction and whether the display shifts on write.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) {
        let mut command = 0b00000100;
        if cursor_direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(&mut self, display_on: bool, cursor_on: bool, blink_on: bool) {
        let mut command = 0b00001000;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Moves the cursor or shifts the display.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) {
        let mut command = 0b00010000;
        if display_shift {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Function set: data length (`true` for 8-bit), line count, and 5x10 font.
    fn function_set(&mut self, data_length: bool, two_lines: bool, font: bool) {
        let mut command = 0b00100000;
        if data_length {
            command |= 0b00010000;
        }
        if two_lines {
            command |= 0b00001000;
        }
        if font {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the CGRAM address.
    ///
    /// # Errors
    /// [LcdError::InvalidArgument] if the address does not fit in 6 bits.
    fn set_cgram_address(&mut self, address: u8) -> LcdResult<()> {
        if address > 0b00111111 {
            return Err(LcdError::InvalidArgument);
        }
        self.send_command(0b01000000 | address);
        Ok(())
    }

    /// Sets the DDRAM address.
    ///
    /// # Errors
    /// [LcdError::InvalidArgument] if the address does not fit in 7 bits.
    fn set_ddram_address(&mut self, address: u8) -> LcdResult<()> {
        if address > 0b01111111 {
            return Err(LcdError::InvalidArgument);
        }
        self.send_command(0b10000000 | address);
        Ok(())
    }
}

/// Scratch buffer collecting encoded wire bytes for one bus burst.
#[derive(Debug, Default, Clone)]
pub struct TransferBuffer {
    bytes: Vec<u8>,
}

impl TransferBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer large enough for `commands + data` logical bytes.
    pub fn with_capacity(logical_bytes: usize) -> Self {
        TransferBuffer {
            bytes: Vec::with_capacity(logical_bytes * ENCODED_LEN),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn push_command(&mut self, command: u8) {
        trace!("Queueing command: {:08b}", command);
        self.bytes.extend_from_slice(&encode_command(command));
    }

    pub fn push_data(&mut self, data: u8) {
        trace!("Queueing data: {:#04x}", data);
        self.bytes.extend_from_slice(&encode_data(data));
    }
}

impl Hd44780Commands for TransferBuffer {
    fn send_command(&mut self, command: u8) {
        self.push_command(command)
    }

    fn send_data(&mut self, data: u8) {
        self.push_data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_nibbles_with_enable_pulse() {
        assert_eq!(encode_command(0x28), [0x28, 0x20, 0x88, 0x80]);
        assert_eq!(encode_command(SET_FUNC_8), [0x08, 0x00, 0x38, 0x30]);
    }

    #[test]
    fn data_sets_register_select() {
        // 'A' = 0x41
        assert_eq!(encode_data(b'A'), [0x4A, 0x42, 0x1A, 0x12]);
        assert_eq!(encode_data(b' '), [0x2A, 0x22, 0x0A, 0x02]);
    }

    #[test]
    fn enable_high_then_low() {
        for value in 0..=u8::MAX {
            let bytes = encode_data(value);
            assert_eq!(bytes[0], bytes[1] | LCD_ENABLE);
            assert_eq!(bytes[2], bytes[3] | LCD_ENABLE);
            assert_eq!(bytes[1] & 0xF0, value & 0xF0);
            assert_eq!(bytes[3] >> 4, value & 0x0F);
        }
    }

    #[test]
    fn builders_produce_init_commands() {
        let mut buffer = TransferBuffer::new();
        buffer.function_set(false, true, false);
        buffer.set_display_control(true, false, false);
        buffer.set_entry_mode(CursorDirection::Right, false);
        buffer.return_home();

        let mut expected = TransferBuffer::new();
        for command in [0x28, 0x0C, 0x06, 0x02] {
            expected.push_command(command);
        }
        assert_eq!(buffer.as_bytes(), expected.as_bytes());
        assert_eq!(buffer.len(), 4 * ENCODED_LEN);
    }

    #[test]
    fn builders_produce_clear_and_shift_commands() {
        let mut buffer = TransferBuffer::new();
        buffer.clear_display();
        buffer.cursor_shift(false, CursorDirection::Left);
        buffer.cursor_shift(true, CursorDirection::Right);
        buffer.send_data(b'x');

        let mut expected = TransferBuffer::new();
        for command in [0x01, 0x10, 0x1C] {
            expected.push_command(command);
        }
        expected.push_data(b'x');
        assert_eq!(buffer.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn address_builders_check_range() {
        let mut buffer = TransferBuffer::new();
        assert_eq!(buffer.set_ddram_address(0x40), Ok(()));
        assert_eq!(&buffer.as_bytes()[..4], &encode_command(0xC0));
        assert_eq!(buffer.set_ddram_address(0x80), Err(LcdError::InvalidArgument));
        assert_eq!(buffer.set_cgram_address(0x40), Err(LcdError::InvalidArgument));
        assert_eq!(buffer.len(), ENCODED_LEN);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.set_cgram_address(0x38), Ok(()));
        assert_eq!(buffer.as_bytes(), &encode_command(0x78));
    }
}
