//! Frame buffer and command word layout.
//!
//! A frame is 16 bits sent MSB first:
//!
//! ```text
//!  15 | 14 ........ 8 | 7 ........ 0
//!   W |   address     |    data
//! ```

use serde::{Deserialize, Serialize};

/// Number of bits in a complete frame.
pub const FRAME_BITS: u8 = 16;

const COUNT_MASK: u8 = FRAME_BITS - 1;

/// Shift register plus 4-bit bit counter.
///
/// The counter wraps at 16, so a value of zero at frame close means a
/// multiple of 16 bits arrived since the buffer was cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    word: u16,
    count: u8,
}

impl FrameBuffer {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Shifts `bit` in as the new LSB; bit 15 falls off the top.
    pub fn shift_in(&mut self, bit: bool) {
        self.word = (self.word << 1) | u16::from(bit);
        self.count = (self.count + 1) & COUNT_MASK;
    }

    pub fn word(&self) -> u16 {
        self.word
    }

    /// Bits received modulo 16.
    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn is_aligned(&self) -> bool {
        self.count == 0
    }
}

/// Decoded view of a 16-bit frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    pub write: bool,
    pub address: u8,
    pub data: u8,
}

impl Command {
    pub const ADDRESS_MASK: u8 = 0x7F;

    pub fn write(address: u8, data: u8) -> Self {
        Self {
            write: true,
            address: address & Self::ADDRESS_MASK,
            data,
        }
    }

    pub fn from_word(word: u16) -> Self {
        Self {
            write: word & 0x8000 != 0,
            address: ((word >> 8) as u8) & Self::ADDRESS_MASK,
            data: word as u8,
        }
    }

    pub fn to_word(&self) -> u16 {
        (u16::from(self.write) << 15)
            | (u16::from(self.address & Self::ADDRESS_MASK) << 8)
            | u16::from(self.data)
    }
}

impl From<u16> for Command {
    fn from(word: u16) -> Self {
        Self::from_word(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift_word(buf: &mut FrameBuffer, word: u16, bits: u8) {
        for i in (0..bits).rev() {
            buf.shift_in((word >> i) & 1 == 1);
        }
    }

    #[test]
    fn bits_enter_msb_first() {
        let mut buf = FrameBuffer::default();
        shift_word(&mut buf, 0x80AA, 16);
        assert_eq!(buf.word(), 0x80AA);
        assert!(buf.is_aligned());
    }

    #[test]
    fn counter_wraps_at_sixteen() {
        let mut buf = FrameBuffer::default();
        shift_word(&mut buf, 0, 15);
        assert_eq!(buf.count(), 15);
        buf.shift_in(false);
        assert_eq!(buf.count(), 0);
        buf.shift_in(true);
        assert_eq!(buf.count(), 1);
    }

    #[test]
    fn extra_bits_push_out_the_oldest() {
        let mut buf = FrameBuffer::default();
        shift_word(&mut buf, 0xFFFF, 16);
        shift_word(&mut buf, 0x1234, 16);
        assert_eq!(buf.word(), 0x1234);
        assert_eq!(buf.count(), 0);
    }

    #[test]
    fn clear_resets_word_and_count() {
        let mut buf = FrameBuffer::default();
        shift_word(&mut buf, 0x5, 3);
        buf.clear();
        assert_eq!(buf, FrameBuffer::default());
    }

    #[test]
    fn command_layout() {
        let cmd = Command::from_word(0b1_0000100_1000_0000);
        assert!(cmd.write);
        assert_eq!(cmd.address, 0x04);
        assert_eq!(cmd.data, 0x80);
        assert_eq!(cmd.to_word(), 0x8480);
    }

    #[test]
    fn read_frame_has_write_flag_clear() {
        let cmd = Command::from(0x30BEu16);
        assert!(!cmd.write);
        assert_eq!(cmd.address, 0x30);
        assert_eq!(cmd.data, 0xBE);
    }

    #[test]
    fn write_constructor_masks_address() {
        assert_eq!(Command::write(0xFF, 1).address, 0x7F);
    }
}
