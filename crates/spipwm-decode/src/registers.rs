use serde::{Deserialize, Serialize};

/// The five writable registers and their 7-bit addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Register {
    OutEnableLow = 0x00,
    OutEnableHigh = 0x01,
    PwmEnableLow = 0x02,
    PwmEnableHigh = 0x03,
    DutyCycle = 0x04,
}

impl Register {
    pub const ALL: [Register; 5] = [
        Register::OutEnableLow,
        Register::OutEnableHigh,
        Register::PwmEnableLow,
        Register::PwmEnableHigh,
        Register::DutyCycle,
    ];

    /// Unmapped addresses yield `None`.
    pub fn from_address(address: u8) -> Option<Self> {
        match address {
            0x00 => Some(Self::OutEnableLow),
            0x01 => Some(Self::OutEnableHigh),
            0x02 => Some(Self::PwmEnableLow),
            0x03 => Some(Self::PwmEnableHigh),
            0x04 => Some(Self::DutyCycle),
            _ => None,
        }
    }

    pub fn address(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::OutEnableLow => "out_enable_low",
            Self::OutEnableHigh => "out_enable_high",
            Self::PwmEnableLow => "pwm_enable_low",
            Self::PwmEnableHigh => "pwm_enable_high",
            Self::DutyCycle => "duty_cycle",
        }
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Register bank state
///
/// Readable by anyone; only the command decoder in this crate writes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBank {
    regs: [u8; 5],
}

impl RegisterBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reg: Register) -> u8 {
        self.regs[reg as usize]
    }

    pub(crate) fn set(&mut self, reg: Register, value: u8) {
        self.regs[reg as usize] = value;
    }

    pub(crate) fn clear(&mut self) {
        self.regs = [0; 5];
    }

    /// Output-enable mask for pins 0..16.
    pub fn out_enable(&self) -> u16 {
        u16::from_le_bytes([
            self.get(Register::OutEnableLow),
            self.get(Register::OutEnableHigh),
        ])
    }

    /// PWM-enable mask for pins 0..16.
    pub fn pwm_enable(&self) -> u16 {
        u16::from_le_bytes([
            self.get(Register::PwmEnableLow),
            self.get(Register::PwmEnableHigh),
        ])
    }

    pub fn duty_cycle(&self) -> u8 {
        self.get(Register::DutyCycle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Register, u8)> + '_ {
        Register::ALL.into_iter().map(move |r| (r, self.get(r)))
    }

    pub fn is_zero(&self) -> bool {
        self.regs.iter().all(|&v| v == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_map_round_trips() {
        for reg in Register::ALL {
            assert_eq!(Register::from_address(reg.address()), Some(reg));
        }
        assert_eq!(Register::from_address(0x05), None);
        assert_eq!(Register::from_address(0x30), None);
        assert_eq!(Register::from_address(0x7F), None);
    }

    #[test]
    fn masks_combine_low_and_high_bytes() {
        let mut bank = RegisterBank::new();
        bank.set(Register::OutEnableLow, 0xF0);
        bank.set(Register::OutEnableHigh, 0xCC);
        bank.set(Register::PwmEnableHigh, 0x01);
        assert_eq!(bank.out_enable(), 0xCCF0);
        assert_eq!(bank.pwm_enable(), 0x0100);
    }

    #[test]
    fn clear_zeroes_every_cell() {
        let mut bank = RegisterBank::new();
        bank.set(Register::DutyCycle, 0x80);
        assert!(!bank.is_zero());
        bank.clear();
        assert!(bank.is_zero());
    }
}
