//! PWM generator and the 16-pin output stage fed by the register bank.

use serde::{Deserialize, Serialize};

use crate::registers::RegisterBank;

/// System ticks per PWM counter step. With a 10 MHz clock this gives a
/// 13 * 256 tick period, about 3.0 kHz.
pub const DEFAULT_PWM_DIVIDER: u16 = 13;

/// Duty value that holds the PWM output high for the whole period.
pub const DUTY_FULL: u8 = 0xFF;

#[derive(Debug, Clone)]
pub struct PwmGenerator {
    divider: u16,
    prescale: u16,
    counter: u8,
}

impl PwmGenerator {
    /// A divider of zero is treated as one.
    pub fn new(divider: u16) -> Self {
        Self {
            divider: divider.max(1),
            prescale: 0,
            counter: 0,
        }
    }

    pub fn reset(&mut self) {
        self.prescale = 0;
        self.counter = 0;
    }

    pub fn tick(&mut self) {
        if self.prescale + 1 >= self.divider {
            self.prescale = 0;
            self.counter = self.counter.wrapping_add(1);
        } else {
            self.prescale += 1;
        }
    }

    /// PWM level for `duty` at the current counter position.
    pub fn level(&self, duty: u8) -> bool {
        duty == DUTY_FULL || self.counter < duty
    }

    pub fn counter(&self) -> u8 {
        self.counter
    }

    pub fn divider(&self) -> u16 {
        self.divider
    }

    pub fn period_ticks(&self) -> u32 {
        u32::from(self.divider) * 256
    }
}

impl Default for PwmGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_PWM_DIVIDER)
    }
}

/// Levels of the 16 output pins. Pins 0..8 form `uo_out`, pins 8..16 `uio_out`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPins(pub u16);

impl OutputPins {
    pub fn uo_out(&self) -> u8 {
        self.0 as u8
    }

    pub fn uio_out(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn pin(&self, index: u8) -> bool {
        index < 16 && (self.0 >> index) & 1 == 1
    }
}

pub struct OutputStage;

impl OutputStage {
    /// Disabled pins are low; enabled pins follow the PWM level when their
    /// PWM bit is set and are held high otherwise.
    pub fn drive(bank: &RegisterBank, pwm_level: bool) -> OutputPins {
        let enable = bank.out_enable();
        let pwm_enable = bank.pwm_enable();
        let pwm = if pwm_level { 0xFFFF } else { 0 };
        OutputPins(enable & ((pwm_enable & pwm) | !pwm_enable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Register;

    fn bank(values: &[(Register, u8)]) -> RegisterBank {
        let mut bank = RegisterBank::new();
        for &(r, v) in values {
            bank.set(r, v);
        }
        bank
    }

    #[test]
    fn counter_steps_once_per_divider() {
        let mut pwm = PwmGenerator::new(3);
        for _ in 0..2 {
            pwm.tick();
        }
        assert_eq!(pwm.counter(), 0);
        pwm.tick();
        assert_eq!(pwm.counter(), 1);
        for _ in 0..(3 * 255) {
            pwm.tick();
        }
        assert_eq!(pwm.counter(), 0);
    }

    #[test]
    fn default_period_matches_three_kilohertz() {
        let pwm = PwmGenerator::default();
        let hz = 10_000_000.0 / pwm.period_ticks() as f64;
        assert!((hz - 3000.0).abs() / 3000.0 < 0.01, "{hz}");
    }

    #[test]
    fn zero_divider_is_clamped() {
        assert_eq!(PwmGenerator::new(0).divider(), 1);
    }

    #[test]
    fn duty_extremes() {
        let mut pwm = PwmGenerator::new(1);
        let mut high_zero = 0;
        let mut high_full = 0;
        let mut high_half = 0;
        for _ in 0..256 {
            high_zero += pwm.level(0x00) as u32;
            high_full += pwm.level(0xFF) as u32;
            high_half += pwm.level(0x80) as u32;
            pwm.tick();
        }
        assert_eq!(high_zero, 0);
        assert_eq!(high_full, 256);
        assert_eq!(high_half, 128);
    }

    #[test]
    fn disabled_pins_stay_low() {
        let b = bank(&[(Register::PwmEnableLow, 0xFF)]);
        assert_eq!(OutputStage::drive(&b, true), OutputPins(0));
    }

    #[test]
    fn enabled_pins_without_pwm_are_high() {
        let b = bank(&[(Register::OutEnableLow, 0xF0), (Register::OutEnableHigh, 0xCC)]);
        let out = OutputStage::drive(&b, false);
        assert_eq!(out.uo_out(), 0xF0);
        assert_eq!(out.uio_out(), 0xCC);
    }

    #[test]
    fn pwm_pins_follow_level() {
        let b = bank(&[
            (Register::OutEnableLow, 0x03),
            (Register::PwmEnableLow, 0x01),
        ]);
        assert_eq!(OutputStage::drive(&b, true), OutputPins(0b11));
        assert_eq!(OutputStage::drive(&b, false), OutputPins(0b10));
        assert!(OutputStage::drive(&b, false).pin(1));
        assert!(!OutputStage::drive(&b, false).pin(0));
    }
}
