//! PWM measurement on a single output pin.

use serde::{Deserialize, Serialize};
use spipwm_decode::{ClockRate, LineSample};

use crate::peripheral::{Peripheral, PinInputs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PwmMeasurement {
    /// Rising edge to the next rising edge.
    pub period_ticks: u64,
    /// Rising edge to the falling edge in between.
    pub high_ticks: u64,
}

impl PwmMeasurement {
    pub fn frequency_hz(&self, clock: ClockRate) -> f64 {
        1.0 / clock.ticks_to_secs(self.period_ticks)
    }

    pub fn duty_percent(&self) -> f64 {
        self.high_ticks as f64 * 100.0 / self.period_ticks as f64
    }
}

/// What a pin did while it was being watched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PinActivity {
    Toggling(PwmMeasurement),
    /// No full period seen; the pin sat at this level at the end.
    Steady(bool),
}

/// Clocks `peripheral` with the bus idle until `pin` shows a rising, falling
/// and rising edge, or `max_ticks` pass.
pub fn measure_pin(peripheral: &mut Peripheral, pin: u8, max_ticks: u64) -> PinActivity {
    let idle = PinInputs::run(LineSample::IDLE);
    let mut prev = peripheral.outputs().pin(pin);
    let mut rise: Option<u64> = None;
    let mut fall: Option<u64> = None;

    for _ in 0..max_ticks {
        let now = peripheral.clock(idle).pin(pin);
        let tick = peripheral.tick_count();
        match (prev, now) {
            (false, true) => {
                if let (Some(r), Some(f)) = (rise, fall) {
                    return PinActivity::Toggling(PwmMeasurement {
                        period_ticks: tick - r,
                        high_ticks: f - r,
                    });
                }
                rise = Some(tick);
                fall = None;
            }
            (true, false) if rise.is_some() => fall = Some(tick),
            _ => {}
        }
        prev = now;
    }
    PinActivity::Steady(prev)
}
