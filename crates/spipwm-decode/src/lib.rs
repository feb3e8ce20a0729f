//! Cycle-level model of a write-only SPI register peripheral.
//!
//! Three asynchronous lines (`copi`, `sclk`, active-low `ncs`) are sampled once
//! per system clock tick, synchronized, edge-detected and shifted into 16-bit
//! frames. Each well-formed write frame updates one of five 8-bit registers,
//! which in turn drive a 16-pin output stage with optional PWM.

pub mod edge;
pub mod frame;
pub mod pwm;
pub mod registers;
pub mod spi;
pub mod sync;

pub use edge::EdgeEvents;
pub use frame::{Command, FrameBuffer};
pub use pwm::{OutputPins, OutputStage, PwmGenerator, DEFAULT_PWM_DIVIDER};
pub use registers::{Register, RegisterBank};
pub use spi::{DiscardReason, FrameOutcome, ReceiveState, SpiDecoder};
pub use sync::{InputSynchronizer, SyncShadow};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockRate(pub u32); // Hz

impl ClockRate {
    /// Converts a tick count at this rate into seconds.
    pub fn ticks_to_secs(&self, ticks: u64) -> f64 {
        ticks as f64 / self.0 as f64
    }
}

impl Default for ClockRate {
    fn default() -> Self {
        Self(10_000_000)
    }
}

/// Tick interval, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSpan {
    pub start: u64,
    pub end: u64,
}

impl TickSpan {
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Raw level of the three monitored lines during one tick.
///
/// `ncs` is active low: `false` means the controller has the peripheral
/// selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineSample {
    pub copi: bool,
    pub sclk: bool,
    pub ncs: bool,
}

impl LineSample {
    /// Bus at rest: clock and data low, select released.
    pub const IDLE: LineSample = LineSample {
        copi: false,
        sclk: false,
        ncs: true,
    };

    pub fn new(ncs: bool, copi: bool, sclk: bool) -> Self {
        Self { copi, sclk, ncs }
    }

    pub fn selected(&self) -> bool {
        !self.ncs
    }
}

impl Default for LineSample {
    fn default() -> Self {
        Self::IDLE
    }
}
