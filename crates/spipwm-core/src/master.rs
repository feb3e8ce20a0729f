//! Bit-banged SPI controller model.
//!
//! Produces the line levels a controller would drive, one [`LineSample`] per
//! system tick: select goes low for one tick, each bit is presented MSB first
//! with the clock low for a half period and then high for a half period, and
//! finally select is released and the bus rests for `idle_ticks`.

use serde::{Deserialize, Serialize};
use spipwm_decode::{Command, LineSample};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MasterError {
    #[error("address 0x{0:02X} does not fit in 7 bits")]
    AddressOutOfRange(u8),

    #[error("half period must be at least one tick")]
    ZeroHalfPeriod,

    #[error("select must stay released for at least one tick between frames")]
    ZeroIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterTiming {
    /// Ticks the clock stays at each level.
    pub half_period_ticks: u32,
    /// Ticks of released bus after each frame.
    pub idle_ticks: u32,
}

impl Default for MasterTiming {
    fn default() -> Self {
        Self {
            half_period_ticks: 50,
            idle_ticks: 600,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpiMaster {
    timing: MasterTiming,
}

impl SpiMaster {
    pub fn new(timing: MasterTiming) -> Result<Self, MasterError> {
        if timing.half_period_ticks == 0 {
            return Err(MasterError::ZeroHalfPeriod);
        }
        if timing.idle_ticks == 0 {
            return Err(MasterError::ZeroIdle);
        }
        Ok(Self { timing })
    }

    pub fn timing(&self) -> MasterTiming {
        self.timing
    }

    /// One 16-bit transaction: `write` flag, 7-bit `address`, 8-bit `data`.
    pub fn transaction(
        &self,
        write: bool,
        address: u8,
        data: u8,
    ) -> Result<Vec<LineSample>, MasterError> {
        if address > Command::ADDRESS_MASK {
            return Err(MasterError::AddressOutOfRange(address));
        }
        Ok(self.command(Command {
            write,
            address,
            data,
        }))
    }

    pub fn command(&self, cmd: Command) -> Vec<LineSample> {
        self.word(cmd.to_word())
    }

    pub fn word(&self, word: u16) -> Vec<LineSample> {
        self.bits((0..16).rev().map(|i| (word >> i) & 1 == 1))
    }

    /// A frame of any length; used to drive malformed traffic.
    pub fn bits<I>(&self, bits: I) -> Vec<LineSample>
    where
        I: IntoIterator<Item = bool>,
    {
        let half = self.timing.half_period_ticks as usize;
        let mut out = vec![LineSample::new(false, false, false)];
        for bit in bits {
            push_n(&mut out, LineSample::new(false, bit, false), half);
            push_n(&mut out, LineSample::new(false, bit, true), half);
        }
        out.extend(self.idle(self.timing.idle_ticks));
        out
    }

    pub fn idle(&self, ticks: u32) -> Vec<LineSample> {
        vec![LineSample::IDLE; ticks as usize]
    }
}

fn push_n(out: &mut Vec<LineSample>, sample: LineSample, n: usize) {
    out.extend(std::iter::repeat(sample).take(n));
}
