//! Two-stage input synchronizer.
//!
//! Every external line passes through a 2-deep history before anything reads
//! it. Slot 0 holds the most recent raw sample and slot 1 the value slot 0 had
//! one tick earlier; slot 1 is the "settled" value.

use crate::LineSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncShadow {
    pub copi: [bool; 2],
    pub sclk: [bool; 2],
    pub ncs: [bool; 2],
}

impl SyncShadow {
    /// Reset contents: select released, clock and data low.
    pub const RESET: SyncShadow = SyncShadow {
        copi: [false; 2],
        sclk: [false; 2],
        ncs: [true; 2],
    };

    /// Most recent raw sample (slot 0 of every line).
    pub fn current(&self) -> LineSample {
        LineSample {
            copi: self.copi[0],
            sclk: self.sclk[0],
            ncs: self.ncs[0],
        }
    }

    /// Settled sample (slot 1 of every line).
    pub fn settled(&self) -> LineSample {
        LineSample {
            copi: self.copi[1],
            sclk: self.sclk[1],
            ncs: self.ncs[1],
        }
    }
}

impl Default for SyncShadow {
    fn default() -> Self {
        Self::RESET
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputSynchronizer {
    shadow: SyncShadow,
}

impl InputSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.shadow = SyncShadow::RESET;
    }

    /// Shifts one raw sample into every line's history, dropping the oldest.
    pub fn shift_in(&mut self, raw: LineSample) {
        let s = &mut self.shadow;
        s.copi = [raw.copi, s.copi[0]];
        s.sclk = [raw.sclk, s.sclk[0]];
        s.ncs = [raw.ncs, s.ncs[0]];
    }

    pub fn shadow(&self) -> &SyncShadow {
        &self.shadow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_releases_select_and_lowers_clock_and_data() {
        let mut sync = InputSynchronizer::new();
        sync.shift_in(LineSample::new(false, true, true));
        sync.shift_in(LineSample::new(false, true, true));
        sync.reset();
        assert_eq!(*sync.shadow(), SyncShadow::RESET);
        assert_eq!(sync.shadow().settled(), LineSample::IDLE);
    }

    #[test]
    fn raw_change_settles_after_two_ticks() {
        let mut sync = InputSynchronizer::new();
        let low = LineSample::new(false, true, false);

        sync.shift_in(low);
        assert_eq!(sync.shadow().current(), low);
        assert_eq!(sync.shadow().settled(), LineSample::IDLE);

        sync.shift_in(low);
        assert_eq!(sync.shadow().settled(), low);
    }

    #[test]
    fn lines_are_tracked_independently() {
        let mut sync = InputSynchronizer::new();
        sync.shift_in(LineSample::new(true, false, true));
        sync.shift_in(LineSample::new(true, true, false));
        let s = sync.shadow();
        assert_eq!(s.sclk, [false, true]);
        assert_eq!(s.copi, [true, false]);
        assert_eq!(s.ncs, [true, true]);
    }
}
