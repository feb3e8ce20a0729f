use crate::sync::SyncShadow;

/// Transitions seen between the settled and current slot of the synchronizer.
///
/// Nothing here is stored; the set is recomputed from the shadow every tick.
/// Several events may be raised together, the decoder decides which one wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeEvents {
    /// Select went from released to asserted: a frame opens.
    pub select_falling: bool,
    /// Select went from asserted to released: the frame closes.
    pub select_rising: bool,
    /// Serial clock went low to high: one data bit is sampled.
    pub clock_rising: bool,
}

impl EdgeEvents {
    pub fn detect(shadow: &SyncShadow) -> Self {
        let [ncs_now, ncs_prev] = shadow.ncs;
        let [sclk_now, sclk_prev] = shadow.sclk;
        Self {
            select_falling: ncs_prev && !ncs_now,
            select_rising: !ncs_prev && ncs_now,
            clock_rising: !sclk_prev && sclk_now,
        }
    }

    pub fn is_quiet(&self) -> bool {
        !(self.select_falling || self.select_rising || self.clock_rising)
    }
}
