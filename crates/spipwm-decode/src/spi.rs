//! Frame accumulator and command decoder.
//!
//! [`SpiDecoder::tick`] advances the whole decode pipeline by one system clock.
//! Every stage reads the state left by the previous tick; the synchronizer
//! takes the new raw sample last, so a line change needs two ticks before it
//! can produce an edge.

use std::fmt;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::edge::EdgeEvents;
use crate::frame::{Command, FrameBuffer};
use crate::registers::{Register, RegisterBank};
use crate::sync::InputSynchronizer;
use crate::LineSample;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiveState {
    #[default]
    Idle,
    Receiving,
}

/// Why a closed frame did not reach the register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscardReason {
    /// Bit count modulo 16 at close was not zero.
    BitCount(u8),
    /// Write flag clear. There is no read path.
    NotWrite(Command),
    /// Write to an address with no register behind it.
    UnmappedAddress(Command),
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BitCount(n) => write!(f, "closed after {n} bits (mod 16)"),
            Self::NotWrite(cmd) => write!(f, "write flag clear (address 0x{:02X})", cmd.address),
            Self::UnmappedAddress(cmd) => write!(f, "unmapped address 0x{:02X}", cmd.address),
        }
    }
}

/// What happened to the current frame during a tick, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameOutcome {
    Committed { register: Register, value: u8 },
    Discarded(DiscardReason),
    /// Select was asserted again before the frame closed; `bits` is the
    /// count (mod 16) thrown away.
    Aborted { bits: u8 },
}

impl fmt::Display for FrameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed { register, value } => write!(f, "{register} <- 0x{value:02X}"),
            Self::Discarded(reason) => write!(f, "discarded: {reason}"),
            Self::Aborted { bits } => write!(f, "aborted after {bits} bits"),
        }
    }
}

/// The single action taken in a tick, picked from the edge set by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Open,
    Shift(bool),
    Close,
}

impl Action {
    fn resolve(edges: EdgeEvents, settled: LineSample) -> Option<Self> {
        if edges.select_falling {
            Some(Self::Open)
        } else if edges.clock_rising && settled.selected() {
            Some(Self::Shift(settled.copi))
        } else if edges.select_rising {
            Some(Self::Close)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpiDecoder {
    sync: InputSynchronizer,
    state: ReceiveState,
    frame: FrameBuffer,
    registers: RegisterBank,
}

impl SpiDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces every piece of state, registers included, back to power-on values.
    pub fn reset(&mut self) {
        self.sync.reset();
        self.state = ReceiveState::Idle;
        self.frame.clear();
        self.registers.clear();
    }

    /// Advances one system clock with `raw` as this tick's line levels.
    pub fn tick(&mut self, raw: LineSample) -> Option<FrameOutcome> {
        let shadow = *self.sync.shadow();
        let edges = EdgeEvents::detect(&shadow);
        if !edges.is_quiet() {
            trace!("edges {edges:?} in state {:?}", self.state);
        }

        let outcome = match Action::resolve(edges, shadow.settled()) {
            Some(Action::Open) => self.open(),
            Some(Action::Shift(bit)) => {
                self.frame.shift_in(bit);
                None
            }
            Some(Action::Close) => Some(self.close()),
            None => None,
        };

        self.sync.shift_in(raw);
        outcome
    }

    /// Runs a sequence of samples, collecting every frame outcome.
    pub fn run<I>(&mut self, samples: I) -> Vec<FrameOutcome>
    where
        I: IntoIterator<Item = LineSample>,
    {
        samples.into_iter().filter_map(|s| self.tick(s)).collect()
    }

    fn open(&mut self) -> Option<FrameOutcome> {
        let aborted = match self.state {
            ReceiveState::Receiving => Some(FrameOutcome::Aborted {
                bits: self.frame.count(),
            }),
            ReceiveState::Idle => None,
        };
        self.frame.clear();
        self.state = ReceiveState::Receiving;
        aborted
    }

    fn close(&mut self) -> FrameOutcome {
        let frame = self.frame;
        self.frame.clear();
        self.state = ReceiveState::Idle;

        let outcome = self.decode(frame);
        debug!("frame 0x{:04X}: {outcome}", frame.word());
        outcome
    }

    fn decode(&mut self, frame: FrameBuffer) -> FrameOutcome {
        if !frame.is_aligned() {
            return FrameOutcome::Discarded(DiscardReason::BitCount(frame.count()));
        }
        let cmd = Command::from_word(frame.word());
        if !cmd.write {
            return FrameOutcome::Discarded(DiscardReason::NotWrite(cmd));
        }
        match Register::from_address(cmd.address) {
            Some(register) => {
                self.registers.set(register, cmd.data);
                FrameOutcome::Committed {
                    register,
                    value: cmd.data,
                }
            }
            None => FrameOutcome::Discarded(DiscardReason::UnmappedAddress(cmd)),
        }
    }

    pub fn registers(&self) -> &RegisterBank {
        &self.registers
    }

    pub fn state(&self) -> ReceiveState {
        self.state
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn synchronizer(&self) -> &InputSynchronizer {
        &self.sync
    }
}
