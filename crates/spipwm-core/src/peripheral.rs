use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use spipwm_decode::{
    ClockRate, FrameOutcome, LineSample, OutputPins, OutputStage, PwmGenerator, ReceiveState,
    RegisterBank, SpiDecoder, TickSpan, DEFAULT_PWM_DIVIDER,
};

use crate::error::ConfigError;
use crate::master::MasterTiming;

/// Everything sampled at one system clock edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinInputs {
    pub lines: LineSample,
    /// Active-low reset.
    pub rst_n: bool,
}

impl PinInputs {
    pub fn run(lines: LineSample) -> Self {
        Self { lines, rst_n: true }
    }

    pub fn reset() -> Self {
        Self {
            lines: LineSample::IDLE,
            rst_n: false,
        }
    }
}

impl From<LineSample> for PinInputs {
    fn from(lines: LineSample) -> Self {
        Self::run(lines)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeripheralConfig {
    pub clock_hz: u32,
    pub pwm_divider: u16,
    pub half_period_ticks: u32,
    pub idle_ticks: u32,
    pub log_capacity: usize,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        let timing = MasterTiming::default();
        Self {
            clock_hz: 10_000_000,
            pwm_divider: DEFAULT_PWM_DIVIDER,
            half_period_ticks: timing.half_period_ticks,
            idle_ticks: timing.idle_ticks,
            log_capacity: 10_000,
        }
    }
}

impl PeripheralConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Missing fields take their default values.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("clock_hz", self.clock_hz == 0),
            ("pwm_divider", self.pwm_divider == 0),
            ("half_period_ticks", self.half_period_ticks == 0),
            ("idle_ticks", self.idle_ticks == 0),
            ("log_capacity", self.log_capacity == 0),
        ];
        match nonzero.iter().find(|(_, zero)| *zero) {
            Some((field, _)) => Err(ConfigError::Invalid(format!("{field} must be nonzero"))),
            None => Ok(()),
        }
    }

    pub fn clock_rate(&self) -> ClockRate {
        ClockRate(self.clock_hz)
    }

    pub fn master_timing(&self) -> MasterTiming {
        MasterTiming {
            half_period_ticks: self.half_period_ticks,
            idle_ticks: self.idle_ticks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeripheralEvent {
    /// A frame finished; `span` runs from the tick it opened to the tick it
    /// was closed or aborted.
    Frame { span: TickSpan, outcome: FrameOutcome },
    /// Reset was asserted at `tick`.
    Reset { tick: u64 },
}

impl PeripheralEvent {
    pub fn tick(&self) -> u64 {
        match self {
            Self::Frame { span, .. } => span.end,
            Self::Reset { tick } => *tick,
        }
    }
}

/// State published to readers after every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    pub tick: u64,
    pub registers: RegisterBank,
    pub outputs: OutputPins,
}

/// Read-only handle to the peripheral's register bank.
///
/// Cloning is cheap; every clone sees the same state. A snapshot is always
/// taken between ticks, never during one.
#[derive(Debug, Clone, Default)]
pub struct RegisterView {
    inner: Arc<RwLock<RegisterSnapshot>>,
}

impl RegisterView {
    pub fn snapshot(&self) -> RegisterSnapshot {
        *self.inner.read()
    }

    pub fn registers(&self) -> RegisterBank {
        self.inner.read().registers
    }

    pub fn outputs(&self) -> OutputPins {
        self.inner.read().outputs
    }

    fn publish(&self, snapshot: RegisterSnapshot) {
        *self.inner.write() = snapshot;
    }
}

/// Decoder plus PWM output stage, clocked one tick at a time.
pub struct Peripheral {
    decoder: SpiDecoder,
    pwm: PwmGenerator,
    tick: u64,
    in_reset: bool,
    frame_start: Option<u64>,
    outputs: OutputPins,
    view: RegisterView,
    subscribers: Vec<Sender<PeripheralEvent>>,
}

impl Peripheral {
    pub fn new(config: &PeripheralConfig) -> Self {
        Self {
            decoder: SpiDecoder::new(),
            pwm: PwmGenerator::new(config.pwm_divider),
            tick: 0,
            in_reset: false,
            frame_start: None,
            outputs: OutputPins::default(),
            view: RegisterView::default(),
            subscribers: Vec::new(),
        }
    }

    /// Advances one system clock. Reset is checked before anything else.
    pub fn clock(&mut self, inputs: PinInputs) -> OutputPins {
        let tick = self.tick;
        self.tick += 1;

        if inputs.rst_n {
            self.in_reset = false;
            self.step(tick, inputs.lines);
        } else if !self.in_reset {
            self.in_reset = true;
            self.apply_reset(tick);
        }

        self.refresh(tick);
        self.outputs
    }

    /// Clocks every input in order and returns the final outputs.
    pub fn run<I>(&mut self, inputs: I) -> OutputPins
    where
        I: IntoIterator,
        I::Item: Into<PinInputs>,
    {
        for input in inputs {
            self.clock(input.into());
        }
        self.outputs
    }

    /// Forces all decoder, register and PWM state to zero without consuming
    /// a tick.
    pub fn reset(&mut self) {
        let tick = self.tick;
        self.apply_reset(tick);
        self.refresh(tick);
    }

    pub fn subscribe(&mut self) -> Receiver<PeripheralEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn registers(&self) -> &RegisterBank {
        self.decoder.registers()
    }

    pub fn outputs(&self) -> OutputPins {
        self.outputs
    }

    /// Ticks clocked so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn view(&self) -> RegisterView {
        self.view.clone()
    }

    pub fn decoder(&self) -> &SpiDecoder {
        &self.decoder
    }

    pub fn pwm(&self) -> &PwmGenerator {
        &self.pwm
    }

    fn step(&mut self, tick: u64, lines: LineSample) {
        let outcome = self.decoder.tick(lines);
        self.pwm.tick();

        if let Some(outcome) = outcome {
            let span = TickSpan {
                start: self.frame_start.unwrap_or(tick),
                end: tick,
            };
            match outcome {
                FrameOutcome::Committed { register, value } => {
                    info!("tick {tick}: {register} <- 0x{value:02X}")
                }
                other => debug!("tick {tick}: {other}"),
            }
            self.emit(PeripheralEvent::Frame { span, outcome });
        }

        self.frame_start = match (self.decoder.state(), outcome) {
            (ReceiveState::Idle, _) => None,
            (ReceiveState::Receiving, Some(FrameOutcome::Aborted { .. })) => Some(tick),
            (ReceiveState::Receiving, _) => self.frame_start.or(Some(tick)),
        };
    }

    fn apply_reset(&mut self, tick: u64) {
        debug!("tick {tick}: reset");
        self.decoder.reset();
        self.pwm.reset();
        self.frame_start = None;
        self.emit(PeripheralEvent::Reset { tick });
    }

    fn refresh(&mut self, tick: u64) {
        let bank = *self.decoder.registers();
        self.outputs = OutputStage::drive(&bank, self.pwm.level(bank.duty_cycle()));
        self.view.publish(RegisterSnapshot {
            tick,
            registers: bank,
            outputs: self.outputs,
        });
    }

    fn emit(&mut self, event: PeripheralEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

impl Default for Peripheral {
    fn default() -> Self {
        Self::new(&PeripheralConfig::default())
    }
}
