//! Runtime around the decoder: clocked peripheral model, worker service, frame log,
//! controller waveform generator and trace files.

pub mod error;
pub mod logbuf;
pub mod master;
pub mod measure;
pub mod peripheral;
pub mod service;
pub mod trace;

pub use error::{ConfigError, CoreError};
pub use logbuf::{EntryKind, FrameLog, LogEntry};
pub use master::{MasterError, MasterTiming, SpiMaster};
pub use measure::{measure_pin, PinActivity, PwmMeasurement};
pub use peripheral::{
    Peripheral, PeripheralConfig, PeripheralEvent, PinInputs, RegisterSnapshot, RegisterView,
};
pub use service::{PeripheralService, ServiceEvent};
pub use trace::{format_trace, load_trace, parse_trace, write_trace, TraceError, MAX_REPEAT};
