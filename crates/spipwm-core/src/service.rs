use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use spipwm_decode::OutputPins;
use std::thread::JoinHandle;

use crate::error::{CoreError, Result};
use crate::peripheral::{Peripheral, PeripheralConfig, PeripheralEvent, PinInputs, RegisterView};

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    Started,
    Peripheral(PeripheralEvent),
    /// A drive batch finished; `tick` is the number of ticks clocked so far.
    Drained { tick: u64, outputs: OutputPins },
    Closed,
}

enum Command {
    Drive(Vec<PinInputs>),
    Reset,
    Close,
}

/// A [`Peripheral`] running on its own worker thread.
///
/// Input batches are clocked in the order they are sent. Register state can be
/// read at any time through [`PeripheralService::registers`].
pub struct PeripheralService {
    cfg: PeripheralConfig,
    tx_cmd: Sender<Command>,
    rx_evt: Receiver<ServiceEvent>,
    view: RegisterView,
    worker: Option<JoinHandle<()>>,
}

impl PeripheralService {
    pub fn spawn(cfg: PeripheralConfig) -> Result<Self> {
        cfg.validate()?;
        let (tx_cmd, rx_cmd) = unbounded::<Command>();
        let (tx_evt, rx_evt) = unbounded::<ServiceEvent>();

        let mut peripheral = Peripheral::new(&cfg);
        let view = peripheral.view();
        let events = peripheral.subscribe();

        let worker = std::thread::Builder::new()
            .name("spipwm-peripheral".into())
            .spawn(move || {
                let _ = tx_evt.send(ServiceEvent::Started);
                let forward = |tx: &Sender<ServiceEvent>| {
                    for ev in events.try_iter() {
                        let _ = tx.send(ServiceEvent::Peripheral(ev));
                    }
                };
                for cmd in rx_cmd.iter() {
                    match cmd {
                        Command::Drive(batch) => {
                            debug!("driving {} ticks", batch.len());
                            let outputs = peripheral.run(batch);
                            forward(&tx_evt);
                            let _ = tx_evt.send(ServiceEvent::Drained {
                                tick: peripheral.tick_count(),
                                outputs,
                            });
                        }
                        Command::Reset => {
                            peripheral.reset();
                            forward(&tx_evt);
                        }
                        Command::Close => break,
                    }
                }
                let _ = tx_evt.send(ServiceEvent::Closed);
            })
            .map_err(CoreError::Spawn)?;

        Ok(Self {
            cfg,
            tx_cmd,
            rx_evt,
            view,
            worker: Some(worker),
        })
    }

    pub fn drive(&self, inputs: Vec<PinInputs>) -> Result<()> {
        self.send(Command::Drive(inputs))
    }

    pub fn reset(&self) -> Result<()> {
        self.send(Command::Reset)
    }

    /// Stops the worker and waits for it to exit. Safe to call twice.
    pub fn close(&mut self) {
        let _ = self.tx_cmd.send(Command::Close);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("peripheral worker panicked");
            }
        }
    }

    pub fn events(&self) -> &Receiver<ServiceEvent> {
        &self.rx_evt
    }

    pub fn registers(&self) -> RegisterView {
        self.view.clone()
    }

    pub fn config(&self) -> &PeripheralConfig {
        &self.cfg
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.tx_cmd.send(cmd).map_err(|_| CoreError::ServiceClosed)
    }
}

impl Drop for PeripheralService {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::SpiMaster;
    use spipwm_decode::{FrameOutcome, Register};
    use std::time::Duration;

    fn wait_drained(svc: &PeripheralService) -> Vec<ServiceEvent> {
        let mut seen = Vec::new();
        loop {
            let ev = svc
                .events()
                .recv_timeout(Duration::from_secs(5))
                .expect("worker stalled");
            let done = matches!(ev, ServiceEvent::Drained { .. });
            seen.push(ev);
            if done {
                return seen;
            }
        }
    }

    fn frame(addr: u8, data: u8) -> Vec<PinInputs> {
        let master = SpiMaster::new(PeripheralConfig::default().master_timing()).unwrap();
        master
            .transaction(true, addr, data)
            .unwrap()
            .into_iter()
            .map(PinInputs::from)
            .collect()
    }

    #[test]
    fn drive_commits_and_publishes() {
        let mut svc = PeripheralService::spawn(PeripheralConfig::default()).unwrap();
        svc.drive(frame(0x04, 0x80)).unwrap();
        let events = wait_drained(&svc);

        assert_eq!(events[0], ServiceEvent::Started);
        assert!(events.iter().any(|e| matches!(
            e,
            ServiceEvent::Peripheral(PeripheralEvent::Frame {
                outcome: FrameOutcome::Committed {
                    register: Register::DutyCycle,
                    value: 0x80
                },
                ..
            })
        )));
        assert_eq!(svc.registers().registers().duty_cycle(), 0x80);
        svc.close();
    }

    #[test]
    fn reset_command_clears_bank() {
        let mut svc = PeripheralService::spawn(PeripheralConfig::default()).unwrap();
        svc.drive(frame(0x00, 0xFF)).unwrap();
        wait_drained(&svc);
        svc.reset().unwrap();
        svc.drive(Vec::new()).unwrap();
        let events = wait_drained(&svc);
        assert!(events
            .iter()
            .any(|e| matches!(e, ServiceEvent::Peripheral(PeripheralEvent::Reset { .. }))));
        assert!(svc.registers().registers().is_zero());
        svc.close();
    }

    #[test]
    fn closed_service_rejects_commands() {
        let mut svc = PeripheralService::spawn(PeripheralConfig::default()).unwrap();
        svc.close();
        svc.close();
        assert!(matches!(svc.reset(), Err(CoreError::ServiceClosed)));
    }

    #[test]
    fn keeps_its_config() {
        let cfg = PeripheralConfig {
            pwm_divider: 4,
            ..Default::default()
        };
        let mut svc = PeripheralService::spawn(cfg.clone()).unwrap();
        assert_eq!(svc.config(), &cfg);
        svc.close();
    }

    #[test]
    fn invalid_config_is_refused() {
        let cfg = PeripheralConfig {
            pwm_divider: 0,
            ..Default::default()
        };
        assert!(matches!(
            PeripheralService::spawn(cfg),
            Err(CoreError::Config(_))
        ));
    }
}
