//! `spipwm`: drive the SPI register peripheral model from the command line.
//!
//! Replays recorded line traces, sends encoded register writes, and measures
//! the PWM output produced by the resulting register state.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, LevelFilter};
use serde::Serialize;
use spipwm_core::{
    format_trace, load_trace, measure_pin, FrameLog, Peripheral, PeripheralConfig,
    PeripheralEvent, PinActivity, PinInputs, SpiMaster,
};
use spipwm_decode::{Command, OutputPins, RegisterBank};

#[derive(Parser, Debug)]
#[command(name = "spipwm", version, about = "SPI-controlled PWM peripheral model")]
struct Cli {
    /// Only print errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print per-frame debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file (defaults to the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run a recorded line trace through the peripheral.
    Replay {
        trace: PathBuf,

        /// Print a JSON report instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Encode register transactions and run them.
    Send {
        /// Transactions as ADDR:DATA in hex, e.g. 04:80.
        transactions: Vec<String>,

        /// Raw 16-bit frame words in hex, e.g. 84FF.
        #[arg(long = "frame")]
        frames: Vec<String>,

        /// Clear the write flag on every ADDR:DATA transaction.
        #[arg(long)]
        read: bool,

        /// Save the generated line trace to this file.
        #[arg(long)]
        save_trace: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
    /// Program a duty cycle and measure the PWM output.
    Pwm {
        /// Duty cycle register value in hex (00..FF).
        #[arg(long)]
        duty: String,

        /// Output pins to enable with PWM, as a 16-bit hex mask.
        #[arg(long, default_value = "0001")]
        pins: String,

        /// Measurement window in PWM periods.
        #[arg(long, default_value_t = 4)]
        periods: u64,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct Report {
    ticks: u64,
    registers: RegisterBank,
    outputs: OutputPins,
    events: Vec<PeripheralEvent>,
}

#[derive(Serialize)]
struct PwmReport {
    pin: u8,
    duty: u8,
    frequency_hz: Option<f64>,
    duty_percent: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = load_config(cli.config.as_deref())?;
    debug!("config: {config:?}");

    match cli.command {
        Cmd::Replay { trace, json } => replay(&config, &trace, json),
        Cmd::Send {
            transactions,
            frames,
            read,
            save_trace,
            json,
        } => send(&config, &transactions, &frames, read, save_trace.as_deref(), json),
        Cmd::Pwm {
            duty,
            pins,
            periods,
            json,
        } => pwm(&config, &duty, &pins, periods, json),
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<PeripheralConfig> {
    if let Some(path) = explicit {
        return PeripheralConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()));
    }
    match dirs::config_dir().map(|d| d.join("spipwm").join("config.json")) {
        Some(path) if path.is_file() => {
            info!("using config {}", path.display());
            PeripheralConfig::load(&path)
                .with_context(|| format!("loading config {}", path.display()))
        }
        _ => Ok(PeripheralConfig::default()),
    }
}

fn replay(config: &PeripheralConfig, path: &Path, json: bool) -> Result<()> {
    let inputs =
        load_trace(path).with_context(|| format!("reading trace {}", path.display()))?;
    info!("replaying {} ticks from {}", inputs.len(), path.display());
    run_and_report(config, inputs, json)
}

fn send(
    config: &PeripheralConfig,
    transactions: &[String],
    frames: &[String],
    read: bool,
    save_trace: Option<&Path>,
    json: bool,
) -> Result<()> {
    if transactions.is_empty() && frames.is_empty() {
        bail!("nothing to send: give ADDR:DATA pairs or --frame words");
    }
    let master = SpiMaster::new(config.master_timing())?;

    let mut inputs: Vec<PinInputs> = Vec::new();
    for t in transactions {
        let (addr, data) = t
            .split_once(':')
            .with_context(|| format!("'{t}' is not ADDR:DATA"))?;
        let addr = parse_hex_u8(addr)?;
        let data = parse_hex_u8(data)?;
        let samples = master.transaction(!read, addr, data)?;
        inputs.extend(samples.into_iter().map(PinInputs::from));
    }
    for f in frames {
        let word = parse_hex_u16(f)?;
        debug!("frame {word:04X} = {:?}", Command::from_word(word));
        inputs.extend(master.word(word).into_iter().map(PinInputs::from));
    }

    if let Some(path) = save_trace {
        std::fs::write(path, format_trace(&inputs))
            .with_context(|| format!("writing trace {}", path.display()))?;
        info!("saved {} ticks to {}", inputs.len(), path.display());
    }
    run_and_report(config, inputs, json)
}

fn run_and_report(config: &PeripheralConfig, inputs: Vec<PinInputs>, json: bool) -> Result<()> {
    let mut peripheral = Peripheral::new(config);
    let events = peripheral.subscribe();
    peripheral.run(inputs);
    let events: Vec<PeripheralEvent> = events.try_iter().collect();

    if json {
        let report = Report {
            ticks: peripheral.tick_count(),
            registers: *peripheral.registers(),
            outputs: peripheral.outputs(),
            events,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut log = FrameLog::new(config.log_capacity);
    for ev in &events {
        log.record(ev);
    }
    print!("{}", log.to_text_with_clock(true, false, Some(config.clock_rate())));
    println!("-- after {} ticks --", peripheral.tick_count());
    print_registers(peripheral.registers(), peripheral.outputs());
    Ok(())
}

fn pwm(config: &PeripheralConfig, duty: &str, pins: &str, periods: u64, json: bool) -> Result<()> {
    let duty = parse_hex_u8(duty)?;
    let mask = parse_hex_u16(pins)?;
    if mask == 0 {
        bail!("--pins must select at least one pin");
    }
    let [mask_lo, mask_hi] = mask.to_le_bytes();
    let master = SpiMaster::new(config.master_timing())?;

    let mut peripheral = Peripheral::new(config);
    let writes = [
        (0x00, mask_lo),
        (0x01, mask_hi),
        (0x02, mask_lo),
        (0x03, mask_hi),
        (0x04, duty),
    ];
    for (addr, data) in writes {
        peripheral.run(master.transaction(true, addr, data)?);
    }

    let pin = mask.trailing_zeros() as u8;
    let window = measure_window(peripheral.pwm().period_ticks(), periods);
    let activity = measure_pin(&mut peripheral, pin, window);
    let (frequency_hz, duty_percent) = match activity {
        PinActivity::Toggling(m) => (Some(m.frequency_hz(config.clock_rate())), m.duty_percent()),
        PinActivity::Steady(high) => (None, if high { 100.0 } else { 0.0 }),
    };

    if json {
        let report = PwmReport {
            pin,
            duty,
            frequency_hz,
            duty_percent,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match frequency_hz {
            Some(hz) => println!("pin {pin}: {hz:.2} Hz, {duty_percent:.1}% high (duty 0x{duty:02X})"),
            None => println!("pin {pin}: steady, {duty_percent:.0}% high (duty 0x{duty:02X})"),
        }
    }
    Ok(())
}

/// Ticks to watch a pin for; at least two PWM periods.
fn measure_window(period_ticks: u32, periods: u64) -> u64 {
    u64::from(period_ticks).saturating_mul(periods.max(2))
}

fn print_registers(bank: &RegisterBank, outputs: OutputPins) {
    for (reg, value) in bank.iter() {
        println!("  0x{:02X} {:<16} 0x{value:02X}", reg.address(), reg.name());
    }
    println!("  uo_out  = {:08b}", outputs.uo_out());
    println!("  uio_out = {:08b}", outputs.uio_out());
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>> {
    let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    let padded = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits.to_string()
    };
    hex::decode(&padded).with_context(|| format!("'{s}' is not a hex value"))
}

fn parse_hex_u8(s: &str) -> Result<u8> {
    match parse_hex_bytes(s)?.as_slice() {
        [b] => Ok(*b),
        _ => bail!("'{s}' does not fit in one byte"),
    }
}

fn parse_hex_u16(s: &str) -> Result<u16> {
    match parse_hex_bytes(s)?.as_slice() {
        [b] => Ok(u16::from(*b)),
        [hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => bail!("'{s}' does not fit in 16 bits"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex_u8("0x4").unwrap(), 4);
        assert_eq!(parse_hex_u8("AA").unwrap(), 0xAA);
        assert!(parse_hex_u8("1FF").is_err());
        assert!(parse_hex_u8("zz").is_err());
        assert_eq!(parse_hex_u16("84FF").unwrap(), 0x84FF);
        assert_eq!(parse_hex_u16("1").unwrap(), 1);
        assert!(parse_hex_u16("12345").is_err());
    }

    #[test]
    fn cli_parses_send() {
        let cli = Cli::try_parse_from(["spipwm", "send", "04:80", "--frame", "80AA"]).unwrap();
        match cli.command {
            Cmd::Send {
                transactions,
                frames,
                read,
                ..
            } => {
                assert_eq!(transactions, vec!["04:80".to_string()]);
                assert_eq!(frames, vec!["80AA".to_string()]);
                assert!(!read);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn measure_window_is_clamped() {
        assert_eq!(measure_window(3328, 0), 6656);
        assert_eq!(measure_window(3328, 4), 13312);
        assert_eq!(measure_window(3328, u64::MAX), u64::MAX);
    }

    #[test]
    fn empty_hex_is_rejected() {
        assert!(parse_hex_u8("").is_err());
    }
}
