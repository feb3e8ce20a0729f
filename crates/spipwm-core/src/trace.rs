//! Plain-text line traces.
//!
//! One step per line: three `0`/`1` characters giving `ncs`, `copi` and
//! `sclk` (the order of the pins on the input port), optionally followed by a
//! repeat count of at most [`MAX_REPEAT`]. `reset [count]` holds the reset
//! pin low; line levels are not recorded for reset steps since the model
//! ignores them while reset is held. Blank lines and anything after `#` are
//! ignored.
//!
//! ```text
//! # select, first bit, clock low
//! 010 50
//! 011 50
//! reset 5
//! ```

use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use spipwm_decode::LineSample;

use crate::peripheral::PinInputs;

/// Largest repeat count accepted on a single trace line.
pub const MAX_REPEAT: u32 = 1 << 24;

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// One trace line before expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceStep {
    pub inputs: PinInputs,
    pub repeat: u32,
}

impl FromStr for TraceStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();
        let head = fields.next().ok_or("empty step")?;
        let repeat = match fields.next() {
            Some(n) => n
                .parse::<u32>()
                .ok()
                .filter(|&n| n > 0 && n <= MAX_REPEAT)
                .ok_or_else(|| format!("bad repeat count '{n}' (1..={MAX_REPEAT})"))?,
            None => 1,
        };
        if let Some(extra) = fields.next() {
            return Err(format!("unexpected '{extra}'"));
        }

        let inputs = if head.eq_ignore_ascii_case("reset") {
            PinInputs::reset()
        } else {
            PinInputs::run(parse_levels(head)?)
        };
        Ok(Self { inputs, repeat })
    }
}

fn parse_levels(s: &str) -> Result<LineSample, String> {
    let bits: Vec<bool> = s
        .chars()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            other => Err(format!("bad level '{other}'")),
        })
        .collect::<Result<_, _>>()?;
    match bits.as_slice() {
        &[ncs, copi, sclk] => Ok(LineSample::new(ncs, copi, sclk)),
        _ => Err(format!("expected 3 levels, got '{s}'")),
    }
}

pub fn parse_trace(text: &str) -> Result<Vec<PinInputs>, TraceError> {
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let step: TraceStep = line.parse().map_err(|message| TraceError::Parse {
            line: idx + 1,
            message,
        })?;
        out.extend(std::iter::repeat(step.inputs).take(step.repeat as usize));
    }
    Ok(out)
}

pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Vec<PinInputs>, TraceError> {
    let text = std::fs::read_to_string(path)?;
    parse_trace(&text)
}

/// Writes `inputs` with consecutive identical steps folded into one line.
///
/// Every step with reset asserted is written as plain `reset`, so it reads
/// back as [`PinInputs::reset`] whatever its line levels were.
pub fn write_trace<W: Write>(mut w: W, inputs: &[PinInputs]) -> std::io::Result<()> {
    let mut iter = inputs.iter().map(|i| normalize(*i)).peekable();
    while let Some(first) = iter.next() {
        let mut repeat = 1u32;
        while iter.peek() == Some(&first) && repeat < MAX_REPEAT {
            iter.next();
            repeat += 1;
        }
        let head = if first.rst_n {
            let l = first.lines;
            format!("{}{}{}", u8::from(l.ncs), u8::from(l.copi), u8::from(l.sclk))
        } else {
            "reset".to_string()
        };
        if repeat == 1 {
            writeln!(w, "{head}")?;
        } else {
            writeln!(w, "{head} {repeat}")?;
        }
    }
    Ok(())
}

fn normalize(inputs: PinInputs) -> PinInputs {
    if inputs.rst_n {
        inputs
    } else {
        PinInputs::reset()
    }
}

pub fn format_trace(inputs: &[PinInputs]) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_trace(&mut buf, inputs);
    String::from_utf8_lossy(&buf).into_owned()
}
