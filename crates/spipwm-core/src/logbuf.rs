use std::collections::VecDeque;

use spipwm_decode::{ClockRate, Command, DiscardReason, FrameOutcome, Register};

use crate::peripheral::PeripheralEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Commit { register: Register, value: u8 },
    Discard(DiscardReason),
    Abort { bits: u8 },
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    pub tick: u64,
    pub kind: EntryKind,
}

impl From<&PeripheralEvent> for LogEntry {
    fn from(event: &PeripheralEvent) -> Self {
        let kind = match *event {
            PeripheralEvent::Frame { outcome, .. } => match outcome {
                FrameOutcome::Committed { register, value } => EntryKind::Commit { register, value },
                FrameOutcome::Discarded(reason) => EntryKind::Discard(reason),
                FrameOutcome::Aborted { bits } => EntryKind::Abort { bits },
            },
            PeripheralEvent::Reset { .. } => EntryKind::Reset,
        };
        Self {
            tick: event.tick(),
            kind,
        }
    }
}

/// Bounded history of frame activity, oldest entries dropped first.
pub struct FrameLog {
    entries: VecDeque<LogEntry>,
    max_entries: usize,
    show_commits: bool,
    show_discards: bool,
}

impl FrameLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
            show_commits: true,
            show_discards: true,
        }
    }

    /// Discards here include aborted frames. Resets are always shown.
    pub fn set_filter(&mut self, show_commits: bool, show_discards: bool) {
        self.show_commits = show_commits;
        self.show_discards = show_discards;
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn record(&mut self, event: &PeripheralEvent) {
        self.push(LogEntry::from(event));
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn commits(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.kind, EntryKind::Commit { .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_text(&self, show_tick: bool, show_hex: bool) -> String {
        self.to_text_with_clock(show_tick, show_hex, None)
    }

    /// With a clock rate the tick column is printed as microseconds.
    pub fn to_text_with_clock(
        &self,
        show_tick: bool,
        show_hex: bool,
        clock: Option<ClockRate>,
    ) -> String {
        let mut result = String::new();
        for entry in &self.entries {
            let visible = match entry.kind {
                EntryKind::Commit { .. } => self.show_commits,
                EntryKind::Discard(_) | EntryKind::Abort { .. } => self.show_discards,
                EntryKind::Reset => true,
            };
            if !visible {
                continue;
            }

            if show_tick {
                match clock {
                    Some(rate) => {
                        let us = rate.ticks_to_secs(entry.tick) * 1e6;
                        result.push_str(&format!("[{us:>12.3} us] "));
                    }
                    None => result.push_str(&format!("[{:>10}] ", entry.tick)),
                }
            }

            let line = if show_hex {
                hex_line(&entry.kind)
            } else {
                named_line(&entry.kind)
            };
            result.push_str(&line);
            result.push('\n');
        }
        result
    }
}

fn hex_line(kind: &EntryKind) -> String {
    match *kind {
        EntryKind::Commit { register, value } => {
            let word = Command::write(register.address(), value).to_word();
            format!("W {word:04X}")
        }
        EntryKind::Discard(DiscardReason::NotWrite(cmd))
        | EntryKind::Discard(DiscardReason::UnmappedAddress(cmd)) => {
            format!("- {:04X}", cmd.to_word())
        }
        EntryKind::Discard(DiscardReason::BitCount(n)) => format!("- ????/{n}"),
        EntryKind::Abort { bits } => format!("! ????/{bits}"),
        EntryKind::Reset => "R".to_string(),
    }
}

fn named_line(kind: &EntryKind) -> String {
    match kind {
        EntryKind::Commit { register, value } => format!("WRITE {register} = 0x{value:02X}"),
        EntryKind::Discard(reason) => format!("DROP  {reason}"),
        EntryKind::Abort { bits } => format!("ABORT after {bits} bits"),
        EntryKind::Reset => "RESET".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spipwm_decode::TickSpan;

    fn commit(tick: u64, register: Register, value: u8) -> LogEntry {
        LogEntry {
            tick,
            kind: EntryKind::Commit { register, value },
        }
    }

    #[test]
    fn oldest_entries_are_dropped() {
        let mut log = FrameLog::new(2);
        for (i, v) in [1u8, 2, 3].into_iter().enumerate() {
            log.push(commit(i as u64, Register::DutyCycle, v));
        }
        let ticks: Vec<u64> = log.entries().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![1, 2]);
    }

    #[test]
    fn records_peripheral_events() {
        let mut log = FrameLog::new(8);
        log.record(&PeripheralEvent::Frame {
            span: TickSpan { start: 3, end: 70 },
            outcome: FrameOutcome::Discarded(DiscardReason::BitCount(12)),
        });
        log.record(&PeripheralEvent::Reset { tick: 90 });
        let entries: Vec<_> = log.entries().copied().collect();
        assert_eq!(entries[0].tick, 70);
        assert_eq!(entries[0].kind, EntryKind::Discard(DiscardReason::BitCount(12)));
        assert_eq!(entries[1].kind, EntryKind::Reset);
    }

    #[test]
    fn named_text() {
        let mut log = FrameLog::new(8);
        log.push(commit(5, Register::OutEnableLow, 0xAA));
        assert_eq!(log.to_text(true, false), "[         5] WRITE out_enable_low = 0xAA\n");
    }

    #[test]
    fn hex_text_shows_frame_word() {
        let mut log = FrameLog::new(8);
        log.push(commit(0, Register::DutyCycle, 0x80));
        log.push(LogEntry {
            tick: 1,
            kind: EntryKind::Discard(DiscardReason::NotWrite(Command::from_word(0x30BE))),
        });
        assert_eq!(log.to_text(false, true), "W 8480\n- 30BE\n");
    }

    #[test]
    fn filter_hides_commits_but_not_resets() {
        let mut log = FrameLog::new(8);
        log.push(commit(0, Register::DutyCycle, 1));
        log.push(LogEntry {
            tick: 1,
            kind: EntryKind::Reset,
        });
        log.set_filter(false, true);
        assert_eq!(log.to_text(false, false), "RESET\n");
        assert_eq!(log.commits(), 1);
    }

    #[test]
    fn clock_column_in_microseconds() {
        let mut log = FrameLog::new(8);
        log.push(commit(50, Register::DutyCycle, 1));
        let text = log.to_text_with_clock(true, false, Some(ClockRate(10_000_000)));
        assert!(text.starts_with("[       5.000 us] "), "{text}");
    }
}
