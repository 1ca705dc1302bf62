//! Scriptable collaborators for driving an agent without hardware.

use crate::error::{AgentError, Result};
use crate::source::{AnalogInput, Clock};
use crate::transport::Transport;
use crate::types::ChannelId;
use std::collections::VecDeque;
use std::io;

/// In-memory transport: scripted inbound lines, recorded outbound lines and restarts.
#[derive(Debug, Default)]
pub struct FakeTransport {
    inbound: VecDeque<String>,
    writes: Vec<String>,
    restarts: Vec<u32>,
    fail_next_read: bool,
    fail_writes: bool,
    fail_restarts: bool,
}

impl FakeTransport {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FakeTransport {
            inbound: lines.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Queue one more inbound line
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.inbound.push_back(line.into());
    }

    pub fn fail_next_read(&mut self) {
        self.fail_next_read = true;
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn set_fail_restarts(&mut self, fail: bool) {
        self.fail_restarts = fail;
    }

    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    /// Take the lines written so far
    pub fn take_writes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.writes)
    }

    pub fn restarts(&self) -> &[u32] {
        &self.restarts
    }

    pub fn pending_lines(&self) -> usize {
        self.inbound.len()
    }
}

impl Transport for FakeTransport {
    fn try_read_line(&mut self) -> Result<Option<String>> {
        if std::mem::take(&mut self.fail_next_read) {
            return Err(AgentError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted read failure",
            )));
        }
        Ok(self.inbound.pop_front())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        if self.fail_writes {
            return Err(AgentError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        self.writes.push(line.to_string());
        Ok(())
    }

    fn restart(&mut self, baud_rate: u32) -> Result<()> {
        if self.fail_restarts {
            return Err(AgentError::InvalidResponse {
                expected: "supported baud rate".to_string(),
                actual: baud_rate.to_string(),
            });
        }
        self.restarts.push(baud_rate);
        Ok(())
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualClock {
    now_ms: u64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        ManualClock { now_ms }
    }

    pub fn set(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }
}

/// Analog input returning the same reading every time
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FixedInput(pub u16);

impl AnalogInput for FixedInput {
    fn read_raw(&mut self, _channel: ChannelId) -> u16 {
        self.0
    }
}

/// Analog input replaying a list of readings; the last one repeats.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    readings: VecDeque<u16>,
    last: u16,
    reads: Vec<ChannelId>,
}

impl ScriptedInput {
    pub fn new(readings: impl IntoIterator<Item = u16>) -> Self {
        ScriptedInput {
            readings: readings.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Channels read so far, in order
    pub fn reads(&self) -> &[ChannelId] {
        &self.reads
    }
}

impl AnalogInput for ScriptedInput {
    fn read_raw(&mut self, channel: ChannelId) -> u16 {
        self.reads.push(channel);
        if let Some(next) = self.readings.pop_front() {
            self.last = next;
        }
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_transport_scripts_reads_and_writes() {
        let mut fake = FakeTransport::new(["first"]);
        fake.fail_next_read();
        assert!(fake.try_read_line().is_err());
        assert_eq!(fake.try_read_line().unwrap().as_deref(), Some("first"));
        assert_eq!(fake.try_read_line().unwrap(), None);

        fake.write_line("PING").unwrap();
        fake.restart(9600).unwrap();
        assert_eq!(fake.writes(), &["PING".to_string()]);
        assert_eq!(fake.restarts(), &[9600]);

        fake.set_fail_writes(true);
        assert!(fake.write_line("lost").is_err());
        assert_eq!(fake.take_writes(), vec!["PING".to_string()]);
    }

    #[test]
    fn scripted_input_repeats_last_reading() {
        let mut input = ScriptedInput::new([1, 2]);
        assert_eq!(input.read_raw(ChannelId(4)), 1);
        assert_eq!(input.read_raw(ChannelId(4)), 2);
        assert_eq!(input.read_raw(ChannelId(4)), 2);
        assert_eq!(input.reads().len(), 3);
    }

    #[test]
    fn manual_clock_moves_on_request() {
        let mut clock = ManualClock::new(10);
        clock.advance(5);
        assert_eq!(clock.now_ms(), 15);
        clock.set(3);
        assert_eq!(clock.now_ms(), 3);
    }
}
