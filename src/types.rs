use crate::constants::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of the analog source a session samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChannelId(pub u8);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Construction parameters for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub channel: ChannelId,
    /// Shunt resistance in ohms; zero or negative reports no current
    pub shunt_ohms: f64,
    pub sample_interval_ms: u32,
    pub baud_rate: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            channel: ChannelId::default(),
            shunt_ohms: 0.0,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl SessionConfig {
    pub fn new(channel: ChannelId, shunt_ohms: f64) -> Self {
        SessionConfig {
            channel,
            shunt_ohms,
            ..Default::default()
        }
    }

    /// Override the initial sample interval; zero keeps the default
    pub fn with_sample_interval(mut self, interval_ms: u32) -> Self {
        if interval_ms > 0 {
            self.sample_interval_ms = interval_ms;
        }
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// Session lifecycle. The handshake latch never returns to `AwaitingHandshake`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingHandshake,
    Idle,
    Streaming { started_at_ms: u64 },
}

/// Host command accepted once the handshake is done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Interval(u32),
    Baud(u32),
}

impl Command {
    /// Parse one inbound line. Unrecognized lines and comma forms without a
    /// comma yield `None`.
    pub fn parse(line: &str) -> Option<Command> {
        let body = line.trim().strip_prefix(PREFIX)?;
        match body {
            START_VERB => Some(Command::Start),
            STOP_VERB => Some(Command::Stop),
            _ => {
                let (verb, arg) = body.split_once(',')?;
                match verb {
                    INTERVAL_VERB => Some(Command::Interval(parse_leading_u32(arg))),
                    BAUD_VERB => Some(Command::Baud(parse_leading_u32(arg))),
                    _ => None,
                }
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start => write!(f, "{}{}", PREFIX, START_VERB),
            Command::Stop => write!(f, "{}{}", PREFIX, STOP_VERB),
            Command::Interval(ms) => write!(f, "{}{},{}", PREFIX, INTERVAL_VERB, ms),
            Command::Baud(rate) => write!(f, "{}{},{}", PREFIX, BAUD_VERB, rate),
        }
    }
}

/// Parse the leading decimal digits of `s`, ignoring anything after them.
///
/// No leading digit gives 0, and values past `u32::MAX` saturate.
pub fn parse_leading_u32(s: &str) -> u32 {
    s.trim_start()
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u32, |acc, b| {
            acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
        })
}

/// One sample as streamed to the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub elapsed_ms: u64,
    pub voltage: f64,
    pub current: f64,
}

impl Record {
    /// Convert a raw converter reading into a record.
    pub fn from_raw(elapsed_ms: u64, raw: u16, shunt_ohms: f64) -> Self {
        let raw = raw.min(ADC_MAX);
        let voltage = f64::from(raw) * REFERENCE_VOLTAGE / f64::from(ADC_MAX);
        let current = if shunt_ohms > 0.0 {
            voltage / shunt_ohms
        } else {
            0.0
        };
        Record {
            elapsed_ms,
            voltage,
            current,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{},{:.3},{:.3}",
            RECORD_PREFIX, self.elapsed_ms, self.voltage, self.current
        )
    }
}

impl FromStr for Record {
    type Err = crate::AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .trim()
            .strip_prefix(RECORD_PREFIX)
            .ok_or_else(|| crate::AgentError::Parse(format!("not a data record: {}", s)))?;

        let fields: Vec<&str> = body.split(',').collect();
        if fields.len() != 3 {
            return Err(crate::AgentError::Parse(format!(
                "expected 3 fields, got {}: {}",
                fields.len(),
                s
            )));
        }

        let field_err = |name: &str| crate::AgentError::Parse(format!("bad {} in {}", name, s));
        Ok(Record {
            elapsed_ms: fields[0].parse().map_err(|_| field_err("elapsed time"))?,
            voltage: fields[1].parse().map_err(|_| field_err("voltage"))?,
            current: fields[2].parse().map_err(|_| field_err("current"))?,
        })
    }
}

/// Outbound line produced by the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    Found,
    Started,
    Stopped,
    IntervalSet(u32),
    BaudSet(u32),
    Data(Record),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Found => f.write_str(FOUND),
            Reply::Started => write!(f, "{}STARTED", PREFIX),
            Reply::Stopped => write!(f, "{}STOPPED", PREFIX),
            Reply::IntervalSet(ms) => write!(f, "{}INTERVAL SET {}", PREFIX, ms),
            Reply::BaudSet(rate) => write!(f, "{}BAUD SET {}", PREFIX, rate),
            Reply::Data(record) => fmt::Display::fmt(record, f),
        }
    }
}

/// Side effect requested by one session step, in emission order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    Send(Reply),
    RestartTransport(u32),
}

/// Record received by the host, stamped on arrival
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub received_at: DateTime<Utc>,
    pub record: Record,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_verbs() {
        assert_eq!(Command::parse("OSCIL:START"), Some(Command::Start));
        assert_eq!(Command::parse("  OSCIL:STOP\r\n"), Some(Command::Stop));
        assert_eq!(Command::parse("OSCIL:STARTX"), None);
        assert_eq!(Command::parse("START"), None);
        assert_eq!(Command::parse("OSCIL:PING"), None);
    }

    #[test]
    fn comma_forms_use_leading_digits() {
        assert_eq!(
            Command::parse("OSCIL:INTERVAL,250"),
            Some(Command::Interval(250))
        );
        assert_eq!(
            Command::parse("OSCIL:INTERVAL,40ms"),
            Some(Command::Interval(40))
        );
        assert_eq!(Command::parse("OSCIL:INTERVAL,abc"), Some(Command::Interval(0)));
        assert_eq!(Command::parse("OSCIL:INTERVAL,-5"), Some(Command::Interval(0)));
        assert_eq!(Command::parse("OSCIL:BAUD,9600"), Some(Command::Baud(9600)));
    }

    #[test]
    fn comma_forms_without_comma_are_ignored() {
        assert_eq!(Command::parse("OSCIL:INTERVAL"), None);
        assert_eq!(Command::parse("OSCIL:BAUD 9600"), None);
        assert_eq!(Command::parse("OSCIL:GAIN,2"), None);
    }

    #[test]
    fn leading_digits_saturate() {
        assert_eq!(parse_leading_u32("99999999999"), u32::MAX);
        assert_eq!(parse_leading_u32(""), 0);
        assert_eq!(parse_leading_u32("12,34"), 12);
    }

    #[test]
    fn command_display_matches_wire_format() {
        assert_eq!(Command::Interval(100).to_string(), "OSCIL:INTERVAL,100");
        assert_eq!(Command::Baud(115200).to_string(), "OSCIL:BAUD,115200");
        assert_eq!(Command::Start.to_string(), "OSCIL:START");
    }

    #[test]
    fn record_scales_raw_reading() {
        let record = Record::from_raw(50, 512, 100.0);
        assert_eq!(record.to_string(), "D:50,2.502,0.025");

        let full_scale = Record::from_raw(0, 1023, 0.0);
        assert_eq!(full_scale.to_string(), "D:0,5.000,0.000");

        let clamped = Record::from_raw(0, 4000, -1.0);
        assert_eq!(clamped.voltage, 5.0);
        assert_eq!(clamped.current, 0.0);
    }

    #[test]
    fn record_parses_data_line() {
        let record: Record = "D:120,1.234,0.012\r\n".parse().unwrap();
        assert_eq!(record.elapsed_ms, 120);
        assert!((record.voltage - 1.234).abs() < 1e-9);
        assert!((record.current - 0.012).abs() < 1e-9);

        assert!("OSCIL:STARTED".parse::<Record>().is_err());
        assert!("D:1,2".parse::<Record>().is_err());
        assert!("D:x,1.0,2.0".parse::<Record>().is_err());
    }

    #[test]
    fn replies_render_protocol_lines() {
        assert_eq!(Reply::Found.to_string(), "OSCIL:FOUND");
        assert_eq!(Reply::Started.to_string(), "OSCIL:STARTED");
        assert_eq!(Reply::Stopped.to_string(), "OSCIL:STOPPED");
        assert_eq!(Reply::IntervalSet(250).to_string(), "OSCIL:INTERVAL SET 250");
        assert_eq!(Reply::BaudSet(9600).to_string(), "OSCIL:BAUD SET 9600");
    }

    #[test]
    fn config_ignores_zero_interval() {
        let config = SessionConfig::new(ChannelId(1), 10.0).with_sample_interval(0);
        assert_eq!(config.sample_interval_ms, DEFAULT_SAMPLE_INTERVAL_MS);
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
    }
}
