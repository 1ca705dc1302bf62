//! Protocol constants for the OSCIL serial protocol.
//!
//! This module defines the command and reply strings exchanged with the host,
//! the sampling defaults and the serial port timing parameters.

/// Prefix carried by every command and acknowledgement line
pub const PREFIX: &str = "OSCIL:";

/// Handshake probe sent by the host
pub const PING: &str = "OSCIL:PING";

/// Handshake acknowledgement sent by the agent
pub const FOUND: &str = "OSCIL:FOUND";

/// Prefix of a data record line
pub const RECORD_PREFIX: &str = "D:";

/// Start streaming
pub const START_VERB: &str = "START";

/// Stop streaming
pub const STOP_VERB: &str = "STOP";

/// Change the sample interval (`INTERVAL,<ms>`)
pub const INTERVAL_VERB: &str = "INTERVAL";

/// Change the link rate (`BAUD,<rate>`)
pub const BAUD_VERB: &str = "BAUD";

/// Default sample interval in milliseconds
pub const DEFAULT_SAMPLE_INTERVAL_MS: u32 = 10;

/// Baud rate the agent boots with (500 kbps)
pub const DEFAULT_BAUD_RATE: u32 = 500_000;

/// Largest raw reading of the 10-bit converter
pub const ADC_MAX: u16 = 1023;

/// Converter reference voltage
pub const REFERENCE_VOLTAGE: f64 = 5.0;

/// Longest inbound line kept by the line buffer, in bytes
pub const MAX_LINE_LEN: usize = 128;

/// Read timeout for the agent side port; reads are gated by `bytes_to_read`
pub const AGENT_READ_TIMEOUT_MS: u64 = 1;

/// Read timeout for the host side port
pub const HOST_READ_TIMEOUT_MS: u64 = 1000;

/// Time the host waits after opening a port for the board to come out of reset
pub const HOST_RESET_DELAY_MS: u64 = 2000;

/// Time the host waits for `OSCIL:FOUND` after sending the probe
pub const HANDSHAKE_TIMEOUT_MS: u64 = 3000;

/// Pause between agent poll cycles in the desktop demo loop
pub const AGENT_POLL_DELAY_US: u64 = 200;
