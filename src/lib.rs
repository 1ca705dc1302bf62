//! # OSCIL Agent Library
//!
//! A Rust library for streaming voltage and current readings from an analog
//! channel over a serial link, driven by the small OSCIL text protocol.
//!
//! ## Features
//!
//! - Handshake gate (`OSCIL:PING` / `OSCIL:FOUND`) before any other traffic
//! - START/STOP streaming, runtime sample interval and link rate changes
//! - `D:<elapsed>,<voltage>,<current>` records computed from raw readings
//! - Serial transport with partial-line buffering
//! - Host-side client that discovers the agent and collects samples
//!
//! ## Example
//!
//! ```no_run
//! use oscil_agent::{Agent, ChannelId, MonotonicClock, SerialTransport, SessionConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new(ChannelId(0), 100.0);
//!     let transport = SerialTransport::open("/dev/ttyUSB0", config.baud_rate)?;
//!     let adc = |_channel: ChannelId| 512u16;
//!     let mut agent = Agent::new(config, transport, adc, MonotonicClock::new());
//!     agent.begin()?;
//!     loop {
//!         agent.poll()?;
//!     }
//! }
//! ```

pub mod constants;
pub mod error;
pub mod fake;
pub mod host;
pub mod protocol;
pub mod source;
pub mod transport;
pub mod types;

pub use error::{AgentError, Result};
pub use host::Host;
pub use protocol::{Agent, Session};
pub use source::{AnalogInput, Clock, MonotonicClock};
pub use transport::{LineBuffer, SerialTransport, Transport};
pub use types::*;
