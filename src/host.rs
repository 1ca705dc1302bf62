//! Host side of the OSCIL protocol.
//!
//! Finds an agent by probing serial ports with the handshake, drives
//! streaming and collects the `D:` records it sends back.

use crate::constants::*;
use crate::error::{AgentError, Result};
use crate::transport::{SerialTransport, Transport};
use crate::types::*;
use chrono::Utc;
use log::{debug, info, warn};
use std::thread;
use std::time::{Duration, Instant};

/// Controller for one connected agent
pub struct Host<T = SerialTransport> {
    link: T,
}

impl Host<SerialTransport> {
    /// Open a port without handshaking
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let link = SerialTransport::open_with_timeout(
            port_name,
            baud_rate,
            Duration::from_millis(HOST_READ_TIMEOUT_MS),
        )?;
        Ok(Host { link })
    }

    /// List available serial ports
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
        SerialTransport::list_ports()
    }

    /// Open `port_name` at the boot rate and run the handshake.
    ///
    /// Opening the port resets most boards, so the probe is only sent after
    /// `HOST_RESET_DELAY_MS` and with the input buffer cleared.
    pub fn probe(port_name: &str) -> Result<Self> {
        let mut host = Self::open(port_name, DEFAULT_BAUD_RATE)?;
        thread::sleep(Duration::from_millis(HOST_RESET_DELAY_MS));
        host.link.clear_input()?;
        host.handshake(Duration::from_millis(HANDSHAKE_TIMEOUT_MS))?;
        Ok(host)
    }

    /// Probe every available port and return the first agent that answers
    pub fn find_device() -> Result<Self> {
        for port in Self::list_ports()? {
            match Self::probe(&port.port_name) {
                Ok(host) => {
                    info!("Connected to agent on {}", port.port_name);
                    return Ok(host);
                }
                Err(e) => warn!("{}: {}", port.port_name, e),
            }
        }
        Err(AgentError::DeviceNotFound)
    }
}

impl<T: Transport> Host<T> {
    /// Wrap an already open transport
    pub fn with_transport(link: T) -> Self {
        Host { link }
    }

    /// Send the probe and wait for `OSCIL:FOUND`, skipping other lines
    pub fn handshake(&mut self, timeout: Duration) -> Result<()> {
        self.link.write_line(PING)?;
        self.expect_line(FOUND, timeout)
    }

    pub fn start_sampling(&mut self) -> Result<()> {
        self.send(Command::Start)
    }

    pub fn stop_sampling(&mut self) -> Result<()> {
        self.send(Command::Stop)
    }

    pub fn set_interval(&mut self, interval_ms: u32) -> Result<()> {
        self.send(Command::Interval(interval_ms))
    }

    /// Ask the agent to change rate, wait for its acknowledgement at the old
    /// rate, then switch the local link.
    ///
    /// Records arriving before the acknowledgement are dropped.
    pub fn set_baud(&mut self, baud_rate: u32, timeout: Duration) -> Result<()> {
        self.send(Command::Baud(baud_rate))?;
        self.expect_line(&Reply::BaudSet(baud_rate).to_string(), timeout)?;
        self.link.restart(baud_rate)
    }

    /// Drain all complete pending lines and return the records among them
    pub fn read_samples(&mut self) -> Result<Vec<Sample>> {
        let mut samples = Vec::new();
        while let Some(line) = self.link.try_read_line()? {
            let line = line.trim();
            if !line.starts_with(RECORD_PREFIX) {
                debug!("Skipping line: {}", line);
                continue;
            }
            match line.parse::<Record>() {
                Ok(record) => samples.push(Sample {
                    received_at: Utc::now(),
                    record,
                }),
                Err(e) => warn!("Failed to parse agent data: {} ({})", line, e),
            }
        }
        Ok(samples)
    }

    pub fn transport(&self) -> &T {
        &self.link
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.link
    }

    fn send(&mut self, command: Command) -> Result<()> {
        let text = command.to_string();
        debug!("TX: {}", text);
        self.link.write_line(&text)
    }

    fn expect_line(&mut self, expected: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.link.try_read_line()? {
                Some(line) if line.trim() == expected => return Ok(()),
                Some(line) => debug!("Waiting for {}, got {}", expected, line),
                None => {
                    if Instant::now() >= deadline {
                        return Err(AgentError::Timeout);
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }
}
