//! Line-oriented transport between agent and host.
//!
//! [`Transport`] is the seam the agent talks through. [`SerialTransport`]
//! implements it over a `serialport` handle, buffering partial input in a
//! [`LineBuffer`] so that reads never wait for a full line.

use crate::constants::*;
use crate::error::Result;
use log::{trace, warn};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

/// Transport capability injected into the agent
pub trait Transport {
    /// Return the next complete line if one is available, without blocking
    fn try_read_line(&mut self) -> Result<Option<String>>;

    /// Send one line; the terminator is added by the transport
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Restart the link at a new rate
    fn restart(&mut self, baud_rate: u32) -> Result<()>;
}

/// Accumulates raw bytes and splits them into newline-terminated lines.
///
/// `\n` and `\r\n` both terminate a line. Lines longer than the limit are
/// dropped up to and including their terminator.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_len: usize,
    discarding: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(MAX_LINE_LEN)
    }
}

impl LineBuffer {
    pub fn new(max_len: usize) -> Self {
        LineBuffer {
            buf: Vec::new(),
            max_len,
            discarding: false,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    /// Bytes of the current partial line
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let end = match self.buf.iter().position(|&b| b == b'\n') {
                Some(end) => end,
                None => {
                    if self.buf.len() > self.max_len {
                        warn!("Discarding over-long input line ({} bytes)", self.buf.len());
                        self.buf.clear();
                        self.discarding = true;
                    }
                    return None;
                }
            };

            let raw: Vec<u8> = self.buf.drain(..=end).collect();
            let content = &raw[..end];
            let content = content.strip_suffix(b"\r").unwrap_or(content);

            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if content.len() > self.max_len {
                warn!("Discarding over-long input line ({} bytes)", content.len());
                continue;
            }

            return Some(String::from_utf8_lossy(content).into_owned());
        }
    }
}

/// [`Transport`] over a serial port
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    lines: LineBuffer,
}

impl SerialTransport {
    /// Open a port for the agent side; reads only consume bytes already received
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        Self::open_with_timeout(
            port_name,
            baud_rate,
            Duration::from_millis(AGENT_READ_TIMEOUT_MS),
        )
    }

    pub fn open_with_timeout(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(timeout)
            .open()?;

        Ok(SerialTransport {
            port,
            lines: LineBuffer::default(),
        })
    }

    /// List available serial ports
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
        Ok(serialport::available_ports()?)
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }

    pub fn baud_rate(&self) -> Result<u32> {
        Ok(self.port.baud_rate()?)
    }

    /// Drop anything received so far, buffered or not
    pub fn clear_input(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        self.lines.clear();
        Ok(())
    }

    /// Poll for a line until `timeout` passes
    pub fn read_line_timeout(&mut self, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(line) = self.try_read_line()? {
                return Ok(Some(line));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn fill(&mut self) -> Result<()> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(());
        }

        let mut chunk = vec![0u8; available];
        match self.port.read(&mut chunk) {
            Ok(n) => {
                trace!("Read {} bytes", n);
                self.lines.push(&chunk[..n]);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Transport for SerialTransport {
    fn try_read_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.lines.next_line() {
            return Ok(Some(line));
        }
        self.fill()?;
        Ok(self.lines.next_line())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\r\n")?;
        self.port.flush()?;
        Ok(())
    }

    fn restart(&mut self, baud_rate: u32) -> Result<()> {
        self.port.flush()?;
        self.port.set_baud_rate(baud_rate)?;
        self.clear_input()
    }
}
