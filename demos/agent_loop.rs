//! Agent Loop Example
//!
//! Runs the agent side of the protocol on a desktop serial port, feeding it a
//! synthetic triangle wave instead of a real converter. Useful for exercising
//! a host application against a USB-serial loopback or a null-modem pair.
//!
//! Usage:
//!   cargo run --example agent_loop                  # Interactive mode
//!   cargo run --example agent_loop -- /dev/ttyUSB0  # Specify port
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example agent_loop

use inquire::Select;
use log::{error, info};
use oscil_agent::{
    constants::{ADC_MAX, AGENT_POLL_DELAY_US},
    Agent, ChannelId, MonotonicClock, Result, SerialTransport, SessionConfig,
};
use std::time::Duration;

/// Interactive serial port selection using inquire
fn select_port() -> Result<String> {
    let ports = SerialTransport::list_ports()?;

    if ports.is_empty() {
        eprintln!("No serial ports found!");
        std::process::exit(1);
    }

    let port_names: Vec<String> = ports
        .iter()
        .map(|p| format!("{} - {:?}", p.port_name, p.port_type))
        .collect();

    let selection = Select::new("Select a serial port:", port_names)
        .prompt()
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Selection cancelled: {}", e),
            )
        })?;

    // Extract just the port name (before " - ")
    let port_name = selection.split(" - ").next().unwrap_or_default().to_string();
    Ok(port_name)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let port_name = std::env::args()
        .nth(1)
        .map(Ok)
        .unwrap_or_else(select_port)?;

    let config = SessionConfig::new(ChannelId(0), 100.0);
    let transport = SerialTransport::open(&port_name, config.baud_rate)?;

    let mut step: u16 = 0;
    let triangle = move |_channel: ChannelId| {
        step = (step + 1) % (2 * ADC_MAX);
        if step > ADC_MAX {
            2 * ADC_MAX - step
        } else {
            step
        }
    };

    let mut agent = Agent::new(config, transport, triangle, MonotonicClock::new());
    agent.begin()?;
    info!(
        "Waiting for host handshake on {} at {} baud...",
        agent.transport().name().unwrap_or(port_name),
        agent.transport().baud_rate()?
    );

    let mut connected = false;
    loop {
        if let Err(e) = agent.poll() {
            error!("Read failed: {}", e);
            return Err(e);
        }
        if agent.is_connected() && !connected {
            connected = true;
            info!("Host connected");
        }
        std::thread::sleep(Duration::from_micros(AGENT_POLL_DELAY_US));
    }
}
