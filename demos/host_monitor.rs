//! Host Monitor Example
//!
//! Finds an OSCIL agent on any serial port, starts streaming and prints the
//! received samples, with a JSON export of the last one.
//!
//! Usage:
//!   cargo run --example host_monitor                 # Probe all ports
//!   cargo run --example host_monitor -- 250          # Sample interval in ms
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example host_monitor

use log::{error, info};
use oscil_agent::{Host, Result};
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let interval_ms: u32 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(100);

    info!("Searching for agent...");
    let mut host = match Host::find_device() {
        Ok(host) => host,
        Err(e) => {
            error!("{}", e);
            error!("Check that:");
            error!("1. The board is plugged in and running the agent");
            error!("2. No other program holds the serial port");
            return Err(e);
        }
    };

    host.set_interval(interval_ms)?;
    host.start_sampling()?;

    let started = Instant::now();
    let mut last = None;
    while started.elapsed() < Duration::from_secs(5) {
        for sample in host.read_samples()? {
            info!(
                "t={}ms  V={:.3}  I={:.3}",
                sample.record.elapsed_ms, sample.record.voltage, sample.record.current
            );
            last = Some(sample);
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    host.stop_sampling()?;

    if let Some(sample) = last {
        if let Ok(json) = serde_json::to_string_pretty(&sample) {
            info!("Last sample:");
            info!("{}", json);
        }
    }

    Ok(())
}
