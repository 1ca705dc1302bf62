//! Analog input and clock collaborators consumed by the agent.

use crate::types::ChannelId;
use std::time::Instant;

/// Source of raw converter readings.
///
/// Reads are expected to complete immediately and always succeed; values
/// above `ADC_MAX` are clamped when converted.
pub trait AnalogInput {
    fn read_raw(&mut self, channel: ChannelId) -> u16;
}

impl<F> AnalogInput for F
where
    F: FnMut(ChannelId) -> u16,
{
    fn read_raw(&mut self, channel: ChannelId) -> u16 {
        self(channel)
    }
}

/// Monotonic millisecond clock
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Clock counting milliseconds since it was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}
