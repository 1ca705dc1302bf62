use crate::constants::*;
use crate::error::Result;
use crate::source::{AnalogInput, Clock};
use crate::transport::Transport;
use crate::types::*;
use log::{debug, info, warn};

/// Protocol state machine for one agent.
///
/// `Session` performs no I/O of its own: every step takes the current time
/// and at most one inbound line and returns the effects to apply.
#[derive(Debug, Clone)]
pub struct Session {
    channel: ChannelId,
    shunt_ohms: f64,
    sample_interval_ms: u32,
    last_sample_ms: u64,
    phase: Phase,
}

impl Session {
    /// Create a session waiting for the handshake
    pub fn new(config: &SessionConfig) -> Self {
        let sample_interval_ms = if config.sample_interval_ms > 0 {
            config.sample_interval_ms
        } else {
            DEFAULT_SAMPLE_INTERVAL_MS
        };

        Session {
            channel: config.channel,
            shunt_ohms: config.shunt_ohms,
            sample_interval_ms,
            last_sample_ms: 0,
            phase: Phase::AwaitingHandshake,
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn shunt_ohms(&self) -> f64 {
        self.shunt_ohms
    }

    pub fn sample_interval_ms(&self) -> u32 {
        self.sample_interval_ms
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_handshaken(&self) -> bool {
        self.phase != Phase::AwaitingHandshake
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.phase, Phase::Streaming { .. })
    }

    /// Run one poll cycle.
    ///
    /// Until the handshake completes only the probe is looked at. Afterwards
    /// the line (if any) is dispatched as a command and then the sampling
    /// scheduler runs, reading `input` only when a sample is due.
    pub fn step<A: AnalogInput>(
        &mut self,
        now_ms: u64,
        line: Option<&str>,
        input: &mut A,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();

        if !self.is_handshaken() {
            if self.check_handshake(line, &mut effects) {
                self.phase = Phase::Idle;
                info!("Handshake complete on channel {}", self.channel);
            }
            return effects;
        }

        if let Some(line) = line {
            self.process_command(now_ms, line, &mut effects);
        }

        if self.sample_due(now_ms) {
            let raw = input.read_raw(self.channel);
            if let Some(record) = self.emit_record(now_ms, raw) {
                effects.push(Effect::Send(Reply::Data(record)));
            }
        }

        effects
    }

    /// Look for the handshake probe; acknowledges it and returns true when found
    pub fn check_handshake(&self, line: Option<&str>, effects: &mut Vec<Effect>) -> bool {
        match line {
            Some(line) if line.trim() == PING => {
                effects.push(Effect::Send(Reply::Found));
                true
            }
            _ => false,
        }
    }

    /// Dispatch one command line. Unknown or rejected commands produce nothing.
    pub fn process_command(&mut self, now_ms: u64, line: &str, effects: &mut Vec<Effect>) {
        if !self.is_handshaken() {
            return;
        }

        let command = match Command::parse(line) {
            Some(command) => command,
            None => {
                debug!("Ignoring line: {:?}", line);
                return;
            }
        };

        match command {
            Command::Start => {
                self.phase = Phase::Streaming {
                    started_at_ms: now_ms,
                };
                effects.push(Effect::Send(Reply::Started));
            }
            Command::Stop => {
                self.phase = Phase::Idle;
                effects.push(Effect::Send(Reply::Stopped));
            }
            Command::Interval(ms) if ms > 0 => {
                self.sample_interval_ms = ms;
                effects.push(Effect::Send(Reply::IntervalSet(ms)));
            }
            Command::Baud(rate) if rate > 0 => {
                effects.push(Effect::Send(Reply::BaudSet(rate)));
                effects.push(Effect::RestartTransport(rate));
            }
            Command::Interval(_) | Command::Baud(_) => {
                debug!("Rejecting zero value in {:?}", line);
            }
        }
    }

    /// Sampling scheduler: true when streaming and at least one interval has
    /// passed since the last sample. Snaps the sample time to `now_ms`.
    pub fn sample_due(&mut self, now_ms: u64) -> bool {
        if !self.is_streaming() {
            return false;
        }

        if now_ms.saturating_sub(self.last_sample_ms) >= u64::from(self.sample_interval_ms) {
            self.last_sample_ms = now_ms;
            true
        } else {
            false
        }
    }

    /// Build the record for a raw reading taken at `now_ms`.
    ///
    /// Returns `None` when not streaming, since there is no elapsed-time origin.
    pub fn emit_record(&self, now_ms: u64, raw: u16) -> Option<Record> {
        match self.phase {
            Phase::Streaming { started_at_ms } => Some(Record::from_raw(
                now_ms.saturating_sub(started_at_ms),
                raw,
                self.shunt_ohms,
            )),
            _ => None,
        }
    }
}

/// Agent wiring a [`Session`] to its transport, analog input and clock.
pub struct Agent<T, A, C> {
    session: Session,
    baud_rate: u32,
    transport: T,
    input: A,
    clock: C,
}

impl<T: Transport, A: AnalogInput, C: Clock> Agent<T, A, C> {
    pub fn new(config: SessionConfig, transport: T, input: A, clock: C) -> Self {
        Agent {
            session: Session::new(&config),
            baud_rate: config.baud_rate,
            transport,
            input,
            clock,
        }
    }

    /// Bring the transport up at the configured rate
    pub fn begin(&mut self) -> Result<()> {
        info!(
            "Starting agent on channel {} at {} baud",
            self.session.channel(),
            self.baud_rate
        );
        self.transport.restart(self.baud_rate)
    }

    /// One cooperative poll cycle.
    ///
    /// Only a failing read is returned, and only after the cycle has run
    /// without input so a due sample still goes out. Write and restart
    /// failures are logged and the session carries on.
    pub fn poll(&mut self) -> Result<()> {
        let now_ms = self.clock.now_ms();
        let (line, read_err) = match self.transport.try_read_line() {
            Ok(line) => (line, None),
            Err(e) => (None, Some(e)),
        };
        if let Some(line) = line.as_deref() {
            debug!("RX: {}", line);
        }

        let effects = self.session.step(now_ms, line.as_deref(), &mut self.input);
        for effect in effects {
            self.apply(effect);
        }

        match read_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Send(reply) => {
                let text = reply.to_string();
                debug!("TX: {}", text);
                if let Err(e) = self.transport.write_line(&text) {
                    warn!("Failed to send {:?}: {}", text, e);
                }
            }
            Effect::RestartTransport(rate) => match self.transport.restart(rate) {
                Ok(()) => {
                    info!("Transport restarted at {} baud", rate);
                    self.baud_rate = rate;
                }
                Err(e) => warn!("Failed to restart transport at {} baud: {}", rate, e),
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_handshaken()
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn input_mut(&mut self) -> &mut A {
        &mut self.input
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FixedInput;

    fn handshaken(interval_ms: u32) -> Session {
        let config = SessionConfig::new(ChannelId(0), 100.0).with_sample_interval(interval_ms);
        let mut session = Session::new(&config);
        session.step(0, Some("OSCIL:PING"), &mut FixedInput(0));
        session
    }

    fn lines(effects: &[Effect]) -> Vec<String> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Send(reply) => Some(reply.to_string()),
                Effect::RestartTransport(_) => None,
            })
            .collect()
    }

    #[test]
    fn gate_requires_exact_probe() {
        let mut session = Session::new(&SessionConfig::default());
        let mut input = FixedInput(512);

        for line in ["OSCIL:START", "oscil:ping", "OSCIL:PINGX", "PING"] {
            assert!(session.step(0, Some(line), &mut input).is_empty());
        }
        assert!(session.step(0, None, &mut input).is_empty());
        assert!(!session.is_handshaken());

        let effects = session.step(5, Some("  OSCIL:PING \r"), &mut input);
        assert_eq!(lines(&effects), vec!["OSCIL:FOUND"]);
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn probe_after_gate_is_ignored() {
        let mut session = handshaken(10);
        let effects = session.step(1, Some("OSCIL:PING"), &mut FixedInput(0));
        assert!(effects.is_empty());
        assert!(session.is_handshaken());
    }

    #[test]
    fn interval_guard() {
        let mut session = handshaken(10);
        let mut input = FixedInput(0);

        for line in ["OSCIL:INTERVAL,0", "OSCIL:INTERVAL,-5", "OSCIL:INTERVAL,abc"] {
            assert!(session.step(1, Some(line), &mut input).is_empty());
            assert_eq!(session.sample_interval_ms(), 10);
        }

        let effects = session.step(2, Some("OSCIL:INTERVAL,250"), &mut input);
        assert_eq!(lines(&effects), vec!["OSCIL:INTERVAL SET 250"]);
        assert_eq!(session.sample_interval_ms(), 250);
    }

    #[test]
    fn baud_acknowledges_then_restarts() {
        let mut session = handshaken(10);
        let effects = session.step(1, Some("OSCIL:BAUD,9600"), &mut FixedInput(0));
        assert_eq!(
            effects,
            vec![
                Effect::Send(Reply::BaudSet(9600)),
                Effect::RestartTransport(9600)
            ]
        );
    }

    #[test]
    fn zero_baud_is_rejected() {
        let mut session = handshaken(10);
        let mut input = FixedInput(0);
        assert!(session.step(1, Some("OSCIL:BAUD,0"), &mut input).is_empty());
        assert!(session.step(1, Some("OSCIL:BAUD,fast"), &mut input).is_empty());
    }

    #[test]
    fn stop_is_acknowledged_when_idle() {
        let mut session = handshaken(10);
        let effects = session.step(1, Some("OSCIL:STOP"), &mut FixedInput(0));
        assert_eq!(lines(&effects), vec!["OSCIL:STOPPED"]);
        assert!(!session.is_streaming());
    }

    #[test]
    fn scheduler_snaps_to_now() {
        let mut session = handshaken(100);
        session.step(0, Some("OSCIL:START"), &mut FixedInput(0));

        assert!(!session.sample_due(50));
        assert!(session.sample_due(100));
        // long stall: one tick, no backfill
        assert!(session.sample_due(1_000));
        assert!(!session.sample_due(1_050));
        assert!(session.sample_due(1_100));
    }

    #[test]
    fn clock_going_backwards_never_fires() {
        let mut session = handshaken(10);
        session.step(500, Some("OSCIL:START"), &mut FixedInput(0));
        assert!(session.sample_due(650));

        // behind both the last sample and the START origin
        assert!(!session.sample_due(100));
        assert!(!session.sample_due(649));
        assert_eq!(session.emit_record(100, 0).unwrap().elapsed_ms, 0);
        assert!(session.sample_due(660));
    }

    #[test]
    fn scheduler_idle_when_not_streaming() {
        let mut session = handshaken(10);
        assert!(!session.sample_due(10_000));
        assert_eq!(session.emit_record(10_000, 512), None);
    }

    #[test]
    fn sample_follows_command_in_same_step() {
        let mut session = handshaken(10);
        session.step(0, Some("OSCIL:START"), &mut FixedInput(0));
        let effects = session.step(20, Some("OSCIL:INTERVAL,5"), &mut FixedInput(1023));
        assert_eq!(
            lines(&effects),
            vec!["OSCIL:INTERVAL SET 5", "D:20,5.000,0.050"]
        );
    }

    #[test]
    fn start_resets_elapsed_origin() {
        let mut session = handshaken(10);
        let mut input = FixedInput(0);
        session.step(0, Some("OSCIL:START"), &mut input);
        session.step(500, Some("OSCIL:STOP"), &mut input);
        session.step(700, Some("OSCIL:START"), &mut input);

        let record = session.emit_record(730, 0).unwrap();
        assert_eq!(record.elapsed_ms, 30);
    }

    #[test]
    fn start_while_streaming_resets_elapsed_origin() {
        let mut session = handshaken(10);
        let mut input = FixedInput(0);
        session.step(0, Some("OSCIL:START"), &mut input);
        let effects = session.step(500, None, &mut input);
        assert_eq!(lines(&effects), vec!["D:500,0.000,0.000"]);

        let effects = session.step(600, Some("OSCIL:START"), &mut input);
        assert_eq!(lines(&effects), vec!["OSCIL:STARTED", "D:0,0.000,0.000"]);
        assert_eq!(session.phase(), Phase::Streaming { started_at_ms: 600 });

        let effects = session.step(650, None, &mut input);
        assert_eq!(lines(&effects), vec!["D:50,0.000,0.000"]);
    }
}
