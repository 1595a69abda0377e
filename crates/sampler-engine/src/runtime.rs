//! Single-threaded sampling loop
//!
//! Each iteration runs, in order:
//!
//! 1. expiry of connects pending longer than `connect_timeout_ms`, then
//!    non-blocking connect attempts for disconnected sources that are due one
//! 2. one bounded wait: `mio` poll over connected and connecting sources, or
//!    a plain sleep when there are none
//! 3. dispatch of readiness events to the owning sources, which also
//!    completes pending connects
//! 4. draining of actuator replies (only in `drain` mode)
//! 5. the tick, if its boundary has been reached
//!
//! The wait never exceeds the time to the next tick nor `max_wait_ms`, so
//! neither reconnects nor ticks are starved by quiet sockets. The clock is
//! read once per step (reconnect, wait, tick).

use std::io::{self, ErrorKind, Write};
use std::time::Duration;

use mio::{Events, Poll};
use tracing::{debug, info, warn};

use crate::actuator::UdpControlClient;
use crate::clock::{Clock, SystemClock};
use crate::config::SamplerConfig;
use crate::engine::{SamplerEngine, TickOutput};
use crate::error::EngineError;
use crate::reconnect::ReconnectSupervisor;
use crate::schedule::TickScheduler;
use crate::stream::StreamConnection;
use crate::telemetry::TelemetryEmitter;

/// The sampler's event loop and everything it owns
pub struct SamplerRuntime<W: Write, C: Clock = SystemClock> {
    poll: Poll,
    events: Events,
    streams: Vec<StreamConnection>,
    supervisor: ReconnectSupervisor,
    scheduler: TickScheduler,
    engine: SamplerEngine,
    control: UdpControlClient,
    emitter: TelemetryEmitter<W>,
    clock: C,
    max_wait: Duration,
    connect_timeout_ms: u64,
    sink_failed: bool,
}

impl<W: Write> SamplerRuntime<W, SystemClock> {
    /// Create a runtime on the system clock
    pub fn new(config: &SamplerConfig, writer: W) -> Result<Self, EngineError> {
        Self::with_clock(config, writer, SystemClock)
    }
}

impl<W: Write, C: Clock> SamplerRuntime<W, C> {
    /// Create a runtime with a custom clock
    pub fn with_clock(config: &SamplerConfig, writer: W, clock: C) -> Result<Self, EngineError> {
        config.validate()?;

        let streams = config
            .sources
            .iter()
            .enumerate()
            .map(|(i, source)| StreamConnection::new(i, source, config.max_token_len))
            .collect::<Vec<_>>();

        let poll = Poll::new()?;
        let control = UdpControlClient::bind(config.actuator_addr, config.control.responses)?;
        let scheduler = TickScheduler::new(config.tick_period_ms, clock.now_ms());

        Ok(Self {
            poll,
            events: Events::with_capacity(streams.len().max(1) * 2),
            streams,
            supervisor: ReconnectSupervisor::new(Duration::from_millis(
                config.reconnect_interval_ms,
            )),
            scheduler,
            engine: SamplerEngine::new(&config.control),
            control,
            emitter: TelemetryEmitter::new(writer),
            clock,
            max_wait: Duration::from_millis(config.max_wait_ms),
            connect_timeout_ms: config.connect_timeout_ms,
            sink_failed: false,
        })
    }

    /// Data source connections, in source order
    pub fn streams(&self) -> &[StreamConnection] {
        &self.streams
    }

    /// Tick engine
    pub fn engine(&self) -> &SamplerEngine {
        &self.engine
    }

    /// Actuator client
    pub fn control_client(&self) -> &UdpControlClient {
        &self.control
    }

    /// Telemetry emitter
    pub fn emitter(&self) -> &TelemetryEmitter<W> {
        &self.emitter
    }

    /// Scheduler state
    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    /// Run until the process is stopped
    ///
    /// Only a failing poll instance ends the loop.
    pub fn run(&mut self) -> Result<(), EngineError> {
        info!(
            "Sampling {} sources every {} ms, actuator at {}",
            self.streams.len(),
            self.scheduler.period_ms(),
            self.control.target()
        );
        loop {
            self.run_once()?;
        }
    }

    /// Run one loop iteration
    ///
    /// Returns the tick's output if a tick fired during this iteration.
    pub fn run_once(&mut self) -> Result<Option<TickOutput>, EngineError> {
        self.reconnect_due();
        self.wait()?;
        self.dispatch();

        let responses = self.control.drain_responses();
        if !responses.is_empty() {
            debug!("Drained {} actuator replies", responses.len());
        }

        Ok(self.tick_if_due())
    }

    fn reconnect_due(&mut self) {
        let now = self.clock.now_ms();
        for stream in &mut self.streams {
            if stream.connect_expired(now, self.connect_timeout_ms) {
                stream.disconnect(self.poll.registry(), "connect timed out");
            }
            if stream.is_connected() || stream.is_connecting() {
                continue;
            }
            if self
                .supervisor
                .should_attempt(stream.last_connect_attempt(), now)
            {
                stream.attempt_connect(self.poll.registry(), now);
            }
        }
    }

    fn wait(&mut self) -> io::Result<()> {
        let budget = self
            .scheduler
            .wait_budget(self.clock.now_ms(), self.max_wait);

        let registered = self
            .streams
            .iter()
            .any(|s| s.is_connected() || s.is_connecting());
        if !registered {
            self.events.clear();
            if !budget.is_zero() {
                std::thread::sleep(budget);
            }
            return Ok(());
        }

        match self.poll.poll(&mut self.events, Some(budget)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                self.events.clear();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn dispatch(&mut self) {
        for event in self.events.iter() {
            let Some(stream) = self.streams.get_mut(event.token().0) else {
                continue;
            };

            let tokens = stream.handle_event(self.poll.registry(), event);
            if tokens > 0 {
                debug!("{}: {} new values", stream.label(), tokens);
            }
        }
    }

    fn tick_if_due(&mut self) -> Option<TickOutput> {
        let now = self.clock.now_ms();
        let timestamp = self.scheduler.poll_tick(now)?;

        let samples: Vec<(&str, Option<&str>)> = self
            .streams
            .iter()
            .map(|s| (s.label(), s.fresh_value()))
            .collect();
        let output = self.engine.tick(timestamp, &samples);

        self.control.send_all(&output.messages);

        match self.emitter.emit(&output.record) {
            Ok(()) => self.sink_failed = false,
            Err(e) if !self.sink_failed => {
                warn!("Telemetry write failed: {}", e);
                self.sink_failed = true;
            }
            Err(e) => debug!("Telemetry write failed: {}", e),
        }

        for stream in &mut self.streams {
            stream.clear_fresh();
        }

        Some(output)
    }
}
