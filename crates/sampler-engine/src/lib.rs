//! Telemetry Sampler Engine
//!
//! This crate provides the sampling client's runtime: it keeps connections to
//! a set of line-oriented data sources, samples their latest values on an
//! epoch-aligned tick, drives an actuator from one of them, and writes one
//! telemetry record per tick.
//!
//! # Architecture
//!
//! Everything runs on one thread. The only blocking call is a single bounded
//! wait per loop iteration ([`runtime::SamplerRuntime::run_once`]):
//!
//! - [`stream::StreamConnection`] owns a source socket, its line codec and
//!   its latest value; connects are non-blocking and finish on a poll event
//! - [`reconnect::ReconnectSupervisor`] decides when a dropped source retries
//! - [`schedule::TickScheduler`] fixes tick boundaries and the wait budget
//! - [`engine::SamplerEngine`] evaluates a tick: telemetry record plus the
//!   edge-triggered [`control::ControlStateMachine`]
//! - [`actuator::UdpControlClient`] sends control datagrams, fire-and-forget
//! - [`telemetry::TelemetryEmitter`] writes JSON lines
//!
//! # Example
//!
//! ```rust,no_run
//! use sampler_engine::{SamplerConfig, SamplerRuntime};
//!
//! let config = SamplerConfig::default();
//! let mut runtime = SamplerRuntime::new(&config, std::io::stdout()).unwrap();
//! runtime.run().unwrap();
//! ```

pub mod actuator;
pub mod clock;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod reconnect;
pub mod runtime;
pub mod schedule;
pub mod stream;
pub mod telemetry;

pub use actuator::UdpControlClient;
pub use clock::{Clock, SystemClock};
pub use config::{ControlConfig, ParameterProfile, ResponseMode, SamplerConfig, SourceConfig};
pub use control::{ControlState, ControlStateMachine, Transition};
pub use engine::{SamplerEngine, TickOutput};
pub use error::EngineError;
pub use reconnect::ReconnectSupervisor;
pub use runtime::SamplerRuntime;
pub use schedule::TickScheduler;
pub use stream::StreamConnection;
pub use telemetry::{TelemetryEmitter, TelemetryRecord, NO_DATA, TIMESTAMP_FIELD};
