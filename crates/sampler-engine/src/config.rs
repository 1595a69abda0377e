//! Sampler configuration
//!
//! Every field has a default matching the stock deployment: three sources on
//! `127.0.0.1:4001..=4003`, the actuator on `127.0.0.1:4000`, a 20 ms tick,
//! and a 1 s reconnect interval.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};

use sampler_protocol::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Default first data source port
pub const DEFAULT_SOURCE_BASE_PORT: u16 = 4001;

/// Default actuator control port
pub const DEFAULT_CONTROL_PORT: u16 = 4000;

fn localhost(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

/// One streaming data source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Telemetry field name for this source
    pub label: String,
    /// TCP endpoint to connect to
    pub addr: SocketAddr,
}

impl SourceConfig {
    /// Create a source config
    pub fn new(label: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            label: label.into(),
            addr,
        }
    }
}

/// Actuator settings pushed for one side of the threshold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParameterProfile {
    /// Frequency value to write
    pub frequency: u16,
    /// Amplitude value to write
    pub amplitude: u16,
}

/// What to do with datagrams the actuator sends back
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Never read the control socket
    #[default]
    Ignore,
    /// Read and log whatever arrives, without correlating it to requests
    Drain,
}

/// Control state machine and actuator settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    /// Index of the source whose value drives the control decision
    pub source: usize,
    /// Values at or above this are `AtOrAboveThreshold`
    pub threshold: f64,
    /// Actuator output being controlled
    pub object_id: ObjectId,
    /// Profile pushed when crossing upward
    pub above: ParameterProfile,
    /// Profile pushed when crossing downward
    pub below: ParameterProfile,
    /// Send read requests after each write pair
    pub verify_after_write: bool,
    /// Push the profile on the first reading instead of latching silently
    pub sync_on_first_reading: bool,
    /// Response handling on the control socket
    pub responses: ResponseMode,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            source: 2,
            threshold: 3.0,
            object_id: ObjectId::OUTPUT_1,
            above: ParameterProfile {
                frequency: 1000,
                amplitude: 8000,
            },
            below: ParameterProfile {
                frequency: 2000,
                amplitude: 4000,
            },
            verify_after_write: true,
            sync_on_first_reading: false,
            responses: ResponseMode::Ignore,
        }
    }
}

/// Sampler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamplerConfig {
    /// Data sources, in telemetry field order
    pub sources: Vec<SourceConfig>,
    /// Actuator UDP endpoint
    pub actuator_addr: SocketAddr,
    /// Tick period (ms)
    pub tick_period_ms: u64,
    /// Minimum time between connection attempts per source (ms)
    pub reconnect_interval_ms: u64,
    /// Longest single readiness wait (ms)
    pub max_wait_ms: u64,
    /// Longest a connect may stay pending before it is abandoned (ms)
    pub connect_timeout_ms: u64,
    /// Longest token kept from a source, in bytes
    pub max_token_len: usize,
    /// Control settings
    pub control: ControlConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        let sources = (0..3u16)
            .map(|i| {
                SourceConfig::new(
                    format!("out{}", i + 1),
                    localhost(DEFAULT_SOURCE_BASE_PORT + i),
                )
            })
            .collect();

        Self {
            sources,
            actuator_addr: localhost(DEFAULT_CONTROL_PORT),
            tick_period_ms: 20,
            reconnect_interval_ms: 1000,
            max_wait_ms: 2000,
            connect_timeout_ms: 1000,
            max_token_len: sampler_protocol::line::DEFAULT_MAX_TOKEN_LEN,
            control: ControlConfig::default(),
        }
    }
}

impl SamplerConfig {
    /// Check the configuration for values the runtime cannot work with
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sources.is_empty() {
            return Err(EngineError::NoSources);
        }
        let mut labels = HashSet::new();
        for source in &self.sources {
            if source.label == crate::telemetry::TIMESTAMP_FIELD {
                return Err(EngineError::InvalidConfig(format!(
                    "source label {:?} is reserved",
                    source.label
                )));
            }
            if !labels.insert(source.label.as_str()) {
                return Err(EngineError::InvalidConfig(format!(
                    "duplicate source label {:?}",
                    source.label
                )));
            }
        }
        if self.tick_period_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "tick_period_ms must be positive".into(),
            ));
        }
        if self.max_wait_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "max_wait_ms must be positive".into(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "connect_timeout_ms must be positive".into(),
            ));
        }
        if self.max_token_len == 0 {
            return Err(EngineError::InvalidConfig(
                "max_token_len must be positive".into(),
            ));
        }
        if self.control.source >= self.sources.len() {
            return Err(EngineError::InvalidConfig(format!(
                "control source {} out of range ({} sources)",
                self.control.source,
                self.sources.len()
            )));
        }
        if !self.control.threshold.is_finite() {
            return Err(EngineError::InvalidConfig(
                "control threshold must be finite".into(),
            ));
        }
        Ok(())
    }
}
