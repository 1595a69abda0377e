//! Virtual line-oriented data sources
//!
//! A source produces one text value per line, either from a periodic
//! [`Signal`] or by cycling through a fixed script of values.

use serde::{Deserialize, Serialize};

use crate::actuator::OutputParameters;
use crate::waveform::Signal;

/// What a source emits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Sampled periodic signal
    Signal(Signal),
    /// Signal whose frequency and amplitude follow an actuator output
    ///
    /// A parameter value `v` maps to `v / 1000` Hz and `v / 1000` units, so
    /// `frequency = 2000, amplitude = 4000` is a 2 Hz wave of amplitude 4.
    Actuated(Signal),
    /// Fixed values, repeated in order
    Script(Vec<String>),
}

/// Configuration for a virtual source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualSourceConfig {
    /// Identifier for logging
    pub id: String,
    /// Value generator
    pub kind: SourceKind,
    /// Time between lines (ms)
    pub interval_ms: u64,
    /// Decimal places for signal values
    pub precision: usize,
    /// Close each client connection after this many lines
    pub close_after: Option<usize>,
}

impl VirtualSourceConfig {
    /// Source sampling a signal every `interval_ms`
    pub fn signal(id: impl Into<String>, signal: Signal, interval_ms: u64) -> Self {
        Self {
            id: id.into(),
            kind: SourceKind::Signal(signal),
            interval_ms,
            precision: 3,
            close_after: None,
        }
    }

    /// Source cycling through `values` every `interval_ms`
    pub fn script<S: Into<String>>(
        id: impl Into<String>,
        values: impl IntoIterator<Item = S>,
        interval_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            kind: SourceKind::Script(values.into_iter().map(Into::into).collect()),
            interval_ms,
            precision: 3,
            close_after: None,
        }
    }
}

/// Per-connection line generator
#[derive(Debug, Clone)]
pub struct VirtualSource {
    config: VirtualSourceConfig,
    line: usize,
}

impl VirtualSource {
    /// Create a generator starting at the first line
    pub fn new(config: VirtualSourceConfig) -> Self {
        Self { config, line: 0 }
    }

    /// Get the identifier
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Configuration
    pub fn config(&self) -> &VirtualSourceConfig {
        &self.config
    }

    /// Lines produced so far
    pub fn lines_sent(&self) -> usize {
        self.line
    }

    /// Whether the connection should be closed now
    pub fn exhausted(&self) -> bool {
        self.config.close_after.is_some_and(|n| self.line >= n)
    }

    /// Produce the next line (with terminator) at `t` seconds
    ///
    /// `params` are the actuator settings used by [`SourceKind::Actuated`].
    pub fn next_line(&mut self, t: f64, params: OutputParameters) -> String {
        let precision = self.config.precision;
        let value = match &self.config.kind {
            SourceKind::Signal(signal) => format!("{:.*}", precision, signal.sample(t)),
            SourceKind::Actuated(base) => {
                let signal = Signal {
                    frequency_hz: f64::from(params.frequency) / 1000.0,
                    amplitude: f64::from(params.amplitude) / 1000.0,
                    ..*base
                };
                format!("{:.*}", precision, signal.sample(t))
            }
            SourceKind::Script(values) if values.is_empty() => String::new(),
            SourceKind::Script(values) => values[self.line % values.len()].clone(),
        };
        self.line += 1;
        value + "\n"
    }
}
