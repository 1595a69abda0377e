//! Tick evaluation
//!
//! The engine turns one tick's samples into a telemetry record and, when the
//! control state changes, the datagrams to send. It performs no I/O so the
//! runtime loop and tests drive it the same way.

use sampler_protocol::{ControlMessage, ObjectId};

use crate::config::ControlConfig;
use crate::control::{ControlState, ControlStateMachine, Transition};
use crate::telemetry::TelemetryRecord;

/// Result of one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    /// Record to publish
    pub record: TelemetryRecord,
    /// Control transition latched by this tick
    pub transition: Option<Transition>,
    /// Datagrams to send, in order
    pub messages: Vec<ControlMessage>,
}

/// Per-tick sampling and control logic
#[derive(Debug, Clone)]
pub struct SamplerEngine {
    control: ControlStateMachine,
    control_source: usize,
    object: ObjectId,
    verify_after_write: bool,
    ticks: u64,
    transitions: u64,
}

impl SamplerEngine {
    /// Create an engine from control settings
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            control: ControlStateMachine::new(config),
            control_source: config.source,
            object: config.object_id,
            verify_after_write: config.verify_after_write,
            ticks: 0,
            transitions: 0,
        }
    }

    /// Currently latched control state
    pub fn control_state(&self) -> ControlState {
        self.control.state()
    }

    /// Ticks processed
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Transitions pushed to the actuator
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Process one tick
    ///
    /// `samples` holds `(label, fresh value)` for every source in order. A
    /// source with no fresh value contributes `None`.
    pub fn tick(&mut self, timestamp: u64, samples: &[(&str, Option<&str>)]) -> TickOutput {
        self.ticks += 1;

        let control_value = samples
            .get(self.control_source)
            .and_then(|(_, value)| *value);

        let transition = self.control.evaluate(control_value);
        let messages = match &transition {
            Some(t) => {
                self.transitions += 1;
                t.messages(self.object, self.verify_after_write)
            }
            None => Vec::new(),
        };

        TickOutput {
            record: TelemetryRecord::new(timestamp, samples.iter().copied()),
            transition,
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use sampler_protocol::{Opcode, Property};

    use super::*;
    use crate::telemetry::NO_DATA;

    fn samples(out3: Option<&str>) -> Vec<(&str, Option<&str>)> {
        vec![("out1", Some("0.1")), ("out2", None), ("out3", out3)]
    }

    #[test]
    fn test_empty_tick_uses_sentinels_and_boundary() {
        let mut engine = SamplerEngine::new(&ControlConfig::default());
        let output = engine.tick(
            1_700_000_000_040,
            &[("out1", None), ("out2", None), ("out3", None)],
        );

        assert_eq!(output.record.timestamp, 1_700_000_000_040);
        for label in ["out1", "out2", "out3"] {
            assert_eq!(output.record.get(label), Some(NO_DATA));
        }
        assert!(output.transition.is_none());
        assert!(output.messages.is_empty());
        assert_eq!(engine.control_state(), ControlState::Unknown);
    }

    #[test]
    fn test_threshold_sequence() {
        let mut engine = SamplerEngine::new(&ControlConfig::default());
        let values = ["2.0", "2.5", "3.5", "3.2", "1.0"];

        let outputs: Vec<TickOutput> = values
            .iter()
            .enumerate()
            .map(|(i, v)| engine.tick(20 * (i as u64 + 1), &samples(Some(*v))))
            .collect();

        let with_traffic: Vec<usize> = outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| !o.messages.is_empty())
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(with_traffic, vec![3, 5]);
        assert_eq!(engine.transitions(), 2);

        let up = &outputs[2].messages;
        assert_eq!(up.len(), 4);
        assert_eq!(up[0].property(), Property::Frequency);
        assert_eq!(up[0].value(), Some(1000));
        assert_eq!(up[1].property(), Property::Amplitude);
        assert_eq!(up[1].value(), Some(8000));
        assert!(up[2..].iter().all(|m| m.opcode() == Opcode::Read));

        let down = &outputs[4].messages;
        assert_eq!(down[0].value(), Some(2000));
        assert_eq!(down[1].value(), Some(4000));
    }

    #[test]
    fn test_stale_control_value_is_unknown() {
        let mut engine = SamplerEngine::new(&ControlConfig::default());
        engine.tick(20, &samples(Some("1.0")));
        let output = engine.tick(40, &samples(None));
        assert!(output.messages.is_empty());
        assert_eq!(output.record.get("out3"), Some(NO_DATA));
        assert_eq!(engine.control_state(), ControlState::BelowThreshold);
    }

    #[test]
    fn test_verification_reads_optional() {
        let config = ControlConfig {
            verify_after_write: false,
            ..Default::default()
        };
        let mut engine = SamplerEngine::new(&config);
        engine.tick(20, &samples(Some("0")));
        let output = engine.tick(40, &samples(Some("9")));
        assert_eq!(output.messages.len(), 2);
        assert!(output.messages.iter().all(|m| m.opcode() == Opcode::Write));
    }

    #[test]
    fn test_control_source_is_configurable() {
        let config = ControlConfig {
            source: 0,
            ..Default::default()
        };
        let mut engine = SamplerEngine::new(&config);
        engine.tick(20, &[("a", Some("5")), ("b", Some("0"))]);
        assert_eq!(engine.control_state(), ControlState::AtOrAboveThreshold);
        assert_eq!(engine.ticks(), 1);
    }
}
