//! Threshold control state machine
//!
//! The control source's value is compared against a threshold on every tick.
//! Parameter updates are edge-triggered: they are produced only when the
//! derived state differs from the latched one. A tick without a parseable
//! value derives `Unknown`, which never changes the latch.

use sampler_protocol::{ControlMessage, ObjectId, Property};
use tracing::{debug, info};

use crate::config::{ControlConfig, ParameterProfile};

/// Control decision derived from the control source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlState {
    /// No parseable value seen yet
    #[default]
    Unknown,
    /// Value below the threshold
    BelowThreshold,
    /// Value at or above the threshold
    AtOrAboveThreshold,
}

impl ControlState {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::BelowThreshold => "below",
            Self::AtOrAboveThreshold => "at-or-above",
        }
    }
}

/// A latched state change that must be pushed to the actuator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// State before this tick
    pub from: ControlState,
    /// State latched by this tick
    pub to: ControlState,
    /// Value that caused the change
    pub value: f64,
    /// Parameters to push
    pub profile: ParameterProfile,
}

impl Transition {
    /// Datagrams for this transition: a write pair, then optional read-backs
    pub fn messages(&self, object: ObjectId, verify: bool) -> Vec<ControlMessage> {
        let mut messages = vec![
            ControlMessage::write(object, Property::Frequency, self.profile.frequency),
            ControlMessage::write(object, Property::Amplitude, self.profile.amplitude),
        ];
        if verify {
            messages.push(ControlMessage::read(object, Property::Frequency));
            messages.push(ControlMessage::read(object, Property::Amplitude));
        }
        messages
    }
}

/// Parse the leading decimal number of `text`
///
/// Leading whitespace is skipped and trailing garbage ignored (`"3.5V"` is
/// `3.5`). An optionally signed `inf` or `infinity` prefix reads as infinity.
/// Hexadecimal is not recognised: `"0x1A"` reads as `0`. Returns `None` when
/// no number is present or the number is NaN.
pub fn parse_leading_f64(text: &str) -> Option<f64> {
    let text = text.trim_start();

    if let Ok(v) = text.parse::<f64>() {
        return Some(v).filter(|v| !v.is_nan());
    }

    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if unsigned
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("inf"))
    {
        return Some(if negative { f64::NEG_INFINITY } else { f64::INFINITY });
    }

    let end = text
        .bytes()
        .take_while(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
        .count();
    (1..=end)
        .rev()
        .find_map(|i| text[..i].parse::<f64>().ok())
        .filter(|v| !v.is_nan())
}

/// Edge-triggered threshold state machine
#[derive(Debug, Clone)]
pub struct ControlStateMachine {
    latched: ControlState,
    threshold: f64,
    above: ParameterProfile,
    below: ParameterProfile,
    sync_on_first_reading: bool,
}

impl ControlStateMachine {
    /// Create a state machine in the `Unknown` state
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            latched: ControlState::Unknown,
            threshold: config.threshold,
            above: config.above,
            below: config.below,
            sync_on_first_reading: config.sync_on_first_reading,
        }
    }

    /// Currently latched state
    pub fn state(&self) -> ControlState {
        self.latched
    }

    /// Derive this tick's state without latching it
    pub fn classify(&self, value: Option<&str>) -> (ControlState, Option<f64>) {
        match value.and_then(parse_leading_f64) {
            Some(v) if v >= self.threshold => (ControlState::AtOrAboveThreshold, Some(v)),
            Some(v) => (ControlState::BelowThreshold, Some(v)),
            None => (ControlState::Unknown, None),
        }
    }

    /// Evaluate one tick's control value
    ///
    /// Returns the transition to push, if any.
    pub fn evaluate(&mut self, value: Option<&str>) -> Option<Transition> {
        let (derived, parsed) = self.classify(value);
        let v = parsed?;

        if derived == self.latched {
            return None;
        }

        let from = self.latched;
        self.latched = derived;

        if from == ControlState::Unknown && !self.sync_on_first_reading {
            debug!("Control state initialised to {} by {}", derived.name(), v);
            return None;
        }

        let profile = match derived {
            ControlState::AtOrAboveThreshold => self.above,
            _ => self.below,
        };
        info!(
            "Control state {} -> {} (value {}): frequency={}, amplitude={}",
            from.name(),
            derived.name(),
            v,
            profile.frequency,
            profile.amplitude
        );

        Some(Transition {
            from,
            to: derived,
            value: v,
            profile,
        })
    }
}
