//! Virtual actuator for testing
//!
//! Decodes control datagrams, applies writes to per-output parameters and
//! answers reads. A read is answered with a write-layout datagram carrying
//! the property's current value; reads of unknown outputs get no answer.

use std::collections::BTreeMap;

use sampler_protocol::{ControlMessage, EncodeMessage, ObjectId, ParseError, Property};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Current settings of one actuator output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputParameters {
    /// Frequency value last written
    pub frequency: u16,
    /// Amplitude value last written
    pub amplitude: u16,
}

impl Default for OutputParameters {
    fn default() -> Self {
        Self {
            frequency: 1000,
            amplitude: 1000,
        }
    }
}

impl OutputParameters {
    fn get(&self, property: Property) -> u16 {
        match property {
            Property::Frequency => self.frequency,
            Property::Amplitude => self.amplitude,
        }
    }

    fn set(&mut self, property: Property, value: u16) -> bool {
        let slot = match property {
            Property::Frequency => &mut self.frequency,
            Property::Amplitude => &mut self.amplitude,
        };
        let changed = *slot != value;
        *slot = value;
        changed
    }
}

/// Virtual actuator
///
/// Tracks parameters for a fixed set of outputs. Every decoded message is
/// kept for test verification.
#[derive(Debug)]
pub struct VirtualActuator {
    /// Identifier for logging
    id: String,
    outputs: BTreeMap<ObjectId, OutputParameters>,
    received: Vec<ControlMessage>,
    rejected: usize,
}

impl VirtualActuator {
    /// Create an actuator with a single output, [`ObjectId::OUTPUT_1`]
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_outputs(id, [ObjectId::OUTPUT_1])
    }

    /// Create an actuator exposing the given outputs
    pub fn with_outputs(id: impl Into<String>, outputs: impl IntoIterator<Item = ObjectId>) -> Self {
        Self {
            id: id.into(),
            outputs: outputs
                .into_iter()
                .map(|o| (o, OutputParameters::default()))
                .collect(),
            received: Vec::new(),
            rejected: 0,
        }
    }

    /// Get the identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current parameters of an output
    pub fn parameters(&self, object: ObjectId) -> Option<OutputParameters> {
        self.outputs.get(&object).copied()
    }

    /// All decoded messages, oldest first
    pub fn received(&self) -> &[ControlMessage] {
        &self.received
    }

    /// Number of datagrams that failed to decode
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Process one datagram
    ///
    /// Returns `(reply, changed)`: the bytes to send back, if any, and
    /// whether a parameter changed.
    pub fn process_datagram(&mut self, data: &[u8]) -> Result<(Option<Vec<u8>>, bool), ParseError> {
        let message = match ControlMessage::decode(data) {
            Ok(message) => message,
            Err(e) => {
                self.rejected += 1;
                warn!("Actuator {} rejected {:02X?}: {}", self.id, data, e);
                return Err(e);
            }
        };
        self.received.push(message);
        Ok(self.apply(&message))
    }

    /// Apply a decoded message
    pub fn apply(&mut self, message: &ControlMessage) -> (Option<Vec<u8>>, bool) {
        let object = message.object();
        let Some(params) = self.outputs.get_mut(&object) else {
            debug!("Actuator {} has no output {:?}", self.id, object);
            return (None, false);
        };

        match *message {
            ControlMessage::Write {
                property, value, ..
            } => {
                let changed = params.set(property, value);
                debug!(
                    "Actuator {} output {} {} = {}",
                    self.id,
                    object.as_u16(),
                    property.name(),
                    value
                );
                (None, changed)
            }
            ControlMessage::Read { property, .. } => {
                let reply = ControlMessage::write(object, property, params.get(property));
                (Some(reply.encode()), false)
            }
        }
    }
}
