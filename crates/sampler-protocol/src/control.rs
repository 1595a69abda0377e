//! Actuator control protocol
//!
//! The actuator accepts single-datagram commands made of big-endian `u16`
//! fields. There is no framing, sequence number or acknowledgement.
//!
//! # Format
//! - Read:  `[opcode=1][object_id][property_id]` (6 bytes)
//! - Write: `[opcode=2][object_id][property_id][value]` (8 bytes)
//!
//! # Properties
//! - `255` - Frequency
//! - `170` - Amplitude

use crate::error::ParseError;
use crate::EncodeMessage;

/// Length of an encoded read request
pub const READ_LEN: usize = 6;

/// Length of an encoded write request
pub const WRITE_LEN: usize = 8;

/// Operation carried by a control datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Opcode {
    /// Query a property value
    Read,
    /// Set a property value
    Write,
}

impl Opcode {
    /// Wire code for this opcode
    pub fn code(&self) -> u16 {
        match self {
            Opcode::Read => 1,
            Opcode::Write => 2,
        }
    }

    /// Look up an opcode by wire code
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Opcode::Read),
            2 => Some(Opcode::Write),
            _ => None,
        }
    }

    /// Encoded datagram length for this opcode
    pub fn datagram_len(&self) -> usize {
        match self {
            Opcode::Read => READ_LEN,
            Opcode::Write => WRITE_LEN,
        }
    }
}

/// Identifier of an actuator output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ObjectId(pub u16);

impl ObjectId {
    /// The first (and in this system, only) actuator output
    pub const OUTPUT_1: ObjectId = ObjectId(1);

    /// Get the raw id
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

/// Adjustable parameter of an actuator output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Property {
    /// Output frequency
    Frequency,
    /// Output amplitude
    Amplitude,
}

impl Property {
    /// Wire code for this property
    pub fn code(&self) -> u16 {
        match self {
            Property::Frequency => 255,
            Property::Amplitude => 170,
        }
    }

    /// Look up a property by wire code
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            255 => Some(Property::Frequency),
            170 => Some(Property::Amplitude),
            _ => None,
        }
    }

    /// Returns a human-readable name for the property
    pub fn name(&self) -> &'static str {
        match self {
            Property::Frequency => "frequency",
            Property::Amplitude => "amplitude",
        }
    }
}

/// A single control datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlMessage {
    /// Ask the actuator for a property's current value
    Read { object: ObjectId, property: Property },
    /// Set a property to a new value
    Write {
        object: ObjectId,
        property: Property,
        value: u16,
    },
}

impl ControlMessage {
    /// Build a read request
    pub fn read(object: ObjectId, property: Property) -> Self {
        Self::Read { object, property }
    }

    /// Build a write request
    pub fn write(object: ObjectId, property: Property, value: u16) -> Self {
        Self::Write {
            object,
            property,
            value,
        }
    }

    /// Operation carried by this message
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Read { .. } => Opcode::Read,
            Self::Write { .. } => Opcode::Write,
        }
    }

    /// Target output
    pub fn object(&self) -> ObjectId {
        match self {
            Self::Read { object, .. } | Self::Write { object, .. } => *object,
        }
    }

    /// Target property
    pub fn property(&self) -> Property {
        match self {
            Self::Read { property, .. } | Self::Write { property, .. } => *property,
        }
    }

    /// Value written, `None` for reads
    pub fn value(&self) -> Option<u16> {
        match self {
            Self::Read { .. } => None,
            Self::Write { value, .. } => Some(*value),
        }
    }

    /// Decode a complete datagram
    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < 2 {
            return Err(ParseError::Length {
                expected: READ_LEN,
                actual: data.len(),
            });
        }

        let code = be_u16(data, 0);
        let opcode = Opcode::from_code(code).ok_or(ParseError::UnknownOpcode(code))?;

        let expected = opcode.datagram_len();
        if data.len() != expected {
            return Err(ParseError::Length {
                expected,
                actual: data.len(),
            });
        }

        let object = ObjectId(be_u16(data, 2));
        let prop_code = be_u16(data, 4);
        let property =
            Property::from_code(prop_code).ok_or(ParseError::UnknownProperty(prop_code))?;

        Ok(match opcode {
            Opcode::Read => Self::Read { object, property },
            Opcode::Write => Self::Write {
                object,
                property,
                value: be_u16(data, 6),
            },
        })
    }
}

impl EncodeMessage for ControlMessage {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.opcode().datagram_len());
        out.extend_from_slice(&self.opcode().code().to_be_bytes());
        out.extend_from_slice(&self.object().as_u16().to_be_bytes());
        out.extend_from_slice(&self.property().code().to_be_bytes());
        if let Some(value) = self.value() {
            out.extend_from_slice(&value.to_be_bytes());
        }
        out
    }
}

fn be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}
