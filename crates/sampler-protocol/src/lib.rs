//! Sampler Protocol Library
//!
//! This crate provides the wire formats used by the telemetry sampler:
//!
//! - **Control datagrams**: fixed-layout binary messages (big-endian `u16`
//!   fields) that read or write actuator parameters
//! - **Line tokens**: `\r`/`\n` delimited text values produced by the data
//!   sources, reassembled from arbitrarily fragmented reads
//!
//! # Architecture
//!
//! Each format is handled by a codec that performs no I/O:
//! - [`line::LineCodec`] is a streaming parser that accepts partial data and
//!   yields complete, trimmed tokens
//! - [`control::ControlMessage`] encodes to and decodes from a single datagram
//!
//! # Example
//!
//! ```rust
//! use sampler_protocol::{ControlMessage, EncodeMessage, ObjectId, Property, StreamCodec};
//! use sampler_protocol::line::LineCodec;
//!
//! let mut codec = LineCodec::new();
//! codec.push_bytes(b" 3.25\r\n2.");
//! assert_eq!(codec.next_token().as_deref(), Some("3.25"));
//! assert!(codec.next_token().is_none());
//!
//! let write = ControlMessage::write(ObjectId::OUTPUT_1, Property::Frequency, 1000);
//! assert_eq!(write.encode(), vec![0, 2, 0, 1, 0, 255, 0x03, 0xE8]);
//! ```

pub mod control;
pub mod error;
pub mod line;

pub use control::{ControlMessage, ObjectId, Opcode, Property};
pub use error::ParseError;

/// Trait for codecs that parse incoming byte streams into items
pub trait StreamCodec {
    /// The item type produced by this codec
    type Item;

    /// Push raw bytes into the codec's buffer
    fn push_bytes(&mut self, data: &[u8]);

    /// Try to extract the next complete item from the buffer
    fn next_token(&mut self) -> Option<Self::Item>;

    /// Number of buffered bytes not yet part of a complete item
    fn pending(&self) -> usize;

    /// Clear the internal buffer
    fn clear(&mut self);
}

/// Trait for messages that can be encoded to bytes
pub trait EncodeMessage {
    /// Encode this message to its wire format
    fn encode(&self) -> Vec<u8>;
}
