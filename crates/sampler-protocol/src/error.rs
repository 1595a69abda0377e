//! Error types for sampler protocol decoding

use thiserror::Error;

/// Errors that can occur while decoding protocol data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Datagram length does not match the opcode's layout
    #[error("invalid datagram length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    /// Opcode is neither read nor write
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u16),

    /// Property id is not one the actuator exposes
    #[error("unknown property id: {0}")]
    UnknownProperty(u16),
}
