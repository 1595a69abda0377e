//! Telemetry Sampler Simulation Library
//!
//! This crate provides stand-ins for the hardware the sampler talks to, so
//! the client can be exercised on a single machine. It includes:
//!
//! - **VirtualSource**: Emits newline-terminated values from a waveform or a
//!   fixed script, optionally following the actuator's output parameters
//! - **VirtualActuator**: Applies control writes and answers control reads
//! - **tasks**: Tokio tasks serving sources over TCP and the actuator over UDP
//! - **analysis**: Offline frequency and shape estimates for recorded telemetry
//!
//! # Example
//!
//! ```rust
//! use sampler_protocol::{ControlMessage, EncodeMessage, ObjectId, Property};
//! use sampler_sim::{OutputParameters, VirtualActuator, VirtualSource, VirtualSourceConfig};
//!
//! let mut actuator = VirtualActuator::new("bench");
//! let write = ControlMessage::write(ObjectId::OUTPUT_1, Property::Frequency, 2000);
//! actuator.process_datagram(&write.encode()).unwrap();
//! assert_eq!(actuator.parameters(ObjectId::OUTPUT_1).unwrap().frequency, 2000);
//!
//! let mut source = VirtualSource::new(VirtualSourceConfig::script("out3", ["1.0", "5.0"], 10));
//! assert_eq!(source.next_line(0.0, OutputParameters::default()), "1.0\n");
//! ```

pub mod actuator;
pub mod analysis;
pub mod source;
pub mod tasks;
pub mod waveform;

pub use actuator::{OutputParameters, VirtualActuator};
pub use analysis::{analyze_capture, analyze_signal, parse_capture, Capture, Shape, SignalReport};
pub use source::{SourceKind, VirtualSource, VirtualSourceConfig};
pub use tasks::{run_line_source, run_virtual_actuator};
pub use waveform::{Signal, Waveform};
