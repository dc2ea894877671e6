//! SenseWire Core
//!
//! Schema-driven decoding of fixed-layout binary packets from a peripheral
//! into typed, bounded per-field history.
//!
//! This crate provides:
//! - Wire schema types ([`SensorSchema`], [`FieldType`])
//! - Little-endian field decoding and encoding ([`codec`])
//! - Whole-packet decoding with decode-then-commit semantics ([`decoder`])
//! - Bounded FIFO history ([`RingBuffer`], [`FieldHistory`])
//! - A per-sensor registry that dispatches update callbacks ([`SensorRegistry`])
//! - The built-in gesture sensor profile ([`gesture`])

pub mod codec;
pub mod decoder;
pub mod error;
pub mod gesture;
pub mod history;
pub mod registry;
pub mod schema;
pub mod sensor;
pub mod types;

pub use decoder::{decode_packet, DecodedField, DecodedRecord};
pub use error::{Error, Result};
pub use history::{FieldHistory, RingBuffer};
pub use registry::{RegistryStats, SensorRegistry};
pub use schema::{FieldSpec, SensorSchema};
pub use sensor::{DirtyFlag, SensorPhase, SensorState, UpdateHandler};
pub use types::*;

/// Default depth of every field history
pub const DEFAULT_MAX_RECORDS: usize = 64;

/// Divisor applied to each signed axis byte of a point
pub const POINT_SCALE: f32 = 128.0;
