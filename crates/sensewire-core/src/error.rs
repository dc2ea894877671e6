//! Error types for SenseWire

use thiserror::Error;

/// Result type alias for SenseWire operations
pub type Result<T> = std::result::Result<T, Error>;

/// SenseWire error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A single field does not fit in the buffer at the current cursor
    #[error("field out of bounds: {width} bytes at offset {offset}, buffer has {len}")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// Buffer shorter than the schema's total width
    #[error("truncated packet: need {needed} bytes, have {have}")]
    TruncatedPacket { needed: usize, have: usize },

    /// Read of a field that has never been decoded
    #[error("no history yet for {sensor}.{field}")]
    EmptyHistory { sensor: String, field: String },

    /// Type tag with no codec
    #[error("unknown field type: {0}")]
    UnknownFieldType(String),

    /// Sensor id or UUID that was never registered
    #[error("unknown sensor: {0}")]
    UnknownSensor(String),

    /// Field name not present in the sensor's schema
    #[error("unknown field {field} on sensor {sensor}")]
    UnknownField { sensor: String, field: String },

    /// Second registration under the same name or UUID
    #[error("sensor already registered: {0}")]
    DuplicateSensor(String),

    /// Structurally invalid schema (empty, duplicate field names, ...)
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// An update handler called back into the registry for its own sensor
    #[error("handler for {0} re-entered the registry for the same sensor")]
    ReentrantAccess(String),
}

impl Error {
    /// True for errors that reject a single buffer and leave the sensor usable.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Error::OutOfBounds { .. } | Error::TruncatedPacket { .. }
        )
    }

    /// True for errors raised while building schemas or registering sensors.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownFieldType(_) | Error::DuplicateSensor(_) | Error::InvalidSchema(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let truncated = Error::TruncatedPacket { needed: 8, have: 3 };
        assert!(truncated.is_decode_error());
        assert!(!truncated.is_configuration_error());

        for err in [
            Error::UnknownFieldType("Float64".into()),
            Error::DuplicateSensor("stroke".into()),
            Error::InvalidSchema("empty".into()),
        ] {
            assert!(err.is_configuration_error(), "{}", err);
            assert!(!err.is_decode_error(), "{}", err);
        }

        let reentry = Error::ReentrantAccess("stroke".into());
        assert!(!reentry.is_decode_error());
        assert!(!reentry.is_configuration_error());
    }
}
