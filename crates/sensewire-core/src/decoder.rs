//! Packet decoding
//!
//! Walks a raw buffer once, in schema order, with a running cursor. No field
//! depends on the value of another, so a packet either decodes completely or
//! not at all; nothing is committed to history here.

use crate::codec;
use crate::schema::SensorSchema;
use crate::types::{SensorId, Value};
use crate::{Error, Result};

/// One decoded field of a record
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub name: String,
    pub value: Value,
}

/// All fields of one packet, in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub sensor: SensorId,
    pub fields: Vec<DecodedField>,
    /// Bytes consumed by the fields
    pub bytes_consumed: usize,
    /// Bytes past the end of the layout that were ignored
    pub trailing: usize,
}

impl DecodedRecord {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Decode a complete packet against `schema`.
///
/// Fails with [`Error::TruncatedPacket`] before touching any field when the
/// buffer is shorter than the layout. Bytes beyond the layout are ignored.
pub fn decode_packet(schema: &SensorSchema, buf: &[u8]) -> Result<DecodedRecord> {
    let needed = schema.total_width();
    if buf.len() < needed {
        return Err(Error::TruncatedPacket {
            needed,
            have: buf.len(),
        });
    }

    let mut cursor = 0usize;
    let mut fields = Vec::with_capacity(schema.fields().len());
    for spec in schema.fields() {
        let (value, used) = codec::decode_field(spec.ty, buf, cursor)?;
        cursor += used;
        fields.push(DecodedField {
            name: spec.name.clone(),
            value,
        });
    }

    Ok(DecodedRecord {
        sensor: schema.id().clone(),
        fields,
        bytes_consumed: cursor,
        trailing: buf.len() - cursor,
    })
}
