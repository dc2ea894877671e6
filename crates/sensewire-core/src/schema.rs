//! Sensor wire schemas
//!
//! A schema fixes the byte layout of one sensor's packet: field order
//! determines offsets, and every field has a content-independent width.

use crate::codec;
use crate::types::{AccessMode, FieldType, SensorId, Value};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::collections::HashSet;
use uuid::Uuid;

/// One named field of a packet layout
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    /// Byte offset of the field within the packet
    pub offset: usize,
}

/// Immutable description of one logical sensor
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSchema {
    id: SensorId,
    uuid: Option<Uuid>,
    mode: AccessMode,
    fields: Vec<FieldSpec>,
    total_width: usize,
}

impl SensorSchema {
    /// Start a schema builder for a sensor
    pub fn builder(id: impl Into<SensorId>) -> SchemaBuilder {
        SchemaBuilder {
            id: id.into(),
            uuid: None,
            mode: AccessMode::default(),
            fields: Vec::new(),
        }
    }

    pub fn id(&self) -> &SensorId {
        &self.id
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Fields in wire order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Position of a field in wire order
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Sum of all field widths; the exact size of a well-formed packet
    pub fn total_width(&self) -> usize {
        self.total_width
    }

    /// Encode one record in this schema's wire layout.
    ///
    /// `values` must be given in field order.
    pub fn encode(&self, values: &[Value]) -> Result<Bytes> {
        if values.len() != self.fields.len() {
            return Err(Error::InvalidSchema(format!(
                "{} expects {} values, got {}",
                self.id,
                self.fields.len(),
                values.len()
            )));
        }
        let mut buf = BytesMut::with_capacity(self.total_width);
        for (field, value) in self.fields.iter().zip(values) {
            codec::encode_field(&mut buf, field.ty, value)?;
        }
        Ok(buf.freeze())
    }
}

/// Builder for [`SensorSchema`]
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    id: SensorId,
    uuid: Option<Uuid>,
    mode: AccessMode,
    fields: Vec<(String, FieldType)>,
}

impl SchemaBuilder {
    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    /// Append a field at the end of the layout
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    /// Validate and freeze the layout, computing field offsets.
    pub fn build(self) -> Result<SensorSchema> {
        if self.id.as_str().is_empty() {
            return Err(Error::InvalidSchema("sensor id is empty".into()));
        }
        if self.fields.is_empty() {
            return Err(Error::InvalidSchema(format!("{} has no fields", self.id)));
        }

        let mut seen = HashSet::new();
        let mut offset = 0usize;
        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, ty) in self.fields {
            if name.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "{} has a field with an empty name",
                    self.id
                )));
            }
            if !seen.insert(name.clone()) {
                return Err(Error::InvalidSchema(format!(
                    "{} declares field {} twice",
                    self.id, name
                )));
            }
            let width = ty.checked_width().ok_or_else(|| {
                Error::InvalidSchema(format!("{}.{} is too wide: {}", self.id, name, ty))
            })?;
            let end = offset.checked_add(width).ok_or_else(|| {
                Error::InvalidSchema(format!("{} layout overflows at field {}", self.id, name))
            })?;
            fields.push(FieldSpec { name, ty, offset });
            offset = end;
        }

        Ok(SensorSchema {
            id: self.id,
            uuid: self.uuid,
            mode: self.mode,
            fields,
            total_width: offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    fn stroke_schema() -> SensorSchema {
        SensorSchema::builder("stroke")
            .field("state", FieldType::Int32)
            .field("length", FieldType::Int32)
            .field("strokePoints", FieldType::PointArray(2))
            .build()
            .unwrap()
    }

    #[test]
    fn test_offsets() {
        let schema = stroke_schema();
        let offsets: Vec<usize> = schema.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(schema.total_width(), 12);
        assert_eq!(schema.field_index("length"), Some(1));
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        let dup = SensorSchema::builder("s")
            .field("a", FieldType::UInt8)
            .field("a", FieldType::UInt8)
            .build();
        assert!(matches!(dup, Err(Error::InvalidSchema(_))));

        let empty = SensorSchema::builder("s").build();
        assert!(matches!(empty, Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_rejects_oversized_layout() {
        let huge = FieldType::PointArray(usize::MAX / 2 + 1);
        assert_eq!(huge.checked_width(), None);
        let too_wide = SensorSchema::builder("s").field("p", huge).build();
        assert!(matches!(too_wide, Err(Error::InvalidSchema(_))));

        let half = FieldType::PointArray(usize::MAX / 4);
        let overflow = SensorSchema::builder("s")
            .field("a", half)
            .field("b", half)
            .field("c", FieldType::Int32)
            .build();
        assert!(matches!(overflow, Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_encode_layout() {
        let schema = stroke_schema();
        let bytes = schema
            .encode(&[
                Value::Int32(1),
                Value::Int32(2),
                Value::Points(vec![Point::new(0.5, 0.5), Point::new(-0.5, -0.5)]),
            ])
            .unwrap();
        assert_eq!(
            &bytes[..],
            &[1, 0, 0, 0, 2, 0, 0, 0, 64, 64, 0xC0, 0xC0]
        );
        assert!(schema.encode(&[Value::Int32(1)]).is_err());
    }
}
