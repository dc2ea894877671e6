//! Wire types and decoded values

use crate::{Error, POINT_SCALE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sensor identifier used to route raw buffers and read history
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(String);

impl SensorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SensorId {
    fn from(v: &str) -> Self {
        SensorId(v.to_string())
    }
}

impl From<String> for SensorId {
    fn from(v: String) -> Self {
        SensorId(v)
    }
}

impl std::borrow::Borrow<str> for SensorId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// How the peripheral delivers a sensor's characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Host re-reads the characteristic periodically
    #[default]
    #[serde(rename = "read")]
    ReadPoll,
    /// Peripheral pushes notifications
    Notify,
}

impl FromStr for AccessMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" | "readpoll" | "bleread" => Ok(AccessMode::ReadPoll),
            "notify" | "blenotify" => Ok(AccessMode::Notify),
            other => Err(Error::InvalidSchema(format!("unknown access mode: {}", other))),
        }
    }
}

/// Primitive and array type tags of the wire layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    UInt8,
    UInt16,
    Int32,
    Float32,
    /// `N` points, two signed bytes each, no length prefix on the wire
    PointArray(usize),
}

impl FieldType {
    /// Byte width on the wire. Never depends on packet content.
    ///
    /// Saturates for point arrays too large to address; schemas reject
    /// those through [`FieldType::checked_width`].
    pub const fn width(&self) -> usize {
        match self.checked_width() {
            Some(width) => width,
            None => usize::MAX,
        }
    }

    /// Byte width, or `None` if it does not fit in a `usize`
    pub const fn checked_width(&self) -> Option<usize> {
        match self {
            FieldType::UInt8 => Some(1),
            FieldType::UInt16 => Some(2),
            FieldType::Int32 => Some(4),
            FieldType::Float32 => Some(4),
            FieldType::PointArray(n) => n.checked_mul(2),
        }
    }

    /// Parse a configuration type tag.
    ///
    /// `StrokePoints` resolves to a point array of `stroke_points` entries;
    /// `PointArray(N)` carries its own length.
    pub fn parse_tag(tag: &str, stroke_points: usize) -> Result<Self, Error> {
        let tag = tag.trim();
        match tag {
            "Uint8" | "UInt8" | "u8" => Ok(FieldType::UInt8),
            "Uint16" | "UInt16" | "u16" => Ok(FieldType::UInt16),
            "Int32" | "i32" => Ok(FieldType::Int32),
            "Float32" | "f32" => Ok(FieldType::Float32),
            "StrokePoints" => FieldType::PointArray(stroke_points).validated(tag),
            _ => {
                let count = tag
                    .strip_prefix("PointArray(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .and_then(|n| n.trim().parse::<usize>().ok());
                match count {
                    Some(n) => FieldType::PointArray(n).validated(tag),
                    None => Err(Error::UnknownFieldType(tag.to_string())),
                }
            }
        }
    }
}

impl FieldType {
    fn validated(self, tag: &str) -> Result<Self, Error> {
        match self.checked_width() {
            Some(_) => Ok(self),
            None => Err(Error::InvalidSchema(format!("{} is too wide: {}", tag, self))),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::UInt8 => f.write_str("Uint8"),
            FieldType::UInt16 => f.write_str("Uint16"),
            FieldType::Int32 => f.write_str("Int32"),
            FieldType::Float32 => f.write_str("Float32"),
            FieldType::PointArray(n) => write!(f, "PointArray({})", n),
        }
    }
}

/// One normalized 2D sample of a point array
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Build from the raw signed axis bytes.
    pub fn from_raw(x: i8, y: i8) -> Self {
        Self {
            x: x as f32 / POINT_SCALE,
            y: y as f32 / POINT_SCALE,
        }
    }

    /// Nearest raw axis bytes, saturating at the i8 range.
    pub fn to_raw(&self) -> (i8, i8) {
        fn axis(v: f32) -> i8 {
            (v * POINT_SCALE).round().clamp(i8::MIN as f32, i8::MAX as f32) as i8
        }
        (axis(self.x), axis(self.y))
    }

    pub fn is_within_delta(&self, other: &Point, delta: f32) -> bool {
        (self.x - other.x).abs() <= delta && (self.y - other.y).abs() <= delta
    }
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    UInt8(u8),
    UInt16(u16),
    Int32(i32),
    Float32(f32),
    Points(Vec<Point>),
}

impl Value {
    /// The type tag this value decodes from
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::UInt8(_) => FieldType::UInt8,
            Value::UInt16(_) => FieldType::UInt16,
            Value::Int32(_) => FieldType::Int32,
            Value::Float32(_) => FieldType::Float32,
            Value::Points(p) => FieldType::PointArray(p.len()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::UInt8(v) => Some(*v as i64),
            Value::UInt16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Float32(v) => Some(*v as i64),
            Value::Points(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::UInt8(v) => Some(*v as f64),
            Value::UInt16(v) => Some(*v as f64),
            Value::Int32(v) => Some(*v as f64),
            Value::Float32(v) => Some(*v as f64),
            Value::Points(_) => None,
        }
    }

    pub fn as_points(&self) -> Option<&[Point]> {
        match self {
            Value::Points(p) => Some(p),
            _ => None,
        }
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UInt8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UInt16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<Vec<Point>> for Value {
    fn from(v: Vec<Point>) -> Self {
        Value::Points(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(FieldType::UInt8.width(), 1);
        assert_eq!(FieldType::UInt16.width(), 2);
        assert_eq!(FieldType::Int32.width(), 4);
        assert_eq!(FieldType::Float32.width(), 4);
        assert_eq!(FieldType::PointArray(160).width(), 320);
        assert_eq!(FieldType::PointArray(0).width(), 0);
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(FieldType::parse_tag("Uint8", 160).unwrap(), FieldType::UInt8);
        assert_eq!(FieldType::parse_tag("Uint16", 160).unwrap(), FieldType::UInt16);
        assert_eq!(
            FieldType::parse_tag("StrokePoints", 160).unwrap(),
            FieldType::PointArray(160)
        );
        assert_eq!(
            FieldType::parse_tag("PointArray(12)", 160).unwrap(),
            FieldType::PointArray(12)
        );
        assert!(matches!(
            FieldType::parse_tag("Float64", 160),
            Err(Error::UnknownFieldType(t)) if t == "Float64"
        ));
        assert!(FieldType::parse_tag("PointArray(x)", 160).is_err());
    }

    #[test]
    fn test_parse_tag_rejects_unaddressable_arrays() {
        let tag = format!("PointArray({})", usize::MAX / 2 + 1);
        assert!(matches!(
            FieldType::parse_tag(&tag, 160),
            Err(Error::InvalidSchema(_))
        ));
        assert!(matches!(
            FieldType::parse_tag("StrokePoints", usize::MAX),
            Err(Error::InvalidSchema(_))
        ));
        assert_eq!(FieldType::PointArray(usize::MAX).width(), usize::MAX);
    }

    #[test]
    fn test_json_shape() {
        assert_eq!(serde_json::to_value(Value::UInt8(3)).unwrap(), serde_json::json!(3));
        assert_eq!(
            serde_json::to_value(Value::Int32(-2)).unwrap(),
            serde_json::json!(-2)
        );
        assert_eq!(
            serde_json::to_value(Value::Points(vec![Point::new(0.5, -0.5)])).unwrap(),
            serde_json::json!([{ "x": 0.5, "y": -0.5 }])
        );
        assert_eq!(
            serde_json::to_value(SensorId::from("stroke")).unwrap(),
            serde_json::json!("stroke")
        );
        assert_eq!(
            serde_json::to_value(AccessMode::ReadPoll).unwrap(),
            serde_json::json!("read")
        );
    }

    #[test]
    fn test_point_raw() {
        let p = Point::from_raw(64, -64);
        assert_eq!(p, Point::new(0.5, -0.5));
        assert_eq!(p.to_raw(), (64, -64));
        assert_eq!(Point::new(1.0, -1.0).to_raw(), (127, -128));
    }

    #[test]
    fn test_access_mode() {
        assert_eq!("read".parse::<AccessMode>().unwrap(), AccessMode::ReadPoll);
        assert_eq!("BLENotify".parse::<AccessMode>().unwrap(), AccessMode::Notify);
        assert!("push".parse::<AccessMode>().is_err());
    }
}
