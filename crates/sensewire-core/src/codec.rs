//! SenseWire Field Codec
//!
//! Fixed-width little-endian decoding for every [`FieldType`].
//!
//! ```text
//! Uint8         1 byte
//! Uint16        2 bytes, little-endian
//! Int32         4 bytes, little-endian, two's complement
//! Float32       4 bytes, little-endian, IEEE 754
//! PointArray(N) 2*N bytes: [x0:i8][y0:i8][x1:i8][y1:i8]...
//! ```
//!
//! There are no tags or length prefixes on the wire. Producer and decoder
//! agree on the layout out of band.

use crate::types::{FieldType, Point, Value};
use crate::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Decode one field at `offset`.
///
/// Returns the value and the number of bytes consumed, which always equals
/// [`FieldType::width`] of `ty`.
pub fn decode_field(ty: FieldType, buf: &[u8], offset: usize) -> Result<(Value, usize)> {
    let size = ty.width();
    let end = offset.checked_add(size).ok_or(Error::OutOfBounds {
        offset,
        width: size,
        len: buf.len(),
    })?;
    if end > buf.len() {
        return Err(Error::OutOfBounds {
            offset,
            width: size,
            len: buf.len(),
        });
    }

    let mut cursor = &buf[offset..end];
    let value = match ty {
        FieldType::UInt8 => Value::UInt8(cursor.get_u8()),
        FieldType::UInt16 => Value::UInt16(cursor.get_u16_le()),
        FieldType::Int32 => Value::Int32(cursor.get_i32_le()),
        FieldType::Float32 => Value::Float32(cursor.get_f32_le()),
        FieldType::PointArray(count) => Value::Points(decode_points(&mut cursor, count)),
    };

    Ok((value, size))
}

fn decode_points(cursor: &mut &[u8], count: usize) -> Vec<Point> {
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let x = cursor.get_i8();
        let y = cursor.get_i8();
        points.push(Point::from_raw(x, y));
    }
    points
}

/// Encode one value in wire layout for `ty`.
///
/// Point arrays shorter than `N` are padded with the origin; longer ones are
/// rejected. A value of the wrong variant is rejected.
pub fn encode_field(buf: &mut BytesMut, ty: FieldType, value: &Value) -> Result<()> {
    match (ty, value) {
        (FieldType::UInt8, Value::UInt8(v)) => buf.put_u8(*v),
        (FieldType::UInt16, Value::UInt16(v)) => buf.put_u16_le(*v),
        (FieldType::Int32, Value::Int32(v)) => buf.put_i32_le(*v),
        (FieldType::Float32, Value::Float32(v)) => buf.put_f32_le(*v),
        (FieldType::PointArray(count), Value::Points(points)) => {
            if points.len() > count {
                return Err(Error::InvalidSchema(format!(
                    "{} points do not fit PointArray({})",
                    points.len(),
                    count
                )));
            }
            for point in points {
                let (x, y) = point.to_raw();
                buf.put_i8(x);
                buf.put_i8(y);
            }
            buf.put_bytes(0, 2 * (count - points.len()));
        }
        (ty, value) => {
            return Err(Error::InvalidSchema(format!(
                "value {:?} does not match field type {}",
                value.field_type(),
                ty
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_primitives_little_endian() {
        let buf = [0x2A, 0x34, 0x12, 0xFE, 0xFF, 0xFF, 0xFF];

        assert_eq!(decode_field(FieldType::UInt8, &buf, 0).unwrap(), (Value::UInt8(42), 1));
        assert_eq!(
            decode_field(FieldType::UInt16, &buf, 1).unwrap(),
            (Value::UInt16(0x1234), 2)
        );
        assert_eq!(decode_field(FieldType::Int32, &buf, 3).unwrap(), (Value::Int32(-2), 4));
    }

    #[test]
    fn test_decode_float() {
        let buf = 1.5f32.to_le_bytes();
        let (value, used) = decode_field(FieldType::Float32, &buf, 0).unwrap();
        assert_eq!(value, Value::Float32(1.5));
        assert_eq!(used, 4);
    }

    #[test]
    fn test_decode_points() {
        let buf = [0u8, 64, 64, 0xC0, 0xC0];
        let (value, used) = decode_field(FieldType::PointArray(2), &buf, 1).unwrap();
        assert_eq!(used, 4);
        assert_eq!(
            value,
            Value::Points(vec![Point::new(0.5, 0.5), Point::new(-0.5, -0.5)])
        );
    }

    #[test]
    fn test_out_of_bounds() {
        let buf = [1u8, 2, 3];
        assert_eq!(
            decode_field(FieldType::Int32, &buf, 0),
            Err(Error::OutOfBounds {
                offset: 0,
                width: 4,
                len: 3
            })
        );
        assert!(decode_field(FieldType::UInt16, &buf, 2).is_err());
        assert!(decode_field(FieldType::UInt8, &buf, usize::MAX).is_err());
    }

    #[test]
    fn test_zero_length_point_array() {
        let (value, used) = decode_field(FieldType::PointArray(0), &[], 0).unwrap();
        assert_eq!(value, Value::Points(Vec::new()));
        assert_eq!(used, 0);
    }

    #[test]
    fn test_encode_pads_points() {
        let mut buf = BytesMut::new();
        encode_field(
            &mut buf,
            FieldType::PointArray(3),
            &Value::Points(vec![Point::new(0.5, -0.5)]),
        )
        .unwrap();
        assert_eq!(&buf[..], &[64, 0xC0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_type_mismatch() {
        let mut buf = BytesMut::new();
        assert!(encode_field(&mut buf, FieldType::Int32, &Value::UInt8(1)).is_err());
        assert!(buf.is_empty());
    }
}
