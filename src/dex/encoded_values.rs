use std::cmp::max;
use crate::dex::error::DexError;
use crate::dex::{read_u1, read_uleb128, write_u1, write_uleb128, write_x};

/// encoded_annotation: uleb128 type index, uleb128 element count, then
/// count * (uleb128 name index, encoded value).
#[derive(Debug, PartialEq, Clone)]
pub struct EncodedAnnotation {
    pub type_idx: u32,
    pub elements: Vec<AnnotationElement>,
}

impl EncodedAnnotation {
    // Read an EncodedAnnotation from bytes
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<EncodedAnnotation, DexError> {
        let type_idx = read_uleb128(bytes, ix)?;
        let size = read_uleb128(bytes, ix)? as usize;
        let mut elements = Vec::with_capacity(size);

        for _ in 0..size {
            let element = AnnotationElement::read(bytes, ix)?;
            elements.push(element);
        }

        Ok(EncodedAnnotation { type_idx, elements })
    }

    // Write an EncodedAnnotation to bytes
    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut written_bytes = 0;

        written_bytes += write_uleb128(bytes, self.type_idx);
        written_bytes += write_uleb128(bytes, self.elements.len() as u32);

        for element in &self.elements {
            written_bytes += element.write(bytes);
        }

        written_bytes
    }
}


#[derive(Debug, PartialEq, Clone)]
pub struct AnnotationElement {
    pub name_idx: u32,
    pub value: EncodedValue,
}

impl AnnotationElement {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<AnnotationElement, DexError> {
        let name_idx = read_uleb128(bytes, ix)?;
        let value = EncodedValue::read(bytes, ix)?;

        Ok(AnnotationElement { name_idx, value })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut written_bytes = 0;

        written_bytes += write_uleb128(bytes, self.name_idx);
        written_bytes += self.value.write(bytes);

        written_bytes
    }
}


/// One encoded_value in structural form. This is the writer-side model (also
/// used by `static_values` parsing); the runtime annotation reader works on
/// raw cursors instead and never builds these.
#[derive(Debug, PartialEq, Clone)]
pub enum EncodedValue {
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    MethodType(u32),
    MethodHandle(u32),
    String(u32),
    Type(u32),
    Field(u32),
    Method(u32),
    Enum(u32),
    Array(Vec<EncodedValue>),
    Annotation(EncodedAnnotation),
    Null,
    Boolean(bool),
}

impl EncodedValue
{
    /// Return a shared reference to the inner `EncodedAnnotation` if this value is `EncodedValue::Annotation`.
    #[inline]
    pub fn as_annotation(&self) -> Option<&EncodedAnnotation> {
        match self {
            EncodedValue::Annotation(ann) => Some(ann),
            _ => None,
        }
    }

    // Read the EncodedValue from bytes
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<EncodedValue, DexError> {
        let header_byte = read_u1(bytes, ix)?;
        let value_arg = header_byte >> 5;
        let value_type = header_byte & 0x1F;
        let size = (value_arg + 1) as usize;

        match value_type {
            0x00 => {
                let val = read_u1(bytes, ix)? as i8;
                Ok(EncodedValue::Byte(val))
            },
            0x02 => {
                let val = read_var_i16(bytes, ix, size)?;
                Ok(EncodedValue::Short(val))
            },
            0x03 => {
                let val = read_var_u16(bytes, ix, size)?;
                Ok(EncodedValue::Char(val))
            },
            0x04 => {
                let val = read_var_i32(bytes, ix, size)?;
                Ok(EncodedValue::Int(val))
            },
            0x06 => {
                let val = read_var_i64(bytes, ix, size)?;
                Ok(EncodedValue::Long(val))
            },
            0x10 => {
                let val = read_var_f32(bytes, ix, size)?;
                Ok(EncodedValue::Float(val))
            },
            0x11 => {
                let val = read_var_f64(bytes, ix, size)?;
                Ok(EncodedValue::Double(val))
            },
            0x15 => {
                let val = read_var_u32(bytes, ix, size)?;
                Ok(EncodedValue::MethodType(val))
            },
            0x16 => {
                let val = read_var_u32(bytes, ix, size)?;
                Ok(EncodedValue::MethodHandle(val))
            },
            0x17 => {
                let val = read_var_u32(bytes, ix, size)?;
                Ok(EncodedValue::String(val))
            },
            0x18 => {
                let val = read_var_u32(bytes, ix, size)?;
                Ok(EncodedValue::Type(val))
            },
            0x19 => {
                let val = read_var_u32(bytes, ix, size)?;
                Ok(EncodedValue::Field(val))
            },
            0x1A => {
                let val = read_var_u32(bytes, ix, size)?;
                Ok(EncodedValue::Method(val))
            },
            0x1B => {
                let val = read_var_u32(bytes, ix, size)?;
                Ok(EncodedValue::Enum(val))
            },
            0x1C => {
                Ok(EncodedValue::Array(read_encoded_array(bytes, ix)?))
            },
            0x1D => {
                Ok(EncodedValue::Annotation(EncodedAnnotation::read(bytes, ix)?))
            },
            0x1E => Ok(EncodedValue::Null),
            0x1F => Ok(EncodedValue::Boolean(value_arg != 0)),
            _ => Err(DexError::malformed(&format!("Unknown EncodedValue type 0x{:02x}", value_type))),
        }
    }

    // Write the EncodedValue to bytes
    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;

        match self {
            EncodedValue::Byte(val) => {
                c += write_u1(bytes, 0x00); // value_type = 0x00, value_arg = 0
                c += write_u1(bytes, *val as u8)
            },
            EncodedValue::Short(value) => {
                let size = byte_size_i64(*value as i64).min(2);
                c += write_u1(bytes, ((size - 1) << 5) | 0x02);
                c += write_x(bytes, &value.to_le_bytes()[..size as usize]);
            },
            EncodedValue::Char(value) => {
                let size = byte_size_u64(*value as u64).min(2);
                c += write_u1(bytes, ((size - 1) << 5) | 0x03);
                c += write_x(bytes, &value.to_le_bytes()[..size as usize]);
            },
            EncodedValue::Int(value) => {
                let size = byte_size_i64(*value as i64).min(4);
                c += write_u1(bytes, ((size - 1) << 5) | 0x04);
                c += write_x(bytes, &value.to_le_bytes()[..size as usize]);
            },
            EncodedValue::Long(value) => {
                let size = byte_size_i64(*value);
                c += write_u1(bytes, ((size - 1) << 5) | 0x06);
                c += write_x(bytes, &value.to_le_bytes()[..size as usize]);
            },
            EncodedValue::Float(value) => {
                // Floats drop trailing (low-order) zero bytes; the payload is
                // the high end of the bit pattern.
                let size = byte_size_f32(*value);
                c += write_u1(bytes, ((size - 1) << 5) | 0x10);
                c += write_x(bytes, &value.to_bits().to_le_bytes()[(4 - size as usize)..]);
            },
            EncodedValue::Double(value) => {
                let size = byte_size_f64(*value);
                c += write_u1(bytes, ((size - 1) << 5) | 0x11);
                c += write_x(bytes, &value.to_bits().to_le_bytes()[(8 - size as usize)..]);
            },
            EncodedValue::MethodType(value) => {
                let size = byte_size_u64(*value as u64).min(4);
                c += write_u1(bytes, ((size - 1) << 5) | 0x15);
                c += write_x(bytes, &value.to_le_bytes()[..size as usize]);
            },
            EncodedValue::MethodHandle(value) => {
                let size = byte_size_u64(*value as u64).min(4);
                c += write_u1(bytes, ((size - 1) << 5) | 0x16);
                c += write_x(bytes, &value.to_le_bytes()[..size as usize]);
            },
            EncodedValue::String(value) => {
                let size = byte_size_u64(*value as u64).min(4);
                c += write_u1(bytes, ((size - 1) << 5) | 0x17);
                c += write_x(bytes, &value.to_le_bytes()[..size as usize]);
            },
            EncodedValue::Type(value) => {
                let size = byte_size_u64(*value as u64).min(4);
                c += write_u1(bytes, ((size - 1) << 5) | 0x18);
                c += write_x(bytes, &value.to_le_bytes()[..size as usize]);
            },
            EncodedValue::Field(value) => {
                let size = byte_size_u64(*value as u64).min(4);
                c += write_u1(bytes, ((size - 1) << 5) | 0x19);
                c += write_x(bytes, &value.to_le_bytes()[..size as usize]);
            },
            EncodedValue::Method(value) => {
                let size = byte_size_u64(*value as u64).min(4);
                c += write_u1(bytes, ((size - 1) << 5) | 0x1a);
                c += write_x(bytes, &value.to_le_bytes()[..size as usize]);
            },
            EncodedValue::Enum(value) => {
                let size = byte_size_u64(*value as u64).min(4);
                c += write_u1(bytes, ((size - 1) << 5) | 0x1b);
                c += write_x(bytes, &value.to_le_bytes()[..size as usize]);
            },
            EncodedValue::Array(value) => {
                c += write_u1(bytes, 0x1c);
                c += write_encoded_array(value, bytes);
            },
            EncodedValue::Annotation(value) => {
                c += write_u1(bytes, 0x1d);
                c += value.write(bytes);
            },
            EncodedValue::Null => {
                c += write_u1(bytes, 0x1e);
            },
            EncodedValue::Boolean(val) => {
                let v = match *val { true => 1, false => 0 };
                c += write_u1(bytes, 0x1f | (v << 5));
            }
        }
        c
    }
}

fn read_var_u16(bytes: &[u8], ix: &mut usize, size: usize) -> Result<u16, DexError> {
    let mut result = 0u16;
    for i in 0..size {
        let byte = read_u1(bytes, ix)?;
        result |= (byte as u16) << (8 * i);
    }
    Ok(result)
}

fn read_var_i16(bytes: &[u8], ix: &mut usize, size: usize) -> Result<i16, DexError> {
    let v = read_var_u16(bytes, ix, size)? as i16;
    let shift = 16 - 8 * size as u32;
    Ok((v << shift) >> shift)
}

fn read_var_u32(bytes: &[u8], ix: &mut usize, size: usize) -> Result<u32, DexError> {
    let mut result = 0;
    for i in 0..size {
        let byte = read_u1(bytes, ix)?;
        result |= (byte as u32) << (8 * i);
    }

    Ok(result)
}

fn read_var_i32(bytes: &[u8], ix: &mut usize, size: usize) -> Result<i32, DexError> {
    let v = read_var_u32(bytes, ix, size)? as i32;
    let shift = 32 - 8 * size as u32;
    Ok((v << shift) >> shift)
}

fn read_var_i64(bytes: &[u8], ix: &mut usize, size: usize) -> Result<i64, DexError> {
    let mut result = 0u64;
    for i in 0..size {
        let byte = read_u1(bytes, ix)?;
        result |= (byte as u64) << (8 * i);
    }
    let shift = 64 - 8 * size as u32;
    Ok(((result as i64) << shift) >> shift)
}

fn read_var_f32(bytes: &[u8], ix: &mut usize, size: usize) -> Result<f32, DexError> {
    // The payload holds the high-order bytes of the bit pattern.
    let mut result = 0u32;
    for i in 0..size {
        let byte = read_u1(bytes, ix)?;
        result |= (byte as u32) << (8 * (4 - size + i));
    }
    Ok(f32::from_bits(result))
}

fn read_var_f64(bytes: &[u8], ix: &mut usize, size: usize) -> Result<f64, DexError> {
    let mut result = 0u64;
    for i in 0..size {
        let byte = read_u1(bytes, ix)?;
        result |= (byte as u64) << (8 * (8 - size + i));
    }
    Ok(f64::from_bits(result))
}

// Narrowest width whose sign extension reproduces the value.
fn byte_size_i64(v: i64) -> u8
{
    for n in 1..8u32 {
        let shift = 64 - 8 * n;
        if (v << shift) >> shift == v { return n as u8; }
    }
    8
}

fn byte_size_u64(v: u64) -> u8
{
    let s = (v.leading_zeros() / 8) as u8;
    max(1, 8 - s)
}

fn byte_size_f32(v: f32) -> u8
{
    let u = v.to_bits();
    max(1, 4 - (u.trailing_zeros() / 8).min(4) as u8)
}

fn byte_size_f64(v: f64) -> u8
{
    let u = v.to_bits();
    max(1, 8 - (u.trailing_zeros() / 8).min(8) as u8)
}


pub fn write_encoded_array(encoded_array: &[EncodedValue], bytes: &mut Vec<u8>) -> usize
{
    let mut c = 0;
    c += write_uleb128(bytes, encoded_array.len() as u32);

    for value in encoded_array {
        c += value.write(bytes);
    }

    c
}

pub fn read_encoded_array(bytes: &[u8], ix: &mut usize) -> Result<Vec<EncodedValue>, DexError>
{
    let size = read_uleb128(bytes, ix)? as usize;

    let mut values = Vec::with_capacity(size);
    for _ in 0..size
    {
        values.push(EncodedValue::read(bytes, ix)?);
    }

    Ok(values)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_value_byte() {
        let bytes = vec![0x00, 0x7F];
        let mut ix = 0;
        let encoded_value = EncodedValue::read(&bytes, &mut ix).expect("Failed to read EncodedValue");
        match encoded_value {
            EncodedValue::Byte(val) => assert_eq!(val, 127),
            _ => panic!("Unexpected variant"),
        }

        let mut output_bytes = vec![];
        let bytes_written = encoded_value.write(&mut output_bytes);
        assert_eq!(bytes_written, 2);
        assert_eq!(output_bytes, bytes);
    }

    #[test]
    fn test_encoded_value_short() {
        let bytes = vec![0x22, 0x34, 0x12];  // value_arg=1 => 2 bytes, 0x1234 little-endian
        let mut ix = 0;
        let encoded_value = EncodedValue::read(&bytes, &mut ix).expect("Failed to read EncodedValue");
        match encoded_value {
            EncodedValue::Short(val) => assert_eq!(val, 0x1234),
            _ => panic!("Unexpected variant"),
        }

        let mut output_bytes = vec![];
        let bytes_written = encoded_value.write(&mut output_bytes);
        assert_eq!(bytes_written, 3);
        assert_eq!(output_bytes, bytes);
    }

    #[test]
    fn test_encoded_value_negative_short_single_byte() {
        // -1 sign-extends from one byte
        let value = EncodedValue::Short(-1);
        let mut bytes = vec![];
        value.write(&mut bytes);
        assert_eq!(bytes, vec![0x02, 0xFF]);

        let mut ix = 0;
        assert_eq!(EncodedValue::read(&bytes, &mut ix).unwrap(), value);
        assert_eq!(ix, bytes.len());
    }

    #[test]
    fn test_encoded_value_int() {
        let bytes = vec![0x64, 0x78, 0x56, 0x34, 0x12];
        let mut ix = 0;
        let encoded_value = EncodedValue::read(&bytes, &mut ix).expect("Failed to read EncodedValue");
        match encoded_value {
            EncodedValue::Int(val) => assert_eq!(val, 0x12345678),
            _ => panic!("Unexpected variant"),
        }

        let mut output_bytes = vec![];
        let bytes_written = encoded_value.write(&mut output_bytes);
        assert_eq!(bytes_written, 5);
        assert_eq!(output_bytes, bytes);
    }

    #[test]
    fn test_encoded_value_float_left_aligned() {
        // 1.0f = 0x3F800000: trailing zero bytes dropped, payload [0x80, 0x3F]
        let value = EncodedValue::Float(1.0);
        let mut bytes = vec![];
        value.write(&mut bytes);
        assert_eq!(bytes, vec![(1 << 5) | 0x10, 0x80, 0x3F]);

        let mut ix = 0;
        assert_eq!(EncodedValue::read(&bytes, &mut ix).unwrap(), value);
        assert_eq!(ix, bytes.len());
    }

    #[test]
    fn test_encoded_value_double_roundtrip() {
        for v in [0.0f64, 0.5, -2.0, 1234.5678] {
            let value = EncodedValue::Double(v);
            let mut bytes = vec![];
            value.write(&mut bytes);
            let mut ix = 0;
            assert_eq!(EncodedValue::read(&bytes, &mut ix).unwrap(), value);
            assert_eq!(ix, bytes.len());
        }
    }

    #[test]
    fn test_encoded_value_null() {
        let bytes = vec![0x1E];
        let mut ix = 0;
        let encoded_value = EncodedValue::read(&bytes, &mut ix).expect("Failed to read EncodedValue");
        match encoded_value {
            EncodedValue::Null => (),
            _ => panic!("Unexpected variant"),
        }

        let mut output_bytes = vec![];
        let bytes_written = encoded_value.write(&mut output_bytes);
        assert_eq!(bytes_written, 1);
        assert_eq!(output_bytes, bytes);
    }

    #[test]
    fn test_encoded_value_boolean() {
        for (header, expected) in [(0x1Fu8 | (1 << 5), true), (0x1F, false)] {
            let bytes = vec![header];
            let mut ix = 0;
            let encoded_value = EncodedValue::read(&bytes, &mut ix).expect("Failed to read EncodedValue");
            match encoded_value {
                EncodedValue::Boolean(val) => assert_eq!(val, expected),
                _ => panic!("Unexpected variant"),
            }

            let mut output_bytes = vec![];
            assert_eq!(encoded_value.write(&mut output_bytes), 1);
            assert_eq!(output_bytes, bytes);
        }
    }

    #[test]
    fn test_encoded_value_unknown_tag_is_malformed() {
        // 0x1F is the highest defined tag; 0x01 and 0x05 are reserved.
        let bytes = vec![0x01];
        let mut ix = 0;
        let err = EncodedValue::read(&bytes, &mut ix).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_encoded_annotation_read_write() {
        let annotation = EncodedAnnotation {
            type_idx: 1,
            elements: vec![
                AnnotationElement {
                    name_idx: 2,
                    value: EncodedValue::Boolean(true),
                },
                AnnotationElement {
                    name_idx: 3,
                    value: EncodedValue::Int(42),
                },
            ],
        };

        let mut bytes = vec![];
        annotation.write(&mut bytes);

        let mut ix = 0;
        let read_annotation = EncodedAnnotation::read(&bytes, &mut ix).expect("Failed to read EncodedAnnotation");

        assert_eq!(annotation, read_annotation);
    }

    #[test]
    fn test_nested_array_roundtrip() {
        let value = EncodedValue::Array(vec![
            EncodedValue::Array(vec![EncodedValue::Int(1), EncodedValue::Int(2)]),
            EncodedValue::Array(vec![EncodedValue::Int(3)]),
        ]);
        let mut bytes = vec![];
        value.write(&mut bytes);
        let mut ix = 0;
        assert_eq!(EncodedValue::read(&bytes, &mut ix).unwrap(), value);
        assert_eq!(ix, bytes.len());
    }
}
