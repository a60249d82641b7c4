//! Width-driven decoding of encoded_value payloads.
//!
//! Scalar payloads are stored little-endian in `zwidth + 1` bytes, where
//! `zwidth` is the header's value_arg. Signed integrals sign-extend from
//! that width; unsigned ones zero-extend. Float and double payloads drop
//! trailing zero bytes, so they zero-extend with the payload left-aligned
//! into the high bytes of the bit pattern (`fill_on_right`).

use crate::dex::error::DexError;
use crate::dex::{read_u1, read_uleb128};
use crate::runtime::value::{RawValue, ValueTag};

pub fn read_signed_int(bytes: &[u8], ix: &mut usize, zwidth: u32) -> Result<i32, DexError> {
    if zwidth > 3 {
        corrupt!("int value_arg {} out of range", zwidth);
    }
    let mut val: u32 = 0;
    for i in 0..=zwidth {
        val |= (read_u1(bytes, ix)? as u32) << (i * 8);
    }
    let shift = (3 - zwidth) * 8;
    Ok(((val as i32) << shift) >> shift)
}

pub fn read_signed_long(bytes: &[u8], ix: &mut usize, zwidth: u32) -> Result<i64, DexError> {
    if zwidth > 7 {
        corrupt!("long value_arg {} out of range", zwidth);
    }
    let mut val: u64 = 0;
    for i in 0..=zwidth {
        val |= (read_u1(bytes, ix)? as u64) << (i * 8);
    }
    let shift = (7 - zwidth) * 8;
    Ok(((val as i64) << shift) >> shift)
}

pub fn read_unsigned_int(bytes: &[u8], ix: &mut usize, zwidth: u32, fill_on_right: bool) -> Result<u32, DexError> {
    if zwidth > 3 {
        corrupt!("int value_arg {} out of range", zwidth);
    }
    let mut val: u32 = 0;
    if fill_on_right {
        for _ in 0..=zwidth {
            val = (val >> 8) | ((read_u1(bytes, ix)? as u32) << 24);
        }
    } else {
        for i in 0..=zwidth {
            val |= (read_u1(bytes, ix)? as u32) << (i * 8);
        }
    }
    Ok(val)
}

pub fn read_unsigned_long(bytes: &[u8], ix: &mut usize, zwidth: u32, fill_on_right: bool) -> Result<u64, DexError> {
    if zwidth > 7 {
        corrupt!("long value_arg {} out of range", zwidth);
    }
    let mut val: u64 = 0;
    if fill_on_right {
        for _ in 0..=zwidth {
            val = (val >> 8) | ((read_u1(bytes, ix)? as u64) << 56);
        }
    } else {
        for i in 0..=zwidth {
            val |= (read_u1(bytes, ix)? as u64) << (i * 8);
        }
    }
    Ok(val)
}

/// Outcome of [`decode_raw_value`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawDecode {
    /// A scalar was fully consumed; the cursor sits after its payload.
    Consumed(ValueTag, RawValue),
    /// An array or nested annotation. The cursor is left ON the header byte
    /// so the caller can iterate or [`skip_annotation_value`] it.
    Container(ValueTag),
}

/// Decode one encoded value without resolution or allocation.
pub fn decode_raw_value(bytes: &[u8], ix: &mut usize) -> Result<RawDecode, DexError> {
    let header_start = *ix;
    let header_byte = read_u1(bytes, ix)?;
    let value_arg = (header_byte >> 5) as u32;
    let raw_tag = header_byte & 0x1f;

    let tag = match ValueTag::from_raw(raw_tag) {
        Some(t) => t,
        None => corrupt!("Bad annotation value tag 0x{:02x}", raw_tag),
    };

    let value = match tag {
        ValueTag::Byte => RawValue::Byte(read_signed_int(bytes, ix, value_arg)? as i8),
        ValueTag::Short => RawValue::Short(read_signed_int(bytes, ix, value_arg)? as i16),
        ValueTag::Char => RawValue::Char(read_unsigned_int(bytes, ix, value_arg, false)? as u16),
        ValueTag::Int => RawValue::Int(read_signed_int(bytes, ix, value_arg)?),
        ValueTag::Long => RawValue::Long(read_signed_long(bytes, ix, value_arg)?),
        ValueTag::Float => {
            RawValue::Float(f32::from_bits(read_unsigned_int(bytes, ix, value_arg, true)?))
        }
        ValueTag::Double => {
            RawValue::Double(f64::from_bits(read_unsigned_long(bytes, ix, value_arg, true)?))
        }
        ValueTag::String
        | ValueTag::Type
        | ValueTag::Field
        | ValueTag::Method
        | ValueTag::Enum => RawValue::Index(read_unsigned_int(bytes, ix, value_arg, false)?),
        ValueTag::Null => RawValue::Null,
        ValueTag::Boolean => RawValue::Boolean(value_arg != 0),
        ValueTag::Array | ValueTag::Annotation => {
            *ix = header_start;
            return Ok(RawDecode::Container(tag));
        }
    };

    Ok(RawDecode::Consumed(tag, value))
}

/// Consume exactly one encoded value of any tag, recursing through arrays
/// and nested annotations. Stays in byte-for-byte agreement with the
/// decoding paths.
pub fn skip_annotation_value(bytes: &[u8], ix: &mut usize) -> Result<(), DexError> {
    let header_byte = read_u1(bytes, ix)?;
    let value_arg = (header_byte >> 5) as usize;
    let raw_tag = header_byte & 0x1f;

    let tag = match ValueTag::from_raw(raw_tag) {
        Some(t) => t,
        None => corrupt!("Bad annotation value tag 0x{:02x}", raw_tag),
    };

    match tag {
        ValueTag::Byte
        | ValueTag::Short
        | ValueTag::Char
        | ValueTag::Int
        | ValueTag::Long
        | ValueTag::Float
        | ValueTag::Double
        | ValueTag::String
        | ValueTag::Type
        | ValueTag::Field
        | ValueTag::Method
        | ValueTag::Enum => {
            let width = value_arg + 1;
            if *ix + width > bytes.len() {
                return Err(DexError::truncated("Annotation value payload past end of data"));
            }
            *ix += width;
        }
        ValueTag::Array => {
            let size = read_uleb128(bytes, ix)?;
            for _ in 0..size {
                skip_annotation_value(bytes, ix)?;
            }
        }
        ValueTag::Annotation => {
            let _type_idx = read_uleb128(bytes, ix)?;
            let size = read_uleb128(bytes, ix)?;
            for _ in 0..size {
                let _name_idx = read_uleb128(bytes, ix)?;
                skip_annotation_value(bytes, ix)?;
            }
        }
        ValueTag::Null | ValueTag::Boolean => {}
    }

    Ok(())
}
