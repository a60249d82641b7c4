//! Value model for the runtime annotation reader.

use serde::{Deserialize, Serialize};

/// The value tags the runtime annotation reader accepts. `method_type` and
/// `method_handle` exist in the container format but never appear inside
/// annotations; the reader treats them as corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueTag {
    Byte = 0x00,
    Short = 0x02,
    Char = 0x03,
    Int = 0x04,
    Long = 0x06,
    Float = 0x10,
    Double = 0x11,
    String = 0x17,
    Type = 0x18,
    Field = 0x19,
    Method = 0x1a,
    Enum = 0x1b,
    Array = 0x1c,
    Annotation = 0x1d,
    Null = 0x1e,
    Boolean = 0x1f,
}

impl ValueTag {
    pub fn from_raw(raw: u8) -> Option<ValueTag> {
        match raw {
            0x00 => Some(ValueTag::Byte),
            0x02 => Some(ValueTag::Short),
            0x03 => Some(ValueTag::Char),
            0x04 => Some(ValueTag::Int),
            0x06 => Some(ValueTag::Long),
            0x10 => Some(ValueTag::Float),
            0x11 => Some(ValueTag::Double),
            0x17 => Some(ValueTag::String),
            0x18 => Some(ValueTag::Type),
            0x19 => Some(ValueTag::Field),
            0x1a => Some(ValueTag::Method),
            0x1b => Some(ValueTag::Enum),
            0x1c => Some(ValueTag::Array),
            0x1d => Some(ValueTag::Annotation),
            0x1e => Some(ValueTag::Null),
            0x1f => Some(ValueTag::Boolean),
            _ => None,
        }
    }

    /// The primitive kind a tag decodes to, `None` for reference tags.
    pub fn primitive_kind(self) -> Option<PrimitiveKind> {
        match self {
            ValueTag::Boolean => Some(PrimitiveKind::Boolean),
            ValueTag::Byte => Some(PrimitiveKind::Byte),
            ValueTag::Short => Some(PrimitiveKind::Short),
            ValueTag::Char => Some(PrimitiveKind::Char),
            ValueTag::Int => Some(PrimitiveKind::Int),
            ValueTag::Long => Some(PrimitiveKind::Long),
            ValueTag::Float => Some(PrimitiveKind::Float),
            ValueTag::Double => Some(PrimitiveKind::Double),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

/// Resolution policy for [`process_annotation_value`].
///
/// [`process_annotation_value`]: crate::runtime::annotations::process_annotation_value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultStyle {
    /// Keep primitives unboxed and leave reference values as raw indices.
    /// Never touches the linker and never allocates.
    AllRaw,
    /// Everything becomes an object; primitives are boxed through the linker.
    AllObjects,
    /// Primitives stay unboxed; references are resolved to objects.
    PrimitivesOrObjects,
}

/// A decoded slot, generic over the linker's object handle. Mirrors the
/// union-with-a-tag shape the dex value model implies: exactly one of the
/// arms is meaningful for a given [`ValueTag`].
#[derive(Debug, Clone, PartialEq)]
pub enum JValue<O> {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Object(Option<O>),
}

impl<O> JValue<O> {
    pub fn object(&self) -> Option<&O> {
        match self {
            JValue::Object(o) => o.as_ref(),
            _ => None,
        }
    }

    pub fn is_null_object(&self) -> bool {
        matches!(self, JValue::Object(None))
    }
}

/// A decoded value together with the tag it was decoded from. The tag
/// survives resolution so callers can distinguish, say, a boxed Int from a
/// resolved String.
#[derive(Debug, Clone)]
pub struct AnnotationValue<O> {
    pub tag: ValueTag,
    pub value: JValue<O>,
}

/// A value decoded without any resolution or allocation, as handed to
/// visitors and to the raw decode path. Reference tags keep their dex-file
/// index; arrays and nested annotations appear as [`RawValue::Container`]
/// with the payload still at the cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// String/type/field/method/enum index into the respective id table.
    Index(u32),
    Null,
    Container,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_from_raw() {
        assert_eq!(ValueTag::from_raw(0x00), Some(ValueTag::Byte));
        assert_eq!(ValueTag::from_raw(0x1f), Some(ValueTag::Boolean));
        // Reserved and container-only tags are rejected.
        assert_eq!(ValueTag::from_raw(0x01), None);
        assert_eq!(ValueTag::from_raw(0x15), None);
        assert_eq!(ValueTag::from_raw(0x16), None);
        assert_eq!(ValueTag::from_raw(0x20), None);
    }

    #[test]
    fn test_tag_primitive_kind() {
        assert_eq!(ValueTag::Char.primitive_kind(), Some(PrimitiveKind::Char));
        assert_eq!(ValueTag::Double.primitive_kind(), Some(PrimitiveKind::Double));
        assert_eq!(ValueTag::String.primitive_kind(), None);
        assert_eq!(ValueTag::Array.primitive_kind(), None);
        assert_eq!(ValueTag::Null.primitive_kind(), None);
    }
}
