//! DEX annotation container structures and I/O
//!
//! Binary structures from the DEX file format:
//! - annotations_directory_item
//! - annotation_set_item
//! - annotation_set_ref_list
//! - annotation_item (wraps EncodedAnnotation)
//!
//! The runtime reader in [`crate::runtime`] walks these by offset inside the
//! data section; the typed structs here are the parse/serialize form.

use crate::dex::encoded_values::EncodedAnnotation;
use crate::dex::error::DexError;
use crate::dex::{read_u1, read_u4, write_u1, write_u4};

/// Annotation retention class, from the `visibility` byte of an
/// `annotation_item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// 0x00, compile-time only
    Build,
    /// 0x01, visible to reflection
    Runtime,
    /// 0x02, system annotations (dalvik.annotation.*)
    System,
}

impl Visibility {
    pub fn from_raw(raw: u8) -> Option<Visibility> {
        match raw {
            0x00 => Some(Visibility::Build),
            0x01 => Some(Visibility::Runtime),
            0x02 => Some(Visibility::System),
            _ => None,
        }
    }

    pub fn to_raw(self) -> u8 {
        match self {
            Visibility::Build => 0x00,
            Visibility::Runtime => 0x01,
            Visibility::System => 0x02,
        }
    }
}

/// annotation_item
/// https://source.android.com/docs/core/runtime/dex-format#annotation-item
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationItem {
    pub visibility: Visibility,
    /// The encoded annotation payload
    pub annotation: EncodedAnnotation,
}

impl AnnotationItem {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<AnnotationItem, DexError> {
        let raw = read_u1(bytes, ix)?;
        let visibility = match Visibility::from_raw(raw) {
            Some(v) => v,
            None => corrupt!("Unknown annotation visibility 0x{:02x}", raw),
        };
        let annotation = EncodedAnnotation::read(bytes, ix)?;
        Ok(AnnotationItem {
            visibility,
            annotation,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u1(bytes, self.visibility.to_raw());
        c += self.annotation.write(bytes);
        c
    }
}

/// annotation_set_item
/// A list of offsets to `annotation_item`s
/// https://source.android.com/docs/core/runtime/dex-format#annotation-set-item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationSetItem {
    /// Offsets (from start of the file) to `annotation_item`s
    pub entries: Vec<u32>,
}

impl AnnotationSetItem {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<AnnotationSetItem, DexError> {
        let size = read_u4(bytes, ix)? as usize;
        let mut entries = Vec::with_capacity(size);
        for _ in 0..size {
            entries.push(read_u4(bytes, ix)?);
        }
        Ok(AnnotationSetItem { entries })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u4(bytes, self.entries.len() as u32);
        for off in &self.entries {
            c += write_u4(bytes, *off);
        }
        c
    }
}

/// annotation_set_ref_list
/// A list of offsets to `annotation_set_item`s, one per method parameter
/// https://source.android.com/docs/core/runtime/dex-format#annotation-set-ref-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationSetRefList {
    pub list: Vec<u32>,
}

impl AnnotationSetRefList {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<AnnotationSetRefList, DexError> {
        let size = read_u4(bytes, ix)? as usize;
        let mut list = Vec::with_capacity(size);
        for _ in 0..size {
            list.push(read_u4(bytes, ix)?);
        }
        Ok(AnnotationSetRefList { list })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u4(bytes, self.list.len() as u32);
        for off in &self.list {
            c += write_u4(bytes, *off);
        }
        c
    }
}

/// field_annotations_item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAnnotations {
    /// index into field_ids
    pub field_idx: u32,
    /// offset to an `annotation_set_item`
    pub annotations_off: u32,
}

impl FieldAnnotations {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<FieldAnnotations, DexError> {
        Ok(FieldAnnotations {
            field_idx: read_u4(bytes, ix)?,
            annotations_off: read_u4(bytes, ix)?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_u4(bytes, self.field_idx) + write_u4(bytes, self.annotations_off)
    }
}

/// method_annotations_item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodAnnotations {
    /// index into method_ids
    pub method_idx: u32,
    /// offset to an `annotation_set_item`
    pub annotations_off: u32,
}

impl MethodAnnotations {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<MethodAnnotations, DexError> {
        Ok(MethodAnnotations {
            method_idx: read_u4(bytes, ix)?,
            annotations_off: read_u4(bytes, ix)?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_u4(bytes, self.method_idx) + write_u4(bytes, self.annotations_off)
    }
}

/// parameter_annotations_item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterAnnotations {
    /// index into method_ids (method whose parameters are being annotated)
    pub method_idx: u32,
    /// offset to an `annotation_set_ref_list`
    pub annotations_off: u32,
}

impl ParameterAnnotations {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<ParameterAnnotations, DexError> {
        Ok(ParameterAnnotations {
            method_idx: read_u4(bytes, ix)?,
            annotations_off: read_u4(bytes, ix)?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_u4(bytes, self.method_idx) + write_u4(bytes, self.annotations_off)
    }
}

/// annotations_directory_item
/// https://source.android.com/docs/core/runtime/dex-format#annotations-directory-item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationsDirectoryItem {
    /// Offset to the class `annotation_set_item` (or 0 if none)
    pub class_annotations_off: u32,
    pub field_annotations: Vec<FieldAnnotations>,
    pub method_annotations: Vec<MethodAnnotations>,
    pub parameter_annotations: Vec<ParameterAnnotations>,
}

impl AnnotationsDirectoryItem {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<AnnotationsDirectoryItem, DexError> {
        let class_annotations_off = read_u4(bytes, ix)?;
        let fields_size = read_u4(bytes, ix)? as usize;
        let annotated_methods_size = read_u4(bytes, ix)? as usize;
        let annotated_parameters_size = read_u4(bytes, ix)? as usize;

        let mut field_annotations = Vec::with_capacity(fields_size);
        for _ in 0..fields_size {
            field_annotations.push(FieldAnnotations::read(bytes, ix)?);
        }

        let mut method_annotations = Vec::with_capacity(annotated_methods_size);
        for _ in 0..annotated_methods_size {
            method_annotations.push(MethodAnnotations::read(bytes, ix)?);
        }

        let mut parameter_annotations = Vec::with_capacity(annotated_parameters_size);
        for _ in 0..annotated_parameters_size {
            parameter_annotations.push(ParameterAnnotations::read(bytes, ix)?);
        }

        Ok(AnnotationsDirectoryItem {
            class_annotations_off,
            field_annotations,
            method_annotations,
            parameter_annotations,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u4(bytes, self.class_annotations_off);
        c += write_u4(bytes, self.field_annotations.len() as u32);
        c += write_u4(bytes, self.method_annotations.len() as u32);
        c += write_u4(bytes, self.parameter_annotations.len() as u32);

        for fa in &self.field_annotations {
            c += fa.write(bytes);
        }
        for ma in &self.method_annotations {
            c += ma.write(bytes);
        }
        for pa in &self.parameter_annotations {
            c += pa.write(bytes);
        }
        c
    }

    /// Offset of the `annotation_set_item` for a field, if the field is annotated.
    pub fn field_annotations_off(&self, field_idx: u32) -> Option<u32> {
        self.field_annotations
            .iter()
            .find(|fa| fa.field_idx == field_idx)
            .map(|fa| fa.annotations_off)
    }

    /// Offset of the `annotation_set_item` for a method, if the method is annotated.
    pub fn method_annotations_off(&self, method_idx: u32) -> Option<u32> {
        self.method_annotations
            .iter()
            .find(|ma| ma.method_idx == method_idx)
            .map(|ma| ma.annotations_off)
    }

    /// Offset of the `annotation_set_ref_list` for a method's parameters.
    pub fn parameter_annotations_off(&self, method_idx: u32) -> Option<u32> {
        self.parameter_annotations
            .iter()
            .find(|pa| pa.method_idx == method_idx)
            .map(|pa| pa.annotations_off)
    }
}
