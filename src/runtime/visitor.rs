//! Push-style traversal of class annotations without materialization.
//!
//! The visitor sees descriptors, element names, tags and raw values; it
//! never touches a linker and nothing is allocated on its behalf. Cursor
//! correctness is maintained even when the visitor stops early: suppressed
//! values are still skipped so traversal state never desynchronizes from
//! the byte stream.

use crate::dex::annotations::Visibility;
use crate::dex::dex_file::{ClassDefItem, DexFile};
use crate::dex::error::DexError;
use crate::dex::{read_u1, read_uleb128};
use crate::runtime::annotations::find_annotation_set_for_class;
use crate::runtime::decode::{decode_raw_value, skip_annotation_value, RawDecode};
use crate::runtime::value::{RawValue, ValueTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitorStatus {
    /// Stop the whole traversal.
    Break,
    /// Move on to the next sibling.
    Next,
    /// Descend into this value's elements (arrays only; for scalar values
    /// this is the same as `Next`).
    VisitInner,
}

/// Callbacks for [`visit_class_annotations`].
pub trait AnnotationVisitor {
    /// Called once per annotation in the set, in file order.
    fn visit_annotation(&mut self, descriptor: &str, visibility: Visibility) -> VisitorStatus;

    /// Called for each top-level element of an annotation being descended
    /// into. Arrays and nested annotations appear as [`RawValue::Container`];
    /// returning [`VisitorStatus::VisitInner`] on an array descends into its
    /// elements.
    fn visit_annotation_element(&mut self, name: &str, tag: ValueTag, value: &RawValue) -> VisitorStatus;

    /// Called for each array element. `depth` is 0 for elements of a
    /// top-level array and grows with nesting; `index` is the element's
    /// position within its own array.
    fn visit_array_element(&mut self, depth: u32, index: u32, tag: ValueTag, value: &RawValue) -> VisitorStatus;
}

/// Walk the class annotation set of `class_def`, dispatching to `visitor`.
/// A class without annotations visits nothing and succeeds.
pub fn visit_class_annotations(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    visitor: &mut dyn AnnotationVisitor,
) -> Result<(), DexError> {
    let set = match find_annotation_set_for_class(dex, class_def)? {
        Some(s) => s,
        None => return Ok(()),
    };

    for &entry in &set.entries {
        if entry == 0 {
            continue;
        }
        let mut ix = entry as usize;
        let raw = read_u1(&dex.data, &mut ix)?;
        let visibility = match Visibility::from_raw(raw) {
            Some(v) => v,
            None => corrupt!("Unknown annotation visibility 0x{:02x}", raw),
        };
        let mut peek = ix;
        let type_idx = read_uleb128(&dex.data, &mut peek)?;
        let descriptor = dex.type_desc(type_idx as usize)?;

        match visitor.visit_annotation(&descriptor, visibility) {
            VisitorStatus::Break => return Ok(()),
            // Set entries are independent offsets, so there is nothing to
            // skip past.
            VisitorStatus::Next => continue,
            VisitorStatus::VisitInner => {}
        }

        let _type_idx = read_uleb128(&dex.data, &mut ix)?;
        let size = read_uleb128(&dex.data, &mut ix)?;
        for _ in 0..size {
            let name_idx = read_uleb128(&dex.data, &mut ix)?;
            let name = dex.get_string(name_idx as usize)?;
            if visit_element_value(dex, &mut ix, &name, visitor)? == VisitorStatus::Break {
                return Ok(());
            }
        }
    }

    Ok(())
}

fn visit_element_value(
    dex: &DexFile,
    ix: &mut usize,
    name: &str,
    visitor: &mut dyn AnnotationVisitor,
) -> Result<VisitorStatus, DexError> {
    match decode_raw_value(&dex.data, ix)? {
        RawDecode::Consumed(tag, value) => {
            match visitor.visit_annotation_element(name, tag, &value) {
                VisitorStatus::Break => Ok(VisitorStatus::Break),
                _ => Ok(VisitorStatus::Next),
            }
        }
        RawDecode::Container(tag) => {
            let status = visitor.visit_annotation_element(name, tag, &RawValue::Container);
            match (status, tag) {
                (VisitorStatus::VisitInner, ValueTag::Array) => visit_array(dex, ix, 0, visitor),
                // Nested annotations are not descended into; the cursor is
                // still on the header, so consume the container whole.
                (VisitorStatus::Break, _) => {
                    skip_annotation_value(&dex.data, ix)?;
                    Ok(VisitorStatus::Break)
                }
                _ => {
                    skip_annotation_value(&dex.data, ix)?;
                    Ok(VisitorStatus::Next)
                }
            }
        }
    }
}

/// Visit the elements of the array whose header sits at `*ix`, consuming
/// it entirely. A `Break` from the visitor stops further visits but the
/// remaining elements are still skipped, keeping the cursor exact.
fn visit_array(
    dex: &DexFile,
    ix: &mut usize,
    depth: u32,
    visitor: &mut dyn AnnotationVisitor,
) -> Result<VisitorStatus, DexError> {
    let header_byte = read_u1(&dex.data, ix)?;
    if header_byte & 0x1f != ValueTag::Array as u8 {
        corrupt!("Expected array value, found tag 0x{:02x}", header_byte & 0x1f);
    }
    let size = read_uleb128(&dex.data, ix)?;

    let mut broken = false;
    for index in 0..size {
        if broken {
            skip_annotation_value(&dex.data, ix)?;
            continue;
        }
        match decode_raw_value(&dex.data, ix)? {
            RawDecode::Consumed(tag, value) => {
                if visitor.visit_array_element(depth, index, tag, &value) == VisitorStatus::Break {
                    broken = true;
                }
            }
            RawDecode::Container(tag) => {
                let status = visitor.visit_array_element(depth, index, tag, &RawValue::Container);
                match (status, tag) {
                    (VisitorStatus::Break, _) => {
                        skip_annotation_value(&dex.data, ix)?;
                        broken = true;
                    }
                    (VisitorStatus::VisitInner, ValueTag::Array) => {
                        if visit_array(dex, ix, depth + 1, visitor)? == VisitorStatus::Break {
                            broken = true;
                        }
                    }
                    _ => skip_annotation_value(&dex.data, ix)?,
                }
            }
        }
    }

    Ok(if broken { VisitorStatus::Break } else { VisitorStatus::Next })
}
