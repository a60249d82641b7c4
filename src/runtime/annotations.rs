//! Annotation set walking and materialization.
//!
//! Three layers, bottom up:
//! - walkers that locate annotation sets through a class's annotations
//!   directory and search them by descriptor and visibility;
//! - the materializer, which turns encoded values into linker objects under a
//!   [`ResultStyle`] policy;
//! - the named queries (`get_annotation_for_field`, `get_inner_class`, ...)
//!   that reflection and the compiler ask for.
//!
//! Corruption (bad tags, truncated payloads, out-of-range indices) surfaces
//! as a [`DexError`] and is never caught here. Resolution failures are
//! `None`/`false` results, with the linker's pending-failure flag observed
//! or cleared exactly where each query can tolerate it.

use bitflags::bitflags;
use log::{error, warn};

use crate::dex::annotations::{AnnotationSetItem, AnnotationSetRefList, Visibility};
use crate::dex::dex_file::{ClassDefItem, DexFile};
use crate::dex::error::DexError;
use crate::dex::{read_u1, read_uleb128};
use crate::runtime::decode::{read_signed_int, read_signed_long, read_unsigned_int, read_unsigned_long, skip_annotation_value, decode_raw_value, RawDecode};
use crate::runtime::linker::{AnnotationMember, ClassData, Linker};
use crate::runtime::value::{AnnotationValue, JValue, RawValue, ResultStyle, ValueTag};

/* Well-known annotation descriptors */
pub const ANNOTATION_DEFAULT: &str = "Ldalvik/annotation/AnnotationDefault;";
pub const ENCLOSING_CLASS: &str = "Ldalvik/annotation/EnclosingClass;";
pub const ENCLOSING_METHOD: &str = "Ldalvik/annotation/EnclosingMethod;";
pub const INNER_CLASS: &str = "Ldalvik/annotation/InnerClass;";
pub const MEMBER_CLASSES: &str = "Ldalvik/annotation/MemberClasses;";
pub const METHOD_PARAMETERS: &str = "Ldalvik/annotation/MethodParameters;";
pub const NEST_MEMBERS: &str = "Ldalvik/annotation/NestMembers;";
pub const PERMITTED_SUBCLASSES: &str = "Ldalvik/annotation/PermittedSubclasses;";
pub const SIGNATURE: &str = "Ldalvik/annotation/Signature;";
pub const SOURCE_DEBUG_EXTENSION: &str = "Ldalvik/annotation/SourceDebugExtension;";
pub const THROWS: &str = "Ldalvik/annotation/Throws;";
pub const FAST_NATIVE: &str = "Ldalvik/annotation/optimization/FastNative;";
pub const CRITICAL_NATIVE: &str = "Ldalvik/annotation/optimization/CriticalNative;";
pub const NEVER_COMPILE: &str = "Ldalvik/annotation/optimization/NeverCompile;";
pub const NEVER_INLINE: &str = "Ldalvik/annotation/optimization/NeverInline;";
pub const REACHABILITY_SENSITIVE: &str = "Ldalvik/annotation/optimization/ReachabilitySensitive;";
pub const DEAD_REFERENCE_SAFE: &str = "Ldalvik/annotation/optimization/DeadReferenceSafe;";

bitflags! {
    /// Extra access-flag bits granted to native methods by build-visibility
    /// optimization annotations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NativeMethodFlags: u32 {
        const FAST_NATIVE = 0x0008_0000;
        const CRITICAL_NATIVE = 0x0020_0000;
    }
}

/// Highest target SDK level for which runtime-visibility lookups also accept
/// build-visibility annotations.
pub const VISIBILITY_COMPAT_SDK_MAX: u32 = 23;

/// Visibility matching rules for single-annotation lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityPolicy {
    /// Target SDK level of the querying app, if one is configured.
    pub target_sdk: Option<u32>,
}

impl VisibilityPolicy {
    pub fn compatible(&self, actual: Visibility, expected: Visibility) -> bool {
        if actual == expected {
            return true;
        }
        // Apps targeting level 23 or older historically saw build-retention
        // annotations through runtime lookups, and some depend on it.
        expected == Visibility::Runtime
            && actual == Visibility::Build
            && matches!(self.target_sdk, Some(sdk) if sdk <= VISIBILITY_COMPAT_SDK_MAX)
    }
}

/* ---------- walkers ---------- */

fn directory<'d>(class_def: Option<&'d ClassDefItem>) -> Option<&'d crate::dex::annotations::AnnotationsDirectoryItem> {
    class_def.and_then(|cd| cd.annotations.as_ref())
}

/// The class's own annotation set, `None` if the class has no directory or
/// no class annotations. Proxy classes have no `class_def` at all, so every
/// lookup against them lands here with `None`.
pub fn find_annotation_set_for_class(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
) -> Result<Option<AnnotationSetItem>, DexError> {
    let dir = match directory(class_def) {
        Some(d) => d,
        None => return Ok(None),
    };
    if dir.class_annotations_off == 0 {
        return Ok(None);
    }
    Ok(Some(dex.annotation_set_at(dir.class_annotations_off)?))
}

pub fn find_annotation_set_for_field(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    field_idx: u32,
) -> Result<Option<AnnotationSetItem>, DexError> {
    let off = match directory(class_def).and_then(|d| d.field_annotations_off(field_idx)) {
        Some(off) => off,
        None => return Ok(None),
    };
    Ok(Some(dex.annotation_set_at(off)?))
}

pub fn find_annotation_set_for_method(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    method_idx: u32,
) -> Result<Option<AnnotationSetItem>, DexError> {
    let off = match directory(class_def).and_then(|d| d.method_annotations_off(method_idx)) {
        Some(off) => off,
        None => return Ok(None),
    };
    Ok(Some(dex.annotation_set_at(off)?))
}

/// The per-parameter annotation set list for a method.
pub fn find_parameter_annotations(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    method_idx: u32,
) -> Result<Option<AnnotationSetRefList>, DexError> {
    let off = match directory(class_def).and_then(|d| d.parameter_annotations_off(method_idx)) {
        Some(off) if off != 0 => off,
        _ => return Ok(None),
    };
    let mut ix = off as usize;
    Ok(Some(AnnotationSetRefList::read(&dex.data, &mut ix)?))
}

/// Find the first item in a set whose type descriptor equals `descriptor`
/// and whose visibility is compatible with `visibility` under `policy`.
/// Returns the offset of the item's encoded_annotation payload (just past
/// the visibility byte). Entries are scanned in file order.
pub fn search_annotation_set(
    dex: &DexFile,
    set: &AnnotationSetItem,
    descriptor: &str,
    visibility: Visibility,
    policy: VisibilityPolicy,
) -> Result<Option<usize>, DexError> {
    for &entry in &set.entries {
        if entry == 0 {
            continue;
        }
        let mut ix = entry as usize;
        let raw = read_u1(&dex.data, &mut ix)?;
        let actual = match Visibility::from_raw(raw) {
            Some(v) => v,
            None => corrupt!("Unknown annotation visibility 0x{:02x}", raw),
        };
        if !policy.compatible(actual, visibility) {
            continue;
        }
        let mut peek = ix;
        let type_idx = read_uleb128(&dex.data, &mut peek)?;
        if dex.type_desc(type_idx as usize)? == descriptor {
            return Ok(Some(ix));
        }
    }
    Ok(None)
}

/// Scan the element list of the encoded_annotation at `*ix` for the element
/// named `name`. On a hit, `true` is returned with the cursor on the
/// element's value. On a miss the whole annotation has been consumed.
pub fn search_encoded_annotation(
    dex: &DexFile,
    ix: &mut usize,
    name: &str,
) -> Result<bool, DexError> {
    let _type_idx = read_uleb128(&dex.data, ix)?;
    let size = read_uleb128(&dex.data, ix)?;
    for _ in 0..size {
        let name_idx = read_uleb128(&dex.data, ix)?;
        if dex.get_string(name_idx as usize)? == name {
            return Ok(true);
        }
        skip_annotation_value(&dex.data, ix)?;
    }
    Ok(false)
}

/* ---------- materializer ---------- */

enum MemberOutcome<L: Linker + ?Sized> {
    Member(AnnotationMember<L>),
    Skipped,
    Failed,
}

/// Decode one encoded value at `*ix` in the dex data section and materialize
/// it under `style`.
///
/// `Ok(None)` is a recoverable resolution or allocation failure; whether a
/// pending linker failure is live is up to the failing resolution, and the
/// caller decides what to do with it. `Err` is corruption.
///
/// `array_class` must be the exact array class when the value may be an
/// array; without it (or under `AllRaw`) an array value fails.
pub fn process_annotation_value<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    ix: &mut usize,
    array_class: Option<&L::Class>,
    style: ResultStyle,
) -> Result<Option<AnnotationValue<L::Object>>, DexError> {
    let bytes: &[u8] = &data.dex.data;
    let header_byte = read_u1(bytes, ix)?;
    let value_arg = (header_byte >> 5) as u32;
    let raw_tag = header_byte & 0x1f;

    let tag = match ValueTag::from_raw(raw_tag) {
        Some(t) => t,
        None => corrupt!("Bad annotation value tag 0x{:02x}", raw_tag),
    };

    let value = match tag {
        ValueTag::Byte => JValue::Byte(read_signed_int(bytes, ix, value_arg)? as i8),
        ValueTag::Short => JValue::Short(read_signed_int(bytes, ix, value_arg)? as i16),
        ValueTag::Char => JValue::Char(read_unsigned_int(bytes, ix, value_arg, false)? as u16),
        ValueTag::Int => JValue::Int(read_signed_int(bytes, ix, value_arg)?),
        ValueTag::Long => JValue::Long(read_signed_long(bytes, ix, value_arg)?),
        ValueTag::Float => {
            JValue::Float(f32::from_bits(read_unsigned_int(bytes, ix, value_arg, true)?))
        }
        ValueTag::Double => {
            JValue::Double(f64::from_bits(read_unsigned_long(bytes, ix, value_arg, true)?))
        }
        ValueTag::String => {
            let index = read_unsigned_int(bytes, ix, value_arg, false)?;
            if style == ResultStyle::AllRaw {
                JValue::Int(index as i32)
            } else {
                match linker.resolve_string(data, index) {
                    Some(obj) => JValue::Object(Some(obj)),
                    None => return Ok(None),
                }
            }
        }
        ValueTag::Type => {
            let index = read_unsigned_int(bytes, ix, value_arg, false)?;
            if style == ResultStyle::AllRaw {
                JValue::Int(index as i32)
            } else {
                match linker.resolve_type(data, index) {
                    Some(klass) => match linker.class_object(&klass) {
                        Some(obj) => JValue::Object(Some(obj)),
                        None => return Ok(None),
                    },
                    None if style == ResultStyle::AllObjects => {
                        // Reflection carries a placeholder for types that no
                        // longer resolve, rather than failing the whole
                        // annotation.
                        linker.clear_pending_failure();
                        let descriptor = data.dex.type_desc(index as usize)?;
                        match linker.type_not_present(&descriptor) {
                            Some(obj) => JValue::Object(Some(obj)),
                            None => return Ok(None),
                        }
                    }
                    None => return Ok(None),
                }
            }
        }
        ValueTag::Method => {
            let index = read_unsigned_int(bytes, ix, value_arg, false)?;
            if style == ResultStyle::AllRaw {
                JValue::Int(index as i32)
            } else {
                let method = match linker.resolve_method(data, index) {
                    Some(m) => m,
                    None => return Ok(None),
                };
                match linker.method_object(&method) {
                    Some(obj) => JValue::Object(Some(obj)),
                    None => return Ok(None),
                }
            }
        }
        ValueTag::Field => {
            let index = read_unsigned_int(bytes, ix, value_arg, false)?;
            if style == ResultStyle::AllRaw {
                JValue::Int(index as i32)
            } else {
                let field = match linker.resolve_field(data, index) {
                    Some(f) => f,
                    None => return Ok(None),
                };
                match linker.field_object(&field) {
                    Some(obj) => JValue::Object(Some(obj)),
                    None => return Ok(None),
                }
            }
        }
        ValueTag::Enum => {
            let index = read_unsigned_int(bytes, ix, value_arg, false)?;
            if style == ResultStyle::AllRaw {
                JValue::Int(index as i32)
            } else {
                match linker.resolve_enum_constant(data, index) {
                    Some(obj) => JValue::Object(Some(obj)),
                    None => return Ok(None),
                }
            }
        }
        ValueTag::Array => {
            if style == ResultStyle::AllRaw {
                return Ok(None);
            }
            let array_class = match array_class {
                Some(c) => c,
                None => return Ok(None),
            };
            let size = read_uleb128(bytes, ix)?;
            let component = match linker.component_type(array_class) {
                Some(c) => c,
                None => return Ok(None),
            };
            let component_primitive = linker.primitive_kind(&component);
            let array = match linker.alloc_array(&component, size as usize) {
                Some(a) => a,
                None => {
                    error!("Annotation element array allocation failed ({} elements)", size);
                    return Ok(None);
                }
            };
            for i in 0..size {
                let element = match process_annotation_value(
                    data,
                    linker,
                    ix,
                    None,
                    ResultStyle::PrimitivesOrObjects,
                )? {
                    Some(e) => e,
                    None => return Ok(None),
                };
                if let Some(kind) = component_primitive {
                    // A primitive array must be homogeneous; a mismatched
                    // element tag fails rather than coercing.
                    if element.tag.primitive_kind() != Some(kind) {
                        warn!(
                            "Annotation array element {} has tag {:?}, component wants {:?}",
                            i, element.tag, kind
                        );
                        return Ok(None);
                    }
                }
                if !linker.array_store(&array, i as usize, &element.value) {
                    return Ok(None);
                }
            }
            JValue::Object(Some(array))
        }
        ValueTag::Annotation => {
            if style == ResultStyle::AllRaw {
                return Ok(None);
            }
            match process_encoded_annotation(data, linker, ix)? {
                Some(obj) => JValue::Object(Some(obj)),
                None => return Ok(None),
            }
        }
        ValueTag::Null => {
            if style == ResultStyle::AllRaw {
                JValue::Int(0)
            } else {
                JValue::Object(None)
            }
        }
        ValueTag::Boolean => JValue::Boolean(value_arg != 0),
    };

    // Under AllObjects, primitives come back boxed.
    let value = match (style, tag.primitive_kind()) {
        (ResultStyle::AllObjects, Some(kind)) => match linker.box_primitive(kind, &value) {
            Some(obj) => JValue::Object(Some(obj)),
            None => return Ok(None),
        },
        _ => value,
    };

    Ok(Some(AnnotationValue { tag, value }))
}

fn create_annotation_member<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    annotation_class: &L::Class,
    ix: &mut usize,
) -> Result<MemberOutcome<L>, DexError> {
    let name_idx = read_uleb128(&data.dex.data, ix)?;
    let name = data.dex.get_string(name_idx as usize)?;

    let (accessor, return_type) = match linker.find_element_accessor(annotation_class, &name) {
        Some(pair) => pair,
        None => {
            // The interface no longer declares this element; drop the member
            // and keep the annotation.
            skip_annotation_value(&data.dex.data, ix)?;
            return Ok(MemberOutcome::Skipped);
        }
    };

    let array_class = if linker.component_type(&return_type).is_some() {
        Some(return_type.clone())
    } else {
        None
    };
    let value = match process_annotation_value(
        data,
        linker,
        ix,
        array_class.as_ref(),
        ResultStyle::AllObjects,
    )? {
        Some(v) => v,
        None => return Ok(MemberOutcome::Failed),
    };

    Ok(MemberOutcome::Member(AnnotationMember {
        name,
        value: value.value,
        return_type,
        accessor,
    }))
}

/// Materialize the encoded_annotation at `*ix` into an annotation object.
/// `None` means the annotation class or one of its members did not resolve;
/// an unresolvable class leaves the cursor inside the annotation, which the
/// callers treat as abandoning the enclosing traversal.
pub fn process_encoded_annotation<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    ix: &mut usize,
) -> Result<Option<L::Object>, DexError> {
    let type_idx = read_uleb128(&data.dex.data, ix)?;
    let size = read_uleb128(&data.dex.data, ix)?;

    let annotation_class = match linker.resolve_type(data, type_idx) {
        Some(k) => k,
        None => {
            let descriptor = data
                .dex
                .type_desc(type_idx as usize)
                .unwrap_or_else(|_| format!("type@{}", type_idx));
            warn!("Unable to resolve annotation class {}", descriptor);
            linker.clear_pending_failure();
            return Ok(None);
        }
    };

    let mut members = Vec::with_capacity(size as usize);
    for _ in 0..size {
        match create_annotation_member(data, linker, &annotation_class, ix)? {
            MemberOutcome::Member(m) => members.push(m),
            MemberOutcome::Skipped => {}
            MemberOutcome::Failed => return Ok(None),
        }
    }

    Ok(linker.create_annotation(&annotation_class, members))
}

/// Materialize every annotation in a set whose visibility equals
/// `visibility` exactly. The target-SDK compatibility shim applies only to
/// single-annotation lookups, not to whole-set queries.
///
/// Unresolvable entries are dropped unless the linker reports a pending
/// failure, which aborts the whole set with `Ok(None)`.
pub fn process_annotation_set<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    set: &AnnotationSetItem,
    visibility: Visibility,
) -> Result<Option<Vec<L::Object>>, DexError> {
    let mut result = Vec::new();
    for &entry in &set.entries {
        if entry == 0 {
            continue;
        }
        let mut ix = entry as usize;
        let raw = read_u1(&data.dex.data, &mut ix)?;
        let actual = match Visibility::from_raw(raw) {
            Some(v) => v,
            None => corrupt!("Unknown annotation visibility 0x{:02x}", raw),
        };
        if actual != visibility {
            continue;
        }
        match process_encoded_annotation(data, linker, &mut ix)? {
            Some(obj) => result.push(obj),
            None => {
                if linker.pending_failure() {
                    return Ok(None);
                }
            }
        }
    }
    Ok(Some(result))
}

/// Materialize the runtime-visible annotations of each entry of a
/// parameter annotation ref list.
pub fn process_annotation_set_ref_list<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    ref_list: &AnnotationSetRefList,
) -> Result<Option<Vec<Vec<L::Object>>>, DexError> {
    let mut result = Vec::with_capacity(ref_list.list.len());
    for &set_off in &ref_list.list {
        let set = data.dex.annotation_set_at(set_off)?;
        match process_annotation_set(data, linker, &set, Visibility::Runtime)? {
            Some(annotations) => result.push(annotations),
            None => return Ok(None),
        }
    }
    Ok(Some(result))
}

fn get_annotation_object_from_annotation_set<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    set: &AnnotationSetItem,
    visibility: Visibility,
    descriptor: &str,
    policy: VisibilityPolicy,
) -> Result<Option<L::Object>, DexError> {
    let off = match search_annotation_set(data.dex, set, descriptor, visibility, policy)? {
        Some(off) => off,
        None => return Ok(None),
    };
    let mut ix = off;
    process_encoded_annotation(data, linker, &mut ix)
}

/// The `value` element (a `String[]`) of a Signature annotation in a set.
fn get_signature_value<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    set: &AnnotationSetItem,
) -> Result<Option<L::Object>, DexError> {
    let off = match search_annotation_set(
        data.dex,
        set,
        SIGNATURE,
        Visibility::System,
        VisibilityPolicy::default(),
    )? {
        Some(off) => off,
        None => return Ok(None),
    };
    let mut ix = off;
    if !search_encoded_annotation(data.dex, &mut ix, "value")? {
        return Ok(None);
    }
    let string_array = match linker.string_array_class() {
        Some(c) => c,
        None => return Ok(None),
    };
    let value = process_annotation_value(data, linker, &mut ix, Some(&string_array), ResultStyle::AllObjects)?;
    Ok(value.and_then(|v| match v.value {
        JValue::Object(obj) => obj,
        _ => None,
    }))
}

/* ---------- field queries ---------- */

pub fn get_annotation_for_field<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    field_idx: u32,
    descriptor: &str,
    policy: VisibilityPolicy,
) -> Result<Option<L::Object>, DexError> {
    let set = match find_annotation_set_for_field(data.dex, data.class_def(), field_idx)? {
        Some(s) => s,
        None => return Ok(None),
    };
    get_annotation_object_from_annotation_set(data, linker, &set, Visibility::Runtime, descriptor, policy)
}

pub fn get_annotations_for_field<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    field_idx: u32,
) -> Result<Option<Vec<L::Object>>, DexError> {
    let set = match find_annotation_set_for_field(data.dex, data.class_def(), field_idx)? {
        Some(s) => s,
        None => return Ok(Some(vec![])),
    };
    process_annotation_set(data, linker, &set, Visibility::Runtime)
}

pub fn get_signature_annotation_for_field<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    field_idx: u32,
) -> Result<Option<L::Object>, DexError> {
    let set = match find_annotation_set_for_field(data.dex, data.class_def(), field_idx)? {
        Some(s) => s,
        None => return Ok(None),
    };
    get_signature_value(data, linker, &set)
}

pub fn is_field_annotation_present(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    field_idx: u32,
    descriptor: &str,
    visibility: Visibility,
    policy: VisibilityPolicy,
) -> Result<bool, DexError> {
    let set = match find_annotation_set_for_field(dex, class_def, field_idx)? {
        Some(s) => s,
        None => return Ok(false),
    };
    Ok(search_annotation_set(dex, &set, descriptor, visibility, policy)?.is_some())
}

/* ---------- method queries ---------- */

pub fn get_annotation_for_method<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    method_idx: u32,
    descriptor: &str,
    policy: VisibilityPolicy,
) -> Result<Option<L::Object>, DexError> {
    let set = match find_annotation_set_for_method(data.dex, data.class_def(), method_idx)? {
        Some(s) => s,
        None => return Ok(None),
    };
    get_annotation_object_from_annotation_set(data, linker, &set, Visibility::Runtime, descriptor, policy)
}

pub fn get_annotations_for_method<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    method_idx: u32,
) -> Result<Option<Vec<L::Object>>, DexError> {
    let set = match find_annotation_set_for_method(data.dex, data.class_def(), method_idx)? {
        Some(s) => s,
        None => return Ok(Some(vec![])),
    };
    process_annotation_set(data, linker, &set, Visibility::Runtime)
}

/// The `Class[]` of a Throws annotation, i.e. the method's declared checked
/// exceptions.
pub fn get_exception_types_for_method<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    method_idx: u32,
) -> Result<Option<L::Object>, DexError> {
    let set = match find_annotation_set_for_method(data.dex, data.class_def(), method_idx)? {
        Some(s) => s,
        None => return Ok(None),
    };
    get_array_value_from_set(data, linker, &set, THROWS)
}

pub fn get_signature_annotation_for_method<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    method_idx: u32,
) -> Result<Option<L::Object>, DexError> {
    let set = match find_annotation_set_for_method(data.dex, data.class_def(), method_idx)? {
        Some(s) => s,
        None => return Ok(None),
    };
    get_signature_value(data, linker, &set)
}

pub fn is_method_annotation_present(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    method_idx: u32,
    descriptor: &str,
    visibility: Visibility,
    policy: VisibilityPolicy,
) -> Result<bool, DexError> {
    let set = match find_annotation_set_for_method(dex, class_def, method_idx)? {
        Some(s) => s,
        None => return Ok(false),
    };
    Ok(search_annotation_set(dex, &set, descriptor, visibility, policy)?.is_some())
}

/// Default value of an annotation interface element, from the interface
/// class's AnnotationDefault system annotation.
pub fn get_annotation_default_value<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    method: &L::Method,
) -> Result<Option<AnnotationValue<L::Object>>, DexError> {
    let set = match find_annotation_set_for_class(data.dex, data.class_def())? {
        Some(s) => s,
        None => return Ok(None),
    };
    let off = match search_annotation_set(
        data.dex,
        &set,
        ANNOTATION_DEFAULT,
        Visibility::System,
        VisibilityPolicy::default(),
    )? {
        Some(off) => off,
        None => return Ok(None),
    };
    let mut ix = off;
    if !search_encoded_annotation(data.dex, &mut ix, "value")? {
        return Ok(None);
    }
    // The defaults live in a nested annotation keyed by element name.
    let header_byte = read_u1(&data.dex.data, &mut ix)?;
    if header_byte & 0x1f != ValueTag::Annotation as u8 {
        return Ok(None);
    }
    let name = linker.method_name(method);
    if !search_encoded_annotation(data.dex, &mut ix, &name)? {
        return Ok(None);
    }
    let return_type = match linker.method_return_type(method) {
        Some(t) => t,
        None => return Ok(None),
    };
    let array_class = if linker.component_type(&return_type).is_some() {
        Some(return_type)
    } else {
        None
    };
    process_annotation_value(data, linker, &mut ix, array_class.as_ref(), ResultStyle::AllObjects)
}

pub fn get_parameter_annotations<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    method_idx: u32,
) -> Result<Option<Vec<Vec<L::Object>>>, DexError> {
    let ref_list = match find_parameter_annotations(data.dex, data.class_def(), method_idx)? {
        Some(l) => l,
        None => return Ok(None),
    };
    process_annotation_set_ref_list(data, linker, &ref_list)
}

pub fn get_number_of_annotated_parameters(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    method_idx: u32,
) -> Result<u32, DexError> {
    match find_parameter_annotations(dex, class_def, method_idx)? {
        Some(l) => Ok(l.list.len() as u32),
        None => Ok(0),
    }
}

pub fn get_annotation_for_method_parameter<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    method_idx: u32,
    parameter_idx: u32,
    descriptor: &str,
    policy: VisibilityPolicy,
) -> Result<Option<L::Object>, DexError> {
    let ref_list = match find_parameter_annotations(data.dex, data.class_def(), method_idx)? {
        Some(l) => l,
        None => return Ok(None),
    };
    let set_off = match ref_list.list.get(parameter_idx as usize) {
        Some(&off) => off,
        None => return Ok(None),
    };
    let set = data.dex.annotation_set_at(set_off)?;
    get_annotation_object_from_annotation_set(data, linker, &set, Visibility::Runtime, descriptor, policy)
}

/// Parameter names and access flags from a MethodParameters annotation:
/// (`String[]`, `int[]`). Both elements must be present.
pub fn get_parameters_metadata<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    method_idx: u32,
) -> Result<Option<(L::Object, L::Object)>, DexError> {
    let set = match find_annotation_set_for_method(data.dex, data.class_def(), method_idx)? {
        Some(s) => s,
        None => return Ok(None),
    };
    let off = match search_annotation_set(
        data.dex,
        &set,
        METHOD_PARAMETERS,
        Visibility::System,
        VisibilityPolicy::default(),
    )? {
        Some(off) => off,
        None => return Ok(None),
    };

    let mut names_ix = off;
    if !search_encoded_annotation(data.dex, &mut names_ix, "names")? {
        return Ok(None);
    }
    let string_array = match linker.string_array_class() {
        Some(c) => c,
        None => return Ok(None),
    };
    let names = match process_annotation_value(data, linker, &mut names_ix, Some(&string_array), ResultStyle::AllObjects)? {
        Some(AnnotationValue { value: JValue::Object(Some(obj)), .. }) => obj,
        _ => return Ok(None),
    };

    let mut flags_ix = off;
    if !search_encoded_annotation(data.dex, &mut flags_ix, "accessFlags")? {
        return Ok(None);
    }
    let int_array = match linker.int_array_class() {
        Some(c) => c,
        None => return Ok(None),
    };
    let access_flags = match process_annotation_value(data, linker, &mut flags_ix, Some(&int_array), ResultStyle::AllObjects)? {
        Some(AnnotationValue { value: JValue::Object(Some(obj)), .. }) => obj,
        _ => return Ok(None),
    };

    Ok(Some((names, access_flags)))
}

/* ---------- class queries ---------- */

pub fn get_annotation_for_class<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    descriptor: &str,
    policy: VisibilityPolicy,
) -> Result<Option<L::Object>, DexError> {
    let set = match find_annotation_set_for_class(data.dex, data.class_def())? {
        Some(s) => s,
        None => return Ok(None),
    };
    get_annotation_object_from_annotation_set(data, linker, &set, Visibility::Runtime, descriptor, policy)
}

pub fn get_annotations_for_class<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
) -> Result<Option<Vec<L::Object>>, DexError> {
    let set = match find_annotation_set_for_class(data.dex, data.class_def())? {
        Some(s) => s,
        None => return Ok(Some(vec![])),
    };
    process_annotation_set(data, linker, &set, Visibility::Runtime)
}

pub fn is_class_annotation_present(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    descriptor: &str,
    visibility: Visibility,
    policy: VisibilityPolicy,
) -> Result<bool, DexError> {
    let set = match find_annotation_set_for_class(dex, class_def)? {
        Some(s) => s,
        None => return Ok(false),
    };
    Ok(search_annotation_set(dex, &set, descriptor, visibility, policy)?.is_some())
}

/// The `name` element of an InnerClass annotation. Outer `None`: no such
/// annotation or a malformed element. Inner `None`: the class is anonymous
/// (name encoded as Null).
pub fn get_inner_class<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
) -> Result<Option<Option<L::Object>>, DexError> {
    let mut ix = match find_class_system_annotation_element(data.dex, data.class_def(), INNER_CLASS, "name")? {
        Some(ix) => ix,
        None => return Ok(None),
    };
    let value = match process_annotation_value(data, linker, &mut ix, None, ResultStyle::AllObjects)? {
        Some(v) => v,
        None => return Ok(None),
    };
    match value.tag {
        ValueTag::Null => Ok(Some(None)),
        ValueTag::String => match value.value {
            JValue::Object(obj) => Ok(Some(obj)),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// The `accessFlags` element of an InnerClass annotation, read raw with no
/// linker involvement.
pub fn get_inner_class_flags(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
) -> Result<Option<u32>, DexError> {
    let mut ix = match find_class_system_annotation_element(dex, class_def, INNER_CLASS, "accessFlags")? {
        Some(ix) => ix,
        None => return Ok(None),
    };
    match decode_raw_value(&dex.data, &mut ix)? {
        RawDecode::Consumed(ValueTag::Int, RawValue::Int(flags)) => Ok(Some(flags as u32)),
        _ => Ok(None),
    }
}

/// The SourceDebugExtension payload, resolved against the container's own
/// string table without a linker.
pub fn get_source_debug_extension(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
) -> Result<Option<String>, DexError> {
    let mut ix = match find_class_system_annotation_element(dex, class_def, SOURCE_DEBUG_EXTENSION, "value")? {
        Some(ix) => ix,
        None => return Ok(None),
    };
    match decode_raw_value(&dex.data, &mut ix)? {
        RawDecode::Consumed(ValueTag::String, RawValue::Index(string_idx)) => {
            Ok(Some(dex.get_string(string_idx as usize)?))
        }
        _ => Ok(None),
    }
}

/// The method object of an EnclosingMethod annotation.
pub fn get_enclosing_method<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
) -> Result<Option<L::Object>, DexError> {
    let mut ix = match find_class_system_annotation_element(data.dex, data.class_def(), ENCLOSING_METHOD, "value")? {
        Some(ix) => ix,
        None => return Ok(None),
    };
    let value = match process_annotation_value(data, linker, &mut ix, None, ResultStyle::AllObjects)? {
        Some(v) => v,
        None => return Ok(None),
    };
    match (value.tag, value.value) {
        (ValueTag::Method, JValue::Object(obj)) => Ok(obj),
        _ => Ok(None),
    }
}

pub fn get_declared_classes<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
) -> Result<Option<L::Object>, DexError> {
    get_class_array_annotation_value(data, linker, MEMBER_CLASSES)
}

pub fn get_nest_members<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
) -> Result<Option<L::Object>, DexError> {
    get_class_array_annotation_value(data, linker, NEST_MEMBERS)
}

pub fn get_permitted_subclasses<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
) -> Result<Option<L::Object>, DexError> {
    get_class_array_annotation_value(data, linker, PERMITTED_SUBCLASSES)
}

/// The cursor position of a named element in a class-level system
/// annotation, or `None` when the annotation or element is absent.
fn find_class_system_annotation_element(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    annotation_descriptor: &str,
    element_name: &str,
) -> Result<Option<usize>, DexError> {
    let set = match find_annotation_set_for_class(dex, class_def)? {
        Some(s) => s,
        None => return Ok(None),
    };
    let off = match search_annotation_set(
        dex,
        &set,
        annotation_descriptor,
        Visibility::System,
        VisibilityPolicy::default(),
    )? {
        Some(off) => off,
        None => return Ok(None),
    };
    let mut ix = off;
    if !search_encoded_annotation(dex, &mut ix, element_name)? {
        return Ok(None);
    }
    Ok(Some(ix))
}

/// The `value` element of a class-level system annotation, materialized as a
/// `Class[]`.
fn get_class_array_annotation_value<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    annotation_descriptor: &str,
) -> Result<Option<L::Object>, DexError> {
    let mut ix = match find_class_system_annotation_element(
        data.dex,
        data.class_def(),
        annotation_descriptor,
        "value",
    )? {
        Some(ix) => ix,
        None => return Ok(None),
    };
    let class_array = match linker.class_array_class() {
        Some(c) => c,
        None => return Ok(None),
    };
    let value = process_annotation_value(data, linker, &mut ix, Some(&class_array), ResultStyle::AllObjects)?;
    Ok(value.and_then(|v| match v.value {
        JValue::Object(obj) => obj,
        _ => None,
    }))
}

fn get_array_value_from_set<L: Linker>(
    data: &ClassData<'_, L>,
    linker: &mut L,
    set: &AnnotationSetItem,
    annotation_descriptor: &str,
) -> Result<Option<L::Object>, DexError> {
    let off = match search_annotation_set(
        data.dex,
        set,
        annotation_descriptor,
        Visibility::System,
        VisibilityPolicy::default(),
    )? {
        Some(off) => off,
        None => return Ok(None),
    };
    let mut ix = off;
    if !search_encoded_annotation(data.dex, &mut ix, "value")? {
        return Ok(None);
    }
    let class_array = match linker.class_array_class() {
        Some(c) => c,
        None => return Ok(None),
    };
    let value = process_annotation_value(data, linker, &mut ix, Some(&class_array), ResultStyle::AllObjects)?;
    Ok(value.and_then(|v| match v.value {
        JValue::Object(obj) => obj,
        _ => None,
    }))
}

/* ---------- compiler-facing, linker-free queries ---------- */

/// Access-flag bits implied by FastNative/CriticalNative annotations, which
/// carry build visibility only.
pub fn get_native_method_annotation_access_flags(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    method_idx: u32,
) -> Result<NativeMethodFlags, DexError> {
    let mut flags = NativeMethodFlags::empty();
    let build = Visibility::Build;
    let policy = VisibilityPolicy::default();
    if is_method_annotation_present(dex, class_def, method_idx, FAST_NATIVE, build, policy)? {
        flags |= NativeMethodFlags::FAST_NATIVE;
    }
    if is_method_annotation_present(dex, class_def, method_idx, CRITICAL_NATIVE, build, policy)? {
        flags |= NativeMethodFlags::CRITICAL_NATIVE;
    }
    Ok(flags)
}

pub fn method_is_never_compile(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    method_idx: u32,
) -> Result<bool, DexError> {
    is_method_annotation_present(dex, class_def, method_idx, NEVER_COMPILE, Visibility::Build, VisibilityPolicy::default())
}

pub fn method_is_never_inline(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    method_idx: u32,
) -> Result<bool, DexError> {
    is_method_annotation_present(dex, class_def, method_idx, NEVER_INLINE, Visibility::Build, VisibilityPolicy::default())
}

pub fn method_is_reachability_sensitive(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    method_idx: u32,
) -> Result<bool, DexError> {
    is_method_annotation_present(dex, class_def, method_idx, REACHABILITY_SENSITIVE, Visibility::Runtime, VisibilityPolicy::default())
}

pub fn field_is_reachability_sensitive(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
    field_idx: u32,
) -> Result<bool, DexError> {
    is_field_annotation_present(dex, class_def, field_idx, REACHABILITY_SENSITIVE, Visibility::Runtime, VisibilityPolicy::default())
}

pub fn has_dead_reference_safe_annotation(
    dex: &DexFile,
    class_def: Option<&ClassDefItem>,
) -> Result<bool, DexError> {
    is_class_annotation_present(dex, class_def, DEAD_REFERENCE_SAFE, Visibility::Runtime, VisibilityPolicy::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_exact_match() {
        let policy = VisibilityPolicy::default();
        assert!(policy.compatible(Visibility::Runtime, Visibility::Runtime));
        assert!(policy.compatible(Visibility::System, Visibility::System));
        assert!(!policy.compatible(Visibility::Build, Visibility::Runtime));
        assert!(!policy.compatible(Visibility::Runtime, Visibility::Build));
    }

    #[test]
    fn test_visibility_legacy_sdk_shim() {
        let legacy = VisibilityPolicy { target_sdk: Some(23) };
        assert!(legacy.compatible(Visibility::Build, Visibility::Runtime));
        // Only the Build-for-Runtime direction is widened.
        assert!(!legacy.compatible(Visibility::System, Visibility::Runtime));
        assert!(!legacy.compatible(Visibility::Build, Visibility::System));

        let modern = VisibilityPolicy { target_sdk: Some(24) };
        assert!(!modern.compatible(Visibility::Build, Visibility::Runtime));
    }

    #[test]
    fn test_native_method_flag_bits() {
        assert_eq!(NativeMethodFlags::FAST_NATIVE.bits(), 0x0008_0000);
        assert_eq!(NativeMethodFlags::CRITICAL_NATIVE.bits(), 0x0020_0000);
        let both = NativeMethodFlags::FAST_NATIVE | NativeMethodFlags::CRITICAL_NATIVE;
        assert_eq!(both.bits(), 0x0028_0000);
    }
}
