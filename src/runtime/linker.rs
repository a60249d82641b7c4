//! The class-linkage collaborator boundary.
//!
//! The annotation reader never owns a heap or a class table. Everything that
//! resolves an index to a live entity, or allocates an object, goes through
//! [`Linker`]. The associated types are opaque handles; the reader only
//! clones and compares them.

use std::fmt::Debug;

use crate::dex::dex_file::{ClassDefItem, DexFile};
use crate::runtime::value::{JValue, PrimitiveKind};

/// Resolution context for one annotated program element: the dex file the
/// annotation lives in, the declaring class, and the class's `class_def`
/// entry. Proxy and other synthetic classes have no `class_def`, so every
/// annotation query against them comes back empty.
pub struct ClassData<'d, L: Linker + ?Sized> {
    pub dex: &'d DexFile,
    pub class: L::Class,
    class_def: Option<usize>,
}

impl<'d, L: Linker + ?Sized> ClassData<'d, L> {
    pub fn new(dex: &'d DexFile, class: L::Class, class_def: Option<usize>) -> ClassData<'d, L> {
        ClassData { dex, class, class_def }
    }

    /// Context for a class defined in `dex` by type index, if it is defined
    /// there at all.
    pub fn for_type(dex: &'d DexFile, class: L::Class, type_idx: u32) -> ClassData<'d, L> {
        let class_def = dex.class_def_index(type_idx as usize);
        ClassData { dex, class, class_def }
    }

    pub fn class_def(&self) -> Option<&'d ClassDefItem> {
        self.class_def.and_then(|i| self.dex.class_defs.get(i))
    }
}

/// One materialized annotation member, ready for [`Linker::create_annotation`]:
/// the element name, its value, and the interface accessor it corresponds to.
pub struct AnnotationMember<L: Linker + ?Sized> {
    pub name: String,
    pub value: JValue<L::Object>,
    pub return_type: L::Class,
    pub accessor: L::Method,
}

/// External resolution and allocation services.
///
/// Resolution methods return `None` on failure and may record a pending
/// failure; the reader observes or clears it through
/// [`pending_failure`]/[`clear_pending_failure`] at exactly the points where
/// a failure is recoverable.
///
/// [`pending_failure`]: Linker::pending_failure
/// [`clear_pending_failure`]: Linker::clear_pending_failure
pub trait Linker {
    type Object: Clone + Debug;
    type Class: Clone + Debug + PartialEq;
    type Method: Clone + Debug;
    type Field: Clone + Debug;

    fn resolve_type(&mut self, data: &ClassData<'_, Self>, type_idx: u32) -> Option<Self::Class>;
    fn resolve_string(&mut self, data: &ClassData<'_, Self>, string_idx: u32) -> Option<Self::Object>;
    fn resolve_method(&mut self, data: &ClassData<'_, Self>, method_idx: u32) -> Option<Self::Method>;
    fn resolve_field(&mut self, data: &ClassData<'_, Self>, field_idx: u32) -> Option<Self::Field>;
    /// Resolve an enum constant (a static field) to its value object.
    fn resolve_enum_constant(&mut self, data: &ClassData<'_, Self>, field_idx: u32) -> Option<Self::Object>;

    /// The reflection object for a class (`java.lang.Class` in the original
    /// model).
    fn class_object(&mut self, class: &Self::Class) -> Option<Self::Object>;
    /// The reflection object for a method or constructor.
    fn method_object(&mut self, method: &Self::Method) -> Option<Self::Object>;
    /// The reflection object for a field.
    fn field_object(&mut self, field: &Self::Field) -> Option<Self::Object>;

    /// Box a primitive value. `value` is never `JValue::Object`.
    fn box_primitive(&mut self, kind: PrimitiveKind, value: &JValue<Self::Object>) -> Option<Self::Object>;
    /// Placeholder object carried in place of a type that no longer resolves
    /// (the `TypeNotPresent` proxy of the original model).
    fn type_not_present(&mut self, descriptor: &str) -> Option<Self::Object>;

    fn primitive_kind(&self, class: &Self::Class) -> Option<PrimitiveKind>;
    /// Component type of an array class, `None` for non-arrays.
    fn component_type(&self, class: &Self::Class) -> Option<Self::Class>;

    fn alloc_array(&mut self, component: &Self::Class, len: usize) -> Option<Self::Object>;
    /// Store one element; `false` reports an incompatible store.
    fn array_store(&mut self, array: &Self::Object, index: usize, value: &JValue<Self::Object>) -> bool;

    /// Look up the element accessor declared by an annotation interface,
    /// returning the method and its return type. `None` means the interface
    /// does not declare the element (the member is then dropped, not an
    /// error).
    fn find_element_accessor(
        &mut self,
        annotation_class: &Self::Class,
        name: &str,
    ) -> Option<(Self::Method, Self::Class)>;
    /// Construct the annotation instance from its members.
    fn create_annotation(
        &mut self,
        annotation_class: &Self::Class,
        members: Vec<AnnotationMember<Self>>,
    ) -> Option<Self::Object>;

    fn method_name(&self, method: &Self::Method) -> String;
    fn method_return_type(&self, method: &Self::Method) -> Option<Self::Class>;

    /// `String[]`, for Signature and MethodParameters names.
    fn string_array_class(&mut self) -> Option<Self::Class>;
    /// `Class[]`, for Throws, MemberClasses, NestMembers, PermittedSubclasses.
    fn class_array_class(&mut self) -> Option<Self::Class>;
    /// `int[]`, for MethodParameters access flags.
    fn int_array_class(&mut self) -> Option<Self::Class>;

    fn pending_failure(&self) -> bool;
    fn clear_pending_failure(&mut self);
}
