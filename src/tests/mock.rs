//! In-memory dex fixtures and a mock linker for cross-module tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::dex::annotations::{AnnotationItem, AnnotationSetItem, AnnotationSetRefList, AnnotationsDirectoryItem, Visibility};
use crate::dex::dex_file::{ClassDefItem, DexFile, DexString, Header, ACC_PUBLIC, NO_INDEX};
use crate::dex::encoded_values::EncodedAnnotation;
use crate::runtime::linker::{AnnotationMember, ClassData, Linker};
use crate::runtime::value::{JValue, PrimitiveKind};

pub const TEST_CLASS: &str = "Lcom/test/Main;";

/// Builds a `DexFile` by hand: string/type tables as vectors, annotation
/// structures serialized into the data section at real offsets. Offset 0 is
/// padded out so it keeps its "absent" meaning.
pub struct DexBuilder {
    strings: Vec<String>,
    types: Vec<usize>,
    data: Vec<u8>,
}

impl DexBuilder {
    pub fn new() -> DexBuilder {
        DexBuilder {
            strings: vec![],
            types: vec![],
            data: vec![0u8; 0x70],
        }
    }

    /// Intern a string, returning its string id.
    pub fn string(&mut self, s: &str) -> u32 {
        if let Some(pos) = self.strings.iter().position(|x| x == s) {
            return pos as u32;
        }
        self.strings.push(s.to_string());
        (self.strings.len() - 1) as u32
    }

    /// Intern a type descriptor, returning its type id.
    pub fn type_idx(&mut self, descriptor: &str) -> u32 {
        let string_id = self.string(descriptor) as usize;
        if let Some(pos) = self.types.iter().position(|&t| t == string_id) {
            return pos as u32;
        }
        self.types.push(string_id);
        (self.types.len() - 1) as u32
    }

    /// Serialize an annotation_item into the data section.
    pub fn push_annotation(&mut self, visibility: Visibility, annotation: EncodedAnnotation) -> u32 {
        let off = self.data.len() as u32;
        let item = AnnotationItem { visibility, annotation };
        item.write(&mut self.data);
        off
    }

    /// Serialize an annotation_set_item referencing previously pushed items.
    pub fn push_set(&mut self, item_offsets: &[u32]) -> u32 {
        let off = self.data.len() as u32;
        let set = AnnotationSetItem { entries: item_offsets.to_vec() };
        set.write(&mut self.data);
        off
    }

    /// Serialize an annotation_set_ref_list referencing previously pushed sets.
    pub fn push_ref_list(&mut self, set_offsets: &[u32]) -> u32 {
        let off = self.data.len() as u32;
        let list = AnnotationSetRefList { list: set_offsets.to_vec() };
        list.write(&mut self.data);
        off
    }

    /// Append raw bytes, returning their offset.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> u32 {
        let off = self.data.len() as u32;
        self.data.extend_from_slice(bytes);
        off
    }

    /// Finish into a `DexFile` with a single class def for [`TEST_CLASS`]
    /// carrying the given annotations directory.
    pub fn build(mut self, directory: Option<AnnotationsDirectoryItem>) -> DexFile {
        let class_type = self.type_idx(TEST_CLASS) as usize;
        let class_def = ClassDefItem {
            class_idx: class_type,
            access_flags: ACC_PUBLIC,
            superclass_idx: NO_INDEX,
            interfaces: None,
            source_file_idx: NO_INDEX,
            annotations: directory,
            class_data: None,
            static_values: None,
        };
        DexFile {
            header: Header::default(),
            strings: self.strings.iter().map(|s| DexString::from_string(s)).collect(),
            types: self.types,
            prototypes: vec![],
            fields: vec![],
            methods: vec![],
            class_defs: vec![class_def],
            data: self.data,
        }
    }
}

/// A directory with only class annotations.
pub fn class_directory(class_annotations_off: u32) -> AnnotationsDirectoryItem {
    AnnotationsDirectoryItem {
        class_annotations_off,
        field_annotations: vec![],
        method_annotations: vec![],
        parameter_annotations: vec![],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockClass {
    pub descriptor: String,
    pub primitive: Option<PrimitiveKind>,
    pub component: Option<Box<MockClass>>,
}

impl MockClass {
    pub fn object(descriptor: &str) -> MockClass {
        MockClass { descriptor: descriptor.to_string(), primitive: None, component: None }
    }

    pub fn primitive(kind: PrimitiveKind) -> MockClass {
        let descriptor = match kind {
            PrimitiveKind::Boolean => "Z",
            PrimitiveKind::Byte => "B",
            PrimitiveKind::Short => "S",
            PrimitiveKind::Char => "C",
            PrimitiveKind::Int => "I",
            PrimitiveKind::Long => "J",
            PrimitiveKind::Float => "F",
            PrimitiveKind::Double => "D",
        };
        MockClass { descriptor: descriptor.to_string(), primitive: Some(kind), component: None }
    }

    pub fn array(component: MockClass) -> MockClass {
        MockClass {
            descriptor: format!("[{}", component.descriptor),
            primitive: None,
            component: Some(Box::new(component)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockMethod {
    pub name: String,
    pub return_type: MockClass,
}

#[derive(Debug, Clone)]
pub struct MockField {
    pub name: String,
}

pub type Obj = Rc<MockObject>;

#[derive(Debug)]
pub enum MockObject {
    Str(String),
    Class(MockClass),
    TypeNotPresent(String),
    Method(String),
    Field(String),
    EnumConst(String),
    Boxed(PrimitiveKind, JValue<Obj>),
    Array(MockClass, RefCell<Vec<JValue<Obj>>>),
    Annotation { class: MockClass, members: Vec<(String, JValue<Obj>)> },
}

impl MockObject {
    pub fn as_str(&self) -> &str {
        match self {
            MockObject::Str(s) => s,
            other => panic!("expected string object, got {:?}", other),
        }
    }

    pub fn annotation_members(&self) -> &[(String, JValue<Obj>)] {
        match self {
            MockObject::Annotation { members, .. } => members,
            other => panic!("expected annotation object, got {:?}", other),
        }
    }

    pub fn annotation_descriptor(&self) -> &str {
        match self {
            MockObject::Annotation { class, .. } => &class.descriptor,
            other => panic!("expected annotation object, got {:?}", other),
        }
    }

    pub fn array_elements(&self) -> Vec<JValue<Obj>> {
        match self {
            MockObject::Array(_, elements) => elements.borrow().clone(),
            other => panic!("expected array object, got {:?}", other),
        }
    }

    pub fn boxed_int(&self) -> i32 {
        match self {
            MockObject::Boxed(PrimitiveKind::Int, JValue::Int(v)) => *v,
            other => panic!("expected boxed int, got {:?}", other),
        }
    }
}

/// A linker over a flat namespace of descriptors. Classes, annotation
/// element accessors, and index-keyed methods/fields/enums are registered
/// up front; anything unregistered fails to resolve and raises the pending
/// failure flag.
#[derive(Default)]
pub struct MockLinker {
    classes: HashMap<String, MockClass>,
    element_types: HashMap<(String, String), MockClass>,
    methods: HashMap<u32, MockMethod>,
    fields: HashMap<u32, MockField>,
    enums: HashMap<u32, String>,
    pending: bool,
}

impl MockLinker {
    pub fn new() -> MockLinker {
        MockLinker::default()
    }

    pub fn define_class(&mut self, descriptor: &str) -> MockClass {
        let class = MockClass::object(descriptor);
        self.classes.insert(descriptor.to_string(), class.clone());
        class
    }

    /// Register an annotation interface and its element accessors.
    pub fn define_annotation(&mut self, descriptor: &str, elements: &[(&str, MockClass)]) -> MockClass {
        let class = self.define_class(descriptor);
        for (name, return_type) in elements {
            self.element_types
                .insert((descriptor.to_string(), name.to_string()), return_type.clone());
        }
        class
    }

    pub fn define_method(&mut self, method_idx: u32, name: &str, return_type: MockClass) -> MockMethod {
        let method = MockMethod { name: name.to_string(), return_type };
        self.methods.insert(method_idx, method.clone());
        method
    }

    pub fn define_field(&mut self, field_idx: u32, name: &str) {
        self.fields.insert(field_idx, MockField { name: name.to_string() });
    }

    pub fn define_enum_constant(&mut self, field_idx: u32, name: &str) {
        self.enums.insert(field_idx, name.to_string());
    }
}

impl Linker for MockLinker {
    type Object = Obj;
    type Class = MockClass;
    type Method = MockMethod;
    type Field = MockField;

    fn resolve_type(&mut self, data: &ClassData<'_, Self>, type_idx: u32) -> Option<MockClass> {
        let descriptor = match data.dex.type_desc(type_idx as usize) {
            Ok(d) => d,
            Err(_) => {
                self.pending = true;
                return None;
            }
        };
        match self.classes.get(&descriptor) {
            Some(c) => Some(c.clone()),
            None => {
                self.pending = true;
                None
            }
        }
    }

    fn resolve_string(&mut self, data: &ClassData<'_, Self>, string_idx: u32) -> Option<Obj> {
        match data.dex.get_string(string_idx as usize) {
            Ok(s) => Some(Rc::new(MockObject::Str(s))),
            Err(_) => {
                self.pending = true;
                None
            }
        }
    }

    fn resolve_method(&mut self, _data: &ClassData<'_, Self>, method_idx: u32) -> Option<MockMethod> {
        match self.methods.get(&method_idx) {
            Some(m) => Some(m.clone()),
            None => {
                self.pending = true;
                None
            }
        }
    }

    fn resolve_field(&mut self, _data: &ClassData<'_, Self>, field_idx: u32) -> Option<MockField> {
        match self.fields.get(&field_idx) {
            Some(f) => Some(f.clone()),
            None => {
                self.pending = true;
                None
            }
        }
    }

    fn resolve_enum_constant(&mut self, _data: &ClassData<'_, Self>, field_idx: u32) -> Option<Obj> {
        match self.enums.get(&field_idx) {
            Some(name) => Some(Rc::new(MockObject::EnumConst(name.clone()))),
            None => {
                self.pending = true;
                None
            }
        }
    }

    fn class_object(&mut self, class: &MockClass) -> Option<Obj> {
        Some(Rc::new(MockObject::Class(class.clone())))
    }

    fn method_object(&mut self, method: &MockMethod) -> Option<Obj> {
        Some(Rc::new(MockObject::Method(method.name.clone())))
    }

    fn field_object(&mut self, field: &MockField) -> Option<Obj> {
        Some(Rc::new(MockObject::Field(field.name.clone())))
    }

    fn box_primitive(&mut self, kind: PrimitiveKind, value: &JValue<Obj>) -> Option<Obj> {
        Some(Rc::new(MockObject::Boxed(kind, value.clone())))
    }

    fn type_not_present(&mut self, descriptor: &str) -> Option<Obj> {
        Some(Rc::new(MockObject::TypeNotPresent(descriptor.to_string())))
    }

    fn primitive_kind(&self, class: &MockClass) -> Option<PrimitiveKind> {
        class.primitive
    }

    fn component_type(&self, class: &MockClass) -> Option<MockClass> {
        class.component.as_deref().cloned()
    }

    fn alloc_array(&mut self, component: &MockClass, len: usize) -> Option<Obj> {
        Some(Rc::new(MockObject::Array(
            component.clone(),
            RefCell::new(Vec::with_capacity(len)),
        )))
    }

    fn array_store(&mut self, array: &Obj, index: usize, value: &JValue<Obj>) -> bool {
        match array.as_ref() {
            MockObject::Array(_, elements) => {
                let mut elements = elements.borrow_mut();
                assert_eq!(elements.len(), index, "elements must be stored in order");
                elements.push(value.clone());
                true
            }
            _ => false,
        }
    }

    fn find_element_accessor(&mut self, annotation_class: &MockClass, name: &str) -> Option<(MockMethod, MockClass)> {
        self.element_types
            .get(&(annotation_class.descriptor.clone(), name.to_string()))
            .map(|return_type| {
                (
                    MockMethod { name: name.to_string(), return_type: return_type.clone() },
                    return_type.clone(),
                )
            })
    }

    fn create_annotation(&mut self, annotation_class: &MockClass, members: Vec<AnnotationMember<Self>>) -> Option<Obj> {
        Some(Rc::new(MockObject::Annotation {
            class: annotation_class.clone(),
            members: members.into_iter().map(|m| (m.name, m.value)).collect(),
        }))
    }

    fn method_name(&self, method: &MockMethod) -> String {
        method.name.clone()
    }

    fn method_return_type(&self, method: &MockMethod) -> Option<MockClass> {
        Some(method.return_type.clone())
    }

    fn string_array_class(&mut self) -> Option<MockClass> {
        Some(MockClass::array(MockClass::object("Ljava/lang/String;")))
    }

    fn class_array_class(&mut self) -> Option<MockClass> {
        Some(MockClass::array(MockClass::object("Ljava/lang/Class;")))
    }

    fn int_array_class(&mut self) -> Option<MockClass> {
        Some(MockClass::array(MockClass::primitive(PrimitiveKind::Int)))
    }

    fn pending_failure(&self) -> bool {
        self.pending
    }

    fn clear_pending_failure(&mut self) {
        self.pending = false;
    }
}
