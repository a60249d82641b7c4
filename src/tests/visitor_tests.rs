//! Raw annotation traversal: event ordering, early exit, cursor correctness.

use crate::dex::annotations::Visibility;
use crate::dex::encoded_values::{AnnotationElement, EncodedAnnotation, EncodedValue};
use crate::runtime::value::{RawValue, ValueTag};
use crate::runtime::visitor::{visit_class_annotations, AnnotationVisitor, VisitorStatus};
use crate::tests::mock::{class_directory, DexBuilder};

const MARKER: &str = "Lcom/test/Marker;";
const INNER: &str = "Lcom/test/Inner;";

/// Records every callback as a line and answers with configurable statuses.
struct Recorder {
    events: Vec<String>,
    on_annotation: VisitorStatus,
    on_container: VisitorStatus,
    break_element: Option<&'static str>,
    break_array: Option<(u32, u32)>,
}

impl Recorder {
    fn new() -> Recorder {
        Recorder {
            events: vec![],
            on_annotation: VisitorStatus::VisitInner,
            on_container: VisitorStatus::VisitInner,
            break_element: None,
            break_array: None,
        }
    }
}

impl AnnotationVisitor for Recorder {
    fn visit_annotation(&mut self, descriptor: &str, visibility: Visibility) -> VisitorStatus {
        self.events.push(format!("annotation {} {:?}", descriptor, visibility));
        self.on_annotation
    }

    fn visit_annotation_element(&mut self, name: &str, tag: ValueTag, value: &RawValue) -> VisitorStatus {
        self.events.push(format!("element {} {:?} {:?}", name, tag, value));
        if self.break_element == Some(name) {
            return VisitorStatus::Break;
        }
        if *value == RawValue::Container {
            self.on_container
        } else {
            VisitorStatus::Next
        }
    }

    fn visit_array_element(&mut self, depth: u32, index: u32, tag: ValueTag, value: &RawValue) -> VisitorStatus {
        self.events.push(format!("array d{} i{} {:?} {:?}", depth, index, tag, value));
        if self.break_array == Some((depth, index)) {
            return VisitorStatus::Break;
        }
        if *value == RawValue::Container {
            self.on_container
        } else {
            VisitorStatus::Next
        }
    }
}

fn element(b: &mut DexBuilder, name: &str, value: EncodedValue) -> AnnotationElement {
    AnnotationElement { name_idx: b.string(name), value }
}

/// @Marker(num=7, grid=[[1,2],[3]], meta=@Inner(x=1), tail="end"),
/// plus the string id of "end".
fn nested_fixture() -> (crate::dex::dex_file::DexFile, u32) {
    let mut b = DexBuilder::new();
    let marker_idx = b.type_idx(MARKER);
    let inner_idx = b.type_idx(INNER);
    let end_idx = b.string("end");
    let meta = EncodedAnnotation {
        type_idx: inner_idx,
        elements: vec![element(&mut b, "x", EncodedValue::Int(1))],
    };
    let grid = EncodedValue::Array(vec![
        EncodedValue::Array(vec![EncodedValue::Int(1), EncodedValue::Int(2)]),
        EncodedValue::Array(vec![EncodedValue::Int(3)]),
    ]);
    let ann = EncodedAnnotation {
        type_idx: marker_idx,
        elements: vec![
            element(&mut b, "num", EncodedValue::Int(7)),
            element(&mut b, "grid", grid),
            element(&mut b, "meta", EncodedValue::Annotation(meta)),
            element(&mut b, "tail", EncodedValue::String(end_idx)),
        ],
    };
    let item = b.push_annotation(Visibility::Runtime, ann);
    let set = b.push_set(&[item]);
    let dex = b.build(Some(class_directory(set)));
    (dex, end_idx)
}

#[test]
fn test_full_traversal_order() {
    let (dex, end_idx) = nested_fixture();
    let mut rec = Recorder::new();
    visit_class_annotations(&dex, dex.class_defs.first(), &mut rec).unwrap();

    let expected = vec![
        format!("annotation {} Runtime", MARKER),
        "element num Int Int(7)".to_string(),
        "element grid Array Container".to_string(),
        "array d0 i0 Array Container".to_string(),
        "array d1 i0 Int Int(1)".to_string(),
        "array d1 i1 Int Int(2)".to_string(),
        "array d0 i1 Array Container".to_string(),
        "array d1 i0 Int Int(3)".to_string(),
        // Nested annotations are never descended into; the element after one
        // must still decode at the right cursor.
        "element meta Annotation Container".to_string(),
        format!("element tail String Index({})", end_idx),
    ];
    assert_eq!(rec.events, expected);
}

#[test]
fn test_next_on_annotation_skips_elements() {
    let mut b = DexBuilder::new();
    let marker_idx = b.type_idx(MARKER);
    let inner_idx = b.type_idx(INNER);
    let first = EncodedAnnotation {
        type_idx: marker_idx,
        elements: vec![element(&mut b, "num", EncodedValue::Int(7))],
    };
    let second = EncodedAnnotation { type_idx: inner_idx, elements: vec![] };
    let a = b.push_annotation(Visibility::Runtime, first);
    let bb = b.push_annotation(Visibility::System, second);
    let set = b.push_set(&[a, bb]);
    let dex = b.build(Some(class_directory(set)));

    let mut rec = Recorder::new();
    rec.on_annotation = VisitorStatus::Next;
    visit_class_annotations(&dex, dex.class_defs.first(), &mut rec).unwrap();

    assert_eq!(rec.events, vec![
        format!("annotation {} Runtime", MARKER),
        format!("annotation {} System", INNER),
    ]);
}

#[test]
fn test_break_at_annotation_level() {
    let mut b = DexBuilder::new();
    let marker_idx = b.type_idx(MARKER);
    let inner_idx = b.type_idx(INNER);
    let first = EncodedAnnotation { type_idx: marker_idx, elements: vec![] };
    let second = EncodedAnnotation { type_idx: inner_idx, elements: vec![] };
    let a = b.push_annotation(Visibility::Runtime, first);
    let bb = b.push_annotation(Visibility::Runtime, second);
    let set = b.push_set(&[a, bb]);
    let dex = b.build(Some(class_directory(set)));

    let mut rec = Recorder::new();
    rec.on_annotation = VisitorStatus::Break;
    visit_class_annotations(&dex, dex.class_defs.first(), &mut rec).unwrap();

    assert_eq!(rec.events, vec![format!("annotation {} Runtime", MARKER)]);
}

#[test]
fn test_break_on_element() {
    let (dex, _) = nested_fixture();
    let mut rec = Recorder::new();
    rec.break_element = Some("num");
    visit_class_annotations(&dex, dex.class_defs.first(), &mut rec).unwrap();

    assert_eq!(rec.events, vec![
        format!("annotation {} Runtime", MARKER),
        "element num Int Int(7)".to_string(),
    ]);
}

#[test]
fn test_break_inside_array() {
    let (dex, _) = nested_fixture();
    let mut rec = Recorder::new();
    rec.break_array = Some((1, 0));
    visit_class_annotations(&dex, dex.class_defs.first(), &mut rec).unwrap();

    // Breaking inside the first inner array suppresses everything after it.
    assert_eq!(rec.events, vec![
        format!("annotation {} Runtime", MARKER),
        "element num Int Int(7)".to_string(),
        "element grid Array Container".to_string(),
        "array d0 i0 Array Container".to_string(),
        "array d1 i0 Int Int(1)".to_string(),
    ]);
}

#[test]
fn test_next_on_container_skips_whole_array() {
    let (dex, end_idx) = nested_fixture();
    let mut rec = Recorder::new();
    rec.on_container = VisitorStatus::Next;
    visit_class_annotations(&dex, dex.class_defs.first(), &mut rec).unwrap();

    // Skipped containers must leave the cursor on the next element.
    assert_eq!(rec.events, vec![
        format!("annotation {} Runtime", MARKER),
        "element num Int Int(7)".to_string(),
        "element grid Array Container".to_string(),
        "element meta Annotation Container".to_string(),
        format!("element tail String Index({})", end_idx),
    ]);
}

#[test]
fn test_no_annotations_visits_nothing() {
    let dex = DexBuilder::new().build(None);
    let mut rec = Recorder::new();
    visit_class_annotations(&dex, dex.class_defs.first(), &mut rec).unwrap();
    assert!(rec.events.is_empty());

    visit_class_annotations(&dex, None, &mut rec).unwrap();
    assert!(rec.events.is_empty());
}
