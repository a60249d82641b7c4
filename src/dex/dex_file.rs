/* Dex file format structures */

use crate::dex::annotations::{AnnotationItem, AnnotationSetItem, AnnotationsDirectoryItem};
use crate::dex::encoded_values::{read_encoded_array, EncodedValue};
use crate::dex::error::DexError;
use crate::dex::{read_u1, read_u2, read_u4, read_uleb128, read_x, write_u1, write_u2, write_u4, write_uleb128, write_x};
use cesu8::to_java_cesu8;
use log::info;

use std::fs;
use std::path::Path;

/* Constants */
pub const DEX_FILE_MAGIC: [u8; 8] = [ 0x64, 0x65, 0x78, 0x0a, 0x30, 0x33, 0x39, 0x00 ];
pub const ENDIAN_CONSTANT: u32 = 0x12345678;
pub const REVERSE_ENDIAN_CONSTANT: u32 = 0x78563412;
pub const NO_INDEX: usize = 0xffffffff;

/* Access flags */
pub const ACC_PUBLIC: u32 = 0x1;
pub const ACC_PRIVATE: u32 = 0x2;
pub const ACC_PROTECTED: u32 = 0x4;
pub const ACC_STATIC: u32 = 0x8;
pub const ACC_FINAL: u32 = 0x10;
pub const ACC_VOLATILE: u32 = 0x40;
pub const ACC_NATIVE: u32 = 0x100;
pub const ACC_INTERFACE: u32 = 0x200;
pub const ACC_ABSTRACT: u32 = 0x400;
pub const ACC_SYNTHETIC: u32 = 0x1000;
pub const ACC_ANNOTATION: u32 = 0x2000;
pub const ACC_ENUM: u32 = 0x4000;
pub const ACC_CONSTRUCTOR: u32 = 0x10000;


type StringId = usize;
type TypeId = StringId;
type ProtoId = usize;
type FieldId = usize;

#[derive(Debug, Default)]
pub struct TypeList(pub Vec<TypeId>);
impl TypeList
{
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<TypeList, DexError>
    {
        let mut v = vec![];
        let size = read_u4(bytes, ix)?;
        for _ in 0..size { v.push(read_u2(bytes, ix)? as TypeId); }
        Ok(TypeList(v))
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_u4(bytes, self.0.len() as u32);
        for i in &self.0 { c += write_u2(bytes, *i as u16); }
        c
    }
}


#[derive(Debug)]
pub struct PrototypeItem {
    // The proto_id_item struct
    pub shorty_idx: StringId,
    pub return_type_idx: TypeId,
    pub parameters: TypeList
}


#[derive(Debug, PartialEq, Eq)]
pub struct FieldItem {
    // The field_id_item struct
    pub class_idx: TypeId,
    pub type_idx: TypeId,
    pub name_idx: StringId
}

impl FieldItem
{
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<FieldItem, DexError>
    {
        Ok(FieldItem {
            class_idx: read_u2(bytes, ix)? as TypeId,
            type_idx: read_u2(bytes, ix)? as TypeId,
            name_idx: read_u4(bytes, ix)? as StringId,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_u2(bytes, self.class_idx as u16);
        c += write_u2(bytes, self.type_idx as u16);
        c += write_u4(bytes, self.name_idx as u32);
        c
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct MethodItem {
    // The method_id_item struct
    pub class_idx: TypeId,
    pub proto_idx: ProtoId,
    pub name_idx: StringId
}

impl MethodItem
{
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<MethodItem, DexError>
    {
        Ok(MethodItem {
            class_idx: read_u2(bytes, ix)? as TypeId,
            proto_idx: read_u2(bytes, ix)? as ProtoId,
            name_idx: read_u4(bytes, ix)? as StringId,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_u2(bytes, self.class_idx as u16);
        c += write_u2(bytes, self.proto_idx as u16);
        c += write_u4(bytes, self.name_idx as u32);
        c
    }
}

#[derive(Debug)]
pub struct EncodedField
{
    pub field_idx: FieldId,
    pub access_flags: u32
}

#[derive(Debug)]
pub struct EncodedMethod
{
    pub method_idx: usize,
    pub access_flags: u32,
    /// Offset of the code_item, 0 for abstract and native methods. The
    /// annotation reader never decodes instructions, so the offset is kept raw.
    pub code_off: u32
}

/// class_data_item, minus instruction decoding.
#[derive(Debug, Default)]
pub struct ClassDataItem
{
    pub static_fields: Vec<EncodedField>,
    pub instance_fields: Vec<EncodedField>,
    pub direct_methods: Vec<EncodedMethod>,
    pub virtual_methods: Vec<EncodedMethod>
}

impl ClassDataItem
{
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<ClassDataItem, DexError>
    {
        let static_field_size = read_uleb128(bytes, ix)?;
        let instance_field_size = read_uleb128(bytes, ix)?;
        let direct_method_size = read_uleb128(bytes, ix)?;
        let virtual_method_size = read_uleb128(bytes, ix)?;

        let mut static_fields = vec![];
        let mut instance_fields = vec![];
        let mut direct_methods = vec![];
        let mut virtual_methods = vec![];

        let mut offset = 0;
        for _ in 0..static_field_size {
            offset += read_uleb128(bytes, ix)?;
            static_fields.push( EncodedField { field_idx: offset as FieldId, access_flags: read_uleb128(bytes, ix)? } )
        }

        offset = 0;
        for _ in 0..instance_field_size {
            offset += read_uleb128(bytes, ix)?;
            instance_fields.push( EncodedField { field_idx: offset as FieldId, access_flags: read_uleb128(bytes, ix)? } )
        }

        offset = 0;
        for _ in 0..direct_method_size {
            offset += read_uleb128(bytes, ix)?;
            let access_flags = read_uleb128(bytes, ix)?;
            let code_off = read_uleb128(bytes, ix)?;
            direct_methods.push( EncodedMethod { method_idx: offset as usize, access_flags, code_off } );
        }

        offset = 0;
        for _ in 0..virtual_method_size {
            offset += read_uleb128(bytes, ix)?;
            let access_flags = read_uleb128(bytes, ix)?;
            let code_off = read_uleb128(bytes, ix)?;
            virtual_methods.push( EncodedMethod { method_idx: offset as usize, access_flags, code_off } );
        }

        Ok(ClassDataItem { static_fields, instance_fields, direct_methods, virtual_methods })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_uleb128(bytes, self.static_fields.len() as u32);
        c += write_uleb128(bytes, self.instance_fields.len() as u32);
        c += write_uleb128(bytes, self.direct_methods.len() as u32);
        c += write_uleb128(bytes, self.virtual_methods.len() as u32);

        let mut last = 0;
        for i in &self.static_fields {
            c += write_uleb128(bytes, (i.field_idx - last) as u32);
            last = i.field_idx;
            c += write_uleb128(bytes, i.access_flags);
        }

        let mut last = 0;
        for i in &self.instance_fields {
            c += write_uleb128(bytes, (i.field_idx - last) as u32);
            last = i.field_idx;
            c += write_uleb128(bytes, i.access_flags);
        }

        let mut last = 0;
        for i in &self.direct_methods {
            c += write_uleb128(bytes, (i.method_idx - last) as u32);
            last = i.method_idx;
            c += write_uleb128(bytes, i.access_flags);
            c += write_uleb128(bytes, i.code_off);
        }

        let mut last = 0;
        for i in &self.virtual_methods {
            c += write_uleb128(bytes, (i.method_idx - last) as u32);
            last = i.method_idx;
            c += write_uleb128(bytes, i.access_flags);
            c += write_uleb128(bytes, i.code_off);
        }

        c
    }

    /// Access flags of the given method, searching direct then virtual methods.
    pub fn method_access_flags(&self, method_idx: usize) -> Option<u32> {
        self.direct_methods
            .iter()
            .chain(self.virtual_methods.iter())
            .find(|m| m.method_idx == method_idx)
            .map(|m| m.access_flags)
    }
}


#[derive(Debug)]
pub struct ClassDefItem {
    // The class_def_item struct
    pub class_idx: TypeId,
    pub access_flags: u32,
    pub superclass_idx: TypeId,
    pub interfaces: Option<TypeList>,
    pub source_file_idx: StringId,
    pub annotations: Option<AnnotationsDirectoryItem>,
    pub class_data: Option<ClassDataItem>,
    pub static_values: Option<Vec<EncodedValue>>
}

impl ClassDefItem
{
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<ClassDefItem, DexError>
    {
        let class_idx = read_u4(bytes, ix)? as TypeId;
        let access_flags = read_u4(bytes, ix)?;
        let superclass_idx = read_u4(bytes, ix)? as TypeId;
        let mut interface_offset = read_u4(bytes, ix)? as usize;
        let interfaces = if interface_offset > 0  { Some(TypeList::read(bytes, &mut interface_offset)?) }
            else { None };
        let source_file_idx = read_u4(bytes, ix)? as StringId;
        let mut annotations_offset = read_u4(bytes, ix)? as usize;
        let annotations = if annotations_offset > 0 {
            Some(AnnotationsDirectoryItem::read(bytes, &mut annotations_offset)?)
        } else { None };
        let mut class_data_offset = read_u4(bytes, ix)? as usize;
        let class_data = if class_data_offset > 0 {
            Some(ClassDataItem::read(bytes, &mut class_data_offset)?)
        } else { None };
        let mut static_values_offset = read_u4(bytes, ix)? as usize;
        let static_values = if static_values_offset > 0 { Some(read_encoded_array(bytes, &mut static_values_offset)?) }
            else { None };

        Ok(ClassDefItem {
            class_idx,
            access_flags,
            superclass_idx,
            interfaces,
            source_file_idx,
            annotations,
            class_data,
            static_values,
        })
    }

    /// Write a `class_def_item` using provided offsets for referenced sections.
    /// This does not serialize the referenced sections themselves.
    pub fn write_with_offsets(
        &self,
        bytes: &mut Vec<u8>,
        interfaces_off: u32,
        annotations_off: u32,
        class_data_off: u32,
        static_values_off: u32,
    ) -> usize {
        let mut c = 0;
        c += write_u4(bytes, self.class_idx as u32);
        c += write_u4(bytes, self.access_flags);
        c += write_u4(bytes, self.superclass_idx as u32);
        c += write_u4(bytes, interfaces_off);
        c += write_u4(bytes, self.source_file_idx as u32);
        c += write_u4(bytes, annotations_off);
        c += write_u4(bytes, class_data_off);
        c += write_u4(bytes, static_values_off);
        c
    }
}


#[derive(Debug)]
pub struct DexFile {
    pub header: Header,
    pub strings: Vec<DexString>,
    pub types: Vec<TypeId>,
    pub prototypes: Vec<PrototypeItem>,
    pub fields: Vec<FieldItem>,
    pub methods: Vec<MethodItem>,
    pub class_defs: Vec<ClassDefItem>,
    /// Full file image. Annotation sets and values are read lazily from here
    /// by offset.
    pub data: Vec<u8>,
}

impl DexFile {

    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<DexFile, DexError>
    {
        let header = Header::read(bytes, ix)?;

        let mut dex = DexFile {
            header,
            strings: vec![],
            types: vec![],
            prototypes: vec![],
            fields: vec![],
            methods: vec![],
            class_defs: vec![],
            data: bytes.to_vec(),
        };

        // Read the strings
        *ix = dex.header.string_ids_off as usize;
        for _ in 0..dex.header.string_ids_size
        {
            let mut string_id = read_u4(bytes, ix)? as usize;
            let ds = DexString::read(bytes, &mut string_id)?;
            dex.strings.push(ds);
        }

        // Read the type_ids
        *ix = dex.header.type_ids_off as usize;
        for _ in 0..dex.header.type_ids_size
        {
            let type_id: TypeId = read_u4(bytes, ix)? as usize;
            if let DexString::Decoded(_s) = &dex.strings[type_id]
            {
                dex.types.push(type_id);
            }
            else { fail!("Invalid type description: {:?}", &dex.strings[type_id]); }
        }

        // Read the prototypes
        *ix = dex.header.proto_ids_off as usize;
        for _ in 0..dex.header.proto_ids_size
        {
            let shorty_idx = read_u4(bytes, ix)? as StringId;
            let return_type_idx = read_u4(bytes, ix)? as TypeId;
            let mut parameter_offset = read_u4(bytes, ix)? as usize;
            let p = PrototypeItem {
                shorty_idx, return_type_idx,
                parameters: if parameter_offset == 0 { TypeList(vec![]) }
                else { TypeList::read(bytes, &mut parameter_offset)? },
            };
            dex.prototypes.push(p);
        }

        // Read the Field ids
        *ix = dex.header.field_ids_off as usize;
        for _ in 0..dex.header.field_ids_size
        {
            dex.fields.push(FieldItem::read(bytes, ix)?);
        }

        // Read the Method ids
        *ix = dex.header.method_ids_off as usize;
        for _ in 0..dex.header.method_ids_size
        {
            dex.methods.push(MethodItem::read(bytes, ix)?);
        }

        // Read the Class Defs
        *ix = dex.header.class_defs_off as usize;
        for _ in 0..dex.header.class_defs_size
        {
            dex.class_defs.push(ClassDefItem::read(bytes, ix)?);
        }

        Ok(dex)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<DexFile, DexError>
    {
        let mut ix = 0;
        DexFile::read(bytes, &mut ix)
    }

    pub fn from_file(path: &Path) -> Result<DexFile, DexError>
    {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => fail!("Unable to read {}: {}", path.display(), e),
        };
        info!("Loading DEX file {} ({} bytes)", path.display(), bytes.len());
        DexFile::from_bytes(&bytes)
    }

    pub fn get_string(&self, id: StringId) -> Result<String, DexError>
    {
        let name_string = match self.strings.get(id) {
            Some(s) => s,
            None => corrupt!("String index {} out of range", id),
        };
        match name_string
        {
            DexString::Decoded(s) => Ok(s.to_string()),
            DexString::Raw(_, _) => Err(DexError::new("Undecodable string constant.")),
        }
    }

    /// JNI descriptor string for a type index, e.g. `Ljava/lang/String;`.
    pub fn type_desc(&self, type_idx: TypeId) -> Result<String, DexError> {
        match self.types.get(type_idx) {
            Some(string_id) => self.get_string(*string_id),
            None => corrupt!("Type index {} out of range", type_idx),
        }
    }

    /// Index into `class_defs` for the class defined with the given type index.
    /// `None` for types the file references but does not define.
    pub fn class_def_index(&self, type_idx: TypeId) -> Option<usize> {
        self.class_defs.iter().position(|cd| cd.class_idx == type_idx)
    }

    pub fn field_item(&self, field_idx: usize) -> Result<&FieldItem, DexError> {
        match self.fields.get(field_idx) {
            Some(f) => Ok(f),
            None => corrupt!("Field index {} out of range", field_idx),
        }
    }

    pub fn method_item(&self, method_idx: usize) -> Result<&MethodItem, DexError> {
        match self.methods.get(method_idx) {
            Some(m) => Ok(m),
            None => corrupt!("Method index {} out of range", method_idx),
        }
    }

    pub fn method_name(&self, method_idx: usize) -> Result<String, DexError> {
        let m = self.method_item(method_idx)?;
        self.get_string(m.name_idx)
    }

    /// Descriptor of a method's return type, via its prototype.
    pub fn method_return_type_desc(&self, method_idx: usize) -> Result<String, DexError> {
        let m = self.method_item(method_idx)?;
        let proto = match self.prototypes.get(m.proto_idx) {
            Some(p) => p,
            None => corrupt!("Proto index {} out of range", m.proto_idx),
        };
        self.type_desc(proto.return_type_idx)
    }

    /// Read the `annotation_set_item` at an absolute file offset.
    /// Offset 0 means "no annotations" and yields an empty set.
    pub fn annotation_set_at(&self, off: u32) -> Result<AnnotationSetItem, DexError> {
        if off == 0 {
            return Ok(AnnotationSetItem { entries: vec![] });
        }
        let mut ix = off as usize;
        AnnotationSetItem::read(&self.data, &mut ix)
    }

    /// Read all `annotation_item`s of the set at an absolute file offset.
    pub fn annotation_items_at(&self, off: u32) -> Result<Vec<AnnotationItem>, DexError> {
        let set = self.annotation_set_at(off)?;
        let mut items = Vec::with_capacity(set.entries.len());
        for entry_off in set.entries {
            if entry_off == 0 { continue; }
            let mut j = entry_off as usize;
            items.push(AnnotationItem::read(&self.data, &mut j)?);
        }
        Ok(items)
    }
}


#[derive(Debug, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 8],
    pub checksum: u32,
    pub signature: [u8; 20],
    pub file_size: u32,
    pub header_size: u32,
    pub endian_tag: u32,
    pub link_size: u32,
    pub link_off: u32,
    pub map_off: u32,
    pub string_ids_size: u32,
    pub string_ids_off: u32,
    pub type_ids_size: u32,
    pub type_ids_off: u32,
    pub proto_ids_size: u32,
    pub proto_ids_off: u32,
    pub field_ids_size: u32,
    pub field_ids_off: u32,
    pub method_ids_size: u32,
    pub method_ids_off: u32,
    pub class_defs_size: u32,
    pub class_defs_off: u32,
    pub data_size: u32,
    pub data_off: u32,
}

impl Default for Header
{
    fn default() -> Header
    {
        Header {
            magic: DEX_FILE_MAGIC,
            checksum: 0,
            signature: [0; 20],
            file_size: 0,
            header_size: 0x70,
            endian_tag: ENDIAN_CONSTANT,
            link_size: 0,
            link_off: 0,
            map_off: 0,
            string_ids_size: 0,
            string_ids_off: 0,
            type_ids_size: 0,
            type_ids_off: 0,
            proto_ids_size: 0,
            proto_ids_off: 0,
            field_ids_size: 0,
            field_ids_off: 0,
            method_ids_size: 0,
            method_ids_off: 0,
            class_defs_size: 0,
            class_defs_off: 0,
            data_size: 0,
            data_off: 0,
        }
    }
}

impl Header
{

    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<Header, DexError>
    {
        if bytes.len() < 0x70 {
            return Err(DexError::truncated("Not enough bytes for header"));
        }

        let magic = <[u8; 8]>::try_from(read_x(bytes, ix, 8)?).unwrap();
        if magic[0] != 0x64 || magic[1] != 0x65 || magic[2] != 0x78 { corrupt!("Invalid magic value"); }

        Ok(Header {
            magic,
            checksum: read_u4(bytes, ix)?,
            signature: <[u8; 20]>::try_from(read_x(bytes, ix, 20)?).unwrap(),
            file_size: read_u4(bytes, ix)?,
            header_size: read_u4(bytes, ix)?,
            endian_tag: read_u4(bytes, ix)?,
            link_size: read_u4(bytes, ix)?,
            link_off: read_u4(bytes, ix)?,
            map_off: read_u4(bytes, ix)?,
            string_ids_size: read_u4(bytes, ix)?,
            string_ids_off: read_u4(bytes, ix)?,
            type_ids_size: read_u4(bytes, ix)?,
            type_ids_off: read_u4(bytes, ix)?,
            proto_ids_size: read_u4(bytes, ix)?,
            proto_ids_off: read_u4(bytes, ix)?,
            field_ids_size: read_u4(bytes, ix)?,
            field_ids_off: read_u4(bytes, ix)?,
            method_ids_size: read_u4(bytes, ix)?,
            method_ids_off: read_u4(bytes, ix)?,
            class_defs_size: read_u4(bytes, ix)?,
            class_defs_off: read_u4(bytes, ix)?,
            data_size: read_u4(bytes, ix)?,
            data_off: read_u4(bytes, ix)?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_x(bytes, &self.magic);
        c += write_u4(bytes, self.checksum);
        c += write_x(bytes, &self.signature);
        c += write_u4(bytes, self.file_size);
        c += write_u4(bytes, self.header_size);
        c += write_u4(bytes, self.endian_tag);
        c += write_u4(bytes, self.link_size);
        c += write_u4(bytes, self.link_off);
        c += write_u4(bytes, self.map_off);
        c += write_u4(bytes, self.string_ids_size);
        c += write_u4(bytes, self.string_ids_off);
        c += write_u4(bytes, self.type_ids_size);
        c += write_u4(bytes, self.type_ids_off);
        c += write_u4(bytes, self.proto_ids_size);
        c += write_u4(bytes, self.proto_ids_off);
        c += write_u4(bytes, self.field_ids_size);
        c += write_u4(bytes, self.field_ids_off);
        c += write_u4(bytes, self.method_ids_size);
        c += write_u4(bytes, self.method_ids_off);
        c += write_u4(bytes, self.class_defs_size);
        c += write_u4(bytes, self.class_defs_off);
        c += write_u4(bytes, self.data_size);
        c += write_u4(bytes, self.data_off);
        c
    }
}


#[derive(Debug, Eq, PartialEq, Clone)]
pub enum DexString
{
    Decoded(String),
    Raw(u32, Vec<u8>),
}

impl DexString
{
    pub fn from_string(s: &str) -> DexString
    {
        DexString::Decoded(s.to_string())
    }

    pub fn to_string(&self) -> Result<String, DexError>
    {
        match &self
        {
            DexString::Decoded(s) => Ok(s.to_string()),
            DexString::Raw(_,_) => Err(DexError::new(
                "DexString failed conversion",
            )),
        }
    }

    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<DexString, DexError>
    {
        let utf16_size = read_uleb128(bytes, ix)?;
        let mut v = vec![];

        loop
        {
            let u = read_u1(bytes, ix)?;
            if u != 0 { v.push(u); }
            else { break; }
        }

        Ok(match cesu8::from_java_cesu8(v.as_slice())
        {
            Ok(converted_str) => DexString::Decoded(converted_str.to_string()),
            _ => DexString::Raw(utf16_size, v)
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;

        match self
        {
            DexString::Raw(utf16_size, v) => {
                c += write_uleb128(bytes, *utf16_size);
                c += write_x(bytes, v);
                c += write_u1(bytes, 0);
            },

            DexString::Decoded(s) => {
                let encoded = to_java_cesu8(s).to_vec();
                c += write_uleb128(bytes, s.chars().count() as u32);
                c += write_x(bytes, encoded.as_slice());
                c += write_u1(bytes, 0);
            }
        }
        c
    }

    pub fn is_decoded(&self) -> bool
    {
        matches!(self, DexString::Decoded(_))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip()
    {
        let header = Header {
            string_ids_size: 4,
            string_ids_off: 0x70,
            ..Header::default()
        };
        let mut encoded_bytes = vec![];
        header.write(&mut encoded_bytes);
        assert_eq!(encoded_bytes.len(), 0x70);

        let mut ix = 0;
        let decoded = Header::read(encoded_bytes.as_slice(), &mut ix).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn test_header_bad_magic()
    {
        let mut bytes = vec![];
        Header::default().write(&mut bytes);
        bytes[0] = b'x';
        let mut ix = 0;
        let err = Header::read(&bytes, &mut ix).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_dex_string_roundtrip()
    {
        // Includes a supplementary-plane character, which CESU-8 encodes as a
        // surrogate pair.
        for s in ["", "hello", "Ljava/lang/Object;", "emoji \u{1F600}"] {
            let ds = DexString::from_string(s);
            let mut bytes = vec![];
            ds.write(&mut bytes);
            let mut ix = 0;
            let ds2 = DexString::read(&bytes, &mut ix).expect("read failed");
            assert_eq!(ix, bytes.len());
            assert_eq!(ds2.to_string().unwrap(), s);
        }
    }

    #[test]
    fn test_class_data_item_roundtrip()
    {
        let item = ClassDataItem {
            static_fields: vec![EncodedField { field_idx: 0, access_flags: ACC_PUBLIC | ACC_STATIC }],
            instance_fields: vec![EncodedField { field_idx: 2, access_flags: ACC_PRIVATE }],
            direct_methods: vec![EncodedMethod { method_idx: 1, access_flags: ACC_NATIVE, code_off: 0 }],
            virtual_methods: vec![
                EncodedMethod { method_idx: 3, access_flags: ACC_PUBLIC, code_off: 0x200 },
                EncodedMethod { method_idx: 5, access_flags: ACC_PUBLIC, code_off: 0x280 },
            ],
        };
        let mut bytes = vec![];
        item.write(&mut bytes);

        let mut ix = 0;
        let item2 = ClassDataItem::read(&bytes, &mut ix).expect("read failed");
        assert_eq!(ix, bytes.len());
        assert_eq!(item2.static_fields[0].field_idx, 0);
        assert_eq!(item2.instance_fields[0].field_idx, 2);
        assert_eq!(item2.virtual_methods[1].method_idx, 5);
        assert_eq!(item2.method_access_flags(1), Some(ACC_NATIVE));
        assert_eq!(item2.method_access_flags(3), Some(ACC_PUBLIC));
        assert_eq!(item2.method_access_flags(4), None);
    }
}
