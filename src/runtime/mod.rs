//! Runtime annotation reader.
//!
//! Reads annotation metadata straight out of a loaded [`DexFile`]'s data
//! section. Object construction and class resolution go through the
//! [`Linker`] collaborator so the reader itself stays heap-agnostic.
//!
//! [`DexFile`]: crate::dex::dex_file::DexFile
//! [`Linker`]: crate::runtime::linker::Linker

pub mod annotations;
pub mod decode;
pub mod linker;
pub mod value;
pub mod visitor;
