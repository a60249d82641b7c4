//! Compiler-facing decision tables.

pub mod sharpening;
