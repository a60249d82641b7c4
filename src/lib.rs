//! # dexreflect
//!
//! A library for reading annotation metadata from Android DEX containers:
//! the container structures themselves, runtime-style annotation queries
//! over a pluggable class linker, and the compiler-side sharpening tables
//! that consume that metadata.

#[macro_use]
pub mod dex;
pub mod compiler;
pub mod runtime;
mod tests;
