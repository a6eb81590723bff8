//! Onda Compiled-Module Reflection Metadata
//!
//! This crate defines the reflection metadata block the Onda compiler embeds
//! in compiled modules (`.onb` artifacts): per-class records (supertype,
//! interfaces, annotations, constructors, methods) and the binary codec used
//! to read and write them.
//!
//! The block sits between the artifact header and the code section, so
//! build-time tools can index every class in a module without decoding any
//! bytecode and without loading or linking a single class.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class;
pub mod codec;
pub mod module;

pub use class::{ClassRecord, ConstructorRecord, MethodRecord};
pub use codec::{DecodeError, MetaReader, MetaWriter};
pub use module::{
    encode_artifact, read_artifact_meta, ArtifactError, ArtifactHeader, ModuleMeta,
    FORMAT_VERSION, HEADER_LEN, MAGIC,
};
