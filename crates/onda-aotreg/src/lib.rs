//! Build-time reflection registration for Onda native images
//!
//! Ahead-of-time compilation closes the world: anything reached only
//! through runtime reflection must be registered during the image build or
//! it is unreachable in the shipped binary. This crate scans compiled
//! module artifacts for classes that are known to be reached reflectively
//! (synthesized closures, annotated value and command classes, generated
//! runtime method holders), registers them in a [`ReflectionRegistry`], and
//! emits the manifest the image builder consumes.
//!
//! Scanning works purely from each artifact's metadata block; no class is
//! ever loaded. Passes are explicit and ordered, configured in code or from
//! TOML, and the whole run is deterministic: the same module path and
//! configuration produce the same manifest.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod fallback;
pub mod pipeline;
pub mod registrar;
pub mod registry;
pub mod resolve;
pub mod rules;
pub mod scan;

pub use config::{AotregConfig, ConfigError, FallbackConfig, PassConfig, RuleConfig};
pub use fallback::{holder_class_name, register_known_holders};
pub use pipeline::{
    KnownHoldersPass, PassContext, PassError, PassReport, Pipeline, PipelineError,
    PipelineReport, RegistrationPass, ScanPass,
};
pub use registrar::{register_descriptors, register_resolved, RegisterError};
pub use registry::{ManifestClass, ReflectionRegistry, RegistryError, RegistryManifest};
pub use resolve::{ClassResolver, ResolveError, ResolvedClass};
pub use rules::{select_union, SelectionRule};
pub use scan::{
    scan_modules, scan_path, ClassDescriptor, MetadataKind, MetadataKinds, ScanConfig,
    ScanError, ScanSession,
};
