//! Class resolution for registration
//!
//! The resolver indexes every class record on the module path, with no
//! prefix or metadata-kind filtering. Registration needs the full
//! constructor and method surface of a class even when the selection scan
//! indexed it partially, and the fallback step needs to resolve classes the
//! scan never saw at all. Like the scanner, the resolver works purely from
//! artifact metadata; no class is ever loaded.

use crate::scan::{load_module_path, ScanError};
use onda_meta::{ClassRecord, ConstructorRecord, MethodRecord, ModuleMeta};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Errors from class resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The named class exists in no module on the module path
    #[error("Class {name} not found on the module path")]
    ClassNotFound {
        /// Qualified class name
        name: String,
    },
}

/// A class resolved for registration: its defining module plus the full
/// constructor and method surface from the metadata block.
#[derive(Debug, Clone)]
pub struct ResolvedClass {
    /// Qualified class name
    pub name: String,
    /// Name of the defining module
    pub module: String,
    /// All declared constructors
    pub constructors: Vec<ConstructorRecord>,
    /// All declared methods
    pub methods: Vec<MethodRecord>,
}

/// Name-to-record index over every module on the module path.
pub struct ClassResolver {
    classes: FxHashMap<String, (String, ClassRecord)>,
}

impl ClassResolver {
    /// Build a resolver from the `.onb` artifacts under the given
    /// directories.
    pub fn from_module_path(paths: &[PathBuf]) -> Result<Self, ScanError> {
        Ok(Self::from_modules(load_module_path(paths)?))
    }

    /// Build a resolver from already-decoded module metadata.
    pub fn from_modules(metas: Vec<ModuleMeta>) -> Self {
        let mut classes: FxHashMap<String, (String, ClassRecord)> = FxHashMap::default();
        for meta in metas {
            for record in meta.classes {
                // First definition wins, matching scan dedup order.
                if !classes.contains_key(&record.name) {
                    classes.insert(record.name.clone(), (meta.module.clone(), record));
                }
            }
        }
        debug!(classes = classes.len(), "class resolver built");
        Self { classes }
    }

    /// Number of resolvable classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the resolver indexed no classes.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Resolve a class by qualified name.
    pub fn resolve(&self, name: &str) -> Result<ResolvedClass, ResolveError> {
        let (module, record) = self
            .classes
            .get(name)
            .ok_or_else(|| ResolveError::ClassNotFound {
                name: name.to_string(),
            })?;
        Ok(ResolvedClass {
            name: record.name.clone(),
            module: module.clone(),
            constructors: record.constructors.clone(),
            methods: record.methods.clone(),
        })
    }
}

impl std::fmt::Debug for ClassResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassResolver")
            .field("classes", &self.classes.len())
            .finish()
    }
}
