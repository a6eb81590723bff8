//! The build-time reflection registry
//!
//! The registry accumulates every class, constructor, and method that must
//! stay reachable through runtime reflection in the native image. It is
//! idempotent (re-registering is a no-op) and ordered (the manifest comes
//! out sorted), so pipelines produce identical output regardless of pass
//! ordering or overlap. Once the compiler moves past the registration
//! window the registry is sealed and further registration is an error.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Errors from registry mutation.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registration attempted after the registry was sealed
    #[error("Registry is sealed; cannot register {class}")]
    Sealed {
        /// Class whose registration was rejected
        class: String,
    },
}

/// Reflective surface registered for one class.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct RegistryEntry {
    constructors: BTreeSet<u32>,
    methods: BTreeSet<String>,
}

/// Accumulates reflection registrations during image build.
#[derive(Debug, Default)]
pub struct ReflectionRegistry {
    classes: BTreeMap<String, RegistryEntry>,
    sealed: bool,
}

impl ReflectionRegistry {
    /// Create an empty, unsealed registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class has been registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Whether the named class has been registered.
    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Whether the registry has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Register a class for reflective access.
    ///
    /// Returns `true` if the class was not previously registered.
    pub fn register_type(&mut self, class: &str) -> Result<bool, RegistryError> {
        self.check_open(class)?;
        if self.classes.contains_key(class) {
            return Ok(false);
        }
        self.classes.insert(class.to_string(), RegistryEntry::default());
        Ok(true)
    }

    /// Register a constructor arity for reflective invocation. Registers
    /// the class as well if it was not yet registered.
    ///
    /// Returns `true` if the arity was not previously registered.
    pub fn register_constructor(
        &mut self,
        class: &str,
        param_count: u32,
    ) -> Result<bool, RegistryError> {
        self.check_open(class)?;
        let entry = self.classes.entry(class.to_string()).or_default();
        Ok(entry.constructors.insert(param_count))
    }

    /// Register a method name for reflective invocation. Registers the
    /// class as well if it was not yet registered.
    ///
    /// Returns `true` if the method was not previously registered.
    pub fn register_method(&mut self, class: &str, method: &str) -> Result<bool, RegistryError> {
        self.check_open(class)?;
        let entry = self.classes.entry(class.to_string()).or_default();
        Ok(entry.methods.insert(method.to_string()))
    }

    /// Seal the registry. Every later registration fails with
    /// [`RegistryError::Sealed`].
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Snapshot the registry as a manifest, classes and members sorted.
    pub fn manifest(&self) -> RegistryManifest {
        RegistryManifest {
            version: MANIFEST_VERSION,
            classes: self
                .classes
                .iter()
                .map(|(name, entry)| ManifestClass {
                    name: name.clone(),
                    constructors: entry.constructors.iter().copied().collect(),
                    methods: entry.methods.iter().cloned().collect(),
                })
                .collect(),
        }
    }

    fn check_open(&self, class: &str) -> Result<(), RegistryError> {
        if self.sealed {
            return Err(RegistryError::Sealed {
                class: class.to_string(),
            });
        }
        Ok(())
    }
}

/// Serialized registry snapshot consumed by the image builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryManifest {
    /// Manifest format version
    pub version: u32,
    /// Registered classes in name order
    pub classes: Vec<ManifestClass>,
}

/// One class in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestClass {
    /// Qualified class name
    pub name: String,
    /// Registered constructor arities, ascending
    pub constructors: Vec<u32>,
    /// Registered method names, sorted
    pub methods: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_is_idempotent() {
        let mut registry = ReflectionRegistry::new();
        assert!(registry.register_type("acme.app.Greeter").unwrap());
        assert!(!registry.register_type("acme.app.Greeter").unwrap());
        assert!(registry.register_constructor("acme.app.Greeter", 2).unwrap());
        assert!(!registry.register_constructor("acme.app.Greeter", 2).unwrap());
        assert!(registry.register_method("acme.app.Greeter", "greet").unwrap());
        assert!(!registry.register_method("acme.app.Greeter", "greet").unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_member_registration_implies_type() {
        let mut registry = ReflectionRegistry::new();
        registry.register_method("acme.app.Late", "run").unwrap();
        assert!(registry.contains("acme.app.Late"));
    }

    #[test]
    fn test_sealed_registry_rejects_registration() {
        let mut registry = ReflectionRegistry::new();
        registry.register_type("acme.app.Early").unwrap();
        registry.seal();
        assert!(registry.is_sealed());
        let err = registry.register_type("acme.app.Late").unwrap_err();
        assert!(matches!(err, RegistryError::Sealed { class } if class == "acme.app.Late"));
        // The pre-seal contents are untouched.
        assert!(registry.contains("acme.app.Early"));
        assert!(!registry.contains("acme.app.Late"));
    }

    #[test]
    fn test_manifest_is_sorted() {
        let mut registry = ReflectionRegistry::new();
        registry.register_method("b.Second", "zeta").unwrap();
        registry.register_method("b.Second", "alpha").unwrap();
        registry.register_constructor("b.Second", 3).unwrap();
        registry.register_constructor("b.Second", 0).unwrap();
        registry.register_type("a.First").unwrap();

        let manifest = registry.manifest();
        assert_eq!(manifest.version, MANIFEST_VERSION);
        assert_eq!(manifest.classes[0].name, "a.First");
        assert_eq!(manifest.classes[1].name, "b.Second");
        assert_eq!(manifest.classes[1].constructors, vec![0, 3]);
        assert_eq!(manifest.classes[1].methods, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_manifest_roundtrips_through_json() {
        let mut registry = ReflectionRegistry::new();
        registry.register_constructor("acme.app.Greeter", 0).unwrap();
        registry.register_method("acme.app.Greeter", "greet").unwrap();
        let manifest = registry.manifest();
        let json = serde_json::to_string(&manifest).unwrap();
        let back: RegistryManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }
}
