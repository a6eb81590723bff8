//! Registration of selected classes
//!
//! The registrar takes classes a rule selected, resolves each one to its
//! full metadata record, and registers the class together with all of its
//! constructors and methods. Resolution goes through the [`ClassResolver`]
//! rather than the scan session because a session may have been scanned
//! without method info, while registration always covers the full surface.

use crate::registry::{ReflectionRegistry, RegistryError};
use crate::resolve::{ClassResolver, ResolveError, ResolvedClass};
use crate::scan::ClassDescriptor;
use thiserror::Error;
use tracing::debug;

/// Errors from the registration step.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// A selected class could not be resolved on the module path
    #[error("Failed to resolve selected class: {0}")]
    Resolve(#[from] ResolveError),

    /// The registry rejected a registration
    #[error("Registration rejected: {0}")]
    Registry(#[from] RegistryError),

    /// A configured known class is absent from the module path
    #[error("Known class {name} (id {id}) is missing from the module path: {source}")]
    KnownClassMissing {
        /// Qualified class name that failed to resolve
        name: String,
        /// Configured id the name was derived from
        id: u32,
        /// Underlying resolution error
        #[source]
        source: ResolveError,
    },
}

/// Register one resolved class: the type itself, every constructor arity,
/// and every method name.
///
/// Returns `true` if the class was not previously registered.
pub fn register_resolved(
    registry: &mut ReflectionRegistry,
    class: &ResolvedClass,
) -> Result<bool, RegistryError> {
    let newly_added = registry.register_type(&class.name)?;
    for ctor in &class.constructors {
        registry.register_constructor(&class.name, ctor.param_count)?;
    }
    for method in &class.methods {
        registry.register_method(&class.name, &method.name)?;
    }
    Ok(newly_added)
}

/// Resolve and register every selected descriptor.
///
/// An empty selection is a successful no-op. Returns the number of classes
/// that were not previously registered.
pub fn register_descriptors(
    resolver: &ClassResolver,
    registry: &mut ReflectionRegistry,
    descriptors: &[&ClassDescriptor],
) -> Result<usize, RegisterError> {
    let mut newly_registered = 0;
    for desc in descriptors {
        let resolved = resolver.resolve(&desc.name)?;
        if register_resolved(registry, &resolved)? {
            newly_registered += 1;
            debug!(
                class = %resolved.name,
                module = %resolved.module,
                constructors = resolved.constructors.len(),
                methods = resolved.methods.len(),
                "registered for reflection"
            );
        }
    }
    Ok(newly_registered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{scan_modules, MetadataKinds, ScanConfig};
    use onda_meta::{ClassRecord, MethodRecord, ModuleMeta};

    fn modules() -> Vec<ModuleMeta> {
        vec![ModuleMeta::new("acme.app").with_class(
            ClassRecord::new("acme.app.Greeter")
                .with_constructor(0)
                .with_constructor(2)
                .with_method(MethodRecord::new("greet", 1))
                .with_method(MethodRecord::new("shutdown", 0)),
        )]
    }

    #[test]
    fn test_registers_full_surface() {
        let resolver = ClassResolver::from_modules(modules());
        let config = ScanConfig::new(vec!["acme.app".to_string()], MetadataKinds::all());
        let session = scan_modules(modules(), &config).unwrap();
        let selected: Vec<_> = session.classes().collect();

        let mut registry = ReflectionRegistry::new();
        let count = register_descriptors(&resolver, &mut registry, &selected).unwrap();
        assert_eq!(count, 1);

        let manifest = registry.manifest();
        assert_eq!(manifest.classes[0].constructors, vec![0, 2]);
        assert_eq!(manifest.classes[0].methods, vec!["greet", "shutdown"]);
    }

    #[test]
    fn test_full_surface_even_from_partial_scan() {
        // Scan without method info; registration still covers methods
        // because it resolves through the module metadata, not the session.
        let resolver = ClassResolver::from_modules(modules());
        let config = ScanConfig::new(
            vec!["acme.app".to_string()],
            MetadataKinds::none().with_class_info(),
        );
        let session = scan_modules(modules(), &config).unwrap();
        let selected: Vec<_> = session.classes().collect();

        let mut registry = ReflectionRegistry::new();
        register_descriptors(&resolver, &mut registry, &selected).unwrap();
        assert_eq!(
            registry.manifest().classes[0].methods,
            vec!["greet", "shutdown"]
        );
    }

    #[test]
    fn test_empty_selection_is_noop() {
        let resolver = ClassResolver::from_modules(Vec::new());
        let mut registry = ReflectionRegistry::new();
        let count = register_descriptors(&resolver, &mut registry, &[]).unwrap();
        assert_eq!(count, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unresolvable_selection_fails() {
        let resolver = ClassResolver::from_modules(Vec::new());
        let desc = ClassDescriptor {
            name: "acme.app.Ghost".to_string(),
            module: "acme.app".to_string(),
            super_name: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            methods: Vec::new(),
        };
        let mut registry = ReflectionRegistry::new();
        let err = register_descriptors(&resolver, &mut registry, &[&desc]).unwrap_err();
        assert!(matches!(err, RegisterError::Resolve(_)));
    }
}
