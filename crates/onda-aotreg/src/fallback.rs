//! Direct registration of known runtime method holders
//!
//! Bootstrap-templated holder classes are emitted without a supertype link
//! in their metadata record, so the subclass scan cannot see them even
//! though they resolve fine by name. The holders actually reached that way
//! are few and stable across runtime releases, so they are carried as
//! configured ids and registered by constructed name. A configured id whose
//! class is missing from the module path fails the build; registering it
//! lazily at runtime would crash the shipped binary instead.

use crate::registrar::{register_resolved, RegisterError};
use crate::registry::ReflectionRegistry;
use crate::resolve::ClassResolver;
use tracing::debug;

/// Construct the qualified holder class name for a numeric id.
pub fn holder_class_name(class_prefix: &str, id: u32) -> String {
    format!("{class_prefix}${id}")
}

/// Resolve and register every configured holder id.
///
/// Returns the number of holders that were not previously registered.
pub fn register_known_holders(
    resolver: &ClassResolver,
    registry: &mut ReflectionRegistry,
    class_prefix: &str,
    ids: &[u32],
) -> Result<usize, RegisterError> {
    let mut newly_registered = 0;
    for &id in ids {
        let name = holder_class_name(class_prefix, id);
        let resolved = resolver
            .resolve(&name)
            .map_err(|source| RegisterError::KnownClassMissing { name, id, source })?;
        if register_resolved(registry, &resolved)? {
            newly_registered += 1;
            debug!(class = %resolved.name, id = id, "registered known holder");
        }
    }
    Ok(newly_registered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use onda_meta::{ClassRecord, MethodRecord, ModuleMeta};

    #[test]
    fn test_holder_class_name() {
        assert_eq!(holder_class_name("onda.rt.ext", 1125), "onda.rt.ext$1125");
    }

    #[test]
    fn test_registers_present_holder() {
        let resolver = ClassResolver::from_modules(vec![ModuleMeta::new("onda.rt").with_class(
            ClassRecord::new("onda.rt.ext$1125")
                .with_constructor(0)
                .with_method(MethodRecord::new("invoke", 3)),
        )]);
        let mut registry = ReflectionRegistry::new();
        let count =
            register_known_holders(&resolver, &mut registry, "onda.rt.ext", &[1125]).unwrap();
        assert_eq!(count, 1);
        assert!(registry.contains("onda.rt.ext$1125"));
    }

    #[test]
    fn test_missing_holder_is_fatal_and_names_the_class() {
        let resolver = ClassResolver::from_modules(Vec::new());
        let mut registry = ReflectionRegistry::new();
        let err = register_known_holders(&resolver, &mut registry, "onda.rt.ext", &[1125])
            .unwrap_err();
        match err {
            RegisterError::KnownClassMissing { name, id, .. } => {
                assert_eq!(name, "onda.rt.ext$1125");
                assert_eq!(id, 1125);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reregistration_counts_nothing_new() {
        let resolver = ClassResolver::from_modules(vec![ModuleMeta::new("onda.rt")
            .with_class(ClassRecord::new("onda.rt.ext$1125").with_constructor(0))]);
        let mut registry = ReflectionRegistry::new();
        register_known_holders(&resolver, &mut registry, "onda.rt.ext", &[1125]).unwrap();
        let count =
            register_known_holders(&resolver, &mut registry, "onda.rt.ext", &[1125]).unwrap();
        assert_eq!(count, 0);
        assert_eq!(registry.len(), 1);
    }
}
