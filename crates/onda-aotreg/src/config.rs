//! Pass configuration
//!
//! Passes are configured explicitly, either from a TOML file or from the
//! built-in standard set. Nothing is discovered by scanning the build
//! classpath for registrar plugins; the pipeline runs exactly the passes
//! named here, in order.

use crate::rules::SelectionRule;
use crate::scan::MetadataKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker interface implemented by compiler-synthesized closure classes.
pub const CLOSURE_MARKER_INTERFACE: &str = "onda.rt.CompiledClosure";

/// Class annotation for value types with reflective accessors.
pub const IMMUTABLE_ANNOTATION: &str = "onda.meta.Immutable";

/// Class annotation marking CLI command classes.
pub const COMMAND_ANNOTATION: &str = "onda.cli.Command";

/// Method annotation on compiler-synthesized members.
pub const GENERATED_ANNOTATION: &str = "onda.meta.Generated";

/// Base class of generated runtime extension-method holders.
pub const HOLDER_BASE_CLASS: &str = "onda.rt.ExtMethod";

/// Name pattern of generated holder classes.
pub const HOLDER_NAME_PATTERN: &str = r"^onda\.rt\.ext\$[0-9]+$";

/// Namespace prefix of the runtime library.
pub const RUNTIME_PREFIX: &str = "onda.rt";

/// Qualified name prefix holder ids are appended to.
pub const HOLDER_CLASS_PREFIX: &str = "onda.rt.ext";

/// Holder ids known to be reached without a supertype link in their
/// metadata record. Revisit when the runtime regenerates its holders.
pub const DEFAULT_KNOWN_HOLDER_IDS: &[u32] = &[1125];

/// Errors while loading or compiling a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Configuration file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A subclass rule carries an invalid name pattern
    #[error("Invalid class name pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern text
        pattern: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },
}

/// Root configuration: the ordered pass list plus the optional known-holder
/// fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AotregConfig {
    /// Registration passes, run in order
    #[serde(default, rename = "pass")]
    pub passes: Vec<PassConfig>,
    /// Known-holder registration, run after all passes
    #[serde(default)]
    pub fallback: Option<FallbackConfig>,
}

impl AotregConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// The standard pass set for an application image: closure, immutable,
    /// and command classes under the application prefixes, synthesized
    /// methods under the same prefixes, and the runtime's generated
    /// extension-method holders. With no application prefixes only the
    /// runtime passes remain.
    pub fn standard(app_prefixes: &[String]) -> Self {
        let mut passes = Vec::new();
        if !app_prefixes.is_empty() {
            passes.push(PassConfig {
                name: "app-reflective-classes".to_string(),
                prefixes: app_prefixes.to_vec(),
                metadata: vec![MetadataKind::ClassInfo, MetadataKind::AnnotationInfo],
                rules: vec![
                    RuleConfig::ImplementsInterface {
                        interface: CLOSURE_MARKER_INTERFACE.to_string(),
                    },
                    RuleConfig::HasClassAnnotation {
                        annotation: IMMUTABLE_ANNOTATION.to_string(),
                    },
                    RuleConfig::HasClassAnnotation {
                        annotation: COMMAND_ANNOTATION.to_string(),
                    },
                ],
            });
            passes.push(PassConfig {
                name: "app-synthesized-methods".to_string(),
                prefixes: app_prefixes.to_vec(),
                metadata: vec![
                    MetadataKind::ClassInfo,
                    MetadataKind::AnnotationInfo,
                    MetadataKind::MethodInfo,
                ],
                rules: vec![RuleConfig::HasMethodAnnotation {
                    annotation: GENERATED_ANNOTATION.to_string(),
                }],
            });
        }
        passes.push(PassConfig {
            name: "runtime-method-holders".to_string(),
            prefixes: vec![RUNTIME_PREFIX.to_string()],
            metadata: vec![MetadataKind::ClassInfo],
            rules: vec![RuleConfig::SubclassMatching {
                base: HOLDER_BASE_CLASS.to_string(),
                pattern: HOLDER_NAME_PATTERN.to_string(),
            }],
        });
        Self {
            passes,
            fallback: Some(FallbackConfig::default()),
        }
    }
}

/// One registration pass: what to scan and which rules to apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassConfig {
    /// Pass name, used in logs and reports
    pub name: String,
    /// Namespace prefixes the scan indexes
    pub prefixes: Vec<String>,
    /// Metadata kinds the scan indexes
    #[serde(default = "default_metadata")]
    pub metadata: Vec<MetadataKind>,
    /// Selection rules; their union is registered
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleConfig>,
}

fn default_metadata() -> Vec<MetadataKind> {
    vec![MetadataKind::ClassInfo, MetadataKind::AnnotationInfo]
}

/// Configured form of a selection rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RuleConfig {
    /// Select classes implementing an interface
    ImplementsInterface {
        /// Qualified interface name
        interface: String,
    },
    /// Select classes carrying a class-level annotation
    HasClassAnnotation {
        /// Qualified annotation name
        annotation: String,
    },
    /// Select classes with an annotated method
    HasMethodAnnotation {
        /// Qualified annotation name
        annotation: String,
    },
    /// Select subclasses of a base whose name matches a pattern
    SubclassMatching {
        /// Qualified base class name
        base: String,
        /// Anchored pattern over the qualified class name
        pattern: String,
    },
}

impl RuleConfig {
    /// Compile into a runnable [`SelectionRule`]. Pattern errors surface
    /// here, at load time, not mid-pass.
    pub fn compile(&self) -> Result<SelectionRule, ConfigError> {
        Ok(match self {
            Self::ImplementsInterface { interface } => SelectionRule::ImplementsInterface {
                interface: interface.clone(),
            },
            Self::HasClassAnnotation { annotation } => SelectionRule::HasClassAnnotation {
                annotation: annotation.clone(),
            },
            Self::HasMethodAnnotation { annotation } => SelectionRule::HasMethodAnnotation {
                annotation: annotation.clone(),
            },
            Self::SubclassMatching { base, pattern } => SelectionRule::SubclassMatching {
                base: base.clone(),
                pattern: Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?,
            },
        })
    }
}

/// Known-holder registration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Prefix holder ids are appended to
    #[serde(default = "default_class_prefix")]
    pub class_prefix: String,
    /// Holder ids to register by name
    #[serde(default = "default_holder_ids")]
    pub ids: Vec<u32>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            class_prefix: default_class_prefix(),
            ids: default_holder_ids(),
        }
    }
}

fn default_class_prefix() -> String {
    HOLDER_CLASS_PREFIX.to_string()
}

fn default_holder_ids() -> Vec<u32> {
    DEFAULT_KNOWN_HOLDER_IDS.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_config_shape() {
        let config = AotregConfig::standard(&["acme.app".to_string()]);
        assert_eq!(config.passes.len(), 3);
        assert_eq!(config.passes[0].name, "app-reflective-classes");
        assert_eq!(config.passes[1].name, "app-synthesized-methods");
        assert_eq!(config.passes[2].name, "runtime-method-holders");
        let fallback = config.fallback.unwrap();
        assert_eq!(fallback.class_prefix, "onda.rt.ext");
        assert_eq!(fallback.ids, vec![1125]);
    }

    #[test]
    fn test_standard_config_without_app_prefixes() {
        let config = AotregConfig::standard(&[]);
        assert_eq!(config.passes.len(), 1);
        assert_eq!(config.passes[0].name, "runtime-method-holders");
    }

    #[test]
    fn test_parse_toml_config() {
        let text = r#"
            [[pass]]
            name = "closures"
            prefixes = ["acme.app"]
            metadata = ["class-info"]

            [[pass.rule]]
            kind = "implements-interface"
            interface = "onda.rt.CompiledClosure"

            [[pass.rule]]
            kind = "subclass-matching"
            base = "onda.rt.ExtMethod"
            pattern = "^onda\\.rt\\.ext\\$[0-9]+$"

            [fallback]
            ids = [1125, 88]
        "#;
        let config: AotregConfig = toml::from_str(text).unwrap();
        assert_eq!(config.passes.len(), 1);
        assert_eq!(config.passes[0].rules.len(), 2);
        assert_eq!(config.passes[0].metadata, vec![MetadataKind::ClassInfo]);
        let fallback = config.fallback.unwrap();
        assert_eq!(fallback.ids, vec![1125, 88]);
        // class_prefix falls back to the default.
        assert_eq!(fallback.class_prefix, "onda.rt.ext");
    }

    #[test]
    fn test_rule_compile_rejects_bad_pattern() {
        let rule = RuleConfig::SubclassMatching {
            base: "onda.rt.ExtMethod".to_string(),
            pattern: "[unclosed".to_string(),
        };
        assert!(matches!(
            rule.compile(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = AotregConfig::standard(&["acme.app".to_string()]);
        let text = toml::to_string(&config).unwrap();
        let back: AotregConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.passes.len(), config.passes.len());
        for (a, b) in back.passes.iter().zip(&config.passes) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.rules.len(), b.rules.len());
        }
    }
}
