//! Metadata scanning over compiled module artifacts
//!
//! A scan walks the module path for `.onb` artifacts, decodes the reflection
//! metadata block of each one, and indexes the classes found under the
//! configured name prefixes. Only the artifact header and the metadata block
//! are ever read; the code section is skipped and no class is loaded or
//! linked (some discovered classes cannot be safely materialized at scan
//! time).
//!
//! Only requested [`MetadataKinds`] are indexed. `class_info` gates the
//! descriptor index itself; `annotation_info` and `method_info` refine it.
//! Omitting a kind silently removes the corresponding query capability:
//! scanning without `annotation_info` leaves every descriptor's annotation
//! set empty, so annotation-based rules select nothing. Callers must enable
//! the kinds their rules need.

use onda_meta::{ArtifactError, ArtifactHeader, MethodRecord, ModuleMeta, HEADER_LEN};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while setting up or executing a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// No scan prefixes configured
    #[error("No scan prefixes configured; refusing to index the entire module path")]
    NoPrefixes,

    /// Module path entry is not valid UTF-8 and cannot be matched
    #[error("Module path entry is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    /// I/O failure while reading an artifact
    #[error("Failed to read artifact {path}: {source}")]
    Io {
        /// Artifact path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Artifact failed header or metadata-block validation
    #[error("Invalid artifact {path}: {source}")]
    InvalidArtifact {
        /// Artifact path
        path: PathBuf,
        /// Underlying framing/decode error
        #[source]
        source: ArtifactError,
    },

    /// Invalid glob pattern built from a module path entry
    #[error("Invalid module path pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Filesystem error while walking a module path entry
    #[error("Failed to walk module path: {0}")]
    Walk(#[from] glob::GlobError),
}

/// One kind of metadata a scan can index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetadataKind {
    /// Class names and hierarchy (supertype and interface links)
    ClassInfo,
    /// Class-level annotations
    AnnotationInfo,
    /// Method signatures and method-level annotations
    MethodInfo,
}

/// The set of metadata kinds a scan indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetadataKinds {
    /// Index class names and hierarchy
    pub class_info: bool,
    /// Index class-level annotations
    pub annotation_info: bool,
    /// Index method signatures and their annotations
    pub method_info: bool,
}

impl MetadataKinds {
    /// No kinds enabled. A scan with this configuration indexes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// All kinds enabled.
    pub fn all() -> Self {
        Self {
            class_info: true,
            annotation_info: true,
            method_info: true,
        }
    }

    /// Enable class name and hierarchy indexing.
    pub fn with_class_info(mut self) -> Self {
        self.class_info = true;
        self
    }

    /// Enable class-level annotation indexing.
    pub fn with_annotation_info(mut self) -> Self {
        self.annotation_info = true;
        self
    }

    /// Enable method indexing.
    pub fn with_method_info(mut self) -> Self {
        self.method_info = true;
        self
    }

    /// Build from a configured list of kinds.
    pub fn from_list(kinds: &[MetadataKind]) -> Self {
        let mut result = Self::default();
        for kind in kinds {
            match kind {
                MetadataKind::ClassInfo => result.class_info = true,
                MetadataKind::AnnotationInfo => result.annotation_info = true,
                MetadataKind::MethodInfo => result.method_info = true,
            }
        }
        result
    }
}

/// Configuration for one scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Namespace prefixes to index (`acme.app` matches `acme.app.Greeter`
    /// and everything below `acme.app.`)
    pub prefixes: Vec<String>,
    /// Metadata kinds to index
    pub kinds: MetadataKinds,
}

impl ScanConfig {
    /// Create a scan configuration.
    pub fn new(prefixes: Vec<String>, kinds: MetadataKinds) -> Self {
        Self { prefixes, kinds }
    }

    fn accepts(&self, class_name: &str) -> bool {
        self.prefixes.iter().any(|p| name_under_prefix(class_name, p))
    }
}

/// Check whether a qualified class name falls under a namespace prefix.
pub fn name_under_prefix(name: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('.');
    if prefix.is_empty() {
        return false;
    }
    match name.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

/// Metadata observed for one class during a scan.
///
/// Descriptors are owned by their [`ScanSession`]; queries hand out borrowed
/// references, so a descriptor can never outlive the session that produced
/// it.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    /// Fully qualified class name
    pub name: String,
    /// Name of the defining module
    pub module: String,
    /// Direct supertype name, when recorded and `class_info` was requested
    pub super_name: Option<String>,
    /// Directly implemented interfaces (empty without `class_info`)
    pub interfaces: Vec<String>,
    /// Class-level annotations (empty without `annotation_info`)
    pub annotations: Vec<String>,
    /// Declared methods (empty without `method_info`)
    pub methods: Vec<MethodRecord>,
}

impl ClassDescriptor {
    /// Check whether the class carries the given annotation directly.
    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.annotations.iter().any(|a| a == annotation)
    }

    /// Check whether at least one declared method carries the annotation.
    pub fn has_method_annotation(&self, annotation: &str) -> bool {
        self.methods
            .iter()
            .any(|m| m.annotations.iter().any(|a| a == annotation))
    }
}

/// The result of one scan: an indexed, queryable set of class descriptors.
///
/// The session owns every descriptor and the buffers behind them. Dropping
/// the session releases them on every exit path, including unwinding, which
/// is what guarantees scan resources are never leaked when a selection rule
/// or registration step fails mid-pass.
pub struct ScanSession {
    descriptors: Vec<ClassDescriptor>,
    by_name: FxHashMap<String, usize>,
    kinds: MetadataKinds,
    modules_scanned: usize,
}

impl ScanSession {
    /// Number of indexed classes.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the scan indexed no classes.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Number of module metadata blocks the scan read.
    pub fn modules_scanned(&self) -> usize {
        self.modules_scanned
    }

    /// The metadata kinds this session indexed.
    pub fn kinds(&self) -> MetadataKinds {
        self.kinds
    }

    /// Iterate over all descriptors in name order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.descriptors.iter()
    }

    /// Look up a descriptor by qualified name.
    pub fn get(&self, name: &str) -> Option<&ClassDescriptor> {
        self.by_name.get(name).map(|&i| &self.descriptors[i])
    }

    /// Whether the session indexed the named class.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Check whether `class` implements `interface`, transitively through
    /// superclasses and super-interfaces.
    ///
    /// The walk follows names recorded in this session's descriptors; a name
    /// that was not indexed (outside the scanned prefixes, or stripped from
    /// the metadata) ends that branch of the walk.
    pub fn implements(&self, class: &str, interface: &str) -> bool {
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut stack: Vec<&str> = vec![class];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(desc) = self.get(current) else {
                continue;
            };
            for iface in &desc.interfaces {
                if iface == interface {
                    return true;
                }
                stack.push(iface);
            }
            if let Some(super_name) = &desc.super_name {
                stack.push(super_name);
            }
        }
        false
    }

    /// Check whether `class` is a transitive subclass of `base`.
    ///
    /// A class is not a subclass of itself. The walk ends at the first
    /// supertype name the session did not index.
    pub fn extends(&self, class: &str, base: &str) -> bool {
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut current = self.get(class).and_then(|d| d.super_name.as_deref());
        while let Some(name) = current {
            if name == base {
                return true;
            }
            if !visited.insert(name) {
                break;
            }
            current = self.get(name).and_then(|d| d.super_name.as_deref());
        }
        false
    }

    /// Release the session explicitly.
    ///
    /// Dropping the session has the same effect; this exists for call sites
    /// that want the release to be visible in the control flow.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        debug!(classes = self.descriptors.len(), "scan session released");
    }
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("classes", &self.descriptors.len())
            .field("modules_scanned", &self.modules_scanned)
            .field("kinds", &self.kinds)
            .finish()
    }
}

/// Scan the given module path directories for `.onb` artifacts and index
/// the classes found under the configured prefixes.
pub fn scan_path(paths: &[PathBuf], config: &ScanConfig) -> Result<ScanSession, ScanError> {
    if config.prefixes.is_empty() {
        return Err(ScanError::NoPrefixes);
    }
    let metas = load_module_path(paths)?;
    build_session(metas, config)
}

/// Index already-decoded module metadata. Used by embedding drivers that
/// hold modules in memory, and by tests.
pub fn scan_modules(metas: Vec<ModuleMeta>, config: &ScanConfig) -> Result<ScanSession, ScanError> {
    if config.prefixes.is_empty() {
        return Err(ScanError::NoPrefixes);
    }
    build_session(metas, config)
}

/// Read the metadata blocks of every `.onb` artifact under the given
/// directories. Artifacts without a reflection metadata block are skipped.
pub(crate) fn load_module_path(paths: &[PathBuf]) -> Result<Vec<ModuleMeta>, ScanError> {
    let mut metas = Vec::new();
    for dir in paths {
        let dir_str = dir
            .to_str()
            .ok_or_else(|| ScanError::NonUtf8Path(dir.clone()))?;
        let pattern = format!("{}/**/*.onb", glob::Pattern::escape(dir_str));
        for entry in glob::glob(&pattern)? {
            let path = entry?;
            match read_meta_block(&path)? {
                Some(meta) => {
                    debug!(
                        path = %path.display(),
                        module = %meta.module,
                        classes = meta.classes.len(),
                        "indexed module metadata"
                    );
                    metas.push(meta);
                }
                None => {
                    debug!(path = %path.display(), "artifact has no reflection metadata; skipped");
                }
            }
        }
    }
    Ok(metas)
}

/// Read the header and metadata block of one artifact. The code section is
/// never read from disk.
fn read_meta_block(path: &Path) -> Result<Option<ModuleMeta>, ScanError> {
    let io_err = |source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    };
    let artifact_err = |source| ScanError::InvalidArtifact {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let mut header_bytes = [0u8; HEADER_LEN];
    file.read_exact(&mut header_bytes).map_err(io_err)?;
    let header = ArtifactHeader::decode(&header_bytes).map_err(artifact_err)?;
    if !header.has_reflect_meta() {
        return Ok(None);
    }

    let mut block = vec![0u8; header.meta_len as usize];
    file.read_exact(&mut block).map_err(io_err)?;
    header.validate_block(&block).map_err(artifact_err)?;
    let meta = ModuleMeta::decode_block(&block)
        .map_err(|e| artifact_err(ArtifactError::Decode(e)))?;
    Ok(Some(meta))
}

fn build_session(metas: Vec<ModuleMeta>, config: &ScanConfig) -> Result<ScanSession, ScanError> {
    let kinds = config.kinds;
    let modules_scanned = metas.len();
    let mut descriptors: Vec<ClassDescriptor> = Vec::new();

    // Without class_info there is no descriptor index at all; the other
    // kinds only refine what class_info indexed.
    if kinds.class_info {
        for meta in metas {
            for record in meta.classes {
                if !config.accepts(&record.name) {
                    continue;
                }
                descriptors.push(ClassDescriptor {
                    name: record.name,
                    module: meta.module.clone(),
                    super_name: record.super_name,
                    interfaces: record.interfaces,
                    annotations: if kinds.annotation_info {
                        record.annotations
                    } else {
                        Vec::new()
                    },
                    methods: if kinds.method_info {
                        record.methods
                    } else {
                        Vec::new()
                    },
                });
            }
        }
    }

    descriptors.sort_by(|a, b| a.name.cmp(&b.name));
    descriptors.dedup_by(|a, b| {
        if a.name == b.name {
            debug!(class = %a.name, "duplicate class record across modules; keeping first");
            true
        } else {
            false
        }
    });

    let by_name = descriptors
        .iter()
        .enumerate()
        .map(|(i, d)| (d.name.clone(), i))
        .collect();

    debug!(
        classes = descriptors.len(),
        modules = modules_scanned,
        "metadata scan complete"
    );

    Ok(ScanSession {
        descriptors,
        by_name,
        kinds,
        modules_scanned,
    })
}
