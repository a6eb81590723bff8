//! The registration pipeline
//!
//! The pipeline runs an explicit, ordered list of registration passes
//! against one module path, sharing a single resolver and registry across
//! all of them. Each pass scans what it needs, applies its rules, and
//! registers the selection; the pipeline stops at the first failing pass
//! and reports which one failed.

use crate::config::{AotregConfig, ConfigError};
use crate::fallback::{holder_class_name, register_known_holders};
use crate::registrar::{register_descriptors, RegisterError};
use crate::registry::ReflectionRegistry;
use crate::resolve::ClassResolver;
use crate::rules::{select_union, SelectionRule};
use crate::scan::{scan_path, MetadataKinds, ScanConfig, ScanError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Errors from one registration pass.
#[derive(Debug, Error)]
pub enum PassError {
    /// The pass's metadata scan failed
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    /// Registration of the pass's selection failed
    #[error("{0}")]
    Register(#[from] RegisterError),
}

/// A pipeline failure, naming the pass that caused it.
#[derive(Debug, Error)]
#[error("Registration pass '{pass}' failed: {source}")]
pub struct PipelineError {
    /// Name of the failing pass
    pub pass: String,
    /// The pass's error
    #[source]
    pub source: PassError,
}

/// Shared state a pass runs against.
pub struct PassContext<'a> {
    /// Module path directories to scan
    pub module_path: &'a [PathBuf],
    /// Resolver over the full module path
    pub resolver: &'a ClassResolver,
    /// Registry accumulating registrations
    pub registry: &'a mut ReflectionRegistry,
}

/// One registration pass.
pub trait RegistrationPass {
    /// Pass name used in logs, reports, and errors.
    fn name(&self) -> &str;

    /// Run the pass against the shared context.
    fn run(&self, cx: &mut PassContext<'_>) -> Result<PassReport, PassError>;
}

/// What one pass did.
#[derive(Debug, Clone)]
pub struct PassReport {
    /// Pass name
    pub pass: String,
    /// Classes the pass selected
    pub matched: usize,
    /// Classes not previously registered
    pub registered: usize,
    /// Selected class names, sorted
    pub classes: Vec<String>,
}

/// A scan-select-register pass.
pub struct ScanPass {
    name: String,
    config: ScanConfig,
    rules: Vec<SelectionRule>,
}

impl ScanPass {
    /// Create a pass that scans with `config` and registers the union of
    /// `rules`.
    pub fn new(name: impl Into<String>, config: ScanConfig, rules: Vec<SelectionRule>) -> Self {
        Self {
            name: name.into(),
            config,
            rules,
        }
    }
}

impl RegistrationPass for ScanPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, cx: &mut PassContext<'_>) -> Result<PassReport, PassError> {
        let session = scan_path(cx.module_path, &self.config)?;
        let selected = select_union(&self.rules, &session);
        let mut classes: Vec<String> = selected.iter().map(|d| d.name.clone()).collect();
        let registered = register_descriptors(cx.resolver, cx.registry, &selected)?;
        classes.sort();
        Ok(PassReport {
            pass: self.name.clone(),
            matched: classes.len(),
            registered,
            classes,
        })
        // The scan session is released here, on success and on error alike.
    }
}

/// A pass registering configured holder ids by constructed name.
pub struct KnownHoldersPass {
    name: String,
    class_prefix: String,
    ids: Vec<u32>,
}

impl KnownHoldersPass {
    /// Create a pass registering `ids` under `class_prefix`.
    pub fn new(name: impl Into<String>, class_prefix: impl Into<String>, ids: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            class_prefix: class_prefix.into(),
            ids,
        }
    }
}

impl RegistrationPass for KnownHoldersPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, cx: &mut PassContext<'_>) -> Result<PassReport, PassError> {
        let registered =
            register_known_holders(cx.resolver, cx.registry, &self.class_prefix, &self.ids)?;
        let mut classes: Vec<String> = self
            .ids
            .iter()
            .map(|&id| holder_class_name(&self.class_prefix, id))
            .collect();
        classes.sort();
        Ok(PassReport {
            pass: self.name.clone(),
            matched: classes.len(),
            registered,
            classes,
        })
    }
}

/// An ordered list of registration passes.
#[derive(Default)]
pub struct Pipeline {
    passes: Vec<Box<dyn RegistrationPass>>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether the pipeline has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Append a pass.
    pub fn push_pass(&mut self, pass: Box<dyn RegistrationPass>) {
        self.passes.push(pass);
    }

    /// Append a pass, builder style.
    pub fn with_pass(mut self, pass: Box<dyn RegistrationPass>) -> Self {
        self.passes.push(pass);
        self
    }

    /// Build a pipeline from a configuration. Scan passes come first in
    /// config order, then the known-holder pass when configured.
    pub fn from_config(config: &AotregConfig) -> Result<Self, ConfigError> {
        let mut pipeline = Self::new();
        for pass_config in &config.passes {
            let rules = pass_config
                .rules
                .iter()
                .map(|r| r.compile())
                .collect::<Result<Vec<_>, _>>()?;
            let scan_config = ScanConfig::new(
                pass_config.prefixes.clone(),
                MetadataKinds::from_list(&pass_config.metadata),
            );
            pipeline.push_pass(Box::new(ScanPass::new(
                pass_config.name.clone(),
                scan_config,
                rules,
            )));
        }
        if let Some(fallback) = &config.fallback {
            pipeline.push_pass(Box::new(KnownHoldersPass::new(
                "known-holders",
                fallback.class_prefix.clone(),
                fallback.ids.clone(),
            )));
        }
        Ok(pipeline)
    }

    /// Run every pass in order. Consumes the pipeline; a pass list runs at
    /// most once against a registry.
    pub fn run(
        self,
        module_path: &[PathBuf],
        resolver: &ClassResolver,
        registry: &mut ReflectionRegistry,
    ) -> Result<PipelineReport, PipelineError> {
        let mut reports = Vec::with_capacity(self.passes.len());
        for pass in &self.passes {
            info!(pass = pass.name(), "running registration pass");
            let mut cx = PassContext {
                module_path,
                resolver,
                registry,
            };
            let report = pass.run(&mut cx).map_err(|source| PipelineError {
                pass: pass.name().to_string(),
                source,
            })?;
            info!(
                pass = %report.pass,
                matched = report.matched,
                registered = report.registered,
                "registration pass complete"
            );
            reports.push(report);
        }
        Ok(PipelineReport { passes: reports })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("passes", &self.passes.len())
            .finish()
    }
}

/// Reports from every pass of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Per-pass reports in run order
    pub passes: Vec<PassReport>,
}

impl PipelineReport {
    /// Total classes selected across passes. Overlapping selections count
    /// once per pass here; the registry itself stays deduplicated.
    pub fn total_matched(&self) -> usize {
        self.passes.iter().map(|p| p.matched).sum()
    }

    /// Total classes newly registered across passes.
    pub fn total_registered(&self) -> usize {
        self.passes.iter().map(|p| p.registered).sum()
    }
}
