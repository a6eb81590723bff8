//! Selection rules over scanned class descriptors
//!
//! A rule picks classes out of a [`ScanSession`] by a structural property:
//! an implemented interface, a class or method annotation, or a base class
//! combined with a name pattern. Rules are pure queries; registration is a
//! separate step so the same selection can feed a preview or a registry.

use crate::scan::{ClassDescriptor, ScanSession};
use regex::Regex;
use rustc_hash::FxHashSet;
use std::fmt;

/// A structural predicate selecting classes from a scan session.
#[derive(Debug, Clone)]
pub enum SelectionRule {
    /// Classes that implement the interface, directly or transitively.
    ImplementsInterface {
        /// Qualified interface name
        interface: String,
    },
    /// Classes carrying the annotation directly on the class.
    HasClassAnnotation {
        /// Qualified annotation name
        annotation: String,
    },
    /// Classes with at least one method carrying the annotation.
    HasMethodAnnotation {
        /// Qualified annotation name
        annotation: String,
    },
    /// Transitive subclasses of `base` whose qualified name matches
    /// `pattern`. Both conditions must hold; the pattern keeps synthetic
    /// families apart from hand-written subclasses of the same base.
    SubclassMatching {
        /// Qualified base class name (never selected itself)
        base: String,
        /// Anchored pattern over the qualified class name
        pattern: Regex,
    },
}

impl SelectionRule {
    /// Check whether one descriptor satisfies this rule within the session
    /// it came from.
    pub fn matches(&self, desc: &ClassDescriptor, session: &ScanSession) -> bool {
        match self {
            Self::ImplementsInterface { interface } => session.implements(&desc.name, interface),
            Self::HasClassAnnotation { annotation } => desc.has_annotation(annotation),
            Self::HasMethodAnnotation { annotation } => desc.has_method_annotation(annotation),
            Self::SubclassMatching { base, pattern } => {
                pattern.is_match(&desc.name) && session.extends(&desc.name, base)
            }
        }
    }

    /// Select every descriptor in the session satisfying this rule, in
    /// session (name) order.
    pub fn select<'s>(&self, session: &'s ScanSession) -> Vec<&'s ClassDescriptor> {
        session
            .classes()
            .filter(|desc| self.matches(desc, session))
            .collect()
    }
}

impl fmt::Display for SelectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImplementsInterface { interface } => {
                write!(f, "implements {interface}")
            }
            Self::HasClassAnnotation { annotation } => {
                write!(f, "annotated @{annotation}")
            }
            Self::HasMethodAnnotation { annotation } => {
                write!(f, "has method annotated @{annotation}")
            }
            Self::SubclassMatching { base, pattern } => {
                write!(f, "subclass of {base} matching {pattern}")
            }
        }
    }
}

/// Select the union of several rules over one session, deduplicated by
/// class name. A class selected by more than one rule appears once, at the
/// position of its first selection.
pub fn select_union<'s>(
    rules: &[SelectionRule],
    session: &'s ScanSession,
) -> Vec<&'s ClassDescriptor> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut selected = Vec::new();
    for rule in rules {
        for desc in rule.select(session) {
            if seen.insert(desc.name.as_str()) {
                selected.push(desc);
            }
        }
    }
    selected
}
