//! Class metadata records
//!
//! One [`ClassRecord`] describes everything reflection can observe about a
//! compiled class: its qualified name, supertype, implemented interfaces,
//! annotations, constructors, and methods. Annotation references are stored
//! as qualified names only; argument payloads live in the constant pool and
//! are not part of the reflection block.

use crate::codec::{DecodeError, MetaReader, MetaWriter};
use serde::{Deserialize, Serialize};

/// Reflection metadata for a single compiled class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    /// Fully qualified class name (e.g. `acme.app.Greeter`).
    pub name: String,

    /// Qualified name of the direct supertype, if the compiler recorded one.
    ///
    /// Bootstrap-templated runtime classes are emitted without a supertype
    /// link; for those this is `None` even though a supertype exists at
    /// runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_name: Option<String>,

    /// Qualified names of directly implemented interfaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,

    /// Qualified names of annotations placed directly on the class.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<String>,

    /// Declared constructors, one record per accepted arity.
    ///
    /// The compiler synthesizes one entry per default-argument arity, so a
    /// class with `init(a, b = 1)` carries records for arity 1 and arity 2.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constructors: Vec<ConstructorRecord>,

    /// Declared methods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodRecord>,
}

/// Constructor metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorRecord {
    /// Number of parameters this constructor accepts.
    pub param_count: u32,
}

/// Method metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRecord {
    /// Method name (unique within a class; Onda has no overloads).
    pub name: String,

    /// Number of declared parameters.
    pub param_count: u32,

    /// Whether the method is static.
    #[serde(default)]
    pub is_static: bool,

    /// Qualified names of annotations placed on the method.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<String>,
}

impl ClassRecord {
    /// Create an empty record for the given qualified name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Set the supertype name.
    pub fn with_super(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    /// Add a directly implemented interface.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Add a class-level annotation.
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    /// Add a constructor record.
    pub fn with_constructor(mut self, param_count: u32) -> Self {
        self.constructors.push(ConstructorRecord { param_count });
        self
    }

    /// Add a method record.
    pub fn with_method(mut self, method: MethodRecord) -> Self {
        self.methods.push(method);
        self
    }

    /// Check whether the class directly declares the given interface.
    pub fn declares_interface(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }

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

impl ClassRecord {
    /// Encode the record into a metadata block.
    pub(crate) fn encode(&self, writer: &mut MetaWriter) {
        writer.emit_str(&self.name);
        writer.emit_opt_str(self.super_name.as_deref());
        writer.emit_str_list(&self.interfaces);
        writer.emit_str_list(&self.annotations);
        writer.emit_u32(self.constructors.len() as u32);
        for ctor in &self.constructors {
            writer.emit_u32(ctor.param_count);
        }
        writer.emit_u32(self.methods.len() as u32);
        for method in &self.methods {
            method.encode(writer);
        }
    }

    /// Decode a record from a metadata block.
    pub(crate) fn decode(reader: &mut MetaReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_str()?;
        let super_name = reader.read_opt_str()?;
        let interfaces = reader.read_str_list()?;
        let annotations = reader.read_str_list()?;

        let ctor_count = reader.read_u32()? as usize;
        let mut constructors = Vec::with_capacity(ctor_count.min(1024));
        for _ in 0..ctor_count {
            constructors.push(ConstructorRecord {
                param_count: reader.read_u32()?,
            });
        }

        let method_count = reader.read_u32()? as usize;
        let mut methods = Vec::with_capacity(method_count.min(1024));
        for _ in 0..method_count {
            methods.push(MethodRecord::decode(reader)?);
        }

        Ok(Self {
            name,
            super_name,
            interfaces,
            annotations,
            constructors,
            methods,
        })
    }
}

impl MethodRecord {
    /// Create a method record with no annotations.
    pub fn new(name: impl Into<String>, param_count: u32) -> Self {
        Self {
            name: name.into(),
            param_count,
            is_static: false,
            annotations: Vec::new(),
        }
    }

    /// Mark the method as static.
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Add a method-level annotation.
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    fn encode(&self, writer: &mut MetaWriter) {
        writer.emit_str(&self.name);
        writer.emit_u32(self.param_count);
        writer.emit_bool(self.is_static);
        writer.emit_str_list(&self.annotations);
    }

    fn decode(reader: &mut MetaReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: reader.read_str()?,
            param_count: reader.read_u32()?,
            is_static: reader.read_bool()?,
            annotations: reader.read_str_list()?,
        })
    }
}
