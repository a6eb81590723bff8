//! Module metadata block and `.onb` artifact framing
//!
//! A compiled Onda module (`.onb`) starts with a fixed-size header:
//!
//! - magic `ONDA` (4 bytes)
//! - format version (u32)
//! - module flags (u32)
//! - metadata block length (u32)
//! - metadata block CRC32 (u32)
//!
//! When [`flags::HAS_REFLECT_META`] is set, the reflection metadata block
//! follows the header immediately, then the code section. Readers that only
//! need metadata stop after `HEADER_LEN + meta_len` bytes; the code section
//! is never touched.

use crate::class::ClassRecord;
use crate::codec::{DecodeError, MetaReader, MetaWriter};
use thiserror::Error;

/// Magic number for Onda module artifacts: "ONDA"
pub const MAGIC: [u8; 4] = *b"ONDA";

/// Current artifact format version
pub const FORMAT_VERSION: u32 = 1;

/// Size of the fixed artifact header in bytes
pub const HEADER_LEN: usize = 20;

/// Module flags
pub mod flags {
    /// Module carries a reflection metadata block
    pub const HAS_REFLECT_META: u32 = 1 << 0;
    /// Module carries debug information
    pub const HAS_DEBUG_INFO: u32 = 1 << 1;
}

/// Artifact framing and metadata block errors
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Metadata block decode error
    #[error("Metadata decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected ONDA, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported format version
    #[error("Unsupported format version: {0} (current: {FORMAT_VERSION})")]
    UnsupportedVersion(u32),

    /// Metadata block checksum mismatch
    #[error("Metadata checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum recorded in the header
        expected: u32,
        /// Checksum of the bytes actually present
        actual: u32,
    },

    /// Artifact shorter than its framing claims
    #[error("Artifact truncated: have {actual} bytes, need {expected}")]
    Truncated {
        /// Bytes required by the header
        expected: usize,
        /// Bytes available
        actual: usize,
    },
}

/// Decoded artifact header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactHeader {
    /// Artifact format version
    pub version: u32,
    /// Module flags
    pub flags: u32,
    /// Length of the metadata block in bytes (0 when absent)
    pub meta_len: u32,
    /// CRC32 of the metadata block (0 when absent)
    pub meta_crc: u32,
}

impl ArtifactHeader {
    /// Decode a header from the first [`HEADER_LEN`] bytes of an artifact.
    pub fn decode(bytes: &[u8]) -> Result<Self, ArtifactError> {
        if bytes.len() < HEADER_LEN {
            return Err(ArtifactError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let magic: [u8; 4] = bytes[0..4].try_into().expect("slice length checked");
        if magic != MAGIC {
            return Err(ArtifactError::InvalidMagic(magic));
        }
        let version = u32::from_le_bytes(bytes[4..8].try_into().expect("slice length checked"));
        if version != FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(version));
        }
        let flags = u32::from_le_bytes(bytes[8..12].try_into().expect("slice length checked"));
        let meta_len = u32::from_le_bytes(bytes[12..16].try_into().expect("slice length checked"));
        let meta_crc = u32::from_le_bytes(bytes[16..20].try_into().expect("slice length checked"));
        Ok(Self {
            version,
            flags,
            meta_len,
            meta_crc,
        })
    }

    /// Encode the header into its fixed binary form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&MAGIC);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.flags.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.meta_len.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.meta_crc.to_le_bytes());
        bytes
    }

    /// Whether the artifact carries a reflection metadata block.
    pub fn has_reflect_meta(&self) -> bool {
        self.flags & flags::HAS_REFLECT_META != 0
    }

    /// Validate a metadata block against the length and checksum recorded in
    /// this header.
    pub fn validate_block(&self, block: &[u8]) -> Result<(), ArtifactError> {
        if block.len() != self.meta_len as usize {
            return Err(ArtifactError::Truncated {
                expected: self.meta_len as usize,
                actual: block.len(),
            });
        }
        let actual = crc32fast::hash(block);
        if actual != self.meta_crc {
            return Err(ArtifactError::ChecksumMismatch {
                expected: self.meta_crc,
                actual,
            });
        }
        Ok(())
    }
}

/// One module's reflection metadata block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleMeta {
    /// Module name (e.g. `acme.app`)
    pub module: String,
    /// Source file path, if recorded by the compiler
    pub source_file: Option<String>,
    /// Class records, in compiler emission order
    pub classes: Vec<ClassRecord>,
}

impl ModuleMeta {
    /// Create an empty metadata block for the given module name.
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            source_file: None,
            classes: Vec::new(),
        }
    }

    /// Add a class record.
    pub fn with_class(mut self, record: ClassRecord) -> Self {
        self.classes.push(record);
        self
    }

    /// Record the source file the module was compiled from.
    pub fn with_source_file(mut self, path: impl Into<String>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    /// Encode the metadata block to its binary form (block only, no header).
    pub fn encode_block(&self) -> Vec<u8> {
        let mut writer = MetaWriter::new();
        writer.emit_str(&self.module);
        writer.emit_opt_str(self.source_file.as_deref());
        writer.emit_u32(self.classes.len() as u32);
        for class in &self.classes {
            class.encode(&mut writer);
        }
        writer.into_bytes()
    }

    /// Decode a metadata block from its binary form.
    pub fn decode_block(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = MetaReader::new(bytes);
        let module = reader.read_str()?;
        let source_file = reader.read_opt_str()?;
        let class_count = reader.read_u32()? as usize;
        let mut classes = Vec::with_capacity(class_count.min(1024));
        for _ in 0..class_count {
            classes.push(ClassRecord::decode(&mut reader)?);
        }
        Ok(Self {
            module,
            source_file,
            classes,
        })
    }
}

/// Assemble a complete artifact from an optional metadata block and a code
/// section. The compiler uses this when emitting `.onb` files; tests use it
/// to build fixtures.
pub fn encode_artifact(meta: Option<&ModuleMeta>, code: &[u8]) -> Vec<u8> {
    let (block, header) = match meta {
        Some(meta) => {
            let block = meta.encode_block();
            let header = ArtifactHeader {
                version: FORMAT_VERSION,
                flags: flags::HAS_REFLECT_META,
                meta_len: block.len() as u32,
                meta_crc: crc32fast::hash(&block),
            };
            (block, header)
        }
        None => (
            Vec::new(),
            ArtifactHeader {
                version: FORMAT_VERSION,
                flags: 0,
                meta_len: 0,
                meta_crc: 0,
            },
        ),
    };

    let mut bytes = Vec::with_capacity(HEADER_LEN + block.len() + code.len());
    bytes.extend_from_slice(&header.encode());
    bytes.extend_from_slice(&block);
    bytes.extend_from_slice(code);
    bytes
}

/// Read the metadata block out of a complete artifact.
///
/// Returns `Ok(None)` for artifacts compiled without reflection metadata.
/// Bytes past the metadata block (the code section) are never inspected.
pub fn read_artifact_meta(bytes: &[u8]) -> Result<Option<ModuleMeta>, ArtifactError> {
    let header = ArtifactHeader::decode(bytes)?;
    if !header.has_reflect_meta() {
        return Ok(None);
    }
    let end = HEADER_LEN + header.meta_len as usize;
    if bytes.len() < end {
        return Err(ArtifactError::Truncated {
            expected: end,
            actual: bytes.len(),
        });
    }
    let block = &bytes[HEADER_LEN..end];
    header.validate_block(block)?;
    Ok(Some(ModuleMeta::decode_block(block)?))
}
