//! Binary encoding and decoding primitives for the metadata block
//!
//! All integers are little-endian. Strings are a `u32` byte length followed
//! by UTF-8 bytes. Optional values are a `u8` presence tag followed by the
//! value when present.

use thiserror::Error;

/// Errors that can occur while decoding a metadata block.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Unexpected end of the block
    #[error("Unexpected end of metadata block at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid UTF-8 string
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Invalid presence tag for an optional value
    #[error("Invalid presence tag {0} at offset {1}")]
    InvalidTag(u8, usize),
}

/// Writer for assembling a metadata block.
pub struct MetaWriter {
    pub(crate) buffer: Vec<u8>,
}

impl MetaWriter {
    /// Create a new empty writer.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Get the current offset (length of the block so far).
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// Consume the writer and return the block bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Emit a raw byte.
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a 32-bit unsigned integer (little-endian).
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a boolean as a single byte.
    pub fn emit_bool(&mut self, value: bool) {
        self.emit_u8(value as u8);
    }

    /// Emit a length-prefixed UTF-8 string.
    pub fn emit_str(&mut self, value: &str) {
        self.emit_u32(value.len() as u32);
        self.buffer.extend_from_slice(value.as_bytes());
    }

    /// Emit an optional length-prefixed string with a presence tag.
    pub fn emit_opt_str(&mut self, value: Option<&str>) {
        match value {
            Some(s) => {
                self.emit_u8(1);
                self.emit_str(s);
            }
            None => self.emit_u8(0),
        }
    }

    /// Emit a list of strings, count-prefixed.
    pub fn emit_str_list(&mut self, values: &[String]) {
        self.emit_u32(values.len() as u32);
        for value in values {
            self.emit_str(value);
        }
    }
}

impl Default for MetaWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader for a metadata block.
pub struct MetaReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> MetaReader<'a> {
    /// Create a reader over the given block bytes.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Get the current position in the block.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Check if there are more bytes to read.
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        if self.position >= self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let value = self.buffer[self.position];
        self.position += 1;
        Ok(value)
    }

    /// Read a 32-bit unsigned integer (little-endian).
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        if self.position + 4 > self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let bytes = [
            self.buffer[self.position],
            self.buffer[self.position + 1],
            self.buffer[self.position + 2],
            self.buffer[self.position + 3],
        ];
        self.position += 4;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Read a boolean encoded as a single byte.
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> Result<String, DecodeError> {
        let start = self.position;
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(start))
    }

    /// Read an optional string with a presence tag.
    pub fn read_opt_str(&mut self) -> Result<Option<String>, DecodeError> {
        let start = self.position;
        match self.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.read_str()?)),
            tag => Err(DecodeError::InvalidTag(tag, start)),
        }
    }

    /// Read a count-prefixed list of strings.
    pub fn read_str_list(&mut self) -> Result<Vec<String>, DecodeError> {
        let count = self.read_u32()? as usize;
        let mut values = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            values.push(self.read_str()?);
        }
        Ok(values)
    }

    /// Read a fixed number of raw bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, DecodeError> {
        if self.position + count > self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let bytes = self.buffer[self.position..self.position + count].to_vec();
        self.position += count;
        Ok(bytes)
    }
}
