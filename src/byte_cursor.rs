use crate::{AxmlError, Result};

/// Bounds-checked reader over an in-memory byte buffer
///
/// A failed read returns [`AxmlError::OutOfBounds`] and leaves the position
/// untouched, so callers can probe and recover.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a new cursor positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Get current position in the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes between the position and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    /// Read a 16-bit unsigned integer (little-endian)
    pub fn read_u16_le(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a 32-bit unsigned integer (little-endian)
    pub fn read_u32_le(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read `n` bytes and advance past them
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self.slice(self.pos, n)?;
        self.pos += n;
        Ok(bytes)
    }

    /// Borrow `len` bytes starting at absolute `offset` without moving
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(AxmlError::OutOfBounds {
                offset,
                requested: len,
                len: self.data.len(),
            })?;
        Ok(&self.data[offset..end])
    }

    /// Seek to an absolute position; the end of the buffer is a valid target
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(AxmlError::OutOfBounds {
                offset,
                requested: 0,
                len: self.data.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Check if we've reached the end of the buffer
    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }
}
