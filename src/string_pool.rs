use crate::{AxmlError, ByteCursor, CHUNK_HEADER_SIZE, ChunkHeader, Result, STRING_FLAG_UTF8};
use log::trace;
use std::collections::HashMap;

/// Raw string bytes a pool may decode, as a multiple of its chunk size
const DECODE_BUDGET_FACTOR: usize = 2;

/// Decoded string pool chunk
///
/// Entries that could not be decoded are kept as `None` so the indices of
/// every other string stay valid. Entries sharing an offset share one
/// decoded value.
#[derive(Debug, Clone, Default)]
pub struct StringPool {
    entries: Vec<Option<usize>>,
    values: Vec<String>,
    utf8: bool,
}

impl StringPool {
    /// Parse the string pool chunk described by `header`
    ///
    /// Fails only when the pool header or offset table does not fit in the
    /// chunk; a single unreadable string is stored as an absent entry. Each
    /// distinct offset is decoded once, and decoding stops contributing
    /// entries once the raw bytes read exceed a budget proportional to the
    /// chunk, so overlapping offset tables cost linear time and memory.
    pub fn parse(input: &ByteCursor<'_>, header: &ChunkHeader) -> Result<Self> {
        let chunk = ByteCursor::new(input.slice(header.start, header.chunk_size as usize)?);

        let mut fields = chunk.clone();
        fields.seek(CHUNK_HEADER_SIZE)?;
        let string_count = fields.read_u32_le()? as usize;
        let _style_count = fields.read_u32_le()?;
        let flags = fields.read_u32_le()?;
        let strings_start = fields.read_u32_le()? as usize;
        let _styles_start = fields.read_u32_le()?;

        fields.seek((header.header_size as usize).max(fields.position()))?;
        let table_len = string_count
            .checked_mul(4)
            .ok_or(AxmlError::OutOfBounds {
                offset: fields.position(),
                requested: usize::MAX,
                len: chunk.len(),
            })?;
        let offsets = fields.read_bytes(table_len)?;

        let utf8 = flags & STRING_FLAG_UTF8 != 0;
        let mut pool = Self {
            entries: Vec::with_capacity(string_count),
            values: Vec::new(),
            utf8,
        };
        let mut decoded: HashMap<usize, Option<usize>> = HashMap::new();
        let mut budget = chunk.len().saturating_mul(DECODE_BUDGET_FACTOR);

        for (index, raw) in offsets.chunks_exact(4).enumerate() {
            let offset = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
            let entry = *decoded.entry(offset).or_insert_with(|| {
                pool.decode_at(&chunk, strings_start, offset, &mut budget)
                    .map_err(|err| trace!("string pool entry {index} unreadable: {err}"))
                    .ok()
            });
            pool.entries.push(entry);
        }

        Ok(pool)
    }

    /// Decode the string at `offset` into `values`, returning its slot
    fn decode_at(
        &mut self,
        chunk: &ByteCursor<'_>,
        strings_start: usize,
        offset: usize,
        budget: &mut usize,
    ) -> Result<usize> {
        let at = strings_start.checked_add(offset).ok_or(AxmlError::OutOfBounds {
            offset: strings_start,
            requested: offset,
            len: chunk.len(),
        })?;
        let bytes = if self.utf8 {
            utf8_string_bytes(chunk, at)?
        } else {
            utf16_string_bytes(chunk, at)?
        };
        if bytes.len() > *budget {
            return Err(AxmlError::OutOfBounds {
                offset: at,
                requested: bytes.len(),
                len: *budget,
            });
        }
        *budget -= bytes.len();

        let value = if self.utf8 {
            String::from_utf8_lossy(bytes).into_owned()
        } else {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        };
        self.values.push(value);
        Ok(self.values.len() - 1)
    }

    /// Look up a string by index
    pub fn get(&self, index: u32) -> Result<&str> {
        self.entries
            .get(index as usize)
            .copied()
            .flatten()
            .and_then(|slot| self.values.get(slot))
            .map(String::as_str)
            .ok_or(AxmlError::InvalidStringIndex(index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_utf8(&self) -> bool {
        self.utf8
    }

    /// Bytes held by the decoded strings
    pub fn decoded_len(&self) -> usize {
        self.values.iter().map(String::len).sum()
    }

    /// Iterate over the pool in index order
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.entries
            .iter()
            .map(|entry| entry.and_then(|slot| self.values.get(slot)).map(String::as_str))
    }
}

fn utf8_string_bytes<'a>(chunk: &ByteCursor<'a>, offset: usize) -> Result<&'a [u8]> {
    let mut cursor = chunk.clone();
    cursor.seek(offset)?;
    let _char_len = read_utf8_length(&mut cursor)?;
    let byte_len = read_utf8_length(&mut cursor)?;
    cursor.read_bytes(byte_len)
}

fn utf16_string_bytes<'a>(chunk: &ByteCursor<'a>, offset: usize) -> Result<&'a [u8]> {
    let mut cursor = chunk.clone();
    cursor.seek(offset)?;
    let char_count = read_utf16_length(&mut cursor)?;
    let byte_len = char_count.checked_mul(2).ok_or(AxmlError::OutOfBounds {
        offset,
        requested: usize::MAX,
        len: chunk.len(),
    })?;
    cursor.read_bytes(byte_len)
}

/// One or two bytes; the high bit of the first marks a 15-bit length
fn read_utf8_length(cursor: &mut ByteCursor<'_>) -> Result<usize> {
    let first = cursor.read_u8()? as usize;
    if first & 0x80 == 0 {
        return Ok(first);
    }
    let second = cursor.read_u8()? as usize;
    Ok(((first & 0x7F) << 8) | second)
}

/// One or two 16-bit words; the high bit of the first marks a 31-bit length
fn read_utf16_length(cursor: &mut ByteCursor<'_>) -> Result<usize> {
    let first = cursor.read_u16_le()? as usize;
    if first & 0x8000 == 0 {
        return Ok(first);
    }
    let second = cursor.read_u16_le()? as usize;
    Ok(((first & 0x7FFF) << 16) | second)
}
