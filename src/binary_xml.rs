use crate::{AXML_MAGIC, AxmlError, ByteCursor, CHUNK_HEADER_SIZE, NO_ENTRY_INDEX, Result, StringPool};
use crate::{RES_STRING_POOL_TYPE, RES_XML_RESOURCE_MAP_TYPE, RES_XML_TYPE};
use crate::{RES_XML_CDATA_TYPE, RES_XML_END_ELEMENT_TYPE, RES_XML_START_ELEMENT_TYPE};
use crate::{RES_XML_END_NAMESPACE_TYPE, RES_XML_START_NAMESPACE_TYPE};
use crate::{TYPE_ATTRIBUTE, TYPE_DYNAMIC_REFERENCE, TYPE_FLOAT, TYPE_NULL, TYPE_REFERENCE, TYPE_STRING};
use crate::{TYPE_INT_BOOLEAN, TYPE_INT_DEC, TYPE_INT_HEX};
use log::trace;

/// Minimum stride of one attribute record inside a start-element chunk
const ATTRIBUTE_SIZE: usize = 20;

/// Check if a buffer starts with the AXML document header
pub fn is_axml(data: &[u8]) -> bool {
    data.starts_with(&AXML_MAGIC)
}

/// Common prefix of every AXML chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_type: u16,
    pub header_size: u16,
    pub chunk_size: u32,
    /// Absolute offset of the chunk in the document
    pub start: usize,
}

impl ChunkHeader {
    /// Read a chunk header at the cursor position and validate it against `limit`
    ///
    /// On success the cursor sits just past the 8 common header bytes.
    pub fn read(cursor: &mut ByteCursor<'_>, limit: usize) -> Result<Self> {
        let start = cursor.position();
        let bytes = cursor.slice(start, CHUNK_HEADER_SIZE)?;
        let header = Self {
            chunk_type: u16::from_le_bytes([bytes[0], bytes[1]]),
            header_size: u16::from_le_bytes([bytes[2], bytes[3]]),
            chunk_size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            start,
        };

        let fits = (header.header_size as usize) >= CHUNK_HEADER_SIZE
            && header.header_size as u32 <= header.chunk_size
            && start
                .checked_add(header.chunk_size as usize)
                .is_some_and(|end| end <= limit);
        if !fits {
            return Err(AxmlError::InvalidChunk {
                offset: start,
                chunk_type: header.chunk_type,
                header_size: header.header_size,
                chunk_size: header.chunk_size,
            });
        }

        cursor.seek(start + CHUNK_HEADER_SIZE)?;
        Ok(header)
    }

    pub fn end(&self) -> usize {
        self.start + self.chunk_size as usize
    }

    /// Offset where the chunk's body (or first child) begins
    pub fn body_start(&self) -> usize {
        self.start + self.header_size as usize
    }

    /// A cursor confined to this chunk, positioned at its extension data
    fn extension<'a>(&self, input: &ByteCursor<'a>) -> Result<ByteCursor<'a>> {
        let mut ext = ByteCursor::new(input.slice(self.start, self.chunk_size as usize)?);
        ext.seek(self.header_size as usize)?;
        Ok(ext)
    }
}

/// Typed attribute value, mirroring Android's `Res_value` data types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeValue {
    StringRef(u32),
    Reference(u32),
    IntDecimal(i32),
    IntBoolean(bool),
    IntHex(u32),
    Float(f32),
    Null,
}

impl AttributeValue {
    pub fn decode(data_type: u8, data: u32) -> Self {
        match data_type {
            TYPE_NULL => AttributeValue::Null,
            TYPE_REFERENCE | TYPE_ATTRIBUTE | TYPE_DYNAMIC_REFERENCE => AttributeValue::Reference(data),
            TYPE_STRING => AttributeValue::StringRef(data),
            TYPE_FLOAT => AttributeValue::Float(f32::from_bits(data)),
            TYPE_INT_DEC => AttributeValue::IntDecimal(data as i32),
            TYPE_INT_HEX => AttributeValue::IntHex(data),
            TYPE_INT_BOOLEAN => AttributeValue::IntBoolean(data != 0),
            // dimensions, fractions and colors keep their raw data word
            _ => AttributeValue::IntHex(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub namespace: Option<u32>,
    pub name: u32,
    pub raw_value: Option<u32>,
    pub value: AttributeValue,
}

impl Attribute {
    fn read(ext: &mut ByteCursor<'_>) -> Result<Self> {
        let namespace = string_ref(ext.read_u32_le()?);
        let name = ext.read_u32_le()?;
        let raw_value = string_ref(ext.read_u32_le()?);
        let _size = ext.read_u16_le()?;
        let _res0 = ext.read_u8()?;
        let data_type = ext.read_u8()?;
        let data = ext.read_u32_le()?;

        Ok(Self {
            namespace,
            name,
            raw_value,
            value: AttributeValue::decode(data_type, data),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartElement {
    pub namespace: Option<u32>,
    pub name: u32,
    pub attributes: Vec<Attribute>,
}

/// A decoded body chunk; string fields are indices into the document's pool
#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent {
    NamespaceStart { prefix: Option<u32>, uri: Option<u32> },
    NamespaceEnd { prefix: Option<u32>, uri: Option<u32> },
    ElementStart(StartElement),
    ElementEnd { namespace: Option<u32>, name: u32 },
    CData { data: Option<u32> },
}

/// Result of a successful strict decode
#[derive(Debug, Clone)]
pub struct AxmlDocument {
    pub pool: StringPool,
    pub resource_map: Vec<u32>,
    pub events: Vec<XmlEvent>,
}

impl AxmlDocument {
    /// Strictly decode an AXML buffer
    pub fn decode(data: &[u8]) -> Result<Self> {
        ChunkWalker::new(data).walk()
    }

    /// Look up a pool string; out-of-range or corrupt entries resolve to `None`
    pub fn string(&self, index: u32) -> Option<&str> {
        self.pool.get(index).ok()
    }

    pub fn element_name(&self, element: &StartElement) -> Option<&str> {
        self.string(element.name)
    }

    pub fn attribute_name(&self, attribute: &Attribute) -> Option<&str> {
        self.string(attribute.name)
    }

    /// Framework resource id of an attribute name, via the resource map
    pub fn attribute_resource_id(&self, attribute: &Attribute) -> Option<u32> {
        self.resource_map.get(attribute.name as usize).copied()
    }

    /// Literal string value of an attribute: the raw value, then a typed string
    pub fn attribute_string(&self, attribute: &Attribute) -> Option<&str> {
        attribute
            .raw_value
            .and_then(|index| self.string(index))
            .or_else(|| match attribute.value {
                AttributeValue::StringRef(index) => self.string(index),
                _ => None,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    ExpectXmlHeader,
    ExpectStringPool,
    ScanningBody,
    Done,
}

/// Walks the chunk sequence of an AXML buffer
pub struct ChunkWalker<'a> {
    input: ByteCursor<'a>,
    state: WalkState,
    document_end: usize,
    pool: Option<StringPool>,
    resource_map: Vec<u32>,
    events: Vec<XmlEvent>,
}

impl<'a> ChunkWalker<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            input: ByteCursor::new(data),
            state: WalkState::ExpectXmlHeader,
            document_end: data.len(),
            pool: None,
            resource_map: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Walk every chunk; any structural problem becomes `StrictDecodeFailed`
    pub fn walk(mut self) -> Result<AxmlDocument> {
        while self.state != WalkState::Done {
            self.step().map_err(|err| match err {
                AxmlError::StrictDecodeFailed(_) => err,
                other => AxmlError::StrictDecodeFailed(other.to_string()),
            })?;
        }

        let pool = self
            .pool
            .ok_or_else(|| AxmlError::StrictDecodeFailed("missing string pool".to_string()))?;
        Ok(AxmlDocument {
            pool,
            resource_map: self.resource_map,
            events: self.events,
        })
    }

    fn step(&mut self) -> Result<()> {
        match self.state {
            WalkState::ExpectXmlHeader => {
                let limit = self.input.len();
                let header = ChunkHeader::read(&mut self.input, limit)?;
                if header.chunk_type != RES_XML_TYPE {
                    return Err(AxmlError::StrictDecodeFailed(format!(
                        "expected XML header chunk, found type 0x{:04X}",
                        header.chunk_type
                    )));
                }
                self.document_end = header.end();
                self.input.seek(header.body_start())?;
                self.state = WalkState::ExpectStringPool;
            }

            WalkState::ExpectStringPool => {
                let header = ChunkHeader::read(&mut self.input, self.document_end)?;
                if header.chunk_type != RES_STRING_POOL_TYPE {
                    return Err(AxmlError::StrictDecodeFailed(format!(
                        "expected string pool chunk, found type 0x{:04X}",
                        header.chunk_type
                    )));
                }
                self.pool = Some(StringPool::parse(&self.input, &header)?);
                self.input.seek(header.end())?;
                self.state = WalkState::ScanningBody;
            }

            WalkState::ScanningBody => {
                // trailing padding shorter than a header ends the document
                if self.document_end - self.input.position() < CHUNK_HEADER_SIZE {
                    self.state = WalkState::Done;
                    return Ok(());
                }
                let header = ChunkHeader::read(&mut self.input, self.document_end)?;
                self.process_chunk(&header)?;
                self.input.seek(header.end())?;
            }

            WalkState::Done => {}
        }
        Ok(())
    }

    /// Process a single body chunk
    fn process_chunk(&mut self, header: &ChunkHeader) -> Result<()> {
        match header.chunk_type {
            RES_XML_RESOURCE_MAP_TYPE => {
                let body = self
                    .input
                    .slice(header.body_start(), header.end() - header.body_start())?;
                self.resource_map.extend(
                    body.chunks_exact(4)
                        .map(|id| u32::from_le_bytes([id[0], id[1], id[2], id[3]])),
                );
            }

            RES_XML_START_NAMESPACE_TYPE | RES_XML_END_NAMESPACE_TYPE => {
                let mut ext = header.extension(&self.input)?;
                let prefix = string_ref(ext.read_u32_le()?);
                let uri = string_ref(ext.read_u32_le()?);
                self.events.push(if header.chunk_type == RES_XML_START_NAMESPACE_TYPE {
                    XmlEvent::NamespaceStart { prefix, uri }
                } else {
                    XmlEvent::NamespaceEnd { prefix, uri }
                });
            }

            RES_XML_START_ELEMENT_TYPE => {
                let element = self.read_start_element(header)?;
                self.events.push(XmlEvent::ElementStart(element));
            }

            RES_XML_END_ELEMENT_TYPE => {
                let mut ext = header.extension(&self.input)?;
                let namespace = string_ref(ext.read_u32_le()?);
                let name = ext.read_u32_le()?;
                self.events.push(XmlEvent::ElementEnd { namespace, name });
            }

            RES_XML_CDATA_TYPE => {
                let mut ext = header.extension(&self.input)?;
                let data = string_ref(ext.read_u32_le()?);
                self.events.push(XmlEvent::CData { data });
            }

            other => {
                let head = self
                    .input
                    .slice(header.start, header.header_size as usize)
                    .unwrap_or_default();
                trace!(
                    "skipping chunk type 0x{:04X} at offset {} ({} bytes, header {})",
                    other,
                    header.start,
                    header.chunk_size,
                    hex::encode(head)
                );
            }
        }
        Ok(())
    }

    fn read_start_element(&self, header: &ChunkHeader) -> Result<StartElement> {
        let mut ext = header.extension(&self.input)?;
        let namespace = string_ref(ext.read_u32_le()?);
        let name = ext.read_u32_le()?;
        let attribute_start = ext.read_u16_le()? as usize;
        let attribute_size = ext.read_u16_le()? as usize;
        let attribute_count = ext.read_u16_le()? as usize;

        if attribute_count > 0 && attribute_size < ATTRIBUTE_SIZE {
            return Err(AxmlError::StrictDecodeFailed(format!(
                "attribute size {} at offset {} is below {}",
                attribute_size, header.start, ATTRIBUTE_SIZE
            )));
        }

        let base = header.header_size as usize + attribute_start;
        let mut attributes = Vec::with_capacity(attribute_count);
        for i in 0..attribute_count {
            ext.seek(base + i * attribute_size)?;
            attributes.push(Attribute::read(&mut ext)?);
        }

        Ok(StartElement {
            namespace,
            name,
            attributes,
        })
    }
}

fn string_ref(index: u32) -> Option<u32> {
    (index != NO_ENTRY_INDEX).then_some(index)
}
