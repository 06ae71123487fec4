//! Metadata extraction for Android application packages.
//!
//! Recovers the application name, package identifier, version name, version
//! code and minimum SDK level from the compiled `AndroidManifest.xml` (AXML)
//! of an APK, without any Android build tooling. Decoding is strict first and
//! degrades through heuristic scanning, a companion `strings.xml`, and finally
//! derived defaults. Every field of the result carries a [`Provenance`] tag.
//!
//! # Examples
//!
//! ```no_run
//! use apkmeta::{extract, Provenance};
//!
//! let manifest = std::fs::read("AndroidManifest.xml").unwrap();
//! let outcome = extract(&manifest, None);
//!
//! if outcome.provenance.package_name == Some(Provenance::StrictDecode) {
//!     println!("package: {:?}", outcome.metadata.package_name);
//! }
//! ```

use std::io;
use thiserror::Error;

mod binary_xml;
mod byte_cursor;
pub mod cli;
mod extractor;
pub mod heuristics;
mod manifest;
pub mod sdk;
mod string_pool;
mod strings_xml;

#[cfg(test)]
mod test_support;

pub use binary_xml::{
    Attribute, AttributeValue, AxmlDocument, ChunkHeader, ChunkWalker, StartElement, XmlEvent,
    is_axml,
};
pub use byte_cursor::ByteCursor;
pub use extractor::{
    ApkMetadata, ApkMetadataExtractor, ExtractionOutcome, FieldProvenance, MetadataField,
    Provenance, extract,
};
pub use heuristics::{HeuristicScanner, derive_version_code};
pub use manifest::{FieldState, ManifestProjection, ManifestProjector};
pub use string_pool::StringPool;
pub use strings_xml::{derive_app_name, resolve_app_name};

/// Error types for AXML decoding and extraction
///
/// The structural variants never escape [`extract`]; they select the next
/// fallback tier instead.
#[derive(Error, Debug)]
pub enum AxmlError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("read of {requested} bytes at offset {offset} exceeds buffer of {len} bytes")]
    OutOfBounds {
        offset: usize,
        requested: usize,
        len: usize,
    },
    #[error(
        "invalid chunk at offset {offset}: type=0x{chunk_type:04X} header_size={header_size} chunk_size={chunk_size}"
    )]
    InvalidChunk {
        offset: usize,
        chunk_type: u16,
        header_size: u16,
        chunk_size: u32,
    },
    #[error("Invalid string pool index: {0}")]
    InvalidStringIndex(u32),
    #[error("strict decode failed: {0}")]
    StrictDecodeFailed(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, AxmlError>;

// Chunk types
pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub const RES_XML_TYPE: u16 = 0x0003;
pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

/// First four bytes of every AXML document: `RES_XML_TYPE` with an 8-byte header
pub const AXML_MAGIC: [u8; 4] = [0x03, 0x00, 0x08, 0x00];

pub const CHUNK_HEADER_SIZE: usize = 8;
pub const NO_ENTRY_INDEX: u32 = 0xFFFF_FFFF;
pub const STRING_FLAG_UTF8: u32 = 0x0000_0100;

pub const ANDROID_NAMESPACE_URI: &str = "http://schemas.android.com/apk/res/android";

// Typed value data types
pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_ATTRIBUTE: u8 = 0x02;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_FLOAT: u8 = 0x04;
pub const TYPE_DYNAMIC_REFERENCE: u8 = 0x07;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;

// Framework attribute resource ids
pub const ATTR_LABEL: u32 = 0x0101_0001;
pub const ATTR_MIN_SDK_VERSION: u32 = 0x0101_020c;
pub const ATTR_VERSION_CODE: u32 = 0x0101_021b;
pub const ATTR_VERSION_NAME: u32 = 0x0101_021c;
