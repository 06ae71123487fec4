//! Builders for synthetic AXML buffers used across the unit tests.

use crate::{ANDROID_NAMESPACE_URI, NO_ENTRY_INDEX, STRING_FLAG_UTF8};
use crate::{RES_STRING_POOL_TYPE, RES_XML_RESOURCE_MAP_TYPE, RES_XML_TYPE};
use crate::{RES_XML_CDATA_TYPE, RES_XML_END_ELEMENT_TYPE, RES_XML_START_ELEMENT_TYPE};
use crate::{RES_XML_END_NAMESPACE_TYPE, RES_XML_START_NAMESPACE_TYPE};
use crate::{TYPE_INT_BOOLEAN, TYPE_INT_DEC, TYPE_INT_HEX, TYPE_NULL, TYPE_REFERENCE, TYPE_STRING};

#[derive(Debug, Clone, Copy)]
pub(crate) enum TestValue<'a> {
    Str(&'a str),
    Int(i32),
    /// Integer that also keeps its source text as the raw value
    IntWithRaw(i32, &'a str),
    Hex(u32),
    Bool(bool),
    Ref(u32),
    Null,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TestAttr<'a> {
    android: bool,
    name: &'a str,
    value: TestValue<'a>,
}

impl<'a> TestAttr<'a> {
    pub(crate) fn android(name: &'a str, value: TestValue<'a>) -> Self {
        Self { android: true, name, value }
    }

    pub(crate) fn plain(name: &'a str, value: TestValue<'a>) -> Self {
        Self { android: false, name, value }
    }
}

/// Incrementally writes body chunks; the pool is emitted on `build`
pub(crate) struct AxmlBuilder {
    strings: Vec<String>,
    utf8: bool,
    resource_ids: Vec<u32>,
    body: Vec<u8>,
}

impl AxmlBuilder {
    pub(crate) fn new() -> Self {
        Self {
            strings: Vec::new(),
            utf8: false,
            resource_ids: Vec::new(),
            body: Vec::new(),
        }
    }

    pub(crate) fn utf8(mut self) -> Self {
        self.utf8 = true;
        self
    }

    pub(crate) fn intern(&mut self, value: &str) -> u32 {
        if let Some(index) = self.strings.iter().position(|s| s == value) {
            return index as u32;
        }
        self.strings.push(value.to_string());
        (self.strings.len() - 1) as u32
    }

    /// Map attribute names to resource ids; must run before other strings are interned
    pub(crate) fn resource_map(&mut self, entries: &[(&str, u32)]) {
        for (name, id) in entries {
            let index = self.intern(name) as usize;
            assert_eq!(index, self.resource_ids.len(), "resource map names must come first");
            self.resource_ids.push(*id);
        }
    }

    pub(crate) fn start_namespace(&mut self, prefix: &str, uri: &str) {
        let ext = [self.intern(prefix), self.intern(uri)];
        self.node_chunk(RES_XML_START_NAMESPACE_TYPE, &words(&ext));
    }

    pub(crate) fn end_namespace(&mut self, prefix: &str, uri: &str) {
        let ext = [self.intern(prefix), self.intern(uri)];
        self.node_chunk(RES_XML_END_NAMESPACE_TYPE, &words(&ext));
    }

    pub(crate) fn start_element(&mut self, name: &str, attrs: &[TestAttr<'_>]) {
        let name = self.intern(name);
        let mut ext = words(&[NO_ENTRY_INDEX, name]);
        ext.extend_from_slice(&20u16.to_le_bytes()); // attribute start
        ext.extend_from_slice(&20u16.to_le_bytes()); // attribute size
        ext.extend_from_slice(&(attrs.len() as u16).to_le_bytes());
        ext.extend_from_slice(&[0u8; 6]); // id, class, style
        for attr in attrs {
            let namespace = if attr.android {
                self.intern(ANDROID_NAMESPACE_URI)
            } else {
                NO_ENTRY_INDEX
            };
            let attr_name = self.intern(attr.name);
            let (raw, data_type, data) = match attr.value {
                TestValue::Str(text) => {
                    let index = self.intern(text);
                    (index, TYPE_STRING, index)
                }
                TestValue::Int(value) => (NO_ENTRY_INDEX, TYPE_INT_DEC, value as u32),
                TestValue::IntWithRaw(value, text) => (self.intern(text), TYPE_INT_DEC, value as u32),
                TestValue::Hex(value) => (NO_ENTRY_INDEX, TYPE_INT_HEX, value),
                TestValue::Bool(value) => (NO_ENTRY_INDEX, TYPE_INT_BOOLEAN, value as u32),
                TestValue::Ref(id) => (NO_ENTRY_INDEX, TYPE_REFERENCE, id),
                TestValue::Null => (NO_ENTRY_INDEX, TYPE_NULL, 0),
            };
            ext.extend_from_slice(&words(&[namespace, attr_name, raw]));
            ext.extend_from_slice(&8u16.to_le_bytes());
            ext.push(0);
            ext.push(data_type);
            ext.extend_from_slice(&data.to_le_bytes());
        }
        self.node_chunk(RES_XML_START_ELEMENT_TYPE, &ext);
    }

    pub(crate) fn end_element(&mut self, name: &str) {
        let ext = [NO_ENTRY_INDEX, self.intern(name)];
        self.node_chunk(RES_XML_END_ELEMENT_TYPE, &words(&ext));
    }

    pub(crate) fn cdata(&mut self, text: &str) {
        let mut ext = words(&[self.intern(text)]);
        ext.extend_from_slice(&8u16.to_le_bytes());
        ext.push(0);
        ext.push(TYPE_NULL);
        ext.extend_from_slice(&0u32.to_le_bytes());
        self.node_chunk(RES_XML_CDATA_TYPE, &ext);
    }

    /// Append an arbitrary chunk with an 8-byte header
    pub(crate) fn raw_chunk(&mut self, chunk_type: u16, payload: &[u8]) {
        let chunk = chunk(chunk_type, 8, payload);
        self.body.extend_from_slice(&chunk);
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let strings: Vec<&str> = self.strings.iter().map(String::as_str).collect();
        let mut children = string_pool_chunk(&strings, self.utf8);
        if !self.resource_ids.is_empty() {
            children.extend_from_slice(&chunk(
                RES_XML_RESOURCE_MAP_TYPE,
                8,
                &words(&self.resource_ids),
            ));
        }
        children.extend_from_slice(&self.body);
        xml_document(&children)
    }

    fn node_chunk(&mut self, chunk_type: u16, ext: &[u8]) {
        // line number, comment
        let mut payload = words(&[1, NO_ENTRY_INDEX]);
        payload.extend_from_slice(ext);
        let chunk = chunk(chunk_type, 16, &payload);
        self.body.extend_from_slice(&chunk);
    }
}

/// A complete string pool chunk
pub(crate) fn string_pool_chunk(strings: &[&str], utf8: bool) -> Vec<u8> {
    let mut data = Vec::new();
    let mut offsets = Vec::with_capacity(strings.len());
    for s in strings {
        offsets.push(data.len() as u32);
        if utf8 {
            write_utf8_length(&mut data, s.encode_utf16().count());
            write_utf8_length(&mut data, s.len());
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        } else {
            let units: Vec<u16> = s.encode_utf16().collect();
            data.extend_from_slice(&(units.len() as u16).to_le_bytes());
            for unit in units {
                data.extend_from_slice(&unit.to_le_bytes());
            }
            data.extend_from_slice(&[0, 0]);
        }
    }
    string_pool_from_parts(&offsets, &data, utf8)
}

/// A string pool chunk with a hand-made offset table over `data`
pub(crate) fn string_pool_from_parts(offsets: &[u32], data: &[u8], utf8: bool) -> Vec<u8> {
    let mut data = data.to_vec();
    align_to_four(&mut data);

    let strings_start = 28 + offsets.len() as u32 * 4;
    let flags = if utf8 { STRING_FLAG_UTF8 } else { 0 };
    let mut payload = words(&[offsets.len() as u32, 0, flags, strings_start, 0]);
    payload.extend_from_slice(&words(offsets));
    payload.extend_from_slice(&data);
    chunk(RES_STRING_POOL_TYPE, 28, &payload)
}

/// Wrap already-encoded chunks in the XML document header
pub(crate) fn xml_document(children: &[u8]) -> Vec<u8> {
    chunk(RES_XML_TYPE, 8, children)
}

/// UTF-16 pool of `count` entries that all point at one string of `len` units
pub(crate) fn aliased_string_pool(count: usize, len: usize) -> Vec<u8> {
    let mut data = (len as u16).to_le_bytes().to_vec();
    for _ in 0..len {
        data.extend_from_slice(&u16::from(b'a').to_le_bytes());
    }
    data.extend_from_slice(&[0, 0]);
    string_pool_from_parts(&vec![0u32; count], &data, false)
}

/// The manifest used throughout the tests: com.example.app 2.3.1 (20301), SDK 26, "Demo App"
pub(crate) fn demo_manifest(utf8: bool) -> Vec<u8> {
    let mut builder = if utf8 { AxmlBuilder::new().utf8() } else { AxmlBuilder::new() };
    // keep each attribute name next to its value in the pool
    for s in [
        "package",
        "com.example.app",
        "versionCode",
        "20301",
        "versionName",
        "2.3.1",
        "minSdkVersion",
        "26",
        "label",
        "Demo App",
    ] {
        builder.intern(s);
    }
    builder.start_namespace("android", ANDROID_NAMESPACE_URI);
    builder.start_element(
        "manifest",
        &[
            TestAttr::plain("package", TestValue::Str("com.example.app")),
            TestAttr::android("versionCode", TestValue::IntWithRaw(20301, "20301")),
            TestAttr::android("versionName", TestValue::Str("2.3.1")),
        ],
    );
    builder.start_element(
        "uses-sdk",
        &[TestAttr::android("minSdkVersion", TestValue::IntWithRaw(26, "26"))],
    );
    builder.end_element("uses-sdk");
    builder.start_element(
        "application",
        &[TestAttr::android("label", TestValue::Str("Demo App"))],
    );
    builder.end_element("application");
    builder.end_element("manifest");
    builder.end_namespace("android", ANDROID_NAMESPACE_URI);
    builder.build()
}

/// Overwrite the document chunk's size field so strict decoding fails
pub(crate) fn corrupt_document_size(data: &mut [u8]) {
    data[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
}

fn chunk(chunk_type: u16, header_size: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(&chunk_type.to_le_bytes());
    buf.extend_from_slice(&header_size.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // chunk size placeholder
    buf.extend_from_slice(payload);
    align_to_four(&mut buf);
    let size = buf.len() as u32;
    buf[4..8].copy_from_slice(&size.to_le_bytes());
    buf
}

fn words(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn write_utf8_length(buf: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        buf.push(len as u8);
    } else {
        buf.push(0x80 | (len >> 8) as u8);
        buf.push((len & 0xFF) as u8);
    }
}

fn align_to_four(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}
