use crate::{AxmlDocument, Result, XmlEvent, is_axml};
use lazy_static::lazy_static;
use log::debug;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

const APP_NAME_KEY: &str = "app_name";

lazy_static! {
    static ref APP_NAME_ENTRY: Regex =
        Regex::new(r#"<string\s+name\s*=\s*"app_name"[^>]*>([^<]*)</string>"#).expect("invalid regex");
}

/// Find the `app_name` string resource in a `strings.xml` (text or AXML)
pub fn resolve_app_name(data: &[u8]) -> Option<String> {
    let value = if is_axml(data) {
        from_binary(data)
    } else {
        from_text(data)
    };
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn from_binary(data: &[u8]) -> Option<String> {
    let document = AxmlDocument::decode(data)
        .map_err(|err| debug!("binary strings.xml not decodable: {err}"))
        .ok()?;

    let mut value: Option<String> = None;
    for event in &document.events {
        match event {
            XmlEvent::ElementStart(element) => {
                let is_app_name = document.element_name(element) == Some("string")
                    && element.attributes.iter().any(|attr| {
                        document.attribute_name(attr) == Some("name")
                            && document.attribute_string(attr) == Some(APP_NAME_KEY)
                    });
                if is_app_name {
                    value = Some(String::new());
                }
            }
            XmlEvent::CData { data: Some(index) } => {
                if let (Some(text), Some(chunk)) = (value.as_mut(), document.string(*index)) {
                    text.push_str(chunk);
                }
            }
            XmlEvent::ElementEnd { name, .. } if document.string(*name) == Some("string") => {
                if value.is_some() {
                    return value;
                }
            }
            _ => {}
        }
    }
    None
}

fn from_text(data: &[u8]) -> Option<String> {
    match read_app_name(data) {
        Ok(value) => value,
        Err(err) => {
            debug!("strings.xml is not well-formed ({err}), scanning text");
            let text = String::from_utf8_lossy(data);
            APP_NAME_ENTRY
                .captures(&text)
                .and_then(|caps| caps.get(1))
                .map(|m| unescape_lossy(m.as_str()))
        }
    }
}

fn read_app_name(data: &[u8]) -> Result<Option<String>> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    let mut value: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) if value.is_none() && is_app_name(&e) => {
                value = Some(String::new());
            }
            Event::Text(t) => {
                if let Some(text) = value.as_mut() {
                    text.push_str(&unescape_lossy(&String::from_utf8_lossy(&t)));
                }
            }
            Event::CData(c) => {
                if let Some(text) = value.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::GeneralRef(r) => {
                if let Some(text) = value.as_mut() {
                    text.push_str(&unescape_lossy(&format!("&{};", String::from_utf8_lossy(&r))));
                }
            }
            Event::End(e) if e.name().as_ref() == b"string" => {
                if value.is_some() {
                    return Ok(value);
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(None)
}

fn is_app_name(element: &BytesStart<'_>) -> bool {
    element.name().as_ref() == b"string"
        && element
            .attributes()
            .flatten()
            .any(|attr| attr.key.as_ref() == b"name" && attr.value.as_ref() == APP_NAME_KEY.as_bytes())
}

fn unescape_lossy(raw: &str) -> String {
    unescape(raw)
        .map(|text| text.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Turn the last segment of a package name into a display name
///
/// `com.example.myCoolApp` and `com.example.my_cool_app` both become
/// `"My Cool App"`.
pub fn derive_app_name(package_name: &str) -> Option<String> {
    let segment = package_name.rsplit('.').next()?.trim();

    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut previous: Option<char> = None;
    for c in segment.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            words.push(std::mem::take(&mut current));
        } else {
            if c.is_uppercase() && previous.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                words.push(std::mem::take(&mut current));
            }
            current.push(c);
        }
        previous = Some(c);
    }
    words.push(current);

    let name = words
        .iter()
        .filter(|word| !word.is_empty())
        .map(|word| capitalize(word))
        .collect::<Vec<_>>()
        .join(" ");
    (!name.is_empty()).then_some(name)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
