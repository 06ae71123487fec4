//! Pattern-based recovery of manifest fields from raw bytes.
//!
//! Used when strict AXML decoding fails or leaves a field unresolved. The
//! buffer is viewed as text (see [`clean`] and [`fold_utf16`]) and each field
//! is searched with an ordered list of independent patterns; the first one
//! that yields a plausible value wins.

use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

/// A single search over a text view
pub type Pattern<T> = fn(&str) -> Option<T>;

const MARKER_WINDOW: usize = 100;
const APP_NAME_WINDOW: usize = 200;
const MAX_APP_NAME_LEN: usize = 100;
const MIN_PLAUSIBLE_VERSION: f64 = 0.1;
const MAX_PLAUSIBLE_VERSION: f64 = 20.0;

lazy_static! {
    static ref QUOTED_PACKAGE: Regex = Regex::new(r#"package\s*=\s*"([^"]*)""#).expect("invalid regex");
    static ref ANDROID_NAME_PACKAGE: Regex =
        Regex::new(r#"android:name\s*=\s*"package"[^"]*"([^"]*)""#).expect("invalid regex");
    static ref DOTTED_IDENTIFIER: Regex =
        Regex::new(r"[a-zA-Z][a-zA-Z0-9_]*(?:\.[a-zA-Z][a-zA-Z0-9_]*)+").expect("invalid regex");
    static ref PACKAGE_NAME: Regex =
        Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*(?:\.[a-zA-Z][a-zA-Z0-9_]*)+$").expect("invalid regex");
    static ref QUOTED_VERSION_NAME: Regex =
        Regex::new(r#"versionName\s*=\s*"([^"]*)""#).expect("invalid regex");
    static ref DOTTED_NUMBER: Regex = Regex::new(r"\d+(?:\.\d+)+").expect("invalid regex");
    static ref VERSION_TOKEN: Regex = Regex::new(r"\d+\.\d+(?:\.\d+)?").expect("invalid regex");
    static ref QUOTED_VERSION_CODE: Regex =
        Regex::new(r#"versionCode\s*=\s*"(\d+)""#).expect("invalid regex");
    static ref VERSION_CODE_MARKER: Regex = Regex::new(r"versionCode|VERSION_CODE").expect("invalid regex");
    static ref BARE_INTEGER: Regex =
        Regex::new(r"(?:^|[^0-9.])([0-9]{1,10})(?:[^0-9.]|$)").expect("invalid regex");
    static ref STRING_RESOURCE_APP_NAME: Regex =
        Regex::new(r"app_name[^>]*>([^<]+)<").expect("invalid regex");
    static ref QUOTED_LABEL: Regex = Regex::new(r#"android:label\s*=\s*"([^"]*)""#).expect("invalid regex");
    static ref APP_NAME_MARKER: Regex =
        Regex::new(r"app_name|application_name|game_title|product_name|app_title|title")
            .expect("invalid regex");
    static ref TEXT_NODE: Regex = Regex::new(r">([^<>]+)<").expect("invalid regex");
    static ref SHORT_QUOTED: Regex = Regex::new(r#""([^"]{3,30})""#).expect("invalid regex");
    static ref QUOTED_MIN_SDK: Regex =
        Regex::new(r#"minSdkVersion\s*=\s*"(\d+)""#).expect("invalid regex");
    static ref MIN_SDK_MARKER: Regex = Regex::new(r"minSdkVersion").expect("invalid regex");
}

pub const PACKAGE_NAME_PATTERNS: &[Pattern<String>] =
    &[quoted_package, android_name_package, dotted_identifier];
pub const VERSION_NAME_PATTERNS: &[Pattern<String>] =
    &[quoted_version_name, plausible_version_token, any_version_token];
pub const VERSION_CODE_PATTERNS: &[Pattern<u32>] = &[quoted_version_code, version_code_marker];
pub const APP_NAME_PATTERNS: &[Pattern<String>] =
    &[string_resource_app_name, quoted_label, app_name_marker];
pub const MIN_SDK_PATTERNS: &[Pattern<u32>] = &[quoted_min_sdk, min_sdk_marker];

/// Replace every byte outside printable ASCII with a space
pub fn clean(data: &[u8]) -> String {
    data.iter()
        .map(|&b| if is_printable(b) { b as char } else { ' ' })
        .collect()
}

/// Like [`clean`], but a printable byte followed by a NUL is read as one
/// UTF-16LE code unit, so UTF-16 string pools become contiguous text
pub fn fold_utf16(data: &[u8]) -> String {
    let mut text = String::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if is_printable(b) {
            text.push(b as char);
            if data.get(i + 1) == Some(&0) {
                i += 1;
            }
        } else {
            text.push(' ');
        }
        i += 1;
    }
    text
}

fn is_printable(b: u8) -> bool {
    (0x20..=0x7E).contains(&b)
}

/// Text views over a raw buffer, searched in order
pub struct HeuristicScanner {
    views: [String; 2],
}

impl HeuristicScanner {
    pub fn new(data: &[u8]) -> Self {
        Self {
            views: [clean(data), fold_utf16(data)],
        }
    }

    /// Run patterns in priority order, each over every view
    pub fn first_match<T>(&self, patterns: &[Pattern<T>]) -> Option<T> {
        patterns.iter().enumerate().find_map(|(rank, pattern)| {
            self.views.iter().find_map(|view| pattern(view.as_str())).inspect(|_| {
                trace!("heuristic pattern #{rank} matched");
            })
        })
    }

    pub fn package_name(&self) -> Option<String> {
        self.first_match(PACKAGE_NAME_PATTERNS)
    }

    pub fn version_name(&self) -> Option<String> {
        self.first_match(VERSION_NAME_PATTERNS)
    }

    pub fn version_code(&self) -> Option<u32> {
        self.first_match(VERSION_CODE_PATTERNS)
    }

    pub fn app_name(&self) -> Option<String> {
        self.first_match(APP_NAME_PATTERNS)
    }

    pub fn min_sdk_version(&self) -> Option<u32> {
        self.first_match(MIN_SDK_PATTERNS)
    }
}

/// `major*10000 + minor*100 + patch`; missing parts count as zero
pub fn derive_version_code(version_name: &str) -> Option<u32> {
    let mut parts = version_name.trim().split('.').map(leading_number);
    let major = parts.next().flatten()?;
    let minor = parts.next().flatten().unwrap_or(0);
    let patch = parts.next().flatten().unwrap_or(0);

    major
        .checked_mul(10_000)?
        .checked_add(minor.checked_mul(100)?)?
        .checked_add(patch)
}

fn leading_number(segment: &str) -> Option<u32> {
    let end = segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(segment.len());
    segment[..end].parse().ok()
}

fn first_capture<T>(regex: &Regex, text: &str, accept: impl Fn(&str) -> Option<T>) -> Option<T> {
    regex
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| accept(m.as_str()))
}

/// Up to `len` bytes of `text` after `start`, cut on a char boundary
fn window(text: &str, start: usize, len: usize) -> &str {
    let mut end = start.saturating_add(len).min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[start..end]
}

fn bare_integer_after(marker: &Regex, text: &str) -> Option<u32> {
    marker.find_iter(text).find_map(|m| {
        let nearby = window(text, m.end(), MARKER_WINDOW);
        first_capture(&BARE_INTEGER, nearby, parse_u32)
    })
}

fn parse_u32(text: &str) -> Option<u32> {
    text.parse().ok()
}

fn package_shape(text: &str) -> Option<String> {
    PACKAGE_NAME.is_match(text).then(|| text.to_string())
}

fn version_shape(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty() && !text.starts_with('@') && text.chars().any(|c| c.is_ascii_digit()))
        .then(|| text.to_string())
}

fn app_name_shape(text: &str) -> Option<String> {
    let text = text.trim();
    let plausible = !text.is_empty()
        && text.len() <= MAX_APP_NAME_LEN
        && !text.starts_with('@')
        && text.chars().any(char::is_alphabetic);
    plausible.then(|| text.to_string())
}

pub fn quoted_package(text: &str) -> Option<String> {
    first_capture(&QUOTED_PACKAGE, text, package_shape)
}

pub fn android_name_package(text: &str) -> Option<String> {
    first_capture(&ANDROID_NAME_PACKAGE, text, package_shape)
}

/// The dotted identifier with the most segments; ties go to the first one
pub fn dotted_identifier(text: &str) -> Option<String> {
    let mut best: Option<(usize, &str)> = None;
    for m in DOTTED_IDENTIFIER.find_iter(text) {
        let before = text[..m.start()].chars().next_back();
        let after = text[m.end()..].chars().next();
        let candidate = strip_length_prefix(m.as_str());
        if before == Some('/') || after == Some('/') || !plausible_package(candidate) {
            continue;
        }
        let segments = candidate.split('.').count();
        if best.is_none_or(|(count, _)| segments > count) {
            best = Some((segments, candidate));
        }
    }
    best.map(|(_, candidate)| candidate.to_string())
}

/// Drop string pool length bytes that read as letters in front of a string
///
/// A UTF-8 pool writes the character and byte counts (two equal bytes for
/// ASCII under 128, else the low byte of the second count survives); a UTF-16
/// pool writes one little-endian word whose zero high byte folds away.
fn strip_length_prefix(candidate: &str) -> &str {
    let bytes = candidate.as_bytes();
    let encodes_rest = |skip: usize| bytes.len() > skip && bytes[0] == ((bytes.len() - skip) & 0xFF) as u8;
    let stripped = if bytes.len() > 2 && bytes[0] == bytes[1] && encodes_rest(2) {
        &candidate[2..]
    } else if encodes_rest(1) {
        &candidate[1..]
    } else {
        return candidate;
    };
    if PACKAGE_NAME.is_match(stripped) {
        stripped
    } else {
        candidate
    }
}

fn plausible_package(candidate: &str) -> bool {
    let framework = candidate.starts_with("android.") || candidate.starts_with("androidx.");
    // com.example.app.MainActivity is a class, not a package
    let class_name = candidate
        .rsplit('.')
        .next()
        .and_then(|last| last.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase());
    !framework && !class_name
}

pub fn quoted_version_name(text: &str) -> Option<String> {
    first_capture(&QUOTED_VERSION_NAME, text, version_shape)
}

/// A dotted number of at most three segments with `major.minor` in 0.1–20.0
pub fn plausible_version_token(text: &str) -> Option<String> {
    DOTTED_NUMBER
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|token| {
            let segments: Vec<&str> = token.split('.').collect();
            let major_minor: Option<f64> = format!("{}.{}", segments[0], segments[1]).parse().ok();
            segments.len() <= 3
                && major_minor
                    .is_some_and(|v| (MIN_PLAUSIBLE_VERSION..=MAX_PLAUSIBLE_VERSION).contains(&v))
        })
        .map(str::to_string)
}

pub fn any_version_token(text: &str) -> Option<String> {
    VERSION_TOKEN.find(text).map(|m| m.as_str().to_string())
}

pub fn quoted_version_code(text: &str) -> Option<u32> {
    first_capture(&QUOTED_VERSION_CODE, text, parse_u32)
}

pub fn version_code_marker(text: &str) -> Option<u32> {
    bare_integer_after(&VERSION_CODE_MARKER, text)
}

pub fn string_resource_app_name(text: &str) -> Option<String> {
    first_capture(&STRING_RESOURCE_APP_NAME, text, app_name_shape)
}

pub fn quoted_label(text: &str) -> Option<String> {
    first_capture(&QUOTED_LABEL, text, app_name_shape)
}

/// A text node or short quoted string shortly after a name-like marker
pub fn app_name_marker(text: &str) -> Option<String> {
    APP_NAME_MARKER.find_iter(text).find_map(|m| {
        let nearby = window(text, m.end(), APP_NAME_WINDOW);
        let node = TEXT_NODE.captures(nearby).and_then(|caps| caps.get(1));
        let quoted = SHORT_QUOTED.captures(nearby).and_then(|caps| caps.get(1));
        let mut candidates: Vec<_> = node.into_iter().chain(quoted).collect();
        candidates.sort_by_key(|c| c.start());
        candidates.into_iter().find_map(|c| app_name_shape(c.as_str()))
    })
}

pub fn quoted_min_sdk(text: &str) -> Option<u32> {
    first_capture(&QUOTED_MIN_SDK, text, parse_u32)
}

pub fn min_sdk_marker(text: &str) -> Option<u32> {
    bare_integer_after(&MIN_SDK_MARKER, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TEXT_MANIFEST: &str = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"
        package="com.example.app" android:versionCode="20301" android:versionName="2.3.1">
        <uses-sdk android:minSdkVersion="26" />
        <application android:label="Demo App">
            <activity android:name="com.example.app.MainActivity" />
        </application>
    </manifest>"#;

    #[test]
    fn test_clean_replaces_binary() {
        assert_eq!(clean(b"ab\x00c\xFFd\n"), "ab c d ");
        assert_eq!(clean(&[]), "");
    }

    #[test]
    fn test_fold_utf16() {
        let data: Vec<u8> = "\u{7}com.x".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(fold_utf16(&data), "  com.x");
        assert_eq!(clean(&data), "  c o m . x ");
    }

    #[test]
    fn test_text_manifest_quoted_forms() {
        assert_eq!(quoted_package(TEXT_MANIFEST).as_deref(), Some("com.example.app"));
        assert_eq!(quoted_version_name(TEXT_MANIFEST).as_deref(), Some("2.3.1"));
        assert_eq!(quoted_version_code(TEXT_MANIFEST), Some(20301));
        assert_eq!(quoted_min_sdk(TEXT_MANIFEST), Some(26));
        assert_eq!(quoted_label(TEXT_MANIFEST).as_deref(), Some("Demo App"));
    }

    #[test]
    fn test_quoted_package_skips_implausible() {
        let text = r#"package="not a package" package="org.sample.tool""#;
        assert_eq!(quoted_package(text).as_deref(), Some("org.sample.tool"));
        assert_eq!(quoted_package(r#"package="single""#), None);
    }

    #[test]
    fn test_android_name_package() {
        let text = r#"<meta-data android:name="package" android:value="io.github.demo" />"#;
        assert_eq!(android_name_package(text).as_deref(), Some("io.github.demo"));
    }

    #[test]
    fn test_dotted_identifier_prefers_most_segments() {
        let text = "com.example  org.sample.deep.tool  net.other.long.name";
        assert_eq!(dotted_identifier(text).as_deref(), Some("org.sample.deep.tool"));
    }

    #[test]
    fn test_dotted_identifier_filters() {
        let text = "http://schemas.android.com/apk/res/android android.intent.action.MAIN \
                    com.example.app.MainActivity com.example.app";
        assert_eq!(dotted_identifier(text).as_deref(), Some("com.example.app"));
        assert_eq!(dotted_identifier("no dots here"), None);
    }

    #[test]
    fn test_dotted_identifier_drops_length_prefix() {
        let package = format!("com.example.{}", "x".repeat(58));
        assert_eq!(package.len(), 70);

        // UTF-8 pool: character and byte counts, both 'F'
        let utf8 = format!("  FF{package}  ");
        assert_eq!(dotted_identifier(&utf8), Some(package.clone()));
        // folded UTF-16 pool: one length word
        let utf16 = format!("  F{package}  ");
        assert_eq!(dotted_identifier(&utf16), Some(package.clone()));
        // a leading letter that does not encode the length stays
        assert_eq!(dotted_identifier("Fcom.example.app").as_deref(), Some("Fcom.example.app"));
    }

    #[test]
    fn test_version_token_plausibility() {
        assert_eq!(plausible_version_token("1.2.3.4 99.1 0.0.1 3.1.4").as_deref(), Some("3.1.4"));
        assert_eq!(plausible_version_token("99.1 0.0.1"), None);
        assert_eq!(any_version_token("99.1 0.0.1").as_deref(), Some("99.1"));
    }

    #[test]
    fn test_version_code_marker_window() {
        assert_eq!(version_code_marker("VERSION_CODE   20301  2.3.1"), Some(20301));
        assert_eq!(version_code_marker("versionCode 2.3.1 then 77"), Some(77));
        let far = format!("versionCode{}42", " ".repeat(MARKER_WINDOW + 1));
        assert_eq!(version_code_marker(&far), None);
    }

    #[test]
    fn test_min_sdk_marker() {
        assert_eq!(min_sdk_marker("minSdkVersion   21  "), Some(21));
        assert_eq!(min_sdk_marker("minSdkVersion none"), None);
    }

    #[test]
    fn test_string_resource_app_name() {
        let text = r#"<string name="app_name">Sky Runner</string>"#;
        assert_eq!(string_resource_app_name(text).as_deref(), Some("Sky Runner"));
    }

    #[test]
    fn test_app_name_marker() {
        assert_eq!(app_name_marker(r#"game_title = "Sky Runner""#).as_deref(), Some("Sky Runner"));
        assert_eq!(app_name_marker("title>Puzzle Box<").as_deref(), Some("Puzzle Box"));
        assert_eq!(app_name_marker(r#"title "ab""#), None);
    }

    #[rstest]
    #[case("1.2.3", Some(10203))]
    #[case("2.3.1", Some(20301))]
    #[case("4", Some(40000))]
    #[case("1.5-beta", Some(10500))]
    #[case("2.3.1-rc2", Some(20301))]
    #[case("beta", None)]
    #[case("999999.0.0", None)]
    fn test_derive_version_code(#[case] name: &str, #[case] expected: Option<u32>) {
        assert_eq!(derive_version_code(name), expected);
    }

    #[test]
    fn test_scanner_on_text_manifest() {
        let scanner = HeuristicScanner::new(TEXT_MANIFEST.as_bytes());
        assert_eq!(scanner.package_name().as_deref(), Some("com.example.app"));
        assert_eq!(scanner.version_name().as_deref(), Some("2.3.1"));
        assert_eq!(scanner.version_code(), Some(20301));
        assert_eq!(scanner.min_sdk_version(), Some(26));
        assert_eq!(scanner.app_name().as_deref(), Some("Demo App"));
    }

    #[test]
    fn test_scanner_on_empty_input() {
        let scanner = HeuristicScanner::new(&[]);
        assert_eq!(scanner.package_name(), None);
        assert_eq!(scanner.version_name(), None);
        assert_eq!(scanner.version_code(), None);
        assert_eq!(scanner.app_name(), None);
        assert_eq!(scanner.min_sdk_version(), None);
    }
}
