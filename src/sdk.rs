//! Android SDK level to platform (marketing) version lookup.

/// Every SDK level with a known marketing version
pub const PLATFORM_VERSIONS: [(u32, &str); 14] = [
    (21, "5.0"),
    (22, "5.1"),
    (23, "6.0"),
    (24, "7.0"),
    (25, "7.1"),
    (26, "8.0"),
    (27, "8.1"),
    (28, "9.0"),
    (29, "10.0"),
    (30, "11.0"),
    (31, "12.0"),
    (32, "12L"),
    (33, "13.0"),
    (34, "14.0"),
];

/// Marketing version for an SDK level, if the level is in the table
pub fn lookup(sdk_level: u32) -> Option<&'static str> {
    PLATFORM_VERSIONS
        .iter()
        .find(|(level, _)| *level == sdk_level)
        .map(|(_, version)| *version)
}

/// Human-facing version string; unmapped levels render as `Unknown (SDK N)`
pub fn platform_version(sdk_level: u32) -> String {
    match lookup(sdk_level) {
        Some(version) => version.to_string(),
        None => format!("Unknown (SDK {sdk_level})"),
    }
}
