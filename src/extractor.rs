use crate::heuristics::{HeuristicScanner, derive_version_code};
use crate::strings_xml::{derive_app_name, resolve_app_name};
use crate::{AxmlDocument, FieldState, ManifestProjector, Result, sdk};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};

const DEFAULT_VERSION_NAME: &str = "1.0.0";
const DEFAULT_VERSION_CODE: u32 = 1;

/// The fields the engine extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    AppName,
    PackageName,
    VersionName,
    VersionCode,
    MinSdkVersion,
}

impl MetadataField {
    pub const ALL: [MetadataField; 5] = [
        MetadataField::AppName,
        MetadataField::PackageName,
        MetadataField::VersionName,
        MetadataField::VersionCode,
        MetadataField::MinSdkVersion,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            MetadataField::AppName => "app_name",
            MetadataField::PackageName => "package_name",
            MetadataField::VersionName => "version_name",
            MetadataField::VersionCode => "version_code",
            MetadataField::MinSdkVersion => "min_sdk_version",
        }
    }
}

/// Package identity and versioning metadata; every field is best-effort
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApkMetadata {
    pub app_name: Option<String>,
    pub package_name: Option<String>,
    pub version_name: Option<String>,
    pub version_code: Option<u32>,
    pub min_sdk_version: Option<u32>,
}

impl ApkMetadata {
    pub fn is_set(&self, field: MetadataField) -> bool {
        match field {
            MetadataField::AppName => self.app_name.is_some(),
            MetadataField::PackageName => self.package_name.is_some(),
            MetadataField::VersionName => self.version_name.is_some(),
            MetadataField::VersionCode => self.version_code.is_some(),
            MetadataField::MinSdkVersion => self.min_sdk_version.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !MetadataField::ALL.iter().any(|field| self.is_set(*field))
    }

    /// Marketing version of the minimum SDK, e.g. `"8.0"` for level 26
    pub fn min_platform_version(&self) -> Option<String> {
        self.min_sdk_version.map(sdk::platform_version)
    }

    pub(crate) fn text_mut(&mut self, field: MetadataField) -> Option<&mut Option<String>> {
        match field {
            MetadataField::AppName => Some(&mut self.app_name),
            MetadataField::PackageName => Some(&mut self.package_name),
            MetadataField::VersionName => Some(&mut self.version_name),
            MetadataField::VersionCode | MetadataField::MinSdkVersion => None,
        }
    }

    pub(crate) fn number_mut(&mut self, field: MetadataField) -> Option<&mut Option<u32>> {
        match field {
            MetadataField::VersionCode => Some(&mut self.version_code),
            MetadataField::MinSdkVersion => Some(&mut self.min_sdk_version),
            _ => None,
        }
    }
}

/// Which tier of the engine produced a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    StrictDecode,
    Heuristic,
    StringsXml,
    Derived,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Provenance::StrictDecode => "strict decode",
            Provenance::Heuristic => "heuristic",
            Provenance::StringsXml => "strings.xml",
            Provenance::Derived => "derived",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub app_name: Option<Provenance>,
    pub package_name: Option<Provenance>,
    pub version_name: Option<Provenance>,
    pub version_code: Option<Provenance>,
    pub min_sdk_version: Option<Provenance>,
}

impl FieldProvenance {
    pub fn get(&self, field: MetadataField) -> Option<Provenance> {
        match field {
            MetadataField::AppName => self.app_name,
            MetadataField::PackageName => self.package_name,
            MetadataField::VersionName => self.version_name,
            MetadataField::VersionCode => self.version_code,
            MetadataField::MinSdkVersion => self.min_sdk_version,
        }
    }

    fn set(&mut self, field: MetadataField, provenance: Provenance) {
        let slot = match field {
            MetadataField::AppName => &mut self.app_name,
            MetadataField::PackageName => &mut self.package_name,
            MetadataField::VersionName => &mut self.version_name,
            MetadataField::VersionCode => &mut self.version_code,
            MetadataField::MinSdkVersion => &mut self.min_sdk_version,
        };
        *slot = Some(provenance);
    }
}

/// Extracted metadata with the provenance of every field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub metadata: ApkMetadata,
    pub provenance: FieldProvenance,
}

impl ExtractionOutcome {
    /// Heuristic and derived values are guesses a user may want to confirm
    pub fn needs_confirmation(&self, field: MetadataField) -> bool {
        matches!(
            self.provenance.get(field),
            Some(Provenance::Heuristic | Provenance::Derived)
        )
    }

    /// Combine with a user-submitted record for the server-side upload flow
    ///
    /// Package name, version name and version code found in the package itself
    /// (strict or heuristic) override the submission; derived defaults never do.
    /// Every other field keeps the submitted value and only fills gaps.
    pub fn override_submission(&self, submitted: &ApkMetadata) -> ApkMetadata {
        let authoritative = |field| {
            matches!(
                self.provenance.get(field),
                Some(Provenance::StrictDecode | Provenance::Heuristic)
            )
        };

        ApkMetadata {
            app_name: prefer(&self.metadata.app_name, &submitted.app_name, false),
            package_name: prefer(
                &self.metadata.package_name,
                &submitted.package_name,
                authoritative(MetadataField::PackageName),
            ),
            version_name: prefer(
                &self.metadata.version_name,
                &submitted.version_name,
                authoritative(MetadataField::VersionName),
            ),
            version_code: prefer(
                &self.metadata.version_code,
                &submitted.version_code,
                authoritative(MetadataField::VersionCode),
            ),
            min_sdk_version: prefer(&self.metadata.min_sdk_version, &submitted.min_sdk_version, false),
        }
    }

    fn fill_text(
        &mut self,
        field: MetadataField,
        provenance: Provenance,
        find: impl FnOnce() -> Option<String>,
    ) {
        let Some(slot) = self.metadata.text_mut(field) else {
            return;
        };
        if slot.is_some() {
            return;
        }
        if let Some(value) = find() {
            *slot = Some(value);
            self.provenance.set(field, provenance);
        }
    }

    fn fill_number(
        &mut self,
        field: MetadataField,
        provenance: Provenance,
        find: impl FnOnce() -> Option<u32>,
    ) {
        let Some(slot) = self.metadata.number_mut(field) else {
            return;
        };
        if slot.is_some() {
            return;
        }
        if let Some(value) = find() {
            *slot = Some(value);
            self.provenance.set(field, provenance);
        }
    }
}

fn prefer<T: Clone>(extracted: &Option<T>, submitted: &Option<T>, extracted_wins: bool) -> Option<T> {
    if extracted_wins && extracted.is_some() {
        extracted.clone()
    } else {
        submitted.clone().or_else(|| extracted.clone())
    }
}

/// Extract metadata from the bytes of `AndroidManifest.xml`
///
/// `strings_xml` is the optional `res/values/strings.xml`, consulted only for
/// the application name. Never fails: anything that cannot be recovered is
/// left absent, and a zero-length manifest yields an empty record.
pub fn extract(manifest: &[u8], strings_xml: Option<&[u8]>) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::default();
    if manifest.is_empty() {
        debug!("empty manifest buffer, nothing to extract");
        return outcome;
    }

    match AxmlDocument::decode(manifest) {
        Ok(document) => {
            let projection = ManifestProjector::project(&document);
            for field in MetadataField::ALL {
                if projection.state(field) == FieldState::Resolved {
                    outcome.provenance.set(field, Provenance::StrictDecode);
                }
            }
            if let Some(id) = projection.label_reference {
                debug!("application label is resource 0x{id:08x}, not resolvable from the manifest");
            }
            outcome.metadata = projection.metadata;
        }
        Err(err) => debug!("falling back to heuristics: {err}"),
    }

    if MetadataField::ALL.iter().any(|field| !outcome.metadata.is_set(*field)) {
        let scanner = HeuristicScanner::new(manifest);
        outcome.fill_text(MetadataField::PackageName, Provenance::Heuristic, || {
            scanner.package_name()
        });
        outcome.fill_text(MetadataField::VersionName, Provenance::Heuristic, || {
            scanner.version_name()
        });
        outcome.fill_number(MetadataField::VersionCode, Provenance::Heuristic, || {
            scanner.version_code()
        });
        outcome.fill_number(MetadataField::MinSdkVersion, Provenance::Heuristic, || {
            scanner.min_sdk_version()
        });
        outcome.fill_text(MetadataField::AppName, Provenance::Heuristic, || scanner.app_name());
    }

    // derive only from a version name that was actually found
    let found_version_name = outcome.metadata.version_name.clone();
    outcome.fill_number(MetadataField::VersionCode, Provenance::Derived, || {
        let derived = found_version_name.as_deref().and_then(derive_version_code);
        Some(derived.unwrap_or(DEFAULT_VERSION_CODE))
    });
    outcome.fill_text(MetadataField::VersionName, Provenance::Derived, || {
        Some(DEFAULT_VERSION_NAME.to_string())
    });

    if let Some(strings_xml) = strings_xml {
        outcome.fill_text(MetadataField::AppName, Provenance::StringsXml, || {
            resolve_app_name(strings_xml)
        });
    }
    let package_name = outcome.metadata.package_name.clone();
    outcome.fill_text(MetadataField::AppName, Provenance::Derived, || {
        package_name.as_deref().and_then(derive_app_name)
    });

    outcome
}

/// File and stream helpers around [`extract`]
pub struct ApkMetadataExtractor;

impl ApkMetadataExtractor {
    /// Extract from a manifest file and an optional `strings.xml` file
    ///
    /// Either path may be `-` to read standard input.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use apkmeta::ApkMetadataExtractor;
    ///
    /// let outcome = ApkMetadataExtractor::extract_files("AndroidManifest.xml", None).unwrap();
    /// println!("{:?}", outcome.metadata.package_name);
    /// ```
    pub fn extract_files(manifest_path: &str, strings_path: Option<&str>) -> Result<ExtractionOutcome> {
        let manifest = Self::read_input(manifest_path)?;
        let strings = strings_path.map(Self::read_input).transpose()?;
        Ok(extract(&manifest, strings.as_deref()))
    }

    /// Extract from any reader holding the manifest bytes
    pub fn extract_reader<R: Read>(mut reader: R, strings_xml: Option<&[u8]>) -> Result<ExtractionOutcome> {
        let mut manifest = Vec::new();
        reader.read_to_end(&mut manifest)?;
        Ok(extract(&manifest, strings_xml))
    }

    /// Read a whole file, or standard input for `-`
    pub fn read_input(path: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        if path == "-" {
            io::stdin().lock().read_to_end(&mut data)?;
        } else {
            BufReader::new(File::open(path)?).read_to_end(&mut data)?;
        }
        Ok(data)
    }
}
