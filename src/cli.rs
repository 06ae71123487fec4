use crate::{ApkMetadataExtractor, AxmlError, ExtractionOutcome, MetadataField, Result, sdk};
use clap::{Arg, Command};

pub struct Cli;

impl Cli {
    pub fn build_command() -> Command {
        Command::new("apkmeta")
            .about("Extracts package metadata from a compiled AndroidManifest.xml")
            .long_about("Extracts the application name, package name, version and minimum SDK level from a compiled (binary) AndroidManifest.xml.\n\nDamaged manifests are scanned heuristically, and every value is reported with the tier that produced it. Either input can be '-' to use stdin.")
            .arg(
                Arg::new("strings")
                    .short('s')
                    .long("strings")
                    .value_name("PATH")
                    .help("res/values/strings.xml used to resolve the application name"),
            )
            .arg(
                Arg::new("json")
                    .long("json")
                    .help("Print the result as JSON")
                    .action(clap::ArgAction::SetTrue),
            )
            .arg(
                Arg::new("manifest")
                    .help("AndroidManifest.xml path (use '-' for stdin)")
                    .required(true)
                    .index(1),
            )
    }

    pub fn run() -> Result<()> {
        let matches = Self::build_command().get_matches();
        Self::run_with_matches(matches)
    }

    pub fn run_with_matches(matches: clap::ArgMatches) -> Result<()> {
        let manifest_path = matches
            .get_one::<String>("manifest")
            .ok_or_else(|| AxmlError::ParseError("Missing manifest path".to_string()))?;
        let strings_path = matches.get_one::<String>("strings");
        let json = matches.get_flag("json");

        if manifest_path == "-" && strings_path.is_some_and(|path| path == "-") {
            return Err(AxmlError::ParseError(
                "Cannot read both manifest and strings.xml from stdin".to_string(),
            ));
        }

        let outcome = ApkMetadataExtractor::extract_files(manifest_path, strings_path.map(String::as_str))?;
        if json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            print!("{}", Self::render_text(&outcome));
        }
        Ok(())
    }

    /// One line per field: label, value and the tier that produced it
    pub fn render_text(outcome: &ExtractionOutcome) -> String {
        let metadata = &outcome.metadata;
        let mut out = String::new();

        for field in MetadataField::ALL {
            let (label, value) = match field {
                MetadataField::AppName => ("App name", metadata.app_name.clone()),
                MetadataField::PackageName => ("Package", metadata.package_name.clone()),
                MetadataField::VersionName => ("Version name", metadata.version_name.clone()),
                MetadataField::VersionCode => {
                    ("Version code", metadata.version_code.map(|code| code.to_string()))
                }
                MetadataField::MinSdkVersion => (
                    "Min SDK",
                    metadata
                        .min_sdk_version
                        .map(|level| format!("{level} (Android {})", sdk::platform_version(level))),
                ),
            };

            let line = match (value, outcome.provenance.get(field)) {
                (Some(value), Some(provenance)) => format!("{label:<14}{value} [{provenance}]\n"),
                (Some(value), None) => format!("{label:<14}{value}\n"),
                (None, _) => format!("{label:<14}-\n"),
            };
            out.push_str(&line);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract;
    use crate::test_support::demo_manifest;

    #[test]
    fn test_build_command() {
        let cmd = Cli::build_command();
        assert_eq!(cmd.get_name(), "apkmeta");
    }

    #[test]
    fn test_manifest_is_required() {
        let result = Cli::build_command().try_get_matches_from(vec!["apkmeta", "--json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_both_inputs_from_stdin_error() {
        let matches = Cli::build_command()
            .try_get_matches_from(vec!["apkmeta", "-s", "-", "-"])
            .unwrap();

        let result = Cli::run_with_matches(matches);
        assert!(result.is_err());

        if let Err(AxmlError::ParseError(msg)) = result {
            assert!(msg.contains("Cannot read both manifest and strings.xml from stdin"));
        } else {
            panic!("Expected ParseError");
        }
    }

    #[test]
    fn test_missing_manifest_file() {
        let matches = Cli::build_command()
            .try_get_matches_from(vec!["apkmeta", "/nonexistent/AndroidManifest.xml"])
            .unwrap();
        assert!(matches!(Cli::run_with_matches(matches), Err(AxmlError::Io(_))));
    }

    #[test]
    fn test_render_text() {
        let outcome = extract(&demo_manifest(false), None);
        let text = Cli::render_text(&outcome);

        assert!(text.contains("Package       com.example.app [strict decode]"));
        assert!(text.contains("Min SDK       26 (Android 8.0) [strict decode]"));
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn test_render_text_absent_fields() {
        let text = Cli::render_text(&ExtractionOutcome::default());
        assert!(text.lines().all(|line| line.ends_with('-')));
    }
}
