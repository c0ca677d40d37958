//! Command-line configuration.

use crate::formatter::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// Default directory for generated artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "./provisioning";

/// File name of the schema documentation.
pub const DOCUMENTATION_FILE: &str = "schema_documentation.json";

/// File name of the PASS/FAIL run report.
pub const REPORT_FILE: &str = "provisioning_report.json";

/// File name of the per-object apply results.
pub const RESULTS_FILE: &str = "apply_results.json";

/// Provisioning run configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Manifest to provision. None uses the bundled therapy-device manifest.
    pub manifest: Option<PathBuf>,

    /// Directory for generated artifacts. None disables file output.
    pub output_dir: Option<PathBuf>,

    /// Format of the summary printed to stdout.
    pub format: OutputFormat,
}

impl CliConfig {
    /// Create a configuration writing artifacts to the given directory.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest: None,
            output_dir: Some(output_dir.into()),
            format: OutputFormat::Table,
        }
    }

    /// Set the manifest path.
    pub fn with_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest = Some(path.into());
        self
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Disable file output.
    pub fn without_output(mut self) -> Self {
        self.output_dir = None;
        self
    }

    /// Set the summary format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Check if artifacts are written to disk.
    pub fn writes_output(&self) -> bool {
        self.output_dir.is_some()
    }

    /// Path of an artifact inside the output directory.
    pub fn artifact_path(&self, file_name: &str) -> Option<PathBuf> {
        self.output_dir.as_ref().map(|dir| dir.join(file_name))
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "clinschema")]
#[command(
    version,
    about = "Provision a clinical schema and check its compliance posture",
    long_about = None
)]
pub struct Args {
    /// Manifest to provision (defaults to the bundled therapy-device schema).
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Directory for documentation and reports.
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Do not write documentation or reports.
    #[arg(long)]
    pub no_output: bool,

    /// Summary format.
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,
}

impl Args {
    /// Convert command-line arguments to a run configuration.
    pub fn into_config(self) -> CliConfig {
        let output_dir = if self.no_output {
            None
        } else {
            Some(self.output_dir)
        };

        CliConfig {
            manifest: self.manifest,
            output_dir,
            format: self.format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert!(config.manifest.is_none());
        assert_eq!(config.output_dir, Some(PathBuf::from(DEFAULT_OUTPUT_DIR)));
        assert_eq!(config.format, OutputFormat::Table);
        assert!(config.writes_output());
    }

    #[test]
    fn test_config_builder() {
        let config = CliConfig::default()
            .with_manifest("/etc/clinschema/clinic.json")
            .with_output_dir("/var/lib/clinschema")
            .with_format(OutputFormat::Json);

        assert_eq!(
            config.manifest,
            Some(PathBuf::from("/etc/clinschema/clinic.json"))
        );
        assert_eq!(
            config.artifact_path(REPORT_FILE),
            Some(PathBuf::from("/var/lib/clinschema").join(REPORT_FILE))
        );
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_without_output() {
        let config = CliConfig::default().without_output();
        assert!(!config.writes_output());
        assert!(config.artifact_path(DOCUMENTATION_FILE).is_none());
    }

    #[test]
    fn test_args_into_config() {
        let args = Args::parse_from([
            "clinschema",
            "--manifest",
            "clinic.json",
            "--no-output",
            "--format",
            "json",
        ]);
        let config = args.into_config();
        assert_eq!(config.manifest, Some(PathBuf::from("clinic.json")));
        assert!(config.output_dir.is_none());
        assert_eq!(config.format, OutputFormat::Json);

        let config = Args::parse_from(["clinschema", "-o", "out"]).into_config();
        assert!(config.manifest.is_none());
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
        assert_eq!(config.format, OutputFormat::Table);
    }
}
