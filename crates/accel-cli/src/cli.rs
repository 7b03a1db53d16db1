//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use accel_select::{DeviceType, SelectionConfig, VersionIdentifier};

use crate::error::CliError;

/// accel-select - pick the most capable accelerator device.
#[derive(Parser, Debug, Clone)]
#[command(name = "accel-select")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON inventory describing the platforms and devices to select from.
    #[arg(short, long, env = "ACCEL_INVENTORY", global = true)]
    pub inventory: Option<PathBuf>,

    /// JSON selection config file. Flags override its values.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Minimum platform version, as `<major>.<minor>`.
    #[arg(short, long, env = "ACCEL_MIN_VERSION", global = true)]
    pub min_version: Option<VersionIdentifier>,

    /// Device types to consider, e.g. `gpu` or `cpu|gpu`.
    #[arg(short, long, global = true)]
    pub device_type: Option<DeviceType>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Select the best device and report it.
    Select,

    /// List every eligible device, best first.
    List,

    /// Show how a platform version string is interpreted.
    ParseVersion {
        /// Version string as a runtime would report it.
        input: String,
    },
}

impl Cli {
    /// The selection config: the config file (or defaults) with flag
    /// overrides applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded.
    pub fn selection_config(&self) -> Result<SelectionConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => SelectionConfig::load(path)?,
            None => SelectionConfig::default(),
        };
        if let Some(version) = self.min_version {
            config.min_platform_version = version;
        }
        if let Some(device_type) = self.device_type {
            config.device_type = device_type;
        }
        debug!(?config, "resolved selection config");
        Ok(config)
    }

    /// The inventory path.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::MissingInventory`] if neither `--inventory` nor
    /// `ACCEL_INVENTORY` was given.
    pub fn inventory_path(&self) -> Result<&PathBuf, CliError> {
        self.inventory.as_ref().ok_or(CliError::MissingInventory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_select() {
        let cli = Cli::parse_from(["accel-select", "--inventory", "inv.json", "select"]);
        assert!(matches!(cli.command, Commands::Select));
        assert_eq!(cli.inventory, Some(PathBuf::from("inv.json")));
        assert_eq!(cli.format, Format::Table);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["accel-select", "list", "--format", "json", "-m", "2.0"]);
        assert!(matches!(cli.command, Commands::List));
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.min_version, Some(VersionIdentifier::new(2, 0)));
    }

    #[test]
    fn parses_device_type_mask() {
        let cli = Cli::parse_from(["accel-select", "--device-type", "cpu|gpu", "select"]);
        assert_eq!(cli.device_type, Some(DeviceType::CPU | DeviceType::GPU));
    }

    #[test]
    fn rejects_bad_min_version() {
        let result = Cli::try_parse_from(["accel-select", "--min-version", "OpenCL", "select"]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_parse_version() {
        let cli = Cli::parse_from(["accel-select", "parse-version", "OpenCL 2.1 AMD"]);
        match cli.command {
            Commands::ParseVersion { input } => assert_eq!(input, "OpenCL 2.1 AMD"),
            other => panic!("expected parse-version, got {other:?}"),
        }
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{ "min_platform_version": "3.0", "device_type": "cpu" }}"#)
            .expect("write");
        let path = file.path().to_string_lossy().into_owned();

        let cli = Cli::parse_from(["accel-select", "--config", path.as_str(), "select"]);
        let config = cli.selection_config().expect("config");
        assert_eq!(config.min_platform_version, VersionIdentifier::new(3, 0));
        assert_eq!(config.device_type, DeviceType::CPU);

        let cli = Cli::parse_from(["accel-select", "--config", path.as_str(), "-m", "1.1", "select"]);
        let config = cli.selection_config().expect("config");
        assert_eq!(config.min_platform_version, VersionIdentifier::new(1, 1));
        assert_eq!(config.device_type, DeviceType::CPU);
    }

    #[test]
    fn missing_inventory() {
        let cli = Cli {
            inventory: None,
            config: None,
            min_version: None,
            device_type: None,
            format: Format::Table,
            command: Commands::Select,
        };
        assert!(matches!(cli.inventory_path(), Err(CliError::MissingInventory)));
    }
}
