//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;

use accel_select::{RankedDevice, VersionIdentifier};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// The device picked by `select`.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionReport {
    /// Platform name.
    pub platform: String,
    /// Platform version string as reported.
    pub platform_version: String,
    /// Parsed platform version.
    pub parsed_version: VersionIdentifier,
    /// Device name.
    pub device: String,
    /// Device vendor.
    pub vendor: String,
    /// Capability metric the device won with.
    pub capability_metric: usize,
}

impl TableDisplay for SelectionReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Selected Device")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Device:           {}", self.device)?;
        if !self.vendor.is_empty() {
            writeln!(writer, "Vendor:           {}", self.vendor)?;
        }
        writeln!(writer, "Work-group size:  {}", self.capability_metric)?;
        writeln!(writer)?;
        writeln!(writer, "Platform")?;
        writeln!(writer, "  Name:           {}", self.platform)?;
        writeln!(
            writer,
            "  Version:        {} ({})",
            self.parsed_version, self.platform_version
        )?;
        Ok(())
    }
}

/// Every eligible device, best first.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRanking {
    /// Devices, best first.
    pub devices: Vec<RankedDevice>,
}

impl TableDisplay for DeviceRanking {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.devices.is_empty() {
            writeln!(writer, "No eligible devices")?;
            return Ok(());
        }

        // Header
        writeln!(
            writer,
            "{:>4}  {:<24}  {:<20}  {:>7}  {:>10}",
            "RANK", "DEVICE", "PLATFORM", "CONTEXT", "WORK-GROUP"
        )?;
        writeln!(writer, "{}", "─".repeat(73))?;

        // Rows
        for (rank, device) in self.devices.iter().enumerate() {
            writeln!(
                writer,
                "{:>4}  {:<24}  {:<20}  {:>7}  {:>10}",
                rank + 1,
                truncate(&device.device_name, 24),
                truncate(&device.platform_name, 20),
                device.context_index,
                device.capability_metric
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} device(s)", self.devices.len())?;
        Ok(())
    }
}

/// How a version string was interpreted.
#[derive(Debug, Clone, Serialize)]
pub struct VersionReport {
    /// The input string.
    pub input: String,
    /// Parsed version; `0.0` when nothing could be extracted.
    pub version: VersionIdentifier,
    /// Major component.
    pub major: u16,
    /// Minor component.
    pub minor: u16,
}

impl VersionReport {
    /// Build a report for `input` and its parsed version.
    #[must_use]
    pub fn new(input: impl Into<String>, version: VersionIdentifier) -> Self {
        Self {
            input: input.into(),
            version,
            major: version.major,
            minor: version.minor,
        }
    }
}

impl TableDisplay for VersionReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Input:    {:?}", self.input)?;
        writeln!(writer, "Version:  {}", self.version)?;
        Ok(())
    }
}

/// Truncate a string to `max` characters, marking the cut with `…`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
