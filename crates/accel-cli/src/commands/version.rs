//! Version string interpretation command.

use std::io::Write;

use accel_select::parse_version_string;

use crate::error::CliError;
use crate::output::{OutputFormat, VersionReport};

/// Parse-version command executor.
pub struct ParseVersionCommand {
    input: String,
}

impl ParseVersionCommand {
    /// Create a new parse-version command for `input`.
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Execute the parse-version command. Never fails on the input itself:
    /// unparseable strings report `0.0`.
    ///
    /// # Errors
    ///
    /// Returns an error if output fails.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let version = parse_version_string(&self.input);
        format.write(writer, &VersionReport::new(self.input.as_str(), version))?;
        Ok(())
    }
}
