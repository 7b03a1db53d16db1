//! Best-device selection command.

use std::io::Write;
use std::path::PathBuf;

use accel_select::runtime::{device_string, platform_string};
use accel_select::{
    parse_version_string, select_best_device, DeviceInfo, Inventory, InventoryRuntime,
    PlatformInfo, SelectionConfig,
};

use crate::error::CliError;
use crate::output::{OutputFormat, SelectionReport};

/// Select command executor.
pub struct SelectCommand {
    inventory: PathBuf,
    config: SelectionConfig,
}

impl SelectCommand {
    /// Create a new select command over the inventory at `inventory`.
    #[must_use]
    pub fn new(inventory: impl Into<PathBuf>, config: SelectionConfig) -> Self {
        Self {
            inventory: inventory.into(),
            config,
        }
    }

    /// Execute the select command.
    ///
    /// # Errors
    ///
    /// Returns an error if the inventory cannot be loaded, selection fails or
    /// output fails.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let report = self.report()?;
        format.write(writer, &report)?;
        Ok(())
    }

    /// Run the selection and describe the winning device.
    ///
    /// The selected context and queue are released before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the inventory cannot be loaded or selection fails.
    pub fn report(&self) -> Result<SelectionReport, CliError> {
        let runtime = InventoryRuntime::new(Inventory::load(&self.inventory)?);
        let selected = select_best_device(&runtime, &self.config)?;

        let platform_version =
            platform_string(&runtime, selected.platform(), PlatformInfo::Version)?;
        Ok(SelectionReport {
            platform: selected.platform_name()?,
            parsed_version: parse_version_string(&platform_version),
            platform_version,
            device: selected.device_name()?,
            vendor: device_string(&runtime, selected.device(), DeviceInfo::Vendor)?,
            capability_metric: selected.capability_metric(),
        })
    }
}
