//! Device ranking command.

use std::io::Write;
use std::path::PathBuf;

use accel_select::{rank_devices, Inventory, InventoryRuntime, SelectionConfig};

use crate::error::CliError;
use crate::output::{DeviceRanking, OutputFormat};

/// List command executor.
pub struct ListCommand {
    inventory: PathBuf,
    config: SelectionConfig,
}

impl ListCommand {
    /// Create a new list command over the inventory at `inventory`.
    #[must_use]
    pub fn new(inventory: impl Into<PathBuf>, config: SelectionConfig) -> Self {
        Self {
            inventory: inventory.into(),
            config,
        }
    }

    /// Execute the list command.
    ///
    /// # Errors
    ///
    /// Returns an error if the inventory cannot be loaded, enumeration fails
    /// or output fails.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let runtime = InventoryRuntime::new(Inventory::load(&self.inventory)?);
        let ranking = DeviceRanking {
            devices: rank_devices(&runtime, &self.config)?,
        };
        format.write(writer, &ranking)?;
        Ok(())
    }
}
