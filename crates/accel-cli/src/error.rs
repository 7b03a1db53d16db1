//! CLI error types.

use accel_select::{ConfigError, InventoryError, SelectError, Status};
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// No inventory was given.
    #[error("no inventory given: pass --inventory or set ACCEL_INVENTORY")]
    MissingInventory,

    /// The inventory could not be loaded.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// The selection config could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Enumeration or selection failed.
    #[error("selection failed: {0}")]
    Select(#[from] SelectError),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// The runtime-compatible status code, for selection failures.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Select(err) => Some(err.status()),
            _ => None,
        }
    }
}
