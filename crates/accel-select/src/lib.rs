//! # accel-select
//!
//! Accelerator platform/device enumeration and best-device selection.
//!
//! The crate talks to a compute runtime through the [`ComputeRuntime`] trait
//! and provides:
//! - **Version parsing** - tolerant extraction of `major.minor` from free-form
//!   platform version strings
//! - **Collections** - every eligible device partitioned by owning context,
//!   with binary-search lookup of a device's context
//! - **Views** - ordered, filtered and sorted index views over a collection
//! - **Selection** - the device with the largest capability metric, with its
//!   context and a command queue
//!
//! [`InventoryRuntime`] is an in-memory runtime described by JSON, used by the
//! CLI and by tests.
//!
//! ## Example
//!
//! ```rust
//! use accel_select::{
//!     select_best_device, DeviceSpec, Inventory, InventoryRuntime, PlatformSpec,
//!     SelectionConfig,
//! };
//!
//! let runtime = InventoryRuntime::new(
//!     Inventory::new().with_platform(
//!         PlatformSpec::new("Example", "OpenCL 3.0 example")
//!             .with_device(DeviceSpec::gpu("small", 256))
//!             .with_device(DeviceSpec::gpu("large", 1024)),
//!     ),
//! );
//!
//! let selected = select_best_device(&runtime, &SelectionConfig::default())?;
//! assert_eq!(selected.device_name()?, "large");
//! assert_eq!(selected.capability_metric(), 1024);
//! # Ok::<(), accel_select::SelectError>(())
//! ```
//!
//! ## Resource ownership
//!
//! ```text
//! select_best_device
//!   └── DeviceContextCollection   one context per eligible platform
//!         └── DeviceIndexView     borrowed indices, no handles owned
//!   └── SelectedDevice            winning context + command queue
//! ```
//!
//! Every context and queue is released exactly once, including on error
//! paths.

#![warn(missing_docs)]

pub mod collection;
pub mod config;
pub mod error;
pub mod inventory;
pub mod runtime;
pub mod select;
pub mod status;
pub mod version;
pub mod view;

// Re-exports
pub use collection::{partition_point_by, DeviceContextCollection};
pub use config::{ConfigError, SelectionConfig};
pub use error::{Result, RuntimeOperation, SelectError};
pub use inventory::{DeviceSpec, Inventory, InventoryError, InventoryRuntime, PlatformSpec};
pub use runtime::{ComputeRuntime, DeviceInfo, DeviceType, ParseDeviceTypeError, PlatformInfo};
pub use select::{rank_devices, select_best_device, RankedDevice, SelectedDevice};
pub use status::Status;
pub use version::{
    parse_version_bytes, parse_version_string, ParseVersionError, VersionIdentifier,
};
pub use view::{capability_metric, DeviceIndexView};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
