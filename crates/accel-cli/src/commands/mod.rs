//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`select`] - Best-device selection
//! - [`list`] - Device ranking
//! - [`version`] - Version string interpretation

pub mod list;
pub mod select;
pub mod version;

pub use list::ListCommand;
pub use select::SelectCommand;
pub use version::ParseVersionCommand;
