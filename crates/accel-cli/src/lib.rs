//! # accel-cli
//!
//! Command-line interface for `accel-select`.
//!
//! Provides commands for:
//! - Selecting the most capable device in an inventory
//! - Ranking every eligible device
//! - Inspecting how platform version strings are interpreted
//!
//! Inventories are JSON documents describing platforms and their devices;
//! see [`accel_select::Inventory`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format};
pub use error::CliError;
pub use output::OutputFormat;
