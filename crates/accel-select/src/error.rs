//! Error types for accel-select.

use std::collections::TryReserveError;
use std::fmt;

use thiserror::Error;

use crate::status::Status;

/// The runtime entry point that produced a failing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeOperation {
    /// Platform enumeration.
    PlatformIds,
    /// Platform attribute query.
    PlatformInfo,
    /// Device enumeration.
    DeviceIds,
    /// Device attribute query.
    DeviceInfo,
    /// Context creation from a device list.
    CreateContext,
    /// Command queue creation.
    CreateCommandQueue,
}

impl RuntimeOperation {
    /// Name of the runtime entry point.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PlatformIds => "clGetPlatformIDs",
            Self::PlatformInfo => "clGetPlatformInfo",
            Self::DeviceIds => "clGetDeviceIDs",
            Self::DeviceInfo => "clGetDeviceInfo",
            Self::CreateContext => "clCreateContext",
            Self::CreateCommandQueue => "clCreateCommandQueue",
        }
    }
}

impl fmt::Display for RuntimeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while enumerating or selecting devices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    /// A host allocation failed.
    #[error("insufficient host memory")]
    OutOfHostMemory,

    /// The runtime exposes no platforms.
    #[error("no platforms found")]
    NoPlatforms,

    /// A platform that passed the version filter exposes no devices.
    #[error("no devices found on platform {platform_index}")]
    NoDevicesOnPlatform {
        /// Index of the platform in runtime enumeration order.
        platform_index: usize,
    },

    /// No device is eligible across all platforms.
    #[error("no devices found")]
    NoDevices,

    /// A partition handed to the collection does not describe its devices.
    #[error("inconsistent device partition: {0}")]
    InconsistentPartition(String),

    /// A runtime call failed.
    #[error("{operation} failed: {status}")]
    Runtime {
        /// The failing entry point.
        operation: RuntimeOperation,
        /// The status it returned.
        status: Status,
    },
}

impl SelectError {
    /// Build a closure mapping a raw runtime status to an annotated error.
    pub fn runtime(operation: RuntimeOperation) -> impl FnOnce(Status) -> Self {
        move |status| Self::Runtime { operation, status }
    }

    /// The status code a code-based caller would see for this error.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::OutOfHostMemory => Status::INSUFFICIENT_HOST_MEM,
            Self::NoPlatforms => Status::NO_PLATFORMS_FOUND,
            Self::NoDevicesOnPlatform { .. } => Status::NO_DEVICES_FOUND_ON_PLATFORM,
            Self::NoDevices => Status::NO_DEVICES_FOUND,
            Self::InconsistentPartition(_) => Status::INVALID_VALUE,
            Self::Runtime { status, .. } => *status,
        }
    }
}

impl From<TryReserveError> for SelectError {
    fn from(_: TryReserveError) -> Self {
        Self::OutOfHostMemory
    }
}

/// Result type for enumeration and selection.
pub type Result<T> = std::result::Result<T, SelectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_error_display_names_operation() {
        let err = SelectError::runtime(RuntimeOperation::DeviceIds)(Status::INVALID_PLATFORM);
        assert_eq!(
            err.to_string(),
            "clGetDeviceIDs failed: CL_INVALID_PLATFORM (-32)"
        );
    }

    #[test]
    fn status_forwards_runtime_code_verbatim() {
        let err = SelectError::Runtime {
            operation: RuntimeOperation::CreateContext,
            status: Status::from_raw(-1234),
        };
        assert_eq!(err.status().code(), -1234);
    }

    #[test]
    fn status_of_extension_kinds() {
        assert_eq!(SelectError::NoPlatforms.status(), Status::NO_PLATFORMS_FOUND);
        assert_eq!(SelectError::NoDevices.status(), Status::NO_DEVICES_FOUND);
        assert_eq!(
            SelectError::NoDevicesOnPlatform { platform_index: 3 }.status(),
            Status::NO_DEVICES_FOUND_ON_PLATFORM
        );
        assert_eq!(SelectError::OutOfHostMemory.status(), Status::INSUFFICIENT_HOST_MEM);
    }

    #[test]
    fn try_reserve_failure_is_out_of_memory() {
        let mut v: Vec<u64> = Vec::new();
        let err = v.try_reserve_exact(usize::MAX).map_err(SelectError::from);
        assert_eq!(err, Err(SelectError::OutOfHostMemory));
    }
}
