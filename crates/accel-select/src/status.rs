//! Runtime status codes.
//!
//! The accelerator runtime reports every failure as a signed 32-bit code.
//! Runtime-defined codes are zero or negative; the extension codes produced
//! by this crate occupy the positive range so the two never collide.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A status code reported by the accelerator runtime or by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(i32);

impl Status {
    /// The call succeeded.
    pub const SUCCESS: Self = Self(0);
    /// No device matching the requested type exists on the platform.
    pub const DEVICE_NOT_FOUND: Self = Self(-1);
    /// The device exists but is currently unavailable.
    pub const DEVICE_NOT_AVAILABLE: Self = Self(-2);
    /// The compiler is not available.
    pub const COMPILER_NOT_AVAILABLE: Self = Self(-3);
    /// A memory object could not be allocated.
    pub const MEM_OBJECT_ALLOCATION_FAILURE: Self = Self(-4);
    /// The device ran out of resources.
    pub const OUT_OF_RESOURCES: Self = Self(-5);
    /// The runtime could not allocate host memory.
    pub const OUT_OF_HOST_MEMORY: Self = Self(-6);
    /// An argument value was invalid.
    pub const INVALID_VALUE: Self = Self(-30);
    /// The device type mask was invalid.
    pub const INVALID_DEVICE_TYPE: Self = Self(-31);
    /// The platform handle was invalid.
    pub const INVALID_PLATFORM: Self = Self(-32);
    /// The device handle was invalid.
    pub const INVALID_DEVICE: Self = Self(-33);
    /// The context handle was invalid.
    pub const INVALID_CONTEXT: Self = Self(-34);
    /// The command queue properties were invalid.
    pub const INVALID_QUEUE_PROPERTIES: Self = Self(-35);
    /// The command queue handle was invalid.
    pub const INVALID_COMMAND_QUEUE: Self = Self(-36);
    /// The operation is not valid in the current state.
    pub const INVALID_OPERATION: Self = Self(-59);

    /// Extension: the runtime exposes no platforms.
    pub const NO_PLATFORMS_FOUND: Self = Self(4);
    /// Extension: a platform advertised itself but exposes no devices.
    pub const NO_DEVICES_FOUND_ON_PLATFORM: Self = Self(5);
    /// Extension: no eligible device exists across all platforms.
    pub const NO_DEVICES_FOUND: Self = Self(6);
    /// Extension: a host allocation failed.
    pub const INSUFFICIENT_HOST_MEM: Self = Self(9);

    /// Wrap a raw status code.
    #[must_use]
    pub const fn from_raw(code: i32) -> Self {
        Self(code)
    }

    /// The raw status code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Whether this is the success code.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Whether this is one of this crate's positive extension codes.
    #[must_use]
    pub const fn is_extension(self) -> bool {
        self.0 > 0
    }

    /// Convert a raw status into a `Result`, treating zero as success.
    ///
    /// # Errors
    ///
    /// Returns the status itself when it is not [`Status::SUCCESS`].
    pub const fn check(self) -> Result<(), Self> {
        if self.is_success() { Ok(()) } else { Err(self) }
    }

    /// Symbolic name of the code, if it is a well-known one.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "CL_SUCCESS",
            -1 => "CL_DEVICE_NOT_FOUND",
            -2 => "CL_DEVICE_NOT_AVAILABLE",
            -3 => "CL_COMPILER_NOT_AVAILABLE",
            -4 => "CL_MEM_OBJECT_ALLOCATION_FAILURE",
            -5 => "CL_OUT_OF_RESOURCES",
            -6 => "CL_OUT_OF_HOST_MEMORY",
            -7 => "CL_PROFILING_INFO_NOT_AVAILABLE",
            -8 => "CL_MEM_COPY_OVERLAP",
            -9 => "CL_IMAGE_FORMAT_MISMATCH",
            -10 => "CL_IMAGE_FORMAT_NOT_SUPPORTED",
            -11 => "CL_BUILD_PROGRAM_FAILURE",
            -12 => "CL_MAP_FAILURE",
            -13 => "CL_MISALIGNED_SUB_BUFFER_OFFSET",
            -14 => "CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST",
            -15 => "CL_COMPILE_PROGRAM_FAILURE",
            -16 => "CL_LINKER_NOT_AVAILABLE",
            -17 => "CL_LINK_PROGRAM_FAILURE",
            -18 => "CL_DEVICE_PARTITION_FAILED",
            -19 => "CL_KERNEL_ARG_INFO_NOT_AVAILABLE",
            -30 => "CL_INVALID_VALUE",
            -31 => "CL_INVALID_DEVICE_TYPE",
            -32 => "CL_INVALID_PLATFORM",
            -33 => "CL_INVALID_DEVICE",
            -34 => "CL_INVALID_CONTEXT",
            -35 => "CL_INVALID_QUEUE_PROPERTIES",
            -36 => "CL_INVALID_COMMAND_QUEUE",
            -37 => "CL_INVALID_HOST_PTR",
            -38 => "CL_INVALID_MEM_OBJECT",
            -39 => "CL_INVALID_IMAGE_FORMAT_DESCRIPTOR",
            -40 => "CL_INVALID_IMAGE_SIZE",
            -41 => "CL_INVALID_SAMPLER",
            -42 => "CL_INVALID_BINARY",
            -43 => "CL_INVALID_BUILD_OPTIONS",
            -44 => "CL_INVALID_PROGRAM",
            -45 => "CL_INVALID_PROGRAM_EXECUTABLE",
            -46 => "CL_INVALID_KERNEL_NAME",
            -47 => "CL_INVALID_KERNEL_DEFINITION",
            -48 => "CL_INVALID_KERNEL",
            -49 => "CL_INVALID_ARG_INDEX",
            -50 => "CL_INVALID_ARG_VALUE",
            -51 => "CL_INVALID_ARG_SIZE",
            -52 => "CL_INVALID_KERNEL_ARGS",
            -53 => "CL_INVALID_WORK_DIMENSION",
            -54 => "CL_INVALID_WORK_GROUP_SIZE",
            -55 => "CL_INVALID_WORK_ITEM_SIZE",
            -56 => "CL_INVALID_GLOBAL_OFFSET",
            -57 => "CL_INVALID_EVENT_WAIT_LIST",
            -58 => "CL_INVALID_EVENT",
            -59 => "CL_INVALID_OPERATION",
            -60 => "CL_INVALID_GL_OBJECT",
            -61 => "CL_INVALID_BUFFER_SIZE",
            -62 => "CL_INVALID_MIP_LEVEL",
            -63 => "CL_INVALID_GLOBAL_WORK_SIZE",
            -64 => "CL_INVALID_PROPERTY",
            -65 => "CL_INVALID_IMAGE_DESCRIPTOR",
            -66 => "CL_INVALID_COMPILER_OPTIONS",
            -67 => "CL_INVALID_LINKER_OPTIONS",
            -68 => "CL_INVALID_DEVICE_PARTITION_COUNT",
            -69 => "CL_INVALID_PIPE_SIZE",
            -70 => "CL_INVALID_DEVICE_QUEUE",
            -71 => "CL_INVALID_SPEC_ID",
            -72 => "CL_MAX_SIZE_RESTRICTION_EXCEEDED",
            4 => "CL_EXT_NO_PLATFORMS_FOUND",
            5 => "CL_EXT_NO_DEVICES_FOUND_ON_PLATFORM",
            6 => "CL_EXT_NO_DEVICES_FOUND",
            9 => "CL_EXT_INSUFFICIENT_HOST_MEM",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.0),
            None => write!(f, "unknown status ({})", self.0),
        }
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status.0
    }
}
