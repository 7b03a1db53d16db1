//! The accelerator runtime interface consumed by the enumeration core.
//!
//! [`ComputeRuntime`] mirrors the primitive query calls a native binding layer
//! exposes: count-then-fill enumeration, size-then-fill string attributes, and
//! explicit create/release pairs for contexts and command queues. Every call is
//! blocking and reports failure as a raw [`Status`].

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Result, RuntimeOperation, SelectError};
use crate::status::Status;

/// Device type bitmask used to filter device enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceType(u64);

impl DeviceType {
    /// The platform's default device.
    pub const DEFAULT: Self = Self(1 << 0);
    /// Host processors.
    pub const CPU: Self = Self(1 << 1);
    /// Graphics processors.
    pub const GPU: Self = Self(1 << 2);
    /// Dedicated accelerators.
    pub const ACCELERATOR: Self = Self(1 << 3);
    /// Custom devices without full language support.
    pub const CUSTOM: Self = Self(1 << 4);
    /// Every device type.
    pub const ALL: Self = Self(0xFFFF_FFFF);

    /// Wrap a raw bitmask.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The raw bitmask.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether any bit of `other` is set in `self`.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Bits covered by the named single-type flags.
    const NAMED_BITS: u64 = Self::DEFAULT.0
        | Self::CPU.0
        | Self::GPU.0
        | Self::ACCELERATOR.0
        | Self::CUSTOM.0;

    const NAMED: [(&'static str, Self); 6] = [
        ("all", Self::ALL),
        ("default", Self::DEFAULT),
        ("cpu", Self::CPU),
        ("gpu", Self::GPU),
        ("accelerator", Self::ACCELERATOR),
        ("custom", Self::CUSTOM),
    ];
}

impl Default for DeviceType {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for DeviceType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DeviceType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return f.write_str("all");
        }
        let mut first = true;
        for (name, flag) in &Self::NAMED[1..] {
            if self.contains(*flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        let unnamed = self.0 & !Self::NAMED_BITS;
        if unnamed != 0 || first {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{unnamed:#x}")?;
        }
        Ok(())
    }
}

/// Error returned for an unrecognised device type name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown device type '{0}'")]
pub struct ParseDeviceTypeError(String);

impl FromStr for DeviceType {
    type Err = ParseDeviceTypeError;

    /// Parse a `|`-separated list of type names or `0x` hex masks, e.g.
    /// `"gpu|accelerator"` or `"gpu|0x10000000000"`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut mask = Self(0);
        for part in s.split('|') {
            let part = part.trim().to_lowercase();
            let flag = match part.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16).ok().map(Self),
                None => Self::NAMED
                    .iter()
                    .find(|(name, _)| *name == part)
                    .map(|(_, flag)| *flag),
            }
            .ok_or_else(|| ParseDeviceTypeError(s.to_string()))?;
            mask |= flag;
        }
        Ok(mask)
    }
}

impl TryFrom<String> for DeviceType {
    type Error = ParseDeviceTypeError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceType> for String {
    fn from(device_type: DeviceType) -> Self {
        device_type.to_string()
    }
}

/// String-valued platform attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformInfo {
    /// Profile string.
    Profile,
    /// Version string, e.g. `"OpenCL 3.0 CUDA 12.2.140"`.
    Version,
    /// Platform name.
    Name,
    /// Platform vendor.
    Vendor,
}

/// String-valued device attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceInfo {
    /// Device name.
    Name,
    /// Device vendor.
    Vendor,
    /// Device version string.
    Version,
    /// Driver version string.
    DriverVersion,
}

/// Primitive operations of a native accelerator runtime.
///
/// Handles are plain copyable identifiers; ownership of contexts and command
/// queues is tracked by the caller, which must pair every successful
/// `create_*` with exactly one `release_*`.
pub trait ComputeRuntime {
    /// Platform handle. `Default` is the null handle.
    type Platform: Copy + Eq + Default + fmt::Debug;
    /// Device handle. `Default` is the null handle.
    type Device: Copy + Eq + Default + fmt::Debug;
    /// Context handle.
    type Context: Copy + Eq + fmt::Debug;
    /// Command queue handle.
    type Queue: Copy + Eq + fmt::Debug;

    /// Number of platforms exposed by the runtime.
    fn platform_count(&self) -> std::result::Result<usize, Status>;

    /// Fill `out` with platform handles. `out.len()` must not exceed the count.
    fn platform_ids(&self, out: &mut [Self::Platform]) -> std::result::Result<(), Status>;

    /// Size in bytes of a platform attribute, including the trailing NUL.
    fn platform_info_size(
        &self,
        platform: Self::Platform,
        param: PlatformInfo,
    ) -> std::result::Result<usize, Status>;

    /// Copy a platform attribute into `out`.
    fn platform_info(
        &self,
        platform: Self::Platform,
        param: PlatformInfo,
        out: &mut [u8],
    ) -> std::result::Result<(), Status>;

    /// Number of devices of `device_type` on `platform`.
    ///
    /// Returns [`Status::DEVICE_NOT_FOUND`] when there are none.
    fn device_count(
        &self,
        platform: Self::Platform,
        device_type: DeviceType,
    ) -> std::result::Result<usize, Status>;

    /// Fill `out` with device handles of `device_type` on `platform`.
    fn device_ids(
        &self,
        platform: Self::Platform,
        device_type: DeviceType,
        out: &mut [Self::Device],
    ) -> std::result::Result<(), Status>;

    /// Size in bytes of a device attribute, including the trailing NUL.
    fn device_info_size(
        &self,
        device: Self::Device,
        param: DeviceInfo,
    ) -> std::result::Result<usize, Status>;

    /// Copy a device attribute into `out`.
    fn device_info(
        &self,
        device: Self::Device,
        param: DeviceInfo,
        out: &mut [u8],
    ) -> std::result::Result<(), Status>;

    /// Maximum number of work-items schedulable in one work-group.
    fn device_max_work_group_size(&self, device: Self::Device)
    -> std::result::Result<usize, Status>;

    /// The platform that owns `device`.
    fn device_platform(&self, device: Self::Device)
    -> std::result::Result<Self::Platform, Status>;

    /// Create a context spanning `devices`.
    fn create_context(&self, devices: &[Self::Device])
    -> std::result::Result<Self::Context, Status>;

    /// Release a context created by [`ComputeRuntime::create_context`].
    fn release_context(&self, context: Self::Context);

    /// Create a command queue for `device` within `context`.
    fn create_command_queue(
        &self,
        context: Self::Context,
        device: Self::Device,
    ) -> std::result::Result<Self::Queue, Status>;

    /// Release a queue created by [`ComputeRuntime::create_command_queue`].
    fn release_command_queue(&self, queue: Self::Queue);
}

fn buffer_to_string(mut buf: Vec<u8>) -> String {
    if let Some(nul) = buf.iter().position(|&b| b == 0) {
        buf.truncate(nul);
    }
    match String::from_utf8(buf) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

fn zeroed_buffer(size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)?;
    buf.resize(size, 0);
    Ok(buf)
}

/// Query a platform string attribute using the size-then-fill pattern.
///
/// # Errors
///
/// Returns [`SelectError::OutOfHostMemory`] if the buffer cannot be
/// allocated, or the runtime status annotated with
/// [`RuntimeOperation::PlatformInfo`].
pub fn platform_string<R: ComputeRuntime + ?Sized>(
    runtime: &R,
    platform: R::Platform,
    param: PlatformInfo,
) -> Result<String> {
    let size = runtime
        .platform_info_size(platform, param)
        .map_err(SelectError::runtime(RuntimeOperation::PlatformInfo))?;
    let mut buf = zeroed_buffer(size)?;
    runtime
        .platform_info(platform, param, &mut buf)
        .map_err(SelectError::runtime(RuntimeOperation::PlatformInfo))?;
    Ok(buffer_to_string(buf))
}

/// Query a device string attribute using the size-then-fill pattern.
///
/// # Errors
///
/// Returns [`SelectError::OutOfHostMemory`] if the buffer cannot be
/// allocated, or the runtime status annotated with
/// [`RuntimeOperation::DeviceInfo`].
pub fn device_string<R: ComputeRuntime + ?Sized>(
    runtime: &R,
    device: R::Device,
    param: DeviceInfo,
) -> Result<String> {
    let size = runtime
        .device_info_size(device, param)
        .map_err(SelectError::runtime(RuntimeOperation::DeviceInfo))?;
    let mut buf = zeroed_buffer(size)?;
    runtime
        .device_info(device, param, &mut buf)
        .map_err(SelectError::runtime(RuntimeOperation::DeviceInfo))?;
    Ok(buffer_to_string(buf))
}

/// Enumerate every platform handle using the count-then-fill pattern.
///
/// # Errors
///
/// Returns [`SelectError::NoPlatforms`] when the runtime reports none.
pub fn platform_handles<R: ComputeRuntime + ?Sized>(runtime: &R) -> Result<Vec<R::Platform>> {
    let count = runtime
        .platform_count()
        .map_err(SelectError::runtime(RuntimeOperation::PlatformIds))?;
    if count == 0 {
        return Err(SelectError::NoPlatforms);
    }
    let mut platforms = Vec::new();
    platforms.try_reserve_exact(count)?;
    platforms.resize(count, R::Platform::default());
    runtime
        .platform_ids(&mut platforms)
        .map_err(SelectError::runtime(RuntimeOperation::PlatformIds))?;
    Ok(platforms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_type_parse() {
        assert_eq!("all".parse(), Ok(DeviceType::ALL));
        assert_eq!("GPU".parse(), Ok(DeviceType::GPU));
        assert_eq!(
            "gpu|accelerator".parse(),
            Ok(DeviceType::GPU | DeviceType::ACCELERATOR)
        );
        assert!("fpga".parse::<DeviceType>().is_err());
    }

    #[test]
    fn device_type_display() {
        assert_eq!(DeviceType::ALL.to_string(), "all");
        assert_eq!(DeviceType::CPU.to_string(), "cpu");
        assert_eq!(
            (DeviceType::CPU | DeviceType::GPU).to_string(),
            "cpu|gpu"
        );
        assert_eq!(DeviceType::from_bits(1 << 40).to_string(), "0x10000000000");
    }

    #[test]
    fn device_type_masks() {
        assert!(DeviceType::ALL.contains(DeviceType::GPU));
        assert!(DeviceType::ALL.intersects(DeviceType::CUSTOM));
        assert!(!DeviceType::GPU.intersects(DeviceType::CPU));
        assert_eq!(DeviceType::default(), DeviceType::ALL);
    }

    #[test]
    fn device_type_serde_roundtrip() {
        let mask = DeviceType::GPU | DeviceType::ACCELERATOR;
        let json = serde_json::to_string(&mask).expect("serialize");
        assert_eq!(json, "\"gpu|accelerator\"");
        let back: DeviceType = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, mask);
    }

    #[test]
    fn device_type_unnamed_bits_roundtrip() {
        let masks = [
            DeviceType::from_bits(0),
            DeviceType::from_bits(1 << 40),
            DeviceType::GPU | DeviceType::from_bits(1 << 40),
            DeviceType::ALL | DeviceType::from_bits(1 << 33),
        ];
        for mask in masks {
            let json = serde_json::to_string(&mask).expect("serialize");
            let back: DeviceType = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(back, mask, "{json}");
        }
        assert_eq!(
            (DeviceType::GPU | DeviceType::from_bits(1 << 40)).to_string(),
            "gpu|0x10000000000"
        );
        assert_eq!("0x4".parse(), Ok(DeviceType::GPU));
        assert!("0xzz".parse::<DeviceType>().is_err());
        assert!("0x".parse::<DeviceType>().is_err());
    }

    #[test]
    fn buffer_strips_nul() {
        assert_eq!(buffer_to_string(b"OpenCL 2.1\0".to_vec()), "OpenCL 2.1");
        assert_eq!(buffer_to_string(b"abc".to_vec()), "abc");
        assert_eq!(buffer_to_string(vec![0]), "");
    }
}
