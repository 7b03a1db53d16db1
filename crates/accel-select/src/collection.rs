//! Devices grouped under the contexts that own them.
//!
//! A [`DeviceContextCollection`] stores every enumerated device in one flat
//! array. Devices that share a context occupy a contiguous range, and the
//! collection records the exclusive end of each range so that any device index
//! can be mapped back to its owning context with a binary search.

use std::fmt;
use std::ops::{Index, Range};

use tracing::{debug, warn};

use crate::config::SelectionConfig;
use crate::error::{Result, RuntimeOperation, SelectError};
use crate::runtime::{platform_handles, platform_string, ComputeRuntime, DeviceType, PlatformInfo};
use crate::status::Status;
use crate::version::{parse_version_string, VersionIdentifier};
use crate::view::DeviceIndexView;

/// Find the first index in `0..len` for which `pred` holds.
///
/// `pred` must be monotone: false for a (possibly empty) prefix and true for
/// the rest. Returns `len` when it never holds. The midpoint is computed as
/// `low + (high - low) / 2`, so `len` may be as large as `usize::MAX`.
pub fn partition_point_by(len: usize, mut pred: impl FnMut(usize) -> bool) -> usize {
    let mut low = 0;
    let mut high = len;
    while low < high {
        let middle = low + (high - low) / 2;
        if pred(middle) {
            high = middle;
        } else {
            low = middle + 1;
        }
    }
    low
}

/// Contexts created so far during one enumeration pass.
///
/// Dropping the guard releases them, so every early return on an error path
/// gives back exactly the contexts that pass acquired.
struct ContextGuard<'rt, R: ComputeRuntime + ?Sized> {
    runtime: &'rt R,
    contexts: Vec<R::Context>,
}

impl<'rt, R: ComputeRuntime + ?Sized> ContextGuard<'rt, R> {
    fn with_capacity(runtime: &'rt R, capacity: usize) -> Result<Self> {
        let mut contexts = Vec::new();
        contexts.try_reserve_exact(capacity)?;
        Ok(Self { runtime, contexts })
    }

    fn adopt(runtime: &'rt R, contexts: Vec<R::Context>) -> Self {
        Self { runtime, contexts }
    }

    fn push(&mut self, context: R::Context) {
        self.contexts.push(context);
    }

    fn into_inner(mut self) -> Vec<R::Context> {
        std::mem::take(&mut self.contexts)
    }
}

impl<R: ComputeRuntime + ?Sized> Drop for ContextGuard<'_, R> {
    fn drop(&mut self) {
        if !self.contexts.is_empty() {
            debug!(count = self.contexts.len(), "releasing contexts from aborted enumeration");
        }
        for context in self.contexts.drain(..) {
            self.runtime.release_context(context);
        }
    }
}

/// A platform that passed the version filter, with its device count.
#[derive(Debug, Clone, Copy)]
struct EligiblePlatform<P> {
    index: usize,
    handle: P,
    device_count: usize,
}

/// Every eligible device, partitioned by owning context.
///
/// The collection exclusively owns its contexts and releases each of them
/// exactly once when dropped. Devices are owned by their context in the
/// runtime and are never released individually.
pub struct DeviceContextCollection<'rt, R: ComputeRuntime + ?Sized> {
    runtime: &'rt R,
    devices: Box<[R::Device]>,
    contexts: Box<[R::Context]>,
    context_end_indices: Box<[usize]>,
}

impl<'rt, R: ComputeRuntime + ?Sized> DeviceContextCollection<'rt, R> {
    /// Enumerate every device on every platform satisfying `config`.
    ///
    /// One context is created per eligible platform, spanning all of that
    /// platform's matching devices.
    ///
    /// # Errors
    ///
    /// Fails with [`SelectError::NoPlatforms`] if the runtime has no
    /// platforms, [`SelectError::NoDevicesOnPlatform`] if an eligible platform
    /// exposes no devices to an all-types query (platforms without a device
    /// of a narrower requested type are skipped),
    /// [`SelectError::OutOfHostMemory`] on allocation
    /// failure, or the annotated runtime status of any failing call. Contexts
    /// created before the failure are released.
    pub fn enumerate(runtime: &'rt R, config: &SelectionConfig) -> Result<Self> {
        let eligible = eligible_platforms(
            runtime,
            config.min_platform_version,
            config.device_type,
        )?;

        let device_total = eligible
            .iter()
            .try_fold(0usize, |acc, p| acc.checked_add(p.device_count))
            .ok_or(SelectError::OutOfHostMemory)?;

        let mut devices = Vec::new();
        devices.try_reserve_exact(device_total)?;
        devices.resize(device_total, R::Device::default());

        let mut context_end_indices = Vec::new();
        context_end_indices.try_reserve_exact(eligible.len())?;

        let mut contexts = ContextGuard::with_capacity(runtime, eligible.len())?;

        let mut start = 0;
        for platform in &eligible {
            let end = start + platform.device_count;
            let slots = &mut devices[start..end];
            runtime
                .device_ids(platform.handle, config.device_type, slots)
                .map_err(SelectError::runtime(RuntimeOperation::DeviceIds))?;
            let context = runtime
                .create_context(slots)
                .map_err(SelectError::runtime(RuntimeOperation::CreateContext))?;
            debug!(
                platform = platform.index,
                devices = platform.device_count,
                ?context,
                "created context"
            );
            contexts.push(context);
            context_end_indices.push(end);
            start = end;
        }

        Ok(Self {
            runtime,
            devices: devices.into_boxed_slice(),
            contexts: contexts.into_inner().into_boxed_slice(),
            context_end_indices: context_end_indices.into_boxed_slice(),
        })
    }

    /// Shorthand for [`enumerate`](Self::enumerate) over every device type.
    ///
    /// # Errors
    ///
    /// See [`enumerate`](Self::enumerate).
    pub fn enumerate_with_min_version(
        runtime: &'rt R,
        min_platform_version: VersionIdentifier,
    ) -> Result<Self> {
        Self::enumerate(
            runtime,
            &SelectionConfig {
                min_platform_version,
                device_type: DeviceType::ALL,
            },
        )
    }

    /// Assemble a collection from already-created parts, taking ownership of
    /// `contexts`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::InconsistentPartition`] if the end indices are
    /// not strictly increasing, do not match the context count, or do not end
    /// at the device count. The contexts are released in that case.
    pub fn from_parts(
        runtime: &'rt R,
        devices: Vec<R::Device>,
        contexts: Vec<R::Context>,
        context_end_indices: Vec<usize>,
    ) -> Result<Self> {
        let contexts = ContextGuard::adopt(runtime, contexts);
        validate_partition(devices.len(), contexts.contexts.len(), &context_end_indices)?;
        Ok(Self {
            runtime,
            devices: devices.into_boxed_slice(),
            contexts: contexts.into_inner().into_boxed_slice(),
            context_end_indices: context_end_indices.into_boxed_slice(),
        })
    }

    /// The runtime this collection was enumerated from.
    #[must_use]
    pub fn runtime(&self) -> &'rt R {
        self.runtime
    }

    /// Number of devices.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Number of contexts.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Whether the collection holds no devices (and therefore no contexts).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// All devices, contiguous by owning context.
    #[must_use]
    pub fn devices(&self) -> &[R::Device] {
        &self.devices
    }

    /// All contexts, in partition order.
    #[must_use]
    pub fn contexts(&self) -> &[R::Context] {
        &self.contexts
    }

    /// Exclusive end of each context's device range.
    #[must_use]
    pub fn context_end_indices(&self) -> &[usize] {
        &self.context_end_indices
    }

    /// The device at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range. Indices taken from a
    /// [`DeviceIndexView`] over this collection are always in range.
    #[must_use]
    pub fn device(&self, index: usize) -> R::Device {
        self.devices[index]
    }

    /// Mutable access to the device handle at `index`.
    pub fn device_mut(&mut self, index: usize) -> &mut R::Device {
        &mut self.devices[index]
    }

    /// Index of the context owning the device at `device_index`.
    #[must_use]
    pub fn context_index_for_device(&self, device_index: usize) -> usize {
        debug_assert!(device_index < self.devices.len());
        let ends = &self.context_end_indices;
        partition_point_by(ends.len(), |c| ends[c] > device_index)
    }

    /// The context owning the device at `device_index`.
    #[must_use]
    pub fn context_for_device(&self, device_index: usize) -> R::Context {
        self.contexts[self.context_index_for_device(device_index)]
    }

    /// Device index range owned by the context at `context_index`.
    #[must_use]
    pub fn device_range(&self, context_index: usize) -> Range<usize> {
        let start = match context_index {
            0 => 0,
            c => self.context_end_indices[c - 1],
        };
        start..self.context_end_indices[context_index]
    }

    /// Devices owned by the context at `context_index`.
    #[must_use]
    pub fn devices_of_context(&self, context_index: usize) -> &[R::Device] {
        &self.devices[self.device_range(context_index)]
    }

    /// Identity view over every device.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::OutOfHostMemory`] if the index array cannot be
    /// allocated.
    pub fn index_view(&self) -> Result<DeviceIndexView<'_, 'rt, R>> {
        DeviceIndexView::new(self)
    }

    /// Consume the collection, keeping only the context at `context_index`.
    ///
    /// Every other context is released; the returned one becomes the caller's
    /// to release.
    #[must_use]
    pub fn into_context(mut self, context_index: usize) -> R::Context {
        let kept = self.contexts[context_index];
        let contexts = std::mem::take(&mut self.contexts);
        for (i, context) in contexts.iter().enumerate() {
            if i != context_index {
                self.runtime.release_context(*context);
            }
        }
        kept
    }
}

impl<R: ComputeRuntime + ?Sized> Index<usize> for DeviceContextCollection<'_, R> {
    type Output = R::Device;

    fn index(&self, index: usize) -> &R::Device {
        &self.devices[index]
    }
}

impl<R: ComputeRuntime + ?Sized> Drop for DeviceContextCollection<'_, R> {
    fn drop(&mut self) {
        for context in self.contexts.iter() {
            self.runtime.release_context(*context);
        }
    }
}

impl<R: ComputeRuntime + ?Sized> fmt::Debug for DeviceContextCollection<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContextCollection")
            .field("devices", &self.devices)
            .field("contexts", &self.contexts)
            .field("context_end_indices", &self.context_end_indices)
            .finish()
    }
}

fn validate_partition(device_count: usize, context_count: usize, ends: &[usize]) -> Result<()> {
    if ends.len() != context_count {
        return Err(SelectError::InconsistentPartition(format!(
            "{} end indices for {context_count} contexts",
            ends.len()
        )));
    }
    let mut previous = 0;
    for (i, &end) in ends.iter().enumerate() {
        if end <= previous {
            return Err(SelectError::InconsistentPartition(format!(
                "context {i} ends at {end}, not after {previous}"
            )));
        }
        previous = end;
    }
    if previous != device_count {
        return Err(SelectError::InconsistentPartition(format!(
            "partition covers {previous} of {device_count} devices"
        )));
    }
    Ok(())
}

/// Platforms whose version satisfies `minimum`, with their device counts.
///
/// With a narrowed `device_type`, platforms exposing no such device are
/// skipped rather than treated as a driver fault.
fn eligible_platforms<R: ComputeRuntime + ?Sized>(
    runtime: &R,
    minimum: VersionIdentifier,
    device_type: DeviceType,
) -> Result<Vec<EligiblePlatform<R::Platform>>> {
    let platforms = platform_handles(runtime)?;
    // Only an all-types query must find devices on every eligible platform.
    let narrowed = !device_type.contains(DeviceType::ALL);

    let mut eligible = Vec::new();
    eligible.try_reserve_exact(platforms.len())?;

    for (index, &handle) in platforms.iter().enumerate() {
        let version_string = platform_string(runtime, handle, PlatformInfo::Version)?;
        let version = parse_version_string(&version_string);
        if !version.satisfies(&minimum) {
            warn!(
                platform = index,
                %version,
                %minimum,
                raw = %version_string,
                "skipping platform below minimum version"
            );
            continue;
        }

        let device_count = match runtime.device_count(handle, device_type) {
            Ok(0) | Err(Status::DEVICE_NOT_FOUND) if narrowed => {
                debug!(platform = index, %device_type, "no devices of the requested type");
                continue;
            }
            Ok(0) | Err(Status::DEVICE_NOT_FOUND) => {
                return Err(SelectError::NoDevicesOnPlatform {
                    platform_index: index,
                });
            }
            Ok(n) => n,
            Err(status) => {
                return Err(SelectError::Runtime {
                    operation: RuntimeOperation::DeviceIds,
                    status,
                });
            }
        };

        debug!(platform = index, %version, devices = device_count, "platform eligible");
        eligible.push(EligiblePlatform {
            index,
            handle,
            device_count,
        });
    }

    if eligible.is_empty() {
        warn!(
            %minimum,
            %device_type,
            platforms = platforms.len(),
            "no platform satisfies the minimum version and device type"
        );
    }
    Ok(eligible)
}
