//! Best-device selection.
//!
//! [`select_best_device`] enumerates every eligible device, ranks them by
//! capability metric and hands back the winner together with its context and a
//! fresh command queue. Everything else it acquired along the way is released
//! before it returns, on success and on every error path.

use std::fmt;
use std::mem::ManuallyDrop;

use serde::Serialize;
use tracing::info;

use crate::collection::DeviceContextCollection;
use crate::config::SelectionConfig;
use crate::error::{Result, RuntimeOperation, SelectError};
use crate::runtime::{device_string, platform_string, ComputeRuntime, DeviceInfo, PlatformInfo};
use crate::view::capability_metric;

/// The device chosen by [`select_best_device`].
///
/// Owns one context and one command queue. Dropping it releases the queue and
/// then the context.
pub struct SelectedDevice<'rt, R: ComputeRuntime + ?Sized> {
    runtime: &'rt R,
    platform: R::Platform,
    device: R::Device,
    context: R::Context,
    queue: R::Queue,
    capability_metric: usize,
}

impl<'rt, R: ComputeRuntime + ?Sized> SelectedDevice<'rt, R> {
    /// The runtime the handles belong to.
    #[must_use]
    pub fn runtime(&self) -> &'rt R {
        self.runtime
    }

    /// Platform of the selected device.
    #[must_use]
    pub fn platform(&self) -> R::Platform {
        self.platform
    }

    /// The selected device.
    #[must_use]
    pub fn device(&self) -> R::Device {
        self.device
    }

    /// Context owning the device.
    #[must_use]
    pub fn context(&self) -> R::Context {
        self.context
    }

    /// Command queue on the device.
    #[must_use]
    pub fn queue(&self) -> R::Queue {
        self.queue
    }

    /// The metric the device won with.
    #[must_use]
    pub fn capability_metric(&self) -> usize {
        self.capability_metric
    }

    /// Platform name as reported by the runtime.
    ///
    /// # Errors
    ///
    /// Returns the annotated runtime status if the query fails.
    pub fn platform_name(&self) -> Result<String> {
        platform_string(self.runtime, self.platform, PlatformInfo::Name)
    }

    /// Device name as reported by the runtime.
    ///
    /// # Errors
    ///
    /// Returns the annotated runtime status if the query fails.
    pub fn device_name(&self) -> Result<String> {
        device_string(self.runtime, self.device, DeviceInfo::Name)
    }

    /// Give up ownership of the handles without releasing them.
    ///
    /// Returns `(platform, device, context, queue)`. The caller becomes
    /// responsible for releasing the queue and the context.
    #[must_use]
    pub fn into_raw(self) -> (R::Platform, R::Device, R::Context, R::Queue) {
        let this = ManuallyDrop::new(self);
        (this.platform, this.device, this.context, this.queue)
    }
}

impl<R: ComputeRuntime + ?Sized> Drop for SelectedDevice<'_, R> {
    fn drop(&mut self) {
        self.runtime.release_command_queue(self.queue);
        self.runtime.release_context(self.context);
    }
}

impl<R: ComputeRuntime + ?Sized> fmt::Debug for SelectedDevice<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedDevice")
            .field("platform", &self.platform)
            .field("device", &self.device)
            .field("context", &self.context)
            .field("queue", &self.queue)
            .field("capability_metric", &self.capability_metric)
            .finish_non_exhaustive()
    }
}

/// Select the device with the largest capability metric.
///
/// Among devices with equal metrics the one enumerated last wins; callers
/// should not rely on that.
///
/// # Errors
///
/// - [`SelectError::NoPlatforms`] if the runtime reports no platforms.
/// - [`SelectError::NoDevicesOnPlatform`] if an eligible platform has no
///   devices at all under an all-types query.
/// - [`SelectError::NoDevices`] if no platform meets the minimum version and
///   has a device of the requested type.
/// - [`SelectError::OutOfHostMemory`] on allocation failure.
/// - [`SelectError::Runtime`] for any failing runtime call.
pub fn select_best_device<'rt, R: ComputeRuntime + ?Sized>(
    runtime: &'rt R,
    config: &SelectionConfig,
) -> Result<SelectedDevice<'rt, R>> {
    let collection = DeviceContextCollection::enumerate(runtime, config)?;
    if collection.is_empty() {
        return Err(SelectError::NoDevices);
    }

    let ranked = collection.index_view()?.sort_by_capability_metric()?;
    let best = ranked.last().ok_or(SelectError::NoDevices)?;
    let device = collection.device(best);
    let metric = capability_metric(runtime, device)?;
    let platform = runtime
        .device_platform(device)
        .map_err(SelectError::runtime(RuntimeOperation::DeviceInfo))?;

    let context_index = collection.context_index_for_device(best);
    let device_count = collection.device_count();
    let context_count = collection.context_count();
    let context = collection.into_context(context_index);

    let queue = match runtime.create_command_queue(context, device) {
        Ok(queue) => queue,
        Err(status) => {
            runtime.release_context(context);
            return Err(SelectError::Runtime {
                operation: RuntimeOperation::CreateCommandQueue,
                status,
            });
        }
    };

    info!(
        device_index = best,
        context_index,
        metric,
        devices = device_count,
        contexts = context_count,
        "selected device"
    );

    Ok(SelectedDevice {
        runtime,
        platform,
        device,
        context,
        queue,
        capability_metric: metric,
    })
}

/// One entry of [`rank_devices`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedDevice {
    /// Position in enumeration order.
    pub device_index: usize,
    /// Index of the owning context.
    pub context_index: usize,
    /// Platform name.
    pub platform_name: String,
    /// Device name.
    pub device_name: String,
    /// Capability metric.
    pub capability_metric: usize,
}

/// Every eligible device, best first.
///
/// The first entry is the device [`select_best_device`] would pick. All
/// contexts are released before this returns.
///
/// # Errors
///
/// As [`select_best_device`], except that no eligible platform yields an
/// empty list rather than [`SelectError::NoDevices`].
pub fn rank_devices<R: ComputeRuntime + ?Sized>(
    runtime: &R,
    config: &SelectionConfig,
) -> Result<Vec<RankedDevice>> {
    let collection = DeviceContextCollection::enumerate(runtime, config)?;
    let ranked = collection
        .index_view()?
        .sort_by_capability_metric()?
        .reverse()?;

    let mut entries = Vec::new();
    entries.try_reserve_exact(ranked.len())?;
    for (device_index, device) in ranked.iter() {
        let platform = runtime
            .device_platform(device)
            .map_err(SelectError::runtime(RuntimeOperation::DeviceInfo))?;
        entries.push(RankedDevice {
            device_index,
            context_index: collection.context_index_for_device(device_index),
            platform_name: platform_string(runtime, platform, PlatformInfo::Name)?,
            device_name: device_string(runtime, device, DeviceInfo::Name)?,
            capability_metric: capability_metric(runtime, device)?,
        });
    }
    Ok(entries)
}
