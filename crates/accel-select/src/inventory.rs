//! In-memory accelerator runtime described by a JSON inventory.
//!
//! [`InventoryRuntime`] implements [`ComputeRuntime`] over a static list of
//! platforms and devices. It tracks every context and command queue it hands
//! out so callers can verify release discipline, and it can be told to fail a
//! given runtime operation to exercise error paths.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::RuntimeOperation;
use crate::runtime::{ComputeRuntime, DeviceInfo, DeviceType, PlatformInfo};
use crate::status::Status;

/// Errors loading an inventory description.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The file could not be read.
    #[error("failed to read inventory: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid inventory document.
    #[error("invalid inventory: {0}")]
    Json(#[from] serde_json::Error),
}

/// A device exposed by an inventory platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Device name.
    pub name: String,
    /// Device type.
    #[serde(default = "default_device_type")]
    pub device_type: DeviceType,
    /// Maximum work-group size (the capability metric).
    pub max_work_group_size: usize,
    /// Device vendor.
    #[serde(default)]
    pub vendor: String,
    /// Device version string.
    #[serde(default)]
    pub version: String,
    /// Driver version string.
    #[serde(default)]
    pub driver_version: String,
}

const fn default_device_type() -> DeviceType {
    DeviceType::GPU
}

impl DeviceSpec {
    /// A device of the given type.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        device_type: DeviceType,
        max_work_group_size: usize,
    ) -> Self {
        Self {
            name: name.into(),
            device_type,
            max_work_group_size,
            vendor: String::new(),
            version: String::new(),
            driver_version: String::new(),
        }
    }

    /// A GPU device.
    #[must_use]
    pub fn gpu(name: impl Into<String>, max_work_group_size: usize) -> Self {
        Self::new(name, DeviceType::GPU, max_work_group_size)
    }

    /// A CPU device.
    #[must_use]
    pub fn cpu(name: impl Into<String>, max_work_group_size: usize) -> Self {
        Self::new(name, DeviceType::CPU, max_work_group_size)
    }

    /// Set the vendor.
    #[must_use]
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }
}

/// A platform in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSpec {
    /// Platform name.
    pub name: String,
    /// Platform vendor.
    #[serde(default)]
    pub vendor: String,
    /// Free-form version string as the runtime would report it.
    pub version: String,
    /// Profile string.
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Devices, in enumeration order.
    #[serde(default)]
    pub devices: Vec<DeviceSpec>,
}

fn default_profile() -> String {
    "FULL_PROFILE".to_string()
}

impl PlatformSpec {
    /// A platform with no devices.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vendor: String::new(),
            version: version.into(),
            profile: default_profile(),
            devices: Vec::new(),
        }
    }

    /// Append a device.
    #[must_use]
    pub fn with_device(mut self, device: DeviceSpec) -> Self {
        self.devices.push(device);
        self
    }

    /// Set the vendor.
    #[must_use]
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }
}

/// A static description of platforms and devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    /// Platforms, in enumeration order.
    #[serde(default)]
    pub platforms: Vec<PlatformSpec>,
}

impl Inventory {
    /// An empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a platform.
    #[must_use]
    pub fn with_platform(mut self, platform: PlatformSpec) -> Self {
        self.platforms.push(platform);
        self
    }

    /// Parse an inventory from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Json`] if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, InventoryError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load an inventory from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let json = fs::read_to_string(path)?;
        let inventory = Self::from_json_str(&json)?;
        debug!(
            path = %path.display(),
            platforms = inventory.platforms.len(),
            "loaded inventory"
        );
        Ok(inventory)
    }

    /// Total number of devices across all platforms.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.platforms.iter().map(|p| p.devices.len()).sum()
    }
}

/// Platform handle issued by [`InventoryRuntime`]. Zero is null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformHandle(u32);

/// Device handle issued by [`InventoryRuntime`]. Zero is null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(u32);

/// Context handle issued by [`InventoryRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextHandle(u32);

/// Command queue handle issued by [`InventoryRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueHandle(u32);

#[derive(Debug, Clone, Copy)]
struct Fault {
    operation: RuntimeOperation,
    status: Status,
    remaining_successes: usize,
}

#[derive(Debug, Default)]
struct State {
    next_handle: u32,
    live_contexts: BTreeMap<ContextHandle, Vec<DeviceHandle>>,
    live_queues: BTreeMap<QueueHandle, (ContextHandle, DeviceHandle)>,
    released_contexts: usize,
    released_queues: usize,
    invalid_releases: usize,
    faults: Vec<Fault>,
    calls: HashMap<RuntimeOperation, usize>,
}

/// A [`ComputeRuntime`] backed by an [`Inventory`].
#[derive(Debug)]
pub struct InventoryRuntime {
    inventory: Inventory,
    // (platform index, device index within platform) per device handle - 1
    device_locations: Vec<(usize, usize)>,
    state: RefCell<State>,
}

impl InventoryRuntime {
    /// Create a runtime over `inventory`.
    #[must_use]
    pub fn new(inventory: Inventory) -> Self {
        let device_locations = inventory
            .platforms
            .iter()
            .enumerate()
            .flat_map(|(p, platform)| (0..platform.devices.len()).map(move |d| (p, d)))
            .collect();
        Self {
            inventory,
            device_locations,
            state: RefCell::new(State::default()),
        }
    }

    /// The underlying inventory.
    #[must_use]
    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Make every call to `operation` fail with `status`.
    pub fn fail_on(&self, operation: RuntimeOperation, status: Status) {
        self.fail_on_after(operation, status, 0);
    }

    /// Let `successes` calls to `operation` succeed, then fail with `status`.
    pub fn fail_on_after(&self, operation: RuntimeOperation, status: Status, successes: usize) {
        self.state.borrow_mut().faults.push(Fault {
            operation,
            status,
            remaining_successes: successes,
        });
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.state.borrow_mut().faults.clear();
    }

    /// Contexts created and not yet released.
    #[must_use]
    pub fn live_contexts(&self) -> usize {
        self.state.borrow().live_contexts.len()
    }

    /// Command queues created and not yet released.
    #[must_use]
    pub fn live_queues(&self) -> usize {
        self.state.borrow().live_queues.len()
    }

    /// Contexts released so far.
    #[must_use]
    pub fn released_contexts(&self) -> usize {
        self.state.borrow().released_contexts
    }

    /// Command queues released so far.
    #[must_use]
    pub fn released_queues(&self) -> usize {
        self.state.borrow().released_queues
    }

    /// Releases of unknown or already-released handles.
    #[must_use]
    pub fn invalid_releases(&self) -> usize {
        self.state.borrow().invalid_releases
    }

    /// Number of calls made to `operation`, including failed ones.
    #[must_use]
    pub fn call_count(&self, operation: RuntimeOperation) -> usize {
        self.state.borrow().calls.get(&operation).copied().unwrap_or(0)
    }

    /// The devices a live context spans.
    #[must_use]
    pub fn context_devices(&self, context: ContextHandle) -> Option<Vec<DeviceHandle>> {
        self.state.borrow().live_contexts.get(&context).cloned()
    }

    /// Look up the inventory entry for a device handle.
    #[must_use]
    pub fn device_spec(&self, device: DeviceHandle) -> Option<&DeviceSpec> {
        let (p, d) = self.location(device)?;
        self.inventory.platforms.get(p)?.devices.get(d)
    }

    fn enter(&self, operation: RuntimeOperation) -> Result<(), Status> {
        let mut state = self.state.borrow_mut();
        *state.calls.entry(operation).or_insert(0) += 1;
        let fault = state
            .faults
            .iter_mut()
            .find(|fault| fault.operation == operation);
        match fault {
            Some(fault) if fault.remaining_successes == 0 => {
                debug!(%operation, status = %fault.status, "injected runtime failure");
                Err(fault.status)
            }
            Some(fault) => {
                fault.remaining_successes -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn platform(&self, handle: PlatformHandle) -> Result<&PlatformSpec, Status> {
        (handle.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.inventory.platforms.get(i))
            .ok_or(Status::INVALID_PLATFORM)
    }

    fn location(&self, handle: DeviceHandle) -> Option<(usize, usize)> {
        (handle.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.device_locations.get(i))
            .copied()
    }

    fn device(&self, handle: DeviceHandle) -> Result<&DeviceSpec, Status> {
        self.device_spec(handle).ok_or(Status::INVALID_DEVICE)
    }

    fn matching_devices(
        &self,
        platform: PlatformHandle,
        device_type: DeviceType,
    ) -> Result<Vec<DeviceHandle>, Status> {
        let index = (platform.0 as usize).saturating_sub(1);
        let spec = self.platform(platform)?;
        let handles = self
            .device_locations
            .iter()
            .enumerate()
            .filter(|(_, (p, d))| {
                *p == index && spec.devices[*d].device_type.intersects(device_type)
            })
            .map(|(flat, _)| DeviceHandle(flat as u32 + 1))
            .collect();
        Ok(handles)
    }

    fn next_handle(state: &mut State) -> u32 {
        state.next_handle += 1;
        state.next_handle
    }
}

fn copy_string(value: &str, out: &mut [u8]) -> Result<(), Status> {
    let bytes = value.as_bytes();
    if out.len() < bytes.len() + 1 {
        return Err(Status::INVALID_VALUE);
    }
    out[..bytes.len()].copy_from_slice(bytes);
    out[bytes.len()] = 0;
    Ok(())
}

impl InventoryRuntime {
    fn platform_attribute(
        &self,
        platform: PlatformHandle,
        param: PlatformInfo,
    ) -> Result<&str, Status> {
        let spec = self.platform(platform)?;
        Ok(match param {
            PlatformInfo::Profile => &spec.profile,
            PlatformInfo::Version => &spec.version,
            PlatformInfo::Name => &spec.name,
            PlatformInfo::Vendor => &spec.vendor,
        })
    }

    fn device_attribute(&self, device: DeviceHandle, param: DeviceInfo) -> Result<&str, Status> {
        let spec = self.device(device)?;
        Ok(match param {
            DeviceInfo::Name => &spec.name,
            DeviceInfo::Vendor => &spec.vendor,
            DeviceInfo::Version => &spec.version,
            DeviceInfo::DriverVersion => &spec.driver_version,
        })
    }
}

impl ComputeRuntime for InventoryRuntime {
    type Platform = PlatformHandle;
    type Device = DeviceHandle;
    type Context = ContextHandle;
    type Queue = QueueHandle;

    fn platform_count(&self) -> Result<usize, Status> {
        self.enter(RuntimeOperation::PlatformIds)?;
        Ok(self.inventory.platforms.len())
    }

    fn platform_ids(&self, out: &mut [PlatformHandle]) -> Result<(), Status> {
        self.enter(RuntimeOperation::PlatformIds)?;
        if out.len() > self.inventory.platforms.len() {
            return Err(Status::INVALID_VALUE);
        }
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = PlatformHandle(i as u32 + 1);
        }
        Ok(())
    }

    fn platform_info_size(
        &self,
        platform: PlatformHandle,
        param: PlatformInfo,
    ) -> Result<usize, Status> {
        self.enter(RuntimeOperation::PlatformInfo)?;
        Ok(self.platform_attribute(platform, param)?.len() + 1)
    }

    fn platform_info(
        &self,
        platform: PlatformHandle,
        param: PlatformInfo,
        out: &mut [u8],
    ) -> Result<(), Status> {
        self.enter(RuntimeOperation::PlatformInfo)?;
        copy_string(self.platform_attribute(platform, param)?, out)
    }

    fn device_count(
        &self,
        platform: PlatformHandle,
        device_type: DeviceType,
    ) -> Result<usize, Status> {
        self.enter(RuntimeOperation::DeviceIds)?;
        let spec = self.platform(platform)?;
        if spec.devices.is_empty() {
            // A platform with nothing behind it reports a bare zero count.
            return Ok(0);
        }
        match self.matching_devices(platform, device_type)?.len() {
            0 => Err(Status::DEVICE_NOT_FOUND),
            n => Ok(n),
        }
    }

    fn device_ids(
        &self,
        platform: PlatformHandle,
        device_type: DeviceType,
        out: &mut [DeviceHandle],
    ) -> Result<(), Status> {
        self.enter(RuntimeOperation::DeviceIds)?;
        let handles = self.matching_devices(platform, device_type)?;
        if handles.is_empty() {
            return Err(Status::DEVICE_NOT_FOUND);
        }
        for (slot, handle) in out.iter_mut().zip(handles) {
            *slot = handle;
        }
        Ok(())
    }

    fn device_info_size(&self, device: DeviceHandle, param: DeviceInfo) -> Result<usize, Status> {
        self.enter(RuntimeOperation::DeviceInfo)?;
        Ok(self.device_attribute(device, param)?.len() + 1)
    }

    fn device_info(
        &self,
        device: DeviceHandle,
        param: DeviceInfo,
        out: &mut [u8],
    ) -> Result<(), Status> {
        self.enter(RuntimeOperation::DeviceInfo)?;
        copy_string(self.device_attribute(device, param)?, out)
    }

    fn device_max_work_group_size(&self, device: DeviceHandle) -> Result<usize, Status> {
        self.enter(RuntimeOperation::DeviceInfo)?;
        Ok(self.device(device)?.max_work_group_size)
    }

    fn device_platform(&self, device: DeviceHandle) -> Result<PlatformHandle, Status> {
        self.enter(RuntimeOperation::DeviceInfo)?;
        let (p, _) = self.location(device).ok_or(Status::INVALID_DEVICE)?;
        Ok(PlatformHandle(p as u32 + 1))
    }

    fn create_context(&self, devices: &[DeviceHandle]) -> Result<ContextHandle, Status> {
        self.enter(RuntimeOperation::CreateContext)?;
        if devices.is_empty() {
            return Err(Status::INVALID_VALUE);
        }
        for device in devices {
            self.device(*device)?;
        }
        let mut state = self.state.borrow_mut();
        let handle = ContextHandle(Self::next_handle(&mut state));
        state.live_contexts.insert(handle, devices.to_vec());
        Ok(handle)
    }

    fn release_context(&self, context: ContextHandle) {
        let mut state = self.state.borrow_mut();
        if state.live_contexts.remove(&context).is_some() {
            state.released_contexts += 1;
        } else {
            warn!(?context, "release of unknown context");
            state.invalid_releases += 1;
        }
    }

    fn create_command_queue(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
    ) -> Result<QueueHandle, Status> {
        self.enter(RuntimeOperation::CreateCommandQueue)?;
        let mut state = self.state.borrow_mut();
        let devices = state
            .live_contexts
            .get(&context)
            .ok_or(Status::INVALID_CONTEXT)?;
        if !devices.contains(&device) {
            return Err(Status::INVALID_DEVICE);
        }
        let handle = QueueHandle(Self::next_handle(&mut state));
        state.live_queues.insert(handle, (context, device));
        Ok(handle)
    }

    fn release_command_queue(&self, queue: QueueHandle) {
        let mut state = self.state.borrow_mut();
        if state.live_queues.remove(&queue).is_some() {
            state.released_queues += 1;
        } else {
            warn!(?queue, "release of unknown command queue");
            state.invalid_releases += 1;
        }
    }
}
