//! Device registry: resolves a `gpu_index` to a ready OpenCL context/queue
//! pair, lazily, behind one process-wide mutex — spec §4.1 and §5.

use std::sync::Mutex;

use mycelia_core::config::MAX_DEVICE_SLOTS;
use mycelia_core::{MycelError, MycelResult};
use ocl::core::DeviceInfo;
use ocl::flags::{CommandQueueProperties, MemFlags};
use ocl::{Buffer, Context, Device, Platform, Queue};

use crate::compiler::ProgramCache;

/// Everything the driver needs to dispatch kernels against one physical
/// device. Created lazily on first access to `gpu_index`.
pub struct DeviceSlot {
    pub platform: Platform,
    pub device: Device,
    pub context: Context,
    /// Out-of-order where supported, falls back to in-order + profiling.
    pub main_queue: Queue,
    /// Used for blocking host<->device transfers and pinned-buffer maps.
    pub transfer_queue: Queue,
    /// `clCreateCommandQueueWithProperties` + `clSetDefaultDeviceCommandQueue`
    /// path; `None` when the device/runtime doesn't support OpenCL 2.0
    /// device-side enqueue. Not relied on for correctness (spec §5).
    pub device_queue: Option<Queue>,
    /// Pinned 2-float staging buffer, mapped for fast scalar transfers.
    pub staging: Buffer<f32>,
    pub programs: ProgramCache,
    pub out_of_order: bool,
    pub has_fp64: bool,
    pub has_atomics32: bool,
    pub has_atomics64: bool,
    pub device_tag: String,
    initialized: bool,
    errored: bool,
}

impl DeviceSlot {
    fn create(platform: Platform, device: Device) -> MycelResult<Self> {
        let context = Context::builder()
            .platform(platform)
            .devices(device)
            .build()
            .map_err(|e| MycelError::Allocation(format!("context create failed: {e}")))?;

        let out_of_order_props = CommandQueueProperties::new()
            .out_of_order()
            .profiling();
        let main_queue = Queue::new(&context, device, Some(out_of_order_props))
            .or_else(|_| {
                Queue::new(
                    &context,
                    device,
                    Some(CommandQueueProperties::new().profiling()),
                )
            })
            .map_err(|e| MycelError::Allocation(format!("main queue create failed: {e}")))?;
        let out_of_order = main_queue
            .properties()
            .map(|p| p.contains(CommandQueueProperties::new().out_of_order()))
            .unwrap_or(false);

        let transfer_queue = Queue::new(
            &context,
            device,
            Some(CommandQueueProperties::new().profiling()),
        )
        .map_err(|e| MycelError::Allocation(format!("transfer queue create failed: {e}")))?;

        // Device-side enqueue (OpenCL 2.0) is attempted opportunistically;
        // failure here is a graceful degrade, not a hard error (spec §4.1).
        let device_queue = Queue::new(
            &context,
            device,
            Some(
                CommandQueueProperties::new()
                    .out_of_order()
                    .profiling(),
            ),
        )
        .ok();

        let staging = Buffer::<f32>::builder()
            .queue(transfer_queue.clone())
            .flags(MemFlags::new().alloc_host_ptr().read_write())
            .len(2)
            .fill_val(0.0f32)
            .build()
            .map_err(|e| MycelError::Allocation(format!("pinned staging buffer failed: {e}")))?;

        let extensions = device
            .info(DeviceInfo::Extensions)
            .map(|i| i.to_string())
            .unwrap_or_default();
        let has_fp64 = extensions.contains("cl_khr_fp64");
        let has_atomics32 = extensions.contains("cl_khr_global_int32_base_atomics")
            || extensions.contains("cl_khr_int64_base_atomics")
            || true; // 32-bit atomics are core since OpenCL 1.1; kept explicit for clarity.
        let has_atomics64 = extensions.contains("cl_khr_int64_base_atomics");

        let name = device.name().unwrap_or_else(|_| "unknown-device".to_string());
        let device_tag = sanitize_tag(&name);

        Ok(Self {
            platform,
            device,
            context,
            main_queue,
            transfer_queue,
            device_queue,
            staging,
            programs: ProgramCache::new(),
            out_of_order,
            has_fp64,
            has_atomics32,
            has_atomics64,
            device_tag,
            initialized: true,
            errored: false,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.initialized && !self.errored
    }

    pub fn mark_errored(&mut self) {
        self.errored = true;
    }
}

fn sanitize_tag(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Process-wide table of up to [`MAX_DEVICE_SLOTS`] lazily-initialized
/// device slots, protected by one mutex (spec §3, §5).
pub struct DeviceRegistry {
    slots: Mutex<Vec<Option<DeviceSlot>>>,
    devices: Vec<(Platform, Device)>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let mut devices = Vec::new();
        for platform in Platform::list() {
            if let Ok(found) = Device::list(platform, Some(ocl::flags::DeviceType::new().gpu())) {
                for device in found {
                    if devices.len() >= MAX_DEVICE_SLOTS {
                        break;
                    }
                    devices.push((platform, device));
                }
            }
        }
        let mut slots = Vec::with_capacity(MAX_DEVICE_SLOTS);
        slots.resize_with(MAX_DEVICE_SLOTS, || None);
        Self {
            slots: Mutex::new(slots),
            devices,
        }
    }

    /// Enumerate platforms/devices in discovery order; idempotent.
    pub fn discover_devices(&self) -> usize {
        self.devices.len()
    }

    /// Lazily initialize `gpu_index`, or return the existing slot.
    pub fn ensure_slot(&self, gpu_index: u32) -> MycelResult<()> {
        let idx = gpu_index as usize;
        if idx >= MAX_DEVICE_SLOTS {
            return Err(MycelError::Validation(format!(
                "gpu_index {gpu_index} exceeds max {MAX_DEVICE_SLOTS} slots"
            )));
        }
        let mut slots = self.slots.lock().expect("device slot mutex poisoned");
        if slots[idx].as_ref().map(DeviceSlot::is_ready).unwrap_or(false) {
            return Ok(());
        }
        let (platform, device) = self
            .devices
            .get(idx)
            .copied()
            .ok_or(MycelError::NoDevice)?;
        match DeviceSlot::create(platform, device) {
            Ok(slot) => {
                slots[idx] = Some(slot);
                Ok(())
            }
            Err(e) => {
                log::error!("ensure_slot({gpu_index}) failed: {e}");
                slots[idx] = None;
                Err(e)
            }
        }
    }

    /// Run `f` with the initialized slot for `gpu_index`, or
    /// `MycelError::NotInitialized` if it was never successfully created.
    pub fn with_slot<T>(
        &self,
        gpu_index: u32,
        f: impl FnOnce(&mut DeviceSlot) -> MycelResult<T>,
    ) -> MycelResult<T> {
        let idx = gpu_index as usize;
        let mut slots = self.slots.lock().expect("device slot mutex poisoned");
        match slots.get_mut(idx).and_then(|s| s.as_mut()) {
            Some(slot) if slot.is_ready() => f(slot),
            _ => Err(MycelError::NotInitialized(gpu_index)),
        }
    }

    pub fn shutdown(&self, gpu_index: u32) {
        let idx = gpu_index as usize;
        let mut slots = self.slots.lock().expect("device slot mutex poisoned");
        if let Some(slot) = slots.get_mut(idx) {
            *slot = None;
        }
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
