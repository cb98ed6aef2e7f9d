//! Counting mock driver for tests
//!
//! Every object created through [`MockDriver`] is tracked by kind until it is
//! destroyed, so tests can assert that a failed initialization or a shutdown
//! leaves nothing behind. Contract violations (destroying an unknown handle,
//! calling a device function before the device table was loaded, waiting on a
//! fence nothing will ever signal) are collected instead of panicking.
//!
//! Copies and layout transitions recorded into command buffers are executed
//! against host-side backing memory when the buffer is submitted, which gives
//! tests a read-back path for staging uploads.

use super::Driver;
use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;

/// A physical device the mock reports
#[derive(Clone, Debug)]
pub struct MockPhysicalDevice {
    pub name: String,
    pub extensions: Vec<String>,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    /// Families that report presentation support
    pub present_families: Vec<u32>,
    pub surface_capabilities: vk::SurfaceCapabilitiesKHR,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub memory_types: Vec<vk::MemoryPropertyFlags>,
}

impl MockPhysicalDevice {
    /// One family doing graphics and present, device-local and host-visible memory
    pub fn unified(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extensions: vec!["VK_KHR_swapchain".to_string()],
            queue_families: vec![family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 2)],
            present_families: vec![0],
            surface_capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D { width: 800, height: 600 },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
            },
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            memory_types: vec![
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ],
        }
    }

    /// Graphics on family 0, present only on family 1
    pub fn split(name: &str) -> Self {
        Self {
            queue_families: vec![
                family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1),
                family(vk::QueueFlags::TRANSFER, 1),
            ],
            present_families: vec![1],
            ..Self::unified(name)
        }
    }

    /// Graphics and present on one family that exposes a single queue
    pub fn single_queue(name: &str) -> Self {
        Self {
            queue_families: vec![family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1)],
            ..Self::unified(name)
        }
    }

    /// A device that cannot present to a swapchain
    pub fn headless(name: &str) -> Self {
        Self {
            extensions: Vec::new(),
            ..Self::unified(name)
        }
    }
}

fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count: count,
        ..Default::default()
    }
}

/// Parameters of the most recent swapchain creation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwapchainRecord {
    pub extent: vk::Extent2D,
    pub min_image_count: u32,
    pub sharing_mode: vk::SharingMode,
    pub queue_family_count: u32,
    pub present_mode: vk::PresentModeKHR,
    pub chained_old: bool,
}

#[derive(Clone, Debug)]
enum Recorded {
    CopyBuffer { src: u64, dst: u64, size: u64 },
    CopyBufferToImage { src: u64, dst: u64, regions: Vec<vk::BufferImageCopy> },
    Barrier { image: u64, old: vk::ImageLayout, new: vk::ImageLayout },
    Draw { index_count: u32 },
}

struct Allocation {
    data: *mut [u8],
    properties: vk::MemoryPropertyFlags,
}

impl Allocation {
    fn new(size: usize, properties: vk::MemoryPropertyFlags) -> Self {
        Self {
            data: Box::into_raw(vec![0u8; size].into_boxed_slice()),
            properties,
        }
    }

    fn bytes(&self) -> &[u8] {
        unsafe { &*self.data }
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        drop(unsafe { Box::from_raw(self.data) });
    }
}

struct MockBuffer {
    size: u64,
    memory: Option<u64>,
}

struct MockImage {
    extent: vk::Extent3D,
    layers: u32,
    memory: Option<u64>,
    layout: vk::ImageLayout,
}

struct MockSwapchain {
    images: Vec<vk::Image>,
    next: u32,
}

struct MockState {
    stage: u8,
    next_handle: u64,
    live: BTreeMap<&'static str, BTreeSet<u64>>,
    created: Vec<(&'static str, u64)>,
    destroyed: Vec<(&'static str, u64)>,
    violations: Vec<String>,
    calls: Vec<&'static str>,
    failures: HashMap<&'static str, (usize, vk::Result)>,
    fail_reload_at: Option<u8>,
    hook_installs: usize,
    api_version: u32,
    layers: Vec<String>,
    devices: Vec<MockPhysicalDevice>,
    selected: usize,
    memory_type_bits: Option<u32>,
    instance_extensions: Vec<String>,
    instance_layers: Vec<String>,
    queue_requests: Vec<(u32, u32)>,
    allocations: HashMap<u64, Allocation>,
    buffers: HashMap<u64, MockBuffer>,
    images: HashMap<u64, MockImage>,
    swapchains: HashMap<u64, MockSwapchain>,
    swapchain_image_count: Option<u32>,
    swapchain_records: Vec<SwapchainRecord>,
    command_buffer_pools: HashMap<u64, u64>,
    recorded: HashMap<u64, Vec<Recorded>>,
    fences: HashMap<u64, bool>,
    acquire_script: VecDeque<VkResult<(u32, bool)>>,
    present_script: VecDeque<VkResult<bool>>,
    executed_draws: Vec<u32>,
    push_constants: Vec<Vec<u8>>,
}

/// Resource-counting stand-in for the GPU driver
pub struct MockDriver {
    state: RefCell<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

const PHYSICAL_DEVICE_BASE: u64 = 0x1000;

impl MockDriver {
    /// Driver reporting a single unified-queue device
    pub fn new() -> Self {
        Self::with_devices(vec![MockPhysicalDevice::unified("Mock GPU")])
    }

    pub fn with_devices(devices: Vec<MockPhysicalDevice>) -> Self {
        Self {
            state: RefCell::new(MockState {
                stage: 0,
                next_handle: 0x10_0000,
                live: BTreeMap::new(),
                created: Vec::new(),
                destroyed: Vec::new(),
                violations: Vec::new(),
                calls: Vec::new(),
                failures: HashMap::new(),
                fail_reload_at: None,
                hook_installs: 0,
                api_version: vk::make_api_version(0, 1, 3, 0),
                layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
                devices,
                selected: 0,
                memory_type_bits: None,
                instance_extensions: Vec::new(),
                instance_layers: Vec::new(),
                queue_requests: Vec::new(),
                allocations: HashMap::new(),
                buffers: HashMap::new(),
                images: HashMap::new(),
                swapchains: HashMap::new(),
                swapchain_image_count: None,
                swapchain_records: Vec::new(),
                command_buffer_pools: HashMap::new(),
                recorded: HashMap::new(),
                fences: HashMap::new(),
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                executed_draws: Vec::new(),
                push_constants: Vec::new(),
            }),
        }
    }

    // --- configuration ----------------------------------------------------

    /// Make the `nth` (0-based) call named `call` fail with `result`
    pub fn fail_call(&self, call: &'static str, nth: usize, result: vk::Result) {
        self.state.borrow_mut().failures.insert(call, (nth, result));
    }

    /// Make the reload at `stage` (0 global, 1 instance, 2 device) return 0
    pub fn fail_reload(&self, stage: u8) {
        self.state.borrow_mut().fail_reload_at = Some(stage);
    }

    pub fn set_available_layers(&self, layers: &[&str]) {
        self.state.borrow_mut().layers = layers.iter().map(|l| l.to_string()).collect();
    }

    /// Restrict the memory type bits reported for every buffer and image
    pub fn set_memory_type_bits(&self, bits: u32) {
        self.state.borrow_mut().memory_type_bits = Some(bits);
    }

    /// Report this many swapchain images instead of the requested minimum
    pub fn set_swapchain_image_count(&self, count: u32) {
        self.state.borrow_mut().swapchain_image_count = Some(count);
    }

    pub fn script_acquire(&self, result: VkResult<(u32, bool)>) {
        self.state.borrow_mut().acquire_script.push_back(result);
    }

    pub fn script_present(&self, result: VkResult<bool>) {
        self.state.borrow_mut().present_script.push_back(result);
    }

    /// Register a surface created by a mock window
    pub fn register_surface(&self) -> vk::SurfaceKHR {
        let mut state = self.state.borrow_mut();
        vk::SurfaceKHR::from_raw(state.create("surface"))
    }

    // --- inspection -------------------------------------------------------

    /// Live objects of one kind
    pub fn live(&self, kind: &str) -> usize {
        self.state.borrow().live.get(kind).map_or(0, BTreeSet::len)
    }

    /// Live objects of every kind
    pub fn total_live(&self) -> usize {
        self.state.borrow().live.values().map(BTreeSet::len).sum()
    }

    /// Every object created so far, oldest first
    pub fn creations(&self) -> Vec<(&'static str, u64)> {
        self.state.borrow().created.clone()
    }

    /// Every object destroyed so far, in the order it was released
    pub fn destructions(&self) -> Vec<(&'static str, u64)> {
        self.state.borrow().destroyed.clone()
    }

    /// Kinds that still have live objects, for assertion messages
    pub fn leaks(&self) -> Vec<(&'static str, usize)> {
        self.state
            .borrow()
            .live
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(kind, set)| (*kind, set.len()))
            .collect()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.borrow().calls.clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.state.borrow().calls.iter().filter(|c| **c == call).count()
    }

    pub fn hook_installs(&self) -> usize {
        self.state.borrow().hook_installs
    }

    pub fn instance_extensions(&self) -> Vec<String> {
        self.state.borrow().instance_extensions.clone()
    }

    pub fn instance_layers(&self) -> Vec<String> {
        self.state.borrow().instance_layers.clone()
    }

    /// `(family, queue_count)` pairs of the last device creation
    pub fn queue_requests(&self) -> Vec<(u32, u32)> {
        self.state.borrow().queue_requests.clone()
    }

    pub fn swapchain_records(&self) -> Vec<SwapchainRecord> {
        self.state.borrow().swapchain_records.clone()
    }

    /// Index counts of every draw executed by a submission
    pub fn executed_draws(&self) -> Vec<u32> {
        self.state.borrow().executed_draws.clone()
    }

    pub fn push_constants(&self) -> Vec<Vec<u8>> {
        self.state.borrow().push_constants.clone()
    }

    /// Bytes of the memory bound to `buffer`, truncated to the buffer size
    pub fn buffer_contents(&self, buffer: vk::Buffer) -> Vec<u8> {
        let state = self.state.borrow();
        state
            .buffers
            .get(&buffer.as_raw())
            .and_then(|b| {
                let memory = state.allocations.get(&b.memory?)?;
                Some(memory.bytes()[..b.size as usize].to_vec())
            })
            .unwrap_or_default()
    }

    /// Bytes of the memory bound to `image`
    pub fn image_contents(&self, image: vk::Image) -> Vec<u8> {
        let state = self.state.borrow();
        state
            .images
            .get(&image.as_raw())
            .and_then(|i| Some(state.allocations.get(&i.memory?)?.bytes().to_vec()))
            .unwrap_or_default()
    }

    pub fn image_layout(&self, image: vk::Image) -> Option<vk::ImageLayout> {
        self.state.borrow().images.get(&image.as_raw()).map(|i| i.layout)
    }

    pub fn memory_properties_of(&self, memory: vk::DeviceMemory) -> Option<vk::MemoryPropertyFlags> {
        self.state.borrow().allocations.get(&memory.as_raw()).map(|a| a.properties)
    }

    // --- plumbing ---------------------------------------------------------

    fn enter(&self, call: &'static str, stage: u8) -> VkResult<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        if state.stage < stage {
            state.violations.push(format!("{} called before its table was loaded", call));
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        if let Some((remaining, result)) = state.failures.get_mut(call) {
            if *remaining == 0 {
                let result = *result;
                state.failures.remove(call);
                return Err(result);
            }
            *remaining -= 1;
        }
        Ok(())
    }

    fn note(&self, call: &'static str, stage: u8) {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        if state.stage < stage {
            state.violations.push(format!("{} called before its table was loaded", call));
        }
    }

    fn create(&self, call: &'static str, kind: &'static str) -> VkResult<u64> {
        self.enter(call, 3)?;
        Ok(self.state.borrow_mut().create(kind))
    }

    fn destroy(&self, call: &'static str, kind: &'static str, raw: u64) {
        self.note(call, 3);
        self.state.borrow_mut().destroy(kind, raw);
    }

    fn device_of(&self, physical_device: vk::PhysicalDevice) -> Option<MockPhysicalDevice> {
        let index = physical_device.as_raw().checked_sub(PHYSICAL_DEVICE_BASE)? as usize;
        self.state.borrow().devices.get(index).cloned()
    }

    fn selected_device(&self) -> Option<MockPhysicalDevice> {
        let state = self.state.borrow();
        state.devices.get(state.selected).cloned()
    }
}

impl MockState {
    fn create(&mut self, kind: &'static str) -> u64 {
        self.next_handle += 1;
        let raw = self.next_handle;
        self.live.entry(kind).or_default().insert(raw);
        self.created.push((kind, raw));
        raw
    }

    fn destroy(&mut self, kind: &'static str, raw: u64) {
        if raw == 0 {
            return;
        }
        let removed = self.live.get_mut(kind).map_or(false, |set| set.remove(&raw));
        if removed {
            self.destroyed.push((kind, raw));
        } else {
            self.violations.push(format!("destroyed unknown {} {:#x}", kind, raw));
        }
    }

    fn execute(&mut self, commands: Vec<Recorded>) {
        for command in commands {
            match command {
                Recorded::CopyBuffer { src, dst, size } => {
                    let src_mem = self.buffers.get(&src).and_then(|b| b.memory);
                    let dst_mem = self.buffers.get(&dst).and_then(|b| b.memory);
                    self.copy_memory(src_mem, 0, dst_mem, 0, size as usize);
                }
                Recorded::CopyBufferToImage { src, dst, regions } => {
                    let src_mem = self.buffers.get(&src).and_then(|b| b.memory);
                    let Some(image) = self.images.get(&dst) else {
                        self.violations.push(format!("copy into unknown image {:#x}", dst));
                        continue;
                    };
                    if image.layout != vk::ImageLayout::TRANSFER_DST_OPTIMAL {
                        self.violations.push(format!("copy into image in layout {:?}", image.layout));
                    }
                    let layer_size = (image.extent.width * image.extent.height * 4) as usize;
                    let dst_mem = image.memory;
                    for region in regions {
                        let e = region.image_extent;
                        let len = (e.width * e.height * e.depth * 4 * region.image_subresource.layer_count) as usize;
                        let dst_offset = region.image_subresource.base_array_layer as usize * layer_size;
                        self.copy_memory(src_mem, region.buffer_offset as usize, dst_mem, dst_offset, len);
                    }
                }
                Recorded::Barrier { image, old, new } => match self.images.get_mut(&image) {
                    Some(img) => {
                        if old != vk::ImageLayout::UNDEFINED && old != img.layout {
                            self.violations.push(format!("barrier expects {:?} but image is {:?}", old, img.layout));
                        }
                        img.layout = new;
                    }
                    None => self.violations.push(format!("barrier on unknown image {:#x}", image)),
                },
                Recorded::Draw { index_count } => self.executed_draws.push(index_count),
            }
        }
    }

    fn copy_memory(&mut self, src: Option<u64>, src_offset: usize, dst: Option<u64>, dst_offset: usize, len: usize) {
        let (Some(src), Some(dst)) = (src, dst) else {
            self.violations.push("copy between unbound resources".to_string());
            return;
        };
        let (Some(s), Some(d)) = (self.allocations.get(&src), self.allocations.get(&dst)) else {
            self.violations.push("copy between freed allocations".to_string());
            return;
        };
        if src_offset + len > s.bytes().len() || dst_offset + len > d.bytes().len() {
            self.violations.push("copy out of bounds".to_string());
            return;
        }
        let src_ptr = s.data as *const u8;
        let dst_ptr = d.data as *mut u8;
        unsafe { std::ptr::copy(src_ptr.add(src_offset), dst_ptr.add(dst_offset), len) };
    }
}

unsafe fn c_strings(names: *const *const c_char, count: u32) -> Vec<String> {
    if count == 0 || names.is_null() {
        return Vec::new();
    }
    std::slice::from_raw_parts(names, count as usize)
        .iter()
        .map(|&p| CStr::from_ptr(p).to_string_lossy().into_owned())
        .collect()
}

unsafe fn slice<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if count == 0 || ptr.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, count as usize)
    }
}

impl Driver for MockDriver {
    fn reload(&self, instance: vk::Instance, _physical_device: vk::PhysicalDevice, device: vk::Device) -> u32 {
        let mut state = self.state.borrow_mut();
        state.calls.push("reload");
        let stage = if instance == vk::Instance::null() {
            0
        } else if device == vk::Device::null() {
            1
        } else {
            2
        };
        if state.fail_reload_at == Some(stage) {
            return 0;
        }
        let valid = match stage {
            0 => true,
            1 => state.live.get("instance").map_or(false, |s| s.contains(&instance.as_raw())),
            _ => state.live.get("device").map_or(false, |s| s.contains(&device.as_raw())),
        };
        if !valid {
            state.violations.push(format!("reload with a dead handle at stage {}", stage));
            return 0;
        }
        state.stage = stage + 1;
        state.api_version
    }

    fn install_debug_hook(&self) {
        self.state.borrow_mut().hook_installs += 1;
    }

    fn enumerate_instance_layers(&self) -> VkResult<Vec<String>> {
        self.enter("vkEnumerateInstanceLayerProperties", 1)?;
        Ok(self.state.borrow().layers.clone())
    }

    fn create_instance(&self, info: &vk::InstanceCreateInfo) -> VkResult<vk::Instance> {
        self.enter("vkCreateInstance", 1)?;
        let extensions = unsafe { c_strings(info.pp_enabled_extension_names, info.enabled_extension_count) };
        let layers = unsafe { c_strings(info.pp_enabled_layer_names, info.enabled_layer_count) };
        let mut state = self.state.borrow_mut();
        state.instance_extensions = extensions;
        state.instance_layers = layers;
        Ok(vk::Instance::from_raw(state.create("instance")))
    }

    fn destroy_instance(&self, instance: vk::Instance) {
        self.note("vkDestroyInstance", 1);
        let mut state = self.state.borrow_mut();
        state.destroy("instance", instance.as_raw());
        state.stage = state.stage.min(1);
    }

    fn create_debug_messenger(&self, _info: &vk::DebugUtilsMessengerCreateInfoEXT) -> VkResult<vk::DebugUtilsMessengerEXT> {
        self.enter("vkCreateDebugUtilsMessengerEXT", 2)?;
        Ok(vk::DebugUtilsMessengerEXT::from_raw(self.state.borrow_mut().create("debug_messenger")))
    }

    fn destroy_debug_messenger(&self, messenger: vk::DebugUtilsMessengerEXT) {
        self.note("vkDestroyDebugUtilsMessengerEXT", 2);
        self.state.borrow_mut().destroy("debug_messenger", messenger.as_raw());
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        self.note("vkDestroySurfaceKHR", 2);
        self.state.borrow_mut().destroy("surface", surface.as_raw());
    }

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        self.enter("vkEnumeratePhysicalDevices", 2)?;
        let count = self.state.borrow().devices.len() as u64;
        Ok((0..count).map(|i| vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE_BASE + i)).collect())
    }

    fn physical_device_name(&self, physical_device: vk::PhysicalDevice) -> String {
        self.note("vkGetPhysicalDeviceProperties", 2);
        self.device_of(physical_device).map(|d| d.name).unwrap_or_default()
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        self.enter("vkEnumerateDeviceExtensionProperties", 2)?;
        Ok(self.device_of(physical_device).map(|d| d.extensions).unwrap_or_default())
    }

    fn queue_families(&self, physical_device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.note("vkGetPhysicalDeviceQueueFamilyProperties", 2);
        self.device_of(physical_device).map(|d| d.queue_families).unwrap_or_default()
    }

    fn surface_support(&self, physical_device: vk::PhysicalDevice, family: u32, _surface: vk::SurfaceKHR) -> VkResult<bool> {
        self.enter("vkGetPhysicalDeviceSurfaceSupportKHR", 2)?;
        Ok(self
            .device_of(physical_device)
            .map_or(false, |d| d.present_families.contains(&family)))
    }

    fn surface_capabilities(&self, physical_device: vk::PhysicalDevice, _surface: vk::SurfaceKHR) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.enter("vkGetPhysicalDeviceSurfaceCapabilitiesKHR", 2)?;
        self.device_of(physical_device)
            .map(|d| d.surface_capabilities)
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)
    }

    fn surface_present_modes(&self, physical_device: vk::PhysicalDevice, _surface: vk::SurfaceKHR) -> VkResult<Vec<vk::PresentModeKHR>> {
        self.enter("vkGetPhysicalDeviceSurfacePresentModesKHR", 2)?;
        Ok(self.device_of(physical_device).map(|d| d.present_modes).unwrap_or_default())
    }

    fn memory_properties(&self, physical_device: vk::PhysicalDevice) -> vk::PhysicalDeviceMemoryProperties {
        self.note("vkGetPhysicalDeviceMemoryProperties", 2);
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        if let Some(device) = self.device_of(physical_device) {
            properties.memory_type_count = device.memory_types.len() as u32;
            for (slot, flags) in properties.memory_types.iter_mut().zip(device.memory_types) {
                slot.property_flags = flags;
            }
            properties.memory_heap_count = 1;
        }
        properties
    }

    fn create_device(&self, physical_device: vk::PhysicalDevice, info: &vk::DeviceCreateInfo) -> VkResult<vk::Device> {
        self.enter("vkCreateDevice", 2)?;
        let requests = unsafe { slice(info.p_queue_create_infos, info.queue_create_info_count) }
            .iter()
            .map(|q| (q.queue_family_index, q.queue_count))
            .collect();
        let mut state = self.state.borrow_mut();
        state.selected = physical_device.as_raw().saturating_sub(PHYSICAL_DEVICE_BASE) as usize;
        let families = state.devices.get(state.selected).map(|d| d.queue_families.clone()).unwrap_or_default();
        for &(family, count) in &requests {
            let available = families.get(family as usize).map_or(0, |f| f.queue_count);
            if count > available {
                state
                    .violations
                    .push(format!("family {} offers {} queues, {} requested", family, available, count));
            }
        }
        state.queue_requests = requests;
        Ok(vk::Device::from_raw(state.create("device")))
    }

    fn destroy_device(&self, device: vk::Device) {
        self.note("vkDestroyDevice", 2);
        let mut state = self.state.borrow_mut();
        state.destroy("device", device.as_raw());
        state.stage = state.stage.min(2);
    }

    fn device_queue(&self, family: u32, index: u32) -> vk::Queue {
        self.note("vkGetDeviceQueue", 3);
        let mut state = self.state.borrow_mut();
        let requested = state.queue_requests.iter().any(|&(f, count)| f == family && index < count);
        if !requested {
            state.violations.push(format!("queue ({}, {}) was never requested", family, index));
        }
        vk::Queue::from_raw(0x9000 + u64::from(family) * 16 + u64::from(index))
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        self.enter("vkDeviceWaitIdle", 3)
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR> {
        self.enter("vkCreateSwapchainKHR", 3)?;
        let mut state = self.state.borrow_mut();
        let old = info.old_swapchain;
        let chained_old = old != vk::SwapchainKHR::null();
        if chained_old && !state.swapchains.contains_key(&old.as_raw()) {
            state.violations.push("old swapchain is not alive".to_string());
        }
        state.swapchain_records.push(SwapchainRecord {
            extent: info.image_extent,
            min_image_count: info.min_image_count,
            sharing_mode: info.image_sharing_mode,
            queue_family_count: info.queue_family_index_count,
            present_mode: info.present_mode,
            chained_old,
        });
        let count = state.swapchain_image_count.unwrap_or(info.min_image_count);
        let raw = state.create("swapchain");
        let images = (0..count)
            .map(|i| vk::Image::from_raw(raw * 0x100 + u64::from(i)))
            .collect();
        state.swapchains.insert(raw, MockSwapchain { images, next: 0 });
        Ok(vk::SwapchainKHR::from_raw(raw))
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.destroy("vkDestroySwapchainKHR", "swapchain", swapchain.as_raw());
        self.state.borrow_mut().swapchains.remove(&swapchain.as_raw());
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.enter("vkGetSwapchainImagesKHR", 3)?;
        self.state
            .borrow()
            .swapchains
            .get(&swapchain.as_raw())
            .map(|s| s.images.clone())
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)
    }

    fn acquire_next_image(&self, swapchain: vk::SwapchainKHR, _timeout: u64, _semaphore: vk::Semaphore) -> VkResult<(u32, bool)> {
        self.enter("vkAcquireNextImageKHR", 3)?;
        let mut state = self.state.borrow_mut();
        if let Some(scripted) = state.acquire_script.pop_front() {
            return scripted;
        }
        let chain = state
            .swapchains
            .get_mut(&swapchain.as_raw())
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)?;
        let index = chain.next;
        chain.next = (chain.next + 1) % chain.images.len().max(1) as u32;
        Ok((index, false))
    }

    fn queue_present(&self, _queue: vk::Queue, _info: &vk::PresentInfoKHR) -> VkResult<bool> {
        self.enter("vkQueuePresentKHR", 3)?;
        self.state.borrow_mut().present_script.pop_front().unwrap_or(Ok(false))
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView> {
        self.create("vkCreateImageView", "image_view").map(vk::ImageView::from_raw)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.destroy("vkDestroyImageView", "image_view", view.as_raw());
    }

    fn create_framebuffer(&self, _info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer> {
        self.create("vkCreateFramebuffer", "framebuffer").map(vk::Framebuffer::from_raw)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.destroy("vkDestroyFramebuffer", "framebuffer", framebuffer.as_raw());
    }

    fn create_render_pass(&self, _info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass> {
        self.create("vkCreateRenderPass", "render_pass").map(vk::RenderPass::from_raw)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.destroy("vkDestroyRenderPass", "render_pass", render_pass.as_raw());
    }

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        if code.is_empty() {
            self.state.borrow_mut().violations.push("empty shader module".to_string());
        }
        self.create("vkCreateShaderModule", "shader_module").map(vk::ShaderModule::from_raw)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.destroy("vkDestroyShaderModule", "shader_module", module.as_raw());
    }

    fn create_descriptor_set_layout(&self, _info: &vk::DescriptorSetLayoutCreateInfo) -> VkResult<vk::DescriptorSetLayout> {
        self.create("vkCreateDescriptorSetLayout", "descriptor_set_layout")
            .map(vk::DescriptorSetLayout::from_raw)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.destroy("vkDestroyDescriptorSetLayout", "descriptor_set_layout", layout.as_raw());
    }

    fn create_pipeline_layout(&self, _info: &vk::PipelineLayoutCreateInfo) -> VkResult<vk::PipelineLayout> {
        self.create("vkCreatePipelineLayout", "pipeline_layout").map(vk::PipelineLayout::from_raw)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.destroy("vkDestroyPipelineLayout", "pipeline_layout", layout.as_raw());
    }

    fn create_graphics_pipeline(&self, _info: &vk::GraphicsPipelineCreateInfo) -> VkResult<vk::Pipeline> {
        self.create("vkCreateGraphicsPipelines", "pipeline").map(vk::Pipeline::from_raw)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.destroy("vkDestroyPipeline", "pipeline", pipeline.as_raw());
    }

    fn create_descriptor_pool(&self, _info: &vk::DescriptorPoolCreateInfo) -> VkResult<vk::DescriptorPool> {
        self.create("vkCreateDescriptorPool", "descriptor_pool").map(vk::DescriptorPool::from_raw)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.destroy("vkDestroyDescriptorPool", "descriptor_pool", pool.as_raw());
    }

    fn allocate_descriptor_sets(&self, info: &vk::DescriptorSetAllocateInfo) -> VkResult<Vec<vk::DescriptorSet>> {
        self.enter("vkAllocateDescriptorSets", 3)?;
        let mut state = self.state.borrow_mut();
        Ok((0..info.descriptor_set_count)
            .map(|_| {
                state.next_handle += 1;
                vk::DescriptorSet::from_raw(state.next_handle)
            })
            .collect())
    }

    fn update_descriptor_sets(&self, _writes: &[vk::WriteDescriptorSet]) {
        self.note("vkUpdateDescriptorSets", 3);
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VkResult<vk::Buffer> {
        let raw = self.create("vkCreateBuffer", "buffer")?;
        self.state
            .borrow_mut()
            .buffers
            .insert(raw, MockBuffer { size: info.size, memory: None });
        Ok(vk::Buffer::from_raw(raw))
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.destroy("vkDestroyBuffer", "buffer", buffer.as_raw());
        self.state.borrow_mut().buffers.remove(&buffer.as_raw());
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        self.note("vkGetBufferMemoryRequirements", 3);
        let size = self.state.borrow().buffers.get(&buffer.as_raw()).map_or(0, |b| b.size);
        self.requirements(size)
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> VkResult<()> {
        self.enter("vkBindBufferMemory", 3)?;
        let mut state = self.state.borrow_mut();
        match state.buffers.get_mut(&buffer.as_raw()) {
            Some(b) => b.memory = Some(memory.as_raw()),
            None => state.violations.push("bind to unknown buffer".to_string()),
        }
        Ok(())
    }

    fn create_image(&self, info: &vk::ImageCreateInfo) -> VkResult<vk::Image> {
        let raw = self.create("vkCreateImage", "image")?;
        self.state.borrow_mut().images.insert(
            raw,
            MockImage {
                extent: info.extent,
                layers: info.array_layers,
                memory: None,
                layout: info.initial_layout,
            },
        );
        Ok(vk::Image::from_raw(raw))
    }

    fn destroy_image(&self, image: vk::Image) {
        self.destroy("vkDestroyImage", "image", image.as_raw());
        self.state.borrow_mut().images.remove(&image.as_raw());
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        self.note("vkGetImageMemoryRequirements", 3);
        let size = self.state.borrow().images.get(&image.as_raw()).map_or(0, |i| {
            u64::from(i.extent.width) * u64::from(i.extent.height) * u64::from(i.extent.depth) * u64::from(i.layers) * 4
        });
        self.requirements(size)
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> VkResult<()> {
        self.enter("vkBindImageMemory", 3)?;
        let mut state = self.state.borrow_mut();
        match state.images.get_mut(&image.as_raw()) {
            Some(i) => i.memory = Some(memory.as_raw()),
            None => state.violations.push("bind to unknown image".to_string()),
        }
        Ok(())
    }

    fn create_sampler(&self, _info: &vk::SamplerCreateInfo) -> VkResult<vk::Sampler> {
        self.create("vkCreateSampler", "sampler").map(vk::Sampler::from_raw)
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.destroy("vkDestroySampler", "sampler", sampler.as_raw());
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo) -> VkResult<vk::DeviceMemory> {
        let properties = self
            .selected_device()
            .and_then(|d| d.memory_types.get(info.memory_type_index as usize).copied());
        let Some(properties) = properties else {
            self.state
                .borrow_mut()
                .violations
                .push(format!("memory type {} does not exist", info.memory_type_index));
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        };
        let raw = self.create("vkAllocateMemory", "memory")?;
        self.state
            .borrow_mut()
            .allocations
            .insert(raw, Allocation::new(info.allocation_size as usize, properties));
        Ok(vk::DeviceMemory::from_raw(raw))
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        self.destroy("vkFreeMemory", "memory", memory.as_raw());
        self.state.borrow_mut().allocations.remove(&memory.as_raw());
    }

    fn map_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, size: vk::DeviceSize) -> VkResult<*mut c_void> {
        self.enter("vkMapMemory", 3)?;
        let mut state = self.state.borrow_mut();
        let Some(allocation) = state.allocations.get(&memory.as_raw()) else {
            state.violations.push("map of unknown memory".to_string());
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        };
        let len = allocation.bytes().len() as u64;
        let host_visible = allocation.properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE);
        let base = allocation.data as *mut u8;
        if !host_visible {
            state.violations.push("map of memory that is not host visible".to_string());
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }
        let end = if size == vk::WHOLE_SIZE { len } else { offset + size };
        if end > len {
            state.violations.push("map range out of bounds".to_string());
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }
        Ok(unsafe { base.add(offset as usize) } as *mut c_void)
    }

    fn unmap_memory(&self, _memory: vk::DeviceMemory) {
        self.note("vkUnmapMemory", 3);
    }

    fn create_command_pool(&self, _info: &vk::CommandPoolCreateInfo) -> VkResult<vk::CommandPool> {
        self.create("vkCreateCommandPool", "command_pool").map(vk::CommandPool::from_raw)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.note("vkDestroyCommandPool", 3);
        let mut state = self.state.borrow_mut();
        let mut owned: Vec<u64> = state
            .command_buffer_pools
            .iter()
            .filter(|(_, p)| **p == pool.as_raw())
            .map(|(b, _)| *b)
            .collect();
        // Buffers still allocated from the pool go first, newest first
        owned.sort_unstable_by(|a, b| b.cmp(a));
        for buffer in owned {
            state.command_buffer_pools.remove(&buffer);
            state.recorded.remove(&buffer);
            state.destroy("command_buffer", buffer);
        }
        state.destroy("command_pool", pool.as_raw());
    }

    fn allocate_command_buffers(&self, info: &vk::CommandBufferAllocateInfo) -> VkResult<Vec<vk::CommandBuffer>> {
        self.enter("vkAllocateCommandBuffers", 3)?;
        let mut state = self.state.borrow_mut();
        Ok((0..info.command_buffer_count)
            .map(|_| {
                let raw = state.create("command_buffer");
                state.command_buffer_pools.insert(raw, info.command_pool.as_raw());
                vk::CommandBuffer::from_raw(raw)
            })
            .collect())
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        self.note("vkFreeCommandBuffers", 3);
        let mut state = self.state.borrow_mut();
        for buffer in buffers {
            state.command_buffer_pools.remove(&buffer.as_raw());
            state.recorded.remove(&buffer.as_raw());
            state.destroy("command_buffer", buffer.as_raw());
        }
    }

    fn reset_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        self.enter("vkResetCommandBuffer", 3)?;
        self.state.borrow_mut().recorded.remove(&buffer.as_raw());
        Ok(())
    }

    fn begin_command_buffer(&self, buffer: vk::CommandBuffer, _info: &vk::CommandBufferBeginInfo) -> VkResult<()> {
        self.enter("vkBeginCommandBuffer", 3)?;
        self.state.borrow_mut().recorded.insert(buffer.as_raw(), Vec::new());
        Ok(())
    }

    fn end_command_buffer(&self, _buffer: vk::CommandBuffer) -> VkResult<()> {
        self.enter("vkEndCommandBuffer", 3)
    }

    fn cmd_begin_render_pass(&self, _buffer: vk::CommandBuffer, _info: &vk::RenderPassBeginInfo) {
        self.note("vkCmdBeginRenderPass", 3);
    }

    fn cmd_end_render_pass(&self, _buffer: vk::CommandBuffer) {
        self.note("vkCmdEndRenderPass", 3);
    }

    fn cmd_bind_pipeline(&self, _buffer: vk::CommandBuffer, _pipeline: vk::Pipeline) {
        self.note("vkCmdBindPipeline", 3);
    }

    fn cmd_set_viewport(&self, _buffer: vk::CommandBuffer, _viewport: &vk::Viewport) {
        self.note("vkCmdSetViewport", 3);
    }

    fn cmd_set_scissor(&self, _buffer: vk::CommandBuffer, _scissor: &vk::Rect2D) {
        self.note("vkCmdSetScissor", 3);
    }

    fn cmd_bind_vertex_buffer(&self, _buffer: vk::CommandBuffer, _vertex_buffer: vk::Buffer) {
        self.note("vkCmdBindVertexBuffers", 3);
    }

    fn cmd_bind_index_buffer(&self, _buffer: vk::CommandBuffer, _index_buffer: vk::Buffer, _index_type: vk::IndexType) {
        self.note("vkCmdBindIndexBuffer", 3);
    }

    fn cmd_bind_descriptor_set(&self, _buffer: vk::CommandBuffer, _layout: vk::PipelineLayout, _set: vk::DescriptorSet) {
        self.note("vkCmdBindDescriptorSets", 3);
    }

    fn cmd_push_constants(&self, _buffer: vk::CommandBuffer, _layout: vk::PipelineLayout, _stages: vk::ShaderStageFlags, data: &[u8]) {
        self.note("vkCmdPushConstants", 3);
        self.state.borrow_mut().push_constants.push(data.to_vec());
    }

    fn cmd_draw_indexed(&self, buffer: vk::CommandBuffer, index_count: u32) {
        self.note("vkCmdDrawIndexed", 3);
        self.record(buffer, Recorded::Draw { index_count });
    }

    fn cmd_copy_buffer(&self, buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
        self.note("vkCmdCopyBuffer", 3);
        self.record(buffer, Recorded::CopyBuffer { src: src.as_raw(), dst: dst.as_raw(), size });
    }

    fn cmd_copy_buffer_to_image(&self, buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Image, regions: &[vk::BufferImageCopy]) {
        self.note("vkCmdCopyBufferToImage", 3);
        self.record(
            buffer,
            Recorded::CopyBufferToImage { src: src.as_raw(), dst: dst.as_raw(), regions: regions.to_vec() },
        );
    }

    fn cmd_image_barrier(
        &self,
        buffer: vk::CommandBuffer,
        _src_stage: vk::PipelineStageFlags,
        _dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier,
    ) {
        self.note("vkCmdPipelineBarrier", 3);
        self.record(
            buffer,
            Recorded::Barrier { image: barrier.image.as_raw(), old: barrier.old_layout, new: barrier.new_layout },
        );
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        self.create("vkCreateSemaphore", "semaphore").map(vk::Semaphore::from_raw)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.destroy("vkDestroySemaphore", "semaphore", semaphore.as_raw());
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let raw = self.create("vkCreateFence", "fence")?;
        self.state.borrow_mut().fences.insert(raw, signaled);
        Ok(vk::Fence::from_raw(raw))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.destroy("vkDestroyFence", "fence", fence.as_raw());
        self.state.borrow_mut().fences.remove(&fence.as_raw());
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> VkResult<()> {
        self.enter("vkWaitForFences", 3)?;
        let mut state = self.state.borrow_mut();
        if state.fences.get(&fence.as_raw()) == Some(&true) {
            Ok(())
        } else {
            state.violations.push("wait on a fence nothing will signal".to_string());
            Err(vk::Result::TIMEOUT)
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        self.enter("vkResetFences", 3)?;
        self.state.borrow_mut().fences.insert(fence.as_raw(), false);
        Ok(())
    }

    fn queue_submit(&self, _queue: vk::Queue, submit: &vk::SubmitInfo, fence: vk::Fence) -> VkResult<()> {
        self.enter("vkQueueSubmit", 3)?;
        let buffers: Vec<u64> = unsafe { slice(submit.p_command_buffers, submit.command_buffer_count) }
            .iter()
            .map(|b| b.as_raw())
            .collect();
        let mut state = self.state.borrow_mut();
        for buffer in buffers {
            let commands = state.recorded.get(&buffer).cloned().unwrap_or_default();
            state.execute(commands);
        }
        if fence != vk::Fence::null() {
            state.fences.insert(fence.as_raw(), true);
        }
        Ok(())
    }

    fn queue_wait_idle(&self, _queue: vk::Queue) -> VkResult<()> {
        self.enter("vkQueueWaitIdle", 3)
    }
}

impl MockDriver {
    fn record(&self, buffer: vk::CommandBuffer, command: Recorded) {
        let mut state = self.state.borrow_mut();
        match state.recorded.get_mut(&buffer.as_raw()) {
            Some(commands) => commands.push(command),
            None => state.violations.push("command recorded outside begin/end".to_string()),
        }
    }

    fn requirements(&self, size: u64) -> vk::MemoryRequirements {
        let state = self.state.borrow();
        let type_count = state.devices.get(state.selected).map_or(0, |d| d.memory_types.len());
        let all_types = if type_count >= 32 { u32::MAX } else { (1u32 << type_count) - 1 };
        vk::MemoryRequirements {
            size,
            alignment: 4,
            memory_type_bits: state.memory_type_bits.unwrap_or(all_types),
        }
    }
}
