//! Physical device selection and logical device management

use super::{CapabilityLoader, SharedDriver, Surface, VkResultExt, VulkanError, VulkanInstance, VulkanResult};
use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;
use std::ffi::CString;

/// How the graphics and present roles map onto queue families
///
/// Decided once during device selection and consumed by logical device
/// creation and by swapchain creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLayout {
    /// One family does both; two queues are requested when it has them
    Unified {
        /// Family used for both roles
        family: u32,
        /// Queues requested from the family, 1 or 2
        queues: u32,
    },
    /// Different families; one queue is requested from each
    Split {
        /// Family used for graphics submissions
        graphics: u32,
        /// Family used for presentation
        present: u32,
    },
}

impl QueueLayout {
    /// Build the layout from the two role indices
    ///
    /// `available` is the queue count of the graphics family. A unified
    /// family with a single queue presents on the graphics queue.
    pub fn from_families(graphics: u32, present: u32, available: u32) -> Self {
        if graphics == present {
            Self::Unified {
                family: graphics,
                queues: available.clamp(1, 2),
            }
        } else {
            Self::Split { graphics, present }
        }
    }

    /// Family that receives graphics submissions
    pub fn graphics_family(&self) -> u32 {
        match *self {
            Self::Unified { family, .. } => family,
            Self::Split { graphics, .. } => graphics,
        }
    }

    /// Family that receives present requests
    pub fn present_family(&self) -> u32 {
        match *self {
            Self::Unified { family, .. } => family,
            Self::Split { present, .. } => present,
        }
    }

    /// `(family, queue index)` of the graphics queue
    pub fn graphics_queue(&self) -> (u32, u32) {
        (self.graphics_family(), 0)
    }

    /// `(family, queue index)` of the present queue
    pub fn present_queue(&self) -> (u32, u32) {
        match *self {
            Self::Unified { family, queues } => (family, queues - 1),
            Self::Split { present, .. } => (present, 0),
        }
    }

    /// `(family, queue count)` pairs to request at device creation
    pub fn queue_requests(&self) -> Vec<(u32, u32)> {
        match *self {
            Self::Unified { family, queues } => vec![(family, queues)],
            Self::Split { graphics, present } => vec![(graphics, 1), (present, 1)],
        }
    }

    /// Swapchain image sharing mode
    pub fn sharing_mode(&self) -> vk::SharingMode {
        match self {
            Self::Unified { .. } => vk::SharingMode::EXCLUSIVE,
            Self::Split { .. } => vk::SharingMode::CONCURRENT,
        }
    }

    /// Families named in a concurrent swapchain; empty when exclusive
    pub fn sharing_families(&self) -> Vec<u32> {
        match *self {
            Self::Unified { .. } => Vec::new(),
            Self::Split { graphics, present } => vec![graphics, present],
        }
    }
}

/// Chosen physical device and the properties the session needs from it
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    /// Physical device handle
    pub device: vk::PhysicalDevice,
    /// Device name as reported by the driver
    pub name: String,
    /// Graphics/present family mapping
    pub queue_layout: QueueLayout,
    /// Surface capabilities at selection time
    pub surface_capabilities: vk::SurfaceCapabilitiesKHR,
    /// Present modes the surface supports
    pub present_modes: Vec<vk::PresentModeKHR>,
    /// Memory types and heaps
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl PhysicalDeviceInfo {
    /// Pick the first device that supports swapchains
    ///
    /// There is no scoring. Queue roles are resolved on the chosen device
    /// only; a device without a graphics or present family is an error, not
    /// a reason to try the next one.
    pub fn select(driver: &SharedDriver, surface: &Surface) -> VulkanResult<Self> {
        let devices = driver.enumerate_physical_devices().check("vkEnumeratePhysicalDevices")?;
        let swapchain_extension = SwapchainLoader::name().to_string_lossy().into_owned();

        let mut chosen = None;
        for device in devices {
            let extensions = driver
                .device_extensions(device)
                .check("vkEnumerateDeviceExtensionProperties")?;
            if extensions.contains(&swapchain_extension) {
                chosen = Some(device);
                break;
            }
            log::debug!("Skipping {}: no swapchain support", driver.physical_device_name(device));
        }
        let device = chosen.ok_or(VulkanError::NoSuitableDevice)?;

        let name = driver.physical_device_name(device);
        log::info!("Selected GPU: {}", name);

        let queue_layout = Self::find_queue_layout(driver, device, surface.handle())?;
        log::debug!("Queue layout: {:?}", queue_layout);

        let surface_capabilities = driver
            .surface_capabilities(device, surface.handle())
            .check("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        let present_modes = driver
            .surface_present_modes(device, surface.handle())
            .check("vkGetPhysicalDeviceSurfacePresentModesKHR")?;
        let memory_properties = driver.memory_properties(device);

        Ok(Self {
            device,
            name,
            queue_layout,
            surface_capabilities,
            present_modes,
            memory_properties,
        })
    }

    fn find_queue_layout(
        driver: &SharedDriver,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VulkanResult<QueueLayout> {
        let families = driver.queue_families(device);

        let mut graphics = None;
        let mut present = None;
        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics = Some(index);
            }
            if present.is_none()
                && driver
                    .surface_support(device, index, surface)
                    .check("vkGetPhysicalDeviceSurfaceSupportKHR")?
            {
                present = Some(index);
            }
        }

        let graphics = graphics.ok_or(VulkanError::MissingQueueFamily("graphics"))?;
        let present = present.ok_or(VulkanError::MissingQueueFamily("present"))?;
        let available = families[graphics as usize].queue_count;
        Ok(QueueLayout::from_families(graphics, present, available))
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    driver: SharedDriver,
    handle: vk::Device,
    /// Queue used for submissions and one-shot uploads
    pub graphics_queue: vk::Queue,
    /// Queue used for presentation; may alias the graphics family
    pub present_queue: vk::Queue,
}

impl LogicalDevice {
    /// Create the logical device and load its function table
    pub fn new(
        driver: SharedDriver,
        loader: &mut CapabilityLoader,
        instance: &VulkanInstance,
        physical: &PhysicalDeviceInfo,
    ) -> VulkanResult<Self> {
        let priorities = [1.0f32, 1.0];
        let requests = physical.queue_layout.queue_requests();
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = requests
            .iter()
            .map(|&(family, count)| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities[..count as usize])
                    .build()
            })
            .collect();

        let extension_names = [CString::from(SwapchainLoader::name())];
        let extension_ptrs: Vec<*const std::os::raw::c_char> = extension_names.iter().map(|e| e.as_ptr()).collect();
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features);

        let handle = driver
            .create_device(physical.device, &create_info)
            .check("vkCreateDevice")?;
        let mut device = Self {
            driver,
            handle,
            graphics_queue: vk::Queue::null(),
            present_queue: vk::Queue::null(),
        };

        loader.refresh(instance.handle(), physical.device, handle)?;

        let (family, index) = physical.queue_layout.graphics_queue();
        device.graphics_queue = device.driver.device_queue(family, index);
        let (family, index) = physical.queue_layout.present_queue();
        device.present_queue = device.driver.device_queue(family, index);

        log::debug!("Created logical device with queue requests {:?}", requests);
        Ok(device)
    }

    /// Get device handle
    pub fn handle(&self) -> vk::Device {
        self.handle
    }

    /// Wait for all submitted work to finish
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.driver.device_wait_idle().check("vkDeviceWaitIdle")
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        self.driver.destroy_device(self.handle);
    }
}
