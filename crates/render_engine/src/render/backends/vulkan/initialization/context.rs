//! Instance, surface and device setup
//!
//! Owns the instance, surface, physical device choice and logical device.
//! Everything created from the device must be dropped before the context.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

use super::queue_families::QueueFamilyIndices;
use crate::config::RendererConfig;
use crate::render::window::{Window, WindowError};

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Errors raised by the Vulkan backend
#[derive(Error, Debug)]
pub enum VulkanError {
    /// A Vulkan call returned an error code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// The backend was used in a state that does not allow the call
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// What was wrong
        reason: String,
    },

    /// Instance, device or surface setup failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No memory type satisfies both the resource's type mask and the requested properties
    #[error("No suitable memory type for type bits {type_bits:#b} with properties {properties:?}")]
    NoSuitableMemoryType {
        /// Memory type mask reported by the resource's requirements
        type_bits: u32,
        /// Property flags the caller asked for
        properties: vk::MemoryPropertyFlags,
    },

    /// Creating, allocating or binding a resource failed
    #[error("Allocation of {resource} failed: {result:?}")]
    AllocationFailed {
        /// Kind of resource being created
        resource: &'static str,
        /// Driver result code
        result: vk::Result,
    },

    /// Layout transition outside the supported table
    #[error("Unsupported layout transition {old:?} -> {new:?}")]
    UnsupportedTransition {
        /// Layout the image is in
        old: vk::ImageLayout,
        /// Layout that was requested
        new: vk::ImageLayout,
    },

    /// Acquiring a swapchain image failed for a reason other than out-of-date
    #[error("Failed to acquire swapchain image: {0:?}")]
    Acquire(vk::Result),

    /// Submitting frame work to the graphics queue failed
    #[error("Failed to submit draw command buffer: {0:?}")]
    Submit(vk::Result),

    /// Presenting failed for a reason other than out-of-date or suboptimal
    #[error("Failed to present swapchain image: {0:?}")]
    Present(vk::Result),

    /// The window system failed
    #[error("Window error: {0}")]
    Window(#[from] WindowError),
}

impl VulkanError {
    /// Whether this error belongs to the allocation category
    pub fn is_allocation_error(&self) -> bool {
        matches!(self, Self::NoSuitableMemoryType { .. } | Self::AllocationFailed { .. })
    }
}

/// Result alias used throughout the backend
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Instance plus the optional validation messenger, destroyed on drop
pub struct VulkanInstance {
    /// Loaded entry points
    pub entry: Entry,
    /// Instance dispatch table
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance, with validation when requested and available
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {:?}", e)))?;

        let app_name_cstr = to_cstring(app_name)?;
        let engine_name_cstr = to_cstring("render_engine")?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let validation = enable_validation && Self::validation_layer_available(&entry)?;
        if enable_validation && !validation {
            log::warn!("{} requested but not installed, continuing without it", VALIDATION_LAYER);
        }

        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {}", e)))?;
        let cstr_extensions = required_extensions
            .iter()
            .map(|ext| to_cstring(ext))
            .collect::<VulkanResult<Vec<_>>>()?;
        let mut extensions: Vec<*const std::os::raw::c_char> = cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if validation { vec![to_cstring(VALIDATION_LAYER)?] } else { Vec::new() };
        let layer_ptrs: Vec<*const std::os::raw::c_char> = layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None).map_err(VulkanError::Api)? };

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = Self::setup_debug_messenger(&debug_utils)?;
            log::info!("Validation layers enabled");
            Some((debug_utils, messenger))
        } else {
            None
        };

        Ok(Self { entry, instance, debug })
    }

    fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
        let layers = entry.enumerate_instance_layer_properties().map_err(VulkanError::Api)?;
        Ok(layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_bytes() == VALIDATION_LAYER.as_bytes()
        }))
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn to_cstring(value: &str) -> VulkanResult<CString> {
    CString::new(value).map_err(|_| VulkanError::InitializationFailed(format!("'{value}' contains a NUL byte")))
}

/// Routes validation messages into the `log` facade by severity
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::trace!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// The chosen GPU and what it reported at selection time
pub struct PhysicalDeviceInfo {
    /// Handle
    pub device: vk::PhysicalDevice,
    /// Properties, including the limits used for sampler anisotropy
    pub properties: vk::PhysicalDeviceProperties,
    /// Queue families found at selection time
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Select the first physical device able to render to `surface`
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices().map_err(VulkanError::Api)? };

        for device in devices {
            match Self::evaluate_device(instance, device, surface, surface_loader) {
                Ok(device_info) => {
                    let name = unsafe { CStr::from_ptr(device_info.properties.device_name.as_ptr()) };
                    log::info!("Using physical device {}", name.to_string_lossy());
                    return Ok(device_info);
                }
                Err(reason) => log::debug!("Skipping physical device: {}", reason),
            }
        }

        Err(VulkanError::InitializationFailed("No suitable GPU found".to_string()))
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };

        let queue_families = QueueFamilyIndices::find(instance, device, surface, surface_loader)?;
        queue_families.resolved()?;

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let has_swapchain = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Err(VulkanError::InitializationFailed(
                "VK_KHR_swapchain not supported".to_string(),
            ));
        }

        // Swapchain adequacy: at least one format and one present mode
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map_err(VulkanError::Api)?
        };
        if formats.is_empty() || present_modes.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "Surface has no formats or present modes".to_string(),
            ));
        }

        if features.sampler_anisotropy == vk::FALSE {
            return Err(VulkanError::InitializationFailed(
                "Sampler anisotropy not supported".to_string(),
            ));
        }

        Ok(Self {
            device,
            properties,
            queue_families,
        })
    }
}

/// Logical device and its queues, destroyed on drop
pub struct LogicalDevice {
    /// Dispatch table
    pub device: Device,
    /// Queue used for draws and transfers
    pub graphics_queue: vk::Queue,
    /// Queue used for presentation
    pub present_queue: vk::Queue,
    /// Family of `graphics_queue`
    pub graphics_family: u32,
    /// Family of `present_queue`
    pub present_family: u32,
    /// `VK_KHR_swapchain` entry points
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a logical device with one queue per unique family
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let (graphics_family, present_family) = physical_device_info.queue_families.resolved()?;
        let priorities = [1.0_f32];

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = physical_device_info
            .queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true).build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device_info.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::debug!(
            "Created logical device (graphics family {}, present family {})",
            graphics_family,
            present_family
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            graphics_family,
            present_family,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Everything the rest of the backend is created from
///
/// Fields drop in declaration order, so the device goes before the instance.
pub struct VulkanContext {
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    physical_device: PhysicalDeviceInfo,
    device: LogicalDevice,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Bring up Vulkan for `window`
    pub fn new(window: &mut Window, config: &RendererConfig) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, &config.application_name, config.validation_enabled())?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window.create_vulkan_surface(instance.instance.handle())?;

        let physical_device =
            PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader)?;
        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        Ok(Self {
            surface,
            surface_loader,
            physical_device,
            device,
            instance,
        })
    }

    /// Instance dispatch table
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Window surface
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// `VK_KHR_surface` entry points
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// Selected GPU
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Logical device
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// `VK_KHR_swapchain` entry points
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Queue for draws and one-shot transfers
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Queue for presentation
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Family index of the graphics queue
    pub fn graphics_queue_family(&self) -> u32 {
        self.device.graphics_family
    }

    /// Re-query queue families for the current surface
    pub fn query_queue_families(&self) -> VulkanResult<QueueFamilyIndices> {
        QueueFamilyIndices::find(
            &self.instance.instance,
            self.physical_device.device,
            self.surface,
            &self.surface_loader,
        )
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_category() {
        let no_type = VulkanError::NoSuitableMemoryType {
            type_bits: 0b101,
            properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
        };
        let failed = VulkanError::AllocationFailed {
            resource: "buffer",
            result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
        };

        assert!(no_type.is_allocation_error());
        assert!(failed.is_allocation_error());
        assert!(!VulkanError::Acquire(vk::Result::ERROR_DEVICE_LOST).is_allocation_error());
    }

    #[test]
    fn test_error_messages_name_the_layouts() {
        let error = VulkanError::UnsupportedTransition {
            old: vk::ImageLayout::UNDEFINED,
            new: vk::ImageLayout::PRESENT_SRC_KHR,
        };
        let message = error.to_string();
        assert!(message.contains("UNDEFINED"));
        assert!(message.contains("PRESENT_SRC_KHR"));
    }
}
