//! Vulkan instance, device and queue setup

pub mod context;
pub mod queue_families;

pub use context::{LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanInstance, VulkanResult};
pub use queue_families::QueueFamilyIndices;
