//! Queue family discovery

use ash::extensions::khr::Surface;
use ash::{vk, Instance};

use super::context::{VulkanError, VulkanResult};

/// Graphics and present queue families, each possibly not found yet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family supporting graphics commands
    pub graphics: Option<u32>,
    /// Family able to present to the surface
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Query the device's queue families against a surface
    pub fn find(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut indices = Self::default();
        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(VulkanError::Api)?
            };
            indices.consider(index, family.queue_flags, present_support);

            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }

    /// Record a family if it fills a slot that is still empty
    pub fn consider(&mut self, index: u32, flags: vk::QueueFlags, present_support: bool) {
        if self.graphics.is_none() && flags.contains(vk::QueueFlags::GRAPHICS) {
            self.graphics = Some(index);
        }
        if self.present.is_none() && present_support {
            self.present = Some(index);
        }
    }

    /// Both families were found
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Both indices, or an error naming the missing one
    pub fn resolved(&self) -> VulkanResult<(u32, u32)> {
        let graphics = self
            .graphics
            .ok_or_else(|| VulkanError::InitializationFailed("No graphics queue family found".to_string()))?;
        let present = self
            .present
            .ok_or_else(|| VulkanError::InitializationFailed("No present queue family found".to_string()))?;
        Ok((graphics, present))
    }

    /// Distinct family indices, graphics first
    pub fn unique(&self) -> Vec<u32> {
        let mut families: Vec<u32> = self.graphics.into_iter().chain(self.present).collect();
        families.dedup();
        families
    }
}
