//! Framebuffers and the depth attachment they share

use ash::{vk, Device};

use crate::render::backends::vulkan::resources::{GpuImage, ImageDesc, ImageView, ResourceAllocator};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Pick the first candidate whose optimal tiling supports depth/stencil attachment
pub fn select_depth_format<F>(candidates: &[vk::Format], mut properties: F) -> Option<vk::Format>
where
    F: FnMut(vk::Format) -> vk::FormatProperties,
{
    candidates.iter().copied().find(|&format| {
        properties(format)
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

/// Query the device for a usable depth format
pub fn find_depth_format(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> VulkanResult<vk::Format> {
    select_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| unsafe {
        instance.get_physical_device_format_properties(physical_device, format)
    })
    .ok_or_else(|| VulkanError::InitializationFailed("No supported depth format".to_string()))
}

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer for the given render pass and attachments
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device
                .create_framebuffer(&framebuffer_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, framebuffer })
    }

    /// Get framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Device-local depth image sized to the swapchain extent
pub struct DepthBuffer {
    // View before image
    view: ImageView,
    image: GpuImage,
}

impl DepthBuffer {
    /// Create the depth image and its view
    ///
    /// No layout transition is issued; the render pass moves the image out of `UNDEFINED`.
    pub fn new(allocator: &ResourceAllocator, extent: vk::Extent2D, format: vk::Format) -> VulkanResult<Self> {
        let image = allocator.create_image(&ImageDesc {
            extent,
            format,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            memory_properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
        })?;
        let view = ImageView::new(
            allocator.device().clone(),
            image.handle(),
            format,
            vk::ImageAspectFlags::DEPTH,
        )?;

        log::debug!("Created {:?} depth buffer {}x{}", format, extent.width, extent.height);
        Ok(Self { view, image })
    }

    /// View bound as the depth attachment
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// Depth format
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_capable() -> vk::FormatProperties {
        vk::FormatProperties {
            optimal_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        }
    }

    #[test]
    fn test_prefers_d32() {
        let format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |_| depth_capable());
        assert_eq!(format, Some(vk::Format::D32_SFLOAT));
    }

    #[test]
    fn test_skips_unsupported_candidates() {
        let format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| {
            if format == vk::Format::D24_UNORM_S8_UINT {
                depth_capable()
            } else {
                vk::FormatProperties::default()
            }
        });
        assert_eq!(format, Some(vk::Format::D24_UNORM_S8_UINT));
    }

    #[test]
    fn test_linear_tiling_support_is_not_enough() {
        let format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |_| vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        });
        assert_eq!(format, None);
    }
}
