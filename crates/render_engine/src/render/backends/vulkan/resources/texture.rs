//! Sampled texture uploaded through a staging buffer

use ash::{vk, Device};

use super::allocator::{GpuImage, ImageDesc, ImageView, ResourceAllocator};
use super::transfer::TransferEngine;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Texel format used for color textures
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Anisotropy requested before clamping to the device limit
const PREFERRED_ANISOTROPY: f32 = 16.0;

/// Shader-readable texture with its view and sampler
///
/// Fields drop in order: sampler, view, then the image and its memory.
pub struct Texture {
    sampler: Sampler,
    view: ImageView,
    image: GpuImage,
}

impl Texture {
    /// Upload RGBA8 pixels and prepare them for fragment shader sampling
    pub fn upload(
        allocator: &ResourceAllocator,
        transfer: &TransferEngine,
        width: u32,
        height: u32,
        rgba: &[u8],
        max_device_anisotropy: f32,
    ) -> VulkanResult<Self> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected || expected == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: format!("texture {}x{} needs {} bytes, got {}", width, height, expected, rgba.len()),
            });
        }

        let staging = transfer.create_staging_buffer(allocator, rgba)?;

        let image = allocator.create_image(&ImageDesc {
            extent: vk::Extent2D { width, height },
            format: TEXTURE_FORMAT,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            memory_properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
        })?;

        transfer.transition_layout(
            image.handle(),
            TEXTURE_FORMAT,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        transfer.copy_buffer_to_image(&staging, &image)?;
        transfer.transition_layout(
            image.handle(),
            TEXTURE_FORMAT,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;
        drop(staging);

        let device = allocator.device().clone();
        let view = ImageView::new(device.clone(), image.handle(), TEXTURE_FORMAT, vk::ImageAspectFlags::COLOR)?;
        let sampler = Sampler::linear_repeat(device, PREFERRED_ANISOTROPY.min(max_device_anisotropy))?;

        log::info!("Uploaded {}x{} texture", width, height);
        Ok(Self { sampler, view, image })
    }

    /// View bound at the texture binding
    pub fn image_view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// Sampler bound at the texture binding
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    /// Texture size in texels
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

/// Sampler with RAII cleanup
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Linear filtering, repeat addressing, a single LOD
    pub fn linear_repeat(device: Device, max_anisotropy: f32) -> VulkanResult<Self> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(max_anisotropy > 1.0)
            .max_anisotropy(max_anisotropy.max(1.0))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = unsafe { device.create_sampler(&create_info, None).map_err(VulkanError::Api)? };
        Ok(Self { device, sampler })
    }

    /// Get sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}
