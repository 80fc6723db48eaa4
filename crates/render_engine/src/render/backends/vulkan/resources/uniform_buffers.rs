//! Per-image uniform regions
//!
//! Each swapchain image owns one host-coherent buffer per uniform kind. A
//! region is only written after the fences guarding its image have signaled.

use ash::vk;

use super::allocator::{GpuBuffer, ResourceAllocator};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::{LightingConstants, TransformUniform};

/// Transform and lighting buffers for one swapchain image
pub struct UniformRegion {
    transform: GpuBuffer,
    lighting: GpuBuffer,
}

impl UniformRegion {
    fn new(allocator: &ResourceAllocator) -> VulkanResult<Self> {
        let properties = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        Ok(Self {
            transform: allocator.create_buffer(
                std::mem::size_of::<TransformUniform>() as vk::DeviceSize,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                properties,
            )?,
            lighting: allocator.create_buffer(
                std::mem::size_of::<LightingConstants>() as vk::DeviceSize,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                properties,
            )?,
        })
    }

    /// Transform buffer and its size
    pub fn transform_buffer(&self) -> (vk::Buffer, vk::DeviceSize) {
        (self.transform.handle(), self.transform.size())
    }

    /// Lighting buffer and its size
    pub fn lighting_buffer(&self) -> (vk::Buffer, vk::DeviceSize) {
        (self.lighting.handle(), self.lighting.size())
    }
}

/// Uniform regions indexed by swapchain image
pub struct UniformRegions {
    regions: Vec<UniformRegion>,
}

impl UniformRegions {
    /// One region per swapchain image
    pub fn new(allocator: &ResourceAllocator, image_count: usize) -> VulkanResult<Self> {
        let regions = (0..image_count)
            .map(|_| UniformRegion::new(allocator))
            .collect::<VulkanResult<Vec<_>>>()?;
        Ok(Self { regions })
    }

    /// Region for `image_index`
    pub fn get(&self, image_index: usize) -> Option<&UniformRegion> {
        self.regions.get(image_index)
    }

    /// All regions in image order
    pub fn iter(&self) -> impl Iterator<Item = &UniformRegion> {
        self.regions.iter()
    }

    /// Overwrite both uniforms of one image
    pub fn write(&self, image_index: usize, transform: &TransformUniform, lighting: &LightingConstants) -> VulkanResult<()> {
        let region = self.regions.get(image_index).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("no uniform region for image {image_index}"),
        })?;
        region.transform.write(std::slice::from_ref(transform))?;
        region.lighting.write(std::slice::from_ref(lighting))?;
        Ok(())
    }
}
