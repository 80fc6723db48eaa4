//! Descriptor set layouts, pools and writes for the mesh pipeline
//!
//! Binding 0 holds the transform uniform, binding 1 the lighting constants,
//! binding 2 the texture. The layout lives for the whole session; the pool and
//! its sets are rebuilt with the swapchain because they are sized per image.

use ash::{vk, Device};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Binding of the transform uniform buffer
pub const TRANSFORM_BINDING: u32 = 0;
/// Binding of the lighting uniform buffer
pub const LIGHTING_BINDING: u32 = 1;
/// Binding of the texture sampler
pub const TEXTURE_BINDING: u32 = 2;

/// Accumulates bindings for one descriptor set layout
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Start with no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniform buffer at `binding`
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
    }

    /// Combined image sampler at `binding`
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stage_flags)
    }

    fn add(mut self, binding: u32, descriptor_type: vk::DescriptorType, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Bindings added so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Create the layout on `device`
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }.map_err(VulkanError::Api)?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
        })
    }
}

/// Layout builder for the mesh pipeline's single descriptor set
pub fn mesh_layout_builder() -> DescriptorSetLayoutBuilder {
    let uniform_stages = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;
    DescriptorSetLayoutBuilder::new()
        .add_uniform_buffer(TRANSFORM_BINDING, uniform_stages)
        .add_uniform_buffer(LIGHTING_BINDING, uniform_stages)
        .add_combined_image_sampler(TEXTURE_BINDING, vk::ShaderStageFlags::FRAGMENT)
}

/// Owned descriptor set layout, destroyed on drop
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
}

impl DescriptorSetLayout {
    /// Raw handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool sizes for one mesh descriptor set per swapchain image
pub fn mesh_pool_sizes(image_count: u32) -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: image_count * 2,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: image_count,
        },
    ]
}

/// Owned descriptor pool
///
/// Sets allocated from the pool are released when the pool is destroyed.
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create a pool holding exactly one mesh set per swapchain image
    pub fn for_mesh(device: Device, image_count: u32) -> VulkanResult<Self> {
        let pool_sizes = mesh_pool_sizes(image_count);
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(image_count)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self { pool, device })
    }

    /// Allocate one set per layout entry
    pub fn allocate_descriptor_sets(&self, layouts: &[vk::DescriptorSetLayout]) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::Api)
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

enum PendingWrite {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

/// Collects descriptor writes and applies them in one update call
#[derive(Default)]
pub struct DescriptorSetWriter {
    writes: Vec<(vk::DescriptorSet, u32, PendingWrite)>,
}

impl DescriptorSetWriter {
    /// Empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a whole uniform buffer to a binding
    pub fn write_uniform_buffer(mut self, set: vk::DescriptorSet, binding: u32, buffer: vk::Buffer, range: vk::DeviceSize) -> Self {
        let info = vk::DescriptorBufferInfo {
            buffer,
            offset: 0,
            range,
        };
        self.writes.push((set, binding, PendingWrite::Buffer(info)));
        self
    }

    /// Write a shader-readable image and sampler to a binding
    pub fn write_combined_image(mut self, set: vk::DescriptorSet, binding: u32, view: vk::ImageView, sampler: vk::Sampler) -> Self {
        let info = vk::DescriptorImageInfo {
            sampler,
            image_view: view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        self.writes.push((set, binding, PendingWrite::Image(info)));
        self
    }

    /// Apply every queued write in one call
    pub fn update(self, device: &Device) {
        // The info structs stay in `self.writes` while the raw writes point at them
        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|(set, binding, pending)| {
                let builder = vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(*binding)
                    .dst_array_element(0);
                match pending {
                    PendingWrite::Buffer(info) => builder
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(std::slice::from_ref(info))
                        .build(),
                    PendingWrite::Image(info) => builder
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(std::slice::from_ref(info))
                        .build(),
                }
            })
            .collect();

        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_layout_bindings() {
        let builder = mesh_layout_builder();
        let bindings = builder.bindings();

        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(bindings[1].binding, LIGHTING_BINDING);
        assert_eq!(bindings[2].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(bindings[2].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_pool_sized_per_image() {
        let sizes = mesh_pool_sizes(3);
        assert_eq!(sizes[0].descriptor_count, 6);
        assert_eq!(sizes[1].descriptor_count, 3);
    }
}
