//! Resource allocator
//!
//! Creates buffers and images, finds a compatible memory type, and allocates
//! and binds dedicated memory for each. Memory properties are queried from the
//! physical device on every call so a recreated swapchain never sees stale data.

use ash::{vk, Device, Instance};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// First memory type whose bit is set in `type_bits` and whose flags contain `properties`
///
/// Types are scanned in device order; there is no scoring.
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = (memory_properties.memory_type_count as usize).min(memory_properties.memory_types.len());
    memory_properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(index, memory_type)| {
            type_bits & (1 << index) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(index, _)| index as u32)
}

/// Buffer with its own device memory
///
/// The buffer handle is destroyed before its memory is freed.
pub struct GpuBuffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
}

impl GpuBuffer {
    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Requested size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Usage flags the buffer was created with
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    /// Copy `data` to the start of the buffer
    ///
    /// The buffer must live in host-visible, host-coherent memory; no flush is issued.
    pub fn write<T: bytemuck::Pod>(&self, data: &[T]) -> VulkanResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {} bytes exceeds buffer size {}", bytes.len(), self.size),
            });
        }

        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// 2D image with its own device memory
pub struct GpuImage {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    extent: vk::Extent2D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
}

impl GpuImage {
    /// Get image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Image size in texels
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Image format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Usage flags the image was created with
    pub fn usage(&self) -> vk::ImageUsageFlags {
        self.usage
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Image view with RAII cleanup
pub struct ImageView {
    device: Device,
    view: vk::ImageView,
}

impl ImageView {
    /// Create a single-mip, single-layer 2D view
    pub fn new(device: Device, image: vk::Image, format: vk::Format, aspect: vk::ImageAspectFlags) -> VulkanResult<Self> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { device.create_image_view(&create_info, None).map_err(VulkanError::Api)? };
        Ok(Self { device, view })
    }

    /// Get view handle
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
    }
}

/// Parameters for [`ResourceAllocator::create_image`]
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    /// Width and height in texels
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
    /// Linear or optimal tiling
    pub tiling: vk::ImageTiling,
    /// Intended usage
    pub usage: vk::ImageUsageFlags,
    /// Required memory properties
    pub memory_properties: vk::MemoryPropertyFlags,
}

/// Creates GPU resources backed by dedicated allocations
#[derive(Clone)]
pub struct ResourceAllocator {
    instance: Instance,
    device: Device,
    physical_device: vk::PhysicalDevice,
}

impl ResourceAllocator {
    /// Create an allocator for one logical device
    pub fn new(instance: Instance, device: Device, physical_device: vk::PhysicalDevice) -> Self {
        Self {
            instance,
            device,
            physical_device,
        }
    }

    /// Logical device resources are created on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Find a memory type against the device's current memory properties
    pub fn find_memory_type(&self, type_bits: u32, properties: vk::MemoryPropertyFlags) -> VulkanResult<u32> {
        let memory_properties = unsafe {
            self.instance
                .get_physical_device_memory_properties(self.physical_device)
        };

        find_memory_type_index(&memory_properties, type_bits, properties)
            .ok_or(VulkanError::NoSuitableMemoryType { type_bits, properties })
    }

    /// Create a buffer and bind fresh memory to it
    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<GpuBuffer> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            self.device
                .create_buffer(&buffer_info, None)
                .map_err(|result| VulkanError::AllocationFailed { resource: "buffer", result })?
        };

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let memory = match self.allocate_and_bind(requirements, properties, |memory| unsafe {
            self.device.bind_buffer_memory(buffer, memory, 0)
        }) {
            Ok(memory) => memory,
            Err(error) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                log::error!("Buffer allocation of {} bytes failed: {}", size, error);
                return Err(error);
            }
        };

        Ok(GpuBuffer {
            device: self.device.clone(),
            buffer,
            memory,
            size,
            usage,
        })
    }

    /// Create a single-mip 2D image and bind fresh memory to it
    pub fn create_image(&self, desc: &ImageDesc) -> VulkanResult<GpuImage> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(desc.format)
            .tiling(desc.tiling)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe {
            self.device
                .create_image(&image_info, None)
                .map_err(|result| VulkanError::AllocationFailed { resource: "image", result })?
        };

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let memory = match self.allocate_and_bind(requirements, desc.memory_properties, |memory| unsafe {
            self.device.bind_image_memory(image, memory, 0)
        }) {
            Ok(memory) => memory,
            Err(error) => {
                unsafe { self.device.destroy_image(image, None) };
                log::error!(
                    "Image allocation {}x{} {:?} failed: {}",
                    desc.extent.width,
                    desc.extent.height,
                    desc.format,
                    error
                );
                return Err(error);
            }
        };

        Ok(GpuImage {
            device: self.device.clone(),
            image,
            memory,
            extent: desc.extent,
            format: desc.format,
            usage: desc.usage,
        })
    }

    fn allocate_and_bind(
        &self,
        requirements: vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
        bind: impl FnOnce(vk::DeviceMemory) -> ash::prelude::VkResult<()>,
    ) -> VulkanResult<vk::DeviceMemory> {
        let memory_type_index = self.find_memory_type(requirements.memory_type_bits, properties)?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe {
            self.device
                .allocate_memory(&alloc_info, None)
                .map_err(|result| VulkanError::AllocationFailed { resource: "device memory", result })?
        };

        if let Err(result) = bind(memory) {
            unsafe { self.device.free_memory(memory, None) };
            return Err(VulkanError::AllocationFailed { resource: "memory binding", result });
        }

        Ok(memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, flags) in properties.memory_types.iter_mut().zip(types) {
            slot.property_flags = *flags;
        }
        properties
    }

    const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    );

    #[test]
    fn test_lowest_matching_index_wins() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            HOST | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        assert_eq!(find_memory_type_index(&props, 0b111, HOST), Some(1));
        assert_eq!(
            find_memory_type_index(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
    }

    #[test]
    fn test_type_bits_exclude_otherwise_matching_types() {
        let props = memory_properties(&[HOST, HOST | vk::MemoryPropertyFlags::HOST_CACHED]);

        assert_eq!(find_memory_type_index(&props, 0b10, HOST), Some(1));
    }

    #[test]
    fn test_superset_of_requested_flags_matches() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL | HOST]);

        assert_eq!(find_memory_type_index(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE), Some(0));
    }

    #[test]
    fn test_no_match_returns_none() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, HOST]);

        assert_eq!(find_memory_type_index(&props, 0b01, HOST), None);
        assert_eq!(find_memory_type_index(&props, 0, vk::MemoryPropertyFlags::empty()), None);
    }

    #[test]
    fn test_types_past_reported_count_are_ignored() {
        let mut props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        props.memory_types[1].property_flags = HOST;

        assert_eq!(find_memory_type_index(&props, 0b11, HOST), None);
    }
}
