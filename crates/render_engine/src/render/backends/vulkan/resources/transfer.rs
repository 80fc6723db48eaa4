//! Transfer engine
//!
//! Runs one-shot command buffers on the graphics queue and blocks until the
//! queue is idle. Only startup and resize-time uploads come through here; the
//! per-frame path never does.

use ash::{vk, Device};

use super::allocator::{GpuBuffer, GpuImage, ResourceAllocator};
use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Access masks and pipeline stages for one supported layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    /// Accesses that must complete before the transition
    pub src_access: vk::AccessFlags,
    /// Accesses that wait on the transition
    pub dst_access: vk::AccessFlags,
    /// Stage producing the source accesses
    pub src_stage: vk::PipelineStageFlags,
    /// Stage consuming the destination accesses
    pub dst_stage: vk::PipelineStageFlags,
}

impl LayoutTransition {
    /// Look up barrier parameters for `old -> new`
    ///
    /// Only two edges exist: undefined to transfer destination, and transfer
    /// destination to shader read-only. Anything else is an error.
    pub fn lookup(old: vk::ImageLayout, new: vk::ImageLayout) -> VulkanResult<Self> {
        match (old, new) {
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok(Self {
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::TRANSFER_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::TRANSFER,
            }),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => Ok(Self {
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            }),
            _ => Err(VulkanError::UnsupportedTransition { old, new }),
        }
    }
}

/// Image aspect implied by a format
pub fn aspect_for_format(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Synchronous uploads on the graphics queue
pub struct TransferEngine {
    device: Device,
    queue: vk::Queue,
    pool: CommandPool,
}

impl TransferEngine {
    /// Create a transfer engine with its own transient command pool
    pub fn new(device: Device, queue: vk::Queue, queue_family_index: u32) -> VulkanResult<Self> {
        let pool = CommandPool::new(device.clone(), queue_family_index, vk::CommandPoolCreateFlags::TRANSIENT)?;
        Ok(Self { device, queue, pool })
    }

    /// Record, submit and wait for a one-shot command buffer
    ///
    /// The command buffer is freed before returning, whether or not the
    /// submission succeeded.
    pub fn run_one_shot<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let command_buffers = self.pool.allocate_command_buffers(1)?;
        let command_buffer = command_buffers[0];

        let result = self.record_and_submit(command_buffer, record);
        self.pool.free_command_buffers(&command_buffers);
        result
    }

    fn record_and_submit<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        record(&self.device, command_buffer);

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();

        unsafe {
            self.device.end_command_buffer(command_buffer).map_err(VulkanError::Api)?;
            self.device
                .queue_submit(self.queue, &[submit_info], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device.queue_wait_idle(self.queue).map_err(VulkanError::Api)?;
        }
        Ok(())
    }

    /// Copy `size` bytes from the start of `src` to the start of `dst`
    pub fn copy_buffer(&self, src: &GpuBuffer, dst: &GpuBuffer, size: vk::DeviceSize) -> VulkanResult<()> {
        if size > src.size() || size > dst.size() {
            return Err(VulkanError::InvalidOperation {
                reason: format!("copy of {} bytes exceeds {} -> {} byte buffers", size, src.size(), dst.size()),
            });
        }

        self.run_one_shot(|device, command_buffer| {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            unsafe {
                device.cmd_copy_buffer(command_buffer, src.handle(), dst.handle(), &[region]);
            }
        })
    }

    /// Copy tightly packed texels from `src` into the whole of `image`
    ///
    /// The image must already be in `TRANSFER_DST_OPTIMAL`.
    pub fn copy_buffer_to_image(&self, src: &GpuBuffer, image: &GpuImage) -> VulkanResult<()> {
        let extent = image.extent();
        self.run_one_shot(|device, command_buffer| {
            let region = vk::BufferImageCopy {
                buffer_offset: 0,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: aspect_for_format(image.format()),
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                image_extent: vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                },
            };
            unsafe {
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    src.handle(),
                    image.handle(),
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }
        })
    }

    /// Move `image` from `old` to `new` layout with a pipeline barrier
    ///
    /// Unsupported pairs fail before any command buffer is allocated.
    pub fn transition_layout(
        &self,
        image: vk::Image,
        format: vk::Format,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> VulkanResult<()> {
        let transition = LayoutTransition::lookup(old, new)?;

        self.run_one_shot(|device, command_buffer| {
            let barrier = vk::ImageMemoryBarrier::builder()
                .old_layout(old)
                .new_layout(new)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect_for_format(format),
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .src_access_mask(transition.src_access)
                .dst_access_mask(transition.dst_access)
                .build();

            unsafe {
                device.cmd_pipeline_barrier(
                    command_buffer,
                    transition.src_stage,
                    transition.dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            }
        })
    }

    /// Create a host-visible staging buffer holding `data`
    ///
    /// The caller drops it once the copy out of it has completed.
    pub fn create_staging_buffer<T: bytemuck::Pod>(
        &self,
        allocator: &ResourceAllocator,
        data: &[T],
    ) -> VulkanResult<GpuBuffer> {
        let size = std::mem::size_of_val(data) as vk::DeviceSize;
        let staging = allocator.create_buffer(
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write(data)?;
        Ok(staging)
    }

    /// Upload `data` into a new device-local buffer through a staging buffer
    pub fn upload_buffer<T: bytemuck::Pod>(
        &self,
        allocator: &ResourceAllocator,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<GpuBuffer> {
        if data.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot upload an empty buffer".to_string(),
            });
        }

        let staging = self.create_staging_buffer(allocator, data)?;
        let buffer = allocator.create_buffer(
            staging.size(),
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        self.copy_buffer(&staging, &buffer, staging.size())?;

        log::debug!("Uploaded {} bytes to device-local buffer ({:?})", buffer.size(), usage);
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_to_transfer_dst() {
        let transition =
            LayoutTransition::lookup(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL).unwrap();

        assert_eq!(transition.src_access, vk::AccessFlags::empty());
        assert_eq!(transition.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(transition.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(transition.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn test_transfer_dst_to_shader_read() {
        let transition = LayoutTransition::lookup(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();

        assert_eq!(transition.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(transition.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(transition.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(transition.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_every_other_pair_is_rejected() {
        let layouts = [
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        ];
        let supported = [
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        ];

        for old in layouts {
            for new in layouts {
                let result = LayoutTransition::lookup(old, new);
                if supported.contains(&(old, new)) {
                    assert!(result.is_ok());
                } else {
                    assert!(
                        matches!(result, Err(VulkanError::UnsupportedTransition { old: o, new: n }) if o == old && n == new),
                        "{old:?} -> {new:?} should be rejected"
                    );
                }
            }
        }
    }

    #[test]
    fn test_aspect_for_depth_and_color_formats() {
        assert_eq!(aspect_for_format(vk::Format::R8G8B8A8_SRGB), vk::ImageAspectFlags::COLOR);
        assert_eq!(aspect_for_format(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            aspect_for_format(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }
}
