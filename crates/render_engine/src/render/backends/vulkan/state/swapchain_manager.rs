//! Everything whose lifetime is tied to one swapchain generation
//!
//! The graph is built in dependency order and destroyed as a unit. It is never
//! patched in place: on invalidation the renderer waits for the device to go
//! idle, drops the whole value, then builds a new one from freshly queried
//! surface support.

use ash::{vk, Device};

use super::swapchain::{Swapchain, SurfaceSupport};
use crate::render::backends::vulkan::initialization::VulkanContext;
use crate::render::backends::vulkan::rendering::{
    find_depth_format, CommandBuffers, CommandPool, DepthBuffer, Framebuffer, GraphicsPipeline, PipelineDesc,
    RenderPass,
};
use crate::render::backends::vulkan::resources::descriptor_set::{LIGHTING_BINDING, TEXTURE_BINDING, TRANSFORM_BINDING};
use crate::render::backends::vulkan::resources::{
    DescriptorPool, DescriptorSetWriter, ResourceAllocator, SceneResources, UniformRegions,
};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::{LightingConstants, TransformUniform};

/// Inputs that stay fixed across swapchain generations
#[derive(Debug, Clone, Copy)]
pub struct FrameTargetDesc {
    /// Color the render pass clears to
    pub clear_color: [f32; 4],
    /// Fixed-function pipeline state
    pub pipeline: PipelineDesc,
}

/// Swapchain plus render targets, pipeline, uniforms, descriptors and commands built for it
///
/// Fields drop in declaration order: consumers before the objects they reference.
pub struct SwapchainResources {
    command_buffers: CommandBuffers,
    descriptor_sets: Vec<vk::DescriptorSet>,
    depth: DepthBuffer,
    framebuffers: Vec<Framebuffer>,
    pipeline: GraphicsPipeline,
    render_pass: RenderPass,
    swapchain: Swapchain,
    uniforms: UniformRegions,
    // Frees the descriptor sets above
    descriptor_pool: DescriptorPool,
}

impl SwapchainResources {
    /// Build a complete swapchain generation for the current surface state
    pub fn create(
        context: &VulkanContext,
        allocator: &ResourceAllocator,
        command_pool: &CommandPool,
        scene: &SceneResources,
        framebuffer_size: (u32, u32),
        desc: &FrameTargetDesc,
    ) -> VulkanResult<Self> {
        let device = context.device();
        let physical_device = context.physical_device().device;

        let queue_families = context.query_queue_families()?.resolved()?;
        let support = SurfaceSupport::query(context.surface_loader(), physical_device, context.surface())?;
        let swapchain = Swapchain::new(
            device,
            context.swapchain_loader().clone(),
            context.surface(),
            &support,
            framebuffer_size,
            queue_families,
        )?;
        let extent = swapchain.extent();
        let image_count = swapchain.image_count();

        let depth_format = find_depth_format(context.instance(), physical_device)?;
        let render_pass = RenderPass::new_forward_pass(device.clone(), swapchain.format().format, depth_format)?;
        let pipeline = GraphicsPipeline::new(
            device,
            render_pass.handle(),
            &scene.shaders().vertex,
            &scene.shaders().fragment,
            &[scene.descriptor_layout()],
            &desc.pipeline,
        )?;
        let depth = DepthBuffer::new(allocator, extent, depth_format)?;

        let framebuffers = swapchain
            .image_views()
            .map(|view| Framebuffer::new(device.clone(), render_pass.handle(), &[view, depth.view()], extent))
            .collect::<VulkanResult<Vec<_>>>()?;

        let uniforms = UniformRegions::new(allocator, image_count)?;
        let descriptor_pool = DescriptorPool::for_mesh(device.clone(), image_count as u32)?;
        let layouts = vec![scene.descriptor_layout(); image_count];
        let descriptor_sets = descriptor_pool.allocate_descriptor_sets(&layouts)?;
        write_descriptor_sets(device, &descriptor_sets, &uniforms, scene);

        let command_buffers = command_pool.allocate_owned(image_count as u32)?;
        for (image_index, &command_buffer) in command_buffers.as_slice().iter().enumerate() {
            record_draw_commands(
                device,
                command_buffer,
                &DrawTargets {
                    render_pass: render_pass.handle(),
                    framebuffer: framebuffers[image_index].handle(),
                    extent,
                    pipeline: &pipeline,
                    descriptor_set: descriptor_sets[image_index],
                    clear_color: desc.clear_color,
                },
                scene,
            )?;
        }

        log::debug!(
            "Swapchain graph ready: {} framebuffers, {} descriptor sets, {} command buffers",
            framebuffers.len(),
            descriptor_sets.len(),
            command_buffers.len()
        );

        Ok(Self {
            command_buffers,
            descriptor_sets,
            depth,
            framebuffers,
            pipeline,
            render_pass,
            swapchain,
            uniforms,
            descriptor_pool,
        })
    }

    /// The swapchain itself
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    /// Current image extent as `(width, height)`
    pub fn extent(&self) -> (u32, u32) {
        let extent = self.swapchain.extent();
        (extent.width, extent.height)
    }

    /// Prerecorded draw commands for `image_index`
    pub fn command_buffer(&self, image_index: u32) -> VulkanResult<vk::CommandBuffer> {
        self.command_buffers
            .get(image_index as usize)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no command buffer for image {image_index}"),
            })
    }

    /// Overwrite the uniforms consumed by `image_index`
    pub fn write_uniforms(&self, image_index: u32, transform: &TransformUniform, lighting: &LightingConstants) -> VulkanResult<()> {
        self.uniforms.write(image_index as usize, transform, lighting)
    }

    /// Descriptor set bound when drawing into `image_index`
    pub fn descriptor_set(&self, image_index: u32) -> Option<vk::DescriptorSet> {
        self.descriptor_sets.get(image_index as usize).copied()
    }

    /// Framebuffer for `image_index`
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).map(Framebuffer::handle)
    }

    /// Render pass every framebuffer was created against
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// Mesh pipeline
    pub fn pipeline(&self) -> &GraphicsPipeline {
        &self.pipeline
    }

    /// Depth attachment format in use
    pub fn depth_format(&self) -> vk::Format {
        self.depth.format()
    }
}

fn write_descriptor_sets(device: &Device, sets: &[vk::DescriptorSet], uniforms: &UniformRegions, scene: &SceneResources) {
    let texture = scene.texture();
    let writer = sets
        .iter()
        .zip(uniforms.iter())
        .fold(DescriptorSetWriter::new(), |writer, (&set, region)| {
            let (transform, transform_size) = region.transform_buffer();
            let (lighting, lighting_size) = region.lighting_buffer();
            writer
                .write_uniform_buffer(set, TRANSFORM_BINDING, transform, transform_size)
                .write_uniform_buffer(set, LIGHTING_BINDING, lighting, lighting_size)
                .write_combined_image(set, TEXTURE_BINDING, texture.image_view(), texture.sampler())
        });
    writer.update(device);
}

struct DrawTargets<'a> {
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    pipeline: &'a GraphicsPipeline,
    descriptor_set: vk::DescriptorSet,
    clear_color: [f32; 4],
}

fn record_draw_commands(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    targets: &DrawTargets<'_>,
    scene: &SceneResources,
) -> VulkanResult<()> {
    let begin_info = vk::CommandBufferBeginInfo::builder();

    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: targets.extent,
    };
    let clear_values = [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: targets.clear_color,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
        },
    ];
    let render_pass_info = vk::RenderPassBeginInfo::builder()
        .render_pass(targets.render_pass)
        .framebuffer(targets.framebuffer)
        .render_area(render_area)
        .clear_values(&clear_values);

    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: targets.extent.width as f32,
        height: targets.extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };

    let mesh = scene.mesh();
    unsafe {
        device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(VulkanError::Api)?;

        device.cmd_begin_render_pass(command_buffer, &render_pass_info, vk::SubpassContents::INLINE);
        device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, targets.pipeline.handle());
        device.cmd_set_viewport(command_buffer, 0, &[viewport]);
        device.cmd_set_scissor(command_buffer, 0, &[render_area]);
        device.cmd_bind_vertex_buffers(command_buffer, 0, &[mesh.vertex_buffer()], &[0]);
        device.cmd_bind_index_buffer(command_buffer, mesh.index_buffer(), 0, vk::IndexType::UINT32);
        device.cmd_bind_descriptor_sets(
            command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            targets.pipeline.layout(),
            0,
            &[targets.descriptor_set],
            &[],
        );
        device.cmd_draw_indexed(command_buffer, mesh.index_count(), 1, 0, 0, 0);
        device.cmd_end_render_pass(command_buffer);

        device.end_command_buffer(command_buffer).map_err(VulkanError::Api)?;
    }

    Ok(())
}
