//! Vulkan renderer: owns the device state and drives the frame loop

use ash::vk;

use super::initialization::VulkanContext;
use super::rendering::{CommandPool, PipelineDesc};
use super::resources::{ResourceAllocator, SceneResources, ShaderBytes, TransferEngine};
use super::state::sync::{self, FrameSync};
use super::state::{
    AcquireOutcome, FrameBackend, FramePacer, FrameStatus, FrameTargetDesc, PresentOutcome, SwapchainResources,
    MAX_FRAMES_IN_FLIGHT,
};
use super::{VulkanError, VulkanResult};
use crate::assets::ImageData;
use crate::config::{CameraConfig, RendererConfig};
use crate::render::window::{wait_while_minimized, SurfaceWindow};
use crate::render::{InputState, LightingConstants, Mesh, TransformUniform, Window};

/// Device-side state the frame loop operates on
///
/// Fields drop in declaration order after `Drop::drop` has idled the device,
/// so the swapchain graph goes first and the context last.
struct GpuState {
    swapchain: Option<SwapchainResources>,
    frame_sync: Vec<FrameSync>,
    scene: SceneResources,
    command_pool: CommandPool,
    transfer: TransferEngine,
    allocator: ResourceAllocator,
    lighting: LightingConstants,
    camera: CameraConfig,
    targets: FrameTargetDesc,
    context: VulkanContext,
}

impl GpuState {
    fn swapchain(&self) -> VulkanResult<&SwapchainResources> {
        self.swapchain.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "swapchain is not available".to_string(),
        })
    }

    fn frame_sync(&self, slot: usize) -> VulkanResult<&FrameSync> {
        self.frame_sync.get(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("no synchronization objects for frame slot {slot}"),
        })
    }

    /// Tear down the current swapchain generation and build the next one
    fn rebuild_swapchain(&mut self, framebuffer_size: (u32, u32)) -> VulkanResult<usize> {
        self.context.wait_idle()?;
        self.swapchain = None;

        let resources = SwapchainResources::create(
            &self.context,
            &self.allocator,
            &self.command_pool,
            &self.scene,
            framebuffer_size,
            &self.targets,
        )?;
        let image_count = resources.image_count();
        self.swapchain = Some(resources);
        Ok(image_count)
    }
}

impl Drop for GpuState {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::error!("Failed to idle device during shutdown: {}", e);
        }
    }
}

/// Per-frame view of the renderer handed to the [`FramePacer`]
struct FrameContext<'a> {
    gpu: &'a mut GpuState,
    window: &'a mut dyn SurfaceWindow,
    input: &'a InputState,
}

impl FrameBackend for FrameContext<'_> {
    type Fence = vk::Fence;

    fn frame_fence(&self, slot: usize) -> vk::Fence {
        self.gpu
            .frame_sync
            .get(slot)
            .map_or_else(vk::Fence::null, |frame| frame.in_flight.handle())
    }

    fn wait_for_fence(&mut self, fence: vk::Fence) -> VulkanResult<()> {
        sync::wait_for_fence(self.gpu.context.device(), fence)
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> VulkanResult<()> {
        sync::reset_fence(self.gpu.context.device(), fence)
    }

    fn acquire_next_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        let image_available = self.gpu.frame_sync(slot)?.image_available.handle();
        match self.gpu.swapchain()?.swapchain().acquire_next_image(image_available) {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(VulkanError::Acquire(e)),
        }
    }

    fn update_frame_uniforms(&mut self, image_index: u32) -> VulkanResult<()> {
        let swapchain = self.gpu.swapchain()?;
        let transform = TransformUniform::compute(self.input, &self.gpu.camera, swapchain.extent());
        let lighting = self.gpu.lighting.with_features(self.input.features());
        swapchain.write_uniforms(image_index, &transform, &lighting)
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let frame = self.gpu.frame_sync(slot)?;
        let command_buffers = [self.gpu.swapchain()?.command_buffer(image_index)?];
        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.gpu
                .context
                .device()
                .queue_submit(self.gpu.context.graphics_queue(), &[submit_info], frame.in_flight.handle())
                .map_err(VulkanError::Submit)
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
        let render_finished = self.gpu.frame_sync(slot)?.render_finished.handle();
        let result = self.gpu.swapchain()?.swapchain().queue_present(
            self.gpu.context.present_queue(),
            render_finished,
            image_index,
        );
        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(VulkanError::Present(e)),
        }
    }

    fn recreate_swapchain(&mut self) -> VulkanResult<usize> {
        let framebuffer_size = wait_while_minimized(&mut *self.window);
        self.gpu.rebuild_swapchain(framebuffer_size)
    }
}

/// Renders one textured, lit mesh with up to [`MAX_FRAMES_IN_FLIGHT`] frames in flight
pub struct VulkanRenderer {
    pacer: FramePacer<vk::Fence>,
    gpu: GpuState,
}

impl VulkanRenderer {
    /// Create the device, upload the scene and build the first swapchain
    pub fn initialize(
        window: &mut Window,
        config: &RendererConfig,
        camera: &CameraConfig,
        mesh: &Mesh,
        lighting: LightingConstants,
        texture: &ImageData,
        shaders: ShaderBytes,
    ) -> VulkanResult<Self> {
        log::debug!("Creating VulkanRenderer...");

        let context = VulkanContext::new(window, config)?;
        let device = context.device().clone();

        let allocator = ResourceAllocator::new(context.instance().clone(), device.clone(), context.physical_device().device);
        let transfer = TransferEngine::new(device.clone(), context.graphics_queue(), context.graphics_queue_family())?;
        let command_pool = CommandPool::new(
            device.clone(),
            context.graphics_queue_family(),
            vk::CommandPoolCreateFlags::empty(),
        )?;

        let max_anisotropy = context.physical_device().properties.limits.max_sampler_anisotropy;
        let scene = SceneResources::upload(&allocator, &transfer, mesh, texture, shaders, max_anisotropy)?;
        let frame_sync = FrameSync::create_slots(&device, MAX_FRAMES_IN_FLIGHT)?;

        let mut gpu = GpuState {
            swapchain: None,
            frame_sync,
            scene,
            command_pool,
            transfer,
            allocator,
            lighting,
            camera: camera.clone(),
            targets: FrameTargetDesc {
                clear_color: config.clear_color,
                pipeline: PipelineDesc::default(),
            },
            context,
        };

        let framebuffer_size = wait_while_minimized(window);
        let image_count = gpu.rebuild_swapchain(framebuffer_size)?;

        log::info!(
            "VulkanRenderer ready: {} swapchain images, {} frames in flight",
            image_count,
            MAX_FRAMES_IN_FLIGHT
        );
        Ok(Self {
            pacer: FramePacer::new(image_count),
            gpu,
        })
    }

    /// Run one frame: pick up pending resizes, then acquire, submit and present
    pub fn render_frame(&mut self, window: &mut Window) -> VulkanResult<FrameStatus> {
        if window.take_resized() {
            self.pacer.notify_resized();
        }

        let input = window.input().clone();
        let mut frame = FrameContext {
            gpu: &mut self.gpu,
            window,
            input: &input,
        };
        self.pacer.render_frame(&mut frame)
    }

    /// Frame loop state
    pub fn pacer(&self) -> &FramePacer<vk::Fence> {
        &self.pacer
    }

    /// Current swapchain extent as `(width, height)`
    pub fn swapchain_extent(&self) -> Option<(u32, u32)> {
        self.gpu.swapchain.as_ref().map(SwapchainResources::extent)
    }

    /// Upload path used by the scene; also usable for later one-shot work
    pub fn transfer(&self) -> &TransferEngine {
        &self.gpu.transfer
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.gpu.context.wait_idle()
    }

    /// Idle the device and release every GPU object
    pub fn wait_idle_and_shutdown(self) -> VulkanResult<()> {
        self.wait_idle()?;
        log::info!(
            "Shutting down after {} frames and {} swapchain rebuilds",
            self.pacer.frames_presented(),
            self.pacer.recreations()
        );
        drop(self);
        Ok(())
    }
}
