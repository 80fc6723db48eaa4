//! Frames-in-flight state machine
//!
//! Two kinds of fences guard GPU work. Each frame slot owns a fence that caps
//! the number of outstanding submissions, and the images-in-flight table
//! remembers which slot fence last rendered into each swapchain image. A slot
//! waits on both before it touches an image's uniforms or resubmits its
//! command buffer, because slot count and image count are independent.
//!
//! The controller only sequences work. Everything that talks to the device
//! goes through [`FrameBackend`], which keeps the protocol testable without a GPU.

use std::fmt;

use crate::render::backends::vulkan::VulkanResult;

/// Number of frames the CPU may run ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Result of asking the presentation engine for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available; a suboptimal swapchain is still usable this frame
    Acquired {
        /// Index into the swapchain images
        image_index: u32,
        /// Surface properties no longer match exactly
        suboptimal: bool,
    },
    /// The swapchain can no longer be presented to
    OutOfDate,
}

/// Result of queueing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Queued normally
    Presented,
    /// Queued, but the swapchain should be rebuilt
    Suboptimal,
    /// The swapchain can no longer be presented to
    OutOfDate,
}

/// What happened during one call to [`FramePacer::render_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Frame submitted and presented
    Presented {
        /// Image the frame rendered into
        image_index: u32,
    },
    /// Frame submitted and presented, then the swapchain was rebuilt
    PresentedAndRecreated {
        /// Image the frame rendered into
        image_index: u32,
    },
    /// Acquire reported out-of-date; the swapchain was rebuilt and nothing was submitted
    Skipped,
}

/// Per-slot progress through one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameSlotState {
    /// Not inside a frame
    #[default]
    Idle,
    /// Waiting for the slot fence or an image
    Acquiring,
    /// Writing per-frame data for the acquired image
    Recording,
    /// Command buffer queued on the graphics queue
    Submitted,
    /// Image handed to the presentation engine
    Presenting,
}

/// Device operations the frame loop is built from
pub trait FrameBackend {
    /// Fence handle type
    type Fence: Copy + PartialEq + fmt::Debug;

    /// In-flight fence owned by frame slot `slot`
    fn frame_fence(&self, slot: usize) -> Self::Fence;

    /// Block until `fence` signals
    fn wait_for_fence(&mut self, fence: Self::Fence) -> VulkanResult<()>;

    /// Return `fence` to the unsignaled state
    fn reset_fence(&mut self, fence: Self::Fence) -> VulkanResult<()>;

    /// Acquire the next image, signaling the slot's image-available semaphore
    fn acquire_next_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome>;

    /// Write transform and lighting uniforms for `image_index`
    fn update_frame_uniforms(&mut self, image_index: u32) -> VulkanResult<()>;

    /// Submit the command buffer for `image_index`, signaling the slot fence on completion
    fn submit(&mut self, slot: usize, image_index: u32) -> VulkanResult<()>;

    /// Present `image_index` once the slot's render-finished semaphore signals
    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome>;

    /// Rebuild the swapchain and everything derived from it, returning the new image count
    fn recreate_swapchain(&mut self) -> VulkanResult<usize>;
}

/// Fence last submitted against each swapchain image
#[derive(Debug, Clone)]
pub struct ImagesInFlight<F> {
    fences: Vec<Option<F>>,
}

impl<F: Copy + PartialEq> ImagesInFlight<F> {
    /// Table with no fence recorded for any of `image_count` images
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![None; image_count],
        }
    }

    /// Forget all fences and resize for a new swapchain
    pub fn reset(&mut self, image_count: usize) {
        self.fences.clear();
        self.fences.resize(image_count, None);
    }

    /// Fence recorded for `image_index`
    pub fn get(&self, image_index: usize) -> Option<F> {
        self.fences.get(image_index).copied().flatten()
    }

    /// Record `fence` for `image_index`, growing the table if the index is new
    pub fn set(&mut self, image_index: usize, fence: F) {
        if image_index >= self.fences.len() {
            self.fences.resize(image_index + 1, None);
        }
        self.fences[image_index] = Some(fence);
    }

    /// Number of images tracked
    pub fn len(&self) -> usize {
        self.fences.len()
    }

    /// Whether the table tracks no images
    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

/// Drives acquire, submit and present for a fixed number of frame slots
#[derive(Debug)]
pub struct FramePacer<F> {
    current_frame: usize,
    framebuffer_resized: bool,
    images_in_flight: ImagesInFlight<F>,
    slot_states: [FrameSlotState; MAX_FRAMES_IN_FLIGHT],
    frames_presented: u64,
    recreations: u64,
}

impl<F: Copy + PartialEq + fmt::Debug> FramePacer<F> {
    /// Start at slot 0 with nothing in flight
    pub fn new(image_count: usize) -> Self {
        Self {
            current_frame: 0,
            framebuffer_resized: false,
            images_in_flight: ImagesInFlight::new(image_count),
            slot_states: [FrameSlotState::Idle; MAX_FRAMES_IN_FLIGHT],
            frames_presented: 0,
            recreations: 0,
        }
    }

    /// Slot the next frame will use
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Request a swapchain rebuild after the next present
    pub fn notify_resized(&mut self) {
        self.framebuffer_resized = true;
    }

    /// Whether a resize is waiting to be handled
    pub fn is_resize_pending(&self) -> bool {
        self.framebuffer_resized
    }

    /// Image-to-fence table
    pub fn images_in_flight(&self) -> &ImagesInFlight<F> {
        &self.images_in_flight
    }

    /// Progress of `slot` through its current frame
    pub fn slot_state(&self, slot: usize) -> FrameSlotState {
        self.slot_states.get(slot).copied().unwrap_or_default()
    }

    /// Frames successfully presented so far
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Swapchain rebuilds performed so far
    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    /// Run one iteration of the frame loop against `backend`
    ///
    /// Out-of-date and suboptimal swapchains are handled here by rebuilding and
    /// never surface as errors. Any error returned is fatal for the loop.
    pub fn render_frame<B>(&mut self, backend: &mut B) -> VulkanResult<FrameStatus>
    where
        B: FrameBackend<Fence = F>,
    {
        let slot = self.current_frame;
        let slot_fence = backend.frame_fence(slot);

        self.slot_states[slot] = FrameSlotState::Acquiring;
        backend.wait_for_fence(slot_fence)?;

        let image_index = match backend.acquire_next_image(slot)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => {
                if suboptimal {
                    log::debug!("Acquired image {} from a suboptimal swapchain", image_index);
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date at acquire; skipping frame");
                self.slot_states[slot] = FrameSlotState::Idle;
                self.recreate(backend)?;
                return Ok(FrameStatus::Skipped);
            }
        };

        let image = image_index as usize;
        if let Some(image_fence) = self.images_in_flight.get(image) {
            if image_fence != slot_fence {
                log::trace!("Image {} still owned by {:?}; waiting", image_index, image_fence);
                backend.wait_for_fence(image_fence)?;
            }
        }
        self.images_in_flight.set(image, slot_fence);

        self.slot_states[slot] = FrameSlotState::Recording;
        backend.update_frame_uniforms(image_index)?;

        backend.reset_fence(slot_fence)?;
        backend.submit(slot, image_index)?;
        self.slot_states[slot] = FrameSlotState::Submitted;

        self.slot_states[slot] = FrameSlotState::Presenting;
        let outcome = backend.present(slot, image_index)?;
        self.frames_presented += 1;

        let rebuild = match outcome {
            PresentOutcome::Presented => self.framebuffer_resized,
            PresentOutcome::Suboptimal | PresentOutcome::OutOfDate => true,
        };

        self.slot_states[slot] = FrameSlotState::Idle;
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;

        if rebuild {
            log::debug!(
                "Rebuilding swapchain after present ({:?}, resize pending: {})",
                outcome,
                self.framebuffer_resized
            );
            self.recreate(backend)?;
            Ok(FrameStatus::PresentedAndRecreated { image_index })
        } else {
            Ok(FrameStatus::Presented { image_index })
        }
    }

    fn recreate<B>(&mut self, backend: &mut B) -> VulkanResult<()>
    where
        B: FrameBackend<Fence = F>,
    {
        self.framebuffer_resized = false;
        let image_count = backend.recreate_swapchain()?;
        self.images_in_flight.reset(image_count);
        self.recreations += 1;
        log::info!("Swapchain recreated with {} images", image_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::VulkanError;
    use ash::vk;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct MockFence(usize);

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Reset(usize),
        Acquire(usize),
        Uniforms(u32),
        Submit(usize, u32),
        Present(usize, u32),
        Recreate,
    }

    /// GPU stand-in where a submission completes only when its fence is waited on
    struct MockBackend {
        image_count: usize,
        next_image: usize,
        signaled: [bool; MAX_FRAMES_IN_FLIGHT],
        // Which fence last submitted work for each image, and whether it is done
        image_owner: Vec<Option<usize>>,
        acquire_script: VecDeque<AcquireOutcome>,
        present_script: VecDeque<PresentOutcome>,
        recreate_image_count: usize,
        calls: Vec<Call>,
        max_outstanding: usize,
    }

    impl MockBackend {
        fn new(image_count: usize) -> Self {
            Self {
                image_count,
                next_image: 0,
                signaled: [true; MAX_FRAMES_IN_FLIGHT],
                image_owner: vec![None; image_count],
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                recreate_image_count: image_count,
                calls: Vec::new(),
                max_outstanding: 0,
            }
        }

        fn outstanding(&self) -> usize {
            self.signaled.iter().filter(|signaled| !**signaled).count()
        }

        fn count(&self, call: &Call) -> usize {
            self.calls.iter().filter(|c| *c == call).count()
        }
    }

    impl FrameBackend for MockBackend {
        type Fence = MockFence;

        fn frame_fence(&self, slot: usize) -> MockFence {
            MockFence(slot)
        }

        fn wait_for_fence(&mut self, fence: MockFence) -> VulkanResult<()> {
            self.calls.push(Call::Wait(fence.0));
            self.signaled[fence.0] = true;
            Ok(())
        }

        fn reset_fence(&mut self, fence: MockFence) -> VulkanResult<()> {
            self.calls.push(Call::Reset(fence.0));
            self.signaled[fence.0] = false;
            Ok(())
        }

        fn acquire_next_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            if let Some(outcome) = self.acquire_script.pop_front() {
                return Ok(outcome);
            }
            let image_index = self.next_image as u32;
            self.next_image = (self.next_image + 1) % self.image_count;
            Ok(AcquireOutcome::Acquired { image_index, suboptimal: false })
        }

        fn update_frame_uniforms(&mut self, image_index: u32) -> VulkanResult<()> {
            self.calls.push(Call::Uniforms(image_index));
            if let Some(owner) = self.image_owner[image_index as usize] {
                assert!(self.signaled[owner], "uniforms for image {} written while fence {} pending", image_index, owner);
            }
            Ok(())
        }

        fn submit(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
            self.calls.push(Call::Submit(slot, image_index));
            assert!(!self.signaled[slot], "submitted with a signaled fence");
            self.image_owner[image_index as usize] = Some(slot);
            self.max_outstanding = self.max_outstanding.max(self.outstanding());
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
            self.calls.push(Call::Present(slot, image_index));
            Ok(self.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
        }

        fn recreate_swapchain(&mut self) -> VulkanResult<usize> {
            self.calls.push(Call::Recreate);
            // Device idle: everything completes
            self.signaled = [true; MAX_FRAMES_IN_FLIGHT];
            self.image_count = self.recreate_image_count;
            self.next_image = 0;
            self.image_owner = vec![None; self.image_count];
            Ok(self.image_count)
        }
    }

    #[test]
    fn test_steady_state_call_order() {
        let mut backend = MockBackend::new(3);
        let mut pacer = FramePacer::new(3);

        let status = pacer.render_frame(&mut backend).unwrap();
        assert_eq!(status, FrameStatus::Presented { image_index: 0 });
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Uniforms(0),
                Call::Reset(0),
                Call::Submit(0, 0),
                Call::Present(0, 0),
            ]
        );
        assert_eq!(pacer.current_frame(), 1);
        assert_eq!(pacer.images_in_flight().get(0), Some(MockFence(0)));
        assert_eq!(pacer.slot_state(0), FrameSlotState::Idle);
    }

    #[test]
    fn test_slots_cycle_and_cap_outstanding_work() {
        let mut backend = MockBackend::new(3);
        let mut pacer = FramePacer::new(3);

        for _ in 0..30 {
            pacer.render_frame(&mut backend).unwrap();
            assert!(backend.outstanding() <= MAX_FRAMES_IN_FLIGHT);
        }
        assert_eq!(backend.max_outstanding, MAX_FRAMES_IN_FLIGHT);
        assert_eq!(pacer.frames_presented(), 30);
        assert_eq!(pacer.current_frame(), 0);
    }

    #[test]
    fn test_cross_hazard_waits_on_other_slot() {
        // Three images and two slots: frame 2 (slot 0) gets image 2, frame 3
        // (slot 1) gets image 0, which slot 0 last rendered into.
        let mut backend = MockBackend::new(3);
        let mut pacer = FramePacer::new(3);

        for _ in 0..3 {
            pacer.render_frame(&mut backend).unwrap();
        }
        backend.calls.clear();

        let status = pacer.render_frame(&mut backend).unwrap();
        assert_eq!(status, FrameStatus::Presented { image_index: 0 });
        assert_eq!(&backend.calls[..3], &[Call::Wait(1), Call::Acquire(1), Call::Wait(0)]);
        assert_eq!(pacer.images_in_flight().get(0), Some(MockFence(1)));
    }

    #[test]
    fn test_same_slot_fence_is_not_waited_twice() {
        // Two images and two slots: each image always comes back to the same slot
        let mut backend = MockBackend::new(2);
        let mut pacer = FramePacer::new(2);

        for _ in 0..6 {
            pacer.render_frame(&mut backend).unwrap();
        }
        let waits = backend.calls.iter().filter(|c| matches!(c, Call::Wait(_))).count();
        assert_eq!(waits, 6);
    }

    #[test]
    fn test_out_of_date_acquire_skips_frame() {
        let mut backend = MockBackend::new(3);
        let mut pacer = FramePacer::new(3);
        pacer.render_frame(&mut backend).unwrap();

        backend.acquire_script.push_back(AcquireOutcome::OutOfDate);
        backend.calls.clear();

        let status = pacer.render_frame(&mut backend).unwrap();
        assert_eq!(status, FrameStatus::Skipped);
        assert_eq!(backend.calls, vec![Call::Wait(1), Call::Acquire(1), Call::Recreate]);
        // No fence reset, so the slot is immediately reusable
        assert!(backend.signaled[1]);
        assert_eq!(pacer.current_frame(), 1);
        assert_eq!(pacer.slot_state(1), FrameSlotState::Idle);
        assert_eq!(pacer.images_in_flight().get(0), None);

        // Next attempt on the same slot proceeds without deadlock
        let status = pacer.render_frame(&mut backend).unwrap();
        assert_eq!(status, FrameStatus::Presented { image_index: 0 });
    }

    #[test]
    fn test_suboptimal_acquire_still_renders() {
        let mut backend = MockBackend::new(3);
        let mut pacer = FramePacer::new(3);
        backend
            .acquire_script
            .push_back(AcquireOutcome::Acquired { image_index: 1, suboptimal: true });

        let status = pacer.render_frame(&mut backend).unwrap();
        assert_eq!(status, FrameStatus::Presented { image_index: 1 });
        assert_eq!(backend.count(&Call::Recreate), 0);
    }

    #[test]
    fn test_present_outcomes_trigger_recreation() {
        for outcome in [PresentOutcome::Suboptimal, PresentOutcome::OutOfDate] {
            let mut backend = MockBackend::new(3);
            let mut pacer = FramePacer::new(3);
            backend.present_script.push_back(outcome);

            let status = pacer.render_frame(&mut backend).unwrap();
            assert_eq!(status, FrameStatus::PresentedAndRecreated { image_index: 0 });
            assert_eq!(backend.calls.last(), Some(&Call::Recreate));
            assert_eq!(pacer.current_frame(), 1);
            assert_eq!(pacer.recreations(), 1);
        }
    }

    #[test]
    fn test_resize_flag_recreates_after_present() {
        let mut backend = MockBackend::new(3);
        let mut pacer = FramePacer::new(3);
        pacer.notify_resized();
        assert!(pacer.is_resize_pending());

        let status = pacer.render_frame(&mut backend).unwrap();
        assert_eq!(status, FrameStatus::PresentedAndRecreated { image_index: 0 });
        assert!(!pacer.is_resize_pending());

        let present_at = backend.calls.iter().position(|c| *c == Call::Present(0, 0)).unwrap();
        let recreate_at = backend.calls.iter().position(|c| *c == Call::Recreate).unwrap();
        assert!(present_at < recreate_at);

        let status = pacer.render_frame(&mut backend).unwrap();
        assert_eq!(status, FrameStatus::Presented { image_index: 0 });
    }

    #[test]
    fn test_recreation_resizes_image_table() {
        let mut backend = MockBackend::new(3);
        let mut pacer = FramePacer::new(3);
        for _ in 0..3 {
            pacer.render_frame(&mut backend).unwrap();
        }

        backend.recreate_image_count = 4;
        pacer.notify_resized();
        pacer.render_frame(&mut backend).unwrap();

        assert_eq!(pacer.images_in_flight().len(), 4);
        assert!((0..4).all(|i| pacer.images_in_flight().get(i).is_none()));
    }

    #[test]
    fn test_back_to_back_recreation_is_idempotent() {
        let mut backend = MockBackend::new(3);
        let mut pacer = FramePacer::new(3);
        backend.acquire_script.push_back(AcquireOutcome::OutOfDate);
        backend.acquire_script.push_back(AcquireOutcome::OutOfDate);

        assert_eq!(pacer.render_frame(&mut backend).unwrap(), FrameStatus::Skipped);
        assert_eq!(pacer.render_frame(&mut backend).unwrap(), FrameStatus::Skipped);
        assert_eq!(pacer.recreations(), 2);
        assert_eq!(pacer.images_in_flight().len(), 3);

        let status = pacer.render_frame(&mut backend).unwrap();
        assert_eq!(status, FrameStatus::Presented { image_index: 0 });
    }

    #[test]
    fn test_backend_errors_propagate() {
        struct FailingPresent(MockBackend);

        impl FrameBackend for FailingPresent {
            type Fence = MockFence;
            fn frame_fence(&self, slot: usize) -> MockFence {
                self.0.frame_fence(slot)
            }
            fn wait_for_fence(&mut self, fence: MockFence) -> VulkanResult<()> {
                self.0.wait_for_fence(fence)
            }
            fn reset_fence(&mut self, fence: MockFence) -> VulkanResult<()> {
                self.0.reset_fence(fence)
            }
            fn acquire_next_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
                self.0.acquire_next_image(slot)
            }
            fn update_frame_uniforms(&mut self, image_index: u32) -> VulkanResult<()> {
                self.0.update_frame_uniforms(image_index)
            }
            fn submit(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
                self.0.submit(slot, image_index)
            }
            fn present(&mut self, _slot: usize, _image_index: u32) -> VulkanResult<PresentOutcome> {
                Err(VulkanError::Present(vk::Result::ERROR_DEVICE_LOST))
            }
            fn recreate_swapchain(&mut self) -> VulkanResult<usize> {
                self.0.recreate_swapchain()
            }
        }

        let mut backend = FailingPresent(MockBackend::new(3));
        let mut pacer = FramePacer::new(3);
        let err = pacer.render_frame(&mut backend).unwrap_err();
        assert!(matches!(err, VulkanError::Present(vk::Result::ERROR_DEVICE_LOST)));
        assert_eq!(pacer.slot_state(0), FrameSlotState::Presenting);
        assert_eq!(pacer.frames_presented(), 0);
    }
}
