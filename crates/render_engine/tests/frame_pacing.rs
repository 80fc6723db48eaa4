//! Long-running frame loop checks against a simulated GPU queue

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use render_engine::render::backends::vulkan::state::{
    AcquireOutcome, FrameBackend, FramePacer, FrameStatus, PresentOutcome, MAX_FRAMES_IN_FLIGHT,
};
use render_engine::render::VulkanResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SimFence(usize);

/// In-order queue: submissions retire oldest first, at random or when waited on
struct SimulatedGpu {
    rng: StdRng,
    image_count: usize,
    fence_signaled: [bool; MAX_FRAMES_IN_FLIGHT],
    queue: Vec<usize>,
    image_fence: Vec<Option<usize>>,
    out_of_date_rate: f64,
    suboptimal_rate: f64,
    submissions: usize,
    uniform_writes: usize,
    recreations: usize,
    peak_in_flight: usize,
}

impl SimulatedGpu {
    fn new(seed: u64, image_count: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            image_count,
            fence_signaled: [true; MAX_FRAMES_IN_FLIGHT],
            queue: Vec::new(),
            image_fence: vec![None; image_count],
            out_of_date_rate: 0.0,
            suboptimal_rate: 0.0,
            submissions: 0,
            uniform_writes: 0,
            recreations: 0,
            peak_in_flight: 0,
        }
    }

    fn retire_front(&mut self) {
        if !self.queue.is_empty() {
            let fence = self.queue.remove(0);
            self.fence_signaled[fence] = true;
        }
    }

    fn retire_through(&mut self, fence: usize) {
        while let Some(position) = self.queue.iter().position(|&queued| queued == fence) {
            for _ in 0..=position {
                self.retire_front();
            }
        }
        self.fence_signaled[fence] = true;
    }

    fn make_progress(&mut self) {
        if self.rng.gen_bool(0.5) {
            self.retire_front();
        }
    }
}

impl FrameBackend for SimulatedGpu {
    type Fence = SimFence;

    fn frame_fence(&self, slot: usize) -> SimFence {
        SimFence(slot)
    }

    fn wait_for_fence(&mut self, fence: SimFence) -> VulkanResult<()> {
        self.retire_through(fence.0);
        Ok(())
    }

    fn reset_fence(&mut self, fence: SimFence) -> VulkanResult<()> {
        assert!(!self.queue.contains(&fence.0), "reset a fence with pending work");
        self.fence_signaled[fence.0] = false;
        Ok(())
    }

    fn acquire_next_image(&mut self, _slot: usize) -> VulkanResult<AcquireOutcome> {
        self.make_progress();
        if self.rng.gen_bool(self.out_of_date_rate) {
            return Ok(AcquireOutcome::OutOfDate);
        }
        let image_index = self.rng.gen_range(0..self.image_count) as u32;
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        })
    }

    fn update_frame_uniforms(&mut self, image_index: u32) -> VulkanResult<()> {
        if let Some(fence) = self.image_fence[image_index as usize] {
            assert!(
                self.fence_signaled[fence] || !self.queue.contains(&fence),
                "image {image_index} rewritten while its last frame is still executing"
            );
        }
        self.uniform_writes += 1;
        Ok(())
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        self.queue.push(slot);
        self.image_fence[image_index as usize] = Some(slot);
        self.submissions += 1;
        self.peak_in_flight = self.peak_in_flight.max(self.queue.len());
        Ok(())
    }

    fn present(&mut self, _slot: usize, _image_index: u32) -> VulkanResult<PresentOutcome> {
        self.make_progress();
        if self.rng.gen_bool(self.suboptimal_rate) {
            Ok(PresentOutcome::Suboptimal)
        } else {
            Ok(PresentOutcome::Presented)
        }
    }

    fn recreate_swapchain(&mut self) -> VulkanResult<usize> {
        // Device idle before teardown
        while !self.queue.is_empty() {
            self.retire_front();
        }
        self.recreations += 1;
        self.image_count = self.rng.gen_range(2..=4);
        self.image_fence = vec![None; self.image_count];
        Ok(self.image_count)
    }
}

#[test]
fn test_in_flight_work_never_exceeds_slot_count() {
    for seed in 0..8 {
        let mut gpu = SimulatedGpu::new(seed, 3);
        let mut pacer = FramePacer::new(3);

        for _ in 0..500 {
            pacer.render_frame(&mut gpu).unwrap();
            assert!(gpu.queue.len() <= MAX_FRAMES_IN_FLIGHT);
        }

        assert_eq!(gpu.submissions, 500);
        assert_eq!(gpu.uniform_writes, 500);
        assert!(gpu.peak_in_flight <= MAX_FRAMES_IN_FLIGHT);
        assert_eq!(pacer.frames_presented(), 500);
    }
}

#[test]
fn test_recovers_from_surface_invalidation() {
    let mut gpu = SimulatedGpu::new(42, 3);
    gpu.out_of_date_rate = 0.05;
    gpu.suboptimal_rate = 0.05;
    let mut pacer = FramePacer::new(3);

    let mut skipped = 0;
    let mut rebuilt_after_present = 0;
    for frame in 0..2000 {
        if frame % 97 == 0 {
            pacer.notify_resized();
        }
        match pacer.render_frame(&mut gpu).unwrap() {
            FrameStatus::Skipped => skipped += 1,
            FrameStatus::PresentedAndRecreated { .. } => rebuilt_after_present += 1,
            FrameStatus::Presented { .. } => {}
        }
        assert_eq!(pacer.images_in_flight().len(), gpu.image_count);
        assert!(gpu.queue.len() <= MAX_FRAMES_IN_FLIGHT);
    }

    assert!(skipped > 0);
    assert!(rebuilt_after_present > 0);
    assert_eq!(gpu.recreations, skipped + rebuilt_after_present);
    assert_eq!(pacer.recreations() as usize, gpu.recreations);
    assert_eq!(gpu.submissions + skipped, 2000);
    assert!(!pacer.is_resize_pending());
}

#[test]
fn test_skipped_frames_do_not_advance_slot() {
    let mut gpu = SimulatedGpu::new(7, 2);
    gpu.out_of_date_rate = 1.0;
    let mut pacer = FramePacer::new(2);

    for _ in 0..5 {
        assert_eq!(pacer.render_frame(&mut gpu).unwrap(), FrameStatus::Skipped);
        assert_eq!(pacer.current_frame(), 0);
    }
    assert_eq!(gpu.submissions, 0);
    assert!(gpu.fence_signaled.iter().all(|signaled| *signaled));
}
