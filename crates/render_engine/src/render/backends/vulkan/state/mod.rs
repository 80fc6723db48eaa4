//! Swapchain lifecycle and frame pacing

pub mod frame_controller;
pub mod swapchain;
pub mod swapchain_manager;
pub mod sync;

pub use frame_controller::{
    AcquireOutcome, FrameBackend, FramePacer, FrameSlotState, FrameStatus, ImagesInFlight, PresentOutcome,
    MAX_FRAMES_IN_FLIGHT,
};
pub use swapchain::{SurfaceSupport, Swapchain};
pub use swapchain_manager::{FrameTargetDesc, SwapchainResources};
pub use sync::{Fence, FrameSync, Semaphore};
