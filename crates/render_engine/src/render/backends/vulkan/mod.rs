//! Vulkan backend implementation
//!
//! Organized into initialization, resources, rendering and state modules, with
//! the renderer tying them together.

/// Instance, device, surface and queue setup
pub mod initialization;

/// GPU memory, uploads and descriptor plumbing
pub mod resources;

/// Render pass, pipeline, framebuffers and command objects
pub mod rendering;

/// Swapchain lifecycle and frame pacing
pub mod state;

/// Main Vulkan renderer implementation
pub mod renderer;

pub use initialization::{VulkanContext, VulkanError, VulkanResult};
pub use renderer::VulkanRenderer;
pub use resources::{ResourceAllocator, SceneResources, ShaderBytes, TransferEngine};
pub use state::{FrameBackend, FramePacer, FrameStatus, MAX_FRAMES_IN_FLIGHT};
