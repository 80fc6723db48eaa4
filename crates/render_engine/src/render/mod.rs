//! Rendering: CPU-side data plus the Vulkan backend that drives frames

pub mod backends;
pub mod input;
pub mod lighting;
pub mod primitives;
pub mod uniforms;
pub mod window;

pub use backends::vulkan::{VulkanError, VulkanRenderer, VulkanResult};
pub use input::{DragKind, InputState};
pub use lighting::{LightingConstants, LightingFeatures};
pub use primitives::{Mesh, Vertex};
pub use uniforms::TransformUniform;
pub use window::{SurfaceWindow, Window, WindowError};
