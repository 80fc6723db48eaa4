//! Command recording, render pass, pipeline and framebuffer objects

pub mod commands;
pub mod framebuffer;
pub mod render_pass;
pub mod shader;

pub use commands::{CommandBuffers, CommandPool};
pub use framebuffer::{find_depth_format, select_depth_format, DepthBuffer, Framebuffer, DEPTH_FORMAT_CANDIDATES};
pub use render_pass::RenderPass;
pub use shader::{GraphicsPipeline, PipelineDesc, ShaderModule};
