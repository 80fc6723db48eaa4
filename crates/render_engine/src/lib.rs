//! # Render Engine
//!
//! Vulkan frame pacing and resource lifecycle for a single textured, lit mesh.
//!
//! ## Features
//!
//! - **Frames in flight**: two frame slots overlap CPU preparation with GPU work
//! - **Swapchain recovery**: out-of-date and suboptimal surfaces are rebuilt transparently
//! - **Staged uploads**: vertex, index and texture data reach device-local memory through one-shot transfers
//! - **Configuration**: TOML or RON files with builder-style overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     render_engine::foundation::logging::init();
//!     let config = ViewerConfig::load_or_default("viewer.toml")?;
//!     let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
//!
//!     let model = ObjLoader::load_obj(&config.assets.model_path)?;
//!     let texture = ImageData::from_file(&config.assets.texture_path)?;
//!     let shaders = ShaderBytes {
//!         vertex: load_shader_bytes(&config.renderer.shaders.vertex_shader_path)?,
//!         fragment: load_shader_bytes(&config.renderer.shaders.fragment_shader_path)?,
//!     };
//!
//!     let mut renderer = VulkanRenderer::initialize(
//!         &mut window,
//!         &config.renderer,
//!         &config.camera,
//!         &model.mesh,
//!         LightingConstants::default(),
//!         &texture,
//!         shaders,
//!     )?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.render_frame(&mut window)?;
//!     }
//!     renderer.wait_idle_and_shutdown()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{load_shader_bytes, ImageData, MtlData, MtlParser, ObjLoader, ObjModel},
        config::{CameraConfig, Config, RendererConfig, ViewerConfig},
        foundation::math::{Mat4, Vec3},
        render::{
            backends::vulkan::{FrameStatus, ShaderBytes},
            InputState, LightingConstants, LightingFeatures, Mesh, Vertex, VulkanError, VulkanRenderer,
            VulkanResult, Window,
        },
    };
}
