//! Mesh viewer
//!
//! Loads one OBJ model with its texture and renders it until the window closes.
//! Left drag moves the model, right drag spins it, and A/D/S/T toggle the
//! ambient, diffuse, specular and texture terms.

use std::path::{Path, PathBuf};

use render_engine::assets::{load_shader_bytes, ImageData, ImageLoadError, ObjError, ObjLoader};
use render_engine::config::{Config, ConfigError, ViewerConfig};
use render_engine::foundation::logging;
use render_engine::render::backends::vulkan::{FrameStatus, ShaderBytes};
use render_engine::render::{LightingConstants, VulkanError, VulkanRenderer, Window, WindowError};
use thiserror::Error;

const DEFAULT_CONFIG: &str = "viewer.toml";

/// Anything that can stop the viewer
#[derive(Error, Debug)]
enum AppError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("window: {0}")]
    Window(#[from] WindowError),
    #[error("model: {0}")]
    Model(#[from] ObjError),
    #[error("texture: {0}")]
    Texture(#[from] ImageLoadError),
    #[error("shader {path}: {source}")]
    Shader {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("renderer: {0}")]
    Renderer(#[from] VulkanError),
}

/// Relative paths in the config resolve against the config file, or the crate when there is none
fn load_config(path: &Path) -> Result<ViewerConfig, AppError> {
    let mut config = ViewerConfig::load_or_default(path)?;
    let base = if path.exists() {
        path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    };

    config.assets = config.assets.with_base_dir(&base);
    config.renderer.shaders = config.renderer.shaders.with_base_dir(&base);
    config.validate()?;
    Ok(config)
}

fn read_shader(path: &Path) -> Result<Vec<u8>, AppError> {
    load_shader_bytes(path).map_err(|source| AppError::Shader {
        path: path.to_path_buf(),
        source,
    })
}

fn run() -> Result<(), AppError> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = load_config(Path::new(&config_path))?;

    let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;

    let model = ObjLoader::load_obj(&config.assets.model_path)?;
    let lighting = model
        .material
        .as_ref()
        .map_or_else(LightingConstants::default, |material| material.to_lighting());
    let texture = ImageData::from_file(&config.assets.texture_path)?;
    let shaders = ShaderBytes {
        vertex: read_shader(&config.renderer.shaders.vertex_shader_path)?,
        fragment: read_shader(&config.renderer.shaders.fragment_shader_path)?,
    };

    let mut renderer = VulkanRenderer::initialize(
        &mut window,
        &config.renderer,
        &config.camera,
        &model.mesh,
        lighting,
        &texture,
        shaders,
    )?;

    while !window.should_close() {
        window.poll_events();
        if let FrameStatus::Skipped = renderer.render_frame(&mut window)? {
            log::debug!("Frame skipped while the swapchain was rebuilt");
        }
    }

    renderer.wait_idle_and_shutdown()?;
    Ok(())
}

fn main() {
    logging::init();
    log::info!("Starting mesh viewer");

    if let Err(e) = run() {
        log::error!("Mesh viewer failed: {}", e);
        std::process::exit(1);
    }

    log::info!("Mesh viewer finished");
}
