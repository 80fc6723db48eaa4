//! Configuration records for the mesh viewer
//!
//! These are plain value objects; the renderer reads them once at startup and
//! never mutates them.

use super::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level viewer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ViewerConfig {
    /// Window creation settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
    /// Fixed camera used for the view and projection matrices
    pub camera: CameraConfig,
    /// Mesh and texture locations
    pub assets: AssetConfig,
}

impl Config for ViewerConfig {}

impl ViewerConfig {
    /// Override the initial window size
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window.width = width;
        self.window.height = height;
        self
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window.validate()?;
        self.camera.validate()?;
        self.renderer.shaders.validate()?;
        Ok(())
    }
}

/// Window creation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
    /// Window title
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Vulkan Duck".to_string(),
        }
    }
}

impl WindowConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Renderer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Whether to enable Vulkan validation layers (None follows the build profile)
    pub enable_validation: Option<bool>,
    /// Background clear color [R, G, B, A] (0.0-1.0 range)
    pub clear_color: [f32; 4],
    /// Shader bytecode locations
    pub shaders: ShaderConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Vulkan Duck".to_string(),
            enable_validation: None,
            clear_color: [0.8, 0.6, 0.0, 1.0],
            shaders: ShaderConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Set background clear color
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Enable or disable Vulkan validation layers
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = Some(enable);
        self
    }

    /// Set custom shader paths
    pub fn with_shader_paths(mut self, vertex_path: impl Into<PathBuf>, fragment_path: impl Into<PathBuf>) -> Self {
        self.shaders = ShaderConfig::new(vertex_path, fragment_path);
        self
    }

    /// Resolve whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }
}

/// Compiled SPIR-V shader locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to vertex shader SPIR-V
    pub vertex_shader_path: PathBuf,
    /// Path to fragment shader SPIR-V
    pub fragment_shader_path: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new("target/shaders/mesh.vert.spv", "target/shaders/mesh.frag.spv")
    }
}

impl ShaderConfig {
    /// Create a shader configuration from two paths
    pub fn new(vertex_path: impl Into<PathBuf>, fragment_path: impl Into<PathBuf>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Resolve relative paths against a base directory
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        if self.vertex_shader_path.is_relative() {
            self.vertex_shader_path = base.join(&self.vertex_shader_path);
        }
        if self.fragment_shader_path.is_relative() {
            self.fragment_shader_path = base.join(&self.fragment_shader_path);
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for path in [&self.vertex_shader_path, &self.fragment_shader_path] {
            if path.extension().and_then(|ext| ext.to_str()) != Some("spv") {
                return Err(ConfigError::Invalid(format!(
                    "shader {} is not a .spv file",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Fixed camera parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Eye position in world space
    pub eye: [f32; 3],
    /// Point the camera looks at
    pub target: [f32; 3],
    /// Up direction
    pub up: [f32; 3],
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: [85.0, 2.0, 100.0],
            target: [0.0, 0.0, 40.0],
            up: [0.0, 0.0, 1.0],
            fov_degrees: 45.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(ConfigError::Invalid(format!(
                "clip planes must satisfy 0 < near < far, got near={} far={}",
                self.near, self.far
            )));
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!("field of view {} out of range", self.fov_degrees)));
        }
        Ok(())
    }
}

/// Mesh and texture locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Wavefront OBJ model
    pub model_path: PathBuf,
    /// Texture image (binary PPM or PNG)
    pub texture_path: PathBuf,
}

impl AssetConfig {
    /// Resolve relative paths against a base directory
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        if self.model_path.is_relative() {
            self.model_path = base.join(&self.model_path);
        }
        if self.texture_path.is_relative() {
            self.texture_path = base.join(&self.texture_path);
        }
        self
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("resources/models/cube.obj"),
            texture_path: PathBuf::from("resources/textures/checker.ppm"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(ViewerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_window_size_is_invalid() {
        let config = ViewerConfig::default().with_window_size(0, 600);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_inverted_clip_planes_are_invalid() {
        let mut config = ViewerConfig::default();
        config.camera.near = 10.0;
        config.camera.far = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_dir_only_touches_relative_paths() {
        let assets = AssetConfig {
            model_path: PathBuf::from("models/duck.obj"),
            texture_path: PathBuf::from("/abs/duck.ppm"),
        }
        .with_base_dir(Path::new("/data"));
        assert_eq!(assets.model_path, PathBuf::from("/data/models/duck.obj"));
        assert_eq!(assets.texture_path, PathBuf::from("/abs/duck.ppm"));
    }

    #[test]
    fn test_non_spirv_shader_is_invalid() {
        let mut config = ViewerConfig::default();
        config.renderer = config.renderer.with_shader_paths("mesh.vert", "mesh.frag.spv");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shader_paths_resolve_against_base() {
        let shaders = ShaderConfig::new("a.spv", "/abs/b.spv").with_base_dir(Path::new("/root/app"));
        assert_eq!(shaders.vertex_shader_path, PathBuf::from("/root/app/a.spv"));
        assert_eq!(shaders.fragment_shader_path, PathBuf::from("/abs/b.spv"));
    }

    #[test]
    fn test_validation_follows_explicit_override() {
        let config = RendererConfig::default().with_validation(false);
        assert!(!config.validation_enabled());
        let config = RendererConfig::default().with_validation(true);
        assert!(config.validation_enabled());
    }
}
