//! Loaders for the data the renderer consumes at startup
//!
//! Meshes come from Wavefront OBJ (with an optional MTL library for the
//! lighting colors), textures from any format the `image` crate decodes, and
//! shaders as opaque SPIR-V bytes.

pub mod image_loader;
pub mod mtl_parser;
pub mod obj_loader;

pub use image_loader::{ImageData, ImageLoadError};
pub use mtl_parser::{MtlData, MtlParser};
pub use obj_loader::{ObjError, ObjLoader, ObjModel};

use std::path::Path;

/// Read shader bytecode without interpreting it
pub fn load_shader_bytes<P: AsRef<Path>>(path: P) -> std::io::Result<Vec<u8>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    log::debug!("[SHADER] Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}
