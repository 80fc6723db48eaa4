//! CPU-side geometry handed to the renderer once at startup

mod mesh;
mod vertex;

pub use mesh::Mesh;
pub use vertex::Vertex;
