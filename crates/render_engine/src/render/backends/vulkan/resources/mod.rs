//! GPU resources: allocation, uploads and descriptor plumbing

pub mod allocator;
pub mod descriptor_set;
pub mod mesh_buffers;
pub mod scene;
pub mod texture;
pub mod transfer;
pub mod uniform_buffers;

pub use allocator::{find_memory_type_index, GpuBuffer, GpuImage, ImageDesc, ImageView, ResourceAllocator};
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetWriter};
pub use mesh_buffers::MeshBuffers;
pub use scene::{SceneResources, ShaderBytes};
pub use texture::Texture;
pub use transfer::{LayoutTransition, TransferEngine};
pub use uniform_buffers::{UniformRegion, UniformRegions};
