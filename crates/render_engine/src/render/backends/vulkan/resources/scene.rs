//! Startup-uploaded resources that survive swapchain recreation

use ash::vk;

use super::allocator::ResourceAllocator;
use super::descriptor_set::{mesh_layout_builder, DescriptorSetLayout};
use super::mesh_buffers::MeshBuffers;
use super::texture::Texture;
use super::transfer::TransferEngine;
use crate::assets::ImageData;
use crate::render::backends::vulkan::VulkanResult;
use crate::render::Mesh;

/// SPIR-V bytecode for the mesh pipeline
#[derive(Debug, Clone, Default)]
pub struct ShaderBytes {
    /// Vertex stage
    pub vertex: Vec<u8>,
    /// Fragment stage
    pub fragment: Vec<u8>,
}

/// Mesh, texture and descriptor layout shared by every swapchain generation
pub struct SceneResources {
    descriptor_layout: DescriptorSetLayout,
    texture: Texture,
    mesh: MeshBuffers,
    shaders: ShaderBytes,
}

impl SceneResources {
    /// Upload the mesh and texture and build the descriptor layout
    pub fn upload(
        allocator: &ResourceAllocator,
        transfer: &TransferEngine,
        mesh: &Mesh,
        image: &ImageData,
        shaders: ShaderBytes,
        max_device_anisotropy: f32,
    ) -> VulkanResult<Self> {
        let mesh = MeshBuffers::upload(allocator, transfer, mesh)?;
        let texture = Texture::upload(
            allocator,
            transfer,
            image.width,
            image.height,
            &image.data,
            max_device_anisotropy,
        )?;
        let descriptor_layout = mesh_layout_builder().build(allocator.device())?;

        Ok(Self {
            descriptor_layout,
            texture,
            mesh,
            shaders,
        })
    }

    /// Layout of the per-image descriptor sets
    pub fn descriptor_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_layout.handle()
    }

    /// Sampled texture
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    /// Vertex and index buffers
    pub fn mesh(&self) -> &MeshBuffers {
        &self.mesh
    }

    /// Pipeline shader bytecode
    pub fn shaders(&self) -> &ShaderBytes {
        &self.shaders
    }
}
