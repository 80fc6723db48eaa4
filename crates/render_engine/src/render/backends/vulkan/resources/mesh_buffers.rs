//! Device-local vertex and index buffers for the mesh

use ash::vk;

use super::allocator::{GpuBuffer, ResourceAllocator};
use super::transfer::TransferEngine;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::Mesh;

/// Vertex and index buffers uploaded once at startup
pub struct MeshBuffers {
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    index_count: u32,
}

impl MeshBuffers {
    /// Stage and copy the mesh into device-local memory
    pub fn upload(allocator: &ResourceAllocator, transfer: &TransferEngine, mesh: &Mesh) -> VulkanResult<Self> {
        if mesh.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "mesh has no vertices or indices".to_string(),
            });
        }
        if !mesh.indices_in_bounds() {
            return Err(VulkanError::InvalidOperation {
                reason: "mesh index references a missing vertex".to_string(),
            });
        }

        let vertex_buffer = transfer.upload_buffer(allocator, &mesh.vertices, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index_buffer = transfer.upload_buffer(allocator, &mesh.indices, vk::BufferUsageFlags::INDEX_BUFFER)?;

        log::info!(
            "Uploaded mesh: {} vertices, {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
        })
    }

    /// Vertex buffer handle
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Index buffer handle (32-bit indices)
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Indices per draw
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}
