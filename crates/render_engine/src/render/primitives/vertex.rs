//! Vertex format shared by the loader and the pipeline vertex input state

use ash::vk;
use std::mem::{offset_of, size_of};

/// Interleaved vertex: position, color, texture coordinate, normal
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Per-vertex color
    pub color: [f32; 3],
    /// Texture coordinate (V already flipped for Vulkan)
    pub tex_coord: [f32; 2],
    /// Object-space normal
    pub normal: [f32; 3],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Vertex buffer binding used by the mesh pipeline
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute layout: locations 0-3 map to the fields in declaration order
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        [
            Self::attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Self, position)),
            Self::attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Self, color)),
            Self::attribute(2, vk::Format::R32G32_SFLOAT, offset_of!(Self, tex_coord)),
            Self::attribute(3, vk::Format::R32G32B32_SFLOAT, offset_of!(Self, normal)),
        ]
    }

    fn attribute(location: u32, format: vk::Format, offset: usize) -> vk::VertexInputAttributeDescription {
        vk::VertexInputAttributeDescription {
            location,
            binding: 0,
            format,
            offset: offset as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(size_of::<Vertex>(), 11 * size_of::<f32>());
        assert_eq!(Vertex::binding_description().stride, 44);
    }

    #[test]
    fn test_attribute_offsets_follow_field_order() {
        let offsets: Vec<u32> = Vertex::attribute_descriptions().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 32]);
    }
}
