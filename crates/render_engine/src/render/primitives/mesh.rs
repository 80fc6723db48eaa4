//! Indexed triangle mesh

use super::Vertex;

/// Indexed triangle list with 32-bit indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle indices into `vertices`
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a mesh from vertex and index lists
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Number of indices submitted per draw
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Whether the mesh has anything to draw
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Check every index references an existing vertex
    pub fn indices_in_bounds(&self) -> bool {
        let count = self.vertices.len() as u64;
        self.indices.iter().all(|&index| u64::from(index) < count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_index_is_detected() {
        let mesh = Mesh::new(vec![Vertex::default(); 3], vec![0, 1, 3]);
        assert!(!mesh.indices_in_bounds());
        assert_eq!(mesh.index_count(), 3);
    }

    #[test]
    fn test_empty_mesh() {
        assert!(Mesh::default().is_empty());
    }
}
