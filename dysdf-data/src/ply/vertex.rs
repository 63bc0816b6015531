//! PLY vertex data structures

use glam::Vec3;

/// Vertex data extracted from a PLY file.
#[derive(Debug, Clone, PartialEq)]
pub struct PlyVertex {
    pub position: Vec3,
    pub normal: Option<Vec3>,
}
