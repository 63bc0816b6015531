//! Core data types shared by the sampler and the isosurface exporter.

use glam::Vec3;

/// A camera ray with the time at which it observes the scene.
///
/// `direction` is unit length once produced by the ray sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Ray origin in world space.
    pub origin: Vec3,
    /// Ray direction in world space.
    pub direction: Vec3,
    /// Normalized scene time of the frame this ray was drawn from.
    pub time: f32,
}

impl Ray {
    /// Create a new ray.
    pub fn new(origin: Vec3, direction: Vec3, time: f32) -> Self {
        Self {
            origin,
            direction,
            time,
        }
    }

    /// Point along the ray at parameter `t`.
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// An indexed triangle mesh, as produced by isosurface extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions in world space.
    pub vertices: Vec<Vec3>,
    /// Triangles as vertex index triplets, counter-clockwise seen from outside.
    pub faces: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a triangle given its three corner positions.
    pub fn push_triangle(&mut self, v0: Vec3, v1: Vec3, v2: Vec3) {
        let base = self.vertices.len() as u32;
        self.vertices.extend([v0, v1, v2]);
        self.faces.push([base, base + 1, base + 2]);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Axis-aligned bounds of the vertices, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
        )
    }
}
