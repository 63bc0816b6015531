//! PLY mesh reading and writing

mod loader;
mod vertex;
mod writer;

pub use loader::{load_vertices_from_ply, ply_has_faces};
pub use vertex::PlyVertex;
pub use writer::write_mesh_ply;
