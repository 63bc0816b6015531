//! DySDF Data Crate
//!
//! Dataset-side collaborators for dynamic SDF reconstruction: multi-view video
//! frames with foreground masks, pinhole ray generation, frame-id to time
//! mapping, and mesh I/O for exported isosurfaces.
//! This crate knows nothing about losses or training schedules.

pub mod camera;
pub mod dataset;
pub mod error;
pub mod formats;
pub mod isosurface;
pub mod ply;
pub mod time;
pub mod types;

pub use camera::{PinholeIntrinsics, fov_to_focal, get_rays, ray_directions};
pub use dataset::{Frame, FrameDataset, RayDataset};
pub use error::{DataError, Result};
pub use formats::load_transforms_dir;
pub use isosurface::extract_isosurface;
pub use ply::{PlyVertex, load_vertices_from_ply, ply_has_faces, write_mesh_ply};
pub use time::TimeRange;
pub use types::{Ray, TriangleMesh};
