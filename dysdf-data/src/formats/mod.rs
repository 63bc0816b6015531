//! On-disk dataset formats.

pub mod nerf_synthetic;

pub use nerf_synthetic::load_transforms_dir;
