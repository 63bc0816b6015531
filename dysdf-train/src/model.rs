//! The renderer seam.
//!
//! A [`RenderModel`] turns a ray batch into one output record per level
//! (coarse/fine passes, ...). Per-step inputs that steer the renderer, the
//! background color and the alpha ratio, travel in a [`RenderContext`]
//! instead of being set on the model.

use glam::Vec3;
use std::path::Path;

use crate::error::Result;
use crate::export::VisImage;
use crate::sampling::{RayBatch, Stage};

/// Per-call renderer inputs derived from the step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    /// Color composited behind the rendered foreground.
    pub background_color: Vec3,
    /// Training progress in `[0, 1]`.
    pub alpha_ratio: f32,
    pub stage: Stage,
}

/// Output of one render level, one entry per ray.
#[derive(Debug, Clone, Default)]
pub struct LevelOutput {
    pub rgb: Vec<Vec3>,
    pub opacity: Vec<f32>,
    pub normal: Option<Vec<Vec3>>,
    pub depth: Option<Vec<f32>>,
    /// Eikonal term already reduced by the model.
    pub gradient_error: Option<f32>,
}

impl LevelOutput {
    pub fn new(rgb: Vec<Vec3>, opacity: Vec<f32>) -> Self {
        Self {
            rgb,
            opacity,
            ..Default::default()
        }
    }

    pub fn with_normal(mut self, normal: Vec<Vec3>) -> Self {
        self.normal = Some(normal);
        self
    }

    pub fn with_depth(mut self, depth: Vec<f32>) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_gradient_error(mut self, gradient_error: f32) -> Self {
        self.gradient_error = Some(gradient_error);
        self
    }
}

/// Named level outputs in render order.
#[derive(Debug, Clone, Default)]
pub struct LevelOutputs {
    levels: Vec<(String, LevelOutput)>,
}

impl LevelOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, output: LevelOutput) {
        self.levels.push((name.into(), output));
    }

    pub fn with_level(mut self, name: impl Into<String>, output: LevelOutput) -> Self {
        self.push(name, output);
        self
    }

    pub fn get(&self, name: &str) -> Option<&LevelOutput> {
        self.levels.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LevelOutput)> {
        self.levels.iter().map(|(n, o)| (n.as_str(), o))
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl IntoIterator for LevelOutputs {
    type Item = (String, LevelOutput);
    type IntoIter = std::vec::IntoIter<(String, LevelOutput)>;

    fn into_iter(self) -> Self::IntoIter {
        self.levels.into_iter()
    }
}

/// A differentiable renderer over a time-varying SDF.
pub trait RenderModel {
    /// Render every ray of `batch`.
    fn render(&mut self, batch: &RayBatch, context: &RenderContext) -> Result<LevelOutputs>;

    /// Auxiliary scalars logged after each training step.
    fn log_variables(&self) -> Vec<(String, f32)> {
        Vec::new()
    }

    /// Extract the zero level set at `time` and write it to `path`.
    fn isosurface(&mut self, path: &Path, time: f32, frame_id: u32, resolution: u32) -> Result<()>;

    /// Extra panels appended to a level's visualization grid.
    fn extra_visualizations(&self, _batch: &RayBatch, _output: &LevelOutput) -> Vec<VisImage> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_outputs_keep_render_order() {
        let outs = LevelOutputs::new()
            .with_level("fine", LevelOutput::new(vec![Vec3::ONE], vec![1.0]))
            .with_level("coarse", LevelOutput::new(vec![Vec3::ZERO], vec![0.0]));
        assert_eq!(outs.names().collect::<Vec<_>>(), vec!["fine", "coarse"]);
        assert_eq!(outs.get("coarse").unwrap().opacity, vec![0.0]);
        assert!(outs.get("medium").is_none());
        assert_eq!(outs.len(), 2);
    }

    #[test]
    fn test_optional_fields_default_absent() {
        let out = LevelOutput::new(vec![], vec![]);
        assert!(out.normal.is_none() && out.depth.is_none() && out.gradient_error.is_none());
        let out = out.with_depth(vec![]).with_gradient_error(0.5);
        assert!(out.depth.is_some());
        assert_eq!(out.gradient_error, Some(0.5));
    }
}
