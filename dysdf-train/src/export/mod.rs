//! Writing renders, meshes and metric summaries under a run directory.

mod grid;
mod output;
mod results;
mod sequence;

pub use grid::{Colormap, VisImage, image_grid};
pub use output::OutputDir;
pub use results::write_results_yaml;
pub use sequence::{collect_sequence_frames, save_image_sequence};
