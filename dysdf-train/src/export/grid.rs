//! Visualization panels and their conversion to 8-bit images.

use glam::Vec3;
use image::{Rgb, RgbImage};

/// Mapping from a normalized scalar to a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colormap {
    Gray,
    #[default]
    Jet,
}

impl Colormap {
    pub fn apply(self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Colormap::Gray => Vec3::splat(t),
            Colormap::Jet => {
                let channel = |offset: f32| (1.5 - (4.0 * t - offset).abs()).clamp(0.0, 1.0);
                Vec3::new(channel(3.0), channel(2.0), channel(1.0))
            }
        }
    }
}

/// One panel of a visualization grid.
#[derive(Debug, Clone, PartialEq)]
pub enum VisImage {
    /// Colors in [0, 1].
    Rgb {
        data: Vec<Vec3>,
        width: u32,
        height: u32,
    },
    /// Scalars normalized by `range`, or by their own min/max when absent.
    Grayscale {
        data: Vec<f32>,
        width: u32,
        height: u32,
        range: Option<(f32, f32)>,
        colormap: Colormap,
    },
}

impl VisImage {
    pub fn rgb(data: Vec<Vec3>, width: u32, height: u32) -> Self {
        Self::Rgb {
            data,
            width,
            height,
        }
    }

    pub fn grayscale(
        data: Vec<f32>,
        width: u32,
        height: u32,
        range: Option<(f32, f32)>,
        colormap: Colormap,
    ) -> Self {
        Self::Grayscale {
            data,
            width,
            height,
            range,
            colormap,
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Rgb { width, .. } | Self::Grayscale { width, .. } => *width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Rgb { height, .. } | Self::Grayscale { height, .. } => *height,
        }
    }

    fn colors(&self) -> Vec<Vec3> {
        match self {
            Self::Rgb { data, .. } => data.clone(),
            Self::Grayscale {
                data,
                range,
                colormap,
                ..
            } => {
                let (lo, hi) = range.unwrap_or_else(|| {
                    data.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    })
                });
                let span = hi - lo;
                data.iter()
                    .map(|&v| {
                        let t = if span > 0.0 { (v - lo) / span } else { 0.0 };
                        colormap.apply(t)
                    })
                    .collect()
            }
        }
    }

    /// Quantize to 8 bits; missing trailing pixels are black.
    pub fn to_rgb8(&self) -> RgbImage {
        let (w, h) = (self.width(), self.height());
        let colors = self.colors();
        RgbImage::from_fn(w, h, |x, y| {
            let c = colors
                .get((y * w + x) as usize)
                .copied()
                .unwrap_or(Vec3::ZERO)
                .clamp(Vec3::ZERO, Vec3::ONE)
                * 255.0;
            Rgb([c.x.round() as u8, c.y.round() as u8, c.z.round() as u8])
        })
    }
}

/// Concatenate panels horizontally. Shorter panels are padded with black.
pub fn image_grid(panels: &[VisImage]) -> RgbImage {
    let width = panels.iter().map(VisImage::width).sum();
    let height = panels.iter().map(VisImage::height).max().unwrap_or(0);
    let mut grid = RgbImage::new(width, height);
    let mut x0 = 0;
    for panel in panels {
        let img = panel.to_rgb8();
        for (x, y, px) in img.enumerate_pixels() {
            grid.put_pixel(x0 + x, y, *px);
        }
        x0 += img.width();
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(Colormap::Jet.apply(0.0), Vec3::new(0.0, 0.0, 0.5));
        assert_eq!(Colormap::Jet.apply(1.0), Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(Colormap::Jet.apply(0.5), Vec3::new(0.5, 1.0, 0.5));
    }

    #[test]
    fn test_grayscale_fixed_range() {
        let img = VisImage::grayscale(vec![0.0, 0.5, 1.0, 2.0], 4, 1, Some((0.0, 1.0)), Colormap::Gray)
            .to_rgb8();
        let row: Vec<u8> = img.pixels().map(|p| p.0[0]).collect();
        assert_eq!(row, vec![0, 128, 255, 255]);
    }

    #[test]
    fn test_grayscale_auto_range() {
        let img = VisImage::grayscale(vec![2.0, 4.0], 2, 1, None, Colormap::Gray).to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_constant_grayscale_does_not_divide_by_zero() {
        let img = VisImage::grayscale(vec![3.0; 4], 2, 2, None, Colormap::Gray).to_rgb8();
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_grid_layout() {
        let a = VisImage::rgb(vec![Vec3::ONE; 4], 2, 2);
        let b = VisImage::grayscale(vec![0.0; 3], 3, 1, Some((0.0, 1.0)), Colormap::Gray);
        let grid = image_grid(&[a, b]);
        assert_eq!(grid.dimensions(), (5, 2));
        assert_eq!(grid.get_pixel(1, 1).0, [255, 255, 255]);
        assert_eq!(grid.get_pixel(3, 1).0, [0, 0, 0]);
    }

    #[test]
    fn test_empty_grid() {
        assert_eq!(image_grid(&[]).dimensions(), (0, 0));
    }
}
