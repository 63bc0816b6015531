//! Scalar criteria over per-ray buffers.

use glam::Vec3;

/// Smallest log term used by [`binary_cross_entropy`].
const LOG_FLOOR: f32 = -100.0;

/// Mean of `values` over the masked rays, counting all three channels.
///
/// Returns `None` when the mask sums to zero.
pub fn masked_mean(values: &[Vec3], mask: &[f32]) -> Option<f32> {
    let weight: f32 = mask.iter().sum();
    if weight <= 0.0 {
        return None;
    }
    let total: f32 = values
        .iter()
        .zip(mask)
        .map(|(v, &m)| v.element_sum() * m)
        .sum();
    Some(total / (3.0 * weight))
}

/// Mean over every channel of every ray.
pub fn mean(values: &[Vec3]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.element_sum()).sum::<f32>() / (3.0 * values.len() as f32)
}

/// Mean binary cross-entropy with log terms floored at -100.
pub fn binary_cross_entropy(input: &[f32], target: &[f32]) -> f32 {
    if input.is_empty() {
        return 0.0;
    }
    let total: f32 = input
        .iter()
        .zip(target)
        .map(|(&x, &y)| {
            let log_x = x.ln().max(LOG_FLOOR);
            let log_1mx = (1.0 - x).ln().max(LOG_FLOOR);
            -(y * log_x + (1.0 - y) * log_1mx)
        })
        .sum();
    total / input.len() as f32
}

/// Peak signal-to-noise ratio for colors in `[0, 1]`, optionally masked.
///
/// `None` when a mask is given and it is empty.
pub fn psnr(pred: &[Vec3], target: &[Vec3], mask: Option<&[f32]>) -> Option<f32> {
    let sq: Vec<Vec3> = pred
        .iter()
        .zip(target)
        .map(|(p, t)| (*p - *t) * (*p - *t))
        .collect();
    let mse = match mask {
        Some(mask) => masked_mean(&sq, mask)?,
        None => mean(&sq),
    };
    Some(-10.0 * mse.log10())
}

fn gaussian_window(size: usize, sigma: f32) -> Vec<f32> {
    let center = (size / 2) as f32;
    let w: Vec<f32> = (0..size)
        .map(|x| (-(x as f32 - center).powi(2) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = w.iter().sum();
    w.into_iter().map(|v| v / sum).collect()
}

/// Separable zero-padded "same" blur of a single-channel image.
fn blur(img: &[f32], width: usize, height: usize, window: &[f32]) -> Vec<f32> {
    let r = (window.len() / 2) as isize;
    let sample = |buf: &[f32], x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x >= width as isize || y >= height as isize {
            0.0
        } else {
            buf[y as usize * width + x as usize]
        }
    };

    let mut horizontal = vec![0.0; img.len()];
    for y in 0..height as isize {
        for x in 0..width as isize {
            horizontal[y as usize * width + x as usize] = window
                .iter()
                .enumerate()
                .map(|(k, w)| w * sample(img, x + k as isize - r, y))
                .sum();
        }
    }

    let mut out = vec![0.0; img.len()];
    for y in 0..height as isize {
        for x in 0..width as isize {
            out[y as usize * width + x as usize] = window
                .iter()
                .enumerate()
                .map(|(k, w)| w * sample(&horizontal, x, y + k as isize - r))
                .sum();
        }
    }
    out
}

/// Structural similarity of two `height x width` RGB images.
///
/// Gaussian window of 11 taps (sigma 1.5), inputs clamped to `[0, 1]`,
/// averaged over pixels and channels.
pub fn ssim(pred: &[Vec3], target: &[Vec3], width: u32, height: u32) -> f32 {
    const C1: f32 = 0.01 * 0.01;
    const C2: f32 = 0.03 * 0.03;
    let (w, h) = (width as usize, height as usize);
    let n = w * h;
    if n == 0 {
        return 1.0;
    }
    let window = gaussian_window(11, 1.5);

    let mut total = 0.0;
    for c in 0..3 {
        let x: Vec<f32> = pred.iter().map(|p| p[c].clamp(0.0, 1.0)).collect();
        let y: Vec<f32> = target.iter().map(|p| p[c].clamp(0.0, 1.0)).collect();
        let xx: Vec<f32> = x.iter().map(|v| v * v).collect();
        let yy: Vec<f32> = y.iter().map(|v| v * v).collect();
        let xy: Vec<f32> = x.iter().zip(&y).map(|(a, b)| a * b).collect();

        let mu_x = blur(&x, w, h, &window);
        let mu_y = blur(&y, w, h, &window);
        let e_xx = blur(&xx, w, h, &window);
        let e_yy = blur(&yy, w, h, &window);
        let e_xy = blur(&xy, w, h, &window);

        for i in 0..n {
            let (mx, my) = (mu_x[i], mu_y[i]);
            let sigma_xx = (e_xx[i] - mx * mx).max(0.0);
            let sigma_yy = (e_yy[i] - my * my).max(0.0);
            let sigma_xy = e_xy[i] - mx * my;
            total += ((2.0 * mx * my + C1) * (2.0 * sigma_xy + C2))
                / ((mx * mx + my * my + C1) * (sigma_xx + sigma_yy + C2));
        }
    }
    total / (3 * n) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_mean_ignores_background() {
        let values = vec![Vec3::splat(0.3), Vec3::splat(9.0)];
        assert!((masked_mean(&values, &[1.0, 0.0]).unwrap() - 0.3).abs() < 1e-6);
        assert!(masked_mean(&values, &[0.0, 0.0]).is_none());
    }

    #[test]
    fn test_masked_mean_weights_soft_mask() {
        let values = vec![Vec3::ONE, Vec3::ZERO];
        let m = masked_mean(&values, &[0.5, 0.5]).unwrap();
        assert!((m - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_bce_known_value() {
        let p = (-1.5f32).exp();
        let bce = binary_cross_entropy(&[p, 1.0 - p], &[1.0, 0.0]);
        assert!((bce - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_bce_log_floor() {
        // ln(0) is floored, so a confident wrong prediction costs exactly 100.
        assert_eq!(binary_cross_entropy(&[0.0], &[1.0]), 100.0);
        assert_eq!(binary_cross_entropy(&[1.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_psnr() {
        let pred = vec![Vec3::splat(0.1); 4];
        let target = vec![Vec3::ZERO; 4];
        // mse = 0.01 -> 20 dB
        assert!((psnr(&pred, &target, None).unwrap() - 20.0).abs() < 1e-3);

        let mut pred_masked = pred.clone();
        pred_masked[3] = Vec3::ONE;
        let masked = psnr(&pred_masked, &target, Some(&[1.0, 1.0, 1.0, 0.0])).unwrap();
        assert!((masked - 20.0).abs() < 1e-3);
        assert!(psnr(&pred, &target, Some(&[0.0; 4])).is_none());
    }

    #[test]
    fn test_ssim_identical_images_is_one() {
        let img: Vec<Vec3> = (0..64)
            .map(|i| Vec3::new((i % 8) as f32 / 8.0, (i / 8) as f32 / 8.0, 0.5))
            .collect();
        assert!((ssim(&img, &img, 8, 8) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_ssim_drops_for_different_images() {
        let a: Vec<Vec3> = (0..100)
            .map(|i| Vec3::splat(if (i / 10 + i % 10) % 2 == 0 { 1.0 } else { 0.0 }))
            .collect();
        let b = vec![Vec3::splat(0.5); 100];
        let s = ssim(&a, &b, 10, 10);
        assert!(s < 0.5, "ssim {}", s);
    }

    #[test]
    fn test_gaussian_window_normalized() {
        let w = gaussian_window(11, 1.5);
        assert_eq!(w.len(), 11);
        assert!((w.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(w[5] > w[4] && (w[4] - w[6]).abs() < 1e-7);
    }
}
