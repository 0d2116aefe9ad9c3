//! Separable Gaussian blur used to soften the alpha mask.

use image::{GrayImage, Luma};

// Fixed kernels used for the common small sizes when no sigma is given.
const SMALL_KERNELS: [&[f64]; 4] = [
    &[1.0],
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
];

/// Sigma implied by a kernel size when none is configured
pub fn default_sigma(kernel_size: usize) -> f64 {
    0.3 * ((kernel_size as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1D Gaussian weights for a `2 * radius + 1` tap kernel
pub fn gaussian_kernel(radius: u32, sigma: Option<f64>) -> Vec<f64> {
    let size = 2 * radius as usize + 1;

    if sigma.is_none() && radius < SMALL_KERNELS.len() as u32 {
        return SMALL_KERNELS[radius as usize].to_vec();
    }

    let sigma = sigma.unwrap_or_else(|| default_sigma(size));
    let denom = 2.0 * sigma * sigma;
    let r = radius as f64;

    let mut weights: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - r;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Blur a single-channel mask with a square `2 * radius + 1` Gaussian kernel
///
/// Borders are extended by reflection without repeating the edge pixel
/// (`dcb|abcd|cba`). Radius 0 returns the mask unchanged.
pub fn feather(mask: &GrayImage, radius: u32, sigma: Option<f64>) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }

    let (width, height) = mask.dimensions();
    let kernel = gaussian_kernel(radius, sigma);
    let w = width as usize;
    let h = height as usize;
    let src = mask.as_raw();

    let mut horizontal = vec![0.0f64; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            horizontal[y * w + x] = convolve_at(&kernel, x, w, |i| f64::from(row[i]));
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let value = convolve_at(&kernel, y, h, |i| horizontal[i * w + x]);
            out.put_pixel(x as u32, y as u32, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

fn convolve_at<F: Fn(usize) -> f64>(kernel: &[f64], pos: usize, len: usize, sample: F) -> f64 {
    let radius = (kernel.len() / 2) as i64;
    kernel
        .iter()
        .enumerate()
        .map(|(k, weight)| {
            let offset = k as i64 - radius;
            weight * sample(reflect_101(pos as i64 + offset, len))
        })
        .sum()
}

fn reflect_101(index: i64, len: usize) -> usize {
    let last = len as i64 - 1;
    if last == 0 {
        return 0;
    }

    let mut i = index;
    // Kernels wider than the image can bounce more than once.
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}
