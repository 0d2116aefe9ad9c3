//! # Alpha Matte
//!
//! Keys out dark background pixels: a pixel whose brightest channel falls below the
//! threshold becomes transparent, everything else stays opaque. The hard mask can be
//! feathered with a small Gaussian blur before it replaces the frame's alpha channel.

pub mod feather;

use image::{buffer::ConvertBuffer, GrayImage, Luma, RgbaImage};

use crate::config::MatteConfig;
use crate::video::types::{CompositedFrame, Frame};

pub use feather::{default_sigma, gaussian_kernel};

/// Converts decoded frames into RGBA frames with a brightness-keyed alpha channel
#[derive(Debug, Clone)]
pub struct AlphaMatte {
    threshold: u8,
    feather_radius: u32,
    feather_sigma: Option<f64>,
}

impl AlphaMatte {
    pub fn new(config: &MatteConfig) -> Self {
        Self {
            threshold: config.threshold,
            feather_radius: config.feather_radius,
            feather_sigma: config.feather_sigma,
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn feather_radius(&self) -> u32 {
        self.feather_radius
    }

    /// Binary mask: 0 where max(R, G, B) < threshold, 255 otherwise
    pub fn mask(&self, frame: &Frame) -> GrayImage {
        let image = frame.as_image();
        GrayImage::from_fn(image.width(), image.height(), |x, y| {
            let [r, g, b] = image.get_pixel(x, y).0;
            let brightness = r.max(g).max(b);
            Luma([if brightness < self.threshold { 0 } else { 255 }])
        })
    }

    /// Build the composited RGBA frame; colour channels are copied untouched
    pub fn apply(&self, frame: &Frame) -> CompositedFrame {
        let mut rgba: RgbaImage = frame.as_image().convert();

        let mut alpha = self.mask(frame);
        if self.feather_radius > 0 {
            alpha = feather::feather(&alpha, self.feather_radius, self.feather_sigma);
        }

        for (pixel, a) in rgba.pixels_mut().zip(alpha.pixels()) {
            pixel[3] = a[0];
        }

        CompositedFrame::new(rgba)
    }
}

impl Default for AlphaMatte {
    fn default() -> Self {
        Self::new(&MatteConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn matte(threshold: u8, feather_radius: u32) -> AlphaMatte {
        AlphaMatte::new(&MatteConfig {
            threshold,
            feather_radius,
            feather_sigma: None,
        })
    }

    #[test]
    fn test_black_frame_is_fully_transparent() {
        let out = matte(35, 0).apply(&Frame::new_black(16, 9));
        assert!(out.alpha_values().all(|a| a == 0));
    }

    #[test]
    fn test_white_frame_is_fully_opaque_and_unchanged() {
        let frame = Frame::new_filled(16, 9, [255, 255, 255]);
        let out = matte(35, 0).apply(&frame);
        assert!(out.alpha_values().all(|a| a == 255));
        assert!(out.as_image().pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn test_feathered_uniform_frames_stay_uniform() {
        let black = matte(35, 3).apply(&Frame::new_black(16, 16));
        assert!(black.alpha_values().all(|a| a == 0));

        let white = matte(35, 3).apply(&Frame::new_filled(16, 16, [200, 200, 200]));
        assert!(white.alpha_values().all(|a| a == 255));
    }

    #[test]
    fn test_threshold_is_strict() {
        let m = matte(35, 0);
        assert_eq!(m.apply(&Frame::new_filled(1, 1, [34, 34, 34])).alpha(0, 0), 0);
        assert_eq!(m.apply(&Frame::new_filled(1, 1, [35, 0, 0])).alpha(0, 0), 255);
        assert_eq!(m.apply(&Frame::new_filled(1, 1, [0, 0, 35])).alpha(0, 0), 255);
    }

    #[test]
    fn test_zero_threshold_keeps_everything() {
        let out = matte(0, 0).apply(&Frame::new_black(4, 4));
        assert!(out.alpha_values().all(|a| a == 255));
    }

    #[test]
    fn test_random_pixels_follow_brightest_channel() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut frame = Frame::new_black(64, 48);
        for y in 0..48 {
            for x in 0..64 {
                frame.set_pixel(x, y, [rng.gen(), rng.gen::<u8>() / 2, rng.gen::<u8>() / 4]);
            }
        }

        for threshold in [1u8, 35, 128, 254] {
            let out = matte(threshold, 0).apply(&frame);
            for y in 0..48 {
                for x in 0..64 {
                    let [r, g, b] = frame.get_pixel(x, y);
                    let expected = if r.max(g).max(b) >= threshold { 255 } else { 0 };
                    assert_eq!(out.alpha(x, y), expected);

                    let p = out.as_image().get_pixel(x, y);
                    assert_eq!([p[0], p[1], p[2]], [r, g, b]);
                }
            }
        }
    }

    #[test]
    fn test_feather_softens_only_the_boundary() {
        let mut frame = Frame::new_black(48, 48);
        for y in 0..48 {
            for x in 24..48 {
                frame.set_pixel(x, y, [255, 180, 90]);
            }
        }

        let out = matte(35, 3).apply(&frame);
        assert_eq!(out.alpha(5, 20), 0);
        assert_eq!(out.alpha(42, 20), 255);

        let left = out.alpha(23, 20);
        let right = out.alpha(24, 20);
        assert!(left > 0 && left < 255);
        assert!(right > 0 && right < 255);

        let hard = matte(35, 0).apply(&frame);
        assert_eq!(hard.alpha(23, 20), 0);
        assert_eq!(hard.alpha(24, 20), 255);
    }
}
