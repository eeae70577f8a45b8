use filter_deck_common::frame::Frame;
use image::{GrayImage, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::close;

use super::ops::kernel_sigma;
use super::traits::Transform;
use crate::error::TransformError;
use crate::state::TransformState;

/// Keeps only pixels whose HSV value falls inside a skin-tone box.
///
/// Hue uses the 8-bit 0..180 scale.
pub struct SkinMask {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
    pub blur_kernel: u32,
    pub close_radius: u8,
}

impl Default for SkinMask {
    fn default() -> Self {
        Self {
            lower: [0, 100, 0],
            upper: [50, 255, 255],
            blur_kernel: 9,
            close_radius: 6,
        }
    }
}

impl SkinMask {
    pub fn mask(&self, rgb: &RgbImage) -> GrayImage {
        let sigma = kernel_sigma(self.blur_kernel);
        let mut mask = GrayImage::new(rgb.width(), rgb.height());
        for (dst, px) in mask.pixels_mut().zip(rgb.pixels()) {
            let hsv = to_hsv(*px);
            let inside = (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c]);
            dst[0] = if inside { 255 } else { 0 };
        }
        let mask = gaussian_blur_f32(&mask, sigma);
        let mask = close(&mask, Norm::L1, self.close_radius);
        gaussian_blur_f32(&mask, sigma)
    }
}

impl Transform for SkinMask {
    fn apply(&self, frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        let mut rgb = frame.to_rgb_image();
        let mask = self.mask(&rgb);
        for (px, m) in rgb.pixels_mut().zip(mask.pixels()) {
            if m[0] == 0 {
                *px = Rgb([0, 0, 0]);
            }
        }
        Ok(frame.with_rgb(rgb))
    }
}

/// 8-bit HSV: H in 0..180, S and V in 0..=255.
pub fn to_hsv(px: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = px.0.map(|v| v as f32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;
    let s = if v > 0.0 { delta * 255.0 / v } else { 0.0 };
    let h = if delta == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };
    [(h / 2.0).round() as u8 % 180, s.round() as u8, v as u8]
}
