use filter_deck_common::frame::Frame;
use image::{GrayImage, Rgb};

use super::ops::{correlate, dilate3x3, structure_tensor};
use super::traits::Transform;
use crate::error::TransformError;
use crate::state::TransformState;

#[rustfmt::skip]
const SOBEL5_X: [f32; 25] = [
    -1.0,  -2.0, 0.0,  2.0, 1.0,
    -4.0,  -8.0, 0.0,  8.0, 4.0,
    -6.0, -12.0, 0.0, 12.0, 6.0,
    -4.0,  -8.0, 0.0,  8.0, 4.0,
    -1.0,  -2.0, 0.0,  2.0, 1.0,
];
#[rustfmt::skip]
const SOBEL5_Y: [f32; 25] = [
    -1.0, -4.0,  -6.0, -4.0, -1.0,
    -2.0, -8.0, -12.0, -8.0, -2.0,
     0.0,  0.0,   0.0,  0.0,  0.0,
     2.0,  8.0,  12.0,  8.0,  2.0,
     1.0,  4.0,   6.0,  4.0,  1.0,
];

/// Harris corner detector over a 5x5 Sobel gradient. Pixels whose dilated
/// response exceeds `relative_threshold * max(response)` are painted red.
pub struct Harris {
    /// Side of the square window the structure tensor is summed over.
    pub block_size: u32,
    pub k: f32,
    pub relative_threshold: f32,
}

impl Default for Harris {
    fn default() -> Self {
        Self {
            block_size: 2,
            k: 0.07,
            relative_threshold: 0.01,
        }
    }
}

impl Harris {
    /// Harris response `det(M) - k * trace(M)^2` at every pixel.
    pub fn response(&self, gray: &GrayImage) -> Vec<f32> {
        let ix = correlate(gray, &SOBEL5_X, 5, 5);
        let iy = correlate(gray, &SOBEL5_Y, 5, 5);
        let [sxx, syy, sxy] = structure_tensor(&ix, &iy, self.block_size);

        sxx.iter()
            .zip(&syy)
            .zip(&sxy)
            .map(|((&a, &b), &c)| {
                let det = a * b - c * c;
                let trace = a + b;
                det - self.k * trace * trace
            })
            .collect()
    }
}

impl Transform for Harris {
    fn apply(&self, frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        let gray = frame.to_gray_image();
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let response = dilate3x3(&self.response(&gray), w, h);
        let max = response.iter().copied().fold(f32::MIN, f32::max);

        let mut out = frame.to_rgb_image();
        if max > 0.0 {
            let threshold = self.relative_threshold * max;
            for (i, &r) in response.iter().enumerate() {
                if r > threshold {
                    out.put_pixel((i % w) as u32, (i / w) as u32, Rgb([255, 0, 0]));
                }
            }
        }
        Ok(frame.with_rgb(out))
    }
}
