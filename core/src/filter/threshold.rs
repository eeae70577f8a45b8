use filter_deck_common::frame::Frame;
use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;

use super::ops::kernel_sigma;
use super::traits::Transform;
use crate::error::TransformError;
use crate::state::TransformState;

/// Adaptive Gaussian threshold: a pixel turns white when it is brighter than
/// its Gaussian-weighted neighbourhood mean minus `offset`.
pub struct AdaptiveThreshold {
    pub block_size: u32,
    pub offset: i16,
}

impl Default for AdaptiveThreshold {
    fn default() -> Self {
        Self {
            block_size: 11,
            offset: 2,
        }
    }
}

impl Transform for AdaptiveThreshold {
    fn apply(&self, frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        let gray = frame.to_gray_image();
        let mean = gaussian_blur_f32(&gray, kernel_sigma(self.block_size));
        let mut out = GrayImage::new(gray.width(), gray.height());
        for ((dst, &src), &m) in out.iter_mut().zip(gray.iter()).zip(mean.iter()) {
            *dst = if src as i16 > m as i16 - self.offset { 255 } else { 0 };
        }
        Ok(frame.with_gray(out))
    }
}
