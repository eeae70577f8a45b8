use filter_deck_common::frame::Frame;
use imageproc::contrast::equalize_histogram;

use super::ops::map_channels;
use super::traits::Transform;
use crate::error::TransformError;
use crate::state::TransformState;

/// Histogram equalisation applied to each colour channel independently.
pub struct Equalize;

impl Transform for Equalize {
    fn apply(&self, frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        let rgb = frame.to_rgb_image();
        Ok(frame.with_rgb(map_channels(&rgb, equalize_histogram)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filter_deck_common::frame::PixelLayout;
    use image::{Rgb, RgbImage};

    #[test]
    fn low_contrast_ramp_is_stretched() {
        let img = RgbImage::from_fn(64, 4, |x, _| {
            let v = 100 + (x / 8) as u8;
            Rgb([v, v, v])
        });
        let frame = Frame::from_rgb_image(img, PixelLayout::Rgb8);
        let out = Equalize
            .apply(&frame, &mut TransformState::default())
            .unwrap()
            .to_rgb_image();
        let lo = out.get_pixel(0, 0)[0];
        let hi = out.get_pixel(63, 0)[0];
        assert_eq!(hi, 255);
        assert!(hi - lo > 150, "range {lo}..{hi}");
    }
}
