use filter_deck_common::frame::Frame;
use imageproc::edges::canny;
use imageproc::filter::laplacian_filter;
use imageproc::gradients::{horizontal_scharr, vertical_scharr};
use imageproc::map::map_subpixels;

use super::traits::Transform;
use crate::error::TransformError;
use crate::state::TransformState;

/// Canny edge detection on the luma channel.
pub struct Canny {
    pub low: f32,
    pub high: f32,
}

impl Default for Canny {
    fn default() -> Self {
        Self {
            low: 100.0,
            high: 200.0,
        }
    }
}

impl Transform for Canny {
    fn apply(&self, frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        let gray = frame.to_gray_image();
        Ok(frame.with_gray(canny(&gray, self.low, self.high)))
    }
}

/// Absolute Laplacian response.
pub struct Laplacian;

impl Transform for Laplacian {
    fn apply(&self, frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        let gray = frame.to_gray_image();
        let response = laplacian_filter(&gray);
        let magnitude = map_subpixels(&response, |v: i16| v.unsigned_abs().min(255) as u8);
        Ok(frame.with_gray(magnitude))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Scharr derivative along one axis. Negative slopes saturate to black.
pub struct Gradient {
    pub axis: Axis,
}

impl Transform for Gradient {
    fn apply(&self, frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        let gray = frame.to_gray_image();
        let response = match self.axis {
            Axis::X => horizontal_scharr(&gray),
            Axis::Y => vertical_scharr(&gray),
        };
        let slope = map_subpixels(&response, |v: i16| v.clamp(0, 255) as u8);
        Ok(frame.with_gray(slope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::testing::{solid, square};
    use filter_deck_common::frame::PixelLayout;

    #[test]
    fn canny_flat_frame_has_no_edges() {
        let out = Canny::default()
            .apply(&solid(32, 32, [120, 120, 120]), &mut TransformState::default())
            .unwrap();
        assert_eq!(out.layout(), PixelLayout::Gray8);
        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn canny_finds_square_outline() {
        let out = Canny::default()
            .apply(&square(48, 48, 12, 12, 24), &mut TransformState::default())
            .unwrap();
        assert!(out.data().iter().any(|&v| v == 255));
        assert_eq!(out.dimensions(), (48, 48));
    }

    #[test]
    fn laplacian_zero_inside_flat_regions() {
        let out = Laplacian
            .apply(&square(32, 32, 8, 8, 16), &mut TransformState::default())
            .unwrap();
        let gray = out.to_gray_image();
        assert_eq!(gray.get_pixel(16, 16)[0], 0);
        assert_eq!(gray.get_pixel(2, 2)[0], 0);
        assert!(gray.get_pixel(8, 16)[0] > 0);
    }

    #[test]
    fn gradient_x_responds_to_rising_edge_only() {
        let frame = square(32, 32, 8, 8, 16);
        let out = Gradient { axis: Axis::X }
            .apply(&frame, &mut TransformState::default())
            .unwrap()
            .to_gray_image();
        // left edge of the square is dark → bright going right
        assert_eq!(out.get_pixel(8, 16)[0], 255);
        // right edge falls, saturates to zero
        assert_eq!(out.get_pixel(23, 16)[0], 0);
        // horizontal edges carry no x-gradient
        assert_eq!(out.get_pixel(16, 8)[0], 0);
    }
}
