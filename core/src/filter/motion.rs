use filter_deck_common::frame::Frame;
use image::GrayImage;
use tracing::debug;

use super::traits::Transform;
use crate::error::TransformError;
use crate::state::{MotionState, TransformState};

/// Absolute difference between consecutive grayscale frames.
///
/// The first frame after a reset, and any frame whose size differs from the
/// stored one, only seeds the history and is returned unchanged.
pub struct MotionDiff;

impl Transform for MotionDiff {
    fn apply(&self, frame: &Frame, state: &mut TransformState) -> Result<Frame, TransformError> {
        let gray = frame.to_gray_image();

        let seeded = matches!(
            state,
            TransformState::Motion(s) if s.previous.dimensions() == gray.dimensions()
        );
        if !seeded {
            debug!(dimensions = ?gray.dimensions(), "motion: seeding previous frame");
            *state = TransformState::Motion(MotionState { previous: gray });
            return Ok(frame.clone());
        }
        let TransformState::Motion(MotionState { previous }) = state else {
            unreachable!()
        };

        let diff = abs_diff(&gray, previous);
        *previous = gray;
        Ok(frame.with_gray(diff))
    }
}

fn abs_diff(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let mut out = GrayImage::new(a.width(), a.height());
    for ((dst, &x), &y) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
        *dst = x.abs_diff(y);
    }
    out
}
