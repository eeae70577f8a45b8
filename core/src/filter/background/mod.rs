//! Background subtraction behind a swappable model.

mod mog2;
mod running_average;

pub use mog2::Mog2;
pub use running_average::RunningAverage;

use filter_deck_common::config::{BackgroundConfig, SubtractorKind};
use filter_deck_common::frame::Frame;
use image::{GrayImage, RgbImage};
use tracing::debug;

use super::traits::Transform;
use crate::error::TransformError;
use crate::state::{BackgroundState, TransformState};

/// Mask value for a foreground pixel.
pub const FOREGROUND: u8 = 255;
/// Mask value for a pixel classified as a shadow of the background.
pub const SHADOW: u8 = 127;

/// An adaptive background model fed one frame at a time.
pub trait BackgroundSubtractor: Send {
    /// Update the model with `frame` and return its foreground mask
    /// (255 foreground, 127 shadow, 0 background).
    fn apply(&mut self, frame: &RgbImage) -> GrayImage;

    /// Frame size the model was built for.
    fn dimensions(&self) -> (u32, u32);

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Build the configured subtractor for frames of the given size.
pub fn create_subtractor(
    config: &BackgroundConfig,
    width: u32,
    height: u32,
) -> Box<dyn BackgroundSubtractor> {
    match config.algorithm {
        SubtractorKind::Mog2 => Box::new(Mog2::new(config, width, height)),
        SubtractorKind::RunningAverage => Box::new(RunningAverage::new(config, width, height)),
    }
}

/// Foreground extraction: the frame ANDed with the subtractor's mask.
/// The model is created lazily and kept across frames so it can adapt.
pub struct BackgroundFilter {
    config: BackgroundConfig,
}

impl BackgroundFilter {
    pub fn new(config: &BackgroundConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl Transform for BackgroundFilter {
    fn apply(&self, frame: &Frame, state: &mut TransformState) -> Result<Frame, TransformError> {
        let rgb = frame.to_rgb_image();

        let fresh = !matches!(
            state,
            TransformState::Background(s) if s.subtractor.dimensions() == rgb.dimensions()
        );
        if fresh {
            let subtractor = create_subtractor(&self.config, rgb.width(), rgb.height());
            debug!(
                subtractor = subtractor.name(),
                dimensions = ?rgb.dimensions(),
                "background: creating model"
            );
            *state = TransformState::Background(BackgroundState { subtractor });
        }
        let TransformState::Background(BackgroundState { subtractor }) = state else {
            unreachable!()
        };

        let mask = subtractor.apply(&rgb);
        let mut out = rgb;
        for (px, m) in out.pixels_mut().zip(mask.pixels()) {
            for c in 0..3 {
                px[c] &= m[0];
            }
        }
        Ok(frame.with_rgb(out))
    }
}
