use std::fmt;

use image::{GrayImage, RgbImage};

use crate::filter::background::BackgroundSubtractor;

/// Cross-frame memory of the selected filter.
///
/// Every stateful transform walks the same cycle:
/// `Uninitialized → Seeded → Seeded(updated) → … → Uninitialized`.
/// The session drops back to `Uninitialized` on every selection change and on
/// every degraded frame; the transforms themselves reseed on a shape change.
#[derive(Default)]
pub enum TransformState {
    #[default]
    Uninitialized,
    Motion(MotionState),
    Background(BackgroundState),
    OpticalFlow(OpticalFlowState),
}

impl TransformState {
    pub fn reset(&mut self) {
        *self = TransformState::Uninitialized;
    }

    pub fn is_uninitialized(&self) -> bool {
        matches!(self, TransformState::Uninitialized)
    }
}

impl fmt::Debug for TransformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformState::Uninitialized => f.write_str("Uninitialized"),
            TransformState::Motion(s) => f
                .debug_struct("Motion")
                .field("dimensions", &s.previous.dimensions())
                .finish(),
            TransformState::Background(s) => f
                .debug_struct("Background")
                .field("subtractor", &s.subtractor.name())
                .field("dimensions", &s.subtractor.dimensions())
                .finish(),
            TransformState::OpticalFlow(s) => f
                .debug_struct("OpticalFlow")
                .field("dimensions", &s.previous.dimensions())
                .field("points", &s.points.len())
                .finish(),
        }
    }
}

/// Previous grayscale frame for frame differencing.
pub struct MotionState {
    pub previous: GrayImage,
}

/// Adaptive background model, created on first use.
pub struct BackgroundState {
    pub subtractor: Box<dyn BackgroundSubtractor>,
}

/// Lucas-Kanade history: last grayscale frame, surviving track points and
/// the trail overlay that accumulates across frames.
pub struct OpticalFlowState {
    pub previous: GrayImage,
    pub points: Vec<(f32, f32)>,
    pub trail: RgbImage,
}
