//! Sparse optical flow: Shi-Tomasi corners tracked with pyramidal
//! Lucas-Kanade, drawn as coloured trails over the live frame.

pub mod gftt;
pub mod lk;

use filter_deck_common::config::OpticalFlowConfig;
use filter_deck_common::frame::Frame;
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use self::gftt::{good_features_to_track, CornerParams};
use self::lk::LucasKanade;
use super::ops::saturating_add;
use super::traits::Transform;
use crate::error::TransformError;
use crate::state::{OpticalFlowState, TransformState};

const PALETTE_SIZE: usize = 100;
const MARKER_RADIUS: i32 = 5;

/// Follows points from one grayscale frame to the next.
///
/// Returns one entry per input point; `None` marks a point that was lost.
/// An `Err` means the whole batch failed.
pub trait PointTracker: Send + Sync {
    fn track(
        &self,
        prev: &GrayImage,
        next: &GrayImage,
        points: &[(f32, f32)],
    ) -> Result<Vec<Option<(f32, f32)>>, TransformError>;
}

/// Fixed set of track colours, indexed modulo its length.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

impl Palette {
    pub fn random(seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let colors = (0..PALETTE_SIZE)
            .map(|_| Rgb([rng.gen(), rng.gen(), rng.gen()]))
            .collect();
        Self { colors }
    }

    pub fn color(&self, index: usize) -> Rgb<u8> {
        self.colors[index % self.colors.len()]
    }
}

/// Immutable optical-flow parameters, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowParams {
    pub corners: CornerParams,
    pub tracker: LucasKanade,
    pub palette: Palette,
}

impl FlowParams {
    pub fn from_config(config: &OpticalFlowConfig) -> Self {
        Self {
            corners: CornerParams {
                max_corners: config.max_corners,
                quality_level: config.quality_level,
                min_distance: config.min_distance,
                block_size: config.block_size,
            },
            tracker: LucasKanade::new(
                config.win_size,
                config.max_level,
                config.max_iterations,
                config.epsilon,
            ),
            palette: Palette::random(config.palette_seed),
        }
    }
}

impl Default for FlowParams {
    fn default() -> Self {
        Self::from_config(&OpticalFlowConfig::default())
    }
}

/// Tracks corners across frames and overlays their accumulated paths.
///
/// The first frame after a reset (or a size change) only picks the corners
/// and is returned unchanged. Each later frame tracks the surviving points,
/// extends the trail and marks current positions.
pub struct OpticalFlowFilter {
    corners: CornerParams,
    palette: Palette,
    tracker: Box<dyn PointTracker>,
}

impl OpticalFlowFilter {
    pub fn new(params: &FlowParams) -> Self {
        Self::with_tracker(params, Box::new(params.tracker.clone()))
    }

    pub fn with_tracker(params: &FlowParams, tracker: Box<dyn PointTracker>) -> Self {
        Self {
            corners: params.corners.clone(),
            palette: params.palette.clone(),
            tracker,
        }
    }
}

impl Transform for OpticalFlowFilter {
    fn apply(&self, frame: &Frame, state: &mut TransformState) -> Result<Frame, TransformError> {
        let gray = frame.to_gray_image();
        let (width, height) = gray.dimensions();

        let seeded = matches!(
            state,
            TransformState::OpticalFlow(s) if s.previous.dimensions() == (width, height)
        );
        if !seeded {
            let points = good_features_to_track(&gray, &self.corners);
            if points.is_empty() {
                return Err(TransformError::TrackingLost(
                    "no corners found to track".into(),
                ));
            }
            debug!(points = points.len(), width, height, "optical flow: seeded");
            *state = TransformState::OpticalFlow(OpticalFlowState {
                previous: gray,
                points,
                trail: RgbImage::new(width, height),
            });
            return Ok(frame.clone());
        }
        let TransformState::OpticalFlow(flow) = state else {
            unreachable!()
        };

        let tracked = self.tracker.track(&flow.previous, &gray, &flow.points)?;
        let moves: Vec<((f32, f32), (f32, f32))> = flow
            .points
            .iter()
            .zip(tracked)
            .filter_map(|(&old, new)| new.map(|new| (old, new)))
            .collect();
        if moves.is_empty() {
            return Err(TransformError::TrackingLost(format!(
                "all {} points lost",
                flow.points.len()
            )));
        }

        let mut canvas = frame.to_rgb_image();
        for (i, &(old, new)) in moves.iter().enumerate() {
            let color = self.palette.color(i);
            draw_line_segment_mut(&mut flow.trail, new, old, color);
            draw_line_segment_mut(&mut flow.trail, (new.0 + 1.0, new.1), (old.0 + 1.0, old.1), color);
            let center = (new.0.round() as i32, new.1.round() as i32);
            draw_filled_circle_mut(&mut canvas, center, MARKER_RADIUS, color);
        }
        if moves.len() < flow.points.len() {
            debug!(
                kept = moves.len(),
                lost = flow.points.len() - moves.len(),
                "optical flow: points dropped"
            );
        }

        flow.previous = gray;
        flow.points = moves.into_iter().map(|(_, new)| new).collect();
        Ok(frame.with_rgb(saturating_add(&canvas, &flow.trail)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::testing::{checkerboard_shifted, solid};

    struct FailingTracker;

    impl PointTracker for FailingTracker {
        fn track(
            &self,
            _prev: &GrayImage,
            _next: &GrayImage,
            _points: &[(f32, f32)],
        ) -> Result<Vec<Option<(f32, f32)>>, TransformError> {
            Err(TransformError::TrackingLost("forced".into()))
        }
    }

    struct LosesEverything;

    impl PointTracker for LosesEverything {
        fn track(
            &self,
            _prev: &GrayImage,
            _next: &GrayImage,
            points: &[(f32, f32)],
        ) -> Result<Vec<Option<(f32, f32)>>, TransformError> {
            Ok(vec![None; points.len()])
        }
    }

    fn params() -> FlowParams {
        FlowParams::from_config(&OpticalFlowConfig {
            palette_seed: Some(11),
            ..OpticalFlowConfig::default()
        })
    }

    #[test]
    fn seeded_palette_is_reproducible() {
        let a = Palette::random(Some(3));
        let b = Palette::random(Some(3));
        assert_eq!(a, b);
        assert_eq!(a.colors.len(), PALETTE_SIZE);
        assert_eq!(a.color(0), a.color(100));
    }

    #[test]
    fn first_frame_seeds_and_passes_through() {
        let filter = OpticalFlowFilter::new(&params());
        let mut state = TransformState::default();
        let frame = checkerboard_shifted(64, 64, 16, 0, 0);
        assert_eq!(filter.apply(&frame, &mut state).unwrap(), frame);
        let TransformState::OpticalFlow(flow) = &state else {
            panic!("expected optical flow state, got {state:?}");
        };
        assert!(!flow.points.is_empty());
        assert!(flow.trail.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn second_frame_draws_overlay() {
        let filter = OpticalFlowFilter::new(&params());
        let mut state = TransformState::default();
        let f1 = checkerboard_shifted(64, 64, 16, 0, 0);
        let f2 = checkerboard_shifted(64, 64, 16, 1, 1);
        filter.apply(&f1, &mut state).unwrap();
        let out = filter.apply(&f2, &mut state).unwrap();
        assert_ne!(out, f2);
        assert_eq!(out.dimensions(), f2.dimensions());
        assert_eq!(out.seq, f2.seq);
    }

    #[test]
    fn trail_accumulates_across_frames() {
        let filter = OpticalFlowFilter::new(&params());
        let mut state = TransformState::default();
        let lit = |state: &TransformState| -> Vec<(u32, u32)> {
            let TransformState::OpticalFlow(flow) = state else {
                panic!("expected optical flow state, got {state:?}");
            };
            flow.trail
                .enumerate_pixels()
                .filter(|(_, _, p)| p.0 != [0, 0, 0])
                .map(|(x, y, _)| (x, y))
                .collect()
        };

        for shift in 0..2 {
            let frame = checkerboard_shifted(64, 64, 16, shift, shift);
            filter.apply(&frame, &mut state).unwrap();
        }
        let after_second = lit(&state);
        assert!(!after_second.is_empty());

        filter
            .apply(&checkerboard_shifted(64, 64, 16, 2, 2), &mut state)
            .unwrap();
        let after_third = lit(&state);
        assert!(after_third.len() >= after_second.len());
        let TransformState::OpticalFlow(flow) = &state else {
            unreachable!()
        };
        for &(x, y) in &after_second {
            assert_ne!(flow.trail.get_pixel(x, y).0, [0, 0, 0], "trail erased at ({x}, {y})");
        }
    }

    #[test]
    fn featureless_frame_fails_to_seed() {
        let filter = OpticalFlowFilter::new(&params());
        let mut state = TransformState::default();
        let err = filter
            .apply(&solid(32, 32, [50, 50, 50]), &mut state)
            .unwrap_err();
        assert!(matches!(err, TransformError::TrackingLost(_)));
        assert!(state.is_uninitialized());
    }

    #[test]
    fn tracker_failure_propagates() {
        let filter = OpticalFlowFilter::with_tracker(&params(), Box::new(FailingTracker));
        let mut state = TransformState::default();
        let frame = checkerboard_shifted(64, 64, 16, 0, 0);
        filter.apply(&frame, &mut state).unwrap();
        let err = filter.apply(&frame, &mut state).unwrap_err();
        assert_eq!(err, TransformError::TrackingLost("forced".into()));
    }

    #[test]
    fn losing_every_point_is_an_error() {
        let filter = OpticalFlowFilter::with_tracker(&params(), Box::new(LosesEverything));
        let mut state = TransformState::default();
        let frame = checkerboard_shifted(64, 64, 16, 0, 0);
        filter.apply(&frame, &mut state).unwrap();
        assert!(matches!(
            filter.apply(&frame, &mut state),
            Err(TransformError::TrackingLost(_))
        ));
    }

    #[test]
    fn resize_reseeds() {
        let filter = OpticalFlowFilter::new(&params());
        let mut state = TransformState::default();
        filter
            .apply(&checkerboard_shifted(64, 64, 16, 0, 0), &mut state)
            .unwrap();
        let bigger = checkerboard_shifted(80, 64, 16, 0, 0);
        assert_eq!(filter.apply(&bigger, &mut state).unwrap(), bigger);
        let TransformState::OpticalFlow(flow) = &state else {
            panic!("expected optical flow state");
        };
        assert_eq!(flow.trail.dimensions(), (80, 64));
    }
}
