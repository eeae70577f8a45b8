use filter_deck_common::config::BackgroundConfig;
use image::{GrayImage, Luma, RgbImage};

use super::{BackgroundSubtractor, FOREGROUND};

/// Exponential running-average background. A pixel is foreground when any
/// channel strays more than `threshold` from the average.
pub struct RunningAverage {
    width: u32,
    height: u32,
    alpha: f32,
    threshold: f32,
    background: Option<Vec<[f32; 3]>>,
}

impl RunningAverage {
    pub fn new(config: &BackgroundConfig, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            alpha: config.running_alpha.clamp(0.0, 1.0),
            threshold: config.running_threshold as f32,
            background: None,
        }
    }
}

impl BackgroundSubtractor for RunningAverage {
    fn apply(&mut self, frame: &RgbImage) -> GrayImage {
        let mut mask = GrayImage::new(self.width, self.height);
        let Some(mut background) = self.background.take() else {
            self.background = Some(frame.pixels().map(|p| p.0.map(|v| v as f32)).collect());
            return mask;
        };

        for ((px, bg), out) in frame.pixels().zip(background.iter_mut()).zip(mask.pixels_mut()) {
            let x = px.0.map(|v| v as f32);
            let moving = (0..3).any(|c| (x[c] - bg[c]).abs() > self.threshold);
            if moving {
                *out = Luma([FOREGROUND]);
            }
            for c in 0..3 {
                bg[c] += self.alpha * (x[c] - bg[c]);
            }
        }
        self.background = Some(background);
        mask
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn name(&self) -> &str {
        "running_average"
    }
}
