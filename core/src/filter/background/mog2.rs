use filter_deck_common::config::BackgroundConfig;
use image::{GrayImage, Luma, RgbImage};

use super::{BackgroundSubtractor, FOREGROUND, SHADOW};

const MAX_MODES: usize = 5;
const BACKGROUND_RATIO: f32 = 0.9;
/// Match threshold (in variances) for updating an existing mode.
const VAR_GEN: f32 = 9.0;
const VAR_INIT: f32 = 15.0;
const VAR_MIN: f32 = 4.0;
const VAR_MAX: f32 = 5.0 * VAR_INIT;
/// Complexity-reduction prior: weak modes decay to nothing and are dropped.
const CT: f32 = 0.05;
/// Minimum brightness ratio for a pixel to count as a shadow.
const SHADOW_TAU: f32 = 0.5;

#[derive(Debug, Clone, Copy, Default)]
struct Mode {
    weight: f32,
    mean: [f32; 3],
    var: f32,
}

/// Adaptive Gaussian mixture background model (Zivkovic's MOG2).
///
/// Each pixel keeps up to five isotropic RGB Gaussians ordered by weight.
/// The leading modes whose weights add up to `BACKGROUND_RATIO` describe the
/// background; a pixel within `var_threshold` variances of one of them is
/// background.
pub struct Mog2 {
    width: u32,
    height: u32,
    history: u32,
    var_threshold: f32,
    detect_shadows: bool,
    learning_rate: f32,
    frames_seen: u32,
    modes: Vec<Mode>,
    used: Vec<u8>,
}

impl Mog2 {
    pub fn new(config: &BackgroundConfig, width: u32, height: u32) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            history: config.history.max(1),
            var_threshold: config.var_threshold,
            detect_shadows: config.detect_shadows,
            learning_rate: config.learning_rate,
            frames_seen: 0,
            modes: vec![Mode::default(); pixels * MAX_MODES],
            used: vec![0; pixels],
        }
    }

    fn alpha(&self) -> f32 {
        if self.learning_rate >= 0.0 {
            self.learning_rate.min(1.0)
        } else {
            1.0 / self.frames_seen.min(self.history).max(1) as f32
        }
    }

    /// Update one pixel's mixture and classify it.
    fn update_pixel(&self, modes: &mut [Mode], used: &mut u8, x: [f32; 3], alpha: f32) -> u8 {
        let n = *used as usize;
        let mut total = 0.0f32;
        let mut background = false;
        let mut matched = None;
        for (k, mode) in modes[..n].iter().enumerate() {
            if matched.is_none() {
                let d2 = dist2(x, mode.mean);
                if total < BACKGROUND_RATIO && d2 < self.var_threshold * mode.var {
                    background = true;
                }
                if d2 < VAR_GEN * mode.var {
                    matched = Some(k);
                }
            }
            total += mode.weight;
        }

        let label = if background {
            0
        } else if self.detect_shadows && self.is_shadow(&modes[..n], x) {
            SHADOW
        } else {
            FOREGROUND
        };

        // decay every mode, reinforce the matched one
        let mut kept = 0;
        for k in 0..n {
            let mut mode = modes[k];
            mode.weight = (1.0 - alpha) * mode.weight - alpha * CT;
            if matched == Some(k) {
                mode.weight += alpha;
                let rate = alpha / mode.weight.max(f32::EPSILON);
                let d2 = dist2(x, mode.mean);
                for c in 0..3 {
                    mode.mean[c] += rate * (x[c] - mode.mean[c]);
                }
                mode.var = (mode.var + rate * (d2 - mode.var)).clamp(VAR_MIN, VAR_MAX);
            }
            if mode.weight > 0.0 {
                modes[kept] = mode;
                kept += 1;
            }
        }

        if matched.is_none() || kept == 0 {
            let slot = kept.min(MAX_MODES - 1);
            modes[slot] = Mode {
                weight: if kept == 0 { 1.0 } else { alpha },
                mean: x,
                var: VAR_INIT,
            };
            kept = slot + 1;
        }

        let sum: f32 = modes[..kept].iter().map(|m| m.weight).sum();
        for mode in &mut modes[..kept] {
            mode.weight /= sum;
        }
        modes[..kept].sort_by(|a, b| b.weight.total_cmp(&a.weight));
        *used = kept as u8;
        label
    }

    /// A darker copy of a background mode (same chromaticity, brightness
    /// ratio in `[SHADOW_TAU, 1]`) is a shadow rather than an object.
    fn is_shadow(&self, modes: &[Mode], x: [f32; 3]) -> bool {
        let mut total = 0.0f32;
        for mode in modes {
            let norm2 = dot(mode.mean, mode.mean);
            if norm2 > 0.0 {
                let a = dot(x, mode.mean) / norm2;
                if (SHADOW_TAU..=1.0).contains(&a) {
                    let scaled = mode.mean.map(|m| a * m);
                    if dist2(x, scaled) < self.var_threshold * mode.var * a * a {
                        return true;
                    }
                }
            }
            total += mode.weight;
            if total > BACKGROUND_RATIO {
                break;
            }
        }
        false
    }
}

impl BackgroundSubtractor for Mog2 {
    fn apply(&mut self, frame: &RgbImage) -> GrayImage {
        self.frames_seen = self.frames_seen.saturating_add(1);
        let alpha = self.alpha();

        let mut modes = std::mem::take(&mut self.modes);
        let mut used = std::mem::take(&mut self.used);
        let mut mask = GrayImage::new(self.width, self.height);
        for (i, (px, out)) in frame.pixels().zip(mask.pixels_mut()).enumerate() {
            let x = px.0.map(|v| v as f32);
            let pixel_modes = &mut modes[i * MAX_MODES..(i + 1) * MAX_MODES];
            *out = Luma([self.update_pixel(pixel_modes, &mut used[i], x, alpha)]);
        }
        self.modes = modes;
        self.used = used;
        mask
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn name(&self) -> &str {
        "mog2"
    }
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn dist2(a: [f32; 3], b: [f32; 3]) -> f32 {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    dot(d, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn model(width: u32, height: u32) -> Mog2 {
        Mog2::new(&BackgroundConfig::default(), width, height)
    }

    #[test]
    fn first_frame_is_all_foreground() {
        let mut mog = model(4, 4);
        let mask = mog.apply(&RgbImage::from_pixel(4, 4, Rgb([50, 50, 50])));
        assert!(mask.iter().all(|&v| v == FOREGROUND));
    }

    #[test]
    fn repeated_frame_becomes_background() {
        let mut mog = model(4, 4);
        let frame = RgbImage::from_pixel(4, 4, Rgb([50, 60, 70]));
        mog.apply(&frame);
        let mask = mog.apply(&frame);
        assert!(mask.iter().all(|&v| v == 0));
    }

    #[test]
    fn darker_copy_is_shadow() {
        let mut mog = model(2, 2);
        let bright = RgbImage::from_pixel(2, 2, Rgb([200, 160, 120]));
        for _ in 0..20 {
            mog.apply(&bright);
        }
        let shaded = RgbImage::from_pixel(2, 2, Rgb([140, 112, 84]));
        let mask = mog.apply(&shaded);
        assert!(mask.iter().all(|&v| v == SHADOW));
    }

    #[test]
    fn shadows_disabled_reports_foreground() {
        let config = BackgroundConfig {
            detect_shadows: false,
            ..BackgroundConfig::default()
        };
        let mut mog = Mog2::new(&config, 2, 2);
        let bright = RgbImage::from_pixel(2, 2, Rgb([200, 160, 120]));
        for _ in 0..20 {
            mog.apply(&bright);
        }
        let mask = mog.apply(&RgbImage::from_pixel(2, 2, Rgb([140, 112, 84])));
        assert!(mask.iter().all(|&v| v == FOREGROUND));
    }

    #[test]
    fn new_object_is_absorbed_over_time() {
        let config = BackgroundConfig {
            history: 10,
            ..BackgroundConfig::default()
        };
        let mut mog = Mog2::new(&config, 1, 1);
        for _ in 0..20 {
            mog.apply(&RgbImage::from_pixel(1, 1, Rgb([20, 20, 20])));
        }
        let object = RgbImage::from_pixel(1, 1, Rgb([220, 30, 30]));
        assert_eq!(mog.apply(&object).get_pixel(0, 0)[0], FOREGROUND);
        for _ in 0..60 {
            mog.apply(&object);
        }
        assert_eq!(mog.apply(&object).get_pixel(0, 0)[0], 0);
    }
}
