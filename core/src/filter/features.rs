//! Keypoint detectors drawn as "rich" keypoints: a circle the size of the
//! feature plus a radius line along its orientation.

use filter_deck_common::frame::Frame;
use image::imageops::{resize, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::corners::corners_fast9;
use imageproc::definitions::Image;
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use imageproc::filter::gaussian_blur_f32;
use imageproc::integral_image::{integral_image, sum_image_pixels};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::traits::Transform;
use crate::error::TransformError;
use crate::state::TransformState;

/// Keypoint colour, RGB.
pub const KEYPOINT_COLOR: Rgb<u8> = Rgb([236, 163, 51]);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the meaningful neighbourhood.
    pub size: f32,
    /// Orientation in radians, when the detector computes one.
    pub angle: Option<f32>,
    pub response: f32,
}

pub fn draw_rich_keypoints(canvas: &mut RgbImage, keypoints: &[KeyPoint], color: Rgb<u8>) {
    for kp in keypoints {
        let radius = (kp.size / 2.0).round().max(1.0);
        let center = (kp.x.round() as i32, kp.y.round() as i32);
        draw_hollow_circle_mut(canvas, center, radius as i32, color);
        if let Some(angle) = kp.angle {
            let tip = (kp.x + radius * angle.cos(), kp.y + radius * angle.sin());
            draw_line_segment_mut(canvas, (kp.x, kp.y), tip, color);
        }
    }
}

// -- ORB ----------------------------------------------------------------------

/// Oriented FAST keypoints over a small scale pyramid.
pub struct Orb {
    pub max_features: usize,
    pub levels: u32,
    pub scale_factor: f32,
    pub fast_threshold: u8,
}

impl Default for Orb {
    fn default() -> Self {
        Self {
            max_features: 500,
            levels: 3,
            scale_factor: 1.2,
            fast_threshold: 20,
        }
    }
}

const ORB_PATCH: u32 = 31;
const ORB_RADIUS: i32 = (ORB_PATCH / 2) as i32;

impl Orb {
    pub fn detect(&self, gray: &GrayImage) -> Vec<KeyPoint> {
        let mut keypoints = Vec::new();
        for level in 0..self.levels {
            let scale = self.scale_factor.powi(level as i32);
            let w = (gray.width() as f32 / scale).round() as u32;
            let h = (gray.height() as f32 / scale).round() as u32;
            if w <= ORB_PATCH || h <= ORB_PATCH {
                break;
            }
            let scaled = if level == 0 {
                gray.clone()
            } else {
                resize(gray, w, h, FilterType::Triangle)
            };
            for corner in corners_fast9(&scaled, self.fast_threshold) {
                let (cx, cy) = (corner.x as i32, corner.y as i32);
                if cx < ORB_RADIUS
                    || cy < ORB_RADIUS
                    || cx >= w as i32 - ORB_RADIUS
                    || cy >= h as i32 - ORB_RADIUS
                {
                    continue;
                }
                keypoints.push(KeyPoint {
                    x: corner.x as f32 * scale,
                    y: corner.y as f32 * scale,
                    size: ORB_PATCH as f32 * scale,
                    angle: Some(intensity_centroid_angle(&scaled, cx, cy)),
                    response: corner.score,
                });
            }
        }
        keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
        keypoints.truncate(self.max_features);
        keypoints
    }
}

/// Orientation from the intensity centroid of a circular patch.
fn intensity_centroid_angle(img: &GrayImage, cx: i32, cy: i32) -> f32 {
    let (mut m10, mut m01) = (0.0f32, 0.0f32);
    for dy in -ORB_RADIUS..=ORB_RADIUS {
        for dx in -ORB_RADIUS..=ORB_RADIUS {
            if dx * dx + dy * dy > ORB_RADIUS * ORB_RADIUS {
                continue;
            }
            let v = img.get_pixel((cx + dx) as u32, (cy + dy) as u32)[0] as f32;
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    m01.atan2(m10)
}

impl Transform for Orb {
    fn apply(&self, frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        let keypoints = self.detect(&frame.to_gray_image());
        let mut out = frame.to_rgb_image();
        draw_rich_keypoints(&mut out, &keypoints, KEYPOINT_COLOR);
        Ok(frame.with_rgb(out))
    }
}

// -- STAR + BRIEF -------------------------------------------------------------

const BRIEF_PATCH_HALF: i32 = 24;
const BRIEF_KERNEL_HALF: i32 = 4;
const BRIEF_BYTES: usize = 32;
const BRIEF_SEED: u64 = 0x5eed_b41e;

/// Centre-surround (CenSurE-style) detector feeding BRIEF descriptors.
/// Only keypoints that receive a descriptor are drawn.
pub struct StarBrief {
    scales: Vec<i64>,
    response_threshold: f32,
    max_features: usize,
    pattern: Vec<((i32, i32), (i32, i32))>,
}

impl Default for StarBrief {
    fn default() -> Self {
        let mut rng = StdRng::seed_from_u64(BRIEF_SEED);
        let span = BRIEF_PATCH_HALF - 1;
        let pattern = (0..BRIEF_BYTES * 8)
            .map(|_| {
                (
                    (rng.gen_range(-span..=span), rng.gen_range(-span..=span)),
                    (rng.gen_range(-span..=span), rng.gen_range(-span..=span)),
                )
            })
            .collect();
        Self {
            scales: vec![2, 3, 4, 6],
            response_threshold: 12.0,
            max_features: 500,
            pattern,
        }
    }
}

impl StarBrief {
    /// Local extrema of `mean(inner box) - mean(surrounding ring)`.
    pub fn detect(&self, gray: &GrayImage) -> Vec<KeyPoint> {
        let (w, h) = (gray.width() as i64, gray.height() as i64);
        let integral: Image<Luma<u64>> = integral_image(gray);
        let sum = |x0: i64, y0: i64, x1: i64, y1: i64| {
            sum_image_pixels(&integral, x0 as u32, y0 as u32, x1 as u32, y1 as u32)[0] as f64
        };
        let outer_max = self.scales.iter().copied().max().unwrap_or(1) * 2;

        let mut best = vec![(0.0f32, 0i64); (w * h) as usize];
        for y in outer_max..(h - outer_max) {
            for x in outer_max..(w - outer_max) {
                let mut pick = (0.0f32, 0i64);
                for &s in &self.scales {
                    let inner = sum(x - s, y - s, x + s, y + s);
                    let outer = sum(x - 2 * s, y - 2 * s, x + 2 * s, y + 2 * s);
                    let inner_area = ((2 * s + 1) * (2 * s + 1)) as f64;
                    let ring_area = ((4 * s + 1) * (4 * s + 1)) as f64 - inner_area;
                    let r = (inner / inner_area - (outer - inner) / ring_area) as f32;
                    if r.abs() > pick.0.abs() {
                        pick = (r, s);
                    }
                }
                best[(y * w + x) as usize] = pick;
            }
        }

        let mut keypoints = Vec::new();
        for y in (outer_max + 1)..(h - outer_max - 1) {
            for x in (outer_max + 1)..(w - outer_max - 1) {
                let (r, s) = best[(y * w + x) as usize];
                if r.abs() < self.response_threshold {
                    continue;
                }
                // ties go to the first pixel of a plateau in raster order
                let is_peak = (-1..=1).all(|dy: i64| {
                    (-1..=1).all(|dx: i64| {
                        let n = best[((y + dy) * w + x + dx) as usize].0.abs();
                        let earlier = dy < 0 || (dy == 0 && dx < 0);
                        (dx == 0 && dy == 0) || n < r.abs() || (n == r.abs() && !earlier)
                    })
                });
                if is_peak {
                    keypoints.push(KeyPoint {
                        x: x as f32,
                        y: y as f32,
                        size: (4 * s + 1) as f32,
                        angle: None,
                        response: r.abs(),
                    });
                }
            }
        }
        keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
        keypoints.truncate(self.max_features);
        keypoints
    }

    /// BRIEF binary descriptors. Keypoints too close to the border for the
    /// sampling patch are dropped.
    pub fn compute(
        &self,
        gray: &GrayImage,
        keypoints: Vec<KeyPoint>,
    ) -> Vec<(KeyPoint, [u8; BRIEF_BYTES])> {
        let smoothed = gaussian_blur_f32(gray, 2.0);
        let margin = (BRIEF_PATCH_HALF + BRIEF_KERNEL_HALF) as f32;
        let (w, h) = (gray.width() as f32, gray.height() as f32);
        keypoints
            .into_iter()
            .filter(|kp| kp.x >= margin && kp.y >= margin && kp.x < w - margin && kp.y < h - margin)
            .map(|kp| {
                let (cx, cy) = (kp.x as i32, kp.y as i32);
                let mut descriptor = [0u8; BRIEF_BYTES];
                for (bit, &((ax, ay), (bx, by))) in self.pattern.iter().enumerate() {
                    let a = smoothed.get_pixel((cx + ax) as u32, (cy + ay) as u32)[0];
                    let b = smoothed.get_pixel((cx + bx) as u32, (cy + by) as u32)[0];
                    if a < b {
                        descriptor[bit / 8] |= 1 << (bit % 8);
                    }
                }
                (kp, descriptor)
            })
            .collect()
    }
}

impl Transform for StarBrief {
    fn apply(&self, frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        let gray = frame.to_gray_image();
        let described = self.compute(&gray, self.detect(&gray));
        let keypoints: Vec<KeyPoint> = described.into_iter().map(|(kp, _)| kp).collect();
        let mut out = frame.to_rgb_image();
        draw_rich_keypoints(&mut out, &keypoints, KEYPOINT_COLOR);
        Ok(frame.with_rgb(out))
    }
}

// -- Patented detectors -------------------------------------------------------

/// SIFT and SURF are patent-encumbered and not compiled into this build.
/// The slot stays in the registry so the filter order matches the classic
/// demo, but every frame degrades to the unmodified input.
pub struct Patented {
    pub algorithm: &'static str,
}

impl Patented {
    fn unavailable(&self) -> TransformError {
        TransformError::Unavailable(format!(
            "{} is patented and not built into this binary",
            self.algorithm
        ))
    }
}

impl Transform for Patented {
    fn apply(&self, _frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        Err(self.unavailable())
    }

    fn availability(&self) -> Result<(), TransformError> {
        Err(self.unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::testing::{solid, square};

    #[test]
    fn orb_finds_square_corners() {
        let gray = square(96, 96, 30, 30, 36).to_gray_image();
        let kps = Orb::default().detect(&gray);
        assert!(!kps.is_empty());
        assert!(kps.len() <= 500);
        assert!(kps.iter().all(|kp| kp.angle.is_some()));
        // sorted strongest first
        assert!(kps.windows(2).all(|p| p[0].response >= p[1].response));
    }

    #[test]
    fn orb_flat_frame_unchanged() {
        let frame = solid(64, 64, [100, 100, 100]);
        let out = Orb::default()
            .apply(&frame, &mut TransformState::default())
            .unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn star_detects_blob() {
        let gray = square(80, 80, 36, 36, 8).to_gray_image();
        let kps = StarBrief::default().detect(&gray);
        assert!(!kps.is_empty());
        let kp = kps[0];
        assert!((kp.x - 39.5).abs() <= 3.0 && (kp.y - 39.5).abs() <= 3.0);
    }

    #[test]
    fn brief_drops_border_keypoints() {
        let gray = solid(80, 80, [0, 0, 0]).to_gray_image();
        let star = StarBrief::default();
        let near_border = KeyPoint {
            x: 5.0,
            y: 40.0,
            size: 9.0,
            angle: None,
            response: 1.0,
        };
        let centred = KeyPoint { x: 40.0, ..near_border };
        let described = star.compute(&gray, vec![near_border, centred]);
        assert_eq!(described.len(), 1);
        assert_eq!(described[0].0.x, 40.0);
    }

    #[test]
    fn brief_pattern_is_stable() {
        assert_eq!(StarBrief::default().pattern, StarBrief::default().pattern);
    }

    #[test]
    fn patented_reports_unavailable() {
        let sift = Patented { algorithm: "SIFT" };
        assert!(matches!(sift.availability(), Err(TransformError::Unavailable(_))));
        let err = sift
            .apply(&solid(8, 8, [0, 0, 0]), &mut TransformState::default())
            .unwrap_err();
        assert!(err.to_string().contains("SIFT"));
    }

    #[test]
    fn rich_keypoint_draws_ring() {
        let mut canvas = RgbImage::new(40, 40);
        let kp = KeyPoint {
            x: 20.0,
            y: 20.0,
            size: 20.0,
            angle: Some(0.0),
            response: 1.0,
        };
        draw_rich_keypoints(&mut canvas, &[kp], KEYPOINT_COLOR);
        assert_eq!(canvas.get_pixel(30, 20), &KEYPOINT_COLOR);
        assert_eq!(canvas.get_pixel(25, 20), &KEYPOINT_COLOR);
        assert_eq!(canvas.get_pixel(20, 26), &Rgb([0, 0, 0]));
    }
}
