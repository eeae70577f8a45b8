use image::GrayImage;

use super::PointTracker;
use crate::error::TransformError;
use crate::filter::ops::to_f32;

const SINGULAR_DET: f32 = 1e-6;

/// One float level of an image pyramid.
struct Level {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Level {
    fn from_gray(img: &GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: to_f32(img),
        }
    }

    /// Bilinear sample with coordinates clamped to the border.
    fn sample(&self, x: f32, y: f32) -> f32 {
        let x = x.clamp(0.0, (self.width - 1) as f32);
        let y = y.clamp(0.0, (self.height - 1) as f32);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let at = |xx: usize, yy: usize| self.data[yy * self.width + xx];
        let top = at(x0, y0) + fx * (at(x1, y0) - at(x0, y0));
        let bottom = at(x0, y1) + fx * (at(x1, y1) - at(x0, y1));
        top + fy * (bottom - top)
    }

    /// Gaussian 1-4-6-4-1 smoothing followed by 2x decimation.
    fn downsample(&self) -> Self {
        const TAPS: [f32; 5] = [1.0, 4.0, 6.0, 4.0, 1.0];
        let (w, h) = (self.width, self.height);
        let clamp = |v: isize, n: usize| v.clamp(0, n as isize - 1) as usize;

        let mut rows = vec![0.0f32; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (k, tap) in TAPS.iter().enumerate() {
                    let sx = clamp(x as isize + k as isize - 2, w);
                    acc += tap * self.data[y * w + sx];
                }
                rows[y * w + x] = acc / 16.0;
            }
        }

        let (nw, nh) = (w.div_ceil(2), h.div_ceil(2));
        let mut data = vec![0.0f32; nw * nh];
        for ny in 0..nh {
            for nx in 0..nw {
                let (x, y) = (nx * 2, ny * 2);
                let mut acc = 0.0;
                for (k, tap) in TAPS.iter().enumerate() {
                    let sy = clamp(y as isize + k as isize - 2, h);
                    acc += tap * rows[sy * w + x];
                }
                data[ny * nw + nx] = acc / 16.0;
            }
        }
        Self {
            width: nw,
            height: nh,
            data,
        }
    }
}

fn build_pyramid(img: &GrayImage, levels: usize, min_side: usize) -> Vec<Level> {
    let mut pyramid = vec![Level::from_gray(img)];
    while pyramid.len() < levels {
        let Some(last) = pyramid.last() else { break };
        if last.width / 2 < min_side || last.height / 2 < min_side {
            break;
        }
        let next = last.downsample();
        pyramid.push(next);
    }
    pyramid
}

enum Step {
    Converged(f32, f32),
    Singular,
}

/// Pyramidal Lucas-Kanade point tracker (forward-additive formulation).
///
/// Each point is solved coarse to fine; the displacement found at one
/// level seeds the next finer one. Points whose gradient matrix is
/// singular at any level, or that end up outside the frame, are lost.
#[derive(Debug, Clone, PartialEq)]
pub struct LucasKanade {
    /// Half the square search window side.
    pub half_window: usize,
    /// Extra pyramid levels above full resolution.
    pub max_level: usize,
    pub max_iterations: usize,
    /// Stop iterating once the update step is shorter than this.
    pub epsilon: f32,
}

impl Default for LucasKanade {
    fn default() -> Self {
        Self::new(15, 2, 10, 0.03)
    }
}

impl LucasKanade {
    pub fn new(win_size: u32, max_level: u32, max_iterations: u32, epsilon: f32) -> Self {
        Self {
            half_window: (win_size / 2).max(1) as usize,
            max_level: max_level as usize,
            max_iterations: max_iterations.max(1) as usize,
            epsilon,
        }
    }

    fn track_point(&self, prev: &[Level], next: &[Level], x: f32, y: f32) -> Option<(f32, f32)> {
        let levels = prev.len().min(next.len());
        let (mut dx, mut dy) = (0.0f32, 0.0f32);

        for level in (0..levels).rev() {
            let scale = 1.0 / (1u32 << level) as f32;
            match self.refine(&prev[level], &next[level], x * scale, y * scale, dx, dy) {
                Step::Converged(ndx, ndy) => {
                    dx = ndx;
                    dy = ndy;
                }
                Step::Singular => return None,
            }
            if level > 0 {
                dx *= 2.0;
                dy *= 2.0;
            }
        }

        let (nx, ny) = (x + dx, y + dy);
        let base = &prev[0];
        let inside = nx.is_finite()
            && ny.is_finite()
            && nx >= 0.0
            && ny >= 0.0
            && nx <= (base.width - 1) as f32
            && ny <= (base.height - 1) as f32;
        inside.then_some((nx, ny))
    }

    fn refine(&self, prev: &Level, next: &Level, fx: f32, fy: f32, mut dx: f32, mut dy: f32) -> Step {
        let half = self.half_window as isize;
        let eps2 = self.epsilon * self.epsilon;

        for _ in 0..self.max_iterations {
            let (mut h00, mut h01, mut h11) = (0.0f32, 0.0f32, 0.0f32);
            let (mut b0, mut b1) = (0.0f32, 0.0f32);
            for py in -half..=half {
                for px in -half..=half {
                    let (ox, oy) = (px as f32, py as f32);
                    let template = prev.sample(fx + ox, fy + oy);
                    let wx = fx + dx + ox;
                    let wy = fy + dy + oy;
                    let err = template - next.sample(wx, wy);
                    let gx = 0.5 * (next.sample(wx + 1.0, wy) - next.sample(wx - 1.0, wy));
                    let gy = 0.5 * (next.sample(wx, wy + 1.0) - next.sample(wx, wy - 1.0));
                    h00 += gx * gx;
                    h01 += gx * gy;
                    h11 += gy * gy;
                    b0 += gx * err;
                    b1 += gy * err;
                }
            }

            let det = h00 * h11 - h01 * h01;
            if det.abs() < SINGULAR_DET {
                return Step::Singular;
            }
            let step_x = (h11 * b0 - h01 * b1) / det;
            let step_y = (h00 * b1 - h01 * b0) / det;
            dx += step_x;
            dy += step_y;
            if step_x * step_x + step_y * step_y < eps2 {
                break;
            }
        }
        Step::Converged(dx, dy)
    }
}

impl PointTracker for LucasKanade {
    fn track(
        &self,
        prev: &GrayImage,
        next: &GrayImage,
        points: &[(f32, f32)],
    ) -> Result<Vec<Option<(f32, f32)>>, TransformError> {
        if prev.dimensions() != next.dimensions() {
            return Err(TransformError::TrackingLost(format!(
                "frame size changed from {:?} to {:?}",
                prev.dimensions(),
                next.dimensions()
            )));
        }
        let min_side = 2 * self.half_window + 1;
        let levels = self.max_level + 1;
        let prev_pyr = build_pyramid(prev, levels, min_side);
        let next_pyr = build_pyramid(next, levels, min_side);

        Ok(points
            .iter()
            .map(|&(x, y)| self.track_point(&prev_pyr, &next_pyr, x, y))
            .collect())
    }
}
