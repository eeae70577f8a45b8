use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::map::map_subpixels;

use crate::filter::ops::{dilate3x3, structure_tensor, Response};

/// Shi-Tomasi "good features to track" parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerParams {
    pub max_corners: usize,
    /// Fraction of the strongest corner's score a candidate must reach.
    pub quality_level: f32,
    pub min_distance: f32,
    pub block_size: u32,
}

/// Strongest corners by minimum structure-tensor eigenvalue, at most
/// `max_corners`, no two closer than `min_distance`.
pub fn good_features_to_track(gray: &GrayImage, params: &CornerParams) -> Vec<(f32, f32)> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let block = params.block_size.max(3) | 1;
    let border = (block / 2) as usize + 1;
    if w <= 2 * border || h <= 2 * border {
        return Vec::new();
    }

    let ix: Response = map_subpixels(&horizontal_sobel(gray), |g: i16| g as f32);
    let iy: Response = map_subpixels(&vertical_sobel(gray), |g: i16| g as f32);
    let [sxx, syy, sxy] = structure_tensor(&ix, &iy, block);

    let score: Vec<f32> = (0..w * h)
        .map(|i| {
            let (a, b, c) = (sxx[i], syy[i], sxy[i]);
            0.5 * ((a + b) - ((a - b) * (a - b) + 4.0 * c * c).sqrt())
        })
        .collect();
    let peaks = dilate3x3(&score, w, h);

    let mut max_score = 0.0f32;
    for y in border..h - border {
        for x in border..w - border {
            max_score = max_score.max(score[y * w + x]);
        }
    }
    if max_score <= 0.0 {
        return Vec::new();
    }
    let threshold = max_score * params.quality_level;

    let mut candidates = Vec::new();
    for y in border..h - border {
        for x in border..w - border {
            let s = score[y * w + x];
            if s >= threshold && s >= peaks[y * w + x] {
                candidates.push((x, y, s));
            }
        }
    }
    candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

    let min_dist2 = params.min_distance * params.min_distance;
    let mut corners: Vec<(f32, f32)> = Vec::new();
    for (x, y, _) in candidates {
        if corners.len() >= params.max_corners {
            break;
        }
        let (fx, fy) = (x as f32, y as f32);
        let too_close = corners
            .iter()
            .any(|&(cx, cy)| (cx - fx) * (cx - fx) + (cy - fy) * (cy - fy) < min_dist2);
        if !too_close {
            corners.push((fx, fy));
        }
    }
    corners
}
