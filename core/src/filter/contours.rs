use filter_deck_common::frame::Frame;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{find_contours, Contour};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

use super::traits::Transform;
use crate::error::TransformError;
use crate::state::TransformState;

/// Binarises the frame at several levels and repaints every contour with the
/// mean colour it encloses, outlined in black.
pub struct MeanColorContours {
    pub thresholds: Vec<u8>,
}

impl Default for MeanColorContours {
    fn default() -> Self {
        Self {
            thresholds: vec![15, 50, 100, 240],
        }
    }
}

impl Transform for MeanColorContours {
    fn apply(&self, frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        let gray = frame.to_gray_image();
        let source = frame.to_rgb_image();
        let mut out = source.clone();
        let mut mask = GrayImage::new(gray.width(), gray.height());

        for &level in &self.thresholds {
            let binary = binarize(&gray, level);
            let contours = find_contours::<i32>(&binary);
            for contour in &contours {
                let Some(poly) = polygon(contour) else {
                    continue;
                };
                if let Some(mean) = mean_inside(&source, &mut mask, &poly) {
                    draw_polygon_mut(&mut out, &poly, mean);
                }
            }
            for contour in &contours {
                outline(&mut out, &contour.points, Rgb([0, 0, 0]));
            }
        }
        Ok(frame.with_rgb(out))
    }
}

/// Thresholds at `level` and clears the outermost ring of pixels, so regions
/// touching the frame edge still get a closed contour.
fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    let (w, h) = gray.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let edge = x == 0 || y == 0 || x + 1 == w || y + 1 == h;
        let v = gray.get_pixel(x, y)[0];
        Luma([if !edge && v > level { 255 } else { 0 }])
    })
}

/// Contour points as a fillable polygon: at least three vertices and not
/// explicitly closed.
fn polygon(contour: &Contour<i32>) -> Option<Vec<Point<i32>>> {
    let mut poly = contour.points.clone();
    poly.dedup();
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    (poly.len() >= 3).then_some(poly)
}

/// Mean colour of `source` inside `poly`. `mask` is scratch space and is left
/// zeroed on return.
fn mean_inside(source: &RgbImage, mask: &mut GrayImage, poly: &[Point<i32>]) -> Option<Rgb<u8>> {
    draw_polygon_mut(mask, poly, Luma([255]));

    let (w, h) = (mask.width() as i32, mask.height() as i32);
    let x0 = poly.iter().map(|p| p.x).min()?.clamp(0, w - 1) as u32;
    let x1 = poly.iter().map(|p| p.x).max()?.clamp(0, w - 1) as u32;
    let y0 = poly.iter().map(|p| p.y).min()?.clamp(0, h - 1) as u32;
    let y1 = poly.iter().map(|p| p.y).max()?.clamp(0, h - 1) as u32;

    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for y in y0..=y1 {
        for x in x0..=x1 {
            if mask.get_pixel(x, y)[0] == 0 {
                continue;
            }
            mask.put_pixel(x, y, Luma([0]));
            let px = source.get_pixel(x, y);
            for c in 0..3 {
                sum[c] += px[c] as u64;
            }
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some(Rgb([
        (sum[0] / count) as u8,
        (sum[1] / count) as u8,
        (sum[2] / count) as u8,
    ]))
}

fn outline(canvas: &mut RgbImage, points: &[Point<i32>], color: Rgb<u8>) {
    match points {
        [] => {}
        [p] => {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < canvas.width() && (p.y as u32) < canvas.height()
            {
                canvas.put_pixel(p.x as u32, p.y as u32, color);
            }
        }
        _ => {
            for (a, b) in points.iter().zip(points.iter().cycle().skip(1)) {
                draw_line_segment_mut(
                    canvas,
                    (a.x as f32, a.y as f32),
                    (b.x as f32, b.y as f32),
                    color,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::testing::{solid, square};

    #[test]
    fn square_outlined_in_black_and_filled() {
        let frame = square(40, 40, 10, 10, 20);
        let out = MeanColorContours::default()
            .apply(&frame, &mut TransformState::default())
            .unwrap()
            .to_rgb_image();
        // the square's border pixels become the black outline
        assert_eq!(out.get_pixel(10, 20), &Rgb([0, 0, 0]));
        // the interior keeps the mean of a uniform region
        assert_eq!(out.get_pixel(20, 20), &Rgb([230, 230, 230]));
        // the lowest level keeps everything inside the cleared frame edge, so
        // the background is repainted with the mean of that 38x38 region
        // (400 px at 230, 1044 px at 20)
        let bg = out.get_pixel(2, 2);
        assert!((70..=85).contains(&bg[0]), "background repainted as {bg:?}");
        assert_eq!(out.get_pixel(1, 20), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(0, 20), &Rgb([20, 20, 20]));
    }

    #[test]
    fn region_touching_frame_edge_is_contoured() {
        let frame = solid(16, 16, [200, 200, 200]);
        let out = MeanColorContours::default()
            .apply(&frame, &mut TransformState::default())
            .unwrap()
            .to_rgb_image();
        assert_eq!(out.get_pixel(1, 8), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(8, 1), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(0, 8), &Rgb([200, 200, 200]));
        assert_eq!(out.get_pixel(8, 8), &Rgb([200, 200, 200]));
    }

    #[test]
    fn binarize_clears_the_outer_ring() {
        let gray = GrayImage::from_pixel(5, 5, Luma([90]));
        let binary = binarize(&gray, 50);
        assert_eq!(binary.get_pixel(0, 2)[0], 0);
        assert_eq!(binary.get_pixel(4, 4)[0], 0);
        assert_eq!(binary.get_pixel(2, 2)[0], 255);
    }

    #[test]
    fn dark_frame_has_no_contours() {
        let frame = solid(16, 16, [5, 5, 5]);
        let out = MeanColorContours::default()
            .apply(&frame, &mut TransformState::default())
            .unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn polygon_rejects_degenerate_contours() {
        let contour = Contour {
            points: vec![Point::new(1, 1), Point::new(1, 1)],
            border_type: imageproc::contours::BorderType::Outer,
            parent: None,
        };
        assert!(polygon(&contour).is_none());
    }

    #[test]
    fn mean_inside_leaves_mask_clear() {
        let source = RgbImage::from_pixel(10, 10, Rgb([40, 80, 120]));
        let mut mask = GrayImage::new(10, 10);
        let poly = [Point::new(2, 2), Point::new(7, 2), Point::new(7, 7), Point::new(2, 7)];
        assert_eq!(mean_inside(&source, &mut mask, &poly), Some(Rgb([40, 80, 120])));
        assert!(mask.iter().all(|&v| v == 0));
    }
}
