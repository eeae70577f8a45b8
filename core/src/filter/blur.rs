use filter_deck_common::config::{BlurConfig, BlurKind};
use filter_deck_common::frame::Frame;
use imageproc::filter::{bilateral_filter, box_filter, gaussian_blur_f32, median_filter};

use super::ops::{kernel_sigma, map_channels};
use super::traits::Transform;
use crate::error::TransformError;
use crate::state::TransformState;

/// Colour and spatial sigma of the bilateral blur.
const BILATERAL_SIGMA: f32 = 80.0;

/// Classic (box), Gaussian, median or bilateral blur with an odd square
/// kernel. The bilateral kernel is the filter window.
pub struct Blur {
    kind: BlurKind,
    kernel: u32,
}

impl Blur {
    pub fn new(config: &BlurConfig) -> Self {
        Self {
            kind: config.kind,
            // force an odd kernel of at least 1
            kernel: config.kernel.max(1) | 1,
        }
    }
}

impl Transform for Blur {
    fn apply(&self, frame: &Frame, _state: &mut TransformState) -> Result<Frame, TransformError> {
        let rgb = frame.to_rgb_image();
        let radius = self.kernel / 2;
        let out = match self.kind {
            BlurKind::Box => map_channels(&rgb, |plane| box_filter(plane, radius, radius)),
            BlurKind::Gaussian => gaussian_blur_f32(&rgb, kernel_sigma(self.kernel)),
            BlurKind::Median => median_filter(&rgb, radius, radius),
            BlurKind::Bilateral => map_channels(&rgb, |plane| {
                bilateral_filter(plane, self.kernel, BILATERAL_SIGMA, BILATERAL_SIGMA)
            }),
        };
        Ok(frame.with_rgb(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::testing::{solid, square};

    fn blur(kind: BlurKind, kernel: u32) -> Blur {
        Blur::new(&BlurConfig { kind, kernel })
    }

    #[test]
    fn even_kernel_rounded_up_to_odd() {
        assert_eq!(blur(BlurKind::Box, 4).kernel, 5);
        assert_eq!(blur(BlurKind::Box, 0).kernel, 1);
    }

    #[test]
    fn flat_frame_survives_every_kind() {
        let frame = solid(20, 20, [60, 120, 180]);
        for kind in [
            BlurKind::Box,
            BlurKind::Gaussian,
            BlurKind::Median,
            BlurKind::Bilateral,
        ] {
            let out = blur(kind, 5)
                .apply(&frame, &mut TransformState::default())
                .unwrap();
            let px = out.to_rgb_image();
            let c = px.get_pixel(10, 10);
            assert!((c[0] as i32 - 60).abs() <= 1, "{kind:?}: {c:?}");
            assert!((c[2] as i32 - 180).abs() <= 1, "{kind:?}: {c:?}");
        }
    }

    #[test]
    fn box_blur_softens_edges() {
        let frame = square(30, 30, 10, 10, 10);
        let out = blur(BlurKind::Box, 9)
            .apply(&frame, &mut TransformState::default())
            .unwrap()
            .to_gray_image();
        let edge = out.get_pixel(10, 15)[0];
        assert!(edge > 20 && edge < 230, "edge value {edge}");
    }

    #[test]
    fn bilateral_keeps_edges_sharper_than_box() {
        let frame = square(30, 30, 10, 10, 10);
        let run = |kind| {
            blur(kind, 9)
                .apply(&frame, &mut TransformState::default())
                .unwrap()
                .to_gray_image()
        };
        let bilateral = run(BlurKind::Bilateral).get_pixel(10, 15)[0];
        let boxed = run(BlurKind::Box).get_pixel(10, 15)[0];
        assert!(bilateral > 200, "bilateral edge value {bilateral}");
        assert!(bilateral > boxed);
    }

    #[test]
    fn median_removes_speck() {
        let mut rgb = solid(15, 15, [0, 0, 0]).to_rgb_image();
        rgb.put_pixel(7, 7, image::Rgb([255, 255, 255]));
        let frame = Frame::from_rgb_image(rgb, filter_deck_common::frame::PixelLayout::Bgr8);
        let out = blur(BlurKind::Median, 3)
            .apply(&frame, &mut TransformState::default())
            .unwrap()
            .to_rgb_image();
        assert_eq!(out.get_pixel(7, 7), &image::Rgb([0, 0, 0]));
    }
}
