//! Synthetic frames for filter tests.

use filter_deck_common::frame::{Frame, PixelLayout};
use image::{Rgb, RgbImage};

pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
    Frame::from_rgb_image(RgbImage::from_pixel(width, height, Rgb(rgb)), PixelLayout::Bgr8)
}

/// Bright square of side `size` at `(x0, y0)` on a dark background.
pub fn square(width: u32, height: u32, x0: u32, y0: u32, size: u32) -> Frame {
    let img = RgbImage::from_fn(width, height, |x, y| {
        if x >= x0 && x < x0 + size && y >= y0 && y < y0 + size {
            Rgb([230, 230, 230])
        } else {
            Rgb([20, 20, 20])
        }
    });
    Frame::from_rgb_image(img, PixelLayout::Bgr8)
}

pub fn checkerboard(width: u32, height: u32, cell: u32) -> Frame {
    checkerboard_shifted(width, height, cell, 0, 0)
}

/// Checkerboard translated by `(dx, dy)` pixels.
pub fn checkerboard_shifted(width: u32, height: u32, cell: u32, dx: u32, dy: u32) -> Frame {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let cx = (x + width - dx) / cell;
        let cy = (y + height - dy) / cell;
        if (cx + cy) % 2 == 0 {
            Rgb([220, 220, 220])
        } else {
            Rgb([30, 30, 30])
        }
    });
    Frame::from_rgb_image(img, PixelLayout::Bgr8)
}
