//! Small pixel-buffer helpers shared by the filters.

use image::{GrayImage, Luma, Pixel, Rgb, RgbImage};
use imageproc::definitions::Image;
use imageproc::filter::Kernel;
use imageproc::map::{blue_channel, green_channel, map_colors2, red_channel};

/// Float-valued single-channel image for filter responses.
pub type Response = Image<Luma<f32>>;

/// Gaussian sigma implied by an odd kernel size:
/// `0.3 * ((ksize - 1) / 2 - 1) + 0.8`.
pub fn kernel_sigma(ksize: u32) -> f32 {
    0.3 * ((ksize.max(1) as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Run a single-channel operation on each colour plane independently.
pub fn map_channels(img: &RgbImage, op: impl Fn(&GrayImage) -> GrayImage) -> RgbImage {
    let r = op(&red_channel(img));
    let g = op(&green_channel(img));
    let b = op(&blue_channel(img));
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        Rgb([r.get_pixel(x, y)[0], g.get_pixel(x, y)[0], b.get_pixel(x, y)[0]])
    })
}

pub fn to_f32(img: &GrayImage) -> Vec<f32> {
    img.as_raw().iter().map(|&v| v as f32).collect()
}

/// Correlation with a `width x height` row-major kernel at f32 precision.
/// Even-sized kernels reach one pixel further back than forward; borders
/// replicate.
pub fn correlate<P>(image: &Image<P>, kernel: &[f32], width: u32, height: u32) -> Response
where
    P: Pixel,
    P::Subpixel: Into<f32>,
{
    Kernel::new(kernel, width, height).filter(image, |dst: &mut f32, acc| *dst = acc)
}

/// Windowed sums of the gradient products `(Σ Ix², Σ Iy², Σ IxIy)` over a
/// `block x block` neighbourhood.
pub fn structure_tensor(ix: &Response, iy: &Response, block: u32) -> [Vec<f32>; 3] {
    let (w, h) = ix.dimensions();
    let xx = Response::from_fn(w, h, |x, y| Luma([ix.get_pixel(x, y)[0].powi(2)]));
    let yy = Response::from_fn(w, h, |x, y| Luma([iy.get_pixel(x, y)[0].powi(2)]));
    let xy = Response::from_fn(w, h, |x, y| {
        Luma([ix.get_pixel(x, y)[0] * iy.get_pixel(x, y)[0]])
    });
    let block = block.max(1);
    let ones = vec![1.0f32; (block * block) as usize];
    [xx, yy, xy].map(|products| correlate(&products, &ones, block, block).into_raw())
}

/// 3x3 maximum filter.
pub fn dilate3x3(src: &[f32], width: usize, height: usize) -> Vec<f32> {
    let (w, h) = (width as i64, height as i64);
    let mut out = vec![0.0f32; src.len()];
    for y in 0..h {
        for x in 0..w {
            let mut best = f32::MIN;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let sx = (x + dx).clamp(0, w - 1);
                    let sy = (y + dy).clamp(0, h - 1);
                    best = best.max(src[(sy * w + sx) as usize]);
                }
            }
            out[(y * w + x) as usize] = best;
        }
    }
    out
}

/// Per-pixel `min(a + b, 255)`.
pub fn saturating_add(a: &RgbImage, b: &RgbImage) -> RgbImage {
    map_colors2(a, b, |p: Rgb<u8>, q: Rgb<u8>| {
        Rgb([
            p[0].saturating_add(q[0]),
            p[1].saturating_add(q[1]),
            p[2].saturating_add(q[2]),
        ])
    })
}
