use image::{GrayImage, Luma, Rgb, RgbImage};

/// Channel layout of a frame's pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLayout {
    /// Interleaved blue, green, red. The camera convention, and the default.
    #[default]
    Bgr8,
    /// Interleaved red, green, blue.
    Rgb8,
    /// Single 8-bit luma channel.
    Gray8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Bgr8 | PixelLayout::Rgb8 => 3,
            PixelLayout::Gray8 => 1,
        }
    }
}

/// A raw video frame with capture metadata.
///
/// The pixel buffer is tightly packed, row-major, `width * height * channels`
/// bytes long. Transforms read it through [`Frame::to_rgb_image`] or
/// [`Frame::to_gray_image`] and hand their result back through
/// [`Frame::with_rgb`] / [`Frame::with_gray`], which carry `seq` and
/// `captured_at_ms` over from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
    pub seq: u64,
    pub captured_at_ms: i64,
}

impl Frame {
    /// Wrap a raw pixel buffer, checking it against the declared shape.
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::Empty { width, height });
        }
        let expected = width as usize * height as usize * layout.channels();
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                got: data.len(),
                expected,
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
            seq: 0,
            captured_at_ms: 0,
        })
    }

    /// Build a colour frame from an RGB image, reordering channels for `Bgr8`.
    /// A `Gray8` layout request is treated as `Rgb8`.
    pub fn from_rgb_image(img: RgbImage, layout: PixelLayout) -> Self {
        let (width, height) = img.dimensions();
        let mut data = img.into_raw();
        let layout = match layout {
            PixelLayout::Bgr8 => {
                for px in data.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                PixelLayout::Bgr8
            }
            PixelLayout::Rgb8 | PixelLayout::Gray8 => PixelLayout::Rgb8,
        };
        Self {
            width,
            height,
            layout,
            data,
            seq: 0,
            captured_at_ms: 0,
        }
    }

    pub fn from_gray_image(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            layout: PixelLayout::Gray8,
            data: img.into_raw(),
            seq: 0,
            captured_at_ms: 0,
        }
    }

    pub fn with_meta(mut self, seq: u64, captured_at_ms: i64) -> Self {
        self.seq = seq;
        self.captured_at_ms = captured_at_ms;
        self
    }

    // -- Accessors --------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    // -- Conversions ------------------------------------------------------------

    /// Copy the pixels out as an RGB image. Gray frames are expanded.
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut img = RgbImage::new(self.width, self.height);
        match self.layout {
            PixelLayout::Rgb8 => {
                for (dst, src) in img.pixels_mut().zip(self.data.chunks_exact(3)) {
                    *dst = Rgb([src[0], src[1], src[2]]);
                }
            }
            PixelLayout::Bgr8 => {
                for (dst, src) in img.pixels_mut().zip(self.data.chunks_exact(3)) {
                    *dst = Rgb([src[2], src[1], src[0]]);
                }
            }
            PixelLayout::Gray8 => {
                for (dst, &v) in img.pixels_mut().zip(self.data.iter()) {
                    *dst = Rgb([v, v, v]);
                }
            }
        }
        img
    }

    /// Copy the pixels out as a luma image (BT.601 weights).
    pub fn to_gray_image(&self) -> GrayImage {
        let mut img = GrayImage::new(self.width, self.height);
        match self.layout {
            PixelLayout::Gray8 => {
                for (dst, &v) in img.pixels_mut().zip(self.data.iter()) {
                    *dst = Luma([v]);
                }
            }
            PixelLayout::Rgb8 => {
                for (dst, src) in img.pixels_mut().zip(self.data.chunks_exact(3)) {
                    *dst = Luma([luma(src[0], src[1], src[2])]);
                }
            }
            PixelLayout::Bgr8 => {
                for (dst, src) in img.pixels_mut().zip(self.data.chunks_exact(3)) {
                    *dst = Luma([luma(src[2], src[1], src[0])]);
                }
            }
        }
        img
    }

    /// Output frame built from a colour result. Keeps this frame's colour
    /// layout and metadata.
    pub fn with_rgb(&self, img: RgbImage) -> Frame {
        let layout = match self.layout {
            PixelLayout::Bgr8 => PixelLayout::Bgr8,
            _ => PixelLayout::Rgb8,
        };
        Frame::from_rgb_image(img, layout).with_meta(self.seq, self.captured_at_ms)
    }

    /// Output frame built from a single-channel result, keeping metadata.
    pub fn with_gray(&self, img: GrayImage) -> Frame {
        Frame::from_gray_image(img).with_meta(self.seq, self.captured_at_ms)
    }

    /// Generate a snapshot key for the sink.
    /// e.g. "snapshots/2026-02-18/20260218T093000000Z_000042_optical-flow.png"
    pub fn snapshot_key(&self, prefix: &str, filter: &str) -> String {
        let dt = chrono::DateTime::from_timestamp_millis(self.captured_at_ms)
            .unwrap_or_else(chrono::Utc::now);
        let date = dt.format("%Y-%m-%d");
        let ts = dt.format("%Y%m%dT%H%M%S%3fZ");
        format!(
            "{prefix}{date}/{ts}_{seq:06}_{slug}.png",
            seq = self.seq,
            slug = slug(filter)
        )
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8
}

fn slug(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame buffer has {got} bytes, expected {expected}")]
    BufferSize { got: usize, expected: usize },
    #[error("frame has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_buffer_length() {
        assert!(Frame::new(2, 2, PixelLayout::Bgr8, vec![0; 12]).is_ok());
        let err = Frame::new(2, 2, PixelLayout::Bgr8, vec![0; 4]).unwrap_err();
        assert!(matches!(err, FrameError::BufferSize { got: 4, expected: 12 }));
    }

    #[test]
    fn new_rejects_empty() {
        let err = Frame::new(0, 4, PixelLayout::Gray8, vec![]).unwrap_err();
        assert!(matches!(err, FrameError::Empty { .. }));
    }

    #[test]
    fn bgr_buffer_reads_as_rgb() {
        // one pure-blue pixel in BGR order
        let frame = Frame::new(1, 1, PixelLayout::Bgr8, vec![255, 0, 0]).unwrap();
        assert_eq!(frame.to_rgb_image().get_pixel(0, 0), &Rgb([0, 0, 255]));
    }

    #[test]
    fn rgb_image_stored_as_bgr() {
        let img = RgbImage::from_pixel(1, 1, Rgb([10, 20, 30]));
        let frame = Frame::from_rgb_image(img, PixelLayout::Bgr8);
        assert_eq!(frame.data(), &[30, 20, 10]);
        assert_eq!(frame.layout(), PixelLayout::Bgr8);
    }

    #[test]
    fn gray_uses_bt601_weights() {
        let frame = Frame::new(1, 1, PixelLayout::Rgb8, vec![255, 0, 0]).unwrap();
        assert_eq!(frame.to_gray_image().get_pixel(0, 0)[0], 76);
        let white = Frame::new(1, 1, PixelLayout::Bgr8, vec![255, 255, 255]).unwrap();
        assert_eq!(white.to_gray_image().get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn with_rgb_keeps_layout_and_meta() {
        let frame = Frame::new(1, 1, PixelLayout::Bgr8, vec![1, 2, 3])
            .unwrap()
            .with_meta(7, 1708300000000);
        let out = frame.with_rgb(RgbImage::from_pixel(1, 1, Rgb([9, 8, 7])));
        assert_eq!(out.layout(), PixelLayout::Bgr8);
        assert_eq!(out.data(), &[7, 8, 9]);
        assert_eq!(out.seq, 7);
        assert_eq!(out.captured_at_ms, 1708300000000);

        let gray = Frame::new(1, 1, PixelLayout::Gray8, vec![5]).unwrap();
        let out = gray.with_rgb(RgbImage::new(1, 1));
        assert_eq!(out.layout(), PixelLayout::Rgb8);
    }

    #[test]
    fn snapshot_key_format() {
        let frame = Frame::new(1, 1, PixelLayout::Gray8, vec![0])
            .unwrap()
            .with_meta(42, 1708300000000);
        let key = frame.snapshot_key("snapshots/", "Optical Flow");
        assert!(key.starts_with("snapshots/2024-02-18/"));
        assert!(key.ends_with("_000042_optical-flow.png"));
    }
}
