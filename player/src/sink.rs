use filter_deck_common::config::SinkConfig;
use filter_deck_common::frame::{Frame, PixelLayout};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to create directory {0}: {1}")]
    CreateDir(String, std::io::Error),
    #[error("failed to encode {0}: {1}")]
    Encode(String, image::ImageError),
    #[error("snapshot task failed: {0}")]
    Join(String),
}

/// Writes every Nth converted frame to disk as PNG.
pub struct SnapshotSink {
    root: PathBuf,
    every: u64,
    offered: u64,
    written: u64,
}

impl SnapshotSink {
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            root: PathBuf::from(&config.dir),
            every: config.every,
            offered: 0,
            written: 0,
        }
    }

    pub fn enabled(&self) -> bool {
        self.every > 0
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Count a frame and write it if it is due. Returns the path written.
    pub async fn offer(&mut self, frame: &Frame, filter: &str) -> Result<Option<PathBuf>, SinkError> {
        if !self.enabled() {
            return Ok(None);
        }
        self.offered += 1;
        if self.offered % self.every != 0 {
            return Ok(None);
        }

        let path = self.root.join(frame.snapshot_key("", filter));
        let owned = frame.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_png(&owned, &target))
            .await
            .map_err(|e| SinkError::Join(e.to_string()))??;

        self.written += 1;
        debug!(path = %path.display(), seq = frame.seq, "snapshot written");
        Ok(Some(path))
    }
}

fn write_png(frame: &Frame, path: &Path) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SinkError::CreateDir(parent.display().to_string(), e))?;
    }
    let result = match frame.layout() {
        PixelLayout::Gray8 => frame.to_gray_image().save_with_format(path, ImageFormat::Png),
        PixelLayout::Bgr8 | PixelLayout::Rgb8 => {
            frame.to_rgb_image().save_with_format(path, ImageFormat::Png)
        }
    };
    result.map_err(|e| SinkError::Encode(path.display().to_string(), e))
}
