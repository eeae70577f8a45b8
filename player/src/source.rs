use chrono::Utc;
use filter_deck_common::config::SourceConfig;
use filter_deck_common::frame::{Frame, PixelLayout};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];
const MIN_FPS: f64 = 0.1;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read frame directory {0}: {1}")]
    ReadDir(String, std::io::Error),
    #[error("no decodable frames in {0}")]
    NoFrames(String),
    #[error("failed to decode {0}: {1}")]
    Decode(String, image::ImageError),
    #[error("decode task failed: {0}")]
    Join(String),
}

/// Plays a directory of still images as a video feed.
pub struct DirectorySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    interval: Duration,
    loop_playback: bool,
}

impl DirectorySource {
    pub fn open(config: &SourceConfig) -> Result<Self, SourceError> {
        let dir = PathBuf::from(&config.dir);
        let files = list_frames(&dir)?;
        info!(dir = %dir.display(), frames = files.len(), fps = config.fps, "frame source opened");
        Ok(Self {
            dir,
            files,
            interval: Duration::from_secs_f64(1.0 / config.fps.max(MIN_FPS)),
            loop_playback: config.loop_playback,
        })
    }

    /// Start playback on a background task. Frames arrive on the returned
    /// channel at the configured rate; the channel closes when playback ends.
    pub fn spawn(
        self,
        capacity: usize,
    ) -> (mpsc::Receiver<Frame>, tokio::task::JoinHandle<Result<(), SourceError>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(self.run(tx));
        (rx, handle)
    }

    async fn run(self, tx: mpsc::Sender<Frame>) -> Result<(), SourceError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seq: u64 = 0;

        loop {
            let mut decoded = 0usize;
            for path in &self.files {
                let frame = match decode(path.clone()).await {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "skipping unreadable frame");
                        continue;
                    }
                };
                decoded += 1;
                ticker.tick().await;

                let frame = frame.with_meta(seq, Utc::now().timestamp_millis());
                seq += 1;
                if tx.send(frame).await.is_err() {
                    debug!("frame receiver dropped, stopping source");
                    return Ok(());
                }
            }

            if decoded == 0 {
                return Err(SourceError::NoFrames(self.dir.display().to_string()));
            }
            if !self.loop_playback {
                info!(frames = seq, "frame source finished");
                return Ok(());
            }
            debug!(frames = seq, "looping frame source");
        }
    }
}

/// Image files in `dir` with a supported extension, sorted by name.
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| SourceError::ReadDir(dir.display().to_string(), e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_supported(path))
        .collect();
    if files.is_empty() {
        return Err(SourceError::NoFrames(dir.display().to_string()));
    }
    files.sort();
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn decode(path: PathBuf) -> Result<Frame, SourceError> {
    tokio::task::spawn_blocking(move || -> Result<Frame, SourceError> {
        let img = image::open(&path).map_err(|e| SourceError::Decode(path.display().to_string(), e))?;
        Ok(Frame::from_rgb_image(img.to_rgb8(), PixelLayout::Bgr8))
    })
    .await
    .map_err(|e| SourceError::Join(e.to_string()))?
}
