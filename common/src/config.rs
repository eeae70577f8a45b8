use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub blur: BlurConfig,
    pub background: BackgroundConfig,
    pub optical_flow: OpticalFlowConfig,
    pub source: SourceConfig,
    pub sink: SinkConfig,
    pub player: PlayerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_filter")]
    pub default_filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurKind {
    Box,
    Gaussian,
    Median,
    Bilateral,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlurConfig {
    #[serde(default = "default_blur_kind")]
    pub kind: BlurKind,
    /// Odd kernel size in pixels.
    #[serde(default = "default_blur_kernel")]
    pub kernel: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtractorKind {
    Mog2,
    RunningAverage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackgroundConfig {
    #[serde(default = "default_subtractor")]
    pub algorithm: SubtractorKind,
    #[serde(default = "default_history")]
    pub history: u32,
    #[serde(default = "default_var_threshold")]
    pub var_threshold: f32,
    #[serde(default = "default_detect_shadows")]
    pub detect_shadows: bool,
    /// Negative selects the automatic rate `1 / min(frames_seen, history)`.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_running_alpha")]
    pub running_alpha: f32,
    #[serde(default = "default_running_threshold")]
    pub running_threshold: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpticalFlowConfig {
    // Shi-Tomasi seeding
    #[serde(default = "default_max_corners")]
    pub max_corners: usize,
    #[serde(default = "default_quality_level")]
    pub quality_level: f32,
    #[serde(default = "default_min_distance")]
    pub min_distance: f32,
    #[serde(default = "default_block_size")]
    pub block_size: u32,
    // Lucas-Kanade
    #[serde(default = "default_win_size")]
    pub win_size: u32,
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
    /// Fixed seed for the track colour palette. Random per run when absent.
    #[serde(default)]
    pub palette_seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_dir")]
    pub dir: String,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default = "default_loop_playback")]
    pub loop_playback: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_sink_dir")]
    pub dir: String,
    /// Write every Nth converted frame; 0 disables the sink.
    #[serde(default = "default_sink_every")]
    pub every: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerConfig {
    /// Advance to the next filter every N frames; 0 disables.
    #[serde(default)]
    pub cycle_every: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            default_filter: default_filter(),
        }
    }
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            kind: default_blur_kind(),
            kernel: default_blur_kernel(),
        }
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            algorithm: default_subtractor(),
            history: default_history(),
            var_threshold: default_var_threshold(),
            detect_shadows: default_detect_shadows(),
            learning_rate: default_learning_rate(),
            running_alpha: default_running_alpha(),
            running_threshold: default_running_threshold(),
        }
    }
}

impl Default for OpticalFlowConfig {
    fn default() -> Self {
        Self {
            max_corners: default_max_corners(),
            quality_level: default_quality_level(),
            min_distance: default_min_distance(),
            block_size: default_block_size(),
            win_size: default_win_size(),
            max_level: default_max_level(),
            max_iterations: default_max_iterations(),
            epsilon: default_epsilon(),
            palette_seed: None,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: default_source_dir(),
            fps: default_fps(),
            loop_playback: default_loop_playback(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            dir: default_sink_dir(),
            every: default_sink_every(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_app_name() -> String {
    "Filter Deck".into()
}
fn default_filter() -> String {
    "Unchanged".into()
}
fn default_blur_kind() -> BlurKind {
    BlurKind::Box
}
fn default_blur_kernel() -> u32 {
    29
}
fn default_subtractor() -> SubtractorKind {
    SubtractorKind::Mog2
}
fn default_history() -> u32 {
    500
}
fn default_var_threshold() -> f32 {
    16.0
}
fn default_detect_shadows() -> bool {
    true
}
fn default_learning_rate() -> f32 {
    -1.0
}
fn default_running_alpha() -> f32 {
    0.05
}
fn default_running_threshold() -> u8 {
    30
}
fn default_max_corners() -> usize {
    100
}
fn default_quality_level() -> f32 {
    0.3
}
fn default_min_distance() -> f32 {
    7.0
}
fn default_block_size() -> u32 {
    7
}
fn default_win_size() -> u32 {
    15
}
fn default_max_level() -> u32 {
    2
}
fn default_max_iterations() -> u32 {
    10
}
fn default_epsilon() -> f32 {
    0.03
}
fn default_source_dir() -> String {
    "frames".into()
}
fn default_fps() -> f64 {
    15.0
}
fn default_loop_playback() -> bool {
    true
}
fn default_sink_dir() -> String {
    "snapshots".into()
}
fn default_sink_every() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}
