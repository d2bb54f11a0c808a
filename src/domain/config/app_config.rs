//! Application configuration value object

use serde::{Deserialize, Serialize};

use crate::domain::recording::Duration;

/// Default name of the ffmpeg executable
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Screen capture overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Capture width in pixels; detected from the display when unset
    pub width: Option<u32>,
    /// Capture height in pixels; detected from the display when unset
    pub height: Option<u32>,
    /// Capture input passed to ffmpeg (X11 display, `desktop`, avfoundation index)
    pub display: Option<String>,
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub output_dir: Option<String>,
    pub audio_device: Option<usize>,
    pub audio_only: Option<bool>,
    pub duration: Option<String>,
    pub ffmpeg: Option<String>,
    pub video: Option<VideoConfig>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            output_dir: None,
            audio_device: None,
            audio_only: Some(false),
            duration: None,
            ffmpeg: Some(DEFAULT_FFMPEG.to_string()),
            video: Some(VideoConfig::default()),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            output_dir: other.output_dir.or(self.output_dir),
            audio_device: other.audio_device.or(self.audio_device),
            audio_only: other.audio_only.or(self.audio_only),
            duration: other.duration.or(self.duration),
            ffmpeg: other.ffmpeg.or(self.ffmpeg),
            video: Self::merge_video_config(self.video, other.video),
        }
    }

    fn merge_video_config(
        base: Option<VideoConfig>,
        other: Option<VideoConfig>,
    ) -> Option<VideoConfig> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(b), Some(o)) => Some(VideoConfig {
                width: o.width.or(b.width),
                height: o.height.or(b.height),
                display: o.display.or(b.display),
            }),
        }
    }

    /// Get audio_only setting, or false if not set
    pub fn audio_only_or_default(&self) -> bool {
        self.audio_only.unwrap_or(false)
    }

    /// Parsed auto-stop duration. `None` when unset; invalid values are an error
    /// so a typo never turns into an unbounded recording.
    pub fn duration_limit(&self) -> Result<Option<Duration>, crate::domain::DurationParseError> {
        self.duration.as_deref().map(str::parse).transpose()
    }

    /// Get ffmpeg executable, or "ffmpeg" if not set
    pub fn ffmpeg_or_default(&self) -> &str {
        self.ffmpeg.as_deref().unwrap_or(DEFAULT_FFMPEG)
    }

    /// Capture size override, only when both dimensions are set
    pub fn video_size_override(&self) -> Option<(u32, u32)> {
        let video = self.video.as_ref()?;
        Some((video.width?, video.height?))
    }

    /// Capture input override for ffmpeg
    pub fn video_display(&self) -> Option<&str> {
        self.video.as_ref().and_then(|v| v.display.as_deref())
    }
}
