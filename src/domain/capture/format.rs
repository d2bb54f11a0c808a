//! Fixed output formats for the two capture streams

use std::fmt;
use std::time::Duration as StdDuration;

/// File name of the audio output inside the recording directory
pub const AUDIO_FILE_NAME: &str = "output.wav";

/// File name of the video output inside the recording directory
pub const VIDEO_FILE_NAME: &str = "output.mp4";

/// Which of the two capture streams a component belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PCM capture format. Every recording uses [`AudioFormat::STANDARD`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Frames (one sample per channel) delivered per device read
    pub chunk_frames: usize,
}

impl AudioFormat {
    /// 16-bit signed stereo at 44.1 kHz, 1024-frame chunks
    pub const STANDARD: Self = Self {
        sample_rate: 44_100,
        channels: 2,
        bits_per_sample: 16,
        chunk_frames: 1024,
    };

    /// Bytes per single sample
    pub const fn sample_width(&self) -> usize {
        (self.bits_per_sample / 8) as usize
    }

    /// Interleaved samples in one chunk
    pub const fn chunk_samples(&self) -> usize {
        self.chunk_frames * self.channels as usize
    }

    /// Wall-clock time covered by one chunk
    pub fn chunk_period(&self) -> StdDuration {
        StdDuration::from_secs_f64(self.chunk_frames as f64 / self.sample_rate as f64)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}-bit PCM",
            self.sample_rate, self.channels, self.bits_per_sample
        )
    }
}

/// Four-character codec tag written into the video container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded video format. Every recording uses [`VideoFormat::STANDARD`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub codec_tag: FourCc,
    pub fps: u32,
}

impl VideoFormat {
    /// MPEG-4 part 2 (`mp4v`) at 20 frames per second
    pub const STANDARD: Self = Self {
        codec_tag: FourCc(*b"mp4v"),
        fps: 20,
    };
}

impl Default for VideoFormat {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Bounds of the capture region, in device pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl DisplayBounds {
    /// Region anchored at the display origin
    pub const fn at_origin(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl fmt::Display for DisplayBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}
