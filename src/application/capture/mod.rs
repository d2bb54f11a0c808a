//! Capture engines and their acquisition loops
//!
//! Each engine owns one device and one sink for a single media type. Its
//! `start` opens both, `run_capture_loop` pumps data until the flag drops,
//! and `stop` releases whatever is still held. All three are safe to call
//! from different threads.

pub mod audio;
pub mod flag;
pub mod video;

pub use audio::AudioCaptureEngine;
pub use flag::RecordingFlag;
pub use video::VideoCaptureEngine;

use crate::domain::capture::MediaKind;

/// Outcome of one acquisition loop run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    pub kind: MediaKind,
    /// PCM frames for audio, encoded frames for video
    pub units_written: usize,
    /// Frames the device reported as lost
    pub dropped: usize,
}

impl LoopReport {
    pub const fn empty(kind: MediaKind) -> Self {
        Self {
            kind,
            units_written: 0,
            dropped: 0,
        }
    }
}
