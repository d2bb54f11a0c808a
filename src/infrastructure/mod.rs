//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with cpal, hound, ffmpeg and the config file.

pub mod audio;
pub mod config;
pub mod video;

// Re-export adapters
pub use audio::{CpalBackend, HoundWavSinkFactory};
pub use config::XdgConfigStore;
pub use video::{CaptureInput, FfmpegScreenSource, FfmpegTool, FfmpegVideoSinkFactory};
