//! Port interfaces (traits) for external systems
//!
//! Capture devices, sinks and config storage sit behind these traits so
//! the engines and session can be driven by fakes in tests.

pub mod audio;
pub mod capture_error;
pub mod config;
pub mod video;

// Re-export common types
pub use audio::{
    AudioBackend, AudioContext, AudioDeviceInfo, AudioInputStream, PcmSink, PcmSinkFactory,
};
pub use capture_error::{CaptureIoError, ReleaseError, StartFailure};
pub use config::ConfigStore;
pub use video::{ScreenGrabber, ScreenSource, VideoSink, VideoSinkFactory, VideoSinkSpec};
