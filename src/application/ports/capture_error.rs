//! Error taxonomy shared by the capture ports

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::capture::MediaKind;
use crate::domain::error::FrameError;

/// A device, sink or context could not be opened.
///
/// Returned from an engine's `start`; the engine has already rolled back
/// whatever it had acquired by the time the caller sees it.
#[derive(Debug, Clone, Error)]
pub enum StartFailure {
    #[error("No audio input device at index {0}")]
    DeviceNotFound(usize),

    #[error("Failed to initialise {kind} subsystem: {message}")]
    Subsystem { kind: MediaKind, message: String },

    #[error("Failed to open {kind} device: {message}")]
    DeviceOpen { kind: MediaKind, message: String },

    #[error("Failed to open {kind} sink {}: {message}", path.display())]
    SinkOpen {
        kind: MediaKind,
        path: PathBuf,
        message: String,
    },

    #[error("Failed to determine display geometry: {0}")]
    DisplayQuery(String),

    #[error("{0} not found. Please install it and add it to PATH")]
    ToolNotFound(String),

    #[error("{0} capture is already running")]
    AlreadyRunning(MediaKind),
}

/// A single read or write during active capture failed.
#[derive(Debug, Clone, Error)]
pub enum CaptureIoError {
    #[error("Input buffer overflowed, {dropped_frames} frames lost")]
    Overflow { dropped_frames: usize },

    #[error("Timed out waiting for capture data")]
    Timeout,

    #[error("Capture device failed: {0}")]
    Device(String),

    #[error("Capture source closed unexpectedly")]
    Disconnected,

    #[error("Failed to write to sink: {0}")]
    Write(String),

    #[error("Invalid frame: {0}")]
    Frame(#[from] FrameError),

    #[error("{0} capture thread panicked")]
    Panicked(MediaKind),
}

impl CaptureIoError {
    /// Whether capture can carry on after this error.
    ///
    /// Overflow loses one chunk; a timeout loses nothing. Everything else
    /// ends the run.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Overflow { .. } | Self::Timeout)
    }
}

/// Closing a device, sink or context failed. Logged, never propagated.
#[derive(Debug, Clone, Error)]
#[error("Failed to release {resource}: {message}")]
pub struct ReleaseError {
    pub resource: &'static str,
    pub message: String,
}

impl ReleaseError {
    pub fn new(resource: &'static str, message: impl Into<String>) -> Self {
        Self {
            resource,
            message: message.into(),
        }
    }
}
