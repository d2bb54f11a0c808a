//! Application layer - Capture engines, session and port interfaces
//!
//! Contains the capture orchestration and the trait definitions
//! for devices, sinks and configuration storage.

pub mod capture;
pub mod ports;
pub mod session;

#[cfg(test)]
pub(crate) mod fakes;

// Re-export the public surface
pub use capture::{AudioCaptureEngine, LoopReport, RecordingFlag, VideoCaptureEngine};
pub use session::{RecordingSession, SessionError, SessionStatus, StopSummary};
