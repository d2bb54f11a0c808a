//! Domain layer - Core value objects and rules
//!
//! Contains capture formats, frames, the session state machine,
//! configuration and domain errors.
//! This layer has no dependencies on external systems.

pub mod capture;
pub mod config;
pub mod error;
pub mod recording;
pub mod session;

// Re-export common types
pub use capture::{
    AudioFormat, AudioFrameBuffer, BgrFrame, DisplayBounds, MediaKind, RawFrame, VideoFormat,
};
pub use config::AppConfig;
pub use error::*;
pub use recording::Duration;
pub use session::{InvalidStateTransition, SessionState, SessionStateMachine};
