//! deskrec - dual-stream desktop recorder
//!
//! Captures an audio input into `output.wav` (PCM, 2 ch, 16-bit, 44.1 kHz)
//! and the primary display into `output.mp4` (mp4v, 20 fps), started and
//! stopped together by a single recording session.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Formats, frames, buffers, session state, config and errors
//! - **Application**: Capture engines, the recording session and port traits
//! - **Infrastructure**: Adapters (cpal input, hound WAV writer, ffmpeg grabber and encoder, XDG config)
//! - **CLI**: Argument parsing, recording runner, logging and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
