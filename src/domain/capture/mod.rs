//! Capture formats, frames and the audio frame buffer

mod buffer;
mod format;
mod frame;

pub use buffer::AudioFrameBuffer;
pub use format::{
    AudioFormat, DisplayBounds, FourCc, MediaKind, VideoFormat, AUDIO_FILE_NAME,
    VIDEO_FILE_NAME,
};
pub use frame::{BgrFrame, RawFrame};
