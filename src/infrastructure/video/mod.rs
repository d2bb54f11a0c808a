//! Screen capture and video encoding adapters

mod encoder;
mod ffmpeg;
mod screen;

pub use encoder::{FfmpegVideoSink, FfmpegVideoSinkFactory};
pub use ffmpeg::{parse_video_size, CaptureInput, FfmpegTool, GrabDevice};
pub use screen::{FfmpegGrabber, FfmpegScreenSource};
