//! Screen capture and video encoding port interfaces

use std::path::Path;

use super::capture_error::{CaptureIoError, ReleaseError, StartFailure};
use crate::domain::capture::{BgrFrame, DisplayBounds, RawFrame, VideoFormat};

/// Display geometry and screenshot source.
pub trait ScreenSource: Send + Sync {
    /// Bounds of the primary display in device pixels.
    fn primary_display(&self) -> Result<DisplayBounds, StartFailure>;

    /// Open a grabber producing screenshots of `region` at `format.fps`.
    fn open_grabber(
        &self,
        region: DisplayBounds,
        format: VideoFormat,
    ) -> Result<Box<dyn ScreenGrabber>, StartFailure>;
}

/// Produces raw screenshots of one region.
pub trait ScreenGrabber: Send {
    /// Block for the next screenshot (at most about one frame period).
    fn grab(&mut self) -> Result<RawFrame, CaptureIoError>;

    fn close(self: Box<Self>) -> Result<(), ReleaseError>;
}

/// Parameters of an encoded video output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSinkSpec {
    pub format: VideoFormat,
    pub width: u32,
    pub height: u32,
}

/// Creates encoded video sinks.
pub trait VideoSinkFactory: Send + Sync {
    fn create(&self, path: &Path, spec: VideoSinkSpec) -> Result<Box<dyn VideoSink>, StartFailure>;
}

/// An open video encoder writing one container file.
pub trait VideoSink: Send {
    /// Frame size every written frame must have.
    fn frame_size(&self) -> (u32, u32);

    /// Encode the next frame.
    fn write_frame(&mut self, frame: &BgrFrame) -> Result<(), CaptureIoError>;

    /// Finalise the container and close the file.
    fn release(self: Box<Self>) -> Result<(), ReleaseError>;
}
