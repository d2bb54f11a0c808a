//! Screen grabbing through an ffmpeg capture process

use std::io::{self, Read};
use std::process::{Child, ChildStdout, Stdio};

use tracing::{debug, info};

use super::ffmpeg::{parse_video_size, CaptureInput, FfmpegTool};
use crate::application::ports::{
    CaptureIoError, ReleaseError, ScreenGrabber, ScreenSource, StartFailure,
};
use crate::domain::capture::{DisplayBounds, MediaKind, RawFrame, VideoFormat};

/// Bytes per BGRA pixel
const BGRA_PIXEL_BYTES: usize = 4;

/// Primary display via ffmpeg's platform screen grabber
pub struct FfmpegScreenSource {
    tool: FfmpegTool,
    input: CaptureInput,
    size_override: Option<(u32, u32)>,
}

impl FfmpegScreenSource {
    pub fn new(tool: FfmpegTool, input: CaptureInput) -> Self {
        Self {
            tool,
            input,
            size_override: None,
        }
    }

    /// Use a fixed capture size instead of probing the display.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size_override = Some((width, height));
        self
    }

    fn query_size(&self) -> Result<(u32, u32), StartFailure> {
        let mut command = self.tool.command();
        command
            .args(self.input.size_query_args())
            .args(["-frames:v", "1", "-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::null());

        let output = command.output().map_err(|e| match self.tool.start_error(e, MediaKind::Video) {
            StartFailure::DeviceOpen { message, .. } => StartFailure::DisplayQuery(message),
            other => other,
        })?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        parse_video_size(&stderr).ok_or_else(|| {
            let reason = stderr.lines().last().unwrap_or("no stream information").trim();
            StartFailure::DisplayQuery(format!(
                "{} could not read {} ({reason})",
                self.input.device.format_name(),
                self.input.target
            ))
        })
    }
}

impl ScreenSource for FfmpegScreenSource {
    fn primary_display(&self) -> Result<DisplayBounds, StartFailure> {
        let (width, height) = match self.size_override {
            Some(size) => size,
            None => self.query_size()?,
        };
        debug!(width, height, target = %self.input.target, "Primary display geometry");
        Ok(DisplayBounds::at_origin(width, height))
    }

    fn open_grabber(
        &self,
        region: DisplayBounds,
        format: VideoFormat,
    ) -> Result<Box<dyn ScreenGrabber>, StartFailure> {
        let mut command = self.tool.command();
        command
            .args(["-loglevel", "error"])
            .args(self.input.grab_args(region, format.fps))
            .args(["-f", "rawvideo", "-pix_fmt", "bgra", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = self.tool.spawn(&mut command, MediaKind::Video)?;
        let Some(stdout) = child.stdout.take() else {
            child.kill().ok();
            child.wait().ok();
            return Err(StartFailure::DeviceOpen {
                kind: MediaKind::Video,
                message: "screen grabber has no output pipe".into(),
            });
        };

        info!(
            device = self.input.device.format_name(),
            region = %region,
            "Screen grabber running"
        );
        Ok(Box::new(FfmpegGrabber {
            child: Some(child),
            stdout,
            width: region.width,
            height: region.height,
        }))
    }
}

/// Reads fixed-size BGRA frames from the capture process's stdout
pub struct FfmpegGrabber {
    child: Option<Child>,
    stdout: ChildStdout,
    width: u32,
    height: u32,
}

impl FfmpegGrabber {
    fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * BGRA_PIXEL_BYTES
    }

    fn shutdown(&mut self) -> io::Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        // The capture process never exits by itself.
        if let Err(err) = child.kill() {
            if err.kind() != io::ErrorKind::InvalidInput {
                return Err(err);
            }
        }
        child.wait().map(|_| ())
    }
}

impl ScreenGrabber for FfmpegGrabber {
    fn grab(&mut self) -> Result<RawFrame, CaptureIoError> {
        let mut data = vec![0u8; self.frame_bytes()];
        self.stdout.read_exact(&mut data).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CaptureIoError::Disconnected,
            _ => CaptureIoError::Device(e.to_string()),
        })?;
        Ok(RawFrame::new(self.width, self.height, data)?)
    }

    fn close(mut self: Box<Self>) -> Result<(), ReleaseError> {
        self.shutdown()
            .map_err(|e| ReleaseError::new("screen grabber", e.to_string()))
    }
}

impl Drop for FfmpegGrabber {
    fn drop(&mut self) {
        self.shutdown().ok();
    }
}
