//! Shared ffmpeg process plumbing for screen capture and encoding

use std::io;
use std::process::{Child, Command, Stdio};

use crate::application::ports::StartFailure;
use crate::domain::capture::{DisplayBounds, MediaKind};
use crate::domain::config::DEFAULT_FFMPEG;

/// Location of the ffmpeg executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegTool {
    program: String,
}

impl FfmpegTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Base command with banner and chatter suppressed
    pub(crate) fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(["-hide_banner", "-nostdin"]);
        command
    }

    /// Spawn, mapping a missing executable to [`StartFailure::ToolNotFound`].
    pub(crate) fn spawn(&self, command: &mut Command, kind: MediaKind) -> Result<Child, StartFailure> {
        command.spawn().map_err(|e| self.start_error(e, kind))
    }

    pub(crate) fn start_error(&self, err: io::Error, kind: MediaKind) -> StartFailure {
        if err.kind() == io::ErrorKind::NotFound {
            StartFailure::ToolNotFound(self.program.clone())
        } else {
            StartFailure::DeviceOpen {
                kind,
                message: format!("failed to run {}: {err}", self.program),
            }
        }
    }
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG)
    }
}

/// ffmpeg screen-grabbing input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabDevice {
    X11Grab,
    GdiGrab,
    AvFoundation,
}

impl GrabDevice {
    pub fn platform_default() -> Self {
        if cfg!(target_os = "windows") {
            Self::GdiGrab
        } else if cfg!(target_os = "macos") {
            Self::AvFoundation
        } else {
            Self::X11Grab
        }
    }

    pub const fn format_name(&self) -> &'static str {
        match self {
            Self::X11Grab => "x11grab",
            Self::GdiGrab => "gdigrab",
            Self::AvFoundation => "avfoundation",
        }
    }
}

/// Screen the grabber reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureInput {
    pub device: GrabDevice,
    /// X11 display, `desktop`, or avfoundation device index
    pub target: String,
}

impl CaptureInput {
    /// Input for this platform, with an optional target override
    pub fn platform_default(target: Option<&str>) -> Self {
        let device = GrabDevice::platform_default();
        let target = match (target, device) {
            (Some(t), _) => t.to_string(),
            (None, GrabDevice::X11Grab) => std::env::var("DISPLAY").unwrap_or_else(|_| ":0".into()),
            (None, GrabDevice::GdiGrab) => "desktop".to_string(),
            (None, GrabDevice::AvFoundation) => "1:none".to_string(),
        };
        Self { device, target }
    }

    /// Input arguments probing the whole screen
    pub fn size_query_args(&self) -> Vec<String> {
        vec![
            "-f".into(),
            self.device.format_name().into(),
            "-i".into(),
            self.target.clone(),
        ]
    }

    /// Input and filter arguments grabbing `region` at `fps`
    pub fn grab_args(&self, region: DisplayBounds, fps: u32) -> Vec<String> {
        let size = format!("{}x{}", region.width, region.height);
        let mut args: Vec<String> = vec![
            "-f".into(),
            self.device.format_name().into(),
            "-framerate".into(),
            fps.to_string(),
        ];
        match self.device {
            GrabDevice::X11Grab => args.extend([
                "-video_size".into(),
                size,
                "-i".into(),
                format!("{}+{},{}", self.target, region.x, region.y),
            ]),
            GrabDevice::GdiGrab => args.extend([
                "-offset_x".into(),
                region.x.to_string(),
                "-offset_y".into(),
                region.y.to_string(),
                "-video_size".into(),
                size,
                "-i".into(),
                self.target.clone(),
            ]),
            GrabDevice::AvFoundation => args.extend([
                "-capture_cursor".into(),
                "1".into(),
                "-i".into(),
                self.target.clone(),
                "-vf".into(),
                format!(
                    "crop={}:{}:{}:{}",
                    region.width, region.height, region.x, region.y
                ),
            ]),
        }
        args
    }
}

/// Find the frame size in ffmpeg's stream dump, e.g.
/// `Stream #0:0: Video: rawvideo (BGR[0] / 0x30524742), bgr0, 1920x1080, 29.97 fps`.
pub fn parse_video_size(stderr: &str) -> Option<(u32, u32)> {
    stderr
        .lines()
        .filter(|line| line.contains("Video:"))
        .flat_map(|line| line.split([',', ' ']))
        .find_map(parse_size_token)
}

fn parse_size_token(token: &str) -> Option<(u32, u32)> {
    let (width, height) = token.trim().split_once('x')?;
    let width: u32 = width.parse().ok()?;
    let height: u32 = height.parse().ok()?;
    (width > 0 && height > 0).then_some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_x11grab_stream_line() {
        let stderr = "\
[x11grab @ 0x55d0] Stream #0: not enough frames to estimate rate
Input #0, x11grab, from ':0':
  Duration: N/A, start: 1700000000.000000, bitrate: 1990656 kb/s
  Stream #0:0: Video: rawvideo (BGR[0] / 0x30524742), bgr0, 2560x1440, 1990656 kb/s, 30 fps
";
        assert_eq!(parse_video_size(stderr), Some((2560, 1440)));
    }

    #[test]
    fn parses_size_with_aspect_suffix() {
        let stderr = "  Stream #0:0: Video: bmp, bgra, 1366x768 [SAR 1:1 DAR 683:384], 30 fps";
        assert_eq!(parse_video_size(stderr), Some((1366, 768)));
    }

    #[test]
    fn ignores_non_video_lines() {
        let stderr = "Input #0, lavfi, from 'size=640x480':\n  Stream #0:0: Audio: pcm_s16le";
        assert_eq!(parse_video_size(stderr), None);
    }

    #[test]
    fn x11_grab_args_offset_display() {
        let input = CaptureInput {
            device: GrabDevice::X11Grab,
            target: ":1".into(),
        };
        let region = DisplayBounds {
            x: 10,
            y: 20,
            width: 800,
            height: 600,
        };

        let args = input.grab_args(region, 20);

        assert_eq!(
            args,
            vec!["-f", "x11grab", "-framerate", "20", "-video_size", "800x600", "-i", ":1+10,20"]
        );
    }

    #[test]
    fn gdi_grab_args_use_offsets() {
        let input = CaptureInput {
            device: GrabDevice::GdiGrab,
            target: "desktop".into(),
        };

        let args = input.grab_args(DisplayBounds::at_origin(1920, 1080), 20);

        assert!(args.windows(2).any(|w| w == ["-offset_x", "0"]));
        assert!(args.windows(2).any(|w| w == ["-video_size", "1920x1080"]));
        assert_eq!(args.last().map(String::as_str), Some("desktop"));
    }

    #[test]
    fn explicit_target_wins() {
        let input = CaptureInput::platform_default(Some(":5"));
        assert_eq!(input.target, ":5");
    }

    #[test]
    fn missing_tool_maps_to_tool_not_found() {
        let tool = FfmpegTool::new("ffmpeg-does-not-exist-here");
        let mut command = tool.command();
        let err = tool.spawn(&mut command, MediaKind::Video).unwrap_err();
        assert!(matches!(err, StartFailure::ToolNotFound(name) if name == "ffmpeg-does-not-exist-here"));
    }
}
