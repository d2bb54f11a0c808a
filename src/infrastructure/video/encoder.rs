//! Video encoding through an ffmpeg process fed raw frames on stdin

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Stdio};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use super::ffmpeg::FfmpegTool;
use crate::application::ports::{
    CaptureIoError, ReleaseError, StartFailure, VideoSink, VideoSinkFactory, VideoSinkSpec,
};
use crate::domain::capture::{BgrFrame, MediaKind};

/// Spawns one ffmpeg encoder per recording
pub struct FfmpegVideoSinkFactory {
    tool: FfmpegTool,
}

impl FfmpegVideoSinkFactory {
    pub fn new(tool: FfmpegTool) -> Self {
        Self { tool }
    }

    fn encoder_args(path: &Path, spec: VideoSinkSpec) -> Vec<String> {
        vec![
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "bgr24".into(),
            "-video_size".into(),
            format!("{}x{}", spec.width, spec.height),
            "-framerate".into(),
            spec.format.fps.to_string(),
            "-i".into(),
            "-".into(),
            // yuv420p needs even dimensions
            "-vf".into(),
            "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
            "-c:v".into(),
            "mpeg4".into(),
            "-tag:v".into(),
            spec.format.codec_tag.to_string(),
            "-q:v".into(),
            "5".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            path.to_string_lossy().into_owned(),
        ]
    }
}

impl VideoSinkFactory for FfmpegVideoSinkFactory {
    fn create(&self, path: &Path, spec: VideoSinkSpec) -> Result<Box<dyn VideoSink>, StartFailure> {
        let sink_error = |message: String| StartFailure::SinkOpen {
            kind: MediaKind::Video,
            path: path.to_path_buf(),
            message,
        };

        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
                return Err(sink_error("directory does not exist".into()));
            }
            _ => {}
        }

        let mut command = self.tool.command();
        command
            .args(Self::encoder_args(path, spec))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = self.tool.spawn(&mut command, MediaKind::Video)?;
        let Some(stdin) = child.stdin.take() else {
            child.kill().ok();
            child.wait().ok();
            return Err(sink_error("encoder has no input pipe".into()));
        };
        let stderr_log = match child.stderr.take().map(drain_stderr).transpose() {
            Ok(handle) => handle,
            Err(e) => {
                child.kill().ok();
                child.wait().ok();
                return Err(sink_error(format!("cannot read encoder output: {}", e)));
            }
        };

        info!(
            path = %path.display(),
            width = spec.width,
            height = spec.height,
            fps = spec.format.fps,
            codec = %spec.format.codec_tag,
            "Video encoder started"
        );
        Ok(Box::new(FfmpegVideoSink {
            child: Some(child),
            stdin: Some(stdin),
            stderr_log,
            path: path.to_path_buf(),
            size: (spec.width, spec.height),
            frames: 0,
        }))
    }
}

/// Forward encoder diagnostics to the log as they arrive.
///
/// The pipe is read until ffmpeg closes it, so a chatty encoder never
/// blocks on a full stderr buffer. Yields the last non-empty line.
fn drain_stderr(stderr: impl Read + Send + 'static) -> io::Result<JoinHandle<Option<String>>> {
    thread::Builder::new()
        .name("deskrec-encoder-log".into())
        .spawn(move || {
            let mut reader = BufReader::new(stderr);
            let mut raw = Vec::new();
            let mut last = None;
            loop {
                raw.clear();
                match reader.read_until(b'\n', &mut raw) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                if !line.is_empty() {
                    warn!(output = %line, "ffmpeg encoder");
                    last = Some(line);
                }
            }
            last
        })
}

/// Running encoder. Closing stdin lets ffmpeg write the container trailer.
pub struct FfmpegVideoSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_log: Option<JoinHandle<Option<String>>>,
    path: PathBuf,
    size: (u32, u32),
    frames: u64,
}

impl FfmpegVideoSink {
    /// Close the input and wait for ffmpeg to finish the file.
    fn finish(&mut self) -> Result<(), ReleaseError> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child
            .wait()
            .map_err(|e| ReleaseError::new("video encoder", e.to_string()))?;
        let last_line = self
            .stderr_log
            .take()
            .and_then(|handle| handle.join().ok().flatten());
        if status.success() {
            return Ok(());
        }
        let message = match last_line {
            Some(line) => format!("ffmpeg exited with {}: {}", status, line),
            None => format!("ffmpeg exited with {}", status),
        };
        Err(ReleaseError::new("video encoder", message))
    }
}

impl VideoSink for FfmpegVideoSink {
    fn frame_size(&self) -> (u32, u32) {
        self.size
    }

    fn write_frame(&mut self, frame: &BgrFrame) -> Result<(), CaptureIoError> {
        if frame.size() != self.size {
            return Err(CaptureIoError::Write(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.size.0,
                self.size.1
            )));
        }
        let stdin = self.stdin.as_mut().ok_or(CaptureIoError::Disconnected)?;
        stdin.write_all(frame.as_bytes()).map_err(|e| match e.kind() {
            io::ErrorKind::BrokenPipe => CaptureIoError::Write("encoder exited".into()),
            _ => CaptureIoError::Write(e.to_string()),
        })?;
        self.frames += 1;
        Ok(())
    }

    fn release(mut self: Box<Self>) -> Result<(), ReleaseError> {
        self.finish()?;
        info!(path = %self.path.display(), frames = self.frames, "Video file finalized");
        Ok(())
    }
}

impl Drop for FfmpegVideoSink {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            warn!(error = %err, "Video encoder dropped without a clean finish");
        }
    }
}
