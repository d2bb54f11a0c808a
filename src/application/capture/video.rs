//! Screen capture engine

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::flag::RecordingFlag;
use super::LoopReport;
use crate::application::ports::{
    CaptureIoError, ScreenGrabber, ScreenSource, StartFailure, VideoSink, VideoSinkFactory,
    VideoSinkSpec,
};
use crate::domain::capture::{DisplayBounds, MediaKind, VideoFormat, VIDEO_FILE_NAME};

/// Captures the primary display into `output.mp4`, one frame at a time.
pub struct VideoCaptureEngine {
    screen: Arc<dyn ScreenSource>,
    sinks: Arc<dyn VideoSinkFactory>,
    format: VideoFormat,
    recording: RecordingFlag,
    state: Mutex<EngineState>,
}

#[derive(Default)]
struct EngineState {
    output_path: Option<PathBuf>,
    region: Option<DisplayBounds>,
    resources: Option<VideoResources>,
    loop_active: bool,
}

#[derive(Default)]
struct VideoResources {
    grabber: Option<Box<dyn ScreenGrabber>>,
    sink: Option<Box<dyn VideoSink>>,
}

impl VideoResources {
    fn release(&mut self) {
        if let Some(grabber) = self.grabber.take() {
            if let Err(err) = grabber.close() {
                warn!(error = %err, "Screen grabber did not close cleanly");
            }
        }
        if let Some(sink) = self.sink.take() {
            if let Err(err) = sink.release() {
                warn!(error = %err, "Video encoder did not finalise cleanly");
            }
        }
    }
}

impl Drop for VideoResources {
    fn drop(&mut self) {
        self.release();
    }
}

struct CheckedOut<'a> {
    engine: &'a VideoCaptureEngine,
    resources: VideoResources,
}

impl Drop for CheckedOut<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.engine.state.lock();
            state.loop_active = false;
            state.resources = Some(mem::take(&mut self.resources));
        }
        self.engine.stop();
    }
}

impl VideoCaptureEngine {
    pub fn new(screen: Arc<dyn ScreenSource>, sinks: Arc<dyn VideoSinkFactory>) -> Self {
        Self {
            screen,
            sinks,
            format: VideoFormat::STANDARD,
            recording: RecordingFlag::new(),
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    /// Capture region of the current or most recent run
    pub fn region(&self) -> Option<DisplayBounds> {
        self.state.lock().region
    }

    /// Query the primary display and open a grabber plus an encoder sized to it.
    pub fn start(&self, output_dir: &Path) -> Result<(), StartFailure> {
        let mut state = self.state.lock();
        if self.recording.is_set() || state.loop_active || state.resources.is_some() {
            return Err(StartFailure::AlreadyRunning(MediaKind::Video));
        }

        let path = output_dir.join(VIDEO_FILE_NAME);
        let mut resources = VideoResources::default();
        let region = match self.open(&mut resources, &path) {
            Ok(region) => region,
            Err(err) => {
                error!(error = %err, "Video start failed, rolling back");
                resources.release();
                return Err(err);
            }
        };

        state.resources = Some(resources);
        state.region = Some(region);
        state.output_path = Some(path.clone());
        self.recording.raise();
        info!(
            path = %path.display(),
            region = %region,
            fps = self.format.fps,
            codec = %self.format.codec_tag,
            "Video capture started"
        );
        Ok(())
    }

    fn open(&self, resources: &mut VideoResources, path: &Path) -> Result<DisplayBounds, StartFailure> {
        let region = self.screen.primary_display()?;
        let spec = VideoSinkSpec {
            format: self.format,
            width: region.width,
            height: region.height,
        };
        resources.sink = Some(self.sinks.create(path, spec)?);
        resources.grabber = Some(self.screen.open_grabber(region, self.format)?);
        Ok(region)
    }

    /// Grab, convert, resize and encode frames until stopped.
    ///
    /// Any grab or encode failure ends the run and is returned after the
    /// engine has stopped itself.
    pub fn run_capture_loop(&self) -> Result<LoopReport, CaptureIoError> {
        let Some(mut run) = self.check_out() else {
            debug!("Video loop started with nothing to capture");
            return Ok(LoopReport::empty(MediaKind::Video));
        };

        let mut frames = 0;
        let mut failure = None;

        while self.recording.is_set() {
            let VideoResources {
                grabber: Some(grabber),
                sink: Some(sink),
            } = &mut run.resources
            else {
                break;
            };
            match Self::capture_frame(&mut **grabber, &mut **sink) {
                Ok(()) => frames += 1,
                Err(err) => {
                    error!(error = %err, frames, "Video capture failed");
                    failure = Some(err);
                    break;
                }
            }
        }
        drop(run);

        info!(frames, "Video capture finished");
        match failure {
            Some(err) => Err(err),
            None => Ok(LoopReport {
                kind: MediaKind::Video,
                units_written: frames,
                dropped: 0,
            }),
        }
    }

    fn capture_frame(
        grabber: &mut dyn ScreenGrabber,
        sink: &mut dyn VideoSink,
    ) -> Result<(), CaptureIoError> {
        let raw = grabber.grab()?;
        let (width, height) = sink.frame_size();
        let frame = raw.to_bgr().resize(width, height)?;
        sink.write_frame(&frame)
    }

    fn check_out(&self) -> Option<CheckedOut<'_>> {
        let mut state = self.state.lock();
        let resources = state.resources.take()?;
        state.loop_active = true;
        Some(CheckedOut {
            engine: self,
            resources,
        })
    }

    /// Lower the flag and finalise the container if no loop owns it.
    /// Idempotent; fine to call when the sink was never opened.
    pub fn stop(&self) {
        let (was_recording, resources) = {
            let mut state = self.state.lock();
            (self.recording.lower(), state.resources.take())
        };
        if let Some(mut resources) = resources {
            resources.release();
            debug!("Video resources released");
        }
        if was_recording {
            info!("Video capture stopped");
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_set()
    }

    pub fn get_output_path(&self) -> Option<PathBuf> {
        self.state.lock().output_path.clone()
    }
}

impl Drop for VideoCaptureEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fakes::{wait_until, MockScreen, MockVideoSinkFactory, CallLog};
    use std::thread;

    fn engine_with(screen: MockScreen, sinks: MockVideoSinkFactory) -> Arc<VideoCaptureEngine> {
        Arc::new(VideoCaptureEngine::new(Arc::new(screen), Arc::new(sinks)))
    }

    fn engine(calls: &Arc<CallLog>) -> Arc<VideoCaptureEngine> {
        engine_with(
            MockScreen::new(Arc::clone(calls)),
            MockVideoSinkFactory::new(Arc::clone(calls)),
        )
    }

    #[test]
    fn stop_before_start_is_harmless() {
        let calls = CallLog::new();
        let engine = engine(&calls);

        engine.stop();

        assert!(!engine.is_recording());
        assert!(engine.get_output_path().is_none());
        assert!(calls.events().is_empty());
    }

    #[test]
    fn start_sizes_sink_to_display() {
        let calls = CallLog::new();
        let engine = engine(&calls);

        engine.start(Path::new("/recordings")).unwrap();

        assert!(engine.is_recording());
        assert!(engine.get_output_path().unwrap().ends_with("output.mp4"));
        assert_eq!(engine.region(), Some(DisplayBounds::at_origin(8, 6)));
        engine.stop();
        engine.stop();
        assert_eq!(calls.count("grabber.close"), 1);
        assert_eq!(calls.count("video.release"), 1);
    }

    #[test]
    fn loop_writes_frames_until_stopped() {
        let calls = CallLog::new();
        let engine = engine(&calls);

        engine.start(Path::new("/recordings")).unwrap();
        let handle = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.run_capture_loop())
        };
        assert!(wait_until(|| calls.count("video.frame") >= 3));
        engine.stop();
        let report = handle.join().unwrap().unwrap();

        assert!(!engine.is_recording());
        assert_eq!(report.units_written, calls.count("video.frame"));
        assert_eq!(calls.count("video.release"), 1);
    }

    #[test]
    fn mismatched_frames_are_resized() {
        let calls = CallLog::new();
        let mut screen = MockScreen::new(Arc::clone(&calls));
        screen.grab_size = Some((16, 12));
        let engine = engine_with(screen, MockVideoSinkFactory::new(Arc::clone(&calls)));

        engine.start(Path::new("/recordings")).unwrap();
        let handle = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.run_capture_loop())
        };
        assert!(wait_until(|| calls.count("video.frame") >= 2));
        engine.stop();

        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn grab_failure_is_fatal_to_the_run() {
        let calls = CallLog::new();
        let mut screen = MockScreen::new(Arc::clone(&calls));
        screen.fail_grab_at = Some(3);
        let engine = engine_with(screen, MockVideoSinkFactory::new(Arc::clone(&calls)));

        engine.start(Path::new("/recordings")).unwrap();
        let err = engine.run_capture_loop().unwrap_err();

        assert!(matches!(err, CaptureIoError::Disconnected));
        assert!(!engine.is_recording());
        assert_eq!(calls.count("video.frame"), 2);
        assert_eq!(calls.count("grabber.close"), 1);
        assert_eq!(calls.count("video.release"), 1);
    }

    #[test]
    fn grabber_failure_releases_sink() {
        let calls = CallLog::new();
        let mut screen = MockScreen::new(Arc::clone(&calls));
        screen.fail_grabber = true;
        let engine = engine_with(screen, MockVideoSinkFactory::new(Arc::clone(&calls)));

        let err = engine.start(Path::new("/recordings")).unwrap_err();

        assert!(matches!(err, StartFailure::DeviceOpen { kind: MediaKind::Video, .. }));
        assert!(!engine.is_recording());
        assert_eq!(calls.count("video.create"), 1);
        assert_eq!(calls.count("video.release"), 1);
    }

    #[test]
    fn display_query_failure_opens_nothing() {
        let calls = CallLog::new();
        let mut screen = MockScreen::new(Arc::clone(&calls));
        screen.fail_display = true;
        let engine = engine_with(screen, MockVideoSinkFactory::new(Arc::clone(&calls)));

        let err = engine.start(Path::new("/recordings")).unwrap_err();

        assert!(matches!(err, StartFailure::DisplayQuery(_)));
        assert!(calls.events().is_empty());
        assert!(engine.get_output_path().is_none());
    }

    #[test]
    fn engine_restarts_after_stop() {
        let calls = CallLog::new();
        let engine = engine(&calls);

        for cycle in 1..=2 {
            engine.start(Path::new("/recordings")).unwrap();
            engine.stop();
            assert_eq!(calls.count("video.create"), cycle);
            assert_eq!(calls.count("video.release"), cycle);
        }
    }
}
