//! Recording session: one audio and one video engine under a single start/stop

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::capture::{AudioCaptureEngine, LoopReport, VideoCaptureEngine};
use super::ports::{AudioDeviceInfo, CaptureIoError, StartFailure};
use crate::domain::capture::MediaKind;
use crate::domain::session::{InvalidStateTransition, SessionState, SessionStateMachine};

/// Errors from starting a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Output directory must not be empty")]
    EmptyOutputDir,

    #[error("Output directory does not exist: {}", .0.display())]
    OutputDirMissing(PathBuf),

    #[error("No audio input device available")]
    NoAudioDevice,

    #[error("No audio input device at index {index} ({available} available, see 'deskrec devices')")]
    DeviceNotFound { index: usize, available: usize },

    #[error(transparent)]
    Start(#[from] StartFailure),

    #[error("Failed to spawn {kind} capture thread: {message}")]
    Spawn { kind: MediaKind, message: String },

    #[error(transparent)]
    InvalidState(#[from] InvalidStateTransition),
}

impl SessionError {
    /// Whether the caller asked for something impossible, as opposed to a
    /// device or system failure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyOutputDir
                | Self::OutputDirMissing(_)
                | Self::NoAudioDevice
                | Self::DeviceNotFound { .. }
                | Self::InvalidState(_)
        )
    }
}

type LoopResult = Result<LoopReport, CaptureIoError>;

/// How each acquisition loop of a stopped session ended.
/// `None` for an engine that was not part of the run.
#[derive(Debug, Default)]
pub struct StopSummary {
    pub audio: Option<LoopResult>,
    pub video: Option<LoopResult>,
}

impl StopSummary {
    /// True when `stop` had nothing to stop
    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }

    /// Loop failures, in audio then video order
    pub fn failures(&self) -> Vec<(MediaKind, &CaptureIoError)> {
        [
            (MediaKind::Audio, self.audio.as_ref()),
            (MediaKind::Video, self.video.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, result)| match result {
            Some(Err(err)) => Some((kind, err)),
            _ => None,
        })
        .collect()
    }
}

/// Snapshot of the session and its engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub audio_recording: bool,
    pub video_recording: bool,
    /// Whether the current or last run included video
    pub video_active: bool,
}

impl SessionStatus {
    /// Engines of a running session that have stopped on their own
    pub fn stopped_engines(&self) -> Vec<MediaKind> {
        if self.state != SessionState::Recording {
            return Vec::new();
        }
        let mut stopped = Vec::new();
        if !self.audio_recording {
            stopped.push(MediaKind::Audio);
        }
        if self.video_active && !self.video_recording {
            stopped.push(MediaKind::Video);
        }
        stopped
    }

    /// Whether every engine of a running session has stopped on its own
    pub fn all_engines_stopped(&self) -> bool {
        self.state == SessionState::Recording
            && !self.audio_recording
            && (!self.video_active || !self.video_recording)
    }
}

#[derive(Default)]
struct SessionInner {
    machine: SessionStateMachine,
    video_active: bool,
    audio_loop: Option<JoinHandle<LoopResult>>,
    video_loop: Option<JoinHandle<LoopResult>>,
}

/// Pairs one audio and one video engine for the session's whole lifetime.
///
/// The engines are reused across start/stop cycles. Each running loop lives
/// on its own named thread; `stop` joins both before returning.
pub struct RecordingSession {
    audio: Arc<AudioCaptureEngine>,
    video: Arc<VideoCaptureEngine>,
    inner: Mutex<SessionInner>,
}

impl RecordingSession {
    pub fn new(audio: AudioCaptureEngine, video: VideoCaptureEngine) -> Self {
        Self {
            audio: Arc::new(audio),
            video: Arc::new(video),
            inner: Mutex::new(SessionInner::default()),
        }
    }

    pub fn audio_engine(&self) -> &AudioCaptureEngine {
        &self.audio
    }

    pub fn video_engine(&self) -> &VideoCaptureEngine {
        &self.video
    }

    pub fn input_devices(&self) -> Result<Vec<AudioDeviceInfo>, StartFailure> {
        self.audio.input_devices()
    }

    /// Open the engines and launch their loops. Returns without waiting.
    ///
    /// # Arguments
    /// * `output_dir` - Existing directory receiving the output files
    /// * `device_index` - Audio input device; the first device when `None`
    /// * `audio_only` - Skip the video engine entirely
    ///
    /// Invalid arguments are rejected without touching the engines. If an
    /// engine fails to start, the other one is stopped before the error is
    /// returned and the session stays idle.
    pub fn start(
        &self,
        output_dir: &Path,
        device_index: Option<usize>,
        audio_only: bool,
    ) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();

        Self::validate_output_dir(output_dir)?;
        let device = self.resolve_device(device_index)?;

        inner.machine.begin_start()?;
        match self.launch(&mut inner, output_dir, device, audio_only) {
            Ok(()) => {
                inner.machine.confirm_started()?;
                info!(
                    dir = %output_dir.display(),
                    device,
                    audio_only,
                    "Recording session started"
                );
                Ok(())
            }
            Err(err) => {
                inner.machine.abort_start()?;
                error!(error = %err, "Recording session failed to start");
                Err(err)
            }
        }
    }

    fn validate_output_dir(dir: &Path) -> Result<(), SessionError> {
        if dir.as_os_str().is_empty() {
            return Err(SessionError::EmptyOutputDir);
        }
        if !dir.is_dir() {
            return Err(SessionError::OutputDirMissing(dir.to_path_buf()));
        }
        Ok(())
    }

    fn resolve_device(&self, requested: Option<usize>) -> Result<usize, SessionError> {
        let devices = self.audio.input_devices()?;
        match requested {
            Some(index) if devices.iter().any(|d| d.index == index) => Ok(index),
            Some(index) => Err(SessionError::DeviceNotFound {
                index,
                available: devices.len(),
            }),
            None => devices
                .first()
                .map(|d| d.index)
                .ok_or(SessionError::NoAudioDevice),
        }
    }

    /// Video opens first so an audio failure can be rolled back without
    /// ever having captured audio; loops launch audio first.
    ///
    /// Start skew therefore runs video ahead of audio: the audio device is
    /// opened only after the grabber and encoder are up, so the first frame
    /// of output.mp4 can predate the first sample of output.wav by the audio
    /// open latency.
    fn launch(
        &self,
        inner: &mut SessionInner,
        output_dir: &Path,
        device: usize,
        audio_only: bool,
    ) -> Result<(), SessionError> {
        if !audio_only {
            self.video.start(output_dir)?;
        }
        if let Err(err) = self.audio.start(output_dir, device) {
            self.video.stop();
            return Err(err.into());
        }

        let audio = Arc::clone(&self.audio);
        let audio_loop = match spawn_loop(MediaKind::Audio, move || audio.run_capture_loop()) {
            Ok(handle) => handle,
            Err(err) => {
                self.halt_engines();
                return Err(err);
            }
        };

        let video_loop = if audio_only {
            None
        } else {
            let video = Arc::clone(&self.video);
            match spawn_loop(MediaKind::Video, move || video.run_capture_loop()) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    self.halt_engines();
                    join_loop(audio_loop, MediaKind::Audio).ok();
                    return Err(err);
                }
            }
        };

        inner.video_active = !audio_only;
        inner.audio_loop = Some(audio_loop);
        inner.video_loop = video_loop;
        Ok(())
    }

    fn halt_engines(&self) {
        self.audio.stop();
        self.video.stop();
    }

    /// Stop both engines and wait for their loops to finish.
    ///
    /// A no-op returning an empty summary unless the session is recording.
    /// When this returns, both output files are finalised.
    pub fn stop(&self) -> StopSummary {
        let (audio_loop, video_loop) = {
            let mut inner = self.inner.lock();
            if let Err(err) = inner.machine.begin_stop() {
                debug!(error = %err, "Ignoring stop");
                return StopSummary::default();
            }
            self.audio.stop();
            if inner.video_active {
                self.video.stop();
            }
            (inner.audio_loop.take(), inner.video_loop.take())
        };

        let summary = StopSummary {
            audio: audio_loop.map(|handle| join_loop(handle, MediaKind::Audio)),
            video: video_loop.map(|handle| join_loop(handle, MediaKind::Video)),
        };

        if let Err(err) = self.inner.lock().machine.finish_stop() {
            warn!(error = %err, "Session left stopping state unexpectedly");
        }
        info!("Recording session stopped");
        summary
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().machine.state()
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.inner.lock();
        SessionStatus {
            state: inner.machine.state(),
            audio_recording: self.audio.is_recording(),
            video_recording: self.video.is_recording(),
            video_active: inner.video_active,
        }
    }

    pub fn audio_output_path(&self) -> Option<PathBuf> {
        self.audio.get_output_path()
    }

    /// Video path of the most recent run that included video
    pub fn video_output_path(&self) -> Option<PathBuf> {
        self.video.get_output_path()
    }

    /// Files produced by the current or most recent run
    pub fn output_files(&self) -> Vec<PathBuf> {
        let video_active = self.inner.lock().video_active;
        let mut files: Vec<PathBuf> = self.audio_output_path().into_iter().collect();
        if video_active {
            files.extend(self.video_output_path());
        }
        files
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_loop<F>(kind: MediaKind, body: F) -> Result<JoinHandle<LoopResult>, SessionError>
where
    F: FnOnce() -> LoopResult + Send + 'static,
{
    thread::Builder::new()
        .name(format!("deskrec-{kind}"))
        .spawn(body)
        .map_err(|e| SessionError::Spawn {
            kind,
            message: e.to_string(),
        })
}

fn join_loop(handle: JoinHandle<LoopResult>, kind: MediaKind) -> LoopResult {
    handle.join().unwrap_or_else(|_| {
        error!(%kind, "Capture thread panicked");
        Err(CaptureIoError::Panicked(kind))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fakes::{
        wait_until, MockAudioBackend, MockPcmSinkFactory, MockScreen, MockVideoSinkFactory,
        CallLog, Read,
    };
    use tempfile::TempDir;

    struct Fixture {
        calls: Arc<CallLog>,
        backend: MockAudioBackend,
        screen: MockScreen,
    }

    impl Fixture {
        fn new() -> Self {
            let calls = CallLog::new();
            Self {
                backend: MockAudioBackend::new(Arc::clone(&calls)),
                screen: MockScreen::new(Arc::clone(&calls)),
                calls,
            }
        }

        fn session(self) -> (RecordingSession, Arc<CallLog>) {
            let audio = AudioCaptureEngine::new(
                Arc::new(self.backend),
                Arc::new(MockPcmSinkFactory::new(Arc::clone(&self.calls))),
            );
            let video = VideoCaptureEngine::new(
                Arc::new(self.screen),
                Arc::new(MockVideoSinkFactory::new(Arc::clone(&self.calls))),
            );
            (RecordingSession::new(audio, video), self.calls)
        }
    }

    fn tempdir() -> TempDir {
        TempDir::new().unwrap()
    }

    #[test]
    fn rejects_empty_output_dir() {
        let (session, calls) = Fixture::new().session();

        let err = session.start(Path::new(""), None, false).unwrap_err();

        assert!(matches!(err, SessionError::EmptyOutputDir));
        assert!(err.is_user_error());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(calls.events().is_empty());
    }

    #[test]
    fn rejects_missing_output_dir() {
        let (session, calls) = Fixture::new().session();
        let dir = tempdir();
        let missing = dir.path().join("nope");

        let err = session.start(&missing, None, false).unwrap_err();

        assert!(matches!(err, SessionError::OutputDirMissing(path) if path == missing));
        assert!(calls.events().is_empty());
    }

    #[test]
    fn rejects_unknown_device() {
        let (session, calls) = Fixture::new().session();
        let dir = tempdir();

        let err = session.start(dir.path(), Some(9), false).unwrap_err();

        assert!(matches!(
            err,
            SessionError::DeviceNotFound {
                index: 9,
                available: 2
            }
        ));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(calls.events().is_empty());
    }

    #[test]
    fn rejects_when_no_device_exists() {
        let mut fixture = Fixture::new();
        fixture.backend.devices.clear();
        let (session, _calls) = fixture.session();
        let dir = tempdir();

        let err = session.start(dir.path(), None, true).unwrap_err();

        assert!(matches!(err, SessionError::NoAudioDevice));
    }

    #[test]
    fn video_is_opened_before_audio() {
        let (session, calls) = Fixture::new().session();
        let dir = tempdir();

        session.start(dir.path(), Some(1), false).unwrap();
        session.stop();

        let events = calls.events();
        let first = |name: &str| events.iter().position(|e| *e == name).unwrap();
        assert!(first("grabber.open") < first("context.open"));
        assert!(first("video.create") < first("pcm.create"));
        assert!(first("video.create") < first("stream.open"));
    }

    #[test]
    fn records_both_streams_until_stopped() {
        let (session, calls) = Fixture::new().session();
        let dir = tempdir();

        session.start(dir.path(), Some(1), false).unwrap();
        assert_eq!(session.state(), SessionState::Recording);
        let status = session.status();
        assert!(status.audio_recording && status.video_recording);
        assert!(status.stopped_engines().is_empty());

        assert!(wait_until(|| calls.count("video.frame") >= 2
            && calls.count("stream.read") >= 2));
        let summary = session.stop();

        assert_eq!(session.state(), SessionState::Idle);
        let audio = summary.audio.unwrap().unwrap();
        let video = summary.video.unwrap().unwrap();
        assert!(audio.units_written > 0);
        assert!(video.units_written >= 2);
        assert_eq!(calls.count("pcm.write"), 1);
        assert_eq!(calls.count("pcm.close"), 1);
        assert_eq!(calls.count("video.release"), 1);

        let files = session.output_files();
        assert_eq!(
            files,
            vec![dir.path().join("output.wav"), dir.path().join("output.mp4")]
        );
    }

    #[test]
    fn immediate_stop_joins_both_loops() {
        let (session, calls) = Fixture::new().session();
        let dir = tempdir();

        session.start(dir.path(), None, false).unwrap();
        let summary = session.stop();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(summary.audio.unwrap().is_ok());
        assert!(summary.video.unwrap().is_ok());
        assert!(!session.audio_engine().is_recording());
        assert!(!session.video_engine().is_recording());
        for event in ["pcm.create", "pcm.close", "video.create", "video.release", "grabber.close"] {
            assert_eq!(calls.count(event), 1, "{event}");
        }
    }

    #[test]
    fn audio_only_never_starts_video() {
        let (session, calls) = Fixture::new().session();
        let dir = tempdir();

        session.start(dir.path(), None, true).unwrap();
        assert!(!session.status().video_active);
        assert!(!session.video_engine().is_recording());
        let summary = session.stop();

        assert!(summary.video.is_none());
        assert_eq!(calls.count("video.create"), 0);
        assert_eq!(calls.count("grabber.open"), 0);
        assert_eq!(session.output_files(), vec![dir.path().join("output.wav")]);
    }

    #[test]
    fn audio_failure_stops_started_video() {
        let mut fixture = Fixture::new();
        fixture.backend.fail_open = true;
        let (session, calls) = fixture.session();
        let dir = tempdir();

        let err = session.start(dir.path(), None, false).unwrap_err();

        assert!(matches!(
            err,
            SessionError::Start(StartFailure::DeviceOpen {
                kind: MediaKind::Audio,
                ..
            })
        ));
        assert!(!err.is_user_error());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.video_engine().is_recording());
        assert_eq!(calls.count("video.create"), 1);
        assert_eq!(calls.count("video.release"), 1);
        assert_eq!(calls.count("grabber.open"), 1);
        assert_eq!(calls.count("grabber.close"), 1);
        assert_eq!(calls.count("context.terminate"), 1);
    }

    #[test]
    fn video_failure_leaves_audio_untouched() {
        let mut fixture = Fixture::new();
        fixture.screen.fail_display = true;
        let (session, calls) = fixture.session();
        let dir = tempdir();

        let err = session.start(dir.path(), None, false).unwrap_err();

        assert!(matches!(err, SessionError::Start(StartFailure::DisplayQuery(_))));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(calls.count("context.open"), 0);
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let (session, calls) = Fixture::new().session();

        assert!(session.stop().is_empty());
        assert!(session.stop().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.output_files().is_empty());
        assert!(calls.events().is_empty());
    }

    #[test]
    fn start_while_recording_is_rejected() {
        let (session, _calls) = Fixture::new().session();
        let dir = tempdir();

        session.start(dir.path(), None, true).unwrap();
        let err = session.start(dir.path(), None, true).unwrap_err();

        assert!(matches!(err, SessionError::InvalidState(_)));
        assert_eq!(session.state(), SessionState::Recording);
        session.stop();
    }

    #[test]
    fn engine_failure_mid_run_is_visible_in_status() {
        let mut fixture = Fixture::new();
        fixture.backend = fixture.backend.with_script([Read::Fail]);
        let (session, _calls) = fixture.session();
        let dir = tempdir();

        session.start(dir.path(), None, false).unwrap();
        assert!(wait_until(|| !session.audio_engine().is_recording()));

        let status = session.status();
        assert_eq!(status.state, SessionState::Recording);
        assert_eq!(status.stopped_engines(), vec![MediaKind::Audio]);
        assert!(!status.all_engines_stopped());

        let summary = session.stop();
        assert_eq!(summary.failures().len(), 1);
        assert_eq!(summary.failures()[0].0, MediaKind::Audio);
        assert!(summary.video.unwrap().is_ok());
    }

    #[test]
    fn session_can_record_repeatedly() {
        let (session, calls) = Fixture::new().session();
        let dir = tempdir();

        for cycle in 1..=3 {
            session.start(dir.path(), None, false).unwrap();
            assert!(session.audio_engine().is_recording());
            let summary = session.stop();
            assert!(summary.failures().is_empty());
            assert_eq!(calls.count("pcm.close"), cycle);
            assert_eq!(calls.count("video.release"), cycle);
        }
    }
}
