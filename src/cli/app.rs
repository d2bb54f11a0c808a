//! Recording runner for the default action

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use tokio::task;
use tracing::{debug, info, warn};

use crate::application::ports::ConfigStore;
use crate::application::{
    AudioCaptureEngine, RecordingSession, StopSummary, VideoCaptureEngine,
};
use crate::domain::capture::MediaKind;
use crate::domain::config::AppConfig;
use crate::domain::error::DurationParseError;
use crate::domain::recording::Duration;
use crate::infrastructure::{
    CaptureInput, CpalBackend, FfmpegScreenSource, FfmpegTool, FfmpegVideoSinkFactory,
    HoundWavSinkFactory, XdgConfigStore,
};

use super::presenter::Presenter;
use super::signals::{ShutdownReason, ShutdownSignal};

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Overrides the configured output directory
pub const ENV_OUTPUT_DIR: &str = "DESKREC_OUTPUT_DIR";
/// Overrides the configured ffmpeg executable
pub const ENV_FFMPEG: &str = "DESKREC_FFMPEG";

const STATUS_POLL: StdDuration = StdDuration::from_millis(250);

/// Resolved options for one recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOptions {
    pub output_dir: PathBuf,
    pub audio_device: Option<usize>,
    pub audio_only: bool,
    pub duration: Option<Duration>,
    pub ffmpeg: String,
    pub video_size: Option<(u32, u32)>,
    pub video_display: Option<String>,
}

impl RecordOptions {
    /// Resolve a merged config. The output directory falls back to the
    /// current directory.
    pub fn from_config(config: &AppConfig) -> Result<Self, DurationParseError> {
        Ok(Self {
            output_dir: config
                .output_dir
                .as_deref()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            audio_device: config.audio_device,
            audio_only: config.audio_only_or_default(),
            duration: config.duration_limit()?,
            ffmpeg: config.ffmpeg_or_default().to_string(),
            video_size: config.video_size_override(),
            video_display: config.video_display().map(str::to_string),
        })
    }
}

/// Why the recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopCause {
    Signal(ShutdownReason),
    DurationElapsed,
    EnginesStopped,
}

/// Record until interrupted, the duration elapses or both engines stop
pub async fn run_record(options: RecordOptions) -> ExitCode {
    let mut presenter = Presenter::new();

    let mut shutdown = ShutdownSignal::new();
    if let Err(e) = shutdown.setup().await {
        presenter.error(&format!("Failed to setup signal handler: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }

    if let Err(e) = tokio::fs::create_dir_all(&options.output_dir).await {
        presenter.error(&format!(
            "Cannot create output directory {}: {}",
            options.output_dir.display(),
            e
        ));
        return ExitCode::from(EXIT_ERROR);
    }

    let session = Arc::new(build_session(&options));

    let started = {
        let session = Arc::clone(&session);
        let dir = options.output_dir.clone();
        let (device, audio_only) = (options.audio_device, options.audio_only);
        task::spawn_blocking(move || session.start(&dir, device, audio_only)).await
    };
    match started {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            presenter.error(&e.to_string());
            let code = if e.is_user_error() {
                EXIT_USAGE_ERROR
            } else {
                EXIT_ERROR
            };
            return ExitCode::from(code);
        }
        Err(e) => {
            presenter.error(&format!("Session start panicked: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    }

    let limit_ms = options.duration.map(|d| d.as_millis());
    let message = presenter.format_recording(0, limit_ms);
    presenter.start_spinner(&message);

    let cause = wait_for_stop(&session, &mut shutdown, &presenter, options.duration).await;
    info!(?cause, "Stopping recording");
    let finishing = match cause {
        StopCause::Signal(reason) => format!("{} received, finalizing files...", reason),
        StopCause::DurationElapsed => "Duration reached, finalizing files...".to_string(),
        StopCause::EnginesStopped => "Capture ended, finalizing files...".to_string(),
    };
    presenter.update_spinner(&finishing);

    let summary = {
        let session = Arc::clone(&session);
        task::spawn_blocking(move || session.stop()).await
    };
    let summary = match summary {
        Ok(summary) => summary,
        Err(e) => {
            presenter.spinner_fail(&format!("Stopping the session panicked: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    report(&mut presenter, &session, &summary, cause)
}

async fn wait_for_stop(
    session: &RecordingSession,
    shutdown: &mut ShutdownSignal,
    presenter: &Presenter,
    limit: Option<Duration>,
) -> StopCause {
    let started = Instant::now();
    let limit_ms = limit.map(|d| d.as_millis());
    let mut ticker = tokio::time::interval(STATUS_POLL);
    let mut warned: Vec<MediaKind> = Vec::new();

    loop {
        tokio::select! {
            reason = shutdown.wait() => return StopCause::Signal(reason),
            _ = ticker.tick() => {
                let elapsed = started.elapsed();
                presenter.update_spinner(
                    &presenter.format_recording(elapsed.as_millis() as u64, limit_ms),
                );

                let status = session.status();
                for kind in status.stopped_engines() {
                    if !warned.contains(&kind) {
                        presenter.warn(&format!("{} capture stopped unexpectedly", kind));
                        warned.push(kind);
                    }
                }
                if status.all_engines_stopped() {
                    return StopCause::EnginesStopped;
                }
                if limit.is_some_and(|limit| elapsed >= limit.as_std()) {
                    return StopCause::DurationElapsed;
                }
            }
        }
    }
}

fn report(
    presenter: &mut Presenter,
    session: &RecordingSession,
    summary: &StopSummary,
    cause: StopCause,
) -> ExitCode {
    let failures = summary.failures();
    let dropped: usize = [summary.audio.as_ref(), summary.video.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(|result| result.as_ref().ok())
        .map(|report| report.dropped)
        .sum();

    if failures.is_empty() && cause != StopCause::EnginesStopped {
        presenter.spinner_success("Recording saved");
    } else {
        presenter.spinner_fail("Recording ended with errors");
    }
    for (kind, err) in &failures {
        presenter.error(&format!("{} capture failed: {}", kind, err));
    }
    if dropped > 0 {
        presenter.warn(&format!("{} audio frames were dropped", dropped));
    }

    for path in session.output_files() {
        if path.exists() {
            presenter.output_file(&path);
        } else {
            warn!(path = %path.display(), "Expected output file is missing");
        }
    }

    if failures.is_empty() {
        ExitCode::from(EXIT_SUCCESS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}

/// Wire the production adapters into a session
pub fn build_session(options: &RecordOptions) -> RecordingSession {
    let tool = FfmpegTool::new(options.ffmpeg.clone());

    let input = CaptureInput::platform_default(options.video_display.as_deref());
    let mut screen = FfmpegScreenSource::new(tool.clone(), input);
    if let Some((width, height)) = options.video_size {
        screen = screen.with_size(width, height);
    }

    let audio = AudioCaptureEngine::new(
        Arc::new(CpalBackend::new()),
        Arc::new(HoundWavSinkFactory::new()),
    );
    let video = VideoCaptureEngine::new(
        Arc::new(screen),
        Arc::new(FfmpegVideoSinkFactory::new(tool)),
    );
    RecordingSession::new(audio, video)
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %store.path().display(), error = %e, "Ignoring unreadable config file");
            AppConfig::empty()
        }
    };
    debug!(path = %store.path().display(), "Config loaded");

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config())
        .merge(cli_config)
}

fn env_config() -> AppConfig {
    let var = |name: &str| env::var(name).ok().filter(|s| !s.is_empty());
    AppConfig {
        output_dir: var(ENV_OUTPUT_DIR),
        ffmpeg: var(ENV_FFMPEG),
        ..AppConfig::empty()
    }
}
