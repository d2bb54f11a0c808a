//! Microphone capture engine

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::flag::RecordingFlag;
use super::LoopReport;
use crate::application::ports::{
    AudioBackend, AudioContext, AudioDeviceInfo, AudioInputStream, CaptureIoError, PcmSink,
    PcmSinkFactory, StartFailure,
};
use crate::domain::capture::{AudioFormat, AudioFrameBuffer, MediaKind, AUDIO_FILE_NAME};

/// Captures one input device into `output.wav`.
///
/// The engine is reusable: every `start` opens a fresh device context,
/// stream and sink, and every `stop` releases them again.
pub struct AudioCaptureEngine {
    backend: Arc<dyn AudioBackend>,
    sinks: Arc<dyn PcmSinkFactory>,
    format: AudioFormat,
    recording: RecordingFlag,
    state: Mutex<EngineState>,
}

#[derive(Default)]
struct EngineState {
    output_path: Option<PathBuf>,
    /// Handles of the current run while no loop owns them
    resources: Option<AudioResources>,
    loop_active: bool,
}

/// Handles opened by one `start`.
#[derive(Default)]
struct AudioResources {
    stream: Option<Box<dyn AudioInputStream>>,
    sink: Option<Box<dyn PcmSink>>,
    context: Option<Box<dyn AudioContext>>,
}

impl AudioResources {
    /// Release stream, sink and context in that order. Each step runs even
    /// if an earlier one failed.
    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.stop() {
                warn!(error = %err, "Audio stream did not stop cleanly");
            }
            if let Err(err) = stream.close() {
                warn!(error = %err, "Audio stream did not close cleanly");
            }
        }
        if let Some(sink) = self.sink.take() {
            if let Err(err) = sink.close() {
                warn!(error = %err, "WAV sink did not close cleanly");
            }
        }
        if let Some(context) = self.context.take() {
            if let Err(err) = context.terminate() {
                warn!(error = %err, "Audio context did not terminate cleanly");
            }
        }
    }
}

impl Drop for AudioResources {
    fn drop(&mut self) {
        self.release();
    }
}

/// Resources owned by a running loop. Dropping it hands them back and
/// calls `stop`, so every loop exit releases the devices.
struct CheckedOut<'a> {
    engine: &'a AudioCaptureEngine,
    resources: AudioResources,
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

impl AudioCaptureEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, sinks: Arc<dyn PcmSinkFactory>) -> Self {
        Self {
            backend,
            sinks,
            format: AudioFormat::STANDARD,
            recording: RecordingFlag::new(),
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// List the input devices `start` can be pointed at.
    pub fn input_devices(&self) -> Result<Vec<AudioDeviceInfo>, StartFailure> {
        self.backend.input_devices()
    }

    /// Open the device and the WAV sink for a new run.
    ///
    /// # Arguments
    /// * `output_dir` - Existing directory receiving `output.wav`
    /// * `device_index` - Input device index from [`Self::input_devices`]
    ///
    /// On failure everything opened so far is released before returning.
    pub fn start(&self, output_dir: &Path, device_index: usize) -> Result<(), StartFailure> {
        let mut state = self.state.lock();
        if self.recording.is_set() || state.loop_active || state.resources.is_some() {
            return Err(StartFailure::AlreadyRunning(MediaKind::Audio));
        }

        let path = output_dir.join(AUDIO_FILE_NAME);
        let mut resources = AudioResources::default();
        if let Err(err) = self.open(&mut resources, &path, device_index) {
            error!(error = %err, device = device_index, "Audio start failed, rolling back");
            resources.release();
            return Err(err);
        }

        state.resources = Some(resources);
        state.output_path = Some(path.clone());
        self.recording.raise();
        info!(
            path = %path.display(),
            device = device_index,
            format = %self.format,
            "Audio capture started"
        );
        Ok(())
    }

    fn open(
        &self,
        resources: &mut AudioResources,
        path: &Path,
        device_index: usize,
    ) -> Result<(), StartFailure> {
        let context = resources.context.insert(self.backend.open_context()?);
        resources.stream = Some(context.open_input(device_index, self.format)?);
        resources.sink = Some(self.sinks.create(path, self.format)?);
        Ok(())
    }

    /// Pump chunks into memory until stopped, then write them out once.
    ///
    /// Overflowed and timed-out reads are absorbed. Any other read error
    /// ends the run; whatever was captured before it is still written.
    /// Returns immediately when the engine has not been started.
    pub fn run_capture_loop(&self) -> Result<LoopReport, CaptureIoError> {
        let Some(mut run) = self.check_out() else {
            debug!("Audio loop started with nothing to capture");
            return Ok(LoopReport::empty(MediaKind::Audio));
        };

        let mut buffer = AudioFrameBuffer::new();
        let mut dropped = 0;
        let mut failure = None;

        while self.recording.is_set() {
            let Some(stream) = run.resources.stream.as_mut() else {
                break;
            };
            match stream.read_chunk() {
                Ok(chunk) => buffer.push(chunk),
                Err(CaptureIoError::Overflow { dropped_frames }) => {
                    dropped += dropped_frames;
                    debug!(dropped_frames, "Audio input overflowed, chunk lost");
                }
                Err(err) if err.is_transient() => debug!(error = %err, "Audio read retried"),
                Err(err) => {
                    error!(error = %err, "Audio capture failed");
                    failure = Some(err);
                    break;
                }
            }
        }

        let frames = buffer.frame_count(self.format.channels);
        let written = match Self::flush(&mut run.resources, buffer) {
            Ok(()) => frames,
            Err(err) => {
                error!(error = %err, frames, "Failed to write captured audio");
                failure.get_or_insert(err);
                0
            }
        };
        drop(run);

        info!(frames = written, dropped, "Audio capture finished");
        match failure {
            Some(err) => Err(err),
            None => Ok(LoopReport {
                kind: MediaKind::Audio,
                units_written: written,
                dropped,
            }),
        }
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

    fn flush(resources: &mut AudioResources, buffer: AudioFrameBuffer) -> Result<(), CaptureIoError> {
        if buffer.is_empty() {
            return Ok(());
        }
        match resources.sink.as_mut() {
            Some(sink) => sink.write_chunks(buffer.chunks()),
            None => Ok(()),
        }
    }

    /// Lower the flag, then release whatever no loop currently owns.
    ///
    /// Idempotent. A running loop notices the flag on its next iteration and
    /// releases its own handles on exit.
    pub fn stop(&self) {
        let (was_recording, resources) = {
            let mut state = self.state.lock();
            (self.recording.lower(), state.resources.take())
        };
        if let Some(mut resources) = resources {
            resources.release();
            debug!("Audio resources released");
        }
        if was_recording {
            info!("Audio capture stopped");
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_set()
    }

    /// Path chosen by the most recent successful `start`
    pub fn get_output_path(&self) -> Option<PathBuf> {
        self.state.lock().output_path.clone()
    }
}

impl Drop for AudioCaptureEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
