//! Audio input adapter using cpal
//!
//! cpal hosts and streams are not `Send`, so each capture context runs a
//! dedicated host thread that owns them. The engine talks to it over
//! channels: commands go in, fixed-size PCM chunks come out.

use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, HostId, Sample, SampleFormat, SizedSample, StreamConfig};
use tracing::{debug, info, warn};

use crate::application::ports::{
    AudioBackend, AudioContext, AudioDeviceInfo, AudioInputStream, CaptureIoError, ReleaseError,
    StartFailure,
};
use crate::domain::capture::{AudioFormat, MediaKind};

/// Chunks buffered between the device callback and the capture loop
const CHUNK_QUEUE_DEPTH: usize = 64;

/// Read timeout, in chunk periods
const READ_TIMEOUT_CHUNKS: u32 = 4;

fn subsystem_error(message: impl Into<String>) -> StartFailure {
    StartFailure::Subsystem {
        kind: MediaKind::Audio,
        message: message.into(),
    }
}

fn device_error(message: impl Into<String>) -> StartFailure {
    StartFailure::DeviceOpen {
        kind: MediaKind::Audio,
        message: message.into(),
    }
}

/// Audio backend on the platform's default cpal host
pub struct CpalBackend {
    host_id: HostId,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host_id: cpal::default_host().id(),
        }
    }

    fn host(&self) -> Result<cpal::Host, StartFailure> {
        cpal::host_from_id(self.host_id).map_err(|e| subsystem_error(e.to_string()))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn input_devices(&self) -> Result<Vec<AudioDeviceInfo>, StartFailure> {
        let host = self.host()?;
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| subsystem_error(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| {
                let name = device
                    .name()
                    .unwrap_or_else(|_| format!("Input device {index}"));
                let is_default = default_name.as_deref() == Some(name.as_str());
                AudioDeviceInfo {
                    index,
                    name,
                    is_default,
                }
            })
            .collect())
    }

    fn open_context(&self) -> Result<Box<dyn AudioContext>, StartFailure> {
        let (commands, inbox) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let host_id = self.host_id;

        let thread = thread::Builder::new()
            .name("deskrec-audio-host".into())
            .spawn(move || run_host(host_id, inbox, ready_tx))
            .map_err(|e| subsystem_error(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(subsystem_error("audio host thread exited")));
        if let Err(err) = ready {
            thread.join().ok();
            return Err(err);
        }

        debug!(host = ?host_id, "Audio host opened");
        Ok(Box::new(CpalContext {
            commands,
            thread: Some(thread),
        }))
    }
}

enum HostCommand {
    Open {
        device_index: usize,
        format: AudioFormat,
        chunks: Rechunker,
        reply: Sender<Result<(), StartFailure>>,
    },
    Pause {
        reply: Sender<Result<(), ReleaseError>>,
    },
    Close,
    Terminate,
}

/// Body of the host thread. Owns the cpal host and at most one stream.
fn run_host(
    host_id: HostId,
    inbox: Receiver<HostCommand>,
    ready: Sender<Result<(), StartFailure>>,
) {
    let host = match cpal::host_from_id(host_id) {
        Ok(host) => host,
        Err(e) => {
            ready.send(Err(subsystem_error(e.to_string()))).ok();
            return;
        }
    };
    ready.send(Ok(())).ok();

    let mut stream: Option<cpal::Stream> = None;
    for command in inbox {
        match command {
            HostCommand::Open {
                device_index,
                format,
                chunks,
                reply,
            } => {
                let result = open_stream(&host, device_index, format, chunks).map(|s| {
                    stream = Some(s);
                });
                reply.send(result).ok();
            }
            HostCommand::Pause { reply } => {
                let result = match &stream {
                    Some(s) => s
                        .pause()
                        .map_err(|e| ReleaseError::new("audio stream", e.to_string())),
                    None => Ok(()),
                };
                reply.send(result).ok();
            }
            HostCommand::Close => stream = None,
            HostCommand::Terminate => break,
        }
    }
    drop(stream);
    debug!("Audio host thread exiting");
}

fn open_stream(
    host: &cpal::Host,
    device_index: usize,
    format: AudioFormat,
    chunks: Rechunker,
) -> Result<cpal::Stream, StartFailure> {
    let device = host
        .input_devices()
        .map_err(|e| subsystem_error(e.to_string()))?
        .nth(device_index)
        .ok_or(StartFailure::DeviceNotFound(device_index))?;
    let name = device.name().unwrap_or_default();

    let sample_format = pick_sample_format(&device, format)?;
    let config = StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match sample_format {
        SampleFormat::I16 => build_stream::<i16>(&device, &config, chunks),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, chunks),
        SampleFormat::F32 => build_stream::<f32>(&device, &config, chunks),
        other => return Err(device_error(format!("unsupported sample format {other:?}"))),
    }
    .map_err(|e| device_error(e.to_string()))?;

    stream.play().map_err(|e| device_error(e.to_string()))?;
    info!(device = %name, ?sample_format, "Audio input stream playing");
    Ok(stream)
}

/// Choose a native sample format the device offers at the requested rate
/// and channel count. Native i16 is preferred so no conversion happens.
fn pick_sample_format(device: &cpal::Device, format: AudioFormat) -> Result<SampleFormat, StartFailure> {
    let supported: Vec<SampleFormat> = device
        .supported_input_configs()
        .map_err(|e| device_error(e.to_string()))?
        .filter(|range| {
            range.channels() == format.channels
                && range.min_sample_rate().0 <= format.sample_rate
                && range.max_sample_rate().0 >= format.sample_rate
        })
        .map(|range| range.sample_format())
        .collect();

    [SampleFormat::I16, SampleFormat::F32, SampleFormat::U16]
        .into_iter()
        .find(|f| supported.contains(f))
        .ok_or_else(|| device_error(format!("device cannot capture {format}")))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut chunks: Rechunker,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + Send + 'static,
    i16: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| chunks.push(data),
        |err| warn!(error = %err, "Audio stream error"),
        None,
    )
}

/// Regroups callback buffers of arbitrary size into fixed chunks.
///
/// A chunk that does not fit in the queue is dropped and counted; the
/// reader reports the loss on its next read.
struct Rechunker {
    pending: Vec<i16>,
    chunk_samples: usize,
    channels: usize,
    out: SyncSender<Vec<i16>>,
    dropped_frames: Arc<AtomicUsize>,
}

impl Rechunker {
    fn new(format: AudioFormat, out: SyncSender<Vec<i16>>, dropped_frames: Arc<AtomicUsize>) -> Self {
        Self {
            pending: Vec::with_capacity(format.chunk_samples()),
            chunk_samples: format.chunk_samples(),
            channels: format.channels as usize,
            out,
            dropped_frames,
        }
    }

    fn push<T>(&mut self, data: &[T])
    where
        T: Sample,
        i16: FromSample<T>,
    {
        for &sample in data {
            self.pending.push(sample.to_sample::<i16>());
            if self.pending.len() == self.chunk_samples {
                let chunk = mem::replace(&mut self.pending, Vec::with_capacity(self.chunk_samples));
                match self.out.try_send(chunk) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        self.dropped_frames
                            .fetch_add(self.chunk_samples / self.channels, Ordering::AcqRel);
                    }
                    Err(TrySendError::Disconnected(_)) => {}
                }
            }
        }
    }
}

/// Per-run handle on the host thread
struct CpalContext {
    commands: Sender<HostCommand>,
    thread: Option<JoinHandle<()>>,
}

impl AudioContext for CpalContext {
    fn open_input(
        &mut self,
        device_index: usize,
        format: AudioFormat,
    ) -> Result<Box<dyn AudioInputStream>, StartFailure> {
        let (chunk_tx, chunk_rx) = mpsc::sync_channel(CHUNK_QUEUE_DEPTH);
        let dropped_frames = Arc::new(AtomicUsize::new(0));
        let (reply_tx, reply_rx) = mpsc::channel();

        self.commands
            .send(HostCommand::Open {
                device_index,
                format,
                chunks: Rechunker::new(format, chunk_tx, Arc::clone(&dropped_frames)),
                reply: reply_tx,
            })
            .map_err(|_| subsystem_error("audio host thread is gone"))?;
        reply_rx
            .recv()
            .unwrap_or_else(|_| Err(subsystem_error("audio host thread is gone")))?;

        Ok(Box::new(CpalInputStream {
            chunks: chunk_rx,
            dropped_frames,
            commands: self.commands.clone(),
            timeout: format.chunk_period() * READ_TIMEOUT_CHUNKS,
        }))
    }

    fn terminate(mut self: Box<Self>) -> Result<(), ReleaseError> {
        self.commands.send(HostCommand::Terminate).ok();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| ReleaseError::new("audio host", "host thread panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        self.commands.send(HostCommand::Terminate).ok();
    }
}

struct CpalInputStream {
    chunks: Receiver<Vec<i16>>,
    dropped_frames: Arc<AtomicUsize>,
    commands: Sender<HostCommand>,
    timeout: Duration,
}

impl AudioInputStream for CpalInputStream {
    fn read_chunk(&mut self) -> Result<Vec<i16>, CaptureIoError> {
        let dropped_frames = self.dropped_frames.swap(0, Ordering::AcqRel);
        if dropped_frames > 0 {
            return Err(CaptureIoError::Overflow { dropped_frames });
        }
        match self.chunks.recv_timeout(self.timeout) {
            Ok(chunk) => Ok(chunk),
            Err(RecvTimeoutError::Timeout) => Err(CaptureIoError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureIoError::Disconnected),
        }
    }

    fn stop(&mut self) -> Result<(), ReleaseError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        if self.commands.send(HostCommand::Pause { reply: reply_tx }).is_err() {
            return Ok(());
        }
        reply_rx.recv().unwrap_or(Ok(()))
    }

    fn close(self: Box<Self>) -> Result<(), ReleaseError> {
        self.commands.send(HostCommand::Close).ok();
        Ok(())
    }
}
