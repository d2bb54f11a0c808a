//! In-memory port implementations for engine and session tests

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::ports::{
    AudioBackend, AudioContext, AudioDeviceInfo, AudioInputStream, CaptureIoError, PcmSink,
    PcmSinkFactory, ReleaseError, ScreenGrabber, ScreenSource, StartFailure, VideoSink,
    VideoSinkFactory, VideoSinkSpec,
};
use crate::domain::capture::{
    AudioFormat, BgrFrame, DisplayBounds, MediaKind, RawFrame, VideoFormat,
};

/// Shared record of everything the fakes were asked to do.
#[derive(Debug, Default)]
pub struct CallLog {
    events: Mutex<Vec<&'static str>>,
    samples: Mutex<Vec<i16>>,
    sink_paths: Mutex<Vec<PathBuf>>,
}

impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, event: &'static str) {
        self.events.lock().push(event);
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| **e == event).count()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().clone()
    }

    pub fn samples(&self) -> Vec<i16> {
        self.samples.lock().clone()
    }

    pub fn sink_paths(&self) -> Vec<PathBuf> {
        self.sink_paths.lock().clone()
    }
}

/// One scripted result of `read_chunk`
#[derive(Debug, Clone)]
pub enum Read {
    Chunk(Vec<i16>),
    Overflow,
    Timeout,
    Fail,
}

/// Audio backend whose streams replay a script, then yield silence.
pub struct MockAudioBackend {
    pub calls: Arc<CallLog>,
    pub devices: Vec<&'static str>,
    pub script: Arc<Mutex<VecDeque<Read>>>,
    pub fail_context: bool,
    pub fail_open: bool,
    pub fail_release: bool,
}

impl MockAudioBackend {
    pub fn new(calls: Arc<CallLog>) -> Self {
        Self {
            calls,
            devices: vec!["Built-in Microphone", "USB Headset"],
            script: Arc::new(Mutex::new(VecDeque::new())),
            fail_context: false,
            fail_open: false,
            fail_release: false,
        }
    }

    pub fn with_script(self, reads: impl IntoIterator<Item = Read>) -> Self {
        self.script.lock().extend(reads);
        self
    }
}

impl AudioBackend for MockAudioBackend {
    fn input_devices(&self) -> Result<Vec<AudioDeviceInfo>, StartFailure> {
        Ok(self
            .devices
            .iter()
            .enumerate()
            .map(|(index, name)| AudioDeviceInfo {
                index,
                name: name.to_string(),
                is_default: index == 0,
            })
            .collect())
    }

    fn open_context(&self) -> Result<Box<dyn AudioContext>, StartFailure> {
        if self.fail_context {
            return Err(StartFailure::Subsystem {
                kind: MediaKind::Audio,
                message: "no audio server".into(),
            });
        }
        self.calls.record("context.open");
        Ok(Box::new(MockAudioContext {
            calls: Arc::clone(&self.calls),
            devices: self.devices.len(),
            script: Arc::clone(&self.script),
            fail_open: self.fail_open,
            fail_release: self.fail_release,
        }))
    }
}

struct MockAudioContext {
    calls: Arc<CallLog>,
    devices: usize,
    script: Arc<Mutex<VecDeque<Read>>>,
    fail_open: bool,
    fail_release: bool,
}

impl AudioContext for MockAudioContext {
    fn open_input(
        &mut self,
        device_index: usize,
        format: AudioFormat,
    ) -> Result<Box<dyn AudioInputStream>, StartFailure> {
        if device_index >= self.devices {
            return Err(StartFailure::DeviceNotFound(device_index));
        }
        if self.fail_open {
            return Err(StartFailure::DeviceOpen {
                kind: MediaKind::Audio,
                message: "device busy".into(),
            });
        }
        self.calls.record("stream.open");
        Ok(Box::new(MockInputStream {
            calls: Arc::clone(&self.calls),
            script: Arc::clone(&self.script),
            chunk_samples: format.chunk_samples(),
            fail_release: self.fail_release,
        }))
    }

    fn terminate(self: Box<Self>) -> Result<(), ReleaseError> {
        self.calls.record("context.terminate");
        if self.fail_release {
            return Err(ReleaseError::new("audio context", "terminate failed"));
        }
        Ok(())
    }
}

struct MockInputStream {
    calls: Arc<CallLog>,
    script: Arc<Mutex<VecDeque<Read>>>,
    chunk_samples: usize,
    fail_release: bool,
}

impl AudioInputStream for MockInputStream {
    fn read_chunk(&mut self) -> Result<Vec<i16>, CaptureIoError> {
        thread::sleep(Duration::from_millis(1));
        self.calls.record("stream.read");
        let next = self.script.lock().pop_front();
        match next {
            None => Ok(vec![0; self.chunk_samples]),
            Some(Read::Chunk(samples)) => Ok(samples),
            Some(Read::Overflow) => Err(CaptureIoError::Overflow { dropped_frames: 1024 }),
            Some(Read::Timeout) => Err(CaptureIoError::Timeout),
            Some(Read::Fail) => Err(CaptureIoError::Device("unplugged".into())),
        }
    }

    fn stop(&mut self) -> Result<(), ReleaseError> {
        self.calls.record("stream.stop");
        if self.fail_release {
            return Err(ReleaseError::new("audio stream", "stop failed"));
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), ReleaseError> {
        self.calls.record("stream.close");
        Ok(())
    }
}

/// PCM sink factory recording written samples into the calls.
pub struct MockPcmSinkFactory {
    pub calls: Arc<CallLog>,
    pub fail_create: bool,
}

impl MockPcmSinkFactory {
    pub fn new(calls: Arc<CallLog>) -> Self {
        Self {
            calls,
            fail_create: false,
        }
    }
}

impl PcmSinkFactory for MockPcmSinkFactory {
    fn create(&self, path: &Path, _format: AudioFormat) -> Result<Box<dyn PcmSink>, StartFailure> {
        if self.fail_create {
            return Err(StartFailure::SinkOpen {
                kind: MediaKind::Audio,
                path: path.to_path_buf(),
                message: "read-only file system".into(),
            });
        }
        self.calls.record("pcm.create");
        self.calls.sink_paths.lock().push(path.to_path_buf());
        Ok(Box::new(MockPcmSink {
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct MockPcmSink {
    calls: Arc<CallLog>,
}

impl PcmSink for MockPcmSink {
    fn write_chunks(&mut self, chunks: &[Vec<i16>]) -> Result<(), CaptureIoError> {
        self.calls.record("pcm.write");
        let mut samples = self.calls.samples.lock();
        for chunk in chunks {
            samples.extend_from_slice(chunk);
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), ReleaseError> {
        self.calls.record("pcm.close");
        Ok(())
    }
}

/// Screen of fixed size producing solid-colour frames.
pub struct MockScreen {
    pub calls: Arc<CallLog>,
    pub bounds: DisplayBounds,
    /// Size of grabbed frames, when it should differ from `bounds`
    pub grab_size: Option<(u32, u32)>,
    pub fail_display: bool,
    pub fail_grabber: bool,
    /// Fail the n-th grab (1-based)
    pub fail_grab_at: Option<usize>,
}

impl MockScreen {
    pub fn new(calls: Arc<CallLog>) -> Self {
        Self {
            calls,
            bounds: DisplayBounds::at_origin(8, 6),
            grab_size: None,
            fail_display: false,
            fail_grabber: false,
            fail_grab_at: None,
        }
    }
}

impl ScreenSource for MockScreen {
    fn primary_display(&self) -> Result<DisplayBounds, StartFailure> {
        if self.fail_display {
            return Err(StartFailure::DisplayQuery("no display".into()));
        }
        Ok(self.bounds)
    }

    fn open_grabber(
        &self,
        region: DisplayBounds,
        _format: VideoFormat,
    ) -> Result<Box<dyn ScreenGrabber>, StartFailure> {
        if self.fail_grabber {
            return Err(StartFailure::DeviceOpen {
                kind: MediaKind::Video,
                message: "cannot open display".into(),
            });
        }
        self.calls.record("grabber.open");
        Ok(Box::new(MockGrabber {
            calls: Arc::clone(&self.calls),
            size: self.grab_size.unwrap_or(region.size()),
            grabs: 0,
            fail_at: self.fail_grab_at,
        }))
    }
}

struct MockGrabber {
    calls: Arc<CallLog>,
    size: (u32, u32),
    grabs: usize,
    fail_at: Option<usize>,
}

impl ScreenGrabber for MockGrabber {
    fn grab(&mut self) -> Result<RawFrame, CaptureIoError> {
        thread::sleep(Duration::from_millis(1));
        self.calls.record("grabber.grab");
        self.grabs += 1;
        if self.fail_at == Some(self.grabs) {
            return Err(CaptureIoError::Disconnected);
        }
        let (width, height) = self.size;
        let pixel = [10u8, 20, 30, 255];
        let data = pixel.repeat((width * height) as usize);
        Ok(RawFrame::new(width, height, data)?)
    }

    fn close(self: Box<Self>) -> Result<(), ReleaseError> {
        self.calls.record("grabber.close");
        Ok(())
    }
}

/// Video sink factory counting encoded frames.
pub struct MockVideoSinkFactory {
    pub calls: Arc<CallLog>,
    pub fail_create: bool,
}

impl MockVideoSinkFactory {
    pub fn new(calls: Arc<CallLog>) -> Self {
        Self {
            calls,
            fail_create: false,
        }
    }
}

impl VideoSinkFactory for MockVideoSinkFactory {
    fn create(&self, path: &Path, spec: VideoSinkSpec) -> Result<Box<dyn VideoSink>, StartFailure> {
        if self.fail_create {
            return Err(StartFailure::SinkOpen {
                kind: MediaKind::Video,
                path: path.to_path_buf(),
                message: "encoder missing".into(),
            });
        }
        self.calls.record("video.create");
        self.calls.sink_paths.lock().push(path.to_path_buf());
        Ok(Box::new(MockVideoSink {
            calls: Arc::clone(&self.calls),
            size: (spec.width, spec.height),
        }))
    }
}

struct MockVideoSink {
    calls: Arc<CallLog>,
    size: (u32, u32),
}

impl VideoSink for MockVideoSink {
    fn frame_size(&self) -> (u32, u32) {
        self.size
    }

    fn write_frame(&mut self, frame: &BgrFrame) -> Result<(), CaptureIoError> {
        if frame.size() != self.size {
            return Err(CaptureIoError::Write(format!(
                "frame is {:?}, sink expects {:?}",
                frame.size(),
                self.size
            )));
        }
        self.calls.record("video.frame");
        Ok(())
    }

    fn release(self: Box<Self>) -> Result<(), ReleaseError> {
        self.calls.record("video.release");
        Ok(())
    }
}

/// Poll `cond` for up to one second.
pub fn wait_until(cond: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
