//! Audio capture port interfaces

use std::path::Path;

use super::capture_error::{CaptureIoError, ReleaseError, StartFailure};
use crate::domain::capture::AudioFormat;

/// One selectable audio input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDeviceInfo {
    /// Position in the backend's input-device list; what `open_input` takes
    pub index: usize,
    /// Human-readable device name
    pub name: String,
    /// Whether the host reports this as its default input
    pub is_default: bool,
}

/// Entry point to an audio device subsystem.
pub trait AudioBackend: Send + Sync {
    /// List input-capable devices.
    fn input_devices(&self) -> Result<Vec<AudioDeviceInfo>, StartFailure>;

    /// Initialise the device subsystem for one capture run.
    ///
    /// Every run gets its own context so repeated start/stop cycles never
    /// share a half torn-down subsystem.
    fn open_context(&self) -> Result<Box<dyn AudioContext>, StartFailure>;
}

/// Device subsystem handle owned by one engine run.
pub trait AudioContext: Send {
    /// Open an input stream on a device.
    ///
    /// # Arguments
    /// * `device_index` - Index from [`AudioBackend::input_devices`]
    /// * `format` - Capture format; reads yield `format.chunk_samples()` samples
    fn open_input(
        &mut self,
        device_index: usize,
        format: AudioFormat,
    ) -> Result<Box<dyn AudioInputStream>, StartFailure>;

    /// Tear down the subsystem.
    fn terminate(self: Box<Self>) -> Result<(), ReleaseError>;
}

/// Blocking chunked reader over an open input device.
pub trait AudioInputStream: Send {
    /// Block for the next chunk of interleaved samples.
    ///
    /// Waits at most a few chunk periods; returns [`CaptureIoError::Timeout`]
    /// rather than blocking forever. [`CaptureIoError::Overflow`] means
    /// samples were lost since the previous read.
    fn read_chunk(&mut self) -> Result<Vec<i16>, CaptureIoError>;

    /// Stop the device from producing more data.
    fn stop(&mut self) -> Result<(), ReleaseError>;

    /// Close the stream and free the device.
    fn close(self: Box<Self>) -> Result<(), ReleaseError>;
}

/// Creates PCM sinks.
pub trait PcmSinkFactory: Send + Sync {
    /// Create the sink file and write its header.
    ///
    /// The header (channel count, sample width, sample rate) is on disk
    /// before this returns.
    fn create(&self, path: &Path, format: AudioFormat) -> Result<Box<dyn PcmSink>, StartFailure>;
}

/// An open PCM file.
pub trait PcmSink: Send {
    /// Append interleaved samples, chunk after chunk, in one batch.
    ///
    /// Fails without writing anything when the batch would push the file
    /// past the size its header can describe.
    fn write_chunks(&mut self, chunks: &[Vec<i16>]) -> Result<(), CaptureIoError>;

    /// Flush data, patch the header with final sizes and close the file.
    fn close(self: Box<Self>) -> Result<(), ReleaseError>;
}
