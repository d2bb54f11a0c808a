//! WAV file sink using hound

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use crate::application::ports::{
    CaptureIoError, PcmSink, PcmSinkFactory, ReleaseError, StartFailure,
};
use crate::domain::capture::{AudioFormat, MediaKind};

/// RIFF header bytes in front of the sample data
const HEADER_BYTES: u64 = 44;
/// Largest data chunk a 32-bit RIFF size field can describe
const MAX_DATA_BYTES: u64 = u32::MAX as u64 - HEADER_BYTES;

/// Writes 16-bit integer PCM into RIFF/WAVE files
#[derive(Debug, Default, Clone, Copy)]
pub struct HoundWavSinkFactory;

impl HoundWavSinkFactory {
    pub fn new() -> Self {
        Self
    }

    fn spec(format: AudioFormat) -> WavSpec {
        WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bits_per_sample,
            sample_format: SampleFormat::Int,
        }
    }
}

impl PcmSinkFactory for HoundWavSinkFactory {
    fn create(&self, path: &Path, format: AudioFormat) -> Result<Box<dyn PcmSink>, StartFailure> {
        let writer = WavWriter::create(path, Self::spec(format)).map_err(|e| StartFailure::SinkOpen {
            kind: MediaKind::Audio,
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Box::new(HoundWavSink {
            writer,
            sample_width: format.sample_width() as u64,
            path: path.to_path_buf(),
        }))
    }
}

/// Open WAV file. The header is written on create and patched on close.
pub struct HoundWavSink {
    writer: WavWriter<BufWriter<File>>,
    sample_width: u64,
    path: PathBuf,
}

/// Reject a batch that would overflow the 32-bit RIFF sizes
fn check_capacity(written: u64, incoming: u64, sample_width: u64) -> Result<(), CaptureIoError> {
    let total = written
        .saturating_add(incoming)
        .saturating_mul(sample_width);
    if total > MAX_DATA_BYTES {
        return Err(CaptureIoError::Write(format!(
            "{} bytes of audio exceed the WAV limit of {} bytes",
            total, MAX_DATA_BYTES
        )));
    }
    Ok(())
}

impl PcmSink for HoundWavSink {
    fn write_chunks(&mut self, chunks: &[Vec<i16>]) -> Result<(), CaptureIoError> {
        let incoming: u64 = chunks.iter().map(|chunk| chunk.len() as u64).sum();
        check_capacity(self.writer.len() as u64, incoming, self.sample_width)?;

        let write_err = |e: hound::Error| CaptureIoError::Write(e.to_string());
        for chunk in chunks {
            for &sample in chunk {
                self.writer.write_sample(sample).map_err(write_err)?;
            }
        }
        self.writer.flush().map_err(write_err)
    }

    fn close(self: Box<Self>) -> Result<(), ReleaseError> {
        let Self { writer, path, .. } = *self;
        let frames = writer.duration();
        writer
            .finalize()
            .map_err(|e| ReleaseError::new("wav sink", e.to_string()))?;
        info!(path = %path.display(), frames, "WAV file finalized");
        Ok(())
    }
}
