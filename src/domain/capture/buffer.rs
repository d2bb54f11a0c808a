//! In-memory PCM accumulation for one audio capture run

/// Ordered raw PCM chunks captured during one run.
///
/// Chunks are kept as delivered and handed to the sink as-is when the run
/// ends, so the samples are never copied into one contiguous block.
#[derive(Debug, Default)]
pub struct AudioFrameBuffer {
    chunks: Vec<Vec<i16>>,
    samples: usize,
}

impl AudioFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: Vec<i16>) {
        self.samples += chunk.len();
        self.chunks.push(chunk);
    }

    /// Captured chunks in arrival order
    pub fn chunks(&self) -> &[Vec<i16>] {
        &self.chunks
    }

    /// Total interleaved samples across all chunks
    pub fn sample_count(&self) -> usize {
        self.samples
    }

    /// Number of complete frames for the given channel count
    pub fn frame_count(&self, channels: u16) -> usize {
        self.samples / channels.max(1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }
}
