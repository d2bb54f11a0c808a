//! Audio capture adapters

mod cpal_backend;
mod wav_sink;

pub use cpal_backend::CpalBackend;
pub use wav_sink::{HoundWavSink, HoundWavSinkFactory};
