//! `deskrec devices` handler

use std::sync::Arc;

use tokio::task;

use crate::application::ports::{AudioBackend, StartFailure};
use crate::domain::capture::MediaKind;

use super::presenter::Presenter;

/// Print every audio input device with its index
pub async fn handle_devices_command(
    backend: Arc<dyn AudioBackend>,
    presenter: &Presenter,
) -> Result<(), StartFailure> {
    let devices = task::spawn_blocking(move || backend.input_devices())
        .await
        .map_err(|e| StartFailure::Subsystem {
            kind: MediaKind::Audio,
            message: e.to_string(),
        })??;

    if devices.is_empty() {
        presenter.info("No audio input devices found");
        return Ok(());
    }
    for device in &devices {
        presenter.device(device);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fakes::{MockAudioBackend, CallLog};

    #[tokio::test]
    async fn lists_fake_devices() {
        let backend = Arc::new(MockAudioBackend::new(CallLog::new()));
        assert!(handle_devices_command(backend, &Presenter::new()).await.is_ok());
    }

    #[tokio::test]
    async fn no_devices_is_not_an_error() {
        let mut backend = MockAudioBackend::new(CallLog::new());
        backend.devices.clear();
        assert!(handle_devices_command(Arc::new(backend), &Presenter::new())
            .await
            .is_ok());
    }
}
