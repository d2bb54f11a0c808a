//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, VideoConfig};
use crate::domain::error::ConfigError;
use crate::domain::recording::Duration;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;

    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let config = store.load().await?;
    presenter.output(&read_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()));

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        let value = read_value(&config, key).unwrap_or_else(|| NOT_SET.to_string());
        presenter.key_value(key, &value);
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

/// Validate `value` for `key` and store it in `config`
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "output_dir" => {
            if value.trim().is_empty() {
                return Err(invalid(key, "Value must not be empty"));
            }
            config.output_dir = Some(value.to_string());
        }
        "audio_device" => {
            config.audio_device = Some(
                value
                    .parse()
                    .map_err(|_| invalid(key, "Value must be a device index (see 'deskrec devices')"))?,
            );
        }
        "audio_only" => {
            config.audio_only = Some(
                parse_bool(value).ok_or_else(|| invalid(key, "Value must be 'true' or 'false'"))?,
            );
        }
        "duration" => {
            value
                .parse::<Duration>()
                .map_err(|e| invalid(key, &e.to_string()))?;
            config.duration = Some(value.to_string());
        }
        "ffmpeg" => {
            if value.trim().is_empty() {
                return Err(invalid(key, "Value must not be empty"));
            }
            config.ffmpeg = Some(value.to_string());
        }
        "video.display" => video_mut(config).display = Some(value.to_string()),
        "video.width" => video_mut(config).width = Some(parse_dimension(key, value)?),
        "video.height" => video_mut(config).height = Some(parse_dimension(key, value)?),
        _ => unreachable!(), // Already validated
    }
    Ok(())
}

fn read_value(config: &AppConfig, key: &str) -> Option<String> {
    let video = config.video.as_ref();
    match key {
        "output_dir" => config.output_dir.clone(),
        "audio_device" => config.audio_device.map(|i| i.to_string()),
        "audio_only" => config.audio_only.map(|b| b.to_string()),
        "duration" => config.duration.clone(),
        "ffmpeg" => config.ffmpeg.clone(),
        "video.display" => video.and_then(|v| v.display.clone()),
        "video.width" => video.and_then(|v| v.width).map(|w| w.to_string()),
        "video.height" => video.and_then(|v| v.height).map(|h| h.to_string()),
        _ => None,
    }
}

fn video_mut(config: &mut AppConfig) -> &mut VideoConfig {
    config.video.get_or_insert_with(VideoConfig::default)
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::ValidationError {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn parse_dimension(key: &str, value: &str) -> Result<u32, ConfigError> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(key, "Value must be a positive number of pixels")),
    }
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
