//! deskrec CLI entry point

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use deskrec::cli::{
    app::{load_merged_config, run_record, EXIT_ERROR, EXIT_USAGE_ERROR},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    devices_cmd::handle_devices_command,
    logging,
    presenter::Presenter,
    RecordOptions,
};
use deskrec::domain::error::ConfigError;
use deskrec::infrastructure::{CpalBackend, XdgConfigStore};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let presenter = Presenter::new();

    match cli.command {
        Some(Commands::Config { action }) => {
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                let code = match e {
                    ConfigError::ValidationError { .. } => EXIT_USAGE_ERROR,
                    _ => EXIT_ERROR,
                };
                return ExitCode::from(code);
            }
            return ExitCode::SUCCESS;
        }
        Some(Commands::Devices) => {
            let backend = Arc::new(CpalBackend::new());
            if let Err(e) = handle_devices_command(backend, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            return ExitCode::SUCCESS;
        }
        None => {}
    }

    // Merge: defaults < file < env < cli
    let config = load_merged_config(cli.record.to_config()).await;

    let options = match RecordOptions::from_config(&config) {
        Ok(options) => options,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    run_record(options).await
}
