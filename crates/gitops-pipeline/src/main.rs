use clap::Parser;
use gitops_config::PipelineConfig;
use gitops_core::ErrorKind;
use std::process::ExitCode;

mod cli;
mod commands;
mod logger;

use cli::Cli;
use commands::Outcome;

/// Exit code when `is-allowed` finds the branch locked
const EXIT_LOCKED: u8 = 1;
/// Exit code when the configuration cannot be loaded
const EXIT_CONFIG: u8 = 10;

/// Distinct process exit code per error kind
fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InvalidArgument => 2,
        ErrorKind::UnsupportedWorkflow => 3,
        ErrorKind::IoFailure => 4,
        ErrorKind::LockTimeout => 5,
        ErrorKind::TaskFailed => 6,
        ErrorKind::QualityGateFailed => 7,
        ErrorKind::Protocol => 8,
        ErrorKind::PollTimeout => 9,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    match dotenvy::dotenv() {
        Ok(path) => log::debug!("Loaded .env file from: {:?}", path),
        Err(_) => log::debug!(".env file not found, relying on environment variables"),
    }

    let config_path = cli.config.clone().or_else(gitops_config::find_config_file);
    let config = match PipelineConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{:#}", err);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match commands::run(cli.command, &config, config_path.as_deref()) {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::Locked) => ExitCode::from(EXIT_LOCKED),
        Err(err) => {
            if err.is_caller_bug() {
                log::error!("{}", err);
            } else {
                log::error!("Pipeline step failed: {}", err);
            }
            ExitCode::from(exit_code(err.kind()))
        }
    }
}
