use std::process::ExitCode;

use clap::Parser;
use knob_app::cli::Cli;
use tracing::error;

fn main() -> ExitCode {
    match knob_app::run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
