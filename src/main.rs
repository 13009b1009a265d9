use std::process::ExitCode;

use clap::Parser;

use layerdoc::cli::{self, CliArgs};
use layerdoc::{log_warn, logger};
use layerdoc::settings::Settings;

fn main() -> ExitCode {
    let settings = Settings::load();
    if settings.log_to_file {
        logger::init();
    }
    if let Err(e) = settings.ensure_file() {
        log_warn!("Could not write default settings: {}", e);
    }

    let args = CliArgs::parse();
    cli::run(args, &settings)
}
