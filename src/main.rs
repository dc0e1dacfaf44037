// Cairn - self-directed task scheduling for an autonomous agent
// Main entry point

use clap::Parser;
use std::process::ExitCode;

use cairn::cli::{self, commands::is_usage_error, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    cairn::logging::init(cli.verbose);

    match cli::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if is_usage_error(&e) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
