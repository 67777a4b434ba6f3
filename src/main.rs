//! # swap-deps CLI
//!
//! Binary entry point. Parses arguments, runs the selected mode and turns
//! errors into a single `Error: ...` line and exit status 1.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    let verbose = cli.verbose;
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let known = err
                .chain()
                .any(|cause| cause.downcast_ref::<swap_deps::error::Error>().is_some());
            if verbose && !known {
                eprintln!("{:?}", err);
            }
            ExitCode::FAILURE
        }
    }
}
