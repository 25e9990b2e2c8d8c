//! s1ard CLI entrypoint.
//!
//! Thin wrapper over the `cli` module: parse args, set up logging, dispatch
//! to the product-id or work-plan flow, and exit with the failure's code.
//! For programmatic use, prefer the library API (`s1ard::api`).
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

mod cli;

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();
    cli::init_logging(args.verbose);
    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("s1ard: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
