use blusort::cli::{Cli, run_cli};
use blusort::logging::init_logger;
use blusort::output::OutputFormatter;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run_cli(cli) {
        Ok(true) => ExitCode::SUCCESS,
        // Some files failed or were skipped; the report says which.
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            OutputFormatter::error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}
