//! Assetline - command-line asset builder

use std::process::ExitCode;

use assetline::cli;

fn main() -> ExitCode {
    cli::run()
}
