//! reg - course registration CLI

use std::process::ExitCode;

fn main() -> ExitCode {
    match registrar::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            registrar::cli::report(&err);
            ExitCode::from(registrar::cli::exit_code(&err))
        }
    }
}
