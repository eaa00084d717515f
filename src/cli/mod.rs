mod commands;
mod error;
pub mod exit_codes;
pub mod output;

pub use commands::Cli;
pub use error::CliError;

use output::OutputMode;

/// run a parsed command line and report failures, returning the exit code
pub fn run(cli: Cli) -> i32 {
    let json_errors = OutputMode::from_flags(cli.json, cli.no_json, false, false).is_json();

    match commands::execute(cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            if json_errors {
                output::print_json_error(err.code, &err.message, err.suggestions.clone());
            } else {
                eprintln!("error: {}", err.message);
                if !err.suggestions.is_empty() {
                    eprintln!("did you mean: {}?", err.suggestions.join(", "));
                }
            }
            err.code
        }
    }
}
