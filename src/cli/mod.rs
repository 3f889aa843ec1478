// CLI module
// Command-line interface and environment configuration

mod args;

pub use args::CliArgs;

use clap::Parser;
use std::path::Path;

/// Environment file read before argument parsing
pub const CONFIG_ENV_FILE: &str = "config.env";

/// Load `config.env` into the process environment when it exists
///
/// Variables already set in the environment are kept. Returns whether the file
/// was loaded.
pub fn load_env_file<P: AsRef<Path>>(path: P) -> Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path.as_ref()) {
        Ok(()) => Ok(true),
        Err(error) if error.not_found() => Ok(false),
        Err(error) => Err(error),
    }
}

/// Parse command-line arguments using clap
///
/// Options not given on the command line are read from their environment
/// variables, so call [`load_env_file`] first. On invalid arguments or `--help`
/// clap prints a message and exits the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
