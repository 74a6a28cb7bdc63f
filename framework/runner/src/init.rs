use crate::cli::ThreadLabCli;
use clap::Parser;

/// Initialise the CLI and logging for the Thread Lab binary.
pub fn init() -> ThreadLabCli {
    env_logger::init();

    ThreadLabCli::parse()
}
