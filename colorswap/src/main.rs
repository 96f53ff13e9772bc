#[macro_use]
extern crate log;

use std::process;

use clap::Parser;
use env_logger::Env;

use colorswap::{config::Cli, swap};

const DEFAULT_LOGGING_LEVEL: &str = "warn";

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or(DEFAULT_LOGGING_LEVEL)).init();

    let cli = match Cli::try_parse() {
        Ok(v) => v,
        Err(err) => {
            // --help and --version are reported through stdout and exit successfully
            if !err.use_stderr() {
                err.exit();
            }

            if let Err(print_err) = err.print() {
                error!("failed to print usage: {}", print_err);
            }
            process::exit(1);
        }
    };
    debug!("args are: {:?}", cli);

    if let Err(err) = swap::run(&cli.into_options()) {
        error!("{}", err);
        process::exit(1);
    }
}
