#![warn(clippy::pedantic)]

use clap::Parser;
use log::trace;

use crate::cli::{Cli, Command};
use crate::err::{Exit, Result};

mod cfg;
mod cli;
mod err;
mod exe;
mod logging;

fn main() -> Exit {
    match run() {
        Ok(()) => Exit::Success,
        Err(e) => Exit::Failure(e),
    }
}

fn run() -> Result<()> {
    let args = Cli::parse();
    logging::init(&args.log)?;
    trace!("{args:#?}");

    let config = cfg::Config::load(&args.conf)?.merge(args.config_overrides());

    match args.command {
        Command::Eval(cmd) => exe::eval::main(cmd, &config),
        Command::Check(cmd) => exe::check::main(cmd, &config),
        Command::Opt(cmd) => exe::opt::main(cmd, &config),
    }
}
