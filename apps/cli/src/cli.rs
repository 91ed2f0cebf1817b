//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cfg::Config;
use crate::exe;

/// Evaluate, check, and optimize arithmetic sequence programs.
#[derive(Debug, Parser)]
#[command(name = "seqmine", author, version, about)]
pub struct Cli {
    /// Configuration file.
    #[arg(long, value_name = "PATH", default_value = "seqmine.toml")]
    pub conf: PathBuf,

    /// Logging filter, in `env_logger` directive syntax.
    #[arg(long, default_value = "")]
    pub log: String,

    /// Overrides the configured maximum cycle count.
    #[arg(long, value_name = "COUNT")]
    pub max_cycles: Option<u64>,

    /// Overrides the configured maximum memory bound.
    #[arg(long, value_name = "INDEX")]
    pub max_memory: Option<i64>,

    /// Overrides the configured wall-clock evaluation budget, in seconds.
    #[arg(long, value_name = "SECS")]
    pub max_eval_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Projects the override flags actually given on this invocation
    /// into a [`Config`], to be layered on top of one loaded from file.
    #[must_use]
    pub fn config_overrides(&self) -> Config {
        Config { max_cycles: self.max_cycles, max_memory: self.max_memory, max_eval_secs: self.max_eval_secs }
    }
}

/// Subcommands, each mirrored by its own `exe::*` module.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evaluate a program and print its terms as a b-file.
    Eval(exe::eval::Cli),
    /// Check a program against a b-file of expected terms.
    Check(exe::check::Cli),
    /// Optimize and minimize a program, printing the result.
    Opt(exe::opt::Cli),
}
