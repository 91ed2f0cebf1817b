//! Command-line interface for `seqmine opt`.

use std::path::PathBuf;

use clap::Parser;

/// Optimize (and optionally minimize) a program, printing the result.
#[derive(Debug, Parser)]
pub struct Cli {
    /// Program text file.
    pub program: PathBuf,

    /// Also run the minimizer, alternating with the optimizer to a
    /// fixed point, instead of only running optimizer passes once.
    #[arg(long)]
    pub minimize: bool,

    /// Terms evaluated as the minimizer's reference window.
    #[arg(long, default_value_t = 40)]
    pub reference_terms: usize,
}
