//! Command-line interface for `seqmine eval`.

use std::path::PathBuf;

use clap::Parser;

/// Evaluate a program, printing its terms as b-file lines.
#[derive(Debug, Parser)]
pub struct Cli {
    /// Program text file.
    pub program: PathBuf,

    /// Number of terms to produce.
    #[arg(long, default_value_t = 30)]
    pub terms: usize,

    /// Propagate the first evaluation error instead of truncating the
    /// printed sequence at the last successful term.
    #[arg(long)]
    pub strict: bool,
}
