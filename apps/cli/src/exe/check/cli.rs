//! Command-line interface for `seqmine check`.

use std::path::PathBuf;

use clap::Parser;

/// Check a program against a b-file of expected terms.
#[derive(Debug, Parser)]
pub struct Cli {
    /// Program text file.
    pub program: PathBuf,

    /// B-file of expected terms (`offset value` per line).
    pub bfile: PathBuf,

    /// Target identifier, echoed in the printed verdict.
    #[arg(long, default_value_t = 0)]
    pub id: i64,

    /// Minimum number of correct terms below which any failure is an
    /// error rather than a warning.
    #[arg(long, default_value_t = 8)]
    pub required_terms: usize,
}
