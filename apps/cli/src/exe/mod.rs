//! One module per subcommand, each exposing a `Cli` (clap arguments)
//! and a `main` entrypoint.

pub mod check;
pub mod eval;
pub mod opt;
