//! Optimize and (optionally) minimize a program, printing the result.

use std::fs;

use anyhow::Context;
use log::trace;
use seqmine::lang::Document;
use seqmine::opt::minimizer::MinimizeConfig;
use seqmine::opt::{optimize, optimize_and_minimize};

use crate::cfg::Config;
use crate::err::Result;

pub mod cli;

pub use self::cli::Cli;

pub fn main(args: Cli, config: &Config) -> Result<()> {
    trace!("{args:?}");

    let text = fs::read_to_string(&args.program)
        .with_context(|| format!("could not read program file {:?}", args.program))?;
    let program = Document::parse(&text).context("could not parse program text")?.to_program();

    let result = if args.minimize {
        let minimize_config = MinimizeConfig {
            reference_terms: args.reference_terms,
            required_terms: MinimizeConfig::default().required_terms,
            limits: config.limits(),
        };
        optimize_and_minimize(&program, &minimize_config).context("minimization failed")?
    } else {
        optimize(&program)
    };

    print!("{}", Document::from_program(&result));
    Ok(())
}
