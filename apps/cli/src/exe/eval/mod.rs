//! Evaluate a program and print its terms as a b-file.

use std::fs;
use std::io::stdout;

use anyhow::Context;
use log::trace;
use seqmine::arch::Sequence;
use seqmine::evaluator;
use seqmine::lang::Document;

use crate::cfg::Config;
use crate::err::Result;

pub mod cli;

pub use self::cli::Cli;

pub fn main(args: Cli, config: &Config) -> Result<()> {
    trace!("{args:?}");

    let text = fs::read_to_string(&args.program)
        .with_context(|| format!("could not read program file {:?}", args.program))?;
    let program = Document::parse(&text).context("could not parse program text")?.to_program();

    let mut seq = Sequence::new();
    evaluator::eval(&program, &mut seq, args.terms, args.strict, config.limits(), config.max_eval_secs)
        .context("evaluation failed")?;

    evaluator::write_bfile(&program, &seq, &mut stdout()).context("failed writing b-file output")?;
    Ok(())
}
