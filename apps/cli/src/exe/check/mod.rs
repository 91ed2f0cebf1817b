//! Check a program against a b-file of expected terms.

use std::fs;

use anyhow::{bail, Context};
use log::trace;
use seqmine::arch::{Number, Sequence};
use seqmine::evaluator::{self, Status};
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

    let bfile = fs::read_to_string(&args.bfile)
        .with_context(|| format!("could not read b-file {:?}", args.bfile))?;
    let expected = parse_bfile(&bfile).context("could not parse b-file")?;

    let (status, steps) =
        evaluator::check(&program, &expected, args.required_terms, args.id, config.limits(), config.max_eval_secs);
    println!("{status} ({steps} steps)", status = display(status));
    if status == Status::Error {
        bail!("program {} failed to reproduce the expected terms", args.id);
    }
    Ok(())
}

fn display(status: Status) -> &'static str {
    match status {
        Status::Ok => "OK",
        Status::Warning => "WARNING",
        Status::Error => "ERROR",
    }
}

fn parse_bfile(text: &str) -> anyhow::Result<Sequence> {
    let mut terms = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value = line.split_whitespace().nth(1).with_context(|| format!("malformed b-file line {line:?}"))?;
        terms.push(value.parse::<Number>().with_context(|| format!("malformed term in {line:?}"))?);
    }
    Ok(Sequence::from(terms))
}
