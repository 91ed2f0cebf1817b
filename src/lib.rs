//! Arithmetic-program engine: interpreter, incremental evaluator, range
//! analyzer, optimizer/minimizer, matcher and checker for integer
//! sequence programs.
//!
//! This crate is a facade: it re-exports the engine's member crates
//! ([`seqmine_arch`], [`seqmine_core`], [`seqmine_opt`], [`seqmine_match`])
//! and, behind the default `lang` feature, a parser/writer for the
//! program text format described by [`lang::Document`].
//!
//! ```
//! use seqmine::evaluator;
//! use seqmine::arch::Sequence;
//! use seqmine::core::interp::Limits;
//! use seqmine::lang::Document;
//!
//! let program = Document::parse("mov $0,42\n").unwrap().to_program();
//! let mut seq = Sequence::new();
//! evaluator::eval(&program, &mut seq, 3, true, Limits::default(), None).unwrap();
//! assert_eq!(seq.to_string(), "42,42,42");
//! ```
#![warn(clippy::pedantic)]

pub mod evaluator;

#[cfg(feature = "lang")]
pub mod lang;

/// Domain-agnostic primitives: arbitrary-precision [`Number`](arch::Number),
/// sparse [`Memory`](arch::Memory), and [`Sequence`](arch::Sequence).
pub use seqmine_arch as arch;
/// The program model, semantics, interpreter, incremental evaluator, and
/// range analyzer.
pub use seqmine_core as core;
/// The matcher index and candidate checker.
pub use seqmine_match as matcher;
/// Optimizer and minimizer rewrite passes.
pub use seqmine_opt as opt;

pub use seqmine_core::interp::ProgramCache;
