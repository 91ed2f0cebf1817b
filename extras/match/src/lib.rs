//! Reduced-sequence fingerprint index and candidate-quality checker.
//!
//! An optional crate layered on `seqmine-core` (and consuming
//! `seqmine-opt`'s evaluation-adjacent types only through `seqmine-core`
//! re-exports): maps a freshly evaluated [`Sequence`](seqmine_arch::Sequence)
//! to catalog IDs whose own sequence is related under a reducer/extender
//! pair, and decides whether a candidate program supersedes a catalog's
//! existing incumbent for the same target.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod checker;
pub mod index;
pub mod reduce;

pub use self::checker::{check, CheckConfig, Verdict};
pub use self::index::{Candidate, Id, MatcherIndex};
pub use self::reduce::{Delta, Digit, Direct, Linear1, Linear2, Reducer};
