//! Architecture primitives
//!
//! Domain-agnostic building blocks shared by every layer of the engine:
//! the arbitrary-precision [`Number`], sparse [`Memory`], and the
//! [`Sequence`] of terms an evaluated program produces. Nothing in this
//! crate knows about operations, loops, or programs — that belongs to
//! `seqmine-core`, built atop it.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod mem;
mod number;
mod seq;

pub use self::mem::{Error as MemoryError, Memory};
pub use self::number::{Error as NumberError, Number};
pub use self::seq::Sequence;

/// Re-exported so downstream crates building pure-arithmetic primitives on
/// top of [`Number::finite`] don't need their own `num-bigint` version pin.
pub use num_bigint::BigInt;

/// Index into [`Memory`].
pub type Index = i64;
