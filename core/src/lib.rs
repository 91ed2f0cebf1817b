//! Program model and evaluation engine.
//!
//! Builds the domain layer — operations, programs, pure arithmetic
//! semantics, the interpreter, the incremental evaluator, and the range
//! analyzer — on top of the generic primitives in `seqmine-arch`.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod ie;
pub mod interp;
pub mod program;
pub mod range;
pub mod semantics;

pub use self::ie::{Error as IeError, IncrementalEvaluator};
pub use self::interp::{Error as InterpError, Interpreter};
pub use self::program::{Operand, Operation, OperationType, Program};
pub use self::range::{Error as RangeError, Range, RangeMap};

pub use seqmine_arch::{Index, Memory, MemoryError, Number, NumberError, Sequence};
