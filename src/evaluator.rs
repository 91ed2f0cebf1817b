//! The driver-level operations of §6: evaluating a program into a
//! sequence, and checking it against a set of already-confirmed terms.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use thiserror::Error;

use seqmine_arch::{Memory, Number, Sequence};
use seqmine_core::interp::{Interpreter, Limits};
use seqmine_core::program::{Program, INPUT_CELL, OUTPUT_CELL};

/// An error from the evaluator façade: either the interpreter's own
/// error (propagated when `throw_on_error` is set), or the wall-clock
/// budget (`max_eval_secs`) being exceeded before `num_terms` terms
/// were produced.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Interp(#[from] seqmine_core::interp::Error),
    #[error("evaluation exceeded the wall-clock budget")]
    Timeout,
}

/// The outcome of [`check`]: how well a program reproduces a target's
/// confirmed terms.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// Every compared term matched.
    Ok,
    /// Evaluation failed beyond `num_required_terms`, but all required
    /// terms were produced and matched.
    Warning,
    /// A required term was wrong, or evaluation failed before reaching
    /// `num_required_terms`.
    Error,
}

/// Evaluates `program` for `num_terms` terms starting at its `offset`
/// directive, appending each to `seq`. Returns the total step count
/// spent across all terms actually produced.
///
/// `max_eval_secs`, when set, bounds the wall-clock time spent across
/// the whole call; elapsed time is polled between terms (not within
/// one), so a single pathologically slow term can still overrun it.
///
/// When `throw_on_error` is `false`, an evaluation error (including a
/// timeout) truncates the run at the last successful term instead of
/// propagating; the partial step count is still returned. When `true`,
/// the first error is returned unchanged (after its step count is
/// discarded).
///
/// # Errors
///
/// Returns the interpreter's error if `throw_on_error` is `true` and a
/// term fails to evaluate, or [`Error::Timeout`] if `throw_on_error` is
/// `true` and `max_eval_secs` elapses before `num_terms` terms were
/// produced.
pub fn eval(
    program: &Program,
    seq: &mut Sequence,
    num_terms: usize,
    throw_on_error: bool,
    limits: Limits,
    max_eval_secs: Option<u64>,
) -> Result<u64, Error> {
    let mut interp = Interpreter::standalone(limits);
    let mut steps = 0u64;
    let offset = program.offset();
    let start = Instant::now();
    let budget = max_eval_secs.map(Duration::from_secs);
    for i in 0..num_terms {
        if budget.is_some_and(|b| start.elapsed() >= b) {
            if throw_on_error {
                return Err(Error::Timeout);
            }
            break;
        }
        let mut memory = Memory::new();
        let input = Number::from(offset + i as i64);
        memory.set(INPUT_CELL, input).map_err(seqmine_core::interp::Error::Memory)?;
        match interp.run(program, &mut memory) {
            Ok(used) => {
                steps += used;
                seq.push(memory.get(OUTPUT_CELL).map_err(seqmine_core::interp::Error::Memory)?);
            }
            Err(err) if throw_on_error => return Err(err.into()),
            Err(_) => break,
        }
    }
    Ok(steps)
}

/// Checks `program` against `expected`, the target's confirmed terms.
///
/// Evaluates term-by-term, comparing each produced value against
/// `expected`, until either a mismatch, an evaluation error, or
/// `expected` is exhausted. `num_required_terms` is the minimum number
/// of correct terms below which any failure is an [`Status::Error`]
/// rather than a [`Status::Warning`]. `id` is accepted for parity with
/// the source interface (it identifies the target for logging and
/// b-file naming by callers) but is not otherwise consulted here.
/// `max_eval_secs`, when set, bounds wall-clock time across the whole
/// call the same way it does in [`eval`]; exceeding it is treated the
/// same as any other failure to produce the next term.
#[must_use]
pub fn check(
    program: &Program,
    expected: &Sequence,
    num_required_terms: usize,
    _id: i64,
    limits: Limits,
    max_eval_secs: Option<u64>,
) -> (Status, u64) {
    let mut interp = Interpreter::standalone(limits);
    let offset = program.offset();
    let mut steps = 0u64;
    let mut matched = 0usize;
    let start = Instant::now();
    let budget = max_eval_secs.map(Duration::from_secs);

    for (i, want) in expected.iter().enumerate() {
        if budget.is_some_and(|b| start.elapsed() >= b) {
            let status = if matched < num_required_terms { Status::Error } else { Status::Warning };
            return (status, steps);
        }
        let mut memory = Memory::new();
        let input = Number::from(offset + i as i64);
        let produced = memory
            .set(INPUT_CELL, input)
            .map_err(seqmine_core::interp::Error::Memory)
            .and_then(|()| interp.run(program, &mut memory))
            .and_then(|used| {
                steps += used;
                memory.get(OUTPUT_CELL).map_err(seqmine_core::interp::Error::Memory)
            });
        match produced {
            Ok(value) if &value == want => matched += 1,
            Ok(_) => {
                let status = if matched < num_required_terms { Status::Error } else { Status::Warning };
                return (status, steps);
            }
            Err(_) => {
                let status = if matched < num_required_terms { Status::Error } else { Status::Warning };
                return (status, steps);
            }
        }
    }
    (Status::Ok, steps)
}

/// Writes `seq`'s terms as b-file lines (`offset+i value`) to `out`,
/// one per produced term, starting at `program`'s `offset` directive.
///
/// # Errors
///
/// Returns any I/O error encountered while writing.
pub fn write_bfile(program: &Program, seq: &Sequence, out: &mut impl Write) -> io::Result<()> {
    let offset = program.offset();
    for (i, term) in seq.iter().enumerate() {
        writeln!(out, "{} {term}", offset + i as i64)?;
    }
    Ok(())
}

/// Writes a single b-file error line (`offset+i -> error-message`), as
/// emitted by [`check`] callers when evaluation fails partway through.
///
/// # Errors
///
/// Returns any I/O error encountered while writing.
pub fn write_bfile_error(
    program: &Program,
    index: usize,
    message: &str,
    out: &mut impl Write,
) -> io::Result<()> {
    writeln!(out, "{} -> {message}", program.offset() + index as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqmine_core::program::{Operand, Operation, OperationType as Op};

    fn fibonacci() -> Program {
        let mut p = Program::new();
        p.push(Operation::new(Op::Mov, Operand::direct(1), Operand::constant(1)));
        p.push(Operation::new(Op::Lpb, Operand::direct(0), Operand::constant(1)));
        p.push(Operation::new(Op::Sub, Operand::direct(0), Operand::constant(1)));
        p.push(Operation::new(Op::Mov, Operand::direct(2), Operand::direct(1)));
        p.push(Operation::new(Op::Add, Operand::direct(1), Operand::direct(0)));
        p.push(Operation::new(Op::Mov, Operand::direct(0), Operand::direct(2)));
        p.push(Operation::nullary(Op::Lpe));
        p.push(Operation::new(Op::Mov, Operand::direct(0), Operand::direct(1)));
        p
    }

    #[test]
    fn eval_produces_the_fibonacci_prefix() {
        let program = fibonacci();
        let mut seq = Sequence::new();
        eval(&program, &mut seq, 10, true, Limits::default(), None).unwrap();
        let want: Sequence = [1, 1, 2, 3, 5, 8, 13, 21, 34, 55].into_iter().map(Number::from).collect();
        assert_eq!(seq, want);
    }

    #[test]
    fn check_reports_ok_on_a_matching_sequence() {
        let program = fibonacci();
        let expected: Sequence = [1, 1, 2, 3, 5].into_iter().map(Number::from).collect();
        let (status, _) = check(&program, &expected, 3, 1, Limits::default(), None);
        assert_eq!(status, Status::Ok);
    }

    #[test]
    fn check_reports_error_on_an_early_mismatch() {
        let program = fibonacci();
        let expected: Sequence = [1, 99, 2].into_iter().map(Number::from).collect();
        let (status, _) = check(&program, &expected, 3, 1, Limits::default(), None);
        assert_eq!(status, Status::Error);
    }

    #[test]
    fn check_reports_warning_past_the_required_window() {
        let program = fibonacci();
        let mut expected: Sequence = [1, 1, 2, 3, 5].into_iter().map(Number::from).collect();
        expected.push(Number::from(999));
        let (status, _) = check(&program, &expected, 5, 1, Limits::default(), None);
        assert_eq!(status, Status::Warning);
    }

    #[test]
    fn eval_truncates_at_the_last_successful_term_on_timeout() {
        let program = fibonacci();
        let mut seq = Sequence::new();
        let steps = eval(&program, &mut seq, 10, false, Limits::default(), Some(0)).unwrap();
        assert_eq!(seq.len(), 0);
        assert_eq!(steps, 0);
    }

    #[test]
    fn eval_propagates_timeout_when_strict() {
        let program = fibonacci();
        let mut seq = Sequence::new();
        let err = eval(&program, &mut seq, 10, true, Limits::default(), Some(0)).unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[test]
    fn check_treats_an_expired_budget_like_any_other_failure() {
        let program = fibonacci();
        let expected: Sequence = [1, 1, 2, 3, 5].into_iter().map(Number::from).collect();
        let (status, steps) = check(&program, &expected, 3, 1, Limits::default(), Some(0));
        assert_eq!(status, Status::Error);
        assert_eq!(steps, 0);
    }

    #[test]
    fn bfile_lines_carry_the_offset() {
        let mut program = Program::new();
        program.directives.insert("offset".to_string(), 2);
        let seq: Sequence = [10, 20].into_iter().map(Number::from).collect();
        let mut out = Vec::new();
        write_bfile(&program, &seq, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "2 10\n3 20\n");
    }
}
