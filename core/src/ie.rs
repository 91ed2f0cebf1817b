//! Incremental evaluator: accelerates evaluation of *simple-loop*
//! programs (pre-loop ⟶ `LPB counter,1` ⟶ body ⟶ `LPE` ⟶ post-loop) by
//! reusing the memory state a prior call left the loop body in, instead
//! of re-running every iteration from scratch for every new argument.
//!
//! [`IncrementalEvaluator::init`] performs the static analysis of §4.2;
//! on success the returned evaluator is behavior-equivalent to running
//! [`crate::interp::Interpreter::run`] on the original program for every
//! argument in the sequence `0, 1, 2, …`, just faster.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use seqmine_arch::{Memory, Number};

use crate::interp::{self, Interpreter, Limits};
use crate::program::{Operand, OperationType, Program, INPUT_CELL, OUTPUT_CELL};

/// The largest accepted counter decrement, per the static check in §4.2
/// step 4.
const MAX_DECREMENT: i64 = 1000;

/// Operation types the incremental evaluator accepts inside pre-loop,
/// body, and post-loop straight-line code. Restricted to pure arithmetic
/// and `MOV`: `SEQ`/`PRG`/`CLR`/nested loops/`DBG` are out of scope for
/// this accelerator (the reference source's incremental evaluator makes
/// the same simplifying restriction, accepting only the linear-recurrence
/// shape it was built to recognize).
fn is_supported(op_type: OperationType) -> bool {
    matches!(op_type, OperationType::Nop) || op_type.is_arithmetic() || op_type == OperationType::Mov
}

/// An error initializing or running the incremental evaluator.
#[derive(Debug, Error)]
pub enum Error {
    /// A static check in [`IncrementalEvaluator::init`] failed; the
    /// program does not have the simple-loop shape this accelerator
    /// supports and must fall back to [`crate::interp::Interpreter`].
    #[error("program is not supported by the incremental evaluator: {0}")]
    Unsupported(&'static str),
    /// Error running a pre-loop/body/post-loop slice.
    #[error(transparent)]
    Interp(#[from] interp::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecrementKind {
    Sub,
    Trn,
}

/// Per-slice runtime state (`s = new_loop_count mod decrement`).
#[derive(Clone, Debug, Default)]
struct SliceState {
    memory: Memory,
    previous_loop_count: i64,
    total_steps: u64,
    visited: bool,
}

/// Accelerated evaluator for a single simple-loop program.
pub struct IncrementalEvaluator {
    pre_loop: Program,
    body: Program,
    post_loop: Program,
    counter_cell: i64,
    decrement: i64,
    decrement_kind: DecrementKind,
    lower_bound: i64,
    input_dependent: Vec<i64>,
    slices: HashMap<i64, SliceState>,
    arg: i64,
    runner: Interpreter,
}

impl IncrementalEvaluator {
    /// Attempts to commit to the simple-loop structure required to
    /// accelerate `program`. Returns [`Error::Unsupported`] with a short
    /// reason if any static check in §4.2 fails; the caller should fall
    /// back to the plain interpreter in that case.
    pub fn init(program: &Program, limits: Limits) -> Result<Self, Error> {
        for op in &program.ops {
            if matches!(op.target, Operand::Indirect(_)) || matches!(op.source, Operand::Indirect(_)) {
                return Err(Error::Unsupported("indirect operand"));
            }
        }

        let (pre, lpb_target, body, post) = split_single_loop(&program.ops)?;
        let counter_cell = as_direct_cell(&lpb_target).ok_or(Error::Unsupported("loop counter is not a direct cell"))?;

        for op in pre.iter().chain(body.iter()).chain(post.iter()) {
            if !is_supported(op.op_type) {
                return Err(Error::Unsupported("unsupported operation type"));
            }
        }

        let mut dependent: HashSet<i64> = HashSet::new();
        dependent.insert(INPUT_CELL);
        for op in pre {
            classify_pre_loop(op, &mut dependent)?;
        }
        if !dependent.contains(&counter_cell) {
            return Err(Error::Unsupported("loop counter is not input-dependent"));
        }

        let (decrement, decrement_kind, lower_bound) = find_decrement(body, counter_cell)?;
        for op in body {
            let target_cell = as_direct_cell(&op.target);
            let source_cell = as_direct_cell(&op.source);
            let is_decrement_op = target_cell == Some(counter_cell)
                && matches!(op.op_type, OperationType::Sub | OperationType::Trn);
            let is_bound_op = target_cell == Some(counter_cell) && op.op_type == OperationType::Max;
            if is_decrement_op || is_bound_op {
                continue;
            }
            if let Some(c) = target_cell {
                if c != counter_cell && dependent.contains(&c) {
                    return Err(Error::Unsupported("body writes an input-dependent cell other than the counter"));
                }
            }
            if let Some(c) = source_cell {
                if c != counter_cell && dependent.contains(&c) {
                    return Err(Error::Unsupported("body reads an input-dependent cell other than the counter"));
                }
            }
        }

        // The counter cell's own decrement is handled by the loop
        // mechanics above, not the generic reordering guard below.
        let mut stateful = stateful_cells(body);
        stateful.remove(&counter_cell);
        let mut output = output_cells(post);
        output.remove(&counter_cell);
        let guarded: HashSet<i64> = stateful.union(&output).copied().collect();
        if !is_commutative_closed(body, &guarded) {
            return Err(Error::Unsupported("body is not commutative on stateful/output cells"));
        }
        let counter_dependent = counter_dependent_cells(body, counter_cell);
        if !counter_dependent.is_empty() && !(stateful.len() <= 1 && is_commutative_closed(body, &stateful)) {
            return Err(Error::Unsupported("loop-counter-dependent cells require a single commutative stateful cell"));
        }

        let mut input_dependent: Vec<i64> = dependent.into_iter().collect();
        input_dependent.sort_unstable();

        let mut pre_loop = Program::new();
        pre_loop.ops = pre.to_vec();
        let mut body_prog = Program::new();
        body_prog.ops = body.to_vec();
        let mut post_loop = Program::new();
        post_loop.ops = post.to_vec();

        Ok(Self {
            pre_loop,
            body: body_prog,
            post_loop,
            counter_cell,
            decrement,
            decrement_kind,
            lower_bound,
            input_dependent,
            slices: HashMap::new(),
            arg: 0,
            runner: Interpreter::standalone(limits),
        })
    }

    /// Computes the next term and its step count, advancing the internal
    /// argument counter.
    ///
    /// # Errors
    ///
    /// Propagates any [`interp::Error`] from running a slice (e.g. a
    /// cycle-bound violation).
    pub fn next(&mut self) -> Result<(Number, u64), Error> {
        let mut pre_mem = Memory::new();
        pre_mem.set(INPUT_CELL, Number::from(self.arg))?;
        let pre_steps = self.runner.run(&self.pre_loop, &mut pre_mem)?;
        let counter = pre_mem.get(self.counter_cell)?.to_i64().unwrap_or(i64::MAX);

        let new_loop_count = (counter - self.lower_bound).max(0);
        let slice_key = new_loop_count.rem_euclid(self.decrement.max(1));

        let slice = self.slices.entry(slice_key).or_default();
        let first_visit = !slice.visited;
        let mut additional_loops = (new_loop_count - slice.previous_loop_count) / self.decrement;
        if first_visit
            && (self.decrement_kind == DecrementKind::Trn || self.lower_bound != 0)
            && new_loop_count % self.decrement != 0
        {
            additional_loops += 1;
        }
        if !slice.visited {
            slice.memory = pre_mem.clone();
            slice.visited = true;
        } else {
            for &cell in &self.input_dependent {
                let v = pre_mem.get(cell)?;
                slice.memory.set(cell, v)?;
            }
        }

        let mut loop_steps = 0u64;
        for _ in 0..additional_loops.max(0) {
            loop_steps += self.runner.run(&self.body, &mut slice.memory)?;
        }
        slice.total_steps += loop_steps;
        slice.previous_loop_count = new_loop_count;
        let total_steps = slice.total_steps;
        let mut final_mem = slice.memory.clone();

        let final_counter = {
            let candidate = if self.decrement_kind == DecrementKind::Sub && self.lower_bound == 0 {
                slice_key
            } else {
                self.lower_bound
            };
            candidate.min(counter)
        };
        final_mem.set(self.counter_cell, Number::from(final_counter))?;
        let extra_steps = self.runner.run(&self.body, &mut final_mem)?;
        let post_steps = self.runner.run(&self.post_loop, &mut final_mem)?;
        let output = final_mem.get(OUTPUT_CELL)?;

        self.arg += 1;
        Ok((output, pre_steps + total_steps + extra_steps + post_steps))
    }
}

fn as_direct_cell(operand: &Operand) -> Option<i64> {
    match operand {
        Operand::Direct(n) => n.to_i64().ok(),
        _ => None,
    }
}

type Split<'a> = (&'a [crate::program::Operation], Operand, &'a [crate::program::Operation], &'a [crate::program::Operation]);

fn split_single_loop(ops: &[crate::program::Operation]) -> Result<Split<'_>, Error> {
    let mut depth = 0i32;
    let mut open: Option<usize> = None;
    let mut close: Option<usize> = None;
    for (i, op) in ops.iter().enumerate() {
        match op.op_type {
            OperationType::Lpb => {
                if depth == 0 {
                    if open.is_some() {
                        return Err(Error::Unsupported("more than one outermost loop"));
                    }
                    open = Some(i);
                }
                depth += 1;
            }
            OperationType::Lpe => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                }
            }
            _ => {}
        }
    }
    let (open, close) = match (open, close) {
        (Some(o), Some(c)) => (o, c),
        _ => return Err(Error::Unsupported("no outermost loop")),
    };
    let lpb = &ops[open];
    if !matches!(&lpb.source, Operand::Constant(n) if *n == Number::one()) {
        return Err(Error::Unsupported("loop is not a simple counter loop"));
    }
    let body = &ops[open + 1..close];
    if body.iter().any(|op| matches!(op.op_type, OperationType::Lpb | OperationType::Lpe)) {
        return Err(Error::Unsupported("nested loops in body"));
    }
    Ok((&ops[..open], lpb.target.clone(), body, &ops[close + 1..]))
}

fn classify_pre_loop(op: &crate::program::Operation, dependent: &mut HashSet<i64>) -> Result<(), Error> {
    let Some(target) = as_direct_cell(&op.target) else {
        return Err(Error::Unsupported("pre-loop writes a non-direct target"));
    };
    match op.op_type {
        OperationType::Mov => match &op.source {
            Operand::Constant(_) => {
                dependent.remove(&target);
            }
            Operand::Direct(k) => {
                let Some(k) = k.to_i64().ok() else {
                    return Err(Error::Unsupported("pre-loop operand out of range"));
                };
                if dependent.contains(&k) {
                    dependent.insert(target);
                } else {
                    dependent.remove(&target);
                }
            }
            Operand::Indirect(_) => return Err(Error::Unsupported("pre-loop indirect operand")),
        },
        OperationType::Add | OperationType::Sub | OperationType::Trn | OperationType::Mul
        | OperationType::Div | OperationType::Pow => {
            if !op.source.is_constant() {
                return Err(Error::Unsupported("pre-loop transform against a non-constant"));
            }
            // A constant transform preserves the target's dependency status.
        }
        _ => return Err(Error::Unsupported("unsupported pre-loop operation")),
    }
    Ok(())
}

fn find_decrement(body: &[crate::program::Operation], counter_cell: i64) -> Result<(i64, DecrementKind, i64), Error> {
    let mut found: Option<(i64, DecrementKind)> = None;
    let mut lower_bound = 0i64;
    for op in body {
        let Some(target) = as_direct_cell(&op.target) else { continue };
        if target != counter_cell {
            continue;
        }
        match op.op_type {
            OperationType::Sub | OperationType::Trn => {
                let Operand::Constant(k) = &op.source else {
                    return Err(Error::Unsupported("counter decrement against a non-constant"));
                };
                let Ok(k) = k.to_i64() else {
                    return Err(Error::Unsupported("counter decrement out of range"));
                };
                if !(1..=MAX_DECREMENT).contains(&k) {
                    return Err(Error::Unsupported("counter decrement out of bounds"));
                }
                if found.is_some() {
                    return Err(Error::Unsupported("counter updated more than once"));
                }
                let kind = if op.op_type == OperationType::Trn { DecrementKind::Trn } else { DecrementKind::Sub };
                found = Some((k, kind));
            }
            OperationType::Max => {
                let Operand::Constant(k) = &op.source else {
                    return Err(Error::Unsupported("counter bound against a non-constant"));
                };
                let Ok(k) = k.to_i64() else {
                    return Err(Error::Unsupported("counter bound out of range"));
                };
                lower_bound = lower_bound.max(k);
            }
            _ => return Err(Error::Unsupported("counter written by an unsupported operation")),
        }
    }
    let (decrement, kind) = found.ok_or(Error::Unsupported("counter is never decremented"))?;
    Ok((decrement, kind, lower_bound))
}

/// Cells read before any write to them within a single pass over `body`.
fn stateful_cells(body: &[crate::program::Operation]) -> HashSet<i64> {
    let mut written: HashSet<i64> = HashSet::new();
    let mut stateful = HashSet::new();
    for op in body {
        if let Some(c) = as_direct_cell(&op.source) {
            if !written.contains(&c) {
                stateful.insert(c);
            }
        }
        if op.op_type.metadata().is_reading_target {
            if let Some(c) = as_direct_cell(&op.target) {
                if !written.contains(&c) {
                    stateful.insert(c);
                }
            }
        }
        if op.op_type.metadata().is_writing_target {
            if let Some(c) = as_direct_cell(&op.target) {
                written.insert(c);
            }
        }
    }
    stateful
}

/// Cells read before any write within `post_loop`, plus [`OUTPUT_CELL`].
fn output_cells(post_loop: &[crate::program::Operation]) -> HashSet<i64> {
    let mut cells = stateful_cells(post_loop);
    cells.insert(OUTPUT_CELL);
    cells
}

/// Transitive closure of cells whose writes (in `body`) depend, directly
/// or indirectly, on `counter_cell` — excluding the counter cell itself.
fn counter_dependent_cells(body: &[crate::program::Operation], counter_cell: i64) -> HashSet<i64> {
    let mut dependent: HashSet<i64> = HashSet::new();
    let mut changed = true;
    while changed {
        changed = false;
        for op in body {
            let Some(target) = as_direct_cell(&op.target) else { continue };
            if target == counter_cell {
                continue;
            }
            let reads_dependent = as_direct_cell(&op.source).is_some_and(|c| c == counter_cell || dependent.contains(&c));
            if reads_dependent && dependent.insert(target) {
                changed = true;
            }
        }
    }
    dependent
}

/// Whether every update to a cell in `guarded` uses a commutative op, and
/// no cell in `guarded` is read as the source of an op that writes a
/// *different* cell also in `guarded` (cross-entangling two fold cells
/// would make loop-body reordering across iterations unsound).
fn is_commutative_closed(body: &[crate::program::Operation], guarded: &HashSet<i64>) -> bool {
    for op in body {
        let Some(target) = as_direct_cell(&op.target) else { continue };
        if !guarded.contains(&target) {
            continue;
        }
        if op.op_type.metadata().is_writing_target && !op.op_type.is_commutative() && op.op_type != OperationType::Mov {
            return false;
        }
        if let Some(source) = as_direct_cell(&op.source) {
            if source != target && guarded.contains(&source) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Operation, OperationType as Op};

    /// A Fibonacci encoding whose loop counter lives in a dedicated cell
    /// (`$3`, copied from the input) that nothing but its own decrement
    /// ever touches, unlike a tighter single-register encoding that
    /// reassigns the loop-counter cell a second time via `mov` (see
    /// DESIGN.md — that shape falls outside what this accelerator
    /// supports).
    fn fibonacci() -> Program {
        let mut p = Program::new();
        p.push(Operation::new(Op::Mov, Operand::direct(3), Operand::direct(0)));
        p.push(Operation::new(Op::Mov, Operand::direct(0), Operand::constant(1)));
        p.push(Operation::new(Op::Lpb, Operand::direct(3), Operand::constant(1)));
        p.push(Operation::new(Op::Sub, Operand::direct(3), Operand::constant(1)));
        p.push(Operation::new(Op::Mov, Operand::direct(2), Operand::direct(0)));
        p.push(Operation::new(Op::Add, Operand::direct(0), Operand::direct(1)));
        p.push(Operation::new(Op::Mov, Operand::direct(1), Operand::direct(2)));
        p.push(Operation::nullary(Op::Lpe));
        p
    }

    #[test]
    fn accepts_fibonacci_and_matches_interpreter() {
        let program = fibonacci();
        let mut ie = IncrementalEvaluator::init(&program, Limits::default()).unwrap();
        let mut interp = Interpreter::standalone(Limits::default());
        for n in 0..12 {
            let (ie_val, _) = ie.next().unwrap();
            let mut mem = Memory::new();
            mem.set(INPUT_CELL, Number::from(n)).unwrap();
            interp.run(&program, &mut mem).unwrap();
            let direct = mem.get(OUTPUT_CELL).unwrap();
            assert_eq!(ie_val, direct, "mismatch at n={n}");
        }
    }

    #[test]
    fn rejects_indirect_operands() {
        let mut p = Program::new();
        p.push(Operation::new(Op::Lpb, Operand::direct(0), Operand::constant(1)));
        p.push(Operation::new(Op::Add, Operand::Indirect(Number::from(0_i64)), Operand::constant(1)));
        p.push(Operation::nullary(Op::Lpe));
        assert!(IncrementalEvaluator::init(&p, Limits::default()).is_err());
    }

    #[test]
    fn rejects_multiple_outermost_loops() {
        let mut p = Program::new();
        p.push(Operation::new(Op::Lpb, Operand::direct(0), Operand::constant(1)));
        p.push(Operation::new(Op::Sub, Operand::direct(0), Operand::constant(1)));
        p.push(Operation::nullary(Op::Lpe));
        p.push(Operation::new(Op::Lpb, Operand::direct(1), Operand::constant(1)));
        p.push(Operation::new(Op::Sub, Operand::direct(1), Operand::constant(1)));
        p.push(Operation::nullary(Op::Lpe));
        assert!(IncrementalEvaluator::init(&p, Limits::default()).is_err());
    }
}
