//! Interval analysis over program cells.
//!
//! Computes a sound (possibly imprecise) over-approximation of the set
//! of values each memory cell can hold at every program point, given an
//! upper bound on the input argument. Used by the optimizer and
//! minimizer to rule out rewrites that could change behavior on some
//! reachable input, without re-running the interpreter.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use thiserror::Error;

use crate::program::{Operand, Operation, OperationType, Program};
use seqmine_arch::{Index, Number};

/// One side of an interval: a finite value, or an unbounded extreme.
///
/// [`Number`] only has a single absorbing `INF`, used for values whose
/// magnitude or sign is unknown; here the two directions must be told
/// apart, so ranges get their own bound type instead of reusing it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Bound {
    NegInf,
    Value(BigInt),
    PosInf,
}

impl Bound {
    fn finite(n: i64) -> Self {
        Self::Value(BigInt::from(n))
    }

    fn sign(&self) -> i8 {
        match self {
            Self::NegInf => -1,
            Self::PosInf => 1,
            Self::Value(v) if v.is_negative() => -1,
            Self::Value(v) if v.is_zero() => 0,
            Self::Value(_) => 1,
        }
    }

    fn is_zero(&self) -> bool {
        matches!(self, Self::Value(v) if v.is_zero())
    }
}

impl Ord for Bound {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::NegInf, Self::NegInf) | (Self::PosInf, Self::PosInf) => Ordering::Equal,
            (Self::NegInf, _) | (_, Self::PosInf) => Ordering::Less,
            (_, Self::NegInf) | (Self::PosInf, _) => Ordering::Greater,
            (Self::Value(a), Self::Value(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Bound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegInf => write!(f, "-inf"),
            Self::PosInf => write!(f, "inf"),
            Self::Value(v) => write!(f, "{v}"),
        }
    }
}

fn bound_neg(x: &Bound) -> Bound {
    match x {
        Bound::NegInf => Bound::PosInf,
        Bound::PosInf => Bound::NegInf,
        Bound::Value(v) => Bound::Value(-v),
    }
}

fn bound_add(x: &Bound, y: &Bound) -> Bound {
    match (x, y) {
        (Bound::NegInf, Bound::PosInf) | (Bound::PosInf, Bound::NegInf) => Bound::PosInf,
        (Bound::NegInf, _) | (_, Bound::NegInf) => Bound::NegInf,
        (Bound::PosInf, _) | (_, Bound::PosInf) => Bound::PosInf,
        (Bound::Value(a), Bound::Value(b)) => Bound::Value(a + b),
    }
}

/// Sound but imprecise: any pairing involving an infinite side collapses
/// to a signed infinity rather than tracking magnitude.
fn bound_mul(x: &Bound, y: &Bound) -> Bound {
    if x.is_zero() || y.is_zero() {
        return Bound::Value(BigInt::zero());
    }
    match (x, y) {
        (Bound::Value(a), Bound::Value(b)) => Bound::Value(a * b),
        _ => {
            if x.sign() * y.sign() >= 0 {
                Bound::PosInf
            } else {
                Bound::NegInf
            }
        }
    }
}

fn bound_min(x: &Bound, y: &Bound) -> Bound {
    if x <= y {
        x.clone()
    } else {
        y.clone()
    }
}

fn bound_max(x: &Bound, y: &Bound) -> Bound {
    if x >= y {
        x.clone()
    } else {
        y.clone()
    }
}

/// A sound interval `[lower, upper]` a cell's value is known to fall
/// within. `NegInf`/`PosInf` bounds mean "unknown in this direction".
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Range {
    pub lower: Bound,
    pub upper: Bound,
}

impl Range {
    #[must_use]
    pub fn unknown() -> Self {
        Self { lower: Bound::NegInf, upper: Bound::PosInf }
    }

    #[must_use]
    pub fn non_negative() -> Self {
        Self { lower: Bound::finite(0), upper: Bound::PosInf }
    }

    #[must_use]
    pub fn exact(n: &Number) -> Self {
        match n.finite() {
            Some(v) => Self { lower: Bound::Value(v.clone()), upper: Bound::Value(v.clone()) },
            None => Self::unknown(),
        }
    }

    #[must_use]
    pub fn constant(k: i64) -> Self {
        Self { lower: Bound::finite(k), upper: Bound::finite(k) }
    }

    fn join(&self, other: &Self) -> Self {
        Self { lower: bound_min(&self.lower, &other.lower), upper: bound_max(&self.upper, &other.upper) }
    }
}

fn range_add(a: &Range, b: &Range) -> Range {
    Range { lower: bound_add(&a.lower, &b.lower), upper: bound_add(&a.upper, &b.upper) }
}

fn range_neg(a: &Range) -> Range {
    Range { lower: bound_neg(&a.upper), upper: bound_neg(&a.lower) }
}

fn range_sub(a: &Range, b: &Range) -> Range {
    range_add(a, &range_neg(b))
}

fn range_mul(a: &Range, b: &Range) -> Range {
    let corners = [
        bound_mul(&a.lower, &b.lower),
        bound_mul(&a.lower, &b.upper),
        bound_mul(&a.upper, &b.lower),
        bound_mul(&a.upper, &b.upper),
    ];
    let lower = corners.iter().min().cloned().unwrap();
    let upper = corners.iter().max().cloned().unwrap();
    Range { lower, upper }
}

/// `max(a - b, 0)`: monotonic in the difference, so bounds carry over
/// directly once clamped at zero.
fn range_trn(a: &Range, b: &Range) -> Range {
    let d = range_sub(a, b);
    let zero = Bound::finite(0);
    Range { lower: bound_max(&d.lower, &zero), upper: bound_max(&d.upper, &zero) }
}

fn range_min(a: &Range, b: &Range) -> Range {
    Range { lower: bound_min(&a.lower, &b.lower), upper: bound_min(&a.upper, &b.upper) }
}

fn range_max(a: &Range, b: &Range) -> Range {
    Range { lower: bound_max(&a.lower, &b.lower), upper: bound_max(&a.upper, &b.upper) }
}

fn range_boolean() -> Range {
    Range { lower: Bound::finite(0), upper: Bound::finite(1) }
}

/// Applies the interval counterpart of `op_type` to operand ranges `a`
/// (target, before the op) and `b` (source). Ops not given a precise
/// rule here fall back to [`Range::unknown`], or [`Range::non_negative`]
/// where the underlying semantics (§4.4) guarantee non-negativity
/// regardless of input — sound, if wider than necessary.
fn apply(op_type: OperationType, a: &Range, b: &Range) -> Range {
    match op_type {
        OperationType::Add => range_add(a, b),
        OperationType::Sub => range_sub(a, b),
        OperationType::Trn => range_trn(a, b),
        OperationType::Mul => range_mul(a, b),
        OperationType::Min => range_min(a, b),
        OperationType::Max => range_max(a, b),
        OperationType::Equ | OperationType::Neq | OperationType::Leq | OperationType::Geq => range_boolean(),
        OperationType::Gcd
        | OperationType::Dgs
        | OperationType::Dir
        | OperationType::Dgr
        | OperationType::Log
        | OperationType::Nrt
        | OperationType::Bin => Range::non_negative(),
        _ => Range::unknown(),
    }
}

/// Per-cell intervals at a single program point.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RangeMap(HashMap<Index, Range>);

impl RangeMap {
    #[must_use]
    pub fn get(&self, cell: Index) -> Range {
        self.0.get(&cell).cloned().unwrap_or_else(|| Range::constant(0))
    }

    pub fn set(&mut self, cell: Index, range: Range) {
        self.0.insert(cell, range);
    }

    fn join(&self, other: &Self) -> Self {
        let mut cells: std::collections::BTreeSet<Index> = self.0.keys().copied().collect();
        cells.extend(other.0.keys().copied());
        let mut joined = HashMap::new();
        for cell in cells {
            joined.insert(cell, self.get(cell).join(&other.get(cell)));
        }
        Self(joined)
    }
}

/// An error analyzing a [`Program`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error("indirect operands are not supported by range analysis")]
    Indirect,
    #[error("operation type {0:?} is not supported by range analysis")]
    UnsupportedOp(OperationType),
    #[error("nested-loop depth exceeds the supported bound")]
    LoopTooDeep,
    #[error("callee program {0} has no cached range analysis")]
    UnknownCallee(i64),
}

/// Cached [`RangeMap`]s for programs invoked via `SEQ`, keyed by id.
///
/// Mirrors [`crate::interp::ProgramCache`]: callers populate it with the
/// analyses of any sub-programs a `SEQ` might invoke before analyzing
/// the parent.
pub trait SubRangeCache {
    fn get(&self, id: i64) -> Option<RangeMap>;
}

impl SubRangeCache for HashMap<i64, RangeMap> {
    fn get(&self, id: i64) -> Option<RangeMap> {
        self.get(&id).cloned()
    }
}

/// A [`SubRangeCache`] with nothing registered; any `SEQ` fails analysis.
pub struct NoSubRanges;

impl SubRangeCache for NoSubRanges {
    fn get(&self, _id: i64) -> Option<RangeMap> {
        None
    }
}

fn direct_cell(operand: &Operand) -> Result<Index, Error> {
    match operand {
        Operand::Direct(n) => n.to_i64().map_err(|_| Error::Indirect),
        Operand::Indirect(_) => Err(Error::Indirect),
        Operand::Constant(_) => unreachable!("callers only pass write targets here"),
    }
}

fn operand_range(operand: &Operand, ranges: &RangeMap) -> Result<Range, Error> {
    match operand {
        Operand::Constant(n) => Ok(Range::exact(n)),
        Operand::Direct(n) => Ok(ranges.get(n.to_i64().map_err(|_| Error::Indirect)?)),
        Operand::Indirect(_) => Err(Error::Indirect),
    }
}

/// Computes a sound `RangeMap` for every cell reachable at the end of
/// `program`, given the interval `[0, input_upper]` for `INPUT_CELL`.
///
/// Programs with loops are analyzed in two passes: the first establishes
/// a reachable fixpoint for cells written inside loop bodies (entering
/// every `LPB` with the widest range `LPE` could have left it), the
/// second re-runs with that fixpoint as the loop's entering state so the
/// final `LPE` join is computed relative to accurate bounds.
pub fn analyze(program: &Program, input_upper: &Number, sub_ranges: &dyn SubRangeCache) -> Result<RangeMap, Error> {
    let has_loop = program.ops.iter().any(|op| op.op_type == OperationType::Lpb);

    let mut initial = RangeMap::default();
    initial.set(crate::program::INPUT_CELL, Range { lower: Bound::finite(0), upper: Range::exact(input_upper).upper });

    if has_loop {
        let widened = run_pass(program, initial.clone(), sub_ranges, None)?;
        run_pass(program, initial, sub_ranges, Some(&widened))
    } else {
        run_pass(program, initial, sub_ranges, None)
    }
}

/// One linear walk over `program`. `loop_entry_hint`, when present, is
/// the per-cell range a loop body may be entered with on some later
/// iteration (from an earlier pass), used to seed the `LPE` join so it
/// doesn't have to assume the tightest (first-iteration-only) range.
fn run_pass(
    program: &Program,
    mut ranges: RangeMap,
    sub_ranges: &dyn SubRangeCache,
    loop_entry_hint: Option<&RangeMap>,
) -> Result<RangeMap, Error> {
    const MAX_LOOP_DEPTH: usize = 100;
    let mut stack: Vec<RangeMap> = Vec::new();

    for op in &program.ops {
        match op.op_type {
            OperationType::Nop | OperationType::Dbg => {}
            OperationType::Lpb => {
                if stack.len() >= MAX_LOOP_DEPTH {
                    return Err(Error::LoopTooDeep);
                }
                stack.push(ranges.clone());
            }
            OperationType::Lpe => {
                let entry = stack.pop().ok_or(Error::LoopTooDeep)?;
                let candidate = match loop_entry_hint {
                    Some(hint) => entry.join(hint),
                    None => entry.clone(),
                };
                ranges = join_loop(&entry, &candidate, &ranges);
            }
            OperationType::Clr | OperationType::Prg => {
                return Err(Error::UnsupportedOp(op.op_type));
            }
            OperationType::Mov => {
                let cell = direct_cell(&op.target)?;
                let source = operand_range(&op.source, &ranges)?;
                ranges.set(cell, source);
            }
            OperationType::Seq => {
                let id = match &op.source {
                    Operand::Constant(n) => n.to_i64().map_err(|_| Error::Indirect)?,
                    _ => return Err(Error::Indirect),
                };
                let callee = sub_ranges.get(id).ok_or(Error::UnknownCallee(id))?;
                let cell = direct_cell(&op.target)?;
                let arg = operand_range(&op.target, &ranges)?;
                let mut callee_input = RangeMap::default();
                callee_input.set(crate::program::INPUT_CELL, arg);
                let result = callee.join(&callee_input).get(crate::program::OUTPUT_CELL);
                ranges.set(cell, result);
            }
            _ if op.op_type.is_arithmetic() => {
                let cell = direct_cell(&op.target)?;
                let a = ranges.get(cell);
                let b = operand_range(&op.source, &ranges)?;
                ranges.set(cell, apply(op.op_type, &a, &b));
            }
            _ => return Err(Error::UnsupportedOp(op.op_type)),
        }
    }
    Ok(ranges)
}

/// Joins a loop's entering and candidate-entering ranges against the
/// range actually observed leaving the body: a cell keeps its tighter
/// (entry) bound on a side only if the body never pushed past it;
/// otherwise that side widens to unknown, since further iterations could
/// repeat the widening unboundedly.
fn join_loop(entry: &RangeMap, candidate: &RangeMap, after_body: &RangeMap) -> RangeMap {
    let mut cells: std::collections::BTreeSet<Index> = std::collections::BTreeSet::new();
    cells.extend(entry.0.keys().copied());
    cells.extend(after_body.0.keys().copied());
    let mut joined = HashMap::new();
    for cell in cells {
        let e = entry.get(cell);
        let c = candidate.get(cell);
        let body = after_body.get(cell);
        let lower = if body.lower >= e.lower { e.lower } else { Bound::NegInf };
        let upper = if body.upper <= e.upper { e.upper } else { Bound::PosInf };
        let lower = bound_min(&lower, &c.lower);
        let upper = bound_max(&upper, &c.upper);
        joined.insert(cell, Range { lower, upper });
    }
    RangeMap(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Operand, Operation, Program};

    fn build(ops: Vec<Operation>) -> Program {
        let mut p = Program::new();
        for op in ops {
            p.push(op);
        }
        p
    }

    #[test]
    fn add_widens_monotonically() {
        let program = build(vec![Operation::new(OperationType::Add, Operand::direct(0), Operand::constant(5))]);
        let ranges = analyze(&program, &Number::from(10), &NoSubRanges).unwrap();
        let r = ranges.get(crate::program::INPUT_CELL);
        assert_eq!(r.lower, Bound::finite(5));
        assert_eq!(r.upper, Bound::finite(15));
    }

    #[test]
    fn comparisons_are_boolean() {
        let program = build(vec![Operation::new(OperationType::Equ, Operand::direct(0), Operand::constant(3))]);
        let ranges = analyze(&program, &Number::from(10), &NoSubRanges).unwrap();
        let r = ranges.get(crate::program::INPUT_CELL);
        assert_eq!(r, range_boolean());
    }

    #[test]
    fn indirect_operand_is_rejected() {
        let program = build(vec![Operation::new(OperationType::Add, Operand::Indirect(Number::from(0)), Operand::constant(1))]);
        let err = analyze(&program, &Number::from(10), &NoSubRanges).unwrap_err();
        assert_eq!(err, Error::Indirect);
    }

    #[test]
    fn unknown_callee_fails_analysis() {
        let program = build(vec![Operation::new(OperationType::Seq, Operand::direct(0), Operand::constant(42))]);
        let err = analyze(&program, &Number::from(10), &NoSubRanges).unwrap_err();
        assert_eq!(err, Error::UnknownCallee(42));
    }

    #[test]
    fn loop_widens_cells_the_body_can_grow_without_bound() {
        // lpb $0 ; add $1,1 ; lpe -- $1 grows each iteration, unbounded by the join.
        let program = build(vec![
            Operation::new(OperationType::Lpb, Operand::direct(0), Operand::constant(1)),
            Operation::new(OperationType::Add, Operand::direct(1), Operand::constant(1)),
            Operation::nullary(OperationType::Lpe),
        ]);
        let ranges = analyze(&program, &Number::from(10), &NoSubRanges).unwrap();
        let r = ranges.get(1);
        assert_eq!(r.upper, Bound::PosInf);
    }

    #[test]
    fn clr_is_unsupported() {
        let program = build(vec![Operation::new(OperationType::Clr, Operand::direct(0), Operand::constant(1))]);
        let err = analyze(&program, &Number::from(10), &NoSubRanges).unwrap_err();
        assert_eq!(err, Error::UnsupportedOp(OperationType::Clr));
    }
}
