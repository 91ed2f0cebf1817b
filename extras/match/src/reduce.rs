//! Reducer/extender pairs that normalize a [`Sequence`] to a canonical
//! form for fingerprint lookup, and (when possible) transform a program
//! producing the canonical form back into one producing some other
//! sequence that shares it.

use seqmine_arch::{Number, Sequence};
use seqmine_core::program::{Operand, Operation, OperationType as Op, Program, OUTPUT_CELL};
use seqmine_core::semantics;

/// A reducer/extender pair, keyed by the auxiliary data it needs to
/// reverse its own reduction.
pub trait Reducer {
    /// Data recorded alongside a reduced sequence, needed by
    /// [`extend`](Reducer::extend) to reconstruct the original.
    type Data: Clone + Eq;

    /// Normalizes `seq`, returning the canonical form plus the data
    /// needed to invert the transform.
    fn reduce(&self, seq: &Sequence) -> (Sequence, Self::Data);

    /// Given a program that produces the canonical form matching
    /// `query` (the data recorded for the program's own sequence),
    /// attempts to build a program producing the sequence `original`
    /// was recorded against. Returns `None` when the transform cannot
    /// be inverted from the data alone.
    fn extend(&self, program: &Program, original: &Self::Data, query: &Self::Data) -> Option<Program>;
}

fn append(program: &Program, ops: Vec<Operation>) -> Program {
    let mut extended = program.clone();
    extended.ops.extend(ops);
    extended
}

/// Identity reducer: every sequence is already its own canonical form.
#[derive(Clone, Copy, Debug, Default)]
pub struct Direct;

impl Reducer for Direct {
    type Data = ();

    fn reduce(&self, seq: &Sequence) -> (Sequence, Self::Data) {
        (seq.clone(), ())
    }

    fn extend(&self, program: &Program, (): &(), (): &()) -> Option<Program> {
        Some(program.clone())
    }
}

fn gcd_of(terms: impl Iterator<Item = Number>) -> Number {
    terms.fold(Number::zero(), |acc, t| semantics::gcd(&acc, &t))
}

/// Data recorded by [`Linear1`]/[`Linear2`]: an additive offset and a
/// multiplicative factor such that `seq = reduced * factor + offset`
/// (`Linear1`) or `seq = (reduced + offset) * factor` (`Linear2`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Linear {
    pub offset: Number,
    pub factor: Number,
}

/// Strips a leading constant offset, then divides the remaining terms
/// by their gcd.
#[derive(Clone, Copy, Debug, Default)]
pub struct Linear1;

impl Reducer for Linear1 {
    type Data = Linear;

    fn reduce(&self, seq: &Sequence) -> (Sequence, Self::Data) {
        let offset = seq.first().cloned().unwrap_or_else(Number::zero);
        let shifted: Vec<Number> = seq.iter().map(|t| semantics::sub(t, &offset)).collect();
        let gcd = gcd_of(shifted.iter().cloned());
        let factor = if gcd == Number::zero() { Number::one() } else { gcd };
        let reduced = shifted.iter().map(|t| semantics::div(t, &factor)).collect();
        (reduced, Linear { offset, factor })
    }

    fn extend(&self, program: &Program, original: &Linear, query: &Linear) -> Option<Program> {
        // program computes `query.factor * reduced + query.offset`; undo
        // that to recover `reduced`, then reapply `original`'s transform.
        let target = Operand::direct(OUTPUT_CELL);
        let mut ops = vec![Operation::new(Op::Sub, target.clone(), Operand::Constant(query.offset.clone()))];
        if query.factor != Number::one() {
            ops.push(Operation::new(Op::Dif, target.clone(), Operand::Constant(query.factor.clone())));
        }
        if original.factor != Number::one() {
            ops.push(Operation::new(Op::Mul, target.clone(), Operand::Constant(original.factor.clone())));
        }
        ops.push(Operation::new(Op::Add, target, Operand::Constant(original.offset.clone())));
        Some(append(program, ops))
    }
}

/// Divides by the gcd of all terms first, then strips a leading
/// constant offset from the quotient.
#[derive(Clone, Copy, Debug, Default)]
pub struct Linear2;

impl Reducer for Linear2 {
    type Data = Linear;

    fn reduce(&self, seq: &Sequence) -> (Sequence, Self::Data) {
        let gcd = gcd_of(seq.iter().cloned());
        let factor = if gcd == Number::zero() { Number::one() } else { gcd };
        let scaled: Vec<Number> = seq.iter().map(|t| semantics::div(t, &factor)).collect();
        let offset = scaled.first().cloned().unwrap_or_else(Number::zero);
        let reduced = scaled.iter().map(|t| semantics::sub(t, &offset)).collect();
        (reduced, Linear { offset, factor })
    }

    fn extend(&self, program: &Program, original: &Linear, query: &Linear) -> Option<Program> {
        // program computes `(reduced + query.offset) * query.factor`.
        let target = Operand::direct(OUTPUT_CELL);
        let mut ops = Vec::new();
        if query.factor != Number::one() {
            ops.push(Operation::new(Op::Dif, target.clone(), Operand::Constant(query.factor.clone())));
        }
        ops.push(Operation::new(Op::Sub, target.clone(), Operand::Constant(query.offset.clone())));
        ops.push(Operation::new(Op::Add, target.clone(), Operand::Constant(original.offset.clone())));
        if original.factor != Number::one() {
            ops.push(Operation::new(Op::Mul, target, Operand::Constant(original.factor.clone())));
        }
        Some(append(program, ops))
    }
}

/// Data recorded by [`Delta`]: the number of first-differences applied
/// before falling back to [`Linear1`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeltaData {
    pub diffs: u8,
    pub linear: Linear,
}

/// Applies up to four first-differences, stopping as soon as the
/// result is no longer strictly monotone ascending, then applies
/// [`Linear1`] to whatever remains.
#[derive(Clone, Copy, Debug, Default)]
pub struct Delta;

const MAX_DIFFS: u8 = 4;

impl Reducer for Delta {
    type Data = DeltaData;

    fn reduce(&self, seq: &Sequence) -> (Sequence, Self::Data) {
        let mut current = seq.clone();
        let mut diffs = 0u8;
        while diffs < MAX_DIFFS {
            let differenced: Vec<Number> =
                current.windows(2).map(|w| semantics::sub(&w[1], &w[0])).collect();
            let strictly_ascending =
                differenced.len() >= 2 && differenced.windows(2).all(|w| w[0] < w[1]);
            if !strictly_ascending {
                break;
            }
            current = Sequence::from(differenced);
            diffs += 1;
        }
        let (reduced, linear) = Linear1.reduce(&current);
        (reduced, DeltaData { diffs, linear })
    }

    fn extend(&self, program: &Program, original: &DeltaData, query: &DeltaData) -> Option<Program> {
        // Reconstructing a differencing-level mismatch needs cumulative
        // sums over the program's own earlier terms, not just recorded
        // reducer data; only the common case (equal difference depth,
        // where the linear halves alone compose) is supported.
        if original.diffs != query.diffs {
            return None;
        }
        Linear1.extend(program, &original.linear, &query.linear)
    }
}

/// Data recorded by [`Digit`]: the modulus and the rotation that
/// maximized the frequency of the most common residue.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DigitData {
    pub base: i64,
    pub rotation: i64,
}

/// Reduces every term modulo `base`, choosing among `base` rotations
/// the one maximizing the count of the most frequent resulting digit.
/// Lossy by construction: used only as a fingerprint pre-filter, never
/// to reconstruct an exact program.
#[derive(Clone, Copy, Debug)]
pub struct Digit {
    pub base: i64,
}

/// A decimal digit reducer (`base = 10`).
#[must_use]
pub fn decimal() -> Digit {
    Digit { base: 10 }
}

/// A binary digit reducer (`base = 2`).
#[must_use]
pub fn binary() -> Digit {
    Digit { base: 2 }
}

impl Reducer for Digit {
    type Data = DigitData;

    fn reduce(&self, seq: &Sequence) -> (Sequence, Self::Data) {
        let base = Number::from(self.base);
        let mut best_rotation = 0i64;
        let mut best_count = -1i64;
        for rotation in 0..self.base {
            let shift = Number::from(rotation);
            let residues: Vec<Number> =
                seq.iter().map(|t| semantics::modulo(&semantics::add(t, &shift), &base)).collect();
            let count = most_frequent_count(&residues);
            if count > best_count {
                best_count = count;
                best_rotation = rotation;
            }
        }
        let shift = Number::from(best_rotation);
        let reduced = seq.iter().map(|t| semantics::modulo(&semantics::add(t, &shift), &base)).collect();
        (reduced, DigitData { base: self.base, rotation: best_rotation })
    }

    fn extend(&self, _program: &Program, _original: &DigitData, _query: &DigitData) -> Option<Program> {
        None
    }
}

fn most_frequent_count(terms: &[Number]) -> i64 {
    let mut counts: Vec<(Number, i64)> = Vec::new();
    for term in terms {
        if let Some(entry) = counts.iter_mut().find(|(n, _)| n == term) {
            entry.1 += 1;
        } else {
            counts.push((term.clone(), 1));
        }
    }
    counts.into_iter().map(|(_, c)| c).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(values: &[i64]) -> Sequence {
        values.iter().map(|&v| Number::from(v)).collect()
    }

    #[test]
    fn linear1_strips_offset_and_gcd() {
        let s = seq(&[5, 9, 13, 17]);
        let (reduced, data) = Linear1.reduce(&s);
        assert_eq!(reduced, seq(&[0, 1, 2, 3]));
        assert_eq!(data.offset, Number::from(5));
        assert_eq!(data.factor, Number::from(4));
    }

    #[test]
    fn linear1_extend_recovers_original_shape() {
        let s = seq(&[5, 9, 13, 17]);
        let (_, query) = Linear1.reduce(&s);
        let original = Linear { offset: Number::from(100), factor: Number::from(2) };
        let program = Program::new();
        let extended = Linear1.extend(&program, &original, &query).unwrap();
        assert!(extended.ops.len() > program.ops.len());
    }

    #[test]
    fn delta_detects_linear_growth_as_one_difference() {
        let s = seq(&[1, 3, 5, 7, 9]);
        let (_, data) = Delta.reduce(&s);
        assert_eq!(data.diffs, 1);
    }

    #[test]
    fn digit_reducer_never_extends() {
        let s = seq(&[1, 2, 3]);
        let (_, data) = decimal().reduce(&s);
        let program = Program::new();
        assert!(decimal().extend(&program, &data, &data).is_none());
    }
}
