//! Decides whether a newly evaluated program supersedes the catalog's
//! current incumbent for a target sequence.

use seqmine_arch::{Memory, Number, Sequence};
use seqmine_core::ie::IncrementalEvaluator;
use seqmine_core::interp::{Interpreter, Limits};
use seqmine_core::program::{Operand, Operation, OperationType as Op, Program, INPUT_CELL, OUTPUT_CELL};
use seqmine_core::semantics;

/// The verdict of comparing an `optimized` candidate against the
/// `existing` incumbent for the same target. `None` means no
/// improvement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// Structurally simpler by one of the static checks.
    Simpler,
    /// Gains incremental-evaluator support the incumbent lacked.
    FasterIe,
    /// Completes strictly more of the reference window.
    Better,
    /// Completes the same window in meaningfully fewer steps.
    Faster,
}

/// Parameters governing the quality comparison.
#[derive(Clone, Debug)]
pub struct CheckConfig {
    /// Skip the incremental-evaluator-support shortcut (step 4):
    /// perform a full evaluation-based comparison regardless.
    pub full_check: bool,
    /// The target is frequently re-derived; callers set this so the
    /// cheap IE-support shortcut doesn't preempt a full comparison for
    /// sequences worth the extra evaluation cost.
    pub widely_used: bool,
    /// Minimum number of terms to evaluate for the dynamic comparison.
    pub extended_seq_length: usize,
    /// Constants at or below this magnitude are never "bad", however
    /// round a power they are.
    pub bad_constant_threshold: Number,
    /// Resource limits applied to every evaluation performed.
    pub limits: Limits,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            full_check: false,
            widely_used: false,
            extended_seq_length: 200,
            bad_constant_threshold: Number::from(1_000),
            limits: Limits::default(),
        }
    }
}

/// Compares `optimized` against `existing`, both believed to produce
/// `verified` (the target's confirmed terms), returning the verdict
/// under which `optimized` would replace `existing` in the catalog.
pub fn check(
    existing: &Program,
    optimized: &Program,
    target_id: i64,
    verified: &Sequence,
    config: &CheckConfig,
) -> Option<Verdict> {
    // 1. Self-referential SEQ/PRG to the same target disqualifies outright.
    if references_id(optimized, target_id) {
        return None;
    }

    // 2. Equal once NOPs are stripped: no improvement.
    let existing_stripped = strip_nops(existing);
    let optimized_stripped = strip_nops(optimized);
    if existing_stripped == optimized_stripped {
        return None;
    }

    // 3. Static simpler checks, evaluated in order.
    let bad_constant = |p: &Program| has_bad_constant(p, &config.bad_constant_threshold);
    let checks: [&dyn Fn(&Program) -> bool; 4] =
        [&bad_constant, &has_region_length_loop, &has_constant_initialized_loop, &has_indirect_operand];
    for has_property in checks {
        let existing_has = has_property(existing);
        let optimized_has = has_property(optimized);
        let optimized_clear = !optimized_has && !has_any_seq(optimized);
        let existing_clear = !existing_has && !has_any_seq(existing);
        if existing_has && optimized_clear {
            return Some(Verdict::Simpler);
        }
        if optimized_has && existing_clear {
            return None;
        }
    }

    // 4. Incremental-evaluator support shortcut.
    if !config.full_check && !config.widely_used {
        let existing_ie = IncrementalEvaluator::init(existing, config.limits).is_ok();
        let optimized_ie = IncrementalEvaluator::init(optimized, config.limits).is_ok();
        if !existing_ie && optimized_ie && !has_any_seq(optimized) {
            return Some(Verdict::FasterIe);
        }
        if existing_ie && !optimized_ie && !has_any_seq(existing) {
            return None;
        }
    }

    // 5. Dynamic comparison over the reference window.
    let count = config.extended_seq_length.max(verified.len());
    let (existing_completed, existing_steps) = run_against(existing, verified, count, config.limits);
    let (optimized_completed, optimized_steps) = run_against(optimized, verified, count, config.limits);

    let runs_ratio = match (existing_completed, optimized_completed) {
        (0, 0) => 1.0,
        (0, _) => f64::INFINITY,
        (e, o) => o as f64 / e as f64,
    };
    if runs_ratio > 1.05 {
        return Some(Verdict::Better);
    }
    if runs_ratio < 1.0 / 1.05 {
        return None;
    }

    let steps_ratio = match (existing_steps, optimized_steps) {
        (0, 0) => 1.0,
        (_, 0) => f64::INFINITY,
        (e, o) => e as f64 / o as f64,
    };
    if steps_ratio > 1.10 {
        return Some(Verdict::Faster);
    }
    if steps_ratio < 1.0 / 1.10 {
        return None;
    }

    // 6. Neither improvement threshold was crossed.
    None
}

fn strip_nops(program: &Program) -> Vec<Operation> {
    program.ops.iter().filter(|op| op.op_type != Op::Nop).cloned().collect()
}

fn references_id(program: &Program, target_id: i64) -> bool {
    program.ops.iter().any(|op| {
        matches!(op.op_type, Op::Seq | Op::Prg)
            && matches!(&op.source, Operand::Constant(n) if n.to_i64() == Ok(target_id))
    })
}

fn has_any_seq(program: &Program) -> bool {
    program.ops.iter().any(|op| op.op_type == Op::Seq)
}

fn has_indirect_operand(program: &Program) -> bool {
    program.ops.iter().any(|op| matches!(op.target, Operand::Indirect(_)) || matches!(op.source, Operand::Indirect(_)))
}

fn has_region_length_loop(program: &Program) -> bool {
    program.ops.iter().any(|op| op.op_type == Op::Lpb && op.source != Operand::constant(1))
}

/// Matches the shape [`crate`]'s minimizer recognizes in step 3 of
/// §4.6: a leading `mov counter, C` (`C >= 100`) feeding directly into
/// an `LPB` on that same counter.
fn has_constant_initialized_loop(program: &Program) -> bool {
    for window in program.ops.windows(2) {
        let [mov, lpb] = window else { continue };
        if mov.op_type != Op::Mov || lpb.op_type != Op::Lpb {
            continue;
        }
        let Operand::Direct(counter) = &mov.target else { continue };
        let Operand::Constant(c) = &mov.source else { continue };
        if *c < Number::from(100) {
            continue;
        }
        if matches!(&lpb.target, Operand::Direct(n) if n == counter) {
            return true;
        }
    }
    false
}

fn has_bad_constant(program: &Program, threshold: &Number) -> bool {
    let hundred_thousand = Number::from(100_000);
    for op in &program.ops {
        for operand in [&op.target, &op.source] {
            let Operand::Constant(n) = operand else { continue };
            if *n > hundred_thousand {
                return true;
            }
            if n <= threshold {
                continue;
            }
            if (2..=10i64).any(|base| semantics::power_of(n, &Number::from(base)).is_some_and(|exp| exp > 0)) {
                return true;
            }
        }
    }
    false
}

/// Evaluates `program` for up to `count` terms, comparing each against
/// `verified`, stopping at the first evaluation error or mismatch.
/// Returns the number of terms confirmed correct and the total step
/// count spent producing them.
fn run_against(program: &Program, verified: &Sequence, count: usize, limits: Limits) -> (usize, u64) {
    let mut interp = Interpreter::standalone(limits);
    let mut completed = 0usize;
    let mut steps = 0u64;
    for n in 0..count.min(verified.len()) {
        let mut memory = Memory::new();
        if memory.set(INPUT_CELL, Number::from(program.offset() + n as i64)).is_err() {
            break;
        }
        let Ok(used) = interp.run(program, &mut memory) else { break };
        let Ok(value) = memory.get(OUTPUT_CELL) else { break };
        if value != verified[n] {
            break;
        }
        steps += used;
        completed += 1;
    }
    (completed, steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prog(ops: Vec<Operation>) -> Program {
        let mut p = Program::new();
        p.ops = ops;
        p
    }

    fn seq(values: &[i64]) -> Sequence {
        values.iter().map(|&v| Number::from(v)).collect()
    }

    #[test]
    fn identical_programs_are_empty() {
        let p = prog(vec![Operation::new(Op::Mov, Operand::direct(0), Operand::constant(1))]);
        let config = CheckConfig::default();
        assert_eq!(check(&p, &p, 1, &seq(&[1]), &config), None);
    }

    #[test]
    fn dropping_a_bad_constant_is_simpler() {
        let existing = prog(vec![Operation::new(Op::Add, Operand::direct(0), Operand::constant(1_000_000))]);
        let optimized = prog(vec![Operation::new(Op::Add, Operand::direct(0), Operand::constant(1))]);
        let config = CheckConfig::default();
        assert_eq!(check(&existing, &optimized, 1, &seq(&[1]), &config), Some(Verdict::Simpler));
    }

    #[test]
    fn self_referential_seq_is_disqualified() {
        let optimized =
            prog(vec![Operation::new(Op::Seq, Operand::direct(1), Operand::constant(42))]);
        let existing = prog(vec![Operation::new(Op::Mov, Operand::direct(0), Operand::constant(1))]);
        let config = CheckConfig::default();
        assert_eq!(check(&existing, &optimized, 42, &seq(&[1]), &config), None);
    }

    #[test]
    fn fewer_steps_to_the_same_terms_is_faster() {
        let existing = prog(vec![
            Operation::new(Op::Mov, Operand::direct(1), Operand::constant(0)),
            Operation::new(Op::Add, Operand::direct(1), Operand::constant(1)),
            Operation::new(Op::Add, Operand::direct(1), Operand::constant(1)),
            Operation::new(Op::Mov, Operand::direct(0), Operand::direct(1)),
        ]);
        let optimized = prog(vec![Operation::new(Op::Mov, Operand::direct(0), Operand::constant(2))]);
        let config = CheckConfig { full_check: true, ..CheckConfig::default() };
        let verdict = check(&existing, &optimized, 7, &seq(&[2; 50]), &config);
        assert!(matches!(verdict, Some(Verdict::Faster) | Some(Verdict::Simpler)));
    }
}
