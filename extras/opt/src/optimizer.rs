//! Semantics-preserving rewrite passes that shrink a [`Program`].
//!
//! Each pass is a single linear (or near-linear) walk over the operation
//! list that returns whether it changed anything; [`optimize`] runs every
//! pass in a fixed rotation until a full rotation makes no change.

use std::collections::{HashMap, HashSet};

use log::trace;

use seqmine_arch::Number;
use seqmine_core::program::{Operand, Operation, OperationType as Op};
use seqmine_core::Program;

/// Runs every pass to a fixed point, in the declaration order of §4.5.
///
/// Passes are cheap relative to re-evaluating the program, so the driver
/// simply keeps sweeping until an entire rotation leaves the program
/// untouched; [`optimize`] is therefore idempotent by construction.
#[must_use]
pub fn optimize(program: &Program) -> Program {
    let mut p = program.clone();
    loop {
        let mut changed = false;
        changed |= simplify_operations(&mut p);
        changed |= fix_sandwich(&mut p);
        changed |= merge_ops(&mut p);
        changed |= merge_repeated(&mut p);
        changed |= remove_empty_loops(&mut p);
        changed |= reduce_memory_cells(&mut p);
        changed |= partial_eval(&mut p);
        changed |= sort_operations(&mut p);
        changed |= merge_loops(&mut p);
        changed |= collapse_mov_loops(&mut p);
        changed |= collapse_arithmetic_loops(&mut p);
        changed |= pull_up_mov(&mut p);
        changed |= remove_commutative_detour(&mut p);
        // Applied last every rotation: nothing above should leave a `NOP`
        // behind, but several passes neutralize ops in place rather than
        // deleting them outright, so sweep them out before checking for
        // a fixed point.
        changed |= remove_nops(&mut p);
        if !changed {
            trace!("optimizer reached a fixed point at {} ops", p.ops.len());
            return p;
        }
    }
}

fn direct_cell(operand: &Operand) -> Option<i64> {
    match operand {
        Operand::Direct(n) => n.to_i64().ok(),
        _ => None,
    }
}

fn is_indirect(op: &Operation) -> bool {
    matches!(op.target, Operand::Indirect(_)) || matches!(op.source, Operand::Indirect(_))
}

fn constant_of(operand: &Operand) -> Option<Number> {
    match operand {
        Operand::Constant(n) => Some(n.clone()),
        _ => None,
    }
}

/// Highest direct cell index referenced anywhere in `program`, or `-1`.
fn max_cell(program: &Program) -> i64 {
    let mut max = -1i64;
    for op in &program.ops {
        for operand in [&op.target, &op.source] {
            match operand {
                Operand::Direct(n) | Operand::Indirect(n) => {
                    if let Ok(c) = n.to_i64() {
                        max = max.max(c);
                    }
                }
                Operand::Constant(_) => {}
            }
        }
    }
    max
}

/// 1. Single-pass walk tracking which direct cells are known-zero
/// ("unset") at the current point, rewriting a handful of
/// constant-operand and unset-target identities into cheaper ops.
///
/// A loop, region write, or sub-program call invalidates the "unset" set
/// after its position, since a loop may run any number of times and a
/// sub-program call's effects on other cells aren't tracked here.
pub fn simplify_operations(program: &mut Program) -> bool {
    let mut changed = false;
    let mut written: HashSet<i64> = HashSet::new();
    for op in &mut program.ops {
        match op.op_type {
            Op::Lpb | Op::Lpe | Op::Seq | Op::Prg | Op::Clr => {
                written.clear();
                continue;
            }
            Op::Nop | Op::Dbg => continue,
            _ => {}
        }
        if is_indirect(op) {
            written.clear();
            continue;
        }
        let target_cell = direct_cell(&op.target);

        if op.target == op.source {
            match op.op_type {
                Op::Add => {
                    op.op_type = Op::Mul;
                    op.source = Operand::constant(2);
                    changed = true;
                }
                Op::Sub => {
                    op.op_type = Op::Mov;
                    op.source = Operand::constant(0);
                    changed = true;
                }
                Op::Equ | Op::Leq | Op::Geq => {
                    op.op_type = Op::Mov;
                    op.source = Operand::constant(1);
                    changed = true;
                }
                _ => {}
            }
        } else if op.op_type == Op::Add && target_cell.is_some_and(|c| !written.contains(&c)) {
            // The target has never been written in this straight-line
            // section, so it currently holds zero: `0 + X == X`.
            op.op_type = Op::Mov;
            changed = true;
        } else if let Some(k) = constant_of(&op.source) {
            if op.op_type == Op::Trn && k == Number::zero() {
                op.op_type = Op::Max;
                changed = true;
            } else if op.op_type == Op::Sub && k.is_negative() {
                op.op_type = Op::Add;
                op.source = Operand::Constant(k.negate());
                changed = true;
            }
        }

        if op.op_type.metadata().is_writing_target {
            if let Some(c) = target_cell {
                written.insert(c);
            }
        }
    }
    changed
}

/// 2. `add/sub k1 ; mul k2 ; add/sub k3` on the same cell, with no
/// intervening touch of that cell, becomes `add k1' ; mul k2` when `k2`
/// evenly divides `k3` — folding the trailing linear adjustment into the
/// leading one across the scaling.
pub fn fix_sandwich(program: &mut Program) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i + 2 < program.ops.len() {
        let (t, k1) = match linear_const(&program.ops[i]) {
            Some(v) => v,
            None => {
                i += 1;
                continue;
            }
        };
        let mul = &program.ops[i + 1];
        let (t2, k2) = match (direct_cell(&mul.target), constant_of(&mul.source)) {
            (Some(c), Some(k)) if mul.op_type == Op::Mul && c == t && k != Number::zero() => (c, k),
            _ => {
                i += 1;
                continue;
            }
        };
        let (t3, k3) = match linear_const(&program.ops[i + 2]) {
            Some((c, k)) if c == t2 => (c, k),
            _ => {
                i += 1;
                continue;
            }
        };
        let quotient = seqmine_core::semantics::div(&k3, &k2);
        if seqmine_core::semantics::mul(&quotient, &k2) == k3 {
            let k1_new = seqmine_core::semantics::add(&k1, &quotient);
            program.ops[i] = Operation::new(Op::Add, Operand::direct(t3), Operand::Constant(k1_new));
            program.ops.remove(i + 2);
            changed = true;
        }
        i += 1;
    }
    changed
}

/// Interprets `op` as a linear adjustment `target += k` on a direct cell,
/// normalizing `sub target, k` to `add target, -k`.
fn linear_const(op: &Operation) -> Option<(i64, Number)> {
    let t = direct_cell(&op.target)?;
    let k = constant_of(&op.source)?;
    match op.op_type {
        Op::Add => Some((t, k)),
        Op::Sub => Some((t, k.negate())),
        _ => None,
    }
}

/// 3. Fuses adjacent ops on the same cell: constant-constant folding for
/// `add`/`sub`/`mul`, ratio reduction for `mul ; div`, `equ X; equ 0` into
/// `neq X`, self-cancelling `add $a; sub $a`, and dead-store elimination
/// when a later op unconditionally overwrites an earlier one's target via
/// `mov`.
pub fn merge_ops(program: &mut Program) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i + 1 < program.ops.len() {
        let (a, b) = (program.ops[i].clone(), program.ops[i + 1].clone());
        let ta = direct_cell(&a.target);
        let tb = direct_cell(&b.target);
        if ta.is_none() || ta != tb {
            i += 1;
            continue;
        }

        if b.op_type == Op::Mov
            && a.op_type.metadata().is_writing_target
            && !matches!(a.op_type, Op::Seq | Op::Prg)
        {
            // `a` writes the cell unconditionally overwritten by `b`'s
            // `mov`, and pure arithmetic has no side effect beyond that
            // write: `a` is dead.
            program.ops.remove(i);
            changed = true;
            continue;
        }

        if let (Some(ka), Some(kb)) = (constant_of(&a.source), constant_of(&b.source)) {
            let fused = match (a.op_type, b.op_type) {
                (Op::Add, Op::Add) => Some((Op::Add, seqmine_core::semantics::add(&ka, &kb))),
                (Op::Add, Op::Sub) => Some((Op::Add, seqmine_core::semantics::sub(&ka, &kb))),
                (Op::Sub, Op::Add) => Some((Op::Add, seqmine_core::semantics::sub(&kb, &ka))),
                (Op::Sub, Op::Sub) => Some((Op::Sub, seqmine_core::semantics::add(&ka, &kb))),
                (Op::Mul, Op::Mul) => Some((Op::Mul, seqmine_core::semantics::mul(&ka, &kb))),
                _ => None,
            };
            if let Some((op_type, k)) = fused {
                program.ops[i] = Operation::new(op_type, a.target.clone(), Operand::Constant(k));
                program.ops.remove(i + 1);
                changed = true;
                continue;
            }
            if a.op_type == Op::Mul && b.op_type == Op::Div && kb != Number::zero() {
                let g = seqmine_core::semantics::gcd(&ka, &kb);
                if g != Number::zero() {
                    let mul_k = seqmine_core::semantics::div(&ka, &g);
                    let div_k = seqmine_core::semantics::div(&kb, &g);
                    program.ops[i] = Operation::new(Op::Mul, a.target.clone(), Operand::Constant(mul_k));
                    if div_k == Number::one() {
                        program.ops.remove(i + 1);
                    } else {
                        program.ops[i + 1] = Operation::new(Op::Div, a.target.clone(), Operand::Constant(div_k));
                    }
                    changed = true;
                    continue;
                }
            }
            if a.op_type == Op::Equ && b.op_type == Op::Equ && kb == Number::zero() {
                program.ops[i] = Operation::new(Op::Neq, a.target.clone(), a.source.clone());
                program.ops.remove(i + 1);
                changed = true;
                continue;
            }
        }

        if a.op_type == Op::Add && b.op_type == Op::Sub && a.source == b.source && !a.source.is_constant() {
            program.ops[i] = Operation::nullary(Op::Nop);
            program.ops.remove(i + 1);
            changed = true;
            continue;
        }

        i += 1;
    }
    changed
}

/// 4. Collapses a run of ≥3 identical `add`/`mul` ops against a
/// non-constant source into a count-based closed form via a fresh cell.
pub fn merge_repeated(program: &mut Program) -> bool {
    let mut changed = false;
    let mut next_cell = max_cell(program) + 1;
    let mut i = 0;
    while i < program.ops.len() {
        let op = program.ops[i].clone();
        if !matches!(op.op_type, Op::Add | Op::Mul) || op.source.is_constant() || is_indirect(&op) {
            i += 1;
            continue;
        }
        let mut run = 1;
        while i + run < program.ops.len() && program.ops[i + run] == op {
            run += 1;
        }
        if run >= 3 {
            let tmp = Operand::direct(next_cell);
            next_cell += 1;
            let count_op = if op.op_type == Op::Add { Op::Mul } else { Op::Pow };
            let replacement = vec![
                Operation::new(Op::Mov, tmp.clone(), op.source.clone()),
                Operation::new(count_op, tmp.clone(), Operand::constant(run as i64)),
                Operation::new(op.op_type, op.target.clone(), tmp),
            ];
            program.ops.splice(i..i + run, replacement);
            changed = true;
            i += 3;
        } else {
            i += 1;
        }
    }
    changed
}

/// 5a. Deletes every `NOP`.
pub fn remove_nops(program: &mut Program) -> bool {
    let before = program.ops.len();
    program.ops.retain(|op| op.op_type != Op::Nop);
    before != program.ops.len()
}

/// 5b. Deletes a top-level `LPB ; LPE` pair with nothing between them —
/// a loop whose body never mutates the counter runs for exactly one
/// extra no-op iteration before rolling back, so it is equivalent to
/// skipping it entirely.
pub fn remove_empty_loops(program: &mut Program) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i + 1 < program.ops.len() {
        if program.ops[i].op_type == Op::Lpb && program.ops[i + 1].op_type == Op::Lpe {
            program.ops.drain(i..=i + 1);
            changed = true;
        } else {
            i += 1;
        }
    }
    changed
}

/// 6. If some cell below the highest used cell is written but never
/// read, renames the highest used cell down into that gap, shrinking the
/// cell footprint. Skipped whenever the program has an indirect operand,
/// any loop, or a region write (`CLR`), since those make "never read"
/// unsafe to determine by a purely static scan.
pub fn reduce_memory_cells(program: &mut Program) -> bool {
    if program.ops.iter().any(|op| {
        is_indirect(op) || matches!(op.op_type, Op::Lpb | Op::Lpe | Op::Clr | Op::Seq | Op::Prg)
    }) {
        return false;
    }
    let max = max_cell(program);
    if max <= 0 {
        return false;
    }
    let mut read: HashSet<i64> = HashSet::new();
    let mut written: HashSet<i64> = HashSet::new();
    for op in &program.ops {
        if let Some(c) = direct_cell(&op.source) {
            read.insert(c);
        }
        if op.op_type.metadata().is_reading_target {
            if let Some(c) = direct_cell(&op.target) {
                read.insert(c);
            }
        }
        if op.op_type.metadata().is_writing_target {
            if let Some(c) = direct_cell(&op.target) {
                written.insert(c);
            }
        }
    }
    read.insert(seqmine_core::program::INPUT_CELL);
    read.insert(seqmine_core::program::OUTPUT_CELL);

    let gap = (0..max).find(|c| written.contains(c) && !read.contains(c));
    let Some(gap) = gap else { return false };
    if !written.contains(&max) && !read.contains(&max) {
        return false;
    }
    for op in &mut program.ops {
        rename_cell(&mut op.target, max, gap);
        rename_cell(&mut op.source, max, gap);
    }
    true
}

fn rename_cell(operand: &mut Operand, from: i64, to: i64) {
    if let Operand::Direct(n) = operand {
        if n.to_i64() == Ok(from) {
            *n = Number::from(to);
        }
    }
}

/// 7. Forward abstract interpretation: while a direct cell's value is
/// known to be a constant, replace reads of it (and whole ops whose
/// result is therefore determined) with that constant. Any write through
/// an indirect operand, `CLR`, or `SEQ`/`PRG` invalidates everything
/// tracked so far, since those can touch cells outside what this pass
/// observes; entering a loop invalidates every cell the loop body writes,
/// since the number of iterations isn't known statically.
pub fn partial_eval(program: &mut Program) -> bool {
    let mut changed = false;
    let mut consts: HashMap<i64, Number> = HashMap::new();
    let mut i = 0;
    while i < program.ops.len() {
        let op_type = program.ops[i].op_type;
        match op_type {
            Op::Nop | Op::Dbg => {}
            Op::Lpb => {
                let end = matching_lpe(&program.ops, i);
                for written in written_cells(&program.ops[i..=end]) {
                    consts.remove(&written);
                }
            }
            Op::Lpe => {}
            Op::Clr | Op::Prg => consts.clear(),
            Op::Seq => {
                if let Some(c) = direct_cell(&program.ops[i].target) {
                    consts.remove(&c);
                }
            }
            _ if is_indirect(&program.ops[i]) => consts.clear(),
            Op::Mov => {
                let Some(t) = direct_cell(&program.ops[i].target) else {
                    i += 1;
                    continue;
                };
                let resolved = resolve(&program.ops[i].source, &consts);
                match resolved {
                    Some(v) => {
                        if !matches!(&program.ops[i].source, Operand::Constant(c) if *c == v) {
                            program.ops[i].source = Operand::Constant(v.clone());
                            changed = true;
                        }
                        consts.insert(t, v);
                    }
                    None => {
                        consts.remove(&t);
                    }
                }
            }
            _ if op_type.is_arithmetic() => {
                let Some(t) = direct_cell(&program.ops[i].target) else {
                    i += 1;
                    continue;
                };
                let arity = op_type.metadata().arity;
                let a = consts.get(&t).cloned();
                let b = if arity == 2 { resolve(&program.ops[i].source, &consts) } else { Some(Number::zero()) };
                match (a, b) {
                    (Some(a), Some(b)) => {
                        let result = dispatch(op_type, &a, &b);
                        program.ops[i] = Operation::new(Op::Mov, Operand::direct(t), Operand::Constant(result.clone()));
                        consts.insert(t, result);
                        changed = true;
                    }
                    _ => {
                        consts.remove(&t);
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    changed
}

/// Mirrors `seqmine_core::interp`'s private semantics dispatch table; kept
/// in sync with it by hand since that mapping isn't exposed publicly.
fn dispatch(op_type: Op, target: &Number, source: &Number) -> Number {
    use seqmine_core::semantics;
    match op_type {
        Op::Add => semantics::add(target, source),
        Op::Sub => semantics::sub(target, source),
        Op::Trn => semantics::trn(target, source),
        Op::Mul => semantics::mul(target, source),
        Op::Div => semantics::div(target, source),
        Op::Dif => semantics::dif(target, source),
        Op::Dir => semantics::dir(target, source),
        Op::Mod => semantics::modulo(target, source),
        Op::Pow => semantics::pow(target, source),
        Op::Gcd => semantics::gcd(target, source),
        Op::Lex => semantics::lex(target, source),
        Op::Bin => semantics::bin(target, source),
        Op::Fac => semantics::fac(target, source),
        Op::Log => semantics::log(target, source),
        Op::Nrt => semantics::nrt(target, source),
        Op::Dgs => semantics::dgs(target, source),
        Op::Dgr => semantics::dir(target, source),
        Op::Equ => semantics::equ(target, source),
        Op::Neq => semantics::neq(target, source),
        Op::Leq => semantics::leq(target, source),
        Op::Geq => semantics::geq(target, source),
        Op::Min => semantics::min(target, source),
        Op::Max => semantics::max(target, source),
        Op::Ban => semantics::ban(target, source),
        Op::Bor => semantics::bor(target, source),
        Op::Bxo => semantics::bxo(target, source),
        _ => unreachable!("non-arithmetic op type reached semantic dispatch"),
    }
}

fn resolve(operand: &Operand, consts: &HashMap<i64, Number>) -> Option<Number> {
    match operand {
        Operand::Constant(n) => Some(n.clone()),
        Operand::Direct(n) => consts.get(&n.to_i64().ok()?).cloned(),
        Operand::Indirect(_) => None,
    }
}

fn matching_lpe(ops: &[Operation], lpb: usize) -> usize {
    let mut depth = 0i32;
    for (i, op) in ops.iter().enumerate().skip(lpb) {
        match op.op_type {
            Op::Lpb => depth += 1,
            Op::Lpe => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    ops.len() - 1
}

fn written_cells(ops: &[Operation]) -> HashSet<i64> {
    ops.iter()
        .filter(|op| op.op_type.metadata().is_writing_target)
        .filter_map(|op| direct_cell(&op.target))
        .collect()
}

/// Cells `op` reads: the source (if direct) plus the target, if the op
/// reads it before writing.
fn reads(op: &Operation) -> Vec<i64> {
    let mut cells = Vec::new();
    if let Some(c) = direct_cell(&op.source) {
        cells.push(c);
    }
    if op.op_type.metadata().is_reading_target {
        if let Some(c) = direct_cell(&op.target) {
            cells.push(c);
        }
    }
    cells
}

fn writes(op: &Operation) -> Option<i64> {
    op.op_type.metadata().is_writing_target.then(|| direct_cell(&op.target)).flatten()
}

/// Two ops are independent iff both are pure arithmetic (or `SEQ`)
/// without indirect operands, neither writes a cell the other reads, and
/// when they share a target, that target update commutes.
fn independent(a: &Operation, b: &Operation) -> bool {
    let eligible = |op: &Operation| (op.op_type.is_arithmetic() || op.op_type == Op::Seq) && !is_indirect(op);
    if !eligible(a) || !eligible(b) {
        return false;
    }
    if let Some(wa) = writes(a) {
        if reads(b).contains(&wa) {
            return false;
        }
    }
    if let Some(wb) = writes(b) {
        if reads(a).contains(&wb) {
            return false;
        }
    }
    match (writes(a), writes(b)) {
        (Some(ta), Some(tb)) if ta == tb => {
            let additive = matches!(a.op_type, Op::Add | Op::Sub) && matches!(b.op_type, Op::Add | Op::Sub);
            additive || (a.op_type == b.op_type && a.op_type.is_commutative())
        }
        _ => true,
    }
}

/// 8. Within the straight-line run between control-flow boundaries,
/// bubbles an operation one step earlier whenever doing so makes it
/// adjacent to another operation on the same target (a local score that
/// favors exposing [`merge_ops`] opportunities on the next rotation).
pub fn sort_operations(program: &mut Program) -> bool {
    let mut changed = false;
    let len = program.ops.len();
    for i in 0..len.saturating_sub(1) {
        if i + 1 >= program.ops.len() {
            break;
        }
        let (a, b) = (program.ops[i].clone(), program.ops[i + 1].clone());
        if !independent(&a, &b) {
            continue;
        }
        let Some(tb) = writes(&b) else { continue };
        let score_before = i > 0 && writes(&program.ops[i - 1]) == Some(tb);
        let score_after = writes(&a) == Some(tb);
        if !score_before && !score_after {
            let next_matches = i + 2 < program.ops.len() && writes(&program.ops[i + 2]) == writes(&a);
            if next_matches {
                program.ops.swap(i, i + 1);
                changed = true;
            }
        }
    }
    changed
}

/// Returns the `(start, end)` index pairs of every top-level loop.
fn top_level_loops(ops: &[Operation]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut depth = 0i32;
    let mut start = None;
    for (i, op) in ops.iter().enumerate() {
        match op.op_type {
            Op::Lpb => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            Op::Lpe => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push((s, i));
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

/// 9. Merges two sibling top-level loops with identical `LPB` headers and
/// nothing between them into a single loop over their concatenated
/// bodies.
pub fn merge_loops(program: &mut Program) -> bool {
    let spans = top_level_loops(&program.ops);
    for pair in spans.windows(2) {
        let (s1, e1) = pair[0];
        let (s2, e2) = pair[1];
        if e1 + 1 == s2 && program.ops[s1] == program.ops[s2] {
            program.ops.remove(s2); // drop second LPB
            program.ops.remove(e1); // drop first LPE (index unaffected; e1 < s2)
            let _ = e2;
            return true;
        }
    }
    false
}

/// 10. `LPB t,1 ; MOV t,c ; LPE` collapses to a closed form: the loop
/// only ever sets the counter cell to the constant `c`, so its net effect
/// is determined entirely by the sign of `c`.
pub fn collapse_mov_loops(program: &mut Program) -> bool {
    for (s, e) in top_level_loops(&program.ops) {
        let lpb = &program.ops[s];
        if !matches!(&lpb.source, Operand::Constant(n) if *n == Number::one()) {
            continue;
        }
        let Some(counter) = direct_cell(&lpb.target) else { continue };
        if e != s + 2 {
            continue;
        }
        let body = &program.ops[s + 1];
        if body.op_type != Op::Mov || direct_cell(&body.target) != Some(counter) {
            continue;
        }
        let Some(c) = constant_of(&body.source) else { continue };
        let replacement = match c.cmp(&Number::zero()) {
            std::cmp::Ordering::Equal => vec![Operation::new(Op::Mov, Operand::direct(counter), Operand::constant(0))],
            std::cmp::Ordering::Greater => vec![Operation::new(Op::Min, Operand::direct(counter), Operand::Constant(c))],
            std::cmp::Ordering::Less => Vec::new(),
        };
        program.ops.splice(s..=e, replacement);
        return true;
    }
    false
}

/// 11. `LPB counter,1 ; SUB counter,1 ; ADD/MUL target,arg ; LPE` (with
/// `target`, `arg`, `counter` distinct direct cells and `arg` untouched
/// by the body) collapses to a closed form: `n` iterations happen iff the
/// entering counter is positive, so the loop is equivalent to scaling
/// `target` by `arg * max(counter,0)` (or `arg ^ max(counter,0)` for the
/// multiplicative body) and leaving the counter at `min(counter,0)`.
pub fn collapse_arithmetic_loops(program: &mut Program) -> bool {
    let mut next_cell = max_cell(program) + 1;
    for (s, e) in top_level_loops(&program.ops) {
        let lpb = &program.ops[s];
        if !matches!(&lpb.source, Operand::Constant(n) if *n == Number::one()) {
            continue;
        }
        let Some(counter) = direct_cell(&lpb.target) else { continue };
        if e != s + 3 {
            continue;
        }
        let dec = &program.ops[s + 1];
        if dec.op_type != Op::Sub || direct_cell(&dec.target) != Some(counter) || constant_of(&dec.source) != Some(Number::one()) {
            continue;
        }
        let body = program.ops[s + 2].clone();
        let Some(target) = direct_cell(&body.target) else { continue };
        let Some(arg) = direct_cell(&body.source) else { continue };
        if target == counter || arg == counter || target == arg {
            continue;
        }
        let scale_op = match body.op_type {
            Op::Add => Op::Mul,
            Op::Mul => Op::Pow,
            _ => continue,
        };

        let tmp1 = Operand::direct(next_cell);
        let tmp2 = Operand::direct(next_cell + 1);
        next_cell += 2;
        let replacement = vec![
            Operation::new(Op::Mov, tmp1.clone(), Operand::direct(counter)),
            Operation::new(Op::Max, tmp1.clone(), Operand::constant(0)),
            Operation::new(Op::Sub, Operand::direct(counter), tmp1.clone()),
            Operation::new(Op::Mov, tmp2.clone(), Operand::direct(arg)),
            Operation::new(scale_op, tmp2.clone(), tmp1),
            Operation::new(body.op_type, Operand::direct(target), tmp2),
        ];
        program.ops.splice(s..=e, replacement);
        return true;
    }
    false
}

/// 12. Moves a `MOV` past one preceding independent op so that it lands
/// adjacent to an earlier op sharing its target, exposing a
/// dead-store-elimination opportunity for [`merge_ops`] on the next
/// rotation.
pub fn pull_up_mov(program: &mut Program) -> bool {
    let mut i = 0;
    while i + 2 < program.ops.len() {
        let a = program.ops[i].clone();
        let b = program.ops[i + 1].clone();
        let c = program.ops[i + 2].clone();
        if c.op_type == Op::Mov && independent(&b, &c) && writes(&a).is_some() && writes(&a) == writes(&c) && writes(&b) != writes(&c) {
            program.ops.swap(i + 1, i + 2);
            return true;
        }
        i += 1;
    }
    false
}

/// 13. `MOV d,t ; OP d,s ; MOV t,d` where `OP` is commutative and `d` is
/// read nowhere afterward collapses to `OP t,s`: `d` was only ever a
/// detour copy of `t` taken so `OP` could be applied, then copied back.
pub fn remove_commutative_detour(program: &mut Program) -> bool {
    let mut i = 0;
    while i + 2 < program.ops.len() {
        let first = program.ops[i].clone();
        let op = program.ops[i + 1].clone();
        let last = program.ops[i + 2].clone();
        let (Some(d), Some(t)) = (direct_cell(&first.target), direct_cell(&first.source)) else {
            i += 1;
            continue;
        };
        if first.op_type != Op::Mov
            || direct_cell(&op.target) != Some(d)
            || !op.op_type.is_commutative()
            || last.op_type != Op::Mov
            || direct_cell(&last.target) != Some(t)
            || direct_cell(&last.source) != Some(d)
        {
            i += 1;
            continue;
        }
        let reused_later = program.ops[i + 3..].iter().any(|op| reads(op).contains(&d) || direct_cell(&op.target) == Some(d));
        if reused_later {
            i += 1;
            continue;
        }
        program.ops[i] = Operation::new(op.op_type, Operand::direct(t), op.source.clone());
        program.ops.drain(i + 1..=i + 2);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prog(ops: Vec<Operation>) -> Program {
        let mut p = Program::new();
        p.ops = ops;
        p
    }

    #[test]
    fn simplify_unset_add_becomes_mov() {
        let mut p = prog(vec![Operation::new(Op::Add, Operand::direct(1), Operand::direct(0))]);
        assert!(simplify_operations(&mut p));
        assert_eq!(p.ops[0].op_type, Op::Mov);
    }

    #[test]
    fn simplify_self_sub_becomes_mov_zero() {
        let mut p = prog(vec![Operation::new(Op::Sub, Operand::direct(1), Operand::direct(1))]);
        assert!(simplify_operations(&mut p));
        assert_eq!(p.ops[0], Operation::new(Op::Mov, Operand::direct(1), Operand::constant(0)));
    }

    #[test]
    fn merge_ops_folds_constants() {
        let mut p = prog(vec![
            Operation::new(Op::Add, Operand::direct(0), Operand::constant(2)),
            Operation::new(Op::Add, Operand::direct(0), Operand::constant(3)),
        ]);
        assert!(merge_ops(&mut p));
        assert_eq!(p.ops.len(), 1);
        assert_eq!(p.ops[0], Operation::new(Op::Add, Operand::direct(0), Operand::constant(5)));
    }

    #[test]
    fn merge_ops_eliminates_dead_store_before_mov() {
        let mut p = prog(vec![
            Operation::new(Op::Add, Operand::direct(0), Operand::constant(2)),
            Operation::new(Op::Mov, Operand::direct(0), Operand::constant(9)),
        ]);
        assert!(merge_ops(&mut p));
        assert_eq!(p.ops, vec![Operation::new(Op::Mov, Operand::direct(0), Operand::constant(9))]);
    }

    #[test]
    fn remove_empty_loops_deletes_noop_loop() {
        let mut p = prog(vec![
            Operation::new(Op::Lpb, Operand::direct(0), Operand::constant(1)),
            Operation::nullary(Op::Lpe),
        ]);
        assert!(remove_empty_loops(&mut p));
        assert!(p.ops.is_empty());
    }

    #[test]
    fn collapse_mov_loop_zero_case() {
        let mut p = prog(vec![
            Operation::new(Op::Lpb, Operand::direct(0), Operand::constant(1)),
            Operation::new(Op::Mov, Operand::direct(0), Operand::constant(0)),
            Operation::nullary(Op::Lpe),
        ]);
        assert!(collapse_mov_loops(&mut p));
        assert_eq!(p.ops, vec![Operation::new(Op::Mov, Operand::direct(0), Operand::constant(0))]);
    }

    #[test]
    fn merge_repeated_collapses_run_of_adds() {
        let mut p = prog(vec![
            Operation::new(Op::Add, Operand::direct(1), Operand::direct(2)),
            Operation::new(Op::Add, Operand::direct(1), Operand::direct(2)),
            Operation::new(Op::Add, Operand::direct(1), Operand::direct(2)),
        ]);
        assert!(merge_repeated(&mut p));
        assert_eq!(p.ops.len(), 3);
        assert_eq!(p.ops[1].op_type, Op::Mul);
    }

    #[test]
    fn optimize_is_idempotent_on_fibonacci() {
        let p = prog(vec![
            Operation::new(Op::Mov, Operand::direct(1), Operand::constant(1)),
            Operation::new(Op::Lpb, Operand::direct(0), Operand::constant(1)),
            Operation::new(Op::Sub, Operand::direct(0), Operand::constant(1)),
            Operation::new(Op::Mov, Operand::direct(2), Operand::direct(1)),
            Operation::new(Op::Add, Operand::direct(1), Operand::direct(0)),
            Operation::new(Op::Mov, Operand::direct(0), Operand::direct(2)),
            Operation::nullary(Op::Lpe),
            Operation::new(Op::Mov, Operand::direct(0), Operand::direct(1)),
        ]);
        let once = optimize(&p);
        let twice = optimize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn optimize_never_leaves_a_nop() {
        let p = prog(vec![
            Operation::nullary(Op::Nop),
            Operation::new(Op::Mov, Operand::direct(0), Operand::constant(42)),
        ]);
        let opt = optimize(&p);
        assert!(opt.ops.iter().all(|op| op.op_type != Op::Nop));
    }
}
