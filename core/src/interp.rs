//! Executes [`Program`]s over [`Memory`] with resource bounds, a loop
//! stack, and `SEQ`/`PRG` sub-program calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use thiserror::Error;

use seqmine_arch::{Memory, MemoryError, Number};

use crate::program::{self, Operand, OperationType, Program};
use crate::semantics;

/// Cells held open on the loop stack before `StackOverflow` is raised.
const MAX_LOOP_DEPTH: usize = 100;

/// Re-query the memory-availability hook every this many cache inserts.
const MEMORY_PROBE_INTERVAL: u64 = 10_000;

/// Below this many cached terms, keep inserting even if the memory probe
/// reports the budget is exhausted (mirrors the reference interpreter's
/// small-cache grace allowance).
const MEMORY_PROBE_GRACE: usize = 10_000;

/// An error raised while interpreting a program.
#[derive(Debug, Error)]
pub enum Error {
    /// A write would have stored `INF` in a cell.
    #[error("overflow writing to a cell")]
    Overflow,
    /// The cycle counter exceeded the configured bound.
    #[error("exceeded maximum cycle count ({0})")]
    MaxCyclesExceeded(u64),
    /// A memory index or the memory's approximate size exceeded the
    /// configured bound.
    #[error("exceeded maximum memory bound")]
    MaxMemoryExceeded,
    /// `SEQ` was invoked with a negative argument.
    #[error("seq invoked with negative argument")]
    NegativeSeqArgument,
    /// `SEQ`/`PRG` attempted to (transitively) call an already-running id.
    #[error("recursive invocation of program {0}")]
    Recursion(i64),
    /// The loop stack exceeded [`MAX_LOOP_DEPTH`].
    #[error("loop stack overflow")]
    StackOverflow,
    /// The external halt signal was observed.
    #[error("interpreter interrupted")]
    Interrupted,
    /// An operand was used in a way its type forbids (e.g. a `Constant`
    /// as an assignment target, or an index too large to represent).
    #[error("invalid operand: {0}")]
    InvalidOperand(String),
    /// `SEQ`/`PRG` referenced a program id the injected cache could not
    /// resolve.
    #[error("unknown program id {0}")]
    UnknownProgram(i64),
    /// Error from the underlying [`Memory`].
    #[error(transparent)]
    Memory(#[from] MemoryError),
    /// Error validating loop balance before execution.
    #[error(transparent)]
    Program(#[from] program::Error),
}

/// Resource limits enforced during execution.
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    /// Maximum number of non-`NOP` operations before `MaxCyclesExceeded`.
    pub max_cycles: u64,
    /// Maximum cell index / approximate memory size before
    /// `MaxMemoryExceeded`. `None` means unbounded.
    pub max_memory: Option<i64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_cycles: 10_000_000, max_memory: Some(100_000) }
    }
}

/// Looks up a [`Program`] by its catalog id, for `SEQ`/`PRG` calls.
///
/// Injected by the caller; the core never persists or discovers programs
/// on its own (see §6, "Persisted state").
pub trait ProgramCache {
    /// Returns the program registered under `id`, if any.
    fn get(&mut self, id: i64) -> Option<Program>;
}

/// A [`ProgramCache`] with nothing registered; `SEQ`/`PRG` always fail
/// with [`Error::UnknownProgram`].
#[derive(Debug, Default)]
pub struct EmptyProgramCache;

impl ProgramCache for EmptyProgramCache {
    fn get(&mut self, _id: i64) -> Option<Program> {
        None
    }
}

/// Executes programs over memory, enforcing cycle/memory bounds and
/// caching `SEQ` call results across invocations.
pub struct Interpreter {
    limits: Limits,
    halt: Arc<AtomicBool>,
    cache: Box<dyn ProgramCache>,
    term_cache: HashMap<(i64, Number), (Number, u64)>,
    has_memory: bool,
    num_memory_checks: u64,
    memory_probe: Option<Box<dyn FnMut() -> bool>>,
    running: Vec<i64>,
}

impl Interpreter {
    /// Constructs an interpreter with the given resource limits and
    /// program cache.
    pub fn new(limits: Limits, cache: impl ProgramCache + 'static) -> Self {
        Self {
            limits,
            halt: Arc::new(AtomicBool::new(false)),
            cache: Box::new(cache),
            term_cache: HashMap::new(),
            has_memory: true,
            num_memory_checks: 0,
            memory_probe: None,
            running: Vec::new(),
        }
    }

    /// An interpreter with no registered sub-programs, for standalone
    /// (non-`SEQ`/`PRG`) programs.
    #[must_use]
    pub fn standalone(limits: Limits) -> Self {
        Self::new(limits, EmptyProgramCache)
    }

    /// Installs a hook consulted every [`MEMORY_PROBE_INTERVAL`] term-cache
    /// inserts to decide whether the cache may keep growing. Defaults to
    /// "always available".
    pub fn set_memory_probe(&mut self, probe: impl FnMut() -> bool + 'static) {
        self.memory_probe = Some(Box::new(probe));
    }

    /// A shared handle to the halt flag; setting it aborts the
    /// in-progress (or next) [`Interpreter::run`] with [`Error::Interrupted`].
    #[must_use]
    pub fn halt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.halt)
    }

    /// Clears the `SEQ` term-memoization cache.
    pub fn clear_cache(&mut self) {
        self.term_cache.clear();
    }

    /// Executes `program` against `memory`, returning the number of
    /// non-`NOP` steps taken.
    ///
    /// # Errors
    ///
    /// See the [`Error`] variants.
    pub fn run(&mut self, program: &Program, memory: &mut Memory) -> Result<u64, Error> {
        self.run_tagged(None, program, memory)
    }

    /// Like [`Interpreter::run`], tagging the execution with `id` so a
    /// transitive `SEQ`/`PRG` back to the same id is rejected as
    /// [`Error::Recursion`] rather than looping forever.
    ///
    /// # Errors
    ///
    /// See the [`Error`] variants.
    pub fn run_tagged(
        &mut self,
        id: Option<i64>,
        program: &Program,
        memory: &mut Memory,
    ) -> Result<u64, Error> {
        program.validate()?;
        if let Some(id) = id {
            if self.running.contains(&id) {
                return Err(Error::Recursion(id));
            }
            self.running.push(id);
        }
        let result = self.exec(program, memory);
        if let Some(id) = id {
            self.running.pop();
        }
        result
    }

    fn exec(&mut self, program: &Program, memory: &mut Memory) -> Result<u64, Error> {
        let ops = &program.ops;
        if ops.is_empty() {
            return Ok(0);
        }
        let needs_frags = ops.iter().any(|op| {
            op.op_type == OperationType::Lpb && !matches!(&op.source, Operand::Constant(n) if *n == Number::one())
        });

        let mut cycles = 0u64;
        let mut pc = 0usize;
        let mut stack: Vec<Frame> = Vec::new();

        while pc < ops.len() {
            if self.halt.load(Ordering::Relaxed) {
                return Err(Error::Interrupted);
            }
            let op = &ops[pc];
            let mut pc_next = pc + 1;

            match op.op_type {
                OperationType::Nop | OperationType::Dbg => {}
                OperationType::Lpb => {
                    if stack.len() >= MAX_LOOP_DEPTH {
                        return Err(Error::StackOverflow);
                    }
                    let saved_mem = memory.clone();
                    let kind = if needs_frags {
                        let length = value(&op.source, memory)?.to_i64().map_err(|_| {
                            Error::InvalidOperand("lpb length must be finite".into())
                        })?;
                        let start = address(&op.target, memory)?;
                        if let Some(bound) = self.limits.max_memory {
                            if length > bound {
                                return Err(Error::MaxMemoryExceeded);
                            }
                        }
                        let frag = memory.fragment(start, length)?;
                        FrameKind::Region { frag, frag_len: length }
                    } else {
                        let counter = value(&op.target, memory)?;
                        FrameKind::Simple { counter }
                    };
                    stack.push(Frame { lpb_pc: pc, saved_mem, kind });
                }
                OperationType::Lpe => {
                    let frame = stack.last_mut().expect("LPE without matching LPB (validated)");
                    let lpb = &ops[frame.lpb_pc];
                    let continue_loop = match &mut frame.kind {
                        FrameKind::Simple { counter } => {
                            let current = value(&lpb.target, memory)?;
                            if current > Number::minus_one() && current < *counter {
                                *counter = current;
                                true
                            } else {
                                false
                            }
                        }
                        FrameKind::Region { frag, frag_len } => {
                            let start = address(&lpb.target, memory)?;
                            let length2 = value(&lpb.source, memory)?.to_i64().map_err(|_| {
                                Error::InvalidOperand("lpb length must be finite".into())
                            })?;
                            let length = (*frag_len).min(length2);
                            let current = memory.fragment(start, length)?;
                            if current.is_less(frag, length, true) {
                                *frag = current;
                                *frag_len = length;
                                true
                            } else {
                                false
                            }
                        }
                    };
                    if continue_loop {
                        frame.saved_mem = memory.clone();
                        pc_next = frame.lpb_pc + 1;
                    } else {
                        *memory = frame.saved_mem.clone();
                        stack.pop();
                    }
                }
                OperationType::Clr => {
                    let length = value(&op.source, memory)?.to_i64().map_err(|_| {
                        Error::InvalidOperand("clr length must be finite".into())
                    })?;
                    let start = address(&op.target, memory)?;
                    memory.clear_region(start, length)?;
                }
                OperationType::Seq => {
                    let arg = value(&op.target, memory)?;
                    let id_num = value(&op.source, memory)?;
                    let id = id_num
                        .to_i64()
                        .map_err(|_| Error::InvalidOperand("seq id must be finite".into()))?;
                    let (result, steps) = self.call_seq(id, arg)?;
                    self.write(&op.target, result, memory)?;
                    cycles += steps;
                }
                OperationType::Prg => {
                    let start = address(&op.target, memory)?;
                    let id_num = value(&op.source, memory)?;
                    let id = id_num
                        .to_i64()
                        .map_err(|_| Error::InvalidOperand("prg id must be finite".into()))?;
                    cycles += self.call_prg(id, start, memory)?;
                }
                _ => {
                    let target_val = value(&op.target, memory)?;
                    let source_val = if op.op_type.metadata().arity == 2 {
                        value(&op.source, memory)?
                    } else {
                        Number::zero()
                    };
                    let result = dispatch(op.op_type, &target_val, &source_val);
                    self.write(&op.target, result, memory)?;
                }
            }

            pc = pc_next;

            if op.op_type == OperationType::Nop {
                continue;
            }
            cycles += 1;
            if cycles > self.limits.max_cycles {
                return Err(Error::MaxCyclesExceeded(self.limits.max_cycles));
            }
            if let Some(bound) = self.limits.max_memory {
                if memory.approximate_size() as i64 > bound {
                    return Err(Error::MaxMemoryExceeded);
                }
            }
        }

        debug_assert!(stack.is_empty(), "loop stack must drain by program end (validated)");
        trace!("finished execution after {cycles} cycles");
        Ok(cycles)
    }

    fn write(&self, op: &Operand, value: Number, memory: &mut Memory) -> Result<(), Error> {
        let index = address(op, memory)?;
        if let Some(bound) = self.limits.max_memory {
            if index > bound {
                return Err(Error::MaxMemoryExceeded);
            }
        }
        if value.is_inf() {
            return Err(Error::Overflow);
        }
        memory.set(index, value)?;
        Ok(())
    }

    fn call_seq(&mut self, id: i64, arg: Number) -> Result<(Number, u64), Error> {
        if arg.is_negative() {
            return Err(Error::NegativeSeqArgument);
        }
        let key = (id, arg.clone());
        if let Some(cached) = self.term_cache.get(&key) {
            return Ok(cached.clone());
        }
        let callee = self.cache.get(id).ok_or(Error::UnknownProgram(id))?;
        if self.running.contains(&id) {
            return Err(Error::Recursion(id));
        }
        self.running.push(id);
        let mut tmp = Memory::new();
        tmp.set(program::INPUT_CELL, arg.clone())?;
        let result = self.exec(&callee, &mut tmp);
        self.running.pop();
        let steps = result?;
        let output = tmp.get(program::OUTPUT_CELL)?;
        let entry = (output, steps);

        self.num_memory_checks += 1;
        if self.num_memory_checks % MEMORY_PROBE_INTERVAL == 0 {
            self.has_memory = self.memory_probe.as_mut().map_or(true, |probe| probe());
        }
        if self.has_memory || self.term_cache.len() < MEMORY_PROBE_GRACE {
            self.term_cache.insert(key, entry.clone());
        }
        Ok(entry)
    }

    fn call_prg(&mut self, id: i64, start: i64, memory: &mut Memory) -> Result<u64, Error> {
        let id = -id;
        let callee = self.cache.get(id).ok_or(Error::UnknownProgram(id))?;
        if self.running.contains(&id) {
            return Err(Error::Recursion(id));
        }
        let inputs = callee.inputs();
        let outputs = callee.outputs();

        let mut tmp = Memory::new();
        for i in 0..inputs {
            tmp.set(i, memory.get(start + i)?)?;
        }
        self.running.push(id);
        let result = self.exec(&callee, &mut tmp);
        self.running.pop();
        let steps = result?;
        for i in 0..outputs {
            memory.set(start + i, tmp.get(i)?)?;
        }
        debug!("prg {id} consumed {steps} steps");
        Ok(steps)
    }
}

struct Frame {
    lpb_pc: usize,
    saved_mem: Memory,
    kind: FrameKind,
}

enum FrameKind {
    Simple { counter: Number },
    Region { frag: Memory, frag_len: i64 },
}

/// Resolves `op` to the address it writes/denotes: a `Direct` cell's
/// literal index, or one level of indirection resolved through an
/// `Indirect` cell. `Constant` has no address.
fn address(op: &Operand, memory: &Memory) -> Result<i64, Error> {
    match op {
        Operand::Constant(_) => Err(Error::InvalidOperand("constant has no address".into())),
        Operand::Direct(k) => to_index(k),
        Operand::Indirect(k) => {
            let idx = to_index(k)?;
            to_index(&memory.get(idx)?)
        }
    }
}

/// Resolves `op` to the value it currently reads: the literal for a
/// `Constant`, `mem[k]` for `Direct(k)`, or `mem[mem[k]]` for
/// `Indirect(k)`.
fn value(op: &Operand, memory: &Memory) -> Result<Number, Error> {
    match op {
        Operand::Constant(n) => Ok(n.clone()),
        Operand::Direct(k) => Ok(memory.get(to_index(k)?)?),
        Operand::Indirect(k) => {
            let idx = to_index(k)?;
            let inner = memory.get(idx)?;
            Ok(memory.get(to_index(&inner)?)?)
        }
    }
}

fn to_index(n: &Number) -> Result<i64, Error> {
    n.to_i64().map_err(|_| Error::InvalidOperand(format!("operand {n} is not a valid index")))
}

fn dispatch(op_type: OperationType, target: &Number, source: &Number) -> Number {
    match op_type {
        OperationType::Mov => source.clone(),
        OperationType::Add => semantics::add(target, source),
        OperationType::Sub => semantics::sub(target, source),
        OperationType::Trn => semantics::trn(target, source),
        OperationType::Mul => semantics::mul(target, source),
        OperationType::Div => semantics::div(target, source),
        OperationType::Dif => semantics::dif(target, source),
        OperationType::Dir => semantics::dir(target, source),
        OperationType::Mod => semantics::modulo(target, source),
        OperationType::Pow => semantics::pow(target, source),
        OperationType::Gcd => semantics::gcd(target, source),
        OperationType::Lex => semantics::lex(target, source),
        OperationType::Bin => semantics::bin(target, source),
        OperationType::Fac => semantics::fac(target, source),
        OperationType::Log => semantics::log(target, source),
        OperationType::Nrt => semantics::nrt(target, source),
        OperationType::Dgs => semantics::dgs(target, source),
        OperationType::Dgr => semantics::dir(target, source),
        OperationType::Equ => semantics::equ(target, source),
        OperationType::Neq => semantics::neq(target, source),
        OperationType::Leq => semantics::leq(target, source),
        OperationType::Geq => semantics::geq(target, source),
        OperationType::Min => semantics::min(target, source),
        OperationType::Max => semantics::max(target, source),
        OperationType::Ban => semantics::ban(target, source),
        OperationType::Bor => semantics::bor(target, source),
        OperationType::Bxo => semantics::bxo(target, source),
        _ => unreachable!("non-arithmetic op type reached semantic dispatch"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Operation, OperationType as Op};

    fn run_prog(ops: Vec<Operation>, input: i64) -> (Number, u64) {
        let mut program = Program::new();
        for op in ops {
            program.push(op);
        }
        let mut mem = Memory::new();
        mem.set(program::INPUT_CELL, Number::from(input)).unwrap();
        let mut interp = Interpreter::standalone(Limits::default());
        let steps = interp.run(&program, &mut mem).unwrap();
        (mem.get(program::OUTPUT_CELL).unwrap(), steps)
    }

    #[test]
    fn fibonacci_sequence() {
        // mov $1,1; lpb $0; sub $0,1; mov $2,$1; add $1,$0; mov $0,$2; lpe; mov $0,$1
        let ops = vec![
            Operation::new(Op::Mov, Operand::direct(1), Operand::constant(1)),
            Operation::new(Op::Lpb, Operand::direct(0), Operand::constant(1)),
            Operation::new(Op::Sub, Operand::direct(0), Operand::constant(1)),
            Operation::new(Op::Mov, Operand::direct(2), Operand::direct(1)),
            Operation::new(Op::Add, Operand::direct(1), Operand::direct(0)),
            Operation::new(Op::Mov, Operand::direct(0), Operand::direct(2)),
            Operation::nullary(Op::Lpe),
            Operation::new(Op::Mov, Operand::direct(0), Operand::direct(1)),
        ];
        let expected = [1, 1, 2, 3, 5, 8, 13, 21, 34, 55];
        for (n, &want) in expected.iter().enumerate() {
            let (out, _) = run_prog(ops.clone(), n as i64);
            assert_eq!(out, Number::from(want));
        }
    }

    #[test]
    fn constant_program() {
        let ops = vec![Operation::new(Op::Mov, Operand::direct(0), Operand::constant(42))];
        for n in 0..5 {
            let (out, _) = run_prog(ops.clone(), n);
            assert_eq!(out, Number::from(42_i64));
        }
    }

    #[test]
    fn overflow_raises_error() {
        let ops = vec![Operation::new(Op::Pow, Operand::constant(2), Operand::direct(0))];
        let mut program = Program::new();
        for op in ops {
            program.push(op);
        }
        let mut mem = Memory::new();
        mem.set(program::INPUT_CELL, Number::from(10_000_i64)).unwrap();
        let mut interp = Interpreter::standalone(Limits::default());
        let err = interp.run(&program, &mut mem).unwrap_err();
        assert!(matches!(err, Error::InvalidOperand(_)), "pow writes to a constant target: {err:?}");
    }

    #[test]
    fn pow_overflow_into_cell_raises_overflow() {
        let ops = vec![Operation::new(Op::Pow, Operand::direct(1), Operand::constant(2))];
        let mut program = Program::new();
        for op in ops {
            program.push(op);
        }
        let mut mem = Memory::new();
        mem.set(1, Number::from(10_000_i64)).unwrap();
        let mut interp = Interpreter::standalone(Limits::default());
        let err = interp.run(&program, &mut mem).unwrap_err();
        assert!(matches!(err, Error::Overflow));
    }

    #[test]
    fn step_count_excludes_nops() {
        let ops = vec![
            Operation::nullary(Op::Nop),
            Operation::new(Op::Add, Operand::direct(0), Operand::constant(1)),
        ];
        let (_, steps) = run_prog(ops, 0);
        assert_eq!(steps, 1);
    }
}
