//! Operations, operands, and programs.

use std::cmp::Ordering;
use std::fmt::{self, Display};

use indexmap::IndexMap;
use thiserror::Error;

use seqmine_arch::Number;

/// The cell holding a program's input on entry and its output on exit.
pub const INPUT_CELL: i64 = 0;
/// Same cell as [`INPUT_CELL`], named separately for readability at call
/// sites that care about the output side of evaluation.
pub const OUTPUT_CELL: i64 = 0;

/// An operand: a constant, or a memory cell reached directly or through one
/// level of indirection.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// A literal value.
    Constant(Number),
    /// Memory cell `k`.
    Direct(Number),
    /// The cell whose index is stored in cell `k`.
    Indirect(Number),
}

impl Operand {
    /// Convenience constructor for a small non-negative direct cell.
    #[must_use]
    pub fn direct(cell: i64) -> Self {
        Self::Direct(Number::from(cell))
    }

    /// Convenience constructor for a constant.
    #[must_use]
    pub fn constant(value: i64) -> Self {
        Self::Constant(Number::from(value))
    }

    /// Whether this operand is [`Operand::Constant`].
    #[must_use]
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }
}

impl Ord for Operand {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(op: &Operand) -> u8 {
            match op {
                Operand::Constant(_) => 0,
                Operand::Direct(_) => 1,
                Operand::Indirect(_) => 2,
            }
        }
        rank(self).cmp(&rank(other)).then_with(|| match (self, other) {
            (Operand::Constant(a), Operand::Constant(b))
            | (Operand::Direct(a), Operand::Direct(b))
            | (Operand::Indirect(a), Operand::Indirect(b)) => a.cmp(b),
            _ => unreachable!("rank comparison already distinguished variants"),
        })
    }
}

impl PartialOrd for Operand {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(n) => write!(f, "{n}"),
            Self::Direct(n) => write!(f, "${n}"),
            Self::Indirect(n) => write!(f, "$${n}"),
        }
    }
}

/// The fixed enumeration of operation types.
///
/// Ordering here is purely declarative; dispatch always goes through
/// [`OperationType::metadata`] or [`crate::semantics`], never the
/// discriminant value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperationType {
    Nop,
    Mov,
    Add,
    Sub,
    Trn,
    Mul,
    Div,
    Dif,
    Dir,
    Mod,
    Pow,
    Gcd,
    Lex,
    Bin,
    Fac,
    Log,
    Nrt,
    Dgs,
    Dgr,
    Equ,
    Neq,
    Leq,
    Geq,
    Min,
    Max,
    Ban,
    Bor,
    Bxo,
    Lpb,
    Lpe,
    Clr,
    Seq,
    Prg,
    Dbg,
}

/// Immutable per-type metadata, analogous to a dispatch table entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Metadata {
    /// Lowercase mnemonic used in program text.
    pub name: &'static str,
    /// Number of operands the type consumes (0, 1, or 2).
    pub arity: u8,
    /// Whether the current value of `target` is read before the op runs.
    pub is_reading_target: bool,
    /// Whether the op writes a new value to `target`.
    pub is_writing_target: bool,
    /// Whether the type may appear in catalog-facing programs (all
    /// types here are public; reserved for future internal-only types).
    pub is_public: bool,
}

impl OperationType {
    /// Parses a mnemonic (case-sensitive, lowercase) into its type.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.metadata().name == name)
    }

    /// All operation types, in declaration order.
    pub const ALL: [Self; 34] = [
        Self::Nop,
        Self::Mov,
        Self::Add,
        Self::Sub,
        Self::Trn,
        Self::Mul,
        Self::Div,
        Self::Dif,
        Self::Dir,
        Self::Mod,
        Self::Pow,
        Self::Gcd,
        Self::Lex,
        Self::Bin,
        Self::Fac,
        Self::Log,
        Self::Nrt,
        Self::Dgs,
        Self::Dgr,
        Self::Equ,
        Self::Neq,
        Self::Leq,
        Self::Geq,
        Self::Min,
        Self::Max,
        Self::Ban,
        Self::Bor,
        Self::Bxo,
        Self::Lpb,
        Self::Lpe,
        Self::Clr,
        Self::Seq,
        Self::Prg,
        Self::Dbg,
    ];

    /// Looks up the immutable metadata for this type.
    #[must_use]
    pub fn metadata(self) -> Metadata {
        macro_rules! meta {
            ($name:literal, $arity:literal, $rt:literal, $wt:literal) => {
                Metadata {
                    name: $name,
                    arity: $arity,
                    is_reading_target: $rt,
                    is_writing_target: $wt,
                    is_public: true,
                }
            };
        }
        match self {
            Self::Nop => Metadata { is_public: false, ..meta!("nop", 0, false, false) },
            Self::Mov => meta!("mov", 2, false, true),
            Self::Add => meta!("add", 2, true, true),
            Self::Sub => meta!("sub", 2, true, true),
            Self::Trn => meta!("trn", 2, true, true),
            Self::Mul => meta!("mul", 2, true, true),
            Self::Div => meta!("div", 2, true, true),
            Self::Dif => meta!("dif", 2, true, true),
            Self::Dir => meta!("dir", 2, true, true),
            Self::Mod => meta!("mod", 2, true, true),
            Self::Pow => meta!("pow", 2, true, true),
            Self::Gcd => meta!("gcd", 2, true, true),
            Self::Lex => meta!("lex", 2, true, true),
            Self::Bin => meta!("bin", 2, true, true),
            Self::Fac => meta!("fac", 2, true, true),
            Self::Log => meta!("log", 2, true, true),
            Self::Nrt => meta!("nrt", 2, true, true),
            Self::Dgs => meta!("dgs", 2, true, true),
            Self::Dgr => meta!("dgr", 2, true, true),
            Self::Equ => meta!("equ", 2, true, true),
            Self::Neq => meta!("neq", 2, true, true),
            Self::Leq => meta!("leq", 2, true, true),
            Self::Geq => meta!("geq", 2, true, true),
            Self::Min => meta!("min", 2, true, true),
            Self::Max => meta!("max", 2, true, true),
            Self::Ban => meta!("ban", 2, true, true),
            Self::Bor => meta!("bor", 2, true, true),
            Self::Bxo => meta!("bxo", 2, true, true),
            Self::Lpb => Metadata { is_public: false, ..meta!("lpb", 2, true, false) },
            Self::Lpe => Metadata { is_public: false, ..meta!("lpe", 0, false, false) },
            Self::Clr => meta!("clr", 2, true, false),
            Self::Seq => meta!("seq", 2, true, true),
            Self::Prg => meta!("prg", 2, true, true),
            Self::Dbg => Metadata { is_public: false, ..meta!("dbg", 0, false, false) },
        }
    }

    /// Whether this type is one of the two-operand arithmetic ops
    /// dispatched through [`crate::semantics`].
    #[must_use]
    pub fn is_arithmetic(self) -> bool {
        !matches!(
            self,
            Self::Nop | Self::Mov | Self::Lpb | Self::Lpe | Self::Clr | Self::Seq | Self::Prg | Self::Dbg
        )
    }

    /// Whether this op commutes with itself (`op(a, b) == op(b, a)`),
    /// used by the optimizer's independence test.
    #[must_use]
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Mul
                | Self::Gcd
                | Self::Equ
                | Self::Neq
                | Self::Min
                | Self::Max
                | Self::Ban
                | Self::Bor
                | Self::Bxo
        )
    }
}

impl Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.metadata().name)
    }
}

/// A single operation: its type, two operands (unused ones default to
/// zero), and an optional comment.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Operation {
    pub op_type: OperationType,
    pub target: Operand,
    pub source: Operand,
    pub comment: Option<String>,
}

impl Operation {
    /// Constructs an arity-2 operation with no comment.
    #[must_use]
    pub fn new(op_type: OperationType, target: Operand, source: Operand) -> Self {
        Self { op_type, target, source, comment: None }
    }

    /// Constructs an arity-1 operation (source defaults to `Constant(0)`).
    #[must_use]
    pub fn unary(op_type: OperationType, target: Operand) -> Self {
        Self::new(op_type, target, Operand::constant(0))
    }

    /// Constructs an arity-0 operation (both operands default).
    #[must_use]
    pub fn nullary(op_type: OperationType) -> Self {
        Self::new(op_type, Operand::constant(0), Operand::constant(0))
    }

    /// Attaches a comment, replacing any existing one.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Program equality and ordering ignore comments.
impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.op_type == other.op_type && self.target == other.target && self.source == other.source
    }
}

impl Eq for Operation {}

impl Ord for Operation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.op_type
            .cmp(&other.op_type)
            .then_with(|| self.target.cmp(&other.target))
            .then_with(|| self.source.cmp(&other.source))
    }
}

impl PartialOrd for Operation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = self.op_type.metadata();
        match meta.arity {
            0 => write!(f, "{}", meta.name)?,
            1 => write!(f, "{} {}", meta.name, self.target)?,
            _ => write!(f, "{} {},{}", meta.name, self.target, self.source)?,
        }
        if let Some(comment) = &self.comment {
            write!(f, " ; {comment}")?;
        }
        Ok(())
    }
}

/// An error validating a [`Program`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// An `LPB` with no matching `LPE`, or vice versa.
    #[error("unbalanced loop at operation index {0}")]
    UnbalancedLoops(usize),
}

/// An ordered sequence of operations plus name-keyed integer directives.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    pub ops: Vec<Operation>,
    pub directives: IndexMap<String, i64>,
}

impl Program {
    /// Constructs an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation.
    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// Reads a directive, or `default` if absent.
    #[must_use]
    pub fn directive(&self, name: &str, default: i64) -> i64 {
        self.directives.get(name).copied().unwrap_or(default)
    }

    /// The `offset` directive: the index of the first produced term.
    #[must_use]
    pub fn offset(&self) -> i64 {
        self.directive("offset", 0)
    }

    /// The `inputs` directive, used by `PRG` callees.
    #[must_use]
    pub fn inputs(&self) -> i64 {
        self.directive("inputs", 1)
    }

    /// The `outputs` directive, used by `PRG` callees.
    #[must_use]
    pub fn outputs(&self) -> i64 {
        self.directive("outputs", 1)
    }

    /// Validates that every `LPB` has a matching `LPE` and vice versa.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnbalancedLoops`] at the index of the first
    /// operation that breaks the balance (an `LPE` with nothing open, or
    /// the program ending with loops still open).
    pub fn validate(&self) -> Result<(), Error> {
        let mut depth = 0usize;
        for (i, op) in self.ops.iter().enumerate() {
            match op.op_type {
                OperationType::Lpb => depth += 1,
                OperationType::Lpe => {
                    depth = depth.checked_sub(1).ok_or(Error::UnbalancedLoops(i))?;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(Error::UnbalancedLoops(self.ops.len()));
        }
        Ok(())
    }

    /// Number of steps a no-op walk over the program would contribute;
    /// `NOP` and comment-only operations contribute zero.
    #[must_use]
    pub fn step_weight(op: &Operation) -> usize {
        usize::from(op.op_type != OperationType::Nop)
    }
}

/// Program equality ignores comments; directive order participates since
/// `IndexMap`'s `PartialEq` compares key-value pairs regardless of order.
impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.ops == other.ops && self.directives == other.directives
    }
}

impl Eq for Program {}

/// Lexicographic over the operation sequence, per the data model.
impl Ord for Program {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ops.cmp(&other.ops)
    }
}

impl PartialOrd for Program {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.directives {
            writeln!(f, "#{name} {value}")?;
        }
        let mut indent = 0usize;
        for op in &self.ops {
            if op.op_type == OperationType::Lpe && indent > 0 {
                indent -= 1;
            }
            writeln!(f, "{}{}", "  ".repeat(indent), op)?;
            if op.op_type == OperationType::Lpb {
                indent += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips_by_name() {
        for t in OperationType::ALL {
            assert_eq!(OperationType::from_name(t.metadata().name), Some(t));
        }
    }

    #[test]
    fn validate_rejects_unbalanced_loops() {
        let mut p = Program::new();
        p.push(Operation::new(
            OperationType::Lpb,
            Operand::direct(1),
            Operand::constant(1),
        ));
        assert_eq!(p.validate(), Err(Error::UnbalancedLoops(1)));
    }

    #[test]
    fn validate_accepts_balanced_loops() {
        let mut p = Program::new();
        p.push(Operation::new(OperationType::Lpb, Operand::direct(1), Operand::constant(1)));
        p.push(Operation::nullary(OperationType::Lpe));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn equality_ignores_comments() {
        let a = Operation::new(OperationType::Add, Operand::direct(1), Operand::constant(2))
            .with_comment("first");
        let b = Operation::new(OperationType::Add, Operand::direct(1), Operand::constant(2))
            .with_comment("second");
        assert_eq!(a, b);
    }

    #[test]
    fn display_indents_loop_bodies() {
        let mut p = Program::new();
        p.push(Operation::new(OperationType::Lpb, Operand::direct(0), Operand::constant(1)));
        p.push(Operation::new(OperationType::Add, Operand::direct(1), Operand::constant(1)));
        p.push(Operation::nullary(OperationType::Lpe));
        let text = p.to_string();
        assert!(text.contains("  add $1,1"));
    }
}
