//! The line-oriented program text format described in §6: mnemonics,
//! `$k`/`$$k`/bare-integer operands, `#name value` directives, and
//! `;`-comments. Parsing and writing round-trip exactly (modulo
//! whitespace and comment padding), including blank and comment-only
//! lines, which [`Program`] itself has no room to represent.

use std::fmt::{self, Display};

use seqmine_core::program::{Operation, OperationType, Program};

mod parse;

pub use self::parse::Error;

/// A single line of program text, as read or about to be written.
#[derive(Clone, Debug)]
pub enum Line {
    /// An empty line.
    Blank,
    /// A line containing only a `;`-comment.
    Comment(String),
    /// A parsed operation, with its own trailing comment (if any).
    Operation(Operation),
}

/// A parsed program text: directives (which may only precede the first
/// operation) plus the ordered lines that follow.
#[derive(Clone, Debug, Default)]
pub struct Document {
    pub directives: Vec<(String, i64)>,
    pub lines: Vec<Line>,
}

impl Document {
    /// Parses program text into a [`Document`].
    ///
    /// # Errors
    ///
    /// Returns [`Error`] on an unknown mnemonic, wrong operand arity, a
    /// non-integer operand, a negative `$k`/`$$k` index, or a directive
    /// following the first operation.
    pub fn parse(text: &str) -> Result<Self, Error> {
        text.parse()
    }

    /// Projects this document down to a [`Program`], dropping blank and
    /// comment-only lines (which `Program` has no representation for).
    #[must_use]
    pub fn to_program(&self) -> Program {
        let mut program = Program::new();
        for (name, value) in &self.directives {
            program.directives.insert(name.clone(), *value);
        }
        for line in &self.lines {
            if let Line::Operation(op) = line {
                program.push(op.clone());
            }
        }
        program
    }

    /// Builds a document from a [`Program`], with no blank or
    /// comment-only lines (those only ever arise from parsing text).
    #[must_use]
    pub fn from_program(program: &Program) -> Self {
        Self {
            directives: program.directives.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            lines: program.ops.iter().cloned().map(Line::Operation).collect(),
        }
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.directives {
            writeln!(f, "#{name} {value}")?;
        }
        let mut indent = 0usize;
        for line in &self.lines {
            match line {
                Line::Blank => writeln!(f)?,
                Line::Comment(text) => writeln!(f, "; {text}")?,
                Line::Operation(op) => {
                    if op.op_type == OperationType::Lpe && indent > 0 {
                        indent -= 1;
                    }
                    writeln!(f, "{}{}", "  ".repeat(indent), op)?;
                    if op.op_type == OperationType::Lpb {
                        indent += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqmine_core::program::Operand;

    #[test]
    fn round_trips_the_fibonacci_program() {
        let text = "\
mov $1,1
lpb $0
  sub $0,1
  mov $2,$1
  add $1,$0
  mov $0,$2
lpe
mov $0,$1
";
        let doc = Document::parse(text).unwrap();
        assert_eq!(doc.to_string(), text);
        let program = doc.to_program();
        assert_eq!(program.ops.len(), 7);
    }

    #[test]
    fn preserves_blank_and_comment_lines() {
        let text = "#offset 1\nmov $0,1 ; seed\n\n; trailing remark\n";
        let doc = Document::parse(text).unwrap();
        assert_eq!(doc.to_string(), text);
        assert_eq!(doc.directives, vec![("offset".to_string(), 1)]);
    }

    #[test]
    fn rejects_unknown_mnemonic() {
        assert!(matches!(Document::parse("frobnicate $0,1\n"), Err(Error::UnknownMnemonic(_))));
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(matches!(Document::parse("add $0\n"), Err(Error::WrongArity { .. })));
    }

    #[test]
    fn rejects_negative_direct_index() {
        assert!(matches!(Document::parse("mov $-1,1\n"), Err(Error::NegativeIndex(-1))));
    }

    #[test]
    fn directive_after_operation_is_rejected() {
        assert!(matches!(Document::parse("mov $0,1\n#offset 1\n"), Err(Error::DirectiveAfterOperation)));
    }

    #[test]
    fn lpb_defaults_its_region_length_operand() {
        let doc = Document::parse("lpb $0\nlpe\n").unwrap();
        let Line::Operation(op) = &doc.lines[0] else { panic!("expected an operation") };
        assert_eq!(op.source, Operand::constant(1));
    }
}
