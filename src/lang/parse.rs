use std::num::ParseIntError;

use pest::Parser;
use pest_derive::Parser;
use seqmine_arch::NumberError;
use thiserror::Error;

use super::{Document, Line};

mod imp;

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Parser)]
#[grammar = "lang/lang.pest"]
struct Language;

impl std::str::FromStr for Document {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut pairs = Language::parse(Rule::program, s).map_err(|err| Error::Pest(Box::new(err)))?;
        let program = pairs.next().expect("`program` rule always matches once");

        let mut directives = Vec::new();
        let mut lines = Vec::new();
        let mut seen_operation = false;

        for pair in program.into_inner() {
            if pair.as_rule() != Rule::line {
                continue; // EOI
            }
            match imp::line(pair)? {
                imp::RawLine::Blank => lines.push(Line::Blank),
                imp::RawLine::Comment(text) => lines.push(Line::Comment(text)),
                imp::RawLine::Directive(name, value) => {
                    if seen_operation {
                        return Err(Error::DirectiveAfterOperation);
                    }
                    directives.push((name, value));
                }
                imp::RawLine::Operation(op) => {
                    seen_operation = true;
                    lines.push(Line::Operation(op));
                }
            }
        }

        Ok(Document { directives, lines })
    }
}

/// Errors constructing a [`Document`] from program text.
#[derive(Debug, Error)]
pub enum Error {
    /// The text did not match the program-text grammar.
    #[error(transparent)]
    Pest(#[from] Box<pest::error::Error<Rule>>),
    /// A directive value, or a bare integer constant, was not an integer.
    #[error(transparent)]
    ParseInt(#[from] ParseIntError),
    /// A constant operand overflowed the engine's arbitrary-precision parser.
    #[error(transparent)]
    Number(#[from] NumberError),
    /// No [`OperationType`](seqmine_core::program::OperationType) has this mnemonic.
    #[error("unknown mnemonic {0:?}")]
    UnknownMnemonic(String),
    /// The mnemonic was given the wrong number of operands.
    #[error("`{mnemonic}` takes {expected} operand(s), found {found}")]
    WrongArity { mnemonic: String, expected: u8, found: u8 },
    /// A `$k`/`$$k` cell index was negative.
    #[error("cell index must be non-negative, found {0}")]
    NegativeIndex(i64),
    /// A `#name value` directive followed the first operation.
    #[error("directives must precede the first operation")]
    DirectiveAfterOperation,
}
