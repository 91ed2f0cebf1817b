use pest::iterators::Pair;
use seqmine_arch::Number;
use seqmine_core::program::{Operand, Operation, OperationType};

use super::{Error, Result, Rule};

/// One parsed line, still tagged by its original shape so the writer
/// can reproduce blank and comment-only lines exactly.
pub(crate) enum RawLine {
    Blank,
    Comment(String),
    Directive(String, i64),
    Operation(Operation),
}

pub(crate) fn line(pair: Pair<Rule>) -> Result<RawLine> {
    let inner = pair.into_inner().next();
    let Some(inner) = inner else {
        return Ok(RawLine::Blank);
    };
    match inner.as_rule() {
        Rule::directive => directive(inner),
        Rule::operation => operation(inner).map(RawLine::Operation),
        Rule::comment_line => {
            let text = inner.into_inner().next().map_or(String::new(), |p| p.as_str().to_owned());
            Ok(RawLine::Comment(text))
        }
        Rule::blank_line => Ok(RawLine::Blank),
        rule => unreachable!("`line` cannot produce {rule:?}"),
    }
}

fn directive(pair: Pair<Rule>) -> Result<RawLine> {
    let mut fields = pair.into_inner();
    let name = fields.next().expect("directive always carries a name").as_str().to_owned();
    let value: i64 = fields.next().expect("directive always carries a value").as_str().parse()?;
    Ok(RawLine::Directive(name, value))
}

fn operation(pair: Pair<Rule>) -> Result<Operation> {
    let mut fields = pair.into_inner().peekable();
    let name = fields.next().expect("operation always carries a mnemonic").as_str();
    let op_type = OperationType::from_name(name).ok_or_else(|| Error::UnknownMnemonic(name.to_owned()))?;
    let arity = op_type.metadata().arity;

    let mut operands = Vec::new();
    while fields.peek().is_some_and(|p| p.as_rule() == Rule::operand) {
        operands.push(operand(fields.next().expect("checked by peek"))?);
    }
    let comment = fields.next().map(|p| p.as_str().to_owned());

    // `lpb`'s region-length argument defaults to `Constant(1)`.
    if op_type == OperationType::Lpb && operands.len() == 1 {
        operands.push(Operand::constant(1));
    }

    if operands.len() as u8 != arity {
        return Err(Error::WrongArity { mnemonic: name.to_owned(), expected: arity, found: operands.len() as u8 });
    }

    let mut op = match arity {
        0 => Operation::nullary(op_type),
        1 => Operation::unary(op_type, operands.remove(0)),
        _ => {
            let source = operands.remove(1);
            let target = operands.remove(0);
            Operation::new(op_type, target, source)
        }
    };
    if let Some(comment) = comment {
        op = op.with_comment(comment);
    }
    Ok(op)
}

fn operand(pair: Pair<Rule>) -> Result<Operand> {
    let inner = pair.into_inner().next().expect("`operand` always wraps one alternative");
    let text = inner.as_str();
    match inner.as_rule() {
        Rule::constant => Ok(Operand::Constant(text.parse::<Number>()?)),
        Rule::direct => cell(&text[1..]).map(Operand::Direct),
        Rule::indirect => cell(&text[2..]).map(Operand::Indirect),
        rule => unreachable!("`operand` cannot produce {rule:?}"),
    }
}

fn cell(digits: &str) -> Result<Number> {
    let n = digits.parse::<Number>()?;
    if n.is_negative() {
        let index: i64 = digits.parse().unwrap_or(-1);
        return Err(Error::NegativeIndex(index));
    }
    Ok(n)
}
