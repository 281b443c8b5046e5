// Formula evaluator - pure walk of an Expr against a read-only cell view.
// Caching lives in Cell, invalidation in Sheet; nothing here mutates state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FormulaError;
use crate::position::Position;

use super::parser::{BinaryOp, Expr, UnaryOp};

/// Observable value of a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
    Error(FormulaError),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Error(e) => write!(f, "{}", e),
        }
    }
}

/// Read-only view of cell values, as the evaluator sees them.
pub trait CellLookup {
    /// Observable value of the cell at `pos`, or `None` when no cell exists.
    fn value_at(&self, pos: Position) -> Option<Value>;
}

/// Parse `text` as a number, requiring the whole string to be consumed.
/// Trailing or leading garbage (including whitespace) rejects; so do the
/// textual infinity/NaN spellings, which are not cell numbers.
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Evaluate an expression. Errors propagate leftmost-first through binary
/// operators; any non-finite arithmetic result maps to `#ARITHM!`.
pub fn evaluate(expr: &Expr, cells: &impl CellLookup) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Ref(pos) => match cells.value_at(*pos) {
            // An absent cell reads as zero.
            None => Ok(0.0),
            Some(Value::Number(n)) => Ok(n),
            Some(Value::Text(s)) => parse_number(&s).ok_or(FormulaError::Value),
            Some(Value::Error(e)) => Err(e),
        },
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, cells)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Minus => -v,
            })
        }
        Expr::Binary { op, lhs, rhs } => {
            let a = evaluate(lhs, cells)?;
            let b = evaluate(rhs, cells)?;
            let v = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
            };
            if v.is_finite() {
                Ok(v)
            } else {
                Err(FormulaError::Arithmetic)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashMap;

    use super::super::parser::parse;
    use super::*;

    struct Fixture(FxHashMap<Position, Value>);

    impl Fixture {
        fn new(entries: &[(&str, Value)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(name, v)| (Position::parse(name).unwrap(), v.clone()))
                    .collect(),
            )
        }
    }

    impl CellLookup for Fixture {
        fn value_at(&self, pos: Position) -> Option<Value> {
            self.0.get(&pos).cloned()
        }
    }

    fn eval(src: &str, cells: &Fixture) -> Result<f64, FormulaError> {
        evaluate(&parse(src).unwrap(), cells)
    }

    #[test]
    fn test_arithmetic() {
        let cells = Fixture::new(&[]);
        assert_eq!(eval("1+2*3", &cells), Ok(7.0));
        assert_eq!(eval("(1+2)*3", &cells), Ok(9.0));
        assert_eq!(eval("8-4-2", &cells), Ok(2.0));
        assert_eq!(eval("7/2", &cells), Ok(3.5));
        assert_eq!(eval("-3+-4", &cells), Ok(-7.0));
        assert_eq!(eval("+5", &cells), Ok(5.0));
    }

    #[test]
    fn test_absent_cell_reads_zero() {
        let cells = Fixture::new(&[]);
        assert_eq!(eval("A1", &cells), Ok(0.0));
        assert_eq!(eval("A1+3", &cells), Ok(3.0));
    }

    #[test]
    fn test_numeric_reference() {
        let cells = Fixture::new(&[("A1", Value::Number(2.5))]);
        assert_eq!(eval("A1*4", &cells), Ok(10.0));
    }

    #[test]
    fn test_numeric_text_converts() {
        let cells = Fixture::new(&[("A1", Value::Text("12.5".to_string()))]);
        assert_eq!(eval("A1*2", &cells), Ok(25.0));
    }

    #[test]
    fn test_partial_numeric_text_is_value_error() {
        for raw in ["12x", " 12", "12 ", "", "hello"] {
            let cells = Fixture::new(&[("A1", Value::Text(raw.to_string()))]);
            assert_eq!(eval("A1", &cells), Err(FormulaError::Value), "text {raw:?}");
        }
    }

    #[test]
    fn test_division_by_zero() {
        let cells = Fixture::new(&[]);
        assert_eq!(eval("1/0", &cells), Err(FormulaError::Arithmetic));
        assert_eq!(eval("0/0", &cells), Err(FormulaError::Arithmetic));
    }

    #[test]
    fn test_overflow_is_arithmetic_error() {
        let cells = Fixture::new(&[("A1", Value::Number(1e308))]);
        assert_eq!(eval("A1*10", &cells), Err(FormulaError::Arithmetic));
        assert_eq!(eval("A1+A1", &cells), Err(FormulaError::Arithmetic));
    }

    #[test]
    fn test_error_propagates_unchanged() {
        let cells = Fixture::new(&[("A1", Value::Error(FormulaError::Arithmetic))]);
        assert_eq!(eval("A1+1", &cells), Err(FormulaError::Arithmetic));
        assert_eq!(eval("-A1", &cells), Err(FormulaError::Arithmetic));
    }

    #[test]
    fn test_left_error_wins() {
        let cells = Fixture::new(&[
            ("A1", Value::Error(FormulaError::Ref)),
            ("B1", Value::Error(FormulaError::Arithmetic)),
        ]);
        assert_eq!(eval("A1+B1", &cells), Err(FormulaError::Ref));
        assert_eq!(eval("B1+A1", &cells), Err(FormulaError::Arithmetic));
    }

    #[test]
    fn test_parse_number_full_consumption() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("-1.5"), Some(-1.5));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("42abc"), None);
        assert_eq!(parse_number(" 42"), None);
        assert_eq!(parse_number("42 "), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Number(2.0).to_string(), "2");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Text("hi".to_string()).to_string(), "hi");
        assert_eq!(Value::Error(FormulaError::Value).to_string(), "#VALUE!");
    }
}
