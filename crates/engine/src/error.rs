//! Failure taxonomy.
//!
//! Edits fail synchronously with [`EngineError`] and leave the sheet
//! untouched. Evaluation failures are different: they are ordinary values
//! ([`FormulaError`]) that flow through formulas and caches, and render as
//! `#...!` sentinels.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::position::Position;

/// Synchronous errors surfaced by the sheet API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid position: {0}")]
    InvalidPosition(String),

    #[error("formula syntax: {0}")]
    Formula(String),

    #[error("circular dependency introduced at {0}")]
    CircularDependency(Position),
}

/// Evaluation failure carried as a cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormulaError {
    /// Reference to a cell that cannot exist.
    Ref,
    /// Non-numeric text used in a numeric context.
    Value,
    /// Division by zero, overflow, or any other non-finite result.
    Arithmetic,
}

impl FormulaError {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormulaError::Ref => "#REF!",
            FormulaError::Value => "#VALUE!",
            FormulaError::Arithmetic => "#ARITHM!",
        }
    }
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_error_sentinels() {
        assert_eq!(FormulaError::Ref.to_string(), "#REF!");
        assert_eq!(FormulaError::Value.to_string(), "#VALUE!");
        assert_eq!(FormulaError::Arithmetic.to_string(), "#ARITHM!");
    }

    #[test]
    fn test_engine_error_messages() {
        let err = EngineError::InvalidPosition("A0".to_string());
        assert_eq!(err.to_string(), "invalid position: A0");

        let err = EngineError::CircularDependency(Position::new(0, 0));
        assert_eq!(err.to_string(), "circular dependency introduced at A1");
    }
}
