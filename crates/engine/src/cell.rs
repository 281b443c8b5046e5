use crate::formula::eval::Value;
use crate::formula::parser::Expr;
use crate::position::Position;

/// Marks formula input at the sheet surface.
pub const FORMULA_SIGN: char = '=';
/// A leading quote turns any input into plain text; it is stripped from the
/// observable value but kept in the stored text.
pub const ESCAPE_SIGN: char = '\'';

/// Content of a cell.
#[derive(Debug, Clone)]
pub enum CellBody {
    Empty,
    Text(String),
    Formula(Expr),
}

impl CellBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellBody::Empty)
    }
}

/// One cell: content plus the memoized evaluation result.
///
/// Cells are passive data. Dependency edges live in the sheet's graph and
/// every cross-cell mutation goes through the sheet, which also keeps the
/// cache fresh: `None` only occurs transiently inside an edit.
#[derive(Debug, Clone)]
pub struct Cell {
    pub(crate) body: CellBody,
    pub(crate) cached: Option<Value>,
}

impl Cell {
    pub(crate) fn empty() -> Self {
        Self {
            body: CellBody::Empty,
            cached: Some(Value::Number(0.0)),
        }
    }

    pub fn body(&self) -> &CellBody {
        &self.body
    }

    /// Observable value. Empty cells read as zero.
    pub fn value(&self) -> Value {
        self.cached.clone().unwrap_or(Value::Number(0.0))
    }

    /// Stored text: `""` for empty cells, the raw input for text cells
    /// (leading quote preserved), `=` plus the canonical expression for
    /// formula cells.
    pub fn text(&self) -> String {
        match &self.body {
            CellBody::Empty => String::new(),
            CellBody::Text(raw) => raw.clone(),
            CellBody::Formula(expr) => format!("{}{}", FORMULA_SIGN, expr.canonical()),
        }
    }

    /// Positions this cell's formula reads; empty for non-formula cells.
    pub fn referenced(&self) -> Vec<Position> {
        match &self.body {
            CellBody::Formula(expr) => expr.referenced_cells(),
            _ => Vec::new(),
        }
    }
}

/// Text value as observed through `value()`: one leading quote stripped.
pub(crate) fn observable_text(raw: &str) -> &str {
    raw.strip_prefix(ESCAPE_SIGN).unwrap_or(raw)
}
