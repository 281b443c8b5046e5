use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell::{observable_text, Cell, CellBody, FORMULA_SIGN};
use crate::dep_graph::DepGraph;
use crate::error::EngineError;
use crate::formula::eval::{evaluate, parse_number, CellLookup, Value};
use crate::formula::parser;
use crate::position::{Position, Size};

/// Sparse grid of cells with reactive recomputation.
///
/// The sheet owns every cell and is the only mutator of cells, edges, and
/// caches. Edits are transactional: parse and cycle validation happen before
/// any state is touched, so a failed edit leaves no trace.
#[derive(Debug, Default)]
pub struct Sheet {
    cells: FxHashMap<Position, Cell>,
    deps: DepGraph,
    size: Size,
}

impl CellLookup for Sheet {
    fn value_at(&self, pos: Position) -> Option<Value> {
        let cell = self.cells.get(&pos)?;
        Some(match &cell.cached {
            Some(v) => v.clone(),
            // Stale cache mid-edit: fall back to a pure recomputation.
            None => self.compute_body(&cell.body),
        })
    }
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `text` into the cell at `pos`.
    ///
    /// Classification: `""` clears, a leading `=` with more behind it is a
    /// formula, anything else is text. Formula edits validate syntax and
    /// acyclicity before committing; on failure the sheet is unchanged.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), EngineError> {
        self.check_pos(pos)?;

        if text.is_empty() {
            if self.cells.contains_key(&pos) {
                self.clear_inner(pos);
            }
            return Ok(());
        }

        if text.len() > 1 && text.starts_with(FORMULA_SIGN) {
            let expr = match parser::parse(&text[1..]) {
                Ok(expr) => expr,
                Err(msg) => {
                    debug!("rejected formula at {pos}: {msg}");
                    return Err(EngineError::Formula(msg));
                }
            };
            let refs = expr.referenced_cells();
            if self.deps.reaches(&refs, pos) {
                debug!("rejected formula at {pos}: would close a cycle");
                return Err(EngineError::CircularDependency(pos));
            }
            debug!("set {pos} to formula ={}", expr.canonical());
            self.install(pos, CellBody::Formula(expr), refs);
        } else {
            debug!("set {pos} to text");
            self.install(pos, CellBody::Text(text.to_string()), Vec::new());
        }
        Ok(())
    }

    /// Read-only view of the cell at `pos`, or `None` when no cell exists.
    pub fn get_cell(&self, pos: Position) -> Result<Option<&Cell>, EngineError> {
        self.check_pos(pos)?;
        Ok(self.cells.get(&pos))
    }

    /// Empty the cell at `pos`. The cell object survives only while other
    /// formulas reference it (they keep reading `0.0`); clearing an absent
    /// cell is a no-op.
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), EngineError> {
        self.check_pos(pos)?;
        if self.cells.contains_key(&pos) {
            self.clear_inner(pos);
        }
        Ok(())
    }

    /// Extent of the smallest top-left rectangle covering every cell.
    pub fn printable_size(&self) -> Size {
        self.size
    }

    /// Positions that currently hold a cell object, in no particular order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.cells.keys().copied()
    }

    // =========================================================================
    // Edit internals
    // =========================================================================

    fn check_pos(&self, pos: Position) -> Result<(), EngineError> {
        if pos.is_valid() {
            Ok(())
        } else {
            Err(EngineError::InvalidPosition(pos.to_string()))
        }
    }

    /// Commit a validated body at `pos`: rewrite edges, refresh this cell's
    /// cache, then bring every transitive dependent back up to date.
    fn install(&mut self, pos: Position, body: CellBody, refs: Vec<Position>) {
        let new_reads: FxHashSet<Position> = refs.into_iter().collect();

        // Referenced cells must exist, if only as zeros.
        for q in &new_reads {
            self.cells.entry(*q).or_insert_with(Cell::empty);
        }
        let old_reads = self.deps.replace_edges(pos, new_reads.clone());

        let cell = self.cells.entry(pos).or_insert_with(Cell::empty);
        cell.body = body;
        cell.cached = None;

        for q in old_reads.difference(&new_reads) {
            self.release(*q);
        }

        self.grow_to(pos);
        for q in &new_reads {
            self.grow_to(*q);
        }

        self.refresh(pos);
        self.refresh_dependents(pos);
    }

    fn clear_inner(&mut self, pos: Position) {
        let old_reads = self.deps.clear_cell(pos);
        for q in old_reads {
            self.release(q);
        }

        if self.deps.is_referenced(pos) {
            if let Some(cell) = self.cells.get_mut(&pos) {
                cell.body = CellBody::Empty;
                cell.cached = Some(Value::Number(0.0));
            }
            self.refresh_dependents(pos);
        } else {
            self.cells.remove(&pos);
            self.shrink_from(pos);
        }
        debug!("cleared {pos}");
    }

    /// Drop the cell at `pos` if it carries no content and nothing reads it.
    fn release(&mut self, pos: Position) {
        let is_default = self.cells.get(&pos).is_some_and(|c| c.body.is_empty())
            && !self.deps.is_referenced(pos);
        if is_default {
            self.cells.remove(&pos);
            self.shrink_from(pos);
        }
    }

    // =========================================================================
    // Cache maintenance
    // =========================================================================

    /// Value of a body against the current sheet, without touching caches.
    fn compute_body(&self, body: &CellBody) -> Value {
        match body {
            CellBody::Empty => Value::Number(0.0),
            CellBody::Text(raw) => match parse_number(raw) {
                Some(n) => Value::Number(n),
                None => Value::Text(observable_text(raw).to_string()),
            },
            CellBody::Formula(expr) => match evaluate(expr, self) {
                Ok(n) => Value::Number(n),
                Err(e) => Value::Error(e),
            },
        }
    }

    fn refresh(&mut self, pos: Position) {
        let value = match self.cells.get(&pos) {
            Some(cell) => self.compute_body(&cell.body),
            None => return,
        };
        if let Some(cell) = self.cells.get_mut(&pos) {
            cell.cached = Some(value);
        }
    }

    /// Invalidate every transitive dependent of `start`, then recompute them
    /// in dependency order so each evaluation reads only fresh caches.
    fn refresh_dependents(&mut self, start: Position) {
        let mut affected: FxHashSet<Position> = FxHashSet::default();
        let mut stack: Vec<Position> = self.deps.dependents(start).collect();
        while let Some(p) = stack.pop() {
            if affected.insert(p) {
                stack.extend(self.deps.dependents(p));
            }
        }
        if affected.is_empty() {
            return;
        }
        trace!("refreshing {} dependent cell(s) of {start}", affected.len());

        for p in &affected {
            if let Some(cell) = self.cells.get_mut(p) {
                cell.cached = None;
            }
        }

        // Kahn's ordering over the affected subgraph: a cell is ready once
        // every stale cell it reads has been refreshed. Acyclicity guarantees
        // the worklist drains completely.
        let mut pending: FxHashMap<Position, usize> = affected
            .iter()
            .map(|p| {
                let stale_reads = self
                    .deps
                    .requires(*p)
                    .filter(|q| affected.contains(q))
                    .count();
                (*p, stale_reads)
            })
            .collect();
        let mut ready: Vec<Position> = pending
            .iter()
            .filter_map(|(p, n)| (*n == 0).then_some(*p))
            .collect();

        while let Some(p) = ready.pop() {
            self.refresh(p);
            let readers: Vec<Position> = self.deps.dependents(p).collect();
            for r in readers {
                if let Some(n) = pending.get_mut(&r) {
                    *n -= 1;
                    if *n == 0 {
                        ready.push(r);
                    }
                }
            }
        }
    }

    // =========================================================================
    // Bounding box maintenance
    // =========================================================================

    fn grow_to(&mut self, pos: Position) {
        if pos.row + 1 > self.size.rows {
            self.size.rows = pos.row + 1;
        }
        if pos.col + 1 > self.size.cols {
            self.size.cols = pos.col + 1;
        }
    }

    /// A removal only forces a rescan when it touched the current extent.
    fn shrink_from(&mut self, pos: Position) {
        if pos.row + 1 == self.size.rows || pos.col + 1 == self.size.cols {
            let mut size = Size::default();
            for p in self.cells.keys() {
                size.rows = size.rows.max(p.row + 1);
                size.cols = size.cols.max(p.col + 1);
            }
            self.size = size;
        }
    }
}
