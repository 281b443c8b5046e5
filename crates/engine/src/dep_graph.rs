//! Dependency graph between cells.
//!
//! # Edge direction
//!
//! ```text
//! q ∈ requires(p)  means  "the formula at p reads q"
//! p ∈ dependents(q)  is the same edge seen from q
//! ```
//!
//! # Invariants
//!
//! 1. **Bidirectional consistency:** `q ∈ requires(p)` iff `p ∈ dependents(q)`.
//! 2. **No dangling entries:** empty sets are removed, not stored.
//! 3. **Atomic updates:** [`DepGraph::replace_edges`] is the only mutator that
//!    touches both maps.
//! 4. The `requires` relation stays acyclic; the sheet probes with
//!    [`DepGraph::reaches`] before committing any edge set.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::position::Position;

#[derive(Debug, Default, Clone)]
pub(crate) struct DepGraph {
    /// p -> cells the formula at p reads.
    upstream: FxHashMap<Position, FxHashSet<Position>>,
    /// q -> cells whose formulas read q.
    downstream: FxHashMap<Position, FxHashSet<Position>>,
}

impl DepGraph {
    /// Cells the formula at `pos` reads (outgoing edges).
    pub fn requires(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        self.upstream
            .get(&pos)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Cells whose formulas read `pos` (incoming edges).
    pub fn dependents(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        self.downstream
            .get(&pos)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// True when at least one formula reads `pos`.
    pub fn is_referenced(&self, pos: Position) -> bool {
        self.downstream.contains_key(&pos)
    }

    /// Replace all outgoing edges of `pos` atomically, returning the old set.
    pub fn replace_edges(
        &mut self,
        pos: Position,
        new_requires: FxHashSet<Position>,
    ) -> FxHashSet<Position> {
        let old = self.upstream.remove(&pos).unwrap_or_default();
        for q in &old {
            if let Some(readers) = self.downstream.get_mut(q) {
                readers.remove(&pos);
                if readers.is_empty() {
                    self.downstream.remove(q);
                }
            }
        }

        if !new_requires.is_empty() {
            for q in &new_requires {
                self.downstream.entry(*q).or_default().insert(pos);
            }
            self.upstream.insert(pos, new_requires);
        }

        old
    }

    /// Drop all outgoing edges of `pos`, returning the old set.
    pub fn clear_cell(&mut self, pos: Position) -> FxHashSet<Position> {
        self.replace_edges(pos, FxHashSet::default())
    }

    /// True when some chain of `requires` edges leads from any of `sources`
    /// to `target` (a source equal to `target` counts). Iterative DFS with a
    /// visited set, so it terminates on any graph shape.
    pub fn reaches(&self, sources: &[Position], target: Position) -> bool {
        let mut visited: FxHashSet<Position> = FxHashSet::default();
        let mut stack: Vec<Position> = sources.to_vec();

        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(self.requires(current));
        }

        false
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        for (p, reads) in &self.upstream {
            assert!(!reads.is_empty(), "empty requires set stored for {p}");
            for q in reads {
                assert!(
                    self.downstream.get(q).is_some_and(|r| r.contains(p)),
                    "missing reverse edge {p} -> {q}"
                );
            }
        }
        for (q, readers) in &self.downstream {
            assert!(!readers.is_empty(), "empty dependents set stored for {q}");
            for p in readers {
                assert!(
                    self.upstream.get(p).is_some_and(|r| r.contains(q)),
                    "missing forward edge {p} -> {q}"
                );
            }
        }
    }
}
