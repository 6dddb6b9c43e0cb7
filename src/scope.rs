//! Lexical scopes stored in an arena and addressed by handle.
//!
//! A child records its parent's [`ScopeId`] rather than owning it, so chains
//! of any length can be dropped by discarding handles and no reference cycle
//! can form between scopes.

use indexmap::IndexMap;

use crate::{diagnostics::EvalError, expr::Expr};

/// Handle to a scope record. The generation guards against a released slot
/// being reused under a stale handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId {
    index: usize,
    generation: u32,
}

impl ScopeId {
    pub fn index(self) -> usize {
        self.index
    }
}

#[derive(Debug)]
struct ScopeRecord {
    parent: Option<ScopeId>,
    bindings: IndexMap<String, Expr>,
    generation: u32,
    live: bool,
}

#[derive(Debug, Default)]
pub struct ScopeArena {
    records: Vec<ScopeRecord>,
    free: Vec<usize>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a scope with no parent.
    pub fn root(&mut self) -> ScopeId {
        self.alloc(None)
    }

    /// Allocates a scope whose lookups fall back to `parent`.
    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        self.alloc(Some(parent))
    }

    fn alloc(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = match self.free.pop() {
            Some(index) => {
                let record = &mut self.records[index];
                record.generation = record.generation.wrapping_add(1);
                record.parent = parent;
                record.live = true;
                ScopeId {
                    index,
                    generation: record.generation,
                }
            }
            None => {
                self.records.push(ScopeRecord {
                    parent,
                    bindings: IndexMap::new(),
                    generation: 0,
                    live: true,
                });
                ScopeId {
                    index: self.records.len() - 1,
                    generation: 0,
                }
            }
        };
        tracing::trace!(scope = id.index, parent = ?parent.map(ScopeId::index), "allocated scope");
        id
    }

    fn record(&self, id: ScopeId) -> Option<&ScopeRecord> {
        self.records
            .get(id.index)
            .filter(|record| record.live && record.generation == id.generation)
    }

    fn record_mut(&mut self, id: ScopeId) -> Option<&mut ScopeRecord> {
        self.records
            .get_mut(id.index)
            .filter(|record| record.live && record.generation == id.generation)
    }

    pub fn is_live(&self, id: ScopeId) -> bool {
        self.record(id).is_some()
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.record(id).and_then(|record| record.parent)
    }

    pub fn contains(&self, id: ScopeId, name: &str) -> bool {
        self.get(id, name).is_some()
    }

    /// Borrows the innermost binding of `name` visible from `id`.
    pub fn get(&self, id: ScopeId, name: &str) -> Option<&Expr> {
        let mut current = Some(id);
        while let Some(scope) = current {
            let record = self.record(scope)?;
            if let Some(expr) = record.bindings.get(name) {
                return Some(expr);
            }
            current = record.parent;
        }
        None
    }

    /// Returns an independent copy of the innermost binding of `name`.
    /// Reduction consumes the nodes it is given, so the stored binding must
    /// never be handed out directly.
    pub fn lookup(&self, id: ScopeId, name: &str) -> Result<Expr, EvalError> {
        self.get(id, name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedSymbol {
                name: name.to_string(),
            })
    }

    /// Inserts or overwrites `name` in `id` itself, never in an ancestor.
    pub fn define(&mut self, id: ScopeId, name: impl Into<String>, expr: Expr) {
        let name = name.into();
        match self.record_mut(id) {
            Some(record) => {
                tracing::trace!(scope = id.index, %name, "defined binding");
                record.bindings.insert(name, expr);
            }
            None => {
                tracing::warn!(scope = id.index, %name, "ignored definition in released scope");
            }
        }
    }

    /// Releases `id` and every scope whose parent chain reaches it, returning
    /// how many records were freed. Handles to released scopes stay safe to
    /// hold: they simply resolve nothing.
    pub fn release(&mut self, id: ScopeId) -> usize {
        if !self.is_live(id) {
            return 0;
        }
        let mut doomed = vec![false; self.records.len()];
        doomed[id.index] = true;
        loop {
            let mut changed = false;
            for (index, record) in self.records.iter().enumerate() {
                if doomed[index] || !record.live {
                    continue;
                }
                let parent_doomed = record
                    .parent
                    .and_then(|parent| self.record(parent).map(|_| parent.index))
                    .is_some_and(|parent| doomed[parent]);
                if parent_doomed {
                    doomed[index] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let released = self.sweep(&doomed);
        tracing::debug!(scope = id.index, released, "released scope chain");
        released
    }

    /// Frees every live scope that cannot be reached from `roots` or from the
    /// scopes captured by `values`. A scope is reachable when a reachable
    /// scope's bindings capture it, or when it is a parent of a reachable
    /// scope. Returns how many records were freed.
    pub fn collect(&mut self, roots: &[ScopeId], values: &[&Expr]) -> usize {
        let mut marked = vec![false; self.records.len()];
        let mut pending = roots.to_vec();
        for value in values {
            value.captured_scopes(&mut pending);
        }
        while let Some(id) = pending.pop() {
            let Some(record) = self.record(id) else {
                continue;
            };
            if marked[id.index] {
                continue;
            }
            marked[id.index] = true;
            pending.extend(record.parent);
            for bound in record.bindings.values() {
                bound.captured_scopes(&mut pending);
            }
        }

        let doomed: Vec<bool> = self
            .records
            .iter()
            .zip(&marked)
            .map(|(record, &marked)| record.live && !marked)
            .collect();
        let released = self.sweep(&doomed);
        if released > 0 {
            tracing::debug!(released, live = self.live(), "collected unreachable scopes");
        }
        released
    }

    fn sweep(&mut self, doomed: &[bool]) -> usize {
        let mut released = 0;
        for (index, record) in self.records.iter_mut().enumerate() {
            if doomed[index] {
                record.live = false;
                record.parent = None;
                record.bindings.clear();
                self.free.push(index);
                released += 1;
            }
        }
        released
    }

    /// Number of scopes currently alive.
    pub fn live(&self) -> usize {
        self.records.len() - self.free.len()
    }
}
