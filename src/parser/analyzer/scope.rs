use std::sync::Arc;

use crate::parser::analyzer::{AnalyzedQuery, CteDef, RangeEntry};

/// Visibility wrapper around a range entry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceItem {
    pub slot: u32,
    /// Visible only while a LATERAL item of the same FROM list is analyzed.
    pub lateral_only: bool,
    /// Whether such a lateral reference is legal at all.
    pub lateral_ok: bool,
}

impl NamespaceItem {
    pub fn visible(slot: u32) -> Self {
        Self { slot, lateral_only: false, lateral_ok: true }
    }
}

/// Symbol table of one query nesting level.
#[derive(Debug, Default)]
pub struct Scope {
    pub range_entries: Vec<RangeEntry>,
    pub table_namespace: Vec<NamespaceItem>,
    pub column_namespace: Vec<NamespaceItem>,
    pub cte_namespace: Vec<Arc<CteDef>>,
    /// WITH items not yet in scope; used for hints only.
    pub future_ctes: Vec<Arc<CteDef>>,
    pub join_list: Vec<u32>,
    pub next_output_position: u32,
    /// Set while a LATERAL item of this level's FROM list is analyzed.
    pub lateral_active: bool,
    /// Arena index of the enclosing scope.
    pub parent: Option<usize>,
}

impl Scope {
    pub fn new(parent: Option<usize>) -> Self {
        Self { next_output_position: 1, parent, ..Self::default() }
    }

    pub fn entry(&self, slot: u32) -> Option<&RangeEntry> {
        if slot == 0 {
            return None;
        }
        self.range_entries.get(slot as usize - 1)
    }

    pub fn entry_mut(&mut self, slot: u32) -> Option<&mut RangeEntry> {
        if slot == 0 {
            return None;
        }
        self.range_entries.get_mut(slot as usize - 1)
    }

    /// Apply lateral flags to every namespace item of the given slots.
    pub fn set_lateral_state(&mut self, slots: &[u32], lateral_only: bool, lateral_ok: bool) {
        for item in self.table_namespace.iter_mut().chain(self.column_namespace.iter_mut()) {
            if slots.contains(&item.slot) {
                item.lateral_only = lateral_only;
                item.lateral_ok = lateral_ok;
            }
        }
    }

    /// Make every namespace item unconditionally visible.
    pub fn clear_lateral_state(&mut self) {
        for item in self.table_namespace.iter_mut().chain(self.column_namespace.iter_mut()) {
            item.lateral_only = false;
            item.lateral_ok = true;
        }
    }
}

/// Read-only view of one level's entries and CTEs.
///
/// Live scopes and already analyzed inner queries both present themselves as
/// frames, so row-shape discovery can walk into a subquery as if it were a
/// nested scope.
#[derive(Debug, Clone, Copy)]
pub struct ScopeFrame<'a> {
    pub entries: &'a [RangeEntry],
    pub ctes: &'a [Arc<CteDef>],
}

impl<'a> ScopeFrame<'a> {
    pub fn of_scope(scope: &'a Scope) -> Self {
        Self { entries: &scope.range_entries, ctes: &scope.cte_namespace }
    }

    pub fn of_query(query: &'a AnalyzedQuery) -> Self {
        Self { entries: &query.range_entries, ctes: &query.ctes }
    }

    pub fn entry(&self, slot: u32) -> Option<&'a RangeEntry> {
        if slot == 0 {
            return None;
        }
        self.entries.get(slot as usize - 1)
    }
}
