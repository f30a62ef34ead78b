use std::sync::Arc;

use crate::parser::{
    analyzer::{CteDef, OutputColumn, RangeEntry, Scope, TypedExpr},
    ast::SetOperator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    /// Target list position the key sorts by.
    pub position: u32,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOperationInfo {
    pub op: SetOperator,
    pub all: bool,
}

/// Result of analyzing one query block.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedQuery {
    pub range_entries: Vec<RangeEntry>,        // with selected/written column bitsets
    pub target_list: Vec<OutputColumn>,
    pub ctes: Vec<Arc<CteDef>>,
    pub join_list: Vec<u32>,                   // top-level FROM slots
    pub criteria: Option<TypedExpr>,
    pub sort_clause: Vec<SortKey>,
    pub set_operation: Option<SetOperationInfo>,
}

impl AnalyzedQuery {
    pub(crate) fn from_scope(scope: Scope, target_list: Vec<OutputColumn>, criteria: Option<TypedExpr>, sort_clause: Vec<SortKey>, set_operation: Option<SetOperationInfo>) -> Self {
        Self {
            range_entries: scope.range_entries,
            target_list,
            ctes: scope.cte_namespace,
            join_list: scope.join_list,
            criteria,
            sort_clause,
            set_operation,
        }
    }

    /// Result columns, skipping hidden bookkeeping entries.
    pub fn visible_outputs(&self) -> impl Iterator<Item = &OutputColumn> {
        self.target_list.iter().filter(|c| !c.is_hidden)
    }

    /// The `position`-th (1-based) visible output column.
    pub fn output_at(&self, position: u32) -> Option<&OutputColumn> {
        if position == 0 {
            return None;
        }
        self.visible_outputs().nth(position as usize - 1)
    }

    pub fn output_names(&self) -> Vec<String> {
        self.visible_outputs().map(|c| c.name().to_string()).collect()
    }

    pub fn entry(&self, slot: u32) -> Option<&RangeEntry> {
        if slot == 0 {
            return None;
        }
        self.range_entries.get(slot as usize - 1)
    }

    /// First range entry with the given display name.
    pub fn entry_named(&self, name: &str) -> Option<&RangeEntry> {
        self.range_entries.iter().find(|e| e.display_name == name)
    }
}
