use tracing::debug;

use crate::{
    database::{AnalyzerConfig, Catalog},
    parser::{
        analyzer::{AnalyzerError, BasicTransformer, ErrorKind, ExprTransformer, NamespaceItem, RangeEntry, Scope, ScopeFrame, TypedExpr},
        ast::RawExpr,
    },
};

static BASIC_TRANSFORMER: BasicTransformer = BasicTransformer;

/// State of one statement's analysis: the scope chain plus the collaborators
/// resolution needs.
///
/// Scopes live in an arena; the last one is the innermost. A reference that
/// is `levels_up` levels out lives in `scopes[len - 1 - levels_up]`.
pub struct AnalysisContext<'a> {
    pub scopes: Vec<Scope>,
    /// access to relation, function and type metadata
    pub catalog: &'a dyn Catalog,
    pub transformer: &'a dyn ExprTransformer,
    pub config: AnalyzerConfig,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self { scopes: Vec::new(), catalog, transformer: &BASIC_TRANSFORMER, config: AnalyzerConfig::default() }
    }

    pub fn with_config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_transformer(mut self, transformer: &'a dyn ExprTransformer) -> Self {
        self.transformer = transformer;
        self
    }

    /// Run the configured expression transformer.
    pub fn transform(&mut self, expr: &RawExpr) -> Result<TypedExpr, AnalyzerError> {
        let transformer = self.transformer;
        transformer.transform(expr, self)
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn enter_child_scope(&mut self) -> usize {
        let parent = self.scopes.len().checked_sub(1);
        self.scopes.push(Scope::new(parent));
        debug!(depth = self.scopes.len(), "entering scope");
        self.scopes.len() - 1
    }

    pub fn leave_scope(&mut self) -> Result<Scope, AnalyzerError> {
        let scope = self.scopes.pop().ok_or_else(|| AnalyzerError::internal("no scope to leave"))?;
        debug!(depth = self.scopes.len() + 1, entries = scope.range_entries.len(), "leaving scope");
        Ok(scope)
    }

    pub fn scope(&self) -> Result<&Scope, AnalyzerError> {
        self.scope_at(0)
    }

    pub fn scope_mut(&mut self) -> Result<&mut Scope, AnalyzerError> {
        self.scope_at_mut(0)
    }

    fn level_index(&self, levels_up: u32) -> Result<usize, AnalyzerError> {
        self.scopes
            .len()
            .checked_sub(1 + levels_up as usize)
            .ok_or_else(|| AnalyzerError::internal(format!("no scope {levels_up} levels up")))
    }

    pub fn scope_at(&self, levels_up: u32) -> Result<&Scope, AnalyzerError> {
        let idx = self.level_index(levels_up)?;
        Ok(&self.scopes[idx])
    }

    pub fn scope_at_mut(&mut self, levels_up: u32) -> Result<&mut Scope, AnalyzerError> {
        let idx = self.level_index(levels_up)?;
        Ok(&mut self.scopes[idx])
    }

    /// Append an entry to the current scope; returns its 1-based slot.
    pub fn push_entry(&mut self, entry: RangeEntry) -> Result<u32, AnalyzerError> {
        let scope = self.scope_mut()?;
        debug!(name = %entry.display_name, kind = entry.kind_name(), "adding range entry");
        scope.range_entries.push(entry);
        Ok(scope.range_entries.len() as u32)
    }

    /// Make an entry of the current scope visible.
    pub fn push_namespace(&mut self, slot: u32, to_table_ns: bool, to_column_ns: bool, to_join_list: bool) -> Result<(), AnalyzerError> {
        let scope = self.scope_mut()?;
        if scope.entry(slot).is_none() {
            return AnalyzerError::internal(format!("no range entry at slot {slot}")).err();
        }
        if to_table_ns {
            scope.table_namespace.push(NamespaceItem::visible(slot));
        }
        if to_column_ns {
            scope.column_namespace.push(NamespaceItem::visible(slot));
        }
        if to_join_list {
            scope.join_list.push(slot);
        }
        Ok(())
    }

    /// Locate an entry by identity, walking outward. Returns `(levels_up, slot)`.
    pub fn slot_of(&self, entry: &RangeEntry) -> Result<(u32, u32), AnalyzerError> {
        for (levels_up, scope) in self.scopes.iter().rev().enumerate() {
            if let Some(pos) = scope.range_entries.iter().position(|e| std::ptr::eq(e, entry)) {
                return Ok((levels_up as u32, pos as u32 + 1));
            }
        }
        AnalyzerError::new(ErrorKind::EntityNotFound, "range entry not found (internal error)").err()
    }

    pub fn entry(&self, levels_up: u32, slot: u32) -> Result<&RangeEntry, AnalyzerError> {
        self.scope_at(levels_up)?
            .entry(slot)
            .ok_or_else(|| AnalyzerError::internal(format!("invalid range entry slot {slot} at level {levels_up}")))
    }

    pub fn entry_mut(&mut self, levels_up: u32, slot: u32) -> Result<&mut RangeEntry, AnalyzerError> {
        self.scope_at_mut(levels_up)?
            .entry_mut(slot)
            .ok_or_else(|| AnalyzerError::internal(format!("invalid range entry slot {slot} at level {levels_up}")))
    }

    /// Frames of the live scope chain, innermost first.
    pub fn frames(&self) -> Vec<ScopeFrame<'_>> {
        self.scopes.iter().rev().map(ScopeFrame::of_scope).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{database::{ColumnInfo, DataType, MemoryCatalog}, parser::analyzer::RelationExpander};

    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.create_table("t", vec![ColumnInfo::new("a", DataType::Integer)]);
        catalog
    }

    fn entry_for(ctx: &AnalysisContext, name: &str) -> RangeEntry {
        let id = ctx.catalog.lookup_relation(&name.into()).unwrap();
        let schema = ctx.catalog.relation(id).unwrap();
        RelationExpander::base_relation(schema, None).unwrap()
    }

    #[test]
    fn slots_are_one_based_and_found_outward() {
        let catalog = catalog();
        let mut ctx = AnalysisContext::new(&catalog);
        ctx.enter_child_scope();
        let entry = entry_for(&ctx, "t");
        let slot = ctx.push_entry(entry).unwrap();
        assert_eq!(slot, 1);

        ctx.enter_child_scope();
        let outer = ctx.entry(1, 1).unwrap();
        assert_eq!(ctx.slot_of(outer).unwrap(), (1, 1));
    }

    #[test]
    fn slot_of_rejects_entries_not_in_the_chain() {
        let catalog = catalog();
        let mut ctx = AnalysisContext::new(&catalog);
        ctx.enter_child_scope();
        let detached = entry_for(&ctx, "t");
        ctx.push_entry(detached.clone()).unwrap();

        let err = ctx.slot_of(&detached).unwrap_err();
        assert_eq!(err.kind, ErrorKind::EntityNotFound);
    }

    #[test]
    fn push_namespace_requires_existing_slot() {
        let catalog = catalog();
        let mut ctx = AnalysisContext::new(&catalog);
        ctx.enter_child_scope();
        assert!(ctx.push_namespace(1, true, true, true).is_err());

        let entry = entry_for(&ctx, "t");
        let slot = ctx.push_entry(entry).unwrap();
        ctx.push_namespace(slot, true, false, true).unwrap();
        let scope = ctx.scope().unwrap();
        assert_eq!(scope.table_namespace.len(), 1);
        assert!(scope.column_namespace.is_empty());
        assert_eq!(scope.join_list, vec![1]);
    }

    #[test]
    fn leaving_restores_parent() {
        let catalog = catalog();
        let mut ctx = AnalysisContext::new(&catalog);
        ctx.enter_child_scope();
        ctx.enter_child_scope();
        assert_eq!(ctx.scope().unwrap().parent, Some(0));
        ctx.leave_scope().unwrap();
        assert_eq!(ctx.depth(), 1);
        ctx.leave_scope().unwrap();
        assert!(ctx.leave_scope().is_err());
    }
}
