use std::sync::Arc;

use tracing::trace;

use crate::{
    database::RelationId,
    parser::{
        analyzer::{AnalysisContext, AnalyzerError, CteDef, DiagnosticResolver, ErrorKind, NamespaceItem, RangeEntry, Scope},
        ast::QualifiedName,
    },
};

/// Location of a table-like entry in the scope chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMatch {
    pub levels_up: u32,
    pub slot: u32,
}

pub struct TableResolver;

impl TableResolver {
    fn lateral_error(entry: &RangeEntry, location: Option<usize>) -> AnalyzerError {
        AnalyzerError::new(
            ErrorKind::InvalidLateralReference,
            format!("invalid reference to FROM-clause entry for table \"{}\"", entry.display_name),
        )
        .with_detail("The combining JOIN type must be INNER or LEFT for a LATERAL reference.")
        .at(location)
    }

    /// Scan one level's table namespace with `matches`, applying the
    /// ambiguity and lateral rules.
    fn scan_namespace(
        scope: &Scope,
        location: Option<usize>,
        describe: &str,
        matches: impl Fn(&RangeEntry) -> bool,
    ) -> Result<Option<u32>, AnalyzerError> {
        let mut result: Option<u32> = None;
        for item in &scope.table_namespace {
            if item.lateral_only && !scope.lateral_active {
                continue;
            }
            let Some(entry) = scope.entry(item.slot) else { continue };
            if !matches(entry) {
                continue;
            }
            if result.is_some() {
                return AnalyzerError::fail(
                    ErrorKind::AmbiguousReference,
                    format!("table reference \"{describe}\" is ambiguous"),
                    location,
                );
            }
            if item.lateral_only && !item.lateral_ok {
                return Err(Self::lateral_error(entry, location));
            }
            result = Some(item.slot);
        }
        Ok(result)
    }

    fn scan_for_refname(scope: &Scope, name: &str, location: Option<usize>) -> Result<Option<u32>, AnalyzerError> {
        Self::scan_namespace(scope, location, name, |e| e.display_name == name)
    }

    /// Only unaliased base relations match by identity.
    fn scan_for_relid(scope: &Scope, relid: RelationId, describe: &str, location: Option<usize>) -> Result<Option<u32>, AnalyzerError> {
        Self::scan_namespace(scope, location, describe, |e| e.is_unaliased_relation(relid))
    }

    /// Find a table by (optionally schema-qualified) name, innermost level
    /// first. `Ok(None)` when nothing visible matches.
    pub fn find_table(ctx: &AnalysisContext, schema: Option<&str>, name: &str, location: Option<usize>) -> Result<Option<TableMatch>, AnalyzerError> {
        let relid = match schema {
            Some(schema) => {
                let qualified = QualifiedName::new(vec![schema.to_string(), name.to_string()]);
                match ctx.catalog.lookup_relation(&qualified) {
                    Some(id) => Some(id),
                    None => return Ok(None),
                }
            }
            None => None,
        };

        for levels_up in 0..ctx.depth() as u32 {
            let scope = ctx.scope_at(levels_up)?;
            let found = match relid {
                Some(id) => Self::scan_for_relid(scope, id, &format!("{}.{name}", schema.unwrap_or_default()), location)?,
                None => Self::scan_for_refname(scope, name, location)?,
            };
            if let Some(slot) = found {
                trace!(name, levels_up, slot, "table resolved");
                return Ok(Some(TableMatch { levels_up, slot }));
            }
        }
        Ok(None)
    }

    /// Like [`TableResolver::find_table`], failing with a diagnostic when nothing matches.
    pub fn resolve_table(ctx: &AnalysisContext, schema: Option<&str>, name: &str, location: Option<usize>) -> Result<TableMatch, AnalyzerError> {
        match Self::find_table(ctx, schema, name, location)? {
            Some(found) => Ok(found),
            None => Err(DiagnosticResolver::missing_table_error(ctx, schema, name, location)),
        }
    }

    /// Visible CTE by name, with the number of levels up to its WITH clause.
    pub fn find_cte(ctx: &AnalysisContext, name: &str) -> Option<(Arc<CteDef>, u32)> {
        ctx.scopes.iter().rev().enumerate().find_map(|(levels_up, scope)| {
            scope.cte_namespace
                .iter()
                .find(|def| def.name == name)
                .map(|def| (Arc::clone(def), levels_up as u32))
        })
    }

    pub fn is_future_cte(ctx: &AnalysisContext, name: &str) -> bool {
        ctx.scopes.iter().any(|s| s.future_ctes.iter().any(|def| def.name == name))
    }

    /// Two FROM items at one level may not share a name, except two
    /// unaliased relations that are different catalog objects.
    pub fn check_namespace_conflicts(scope: &Scope, existing: &[NamespaceItem], added: &[NamespaceItem]) -> Result<(), AnalyzerError> {
        for a in existing {
            let Some(first) = scope.entry(a.slot) else { continue };
            for b in added {
                let Some(second) = scope.entry(b.slot) else { continue };
                if first.display_name != second.display_name {
                    continue;
                }
                let distinct_relations = match (first.relation_id(), second.relation_id()) {
                    (Some(x), Some(y)) => first.alias.is_none() && second.alias.is_none() && x != y,
                    _ => false,
                };
                if distinct_relations {
                    continue;
                }
                return AnalyzerError::new(
                    ErrorKind::DuplicateAlias,
                    format!("table name \"{}\" specified more than once", first.display_name),
                ).err();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::{ColumnInfo, DataType, MemoryCatalog},
        parser::{analyzer::RelationExpander, ast::Alias},
    };

    fn push_table(ctx: &mut AnalysisContext, name: &str, alias: Option<&str>) -> u32 {
        let id = ctx.catalog.lookup_relation(&QualifiedName::from(name)).unwrap();
        let schema = ctx.catalog.relation(id).unwrap();
        let alias = alias.map(Alias::new);
        let entry = RelationExpander::base_relation(schema, alias.as_ref()).unwrap();
        let slot = ctx.push_entry(entry).unwrap();
        ctx.push_namespace(slot, true, true, true).unwrap();
        slot
    }

    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.create_table("t1", vec![ColumnInfo::new("a", DataType::Integer)]);
        catalog.create_table("t2", vec![ColumnInfo::new("a", DataType::Integer)]);
        catalog
    }

    #[test]
    fn unique_name_resolves_to_its_entry() {
        let catalog = catalog();
        let mut ctx = AnalysisContext::new(&catalog);
        ctx.enter_child_scope();
        push_table(&mut ctx, "t1", None);
        let slot = push_table(&mut ctx, "t2", None);

        let found = TableResolver::resolve_table(&ctx, None, "t2", None).unwrap();
        assert_eq!(found, TableMatch { levels_up: 0, slot });
    }

    #[test]
    fn same_level_duplicates_are_ambiguous() {
        let catalog = catalog();
        let mut ctx = AnalysisContext::new(&catalog);
        ctx.enter_child_scope();
        push_table(&mut ctx, "t1", Some("x"));
        push_table(&mut ctx, "t2", Some("x"));

        let err = TableResolver::resolve_table(&ctx, None, "x", None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousReference);
        assert_eq!(err.message, "table reference \"x\" is ambiguous");
    }

    #[test]
    fn innermost_level_wins() {
        let catalog = catalog();
        let mut ctx = AnalysisContext::new(&catalog);
        ctx.enter_child_scope();
        push_table(&mut ctx, "t1", Some("x"));
        ctx.enter_child_scope();
        push_table(&mut ctx, "t2", Some("x"));

        let found = TableResolver::resolve_table(&ctx, None, "x", None).unwrap();
        assert_eq!(found.levels_up, 0);
        let found = TableResolver::resolve_table(&ctx, None, "t1", None);
        assert!(found.is_err());
    }

    #[test]
    fn qualified_lookup_ignores_aliased_entries() {
        let catalog = catalog();
        let mut ctx = AnalysisContext::new(&catalog);
        ctx.enter_child_scope();
        push_table(&mut ctx, "t1", Some("x"));
        assert_eq!(TableResolver::find_table(&ctx, Some("public"), "t1", None).unwrap(), None);

        let slot = push_table(&mut ctx, "t2", None);
        let found = TableResolver::find_table(&ctx, Some("public"), "t2", None).unwrap();
        assert_eq!(found, Some(TableMatch { levels_up: 0, slot }));
    }

    #[test]
    fn lateral_only_items_are_hidden_unless_lateral_is_active() {
        let catalog = catalog();
        let mut ctx = AnalysisContext::new(&catalog);
        ctx.enter_child_scope();
        let slot = push_table(&mut ctx, "t1", None);
        ctx.scope_mut().unwrap().set_lateral_state(&[slot], true, false);

        assert_eq!(TableResolver::find_table(&ctx, None, "t1", None).unwrap(), None);

        ctx.scope_mut().unwrap().lateral_active = true;
        let err = TableResolver::find_table(&ctx, None, "t1", None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidLateralReference);
    }

    #[test]
    fn namespace_conflicts() {
        let mut catalog = MemoryCatalog::new();
        catalog.create_relation("public", "t", crate::database::RelationKind::Table, vec![]);
        catalog.create_relation("other", "t", crate::database::RelationKind::Table, vec![]);
        let mut ctx = AnalysisContext::new(&catalog);
        ctx.enter_child_scope();

        let public_t = ctx.catalog.lookup_relation(&QualifiedName::from("public.t")).unwrap();
        let other_t = ctx.catalog.lookup_relation(&QualifiedName::from("other.t")).unwrap();
        for id in [public_t, other_t, public_t] {
            let entry = RelationExpander::base_relation(ctx.catalog.relation(id).unwrap(), None).unwrap();
            ctx.push_entry(entry).unwrap();
        }
        let scope = ctx.scope().unwrap();
        let item = NamespaceItem::visible;

        assert!(TableResolver::check_namespace_conflicts(scope, &[item(1)], &[item(2)]).is_ok());
        let err = TableResolver::check_namespace_conflicts(scope, &[item(1)], &[item(3)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateAlias);
        assert_eq!(err.message, "table name \"t\" specified more than once");
    }
}
