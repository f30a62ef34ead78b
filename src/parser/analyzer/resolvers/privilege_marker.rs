use tracing::trace;

use crate::parser::analyzer::{
    AnalysisContext, AnalyzerError, ColumnPosition, ColumnVar, JoinAliasColumn, RangeEntryKind, RelationExpander,
};

/// Records which entries and columns a query reads or writes.
pub struct PrivilegeMarker;

impl PrivilegeMarker {
    /// Mark a column (or, with `None`, the whole row) of an entry as read.
    ///
    /// Reads through a join are pushed into the leg the join column aliases;
    /// a merged `USING` column and a whole-row reference to a join mark both
    /// legs.
    pub fn mark_column(ctx: &mut AnalysisContext, levels_up: u32, slot: u32, position: Option<ColumnPosition>) -> Result<(), AnalyzerError> {
        let entry = ctx.entry_mut(levels_up, slot)?;
        match position {
            Some(pos) => {
                entry.selected_columns.insert(pos.attnum());
                if matches!(entry.kind, RangeEntryKind::BaseRelation { .. }) {
                    entry.requires_read = true;
                }
            }
            None => {
                entry.requires_read = true;
                let (_, positions) = RelationExpander::expose_columns(entry, false)?;
                for pos in positions {
                    entry.selected_columns.insert(pos.attnum());
                }
            }
        }
        trace!(entry = %entry.display_name, levels_up, slot, ?position, "marked for read");

        let RangeEntryKind::Join { left, right, merged_columns, .. } = &entry.kind else {
            return Ok(());
        };
        let targets: Vec<(u32, u32, Option<ColumnPosition>)> = match position {
            None => vec![(0, *left, None), (0, *right, None)],
            Some(ColumnPosition::User(n)) => match n.checked_sub(1).and_then(|i| merged_columns.get(i as usize)) {
                Some(JoinAliasColumn::Direct(var)) => vec![Self::target_of(var)],
                Some(JoinAliasColumn::Merged { left, right, .. }) => vec![Self::target_of(left), Self::target_of(right)],
                None => return AnalyzerError::internal(format!("join column {n} out of range")).err(),
            },
            Some(ColumnPosition::System(_)) => vec![],
        };
        for (var_levels, leg_slot, leg_pos) in targets {
            Self::mark_column(ctx, levels_up + var_levels, leg_slot, leg_pos)?;
        }
        Ok(())
    }

    fn target_of(var: &ColumnVar) -> (u32, u32, Option<ColumnPosition>) {
        (var.reference.levels_up, var.reference.entity_slot, var.reference.column_position)
    }

    pub fn mark_var(ctx: &mut AnalysisContext, var: &ColumnVar) -> Result<(), AnalyzerError> {
        let (levels_up, slot, position) = Self::target_of(var);
        Self::mark_column(ctx, levels_up, slot, position)
    }

    /// Mark a column as written, for INSERT/UPDATE targets.
    pub fn mark_written(ctx: &mut AnalysisContext, levels_up: u32, slot: u32, position: ColumnPosition) -> Result<(), AnalyzerError> {
        let entry = ctx.entry_mut(levels_up, slot)?;
        entry.written_columns.insert(position.attnum());
        trace!(entry = %entry.display_name, ?position, "marked for write");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::{ColumnInfo, DataType, MemoryCatalog},
        parser::ast::QualifiedName,
    };

    fn ctx_with_table(catalog: &MemoryCatalog) -> (AnalysisContext<'_>, u32) {
        let mut ctx = AnalysisContext::new(catalog);
        ctx.enter_child_scope();
        let id = ctx.catalog.lookup_relation(&QualifiedName::from("t")).unwrap();
        let entry = RelationExpander::base_relation(ctx.catalog.relation(id).unwrap(), None).unwrap();
        let slot = ctx.push_entry(entry).unwrap();
        (ctx, slot)
    }

    #[test]
    fn written_columns_are_kept_apart_from_reads() {
        let mut catalog = MemoryCatalog::new();
        catalog.create_table("t", vec![ColumnInfo::new("a", DataType::Integer), ColumnInfo::new("b", DataType::Text)]);
        let (mut ctx, slot) = ctx_with_table(&catalog);

        PrivilegeMarker::mark_written(&mut ctx, 0, slot, ColumnPosition::User(2)).unwrap();
        PrivilegeMarker::mark_column(&mut ctx, 0, slot, Some(ColumnPosition::User(1))).unwrap();

        let entry = ctx.entry(0, slot).unwrap();
        assert_eq!(entry.written_columns.iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(entry.selected_columns.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn writes_to_unknown_slots_fail() {
        let mut catalog = MemoryCatalog::new();
        catalog.create_table("t", vec![ColumnInfo::new("a", DataType::Integer)]);
        let (mut ctx, _) = ctx_with_table(&catalog);
        assert!(PrivilegeMarker::mark_written(&mut ctx, 0, 9, ColumnPosition::User(1)).is_err());
    }
}
