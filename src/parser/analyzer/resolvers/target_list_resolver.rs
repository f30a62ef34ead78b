use tracing::debug;

use crate::parser::{
    analyzer::{
        AnalysisContext, AnalyzerError, ColumnNamer, ColumnOrigin, ColumnVar, JoinAliasColumn, OutputColumn, RangeEntryKind,
        TypedExpr, WildcardResolver,
    },
    ast::ResTarget,
};

pub struct TargetListResolver;

impl TargetListResolver {
    /// Transform a select list. Wildcards are spliced in place; every other
    /// item keeps its alias or gets a figured name.
    pub fn build_target_list(ctx: &mut AnalysisContext, targets: &[ResTarget]) -> Result<Vec<OutputColumn>, AnalyzerError> {
        let mut output = Vec::with_capacity(targets.len());
        for target in targets {
            if let Some(fields) = WildcardResolver::expand_target_star(ctx, &target.expr)? {
                for field in fields {
                    output.push(Self::make_output_column(ctx, field.expr, Some(field.name), false)?);
                }
                continue;
            }

            let expr = ctx.transform(&target.expr)?;
            let name = match &target.alias {
                Some(alias) => ctx.config.identifier(alias),
                None => ctx.config.identifier(&ColumnNamer::figure_name(&target.expr, Some(&expr), &ctx.config)),
            };
            output.push(Self::make_output_column(ctx, expr, Some(name), false)?);
        }
        debug!(columns = output.len(), "built target list");
        Ok(output)
    }

    /// Wrap an expression as the next output column of the current level.
    pub fn make_output_column(ctx: &mut AnalysisContext, expression: TypedExpr, display_name: Option<String>, is_hidden: bool) -> Result<OutputColumn, AnalyzerError> {
        let scope = ctx.scope_mut()?;
        let position = scope.next_output_position;
        scope.next_output_position += 1;
        Ok(OutputColumn { expression, position, display_name, is_hidden, origin: None })
    }

    /// Record, for every output column that is a plain column reference, the
    /// base table column it ultimately reads.
    pub fn mark_target_list_origins(ctx: &AnalysisContext, target_list: &mut [OutputColumn]) -> Result<(), AnalyzerError> {
        for column in target_list.iter_mut() {
            if let TypedExpr::Column(var) = &column.expression {
                column.origin = Self::origin_of(ctx, var, 0)?;
            }
        }
        Ok(())
    }

    fn origin_of(ctx: &AnalysisContext, var: &ColumnVar, extra_levels: u32) -> Result<Option<ColumnOrigin>, AnalyzerError> {
        let levels_up = var.reference.levels_up + extra_levels;
        let entry = ctx.entry(levels_up, var.reference.entity_slot)?;
        let position = var.reference.column_position;

        let origin = match (&entry.kind, position) {
            (RangeEntryKind::BaseRelation { schema }, _) => Some(ColumnOrigin {
                relation: schema.id,
                column: position.map(|p| p.attnum()).unwrap_or(0),
            }),
            (RangeEntryKind::Subquery { query }, Some(p)) => query.output_at(p.attnum() as u32).and_then(|c| c.origin),
            (RangeEntryKind::CteReference { definition, self_reference: false, .. }, Some(p)) => definition.query
                .as_ref()
                .and_then(|q| q.output_at(p.attnum() as u32))
                .and_then(|c| c.origin),
            (RangeEntryKind::Join { merged_columns, .. }, Some(p)) => {
                match (p.attnum() as usize).checked_sub(1).and_then(|i| merged_columns.get(i)) {
                    Some(JoinAliasColumn::Direct(leg)) => return Self::origin_of(ctx, leg, levels_up),
                    _ => None,
                }
            }
            _ => None,
        };
        Ok(origin)
    }
}
