use tracing::{debug, instrument};

use crate::{
    database::{AnalyzerConfig, Catalog, DataType, TYPMOD_UNSPECIFIED},
    parser::{
        analyzer::{
            AnalysisContext, AnalyzedQuery, AnalyzerError, ColumnPosition, ColumnVar, CteResolver, ErrorKind, FromClauseResolver, OrderByResolver,
            OutputColumn, RelationExpander, ResolvedRef, SetOperationInfo, SortKey, TargetListResolver, TypedExpr,
        },
        ast::{QueryBody, SelectCore, SelectStmt, SetOperator},
    },
};

/// Drives analysis of one SELECT statement through the resolvers.
pub struct QueryAnalyzer;

impl QueryAnalyzer {
    /// Analyze a top-level statement against `catalog`.
    #[instrument(level = "debug", skip_all)]
    pub fn analyze(stmt: &SelectStmt, catalog: &dyn Catalog, config: AnalyzerConfig) -> Result<AnalyzedQuery, AnalyzerError> {
        let mut ctx = AnalysisContext::new(catalog).with_config(config);
        let query = Self::analyze_subquery(&mut ctx, stmt)?;
        debug!(entries = query.range_entries.len(), outputs = query.target_list.len(), "statement analyzed");
        Ok(query)
    }

    /// Analyze `stmt` one level below the current scope. The child scope is
    /// always popped, even when analysis fails.
    pub fn analyze_subquery(ctx: &mut AnalysisContext, stmt: &SelectStmt) -> Result<AnalyzedQuery, AnalyzerError> {
        ctx.enter_child_scope();
        let result = Self::analyze_block(ctx, stmt);
        let scope = ctx.leave_scope()?;
        let (target_list, criteria, sort_clause, set_operation) = result?;
        Ok(AnalyzedQuery::from_scope(scope, target_list, criteria, sort_clause, set_operation))
    }

    #[allow(clippy::type_complexity)]
    fn analyze_block(
        ctx: &mut AnalysisContext,
        stmt: &SelectStmt,
    ) -> Result<(Vec<OutputColumn>, Option<TypedExpr>, Vec<SortKey>, Option<SetOperationInfo>), AnalyzerError> {
        if let Some(with) = &stmt.with {
            CteResolver::transform_with_clause(ctx, with)?;
        }

        match &stmt.body {
            QueryBody::Select(core) => {
                let (mut target_list, criteria) = Self::analyze_core(ctx, core)?;
                let sort_clause = OrderByResolver::transform_sort_clause(ctx, &stmt.order_by, &mut target_list, false)?;
                TargetListResolver::mark_target_list_origins(ctx, &mut target_list)?;
                Ok((target_list, criteria, sort_clause, None))
            }
            QueryBody::SetOperation { op, all, left, right } => {
                let mut target_list = Self::analyze_set_operation(ctx, *op, left, right)?;
                let sort_clause = OrderByResolver::transform_sort_clause(ctx, &stmt.order_by, &mut target_list, true)?;
                Ok((target_list, None, sort_clause, Some(SetOperationInfo { op: *op, all: *all })))
            }
        }
    }

    fn analyze_core(ctx: &mut AnalysisContext, core: &SelectCore) -> Result<(Vec<OutputColumn>, Option<TypedExpr>), AnalyzerError> {
        FromClauseResolver::transform_from_clause(ctx, &core.from)?;
        let target_list = TargetListResolver::build_target_list(ctx, &core.targets)?;

        let criteria = match &core.criteria {
            Some(raw) => {
                let typed = ctx.transform(raw)?;
                let ty = typed.data_type();
                if !matches!(ty, DataType::Bool | DataType::Unknown) {
                    return AnalyzerError::fail(
                        ErrorKind::DatatypeMismatch,
                        format!("argument of WHERE must be type boolean, not type {ty}"),
                        raw.location(),
                    );
                }
                Some(typed)
            }
            None => None,
        };
        Ok((target_list, criteria))
    }

    /// Both arms become unnamed entries of this level; the outputs read
    /// through the left arm with the promoted types.
    fn analyze_set_operation(ctx: &mut AnalysisContext, op: SetOperator, left: &SelectStmt, right: &SelectStmt) -> Result<Vec<OutputColumn>, AnalyzerError> {
        let op_name = match op {
            SetOperator::Union => "UNION",
            SetOperator::Intersect => "INTERSECT",
            SetOperator::Except => "EXCEPT",
        };

        let left = Self::analyze_subquery(ctx, left)?;
        let right = Self::analyze_subquery(ctx, right)?;
        let left_columns: Vec<(String, DataType)> = left.visible_outputs().map(|c| (c.name().to_string(), c.expression.data_type())).collect();
        let right_types: Vec<DataType> = right.visible_outputs().map(|c| c.expression.data_type()).collect();
        if left_columns.len() != right_types.len() {
            return AnalyzerError::fail(
                ErrorKind::SetOperationMismatch,
                format!("each {op_name} query must have the same number of columns"),
                None,
            );
        }

        let left_slot = ctx.push_entry(RelationExpander::set_operation_arm(left, "*SELECT* 1"))?;
        ctx.push_entry(RelationExpander::set_operation_arm(right, "*SELECT* 2"))?;

        let mut target_list = Vec::with_capacity(left_columns.len());
        for (i, ((name, left_ty), right_ty)) in left_columns.into_iter().zip(right_types).enumerate() {
            let ty = DataType::promote(&left_ty, &right_ty).ok_or_else(|| {
                AnalyzerError::new(ErrorKind::DatatypeMismatch, format!("{op_name} types {left_ty} and {right_ty} cannot be matched"))
            })?;
            let var = ColumnVar {
                reference: ResolvedRef::column(0, left_slot, ColumnPosition::User(i as u32 + 1)),
                ty,
                typmod: TYPMOD_UNSPECIFIED,
                location: None,
            };
            target_list.push(TargetListResolver::make_output_column(ctx, TypedExpr::Column(var), Some(name), false)?);
        }
        debug!(op = op_name, columns = target_list.len(), "set operation analyzed");
        Ok(target_list)
    }
}
