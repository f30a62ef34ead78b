use tracing::trace;

use crate::parser::{
    analyzer::{AnalysisContext, AnalyzerError, ErrorKind, OutputColumn, SortKey, TargetListResolver},
    ast::{Literal, NameField, RawExpr, SortBy},
};

pub struct OrderByResolver;

impl OrderByResolver {
    /// Resolve ORDER BY items against the target list.
    ///
    /// A bare name matches an output column first, an integer constant is a
    /// position, and anything else is transformed as an expression. Over a
    /// set operation only the first two forms are allowed. Expressions not
    /// already in the list are appended as hidden columns.
    pub fn transform_sort_clause(ctx: &mut AnalysisContext, sort_by: &[SortBy], target_list: &mut Vec<OutputColumn>, set_operation: bool) -> Result<Vec<SortKey>, AnalyzerError> {
        let mut keys = Vec::with_capacity(sort_by.len());
        for item in sort_by {
            let position = Self::find_target(ctx, &item.expr, target_list, set_operation)?;
            trace!(position, descending = item.descending, "sort key");
            keys.push(SortKey { position, descending: item.descending });
        }
        Ok(keys)
    }

    fn find_target(ctx: &mut AnalysisContext, expr: &RawExpr, target_list: &mut Vec<OutputColumn>, set_operation: bool) -> Result<u32, AnalyzerError> {
        if let RawExpr::ColumnRef { fields, location } = expr {
            if let [NameField::Name(name)] = fields.as_slice() {
                let name = ctx.config.identifier(name);
                let mut found: Option<&OutputColumn> = None;
                for column in target_list.iter().filter(|c| !c.is_hidden && c.display_name.as_deref() == Some(name.as_str())) {
                    match found {
                        Some(first) if !first.expression.same_as(&column.expression) => {
                            return AnalyzerError::fail(ErrorKind::AmbiguousReference, format!("ORDER BY \"{name}\" is ambiguous"), *location);
                        }
                        Some(_) => {}
                        None => found = Some(column),
                    }
                }
                if let Some(column) = found {
                    return Ok(column.position);
                }
            }
        }

        match expr {
            RawExpr::Literal(Literal::Int(n)) => {
                let visible: Vec<u32> = target_list.iter().filter(|c| !c.is_hidden).map(|c| c.position).collect();
                return usize::try_from(*n)
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| visible.get(i).copied())
                    .ok_or_else(|| AnalyzerError::new(ErrorKind::InvalidReference, format!("ORDER BY position {n} is not in select list")));
            }
            RawExpr::Literal(_) => {
                return AnalyzerError::new(ErrorKind::InvalidReference, "non-integer constant in ORDER BY").err();
            }
            _ => {}
        }

        if set_operation {
            return AnalyzerError::new(ErrorKind::InvalidReference, "invalid UNION/INTERSECT/EXCEPT ORDER BY clause")
                .with_detail("Only result column names can be used, not expressions or functions.")
                .at(expr.location())
                .err();
        }

        let typed = ctx.transform(expr)?;
        if let Some(column) = target_list.iter().find(|c| c.expression.same_as(&typed)) {
            return Ok(column.position);
        }
        let hidden = TargetListResolver::make_output_column(ctx, typed, None, true)?;
        let position = hidden.position;
        target_list.push(hidden);
        Ok(position)
    }
}
