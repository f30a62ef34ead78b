use std::sync::Arc;

use tracing::debug;

use crate::parser::{
    analyzer::{AnalysisContext, AnalyzedQuery, AnalyzerError, CteDef, DeclaredColumn, ErrorKind, QueryAnalyzer},
    ast::{CommonTableExpr, QueryBody, SetOperator, WithClause},
};

pub struct CteResolver;

impl CteResolver {
    /// Analyze a WITH clause into the current level's CTE namespace.
    ///
    /// Without RECURSIVE each item sees only the items before it. With
    /// RECURSIVE an item may also reference itself, provided it is a UNION
    /// whose left arm fixes the column shape.
    pub fn transform_with_clause(ctx: &mut AnalysisContext, with: &WithClause) -> Result<(), AnalyzerError> {
        let names: Vec<String> = with.ctes.iter().map(|c| ctx.config.identifier(&c.name)).collect();
        for (i, (cte, name)) in with.ctes.iter().zip(&names).enumerate() {
            if names[i + 1..].contains(name) {
                return AnalyzerError::fail(
                    ErrorKind::DuplicateAlias,
                    format!("WITH query name \"{name}\" specified more than once"),
                    cte.location,
                );
            }
        }

        ctx.scope_mut()?.future_ctes = with.ctes
            .iter()
            .zip(&names)
            .map(|(cte, name)| Arc::new(CteDef::pending(name, &cte.column_aliases, with.recursive, cte.location)))
            .collect();

        for (cte, name) in with.ctes.iter().zip(&names) {
            ctx.scope_mut()?.future_ctes.remove(0);
            let definition = if with.recursive {
                Self::analyze_recursive(ctx, cte, name)?
            } else {
                let query = QueryAnalyzer::analyze_subquery(ctx, &cte.query)?;
                Self::finished(name, cte, false, query)?
            };
            debug!(cte = %definition.name, recursive = with.recursive, "WITH query analyzed");
            ctx.scope_mut()?.cte_namespace.push(Arc::new(definition));
        }
        Ok(())
    }

    fn analyze_recursive(ctx: &mut AnalysisContext, cte: &CommonTableExpr, name: &str) -> Result<CteDef, AnalyzerError> {
        let pending = CteDef::pending(name, &cte.column_aliases, true, cte.location);
        let index = {
            let scope = ctx.scope_mut()?;
            scope.cte_namespace.push(Arc::new(pending.clone()));
            scope.cte_namespace.len() - 1
        };

        // the non-recursive arm decides the column shape seen by self references
        if let QueryBody::SetOperation { op: SetOperator::Union, left, .. } = &cte.query.body {
            let arm = QueryAnalyzer::analyze_subquery(ctx, left)?;
            let shaped = CteDef { columns: Some(Self::declared_columns(name, cte, &arm)?), ..pending };
            ctx.scope_mut()?.cte_namespace[index] = Arc::new(shaped);
        }

        let result = QueryAnalyzer::analyze_subquery(ctx, &cte.query);
        let shaped = ctx.scope_mut()?.cte_namespace.remove(index);
        let query = result?;
        let finished = Self::finished(name, cte, true, query)?;

        if let Some(shape) = &shaped.columns {
            for (i, (before, after)) in shape.iter().zip(finished.columns.iter().flatten()).enumerate() {
                if before.ty != after.ty {
                    return AnalyzerError::new(
                        ErrorKind::DatatypeMismatch,
                        format!(
                            "recursive query \"{name}\" column {} has type {} in non-recursive term but type {} overall",
                            i + 1,
                            before.ty,
                            after.ty
                        ),
                    )
                    .with_hint("Cast the output of the non-recursive term to the correct type.")
                    .at(cte.location)
                    .err();
                }
            }
        }
        Ok(finished)
    }

    fn finished(name: &str, cte: &CommonTableExpr, recursive: bool, query: AnalyzedQuery) -> Result<CteDef, AnalyzerError> {
        let columns = Self::declared_columns(name, cte, &query)?;
        Ok(CteDef {
            name: name.to_string(),
            column_aliases: cte.column_aliases.clone(),
            recursive,
            columns: Some(columns),
            query: Some(Arc::new(query)),
            location: cte.location,
        })
    }

    /// Output columns of a CTE body, renamed by the alias list.
    fn declared_columns(name: &str, cte: &CommonTableExpr, query: &AnalyzedQuery) -> Result<Vec<DeclaredColumn>, AnalyzerError> {
        let outputs: Vec<_> = query.visible_outputs().collect();
        if cte.column_aliases.len() > outputs.len() {
            return AnalyzerError::fail(
                ErrorKind::ColumnAliasMismatch,
                format!("WITH query \"{name}\" has {} columns available but {} columns specified", outputs.len(), cte.column_aliases.len()),
                cte.location,
            );
        }
        Ok(outputs
            .iter()
            .enumerate()
            .map(|(i, out)| {
                let column_name = cte.column_aliases.get(i).map(String::as_str).unwrap_or(out.name());
                DeclaredColumn::new(column_name, out.expression.data_type(), out.expression.typmod())
            })
            .collect())
    }
}
