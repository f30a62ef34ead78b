use tracing::debug;

use crate::{
    database::{DataType, TYPMOD_UNSPECIFIED},
    parser::{
        analyzer::{
            AnalysisContext, AnalyzerError, ColumnVar, ErrorKind, JoinAliasColumn, NamespaceItem, PrivilegeMarker, QueryAnalyzer,
            RangeEntry, RelationExpander, ResolvedRef, TableResolver, TypedExpr,
        },
        ast::{Alias, FromItem, JoinExpr, JoinQuals, JoinType, QualifiedName, RawExpr},
    },
};

/// Namespace contribution of one FROM item.
#[derive(Debug, Default)]
struct ItemNamespace {
    table: Vec<NamespaceItem>,
    column: Vec<NamespaceItem>,
}

impl ItemNamespace {
    fn both(slot: u32) -> Self {
        Self { table: vec![NamespaceItem::visible(slot)], column: vec![NamespaceItem::visible(slot)] }
    }

    fn set_lateral_state(&mut self, lateral_only: bool, lateral_ok: bool) {
        for item in self.table.iter_mut().chain(self.column.iter_mut()) {
            item.lateral_only = lateral_only;
            item.lateral_ok = lateral_ok;
        }
    }
}

/// One leg column of a join: its name and a reference to it.
struct LegColumn {
    name: String,
    var: ColumnVar,
}

pub struct FromClauseResolver;

impl FromClauseResolver {
    /// Add every FROM item to the current level.
    ///
    /// While an item is analyzed the items before it are visible only to
    /// LATERAL references; once the whole list is done they all become
    /// plainly visible.
    pub fn transform_from_clause(ctx: &mut AnalysisContext, items: &[FromItem]) -> Result<(), AnalyzerError> {
        for item in items {
            let (slot, mut namespace) = Self::transform_from_item(ctx, item)?;
            {
                let scope = ctx.scope()?;
                TableResolver::check_namespace_conflicts(scope, &scope.table_namespace, &namespace.table)?;
            }
            namespace.set_lateral_state(true, true);

            let scope = ctx.scope_mut()?;
            scope.join_list.push(slot);
            scope.table_namespace.extend(namespace.table);
            scope.column_namespace.extend(namespace.column);
        }
        ctx.scope_mut()?.clear_lateral_state();
        Ok(())
    }

    /// Identifier-normalized copy of a user alias.
    fn normalize_alias(ctx: &AnalysisContext, alias: Option<&Alias>) -> Option<Alias> {
        alias.map(|a| Alias {
            name: ctx.config.identifier(&a.name),
            columns: a.columns.iter().map(|c| ctx.config.identifier(c)).collect(),
        })
    }

    /// Returns the top slot of the item and what it makes visible.
    fn transform_from_item(ctx: &mut AnalysisContext, item: &FromItem) -> Result<(u32, ItemNamespace), AnalyzerError> {
        match item {
            FromItem::Table { name, alias, location } => {
                let alias = Self::normalize_alias(ctx, alias.as_ref());
                let entry = Self::table_entry(ctx, name, alias.as_ref(), *location)?;
                let slot = ctx.push_entry(entry)?;
                Ok((slot, ItemNamespace::both(slot)))
            }
            FromItem::Subquery { query, alias, lateral } => {
                let Some(alias) = Self::normalize_alias(ctx, alias.as_ref()) else {
                    return AnalyzerError::new(ErrorKind::InvalidReference, "subquery in FROM must have an alias")
                        .with_hint("For example, FROM (SELECT ...) [AS] foo.")
                        .err();
                };
                let analyzed = Self::with_lateral(ctx, *lateral, |ctx| QueryAnalyzer::analyze_subquery(ctx, query))?;
                let entry = RelationExpander::subquery(analyzed, &alias, *lateral)?;
                let slot = ctx.push_entry(entry)?;
                Ok((slot, ItemNamespace::both(slot)))
            }
            FromItem::Function { call, alias, column_defs, lateral } => {
                let alias = Self::normalize_alias(ctx, alias.as_ref());
                // function arguments may always reference earlier FROM items
                let typed = Self::with_lateral(ctx, true, |ctx| ctx.transform(&RawExpr::FuncCall(call.clone())))?;
                let function = ctx
                    .catalog
                    .lookup_function(&call.name)
                    .ok_or_else(|| AnalyzerError::internal(format!("function {} vanished from the catalog", call.name)))?;
                let entry = RelationExpander::set_function(ctx, typed, function, alias.as_ref(), column_defs, *lateral)?;
                let slot = ctx.push_entry(entry)?;
                Ok((slot, ItemNamespace::both(slot)))
            }
            FromItem::Values { rows, alias } => {
                let alias = Self::normalize_alias(ctx, alias.as_ref());
                let mut typed_rows = Vec::with_capacity(rows.len());
                for row in rows {
                    let typed: Result<Vec<_>, _> = row.iter().map(|value| ctx.transform(value)).collect();
                    typed_rows.push(typed?);
                }
                let entry = RelationExpander::values(typed_rows, alias.as_ref())?;
                let slot = ctx.push_entry(entry)?;
                Ok((slot, ItemNamespace::both(slot)))
            }
            FromItem::Join(join) => Self::transform_join(ctx, join),
        }
    }

    fn with_lateral<T>(
        ctx: &mut AnalysisContext,
        lateral: bool,
        f: impl FnOnce(&mut AnalysisContext) -> Result<T, AnalyzerError>,
    ) -> Result<T, AnalyzerError> {
        let saved = std::mem::replace(&mut ctx.scope_mut()?.lateral_active, lateral);
        let result = f(ctx);
        ctx.scope_mut()?.lateral_active = saved;
        result
    }

    /// Table name in FROM: a visible CTE when unqualified, else a catalog relation.
    fn table_entry(ctx: &AnalysisContext, name: &QualifiedName, alias: Option<&Alias>, location: Option<usize>) -> Result<RangeEntry, AnalyzerError> {
        let name = &Self::normalize_relation_name(ctx, name, location)?;
        if name.len() == 1 {
            if let Some((definition, levels_above)) = TableResolver::find_cte(ctx, name.name()) {
                return RelationExpander::cte_reference(definition, levels_above, alias).map_err(|e| e.at(location));
            }
        }

        let Some(id) = ctx.catalog.lookup_relation(name) else {
            let error = AnalyzerError::new(ErrorKind::EntityNotFound, format!("relation \"{name}\" does not exist")).at(location);
            if name.len() == 1 && TableResolver::is_future_cte(ctx, name.name()) {
                return error
                    .with_detail(format!("There is a WITH item named \"{}\", but it cannot be referenced from this part of the query.", name.name()))
                    .with_hint("Use WITH RECURSIVE, or re-order the WITH items to remove forward references.")
                    .err();
            }
            return Err(error);
        };
        let schema = ctx
            .catalog
            .relation(id)
            .ok_or_else(|| AnalyzerError::internal(format!("cache lookup failed for relation {id}")))?;
        RelationExpander::base_relation(schema, alias)
    }

    /// Truncated `[catalog.][schema.]name`; the catalog part must be the
    /// current database.
    fn normalize_relation_name(ctx: &AnalysisContext, name: &QualifiedName, location: Option<usize>) -> Result<QualifiedName, AnalyzerError> {
        if name.len() > 3 {
            return AnalyzerError::fail(
                ErrorKind::QualifiedNameTooLong,
                format!("improper qualified name (too many dotted names): {name}"),
                location,
            );
        }
        if let Some(catalog) = name.catalog() {
            if catalog != ctx.config.current_database {
                return AnalyzerError::fail(
                    ErrorKind::CrossDatabaseReference,
                    format!("cross-database references are not implemented: {name}"),
                    location,
                );
            }
        }
        Ok(QualifiedName::new(name.parts.iter().map(|p| ctx.config.identifier(p)).collect()))
    }

    fn leg_columns(ctx: &AnalysisContext, slot: u32) -> Result<Vec<LegColumn>, AnalyzerError> {
        let entry = ctx.entry(0, slot)?;
        RelationExpander::exposed_fields(entry, false)?
            .into_iter()
            .map(|field| {
                Ok(LegColumn {
                    var: ColumnVar { reference: ResolvedRef::column(0, slot, field.position), ty: field.ty, typmod: field.typmod, location: None },
                    name: field.name,
                })
            })
            .collect()
    }

    fn transform_join(ctx: &mut AnalysisContext, join: &JoinExpr) -> Result<(u32, ItemNamespace), AnalyzerError> {
        let (left_slot, mut left_ns) = Self::transform_from_item(ctx, &join.left)?;

        // the right side sees the left side only through LATERAL
        left_ns.set_lateral_state(true, join.kind.allows_lateral());
        let (saved_tables, saved_columns) = {
            let scope = ctx.scope_mut()?;
            let saved = (scope.table_namespace.len(), scope.column_namespace.len());
            scope.table_namespace.extend(left_ns.table.iter().copied());
            scope.column_namespace.extend(left_ns.column.iter().copied());
            saved
        };
        let right = Self::transform_from_item(ctx, &join.right);
        {
            let scope = ctx.scope_mut()?;
            scope.table_namespace.truncate(saved_tables);
            scope.column_namespace.truncate(saved_columns);
        }
        let (right_slot, right_ns) = right?;
        TableResolver::check_namespace_conflicts(ctx.scope()?, &left_ns.table, &right_ns.table)?;

        let mut namespace = ItemNamespace {
            table: left_ns.table.into_iter().chain(right_ns.table).collect(),
            column: left_ns.column.into_iter().chain(right_ns.column).collect(),
        };
        namespace.set_lateral_state(false, true);

        let mut left_cols = Self::leg_columns(ctx, left_slot)?;
        let mut right_cols = Self::leg_columns(ctx, right_slot)?;

        let using = match &join.quals {
            JoinQuals::Using(names) => Some(names.iter().map(|n| ctx.config.identifier(n)).collect::<Vec<_>>()),
            JoinQuals::Natural => Some(
                left_cols
                    .iter()
                    .filter(|l| right_cols.iter().any(|r| r.name == l.name))
                    .map(|l| l.name.clone())
                    .collect(),
            ),
            JoinQuals::On(_) | JoinQuals::None => None,
        };

        let mut names = Vec::new();
        let mut columns = Vec::new();
        let mut quals = None;
        if let Some(using) = using {
            for name in &using {
                if names.contains(name) {
                    return AnalyzerError::new(ErrorKind::DuplicateAlias, format!("column name \"{name}\" appears more than once in USING clause")).err();
                }
                let l = Self::take_using_column(&mut left_cols, name, "left")?;
                let r = Self::take_using_column(&mut right_cols, name, "right")?;
                PrivilegeMarker::mark_var(ctx, &l)?;
                PrivilegeMarker::mark_var(ctx, &r)?;

                let equality = TypedExpr::Op {
                    op: "=".to_string(),
                    left: Box::new(TypedExpr::Column(l.clone())),
                    right: Box::new(TypedExpr::Column(r.clone())),
                    ty: DataType::Bool,
                };
                quals = Some(match quals {
                    None => equality,
                    Some(prev) => TypedExpr::Op { op: "AND".to_string(), left: Box::new(prev), right: Box::new(equality), ty: DataType::Bool },
                });
                names.push(name.clone());
                columns.push(Self::merged_column(join.kind, l, r)?);
            }
        } else if let JoinQuals::On(condition) = &join.quals {
            quals = Some(Self::transform_on_clause(ctx, condition, &namespace)?);
        }

        for leg in left_cols.into_iter().chain(right_cols) {
            names.push(leg.name);
            columns.push(JoinAliasColumn::Direct(leg.var));
        }

        let alias = Self::normalize_alias(ctx, join.alias.as_ref());
        let entry = RelationExpander::join(join.kind, (left_slot, right_slot), names, columns, quals, alias.as_ref())?;
        let join_slot = ctx.push_entry(entry)?;
        debug!(join_slot, left_slot, right_slot, kind = ?join.kind, "added join");

        // an alias hides the legs entirely; otherwise they stay reachable by
        // table name only
        let namespace = match alias {
            Some(_) => ItemNamespace::both(join_slot),
            None => ItemNamespace { table: namespace.table, column: vec![NamespaceItem::visible(join_slot)] },
        };
        Ok((join_slot, namespace))
    }

    /// Remove the one column named `name` from a leg's remaining columns.
    fn take_using_column(columns: &mut Vec<LegColumn>, name: &str, side: &str) -> Result<ColumnVar, AnalyzerError> {
        let mut matches = columns.iter().enumerate().filter(|(_, c)| c.name == name).map(|(i, _)| i);
        let Some(index) = matches.next() else {
            return AnalyzerError::new(ErrorKind::ColumnNotFound, format!("column \"{name}\" specified in USING clause does not exist in {side} table")).err();
        };
        if matches.next().is_some() {
            return AnalyzerError::new(ErrorKind::AmbiguousReference, format!("common column name \"{name}\" appears more than once in {side} table")).err();
        }
        Ok(columns.remove(index).var)
    }

    /// Output column for a `USING` pair. A leg whose type already is the
    /// common type can stand for the pair unless both sides may be null.
    fn merged_column(kind: JoinType, left: ColumnVar, right: ColumnVar) -> Result<JoinAliasColumn, AnalyzerError> {
        let ty = DataType::promote(&left.ty, &right.ty).ok_or_else(|| {
            AnalyzerError::new(ErrorKind::DatatypeMismatch, format!("JOIN/USING types {} and {} cannot be matched", left.ty, right.ty))
        })?;
        let left_fits = left.ty == ty;
        let right_fits = right.ty == ty;
        Ok(match kind {
            JoinType::Inner | JoinType::Cross if left_fits => JoinAliasColumn::Direct(left),
            JoinType::Inner | JoinType::Cross if right_fits => JoinAliasColumn::Direct(right),
            JoinType::Left if left_fits => JoinAliasColumn::Direct(left),
            JoinType::Right if right_fits => JoinAliasColumn::Direct(right),
            // a leg that would need a coercion is merged instead of cast;
            // the join already marked both legs
            _ => {
                let typmod = if left.typmod == right.typmod { left.typmod } else { TYPMOD_UNSPECIFIED };
                JoinAliasColumn::Merged { left, right, ty, typmod }
            }
        })
    }

    /// `ON` sees exactly the two legs of its join (plus outer levels).
    fn transform_on_clause(ctx: &mut AnalysisContext, condition: &RawExpr, namespace: &ItemNamespace) -> Result<TypedExpr, AnalyzerError> {
        let (saved_tables, saved_columns) = {
            let scope = ctx.scope_mut()?;
            (
                std::mem::replace(&mut scope.table_namespace, namespace.table.clone()),
                std::mem::replace(&mut scope.column_namespace, namespace.column.clone()),
            )
        };
        let result = ctx.transform(condition);
        let scope = ctx.scope_mut()?;
        scope.table_namespace = saved_tables;
        scope.column_namespace = saved_columns;

        let condition = result?;
        match condition.data_type() {
            DataType::Bool | DataType::Unknown => Ok(condition),
            other => AnalyzerError::new(ErrorKind::DatatypeMismatch, format!("argument of JOIN/ON must be type boolean, not type {other}")).err(),
        }
    }
}
