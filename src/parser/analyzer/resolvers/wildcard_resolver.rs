use tracing::debug;

use crate::parser::{
    analyzer::{AnalysisContext, AnalyzerError, ColumnResolver, ErrorKind, RecordResolver, RelationExpander, TableResolver, TypedExpr},
    ast::{IndirectionItem, NameField, RawExpr},
};

/// One column produced by expanding a `*`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedField {
    pub name: String,
    pub expr: TypedExpr,
}

pub struct WildcardResolver;

impl WildcardResolver {
    /// Expand `*` or `(expr).*` used as a select-list item. `Ok(None)` when
    /// the item is not a wildcard.
    pub fn expand_target_star(ctx: &mut AnalysisContext, expr: &RawExpr) -> Result<Option<Vec<ExpandedField>>, AnalyzerError> {
        match expr {
            RawExpr::ColumnRef { fields, location } if matches!(fields.last(), Some(NameField::Star)) => {
                Self::expand_column_ref_star(ctx, fields, *location).map(Some)
            }
            RawExpr::Indirection { arg, items } if matches!(items.last(), Some(IndirectionItem::Star)) => {
                let base = match &items[..items.len() - 1] {
                    [] => (**arg).clone(),
                    prefix => RawExpr::Indirection { arg: arg.clone(), items: prefix.to_vec() },
                };
                let value = ctx.transform(&base)?;
                Self::expand_record_star(ctx, value).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// `*`, `t.*`, `s.t.*` or `db.s.t.*`.
    pub fn expand_column_ref_star(ctx: &mut AnalysisContext, fields: &[NameField], location: Option<usize>) -> Result<Vec<ExpandedField>, AnalyzerError> {
        let mut names = Vec::with_capacity(fields.len());
        for field in &fields[..fields.len().saturating_sub(1)] {
            match field {
                NameField::Name(n) => names.push(ctx.config.identifier(n)),
                NameField::Star => return AnalyzerError::fail(ErrorKind::InvalidReference, "improper use of \"*\"", location),
            }
        }
        let dotted = || {
            let mut parts = names.clone();
            parts.push("*".to_string());
            parts.join(".")
        };
        if fields.len() > ctx.config.max_name_parts {
            return AnalyzerError::fail(
                ErrorKind::QualifiedNameTooLong,
                format!("improper qualified name (too many dotted names): {}", dotted()),
                location,
            );
        }

        let found = match names.as_slice() {
            [] => return Self::expand_all(ctx, location),
            [table] => TableResolver::resolve_table(ctx, None, table, location)?,
            [schema, table] => TableResolver::resolve_table(ctx, Some(schema), table, location)?,
            [catalog, schema, table] => {
                if *catalog != ctx.config.current_database {
                    return AnalyzerError::fail(
                        ErrorKind::CrossDatabaseReference,
                        format!("cross-database references are not implemented: {}", dotted()),
                        location,
                    );
                }
                TableResolver::resolve_table(ctx, Some(schema), table, location)?
            }
            _ => {
                return AnalyzerError::fail(
                    ErrorKind::QualifiedNameTooLong,
                    format!("improper qualified name (too many dotted names): {}", dotted()),
                    location,
                );
            }
        };
        Self::expand_entry(ctx, found.levels_up, found.slot, location)
    }

    /// Bare `*`: every column-visible entry of the current level, in
    /// namespace order.
    pub fn expand_all(ctx: &mut AnalysisContext, location: Option<usize>) -> Result<Vec<ExpandedField>, AnalyzerError> {
        let slots: Vec<u32> = ctx.scope()?
            .column_namespace
            .iter()
            .filter(|item| !item.lateral_only)
            .map(|item| item.slot)
            .collect();
        if slots.is_empty() {
            return AnalyzerError::fail(ErrorKind::EmptyWildcardTarget, "SELECT * with no tables specified is not valid", location);
        }

        let mut fields = Vec::new();
        for slot in slots {
            fields.extend(Self::expand_entry(ctx, 0, slot, location)?);
        }
        Ok(fields)
    }

    /// All live columns of one entry, each marked as read.
    pub fn expand_entry(ctx: &mut AnalysisContext, levels_up: u32, slot: u32, location: Option<usize>) -> Result<Vec<ExpandedField>, AnalyzerError> {
        let (names, positions) = RelationExpander::expose_columns(ctx.entry(levels_up, slot)?, false)?;
        debug!(levels_up, slot, columns = names.len(), "expanding entry");
        let mut fields = Vec::with_capacity(names.len());
        for (name, position) in names.into_iter().zip(positions) {
            let var = ColumnResolver::make_var(ctx, levels_up, slot, position, location)?;
            fields.push(ExpandedField { name, expr: TypedExpr::Column(var) });
        }
        Ok(fields)
    }

    /// `(expr).*`: one field selection per live field of the value's row shape.
    pub fn expand_record_star(ctx: &mut AnalysisContext, value: TypedExpr) -> Result<Vec<ExpandedField>, AnalyzerError> {
        if let TypedExpr::Column(var) = &value {
            if var.is_whole_row() {
                return Self::expand_entry(ctx, var.reference.levels_up, var.reference.entity_slot, var.location);
            }
        }

        let shape = RecordResolver::row_shape(ctx, &value)?;
        debug!(fields = shape.fields.len(), "expanding row value");
        Ok(shape
            .live_fields()
            .map(|(field_number, field)| ExpandedField {
                name: field.name.clone(),
                expr: TypedExpr::FieldSelect {
                    arg: Box::new(value.clone()),
                    field_number,
                    field_name: field.name.clone(),
                    ty: field.ty.clone(),
                    typmod: field.typmod,
                },
            })
            .collect())
    }
}
