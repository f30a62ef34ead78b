use tracing::trace;

use crate::{
    database::{SystemColumn, TYPMOD_UNSPECIFIED},
    parser::{
        analyzer::{
            AnalysisContext, AnalyzerError, ColumnPosition, ColumnVar, DiagnosticResolver, ErrorKind, PrivilegeMarker,
            RangeEntry, RangeEntryKind, RelationExpander, ResolvedRef, TableMatch, TableResolver, TypedExpr,
        },
        ast::NameField,
    },
};

pub struct ColumnResolver;

impl ColumnResolver {
    /// Look a column up by name inside one entry, ignoring visibility.
    ///
    /// User columns win; system columns are only considered on stored tables
    /// when no user column matched.
    pub fn find_column_in_entry(entry: &RangeEntry, name: &str, location: Option<usize>) -> Result<Option<ColumnPosition>, AnalyzerError> {
        let mut result = None;
        for (i, column) in entry.column_names.iter().enumerate() {
            if column != name {
                continue;
            }
            if result.is_some() {
                return AnalyzerError::fail(
                    ErrorKind::AmbiguousReference,
                    format!("column reference \"{name}\" is ambiguous"),
                    location,
                );
            }
            result = Some(ColumnPosition::User(i as u32 + 1));
        }
        if result.is_some() {
            return Ok(result);
        }

        let RangeEntryKind::BaseRelation { schema } = &entry.kind else {
            return Ok(None);
        };
        if !schema.has_system_columns() {
            return Ok(None);
        }
        Ok(SystemColumn::lookup(name)
            .filter(|sys| *sys != SystemColumn::Oid || schema.has_oids)
            .map(ColumnPosition::System))
    }

    /// Build the typed reference to a column and mark it as read.
    pub fn make_var(ctx: &mut AnalysisContext, levels_up: u32, slot: u32, position: ColumnPosition, location: Option<usize>) -> Result<ColumnVar, AnalyzerError> {
        let (ty, typmod) = RelationExpander::column_type(ctx.entry(levels_up, slot)?, position)?;
        PrivilegeMarker::mark_column(ctx, levels_up, slot, Some(position))?;
        Ok(ColumnVar { reference: ResolvedRef::column(levels_up, slot, position), ty, typmod, location })
    }

    /// Reference to a whole row of an entry, marked as read.
    pub fn whole_row_var(ctx: &mut AnalysisContext, levels_up: u32, slot: u32, location: Option<usize>) -> Result<ColumnVar, AnalyzerError> {
        let ty = RelationExpander::whole_row_type(ctx.entry(levels_up, slot)?);
        PrivilegeMarker::mark_column(ctx, levels_up, slot, None)?;
        Ok(ColumnVar {
            reference: ResolvedRef::whole_row(levels_up, slot),
            ty,
            typmod: TYPMOD_UNSPECIFIED,
            location,
        })
    }

    /// Find an unqualified column among the column-visible entries, walking
    /// outward level by level unless `local_only`.
    pub fn column_to_var(ctx: &mut AnalysisContext, name: &str, location: Option<usize>, local_only: bool) -> Result<Option<ColumnVar>, AnalyzerError> {
        let mut found: Option<(u32, u32, ColumnPosition)> = None;
        for levels_up in 0..ctx.depth() as u32 {
            let scope = ctx.scope_at(levels_up)?;
            for item in &scope.column_namespace {
                if item.lateral_only && !scope.lateral_active {
                    continue;
                }
                let Some(entry) = scope.entry(item.slot) else { continue };
                let Some(position) = Self::find_column_in_entry(entry, name, location)? else { continue };
                if found.is_some() {
                    return AnalyzerError::fail(
                        ErrorKind::AmbiguousReference,
                        format!("column reference \"{name}\" is ambiguous"),
                        location,
                    );
                }
                if item.lateral_only && !item.lateral_ok {
                    return AnalyzerError::new(
                        ErrorKind::InvalidLateralReference,
                        format!("invalid reference to FROM-clause entry for table \"{}\"", entry.display_name),
                    )
                    .with_detail("The combining JOIN type must be INNER or LEFT for a LATERAL reference.")
                    .at(location)
                    .err();
                }
                found = Some((levels_up, item.slot, position));
            }
            if found.is_some() || local_only {
                break;
            }
        }

        match found {
            Some((levels_up, slot, position)) => {
                trace!(name, levels_up, slot, ?position, "column resolved");
                Self::make_var(ctx, levels_up, slot, position, location).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Resolve `[qualifier.]name` to a column reference.
    pub fn resolve_column(ctx: &mut AnalysisContext, qualifier: Option<&str>, name: &str, location: Option<usize>) -> Result<ColumnVar, AnalyzerError> {
        match qualifier {
            None => match Self::column_to_var(ctx, name, location, false)? {
                Some(var) => Ok(var),
                None => Err(DiagnosticResolver::missing_column_error(ctx, None, name, location)),
            },
            Some(table) => {
                let found = TableResolver::resolve_table(ctx, None, table, location)?;
                Self::column_of_table(ctx, found, table, name, location)
            }
        }
    }

    fn column_of_table(ctx: &mut AnalysisContext, found: TableMatch, table: &str, name: &str, location: Option<usize>) -> Result<ColumnVar, AnalyzerError> {
        let entry = ctx.entry(found.levels_up, found.slot)?;
        match Self::find_column_in_entry(entry, name, location)? {
            Some(position) => Self::make_var(ctx, found.levels_up, found.slot, position, location),
            None => Err(DiagnosticResolver::missing_column_error(ctx, Some(table), name, location)),
        }
    }

    /// Transform a dotted column reference.
    ///
    /// `a` is a column or, failing that, a whole-row reference to table `a`;
    /// `t.a`, `s.t.a` and `db.s.t.a` qualify the column; a trailing `*`
    /// makes it a whole-row reference.
    pub fn transform_column_ref(ctx: &mut AnalysisContext, fields: &[NameField], location: Option<usize>) -> Result<TypedExpr, AnalyzerError> {
        let dotted = fields
            .iter()
            .map(|f| match f {
                NameField::Name(n) => n.clone(),
                NameField::Star => "*".to_string(),
            })
            .collect::<Vec<_>>()
            .join(".");

        if fields.len() > ctx.config.max_name_parts {
            return AnalyzerError::fail(
                ErrorKind::QualifiedNameTooLong,
                format!("improper qualified name (too many dotted names): {dotted}"),
                location,
            );
        }
        if fields[..fields.len().saturating_sub(1)].iter().any(|f| *f == NameField::Star) {
            return AnalyzerError::fail(ErrorKind::InvalidReference, "improper use of \"*\"", location);
        }

        let names: Vec<String> = fields
            .iter()
            .filter_map(|f| match f {
                NameField::Name(n) => Some(ctx.config.identifier(n)),
                NameField::Star => None,
            })
            .collect();
        let star = matches!(fields.last(), Some(NameField::Star));

        let var = match (names.as_slice(), star) {
            ([], _) => {
                return AnalyzerError::fail(ErrorKind::InvalidReference, "row expansion via \"*\" is not supported here", location);
            }
            ([name], false) => {
                if let Some(var) = Self::column_to_var(ctx, name, location, false)? {
                    var
                } else if let Some(found) = TableResolver::find_table(ctx, None, name, location)? {
                    Self::whole_row_var(ctx, found.levels_up, found.slot, location)?
                } else {
                    return Err(DiagnosticResolver::missing_column_error(ctx, None, name, location));
                }
            }
            ([table], true) => {
                let found = TableResolver::resolve_table(ctx, None, table, location)?;
                Self::whole_row_var(ctx, found.levels_up, found.slot, location)?
            }
            ([table, column], false) => {
                let found = TableResolver::resolve_table(ctx, None, table, location)?;
                Self::column_of_table(ctx, found, table, column, location)?
            }
            ([schema, table], true) => {
                let found = TableResolver::resolve_table(ctx, Some(schema), table, location)?;
                Self::whole_row_var(ctx, found.levels_up, found.slot, location)?
            }
            ([schema, table, column], false) => {
                let found = TableResolver::resolve_table(ctx, Some(schema), table, location)?;
                Self::column_of_table(ctx, found, table, column, location)?
            }
            ([catalog, rest @ ..], _) => {
                if *catalog != ctx.config.current_database {
                    return AnalyzerError::fail(
                        ErrorKind::CrossDatabaseReference,
                        format!("cross-database references are not implemented: {dotted}"),
                        location,
                    );
                }
                match (rest, star) {
                    ([schema, table], true) => {
                        let found = TableResolver::resolve_table(ctx, Some(schema), table, location)?;
                        Self::whole_row_var(ctx, found.levels_up, found.slot, location)?
                    }
                    ([schema, table, column], false) => {
                        let found = TableResolver::resolve_table(ctx, Some(schema), table, location)?;
                        Self::column_of_table(ctx, found, table, column, location)?
                    }
                    _ => {
                        return AnalyzerError::fail(
                            ErrorKind::QualifiedNameTooLong,
                            format!("improper qualified name (too many dotted names): {dotted}"),
                            location,
                        );
                    }
                }
            }
        };
        Ok(TypedExpr::Column(var))
    }
}
