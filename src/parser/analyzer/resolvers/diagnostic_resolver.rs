use tracing::debug;

use crate::{
    database::SystemColumn,
    parser::{
        analyzer::{AnalysisContext, AnalyzerError, ErrorKind, RangeEntry, RangeEntryKind, TableResolver},
        ast::QualifiedName,
    },
};

/// Builds "not found" errors.
///
/// The searches here look at every entry of every level regardless of
/// visibility, so they can explain why a lookup failed. They never produce
/// a resolution.
pub struct DiagnosticResolver;

impl DiagnosticResolver {
    /// First entry at any level named `name` or, for a table name, any entry
    /// reading that relation. Returns `(levels_up, slot, entry)`.
    fn search_for_table<'c>(ctx: &'c AnalysisContext, schema: Option<&str>, name: &str) -> Option<(u32, u32, &'c RangeEntry)> {
        let mut parts = Vec::with_capacity(2);
        if let Some(schema) = schema {
            parts.push(schema.to_string());
        }
        parts.push(name.to_string());
        let relid = ctx.catalog.lookup_relation(&QualifiedName::new(parts));

        for (levels_up, scope) in ctx.scopes.iter().rev().enumerate() {
            for (i, entry) in scope.range_entries.iter().enumerate() {
                let same_relation = relid.is_some() && entry.relation_id() == relid;
                if same_relation || entry.display_name == name {
                    return Some((levels_up as u32, i as u32 + 1, entry));
                }
            }
        }
        None
    }

    pub fn missing_table_error(ctx: &AnalysisContext, schema: Option<&str>, name: &str, location: Option<usize>) -> AnalyzerError {
        let missing = AnalyzerError::new(ErrorKind::EntityNotFound, format!("missing FROM-clause entry for table \"{name}\"")).at(location);
        if !ctx.config.hints_enabled() {
            return missing;
        }
        let Some((levels_up, slot, entry)) = Self::search_for_table(ctx, schema, name) else {
            return missing;
        };
        debug!(name, found = %entry.display_name, "table exists but is not referenceable");

        let error = AnalyzerError::new(ErrorKind::EntityNotFound, format!("invalid reference to FROM-clause entry for table \"{name}\"")).at(location);

        // the user wrote the table name where its alias is the visible name
        let alias_is_visible = entry.alias.is_some()
            && entry.display_name != name
            && matches!(
                TableResolver::find_table(ctx, None, &entry.display_name, location),
                Ok(Some(found)) if found.levels_up == levels_up && found.slot == slot
            );
        if alias_is_visible {
            error.with_hint(format!("Perhaps you meant to reference the table alias \"{}\".", entry.display_name))
        } else {
            error.with_hint(format!(
                "There is an entry for table \"{}\", but it cannot be referenced from this part of the query.",
                entry.display_name
            ))
        }
    }

    fn has_column(entry: &RangeEntry, column: &str) -> bool {
        if entry.column_names.iter().any(|n| n == column) {
            return true;
        }
        match (&entry.kind, SystemColumn::lookup(column)) {
            (RangeEntryKind::BaseRelation { schema }, Some(sys)) => {
                schema.has_system_columns() && (sys != SystemColumn::Oid || schema.has_oids)
            }
            _ => false,
        }
    }

    fn search_for_column<'c>(ctx: &'c AnalysisContext, table: Option<&str>, column: &str) -> Option<&'c RangeEntry> {
        ctx.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.range_entries.iter())
            .filter(|entry| table.is_none_or(|t| entry.display_name == t))
            .find(|entry| Self::has_column(entry, column))
    }

    pub fn missing_column_error(ctx: &AnalysisContext, table: Option<&str>, column: &str, location: Option<usize>) -> AnalyzerError {
        let message = match table {
            Some(table) => format!("column {table}.{column} does not exist"),
            None => format!("column \"{column}\" does not exist"),
        };
        let error = AnalyzerError::new(ErrorKind::ColumnNotFound, message).at(location);
        if !ctx.config.hints_enabled() {
            return error;
        }
        match Self::search_for_column(ctx, table, column) {
            Some(entry) => error.with_hint(format!(
                "There is a column named \"{column}\" in table \"{}\", but it cannot be referenced from this part of the query.",
                entry.display_name
            )),
            None => error,
        }
    }
}
