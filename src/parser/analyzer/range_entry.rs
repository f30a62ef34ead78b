use std::sync::Arc;

use crate::{
    database::{DataType, FunctionSignature, RelationId, RelationSchema},
    parser::{
        analyzer::{AnalyzedQuery, ColumnSet, ColumnVar, TypedExpr},
        ast::JoinType,
    },
};

/// Name and type of a column whose shape is declared by the entry itself
/// (function results, VALUES lists, CTE outputs).
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredColumn {
    pub name: String,
    pub ty: DataType,
    pub typmod: i32,
    pub is_dropped: bool,
}

impl DeclaredColumn {
    pub fn new(name: &str, ty: DataType, typmod: i32) -> Self {
        Self { name: name.to_string(), ty, typmod, is_dropped: false }
    }
}

/// One output column of a join.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinAliasColumn {
    /// Alias of exactly one leg's column.
    Direct(ColumnVar),
    /// `USING` column merged from both legs; no storage of its own.
    Merged { left: ColumnVar, right: ColumnVar, ty: DataType, typmod: i32 },
}

impl JoinAliasColumn {
    pub fn data_type(&self) -> (DataType, i32) {
        match self {
            JoinAliasColumn::Direct(var) => (var.ty.clone(), var.typmod),
            JoinAliasColumn::Merged { ty, typmod, .. } => (ty.clone(), *typmod),
        }
    }
}

/// A common table expression as seen by references to it.
///
/// Recursive CTEs go through three states: nothing known, column shape known
/// (after the non-recursive arm), finished. Each state is a separate
/// immutable value; references keep the state they were created against.
#[derive(Debug, Clone, PartialEq)]
pub struct CteDef {
    pub name: String,
    pub column_aliases: Vec<String>,
    pub recursive: bool,
    pub columns: Option<Vec<DeclaredColumn>>,
    pub query: Option<Arc<AnalyzedQuery>>,
    pub location: Option<usize>,
}

impl CteDef {
    pub fn pending(name: &str, column_aliases: &[String], recursive: bool, location: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            column_aliases: column_aliases.to_vec(),
            recursive,
            columns: None,
            query: None,
            location,
        }
    }

    /// Still being analyzed; a reference to it is a self reference.
    pub fn is_in_progress(&self) -> bool {
        self.query.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RangeEntryKind {
    BaseRelation { schema: Arc<RelationSchema> },
    Subquery { query: Box<AnalyzedQuery> },
    /// `left`/`right` are slots of the legs in the same scope.
    Join { kind: JoinType, left: u32, right: u32, merged_columns: Vec<JoinAliasColumn>, quals: Option<Box<TypedExpr>> },
    SetFunction { call: Box<TypedExpr>, function: FunctionSignature, columns: Vec<DeclaredColumn> },
    Literal { rows: Vec<Vec<TypedExpr>>, columns: Vec<DeclaredColumn> },
    CteReference { definition: Arc<CteDef>, levels_above: u32, self_reference: bool },
}

/// A FROM-clause-visible source of columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeEntry {
    pub kind: RangeEntryKind,
    pub display_name: String,
    /// User-written alias, if any.
    pub alias: Option<String>,
    /// One name per exposed column; empty string for dropped columns.
    pub column_names: Vec<String>,
    pub lateral: bool,
    pub requires_read: bool,
    pub selected_columns: ColumnSet,
    pub written_columns: ColumnSet,
}

impl RangeEntry {
    pub(crate) fn new(kind: RangeEntryKind, display_name: String, alias: Option<String>, column_names: Vec<String>) -> Self {
        Self {
            kind,
            display_name,
            alias,
            column_names,
            lateral: false,
            requires_read: false,
            selected_columns: ColumnSet::new(),
            written_columns: ColumnSet::new(),
        }
    }

    pub fn relation_id(&self) -> Option<RelationId> {
        match &self.kind {
            RangeEntryKind::BaseRelation { schema } => Some(schema.id),
            _ => None,
        }
    }

    /// Unaliased base relation with the given identity.
    pub fn is_unaliased_relation(&self, id: RelationId) -> bool {
        self.alias.is_none() && self.relation_id() == Some(id)
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            RangeEntryKind::BaseRelation { .. } => "relation",
            RangeEntryKind::Subquery { .. } => "subquery",
            RangeEntryKind::Join { .. } => "join",
            RangeEntryKind::SetFunction { .. } => "function",
            RangeEntryKind::Literal { .. } => "values",
            RangeEntryKind::CteReference { .. } => "cte",
        }
    }

    /// Names of live columns in position order.
    pub fn live_column_names(&self) -> impl Iterator<Item = &str> {
        self.column_names.iter().filter(|n| !n.is_empty()).map(String::as_str)
    }
}
