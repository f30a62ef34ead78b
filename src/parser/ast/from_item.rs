use crate::parser::ast::{FuncCall, QualifiedName, RawExpr, SelectStmt, TypeName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    /// Join kinds whose right side may laterally reference the left side.
    pub fn allows_lateral(self) -> bool {
        matches!(self, JoinType::Inner | JoinType::Left | JoinType::Cross)
    }
}

/// `AS name (col, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub columns: Vec<String>,
}

impl Alias {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), columns: vec![] }
    }

    pub fn with_columns(name: &str, columns: &[&str]) -> Self {
        Self { name: name.to_string(), columns: columns.iter().map(|c| c.to_string()).collect() }
    }
}

/// Entry of a function's column definition list.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: TypeName,
}

impl ColumnDef {
    pub fn new(name: &str, type_name: TypeName) -> Self {
        Self { name: name.to_string(), type_name }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinQuals {
    On(RawExpr),
    Using(Vec<String>),
    Natural,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinExpr {
    pub kind: JoinType,
    pub left: FromItem,
    pub right: FromItem,
    pub quals: JoinQuals,
    pub alias: Option<Alias>,
}

/// One item of a FROM list.
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    Table { name: QualifiedName, alias: Option<Alias>, location: Option<usize> },
    Subquery { query: Box<SelectStmt>, alias: Option<Alias>, lateral: bool },
    Function { call: FuncCall, alias: Option<Alias>, column_defs: Vec<ColumnDef>, lateral: bool },
    Values { rows: Vec<Vec<RawExpr>>, alias: Option<Alias> },
    Join(Box<JoinExpr>),
}

impl FromItem {
    pub fn table(name: &str) -> FromItem {
        FromItem::Table { name: QualifiedName::from(name), alias: None, location: None }
    }

    pub fn aliased_table(name: &str, alias: Alias) -> FromItem {
        FromItem::Table { name: QualifiedName::from(name), alias: Some(alias), location: None }
    }

    pub fn subquery(query: SelectStmt, alias: &str) -> FromItem {
        FromItem::Subquery { query: Box::new(query), alias: Some(Alias::new(alias)), lateral: false }
    }

    pub fn lateral_subquery(query: SelectStmt, alias: &str) -> FromItem {
        FromItem::Subquery { query: Box::new(query), alias: Some(Alias::new(alias)), lateral: true }
    }

    pub fn function(name: &str, args: Vec<RawExpr>, alias: Option<Alias>) -> FromItem {
        let call = FuncCall { name: QualifiedName::from(name), args, output_name: None, location: None };
        FromItem::Function { call, alias, column_defs: vec![], lateral: false }
    }

    pub fn values(rows: Vec<Vec<RawExpr>>, alias: Option<Alias>) -> FromItem {
        FromItem::Values { rows, alias }
    }

    pub fn join(kind: JoinType, left: FromItem, right: FromItem, quals: JoinQuals) -> FromItem {
        FromItem::Join(Box::new(JoinExpr { kind, left, right, quals, alias: None }))
    }

    pub fn join_as(kind: JoinType, left: FromItem, right: FromItem, quals: JoinQuals, alias: Alias) -> FromItem {
        FromItem::Join(Box::new(JoinExpr { kind, left, right, quals, alias: Some(alias) }))
    }
}
