use crate::parser::ast::{FromItem, RawExpr};

/// Output item of a SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub struct ResTarget {
    pub expr: RawExpr,
    pub alias: Option<String>,
}

impl ResTarget {
    pub fn new(expr: RawExpr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: RawExpr, alias: &str) -> Self {
        Self { expr, alias: Some(alias.to_string()) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortBy {
    pub expr: RawExpr,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommonTableExpr {
    pub name: String,
    pub column_aliases: Vec<String>,
    pub query: Box<SelectStmt>,
    pub location: Option<usize>,
}

impl CommonTableExpr {
    pub fn new(name: &str, query: SelectStmt) -> Self {
        Self { name: name.to_string(), column_aliases: vec![], query: Box::new(query), location: None }
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.column_aliases = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub recursive: bool,
    pub ctes: Vec<CommonTableExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

/// A plain SELECT block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectCore {
    pub targets: Vec<ResTarget>,
    pub from: Vec<FromItem>,
    pub criteria: Option<RawExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryBody {
    Select(Box<SelectCore>),
    SetOperation { op: SetOperator, all: bool, left: Box<SelectStmt>, right: Box<SelectStmt> },
}

/// Raw SELECT statement: optional WITH, a body, and ORDER BY.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub with: Option<WithClause>,
    pub body: QueryBody,
    pub order_by: Vec<SortBy>,
}

impl SelectStmt {
    pub fn select(targets: Vec<ResTarget>) -> Self {
        let core = SelectCore { targets, ..SelectCore::default() };
        Self { with: None, body: QueryBody::Select(Box::new(core)), order_by: vec![] }
    }

    /// `SELECT <exprs>` without aliases.
    pub fn select_exprs(exprs: Vec<RawExpr>) -> Self {
        Self::select(exprs.into_iter().map(ResTarget::new).collect())
    }

    pub fn set_operation(op: SetOperator, all: bool, left: SelectStmt, right: SelectStmt) -> Self {
        Self {
            with: None,
            body: QueryBody::SetOperation { op, all, left: Box::new(left), right: Box::new(right) },
            order_by: vec![],
        }
    }

    pub fn from(mut self, items: Vec<FromItem>) -> Self {
        if let QueryBody::Select(core) = &mut self.body {
            core.from = items;
        }
        self
    }

    pub fn filter(mut self, criteria: RawExpr) -> Self {
        if let QueryBody::Select(core) = &mut self.body {
            core.criteria = Some(criteria);
        }
        self
    }

    pub fn with_ctes(mut self, recursive: bool, ctes: Vec<CommonTableExpr>) -> Self {
        self.with = Some(WithClause { recursive, ctes });
        self
    }

    pub fn order_by(mut self, expr: RawExpr, descending: bool) -> Self {
        self.order_by.push(SortBy { expr, descending });
        self
    }
}
