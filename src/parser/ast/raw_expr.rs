use crate::parser::ast::{Literal, QualifiedName, SelectStmt, TypeName};

/// One dotted part of a column reference.
#[derive(Debug, Clone, PartialEq)]
pub enum NameField {
    Name(String),
    Star,
}

/// Suffix applied to a parenthesized expression: `(x).f`, `(x).*`, `(x)[i]`.
#[derive(Debug, Clone, PartialEq)]
pub enum IndirectionItem {
    Field(String),
    Star,
    Subscript(Box<RawExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubLinkKind {
    Exists,
    Any,
    All,
    Array,
    /// Scalar subquery
    Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinMaxOp {
    Greatest,
    Least,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncCall {
    pub name: QualifiedName,
    pub args: Vec<RawExpr>,
    /// Output column name supplied by the grammar for special syntax.
    pub output_name: Option<String>,
    pub location: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseWhen {
    pub condition: RawExpr,
    pub result: RawExpr,
}

/// Expression as produced by the grammar, before any name is resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum RawExpr {
    ColumnRef { fields: Vec<NameField>, location: Option<usize> },
    Indirection { arg: Box<RawExpr>, items: Vec<IndirectionItem> },
    Literal(Literal),
    Param(u32),
    FuncCall(FuncCall),
    TypeCast { arg: Box<RawExpr>, type_name: TypeName },
    Coalesce { args: Vec<RawExpr>, is_nvl: bool },
    MinMax { op: MinMaxOp, args: Vec<RawExpr> },
    NullIf { left: Box<RawExpr>, right: Box<RawExpr> },
    Row(Vec<RawExpr>),
    Array(Vec<RawExpr>),
    Case { arg: Option<Box<RawExpr>>, whens: Vec<CaseWhen>, default: Option<Box<RawExpr>> },
    BinaryOp { op: String, left: Box<RawExpr>, right: Box<RawExpr> },
    SubLink { kind: SubLinkKind, test: Option<Box<RawExpr>>, subselect: Box<SelectStmt> },
    Collate { arg: Box<RawExpr>, collation: String },
    Grouping(Vec<RawExpr>),
}

impl RawExpr {
    /// Column reference from dotted text; a `*` part becomes [`NameField::Star`].
    pub fn column(dotted: &str) -> RawExpr {
        let fields = dotted
            .split('.')
            .map(|part| if part == "*" { NameField::Star } else { NameField::Name(part.to_string()) })
            .collect();
        RawExpr::ColumnRef { fields, location: None }
    }

    pub fn star() -> RawExpr {
        RawExpr::ColumnRef { fields: vec![NameField::Star], location: None }
    }

    pub fn at(mut self, position: usize) -> RawExpr {
        match &mut self {
            RawExpr::ColumnRef { location, .. } => *location = Some(position),
            RawExpr::FuncCall(call) => call.location = Some(position),
            _ => {}
        }
        self
    }

    pub fn int(value: i64) -> RawExpr {
        RawExpr::Literal(Literal::Int(value))
    }

    pub fn string(value: &str) -> RawExpr {
        RawExpr::Literal(Literal::String(value.to_string()))
    }

    pub fn boolean(value: bool) -> RawExpr {
        RawExpr::Literal(Literal::Bool(value))
    }

    pub fn null() -> RawExpr {
        RawExpr::Literal(Literal::Null)
    }

    pub fn call(name: &str, args: Vec<RawExpr>) -> RawExpr {
        RawExpr::FuncCall(FuncCall { name: QualifiedName::from(name), args, output_name: None, location: None })
    }

    pub fn cast(arg: RawExpr, type_name: TypeName) -> RawExpr {
        RawExpr::TypeCast { arg: Box::new(arg), type_name }
    }

    pub fn coalesce(args: Vec<RawExpr>) -> RawExpr {
        RawExpr::Coalesce { args, is_nvl: false }
    }

    pub fn nvl(args: Vec<RawExpr>) -> RawExpr {
        RawExpr::Coalesce { args, is_nvl: true }
    }

    pub fn binary(op: &str, left: RawExpr, right: RawExpr) -> RawExpr {
        RawExpr::BinaryOp { op: op.to_string(), left: Box::new(left), right: Box::new(right) }
    }

    /// `(arg).name`
    pub fn field(arg: RawExpr, name: &str) -> RawExpr {
        Self::indirect(arg, IndirectionItem::Field(name.to_string()))
    }

    /// `(arg).*`
    pub fn field_star(arg: RawExpr) -> RawExpr {
        Self::indirect(arg, IndirectionItem::Star)
    }

    pub fn subscript(arg: RawExpr, index: RawExpr) -> RawExpr {
        Self::indirect(arg, IndirectionItem::Subscript(Box::new(index)))
    }

    fn indirect(arg: RawExpr, item: IndirectionItem) -> RawExpr {
        match arg {
            RawExpr::Indirection { arg, mut items } => {
                items.push(item);
                RawExpr::Indirection { arg, items }
            }
            other => RawExpr::Indirection { arg: Box::new(other), items: vec![item] },
        }
    }

    pub fn exists(subselect: SelectStmt) -> RawExpr {
        RawExpr::SubLink { kind: SubLinkKind::Exists, test: None, subselect: Box::new(subselect) }
    }

    pub fn scalar_subquery(subselect: SelectStmt) -> RawExpr {
        RawExpr::SubLink { kind: SubLinkKind::Expr, test: None, subselect: Box::new(subselect) }
    }

    pub fn array_subquery(subselect: SelectStmt) -> RawExpr {
        RawExpr::SubLink { kind: SubLinkKind::Array, test: None, subselect: Box::new(subselect) }
    }

    /// True for `*`, `t.*` and `(expr).*`: items that expand to several columns.
    pub fn is_star(&self) -> bool {
        match self {
            RawExpr::ColumnRef { fields, .. } => matches!(fields.last(), Some(NameField::Star)),
            RawExpr::Indirection { items, .. } => matches!(items.last(), Some(IndirectionItem::Star)),
            _ => false,
        }
    }

    pub fn location(&self) -> Option<usize> {
        match self {
            RawExpr::ColumnRef { location, .. } => *location,
            RawExpr::FuncCall(call) => call.location,
            RawExpr::TypeCast { arg, type_name } => type_name.location.or_else(|| arg.location()),
            RawExpr::Indirection { arg, .. } | RawExpr::Collate { arg, .. } => arg.location(),
            _ => None,
        }
    }
}
