use crate::{
    database::{AnalyzerConfig, SqlDialect},
    parser::{
        analyzer::TypedExpr,
        ast::{IndirectionItem, MinMaxOp, NameField, RawExpr, SubLinkKind},
    },
};

/// How convincing a figured name is: a real identifier beats a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Strength {
    None,
    Keyword,
    Name,
}

/// Picks the output name of an unaliased select-list item.
pub struct ColumnNamer;

impl ColumnNamer {
    pub const FALLBACK: &'static str = "?column?";

    /// Name for `expr`; `typed` is its transformed form, used to read the
    /// output name of a scalar subquery.
    pub fn figure_name(expr: &RawExpr, typed: Option<&TypedExpr>, config: &AnalyzerConfig) -> String {
        match Self::figure(expr, typed, config) {
            (Some(name), strength) if strength > Strength::None => name,
            _ => Self::FALLBACK.to_string(),
        }
    }

    fn named(name: &str) -> (Option<String>, Strength) {
        (Some(name.to_string()), Strength::Name)
    }

    fn figure(expr: &RawExpr, typed: Option<&TypedExpr>, config: &AnalyzerConfig) -> (Option<String>, Strength) {
        match expr {
            RawExpr::ColumnRef { fields, .. } => match fields.iter().rev().find_map(|f| match f {
                NameField::Name(n) => Some(n),
                NameField::Star => None,
            }) {
                Some(name) => Self::named(name),
                None => (None, Strength::None),
            },
            RawExpr::Indirection { arg, items } => {
                match items.iter().rev().find_map(|i| match i {
                    IndirectionItem::Field(n) => Some(n),
                    _ => None,
                }) {
                    Some(name) => Self::named(name),
                    None => Self::figure(arg, None, config),
                }
            }
            RawExpr::FuncCall(call) => Self::named(call.output_name.as_deref().unwrap_or(call.name.name())),
            RawExpr::NullIf { .. } => Self::named("nullif"),
            RawExpr::TypeCast { arg, type_name } => {
                let inner = Self::figure(arg, None, config);
                if inner.1 > Strength::Keyword {
                    inner
                } else {
                    (Some(type_name.last_name().to_string()), Strength::Keyword)
                }
            }
            RawExpr::Collate { arg, .. } => Self::figure(arg, typed, config),
            RawExpr::Grouping(_) => Self::named("grouping"),
            RawExpr::SubLink { kind: SubLinkKind::Exists, .. } => Self::named("exists"),
            RawExpr::SubLink { kind: SubLinkKind::Array, .. } => Self::named("array"),
            RawExpr::SubLink { kind: SubLinkKind::Expr, .. } => match typed {
                Some(TypedExpr::SubLink { query, .. }) => match query.output_at(1).and_then(|c| c.display_name.as_deref()) {
                    Some(name) => Self::named(name),
                    None => (None, Strength::None),
                },
                _ => (None, Strength::None),
            },
            RawExpr::SubLink { .. } => (None, Strength::None),
            RawExpr::Case { default, .. } => {
                let inner = match default {
                    Some(d) => Self::figure(d, None, config),
                    None => (None, Strength::None),
                };
                if inner.1 > Strength::Keyword { inner } else { (Some("case".to_string()), Strength::Keyword) }
            }
            RawExpr::Array(_) => Self::named("array"),
            RawExpr::Row(_) => Self::named("row"),
            RawExpr::Coalesce { is_nvl, .. } => {
                if *is_nvl && config.dialect == SqlDialect::A {
                    Self::named("nvl")
                } else {
                    Self::named("coalesce")
                }
            }
            RawExpr::MinMax { op: MinMaxOp::Greatest, .. } => Self::named("greatest"),
            RawExpr::MinMax { op: MinMaxOp::Least, .. } => Self::named("least"),
            RawExpr::Literal(_) | RawExpr::Param(_) | RawExpr::BinaryOp { .. } => (None, Strength::None),
        }
    }
}
