use tracing::trace;

use crate::{
    database::DataType,
    parser::{
        analyzer::{AnalysisContext, AnalyzerError, CaseBranch, ColumnResolver, ErrorKind, QueryAnalyzer, RecordResolver, TypedExpr},
        ast::{IndirectionItem, MinMaxOp, RawExpr, SubLinkKind},
    },
};

/// Turns raw expressions into typed ones. Name resolution calls back into
/// this for every expression it meets, so an embedder can swap in a richer
/// expression layer while keeping the resolvers.
pub trait ExprTransformer {
    fn transform(&self, expr: &RawExpr, ctx: &mut AnalysisContext<'_>) -> Result<TypedExpr, AnalyzerError>;
}

/// Minimal expression layer: resolves names, looks up functions and types,
/// and derives result types by simple promotion.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicTransformer;

impl ExprTransformer for BasicTransformer {
    fn transform(&self, expr: &RawExpr, ctx: &mut AnalysisContext<'_>) -> Result<TypedExpr, AnalyzerError> {
        TypeInference::transform_expr(expr, ctx)
    }
}

pub struct TypeInference;

impl TypeInference {
    pub fn transform_expr(expr: &RawExpr, ctx: &mut AnalysisContext) -> Result<TypedExpr, AnalyzerError> {
        match expr {
            RawExpr::ColumnRef { fields, location } => ColumnResolver::transform_column_ref(ctx, fields, *location),
            RawExpr::Indirection { arg, items } => {
                let mut value = ctx.transform(arg)?;
                for item in items {
                    value = match item {
                        IndirectionItem::Field(name) => {
                            let name = ctx.config.identifier(name);
                            RecordResolver::select_field(ctx, value, &name, arg.location())?
                        }
                        IndirectionItem::Star => {
                            return AnalyzerError::fail(ErrorKind::InvalidReference, "row expansion via \"*\" is not supported here", arg.location());
                        }
                        IndirectionItem::Subscript(index) => {
                            let index = ctx.transform(index)?;
                            let ty = match value.data_type() {
                                DataType::Array(elem) => *elem,
                                other => {
                                    return AnalyzerError::fail(
                                        ErrorKind::DatatypeMismatch,
                                        format!("cannot subscript type {other} because it is not an array"),
                                        arg.location(),
                                    );
                                }
                            };
                            TypedExpr::Subscript { arg: Box::new(value), index: Box::new(index), ty }
                        }
                    };
                }
                Ok(value)
            }
            RawExpr::Literal(value) => Ok(TypedExpr::Const { value: value.clone(), ty: value.data_type() }),
            RawExpr::Param(number) => Ok(TypedExpr::Param { number: *number, ty: DataType::Unknown }),
            RawExpr::FuncCall(call) => {
                let args = Self::transform_all(ctx, &call.args)?;
                let Some(function) = ctx.catalog.lookup_function(&call.name) else {
                    let arg_types: Vec<String> = args.iter().map(|a| a.data_type().to_string()).collect();
                    return AnalyzerError::new(ErrorKind::FunctionNotFound, format!("function {}({}) does not exist", call.name, arg_types.join(", ")))
                        .with_hint("No function matches the given name and argument types. You might need to add explicit type casts.")
                        .at(call.location)
                        .err();
                };
                trace!(function = %function.name, "resolved function");
                Ok(TypedExpr::FuncCall {
                    function: function.id,
                    ty: function.result_type(),
                    name: function.name,
                    args,
                    returns_set: function.returns_set,
                })
            }
            RawExpr::TypeCast { arg, type_name } => {
                let arg = ctx.transform(arg)?;
                let (ty, typmod) = ctx.catalog.lookup_type(type_name).ok_or_else(|| {
                    AnalyzerError::new(ErrorKind::TypeNotFound, format!("type \"{}\" does not exist", type_name)).at(type_name.location)
                })?;
                Ok(TypedExpr::Cast { arg: Box::new(arg), ty, typmod })
            }
            RawExpr::Coalesce { args, is_nvl } => {
                let args = Self::transform_all(ctx, args)?;
                let construct = if *is_nvl { "NVL" } else { "COALESCE" };
                let ty = Self::common_type(construct, &args)?;
                Ok(TypedExpr::Coalesce { args, ty })
            }
            RawExpr::MinMax { op, args } => {
                let args = Self::transform_all(ctx, args)?;
                let construct = match op {
                    MinMaxOp::Greatest => "GREATEST",
                    MinMaxOp::Least => "LEAST",
                };
                let ty = Self::common_type(construct, &args)?;
                Ok(TypedExpr::MinMax { op: *op, args, ty })
            }
            RawExpr::NullIf { left, right } => {
                let left = ctx.transform(left)?;
                let right = ctx.transform(right)?;
                let ty = left.data_type();
                Ok(TypedExpr::NullIf { left: Box::new(left), right: Box::new(right), ty })
            }
            RawExpr::Row(args) => {
                let args = Self::transform_all(ctx, args)?;
                let field_names = (1..=args.len()).map(|i| format!("f{i}")).collect();
                Ok(TypedExpr::Row { args, field_names })
            }
            RawExpr::Array(elements) => {
                if elements.is_empty() {
                    return AnalyzerError::new(ErrorKind::DatatypeMismatch, "cannot determine type of empty array")
                        .with_hint("Explicitly cast to the desired type, for example ARRAY[]::integer[].")
                        .err();
                }
                let elements = Self::transform_all(ctx, elements)?;
                let element_type = Self::common_type("ARRAY", &elements)?;
                Ok(TypedExpr::Array { elements, element_type })
            }
            RawExpr::Case { arg, whens, default } => {
                let test = arg.as_deref().map(|a| ctx.transform(a)).transpose()?;
                let mut branches = Vec::with_capacity(whens.len());
                for when in whens {
                    let condition = ctx.transform(&when.condition)?;
                    let condition = match &test {
                        Some(test) => TypedExpr::Op {
                            op: "=".to_string(),
                            left: Box::new(test.clone()),
                            right: Box::new(condition),
                            ty: DataType::Bool,
                        },
                        None => condition,
                    };
                    let result = ctx.transform(&when.result)?;
                    branches.push(CaseBranch { condition, result });
                }
                let default = default.as_deref().map(|d| ctx.transform(d)).transpose()?;
                let results: Vec<TypedExpr> = branches.iter().map(|b| b.result.clone()).chain(default.clone()).collect();
                let ty = Self::common_type("CASE", &results)?;
                Ok(TypedExpr::Case { branches, default: default.map(Box::new), ty })
            }
            RawExpr::BinaryOp { op, left, right } => {
                let left = ctx.transform(left)?;
                let right = ctx.transform(right)?;
                let ty = Self::operator_type(op, &left.data_type(), &right.data_type())?;
                Ok(TypedExpr::Op { op: op.clone(), left: Box::new(left), right: Box::new(right), ty })
            }
            RawExpr::SubLink { kind, test, subselect } => {
                let test = test.as_deref().map(|t| ctx.transform(t)).transpose()?;
                let query = QueryAnalyzer::analyze_subquery(ctx, subselect)?;
                let ty = match kind {
                    SubLinkKind::Exists | SubLinkKind::Any | SubLinkKind::All => DataType::Bool,
                    SubLinkKind::Expr | SubLinkKind::Array => {
                        let mut outputs = query.visible_outputs();
                        let first = outputs.next().map(|c| c.expression.data_type());
                        if outputs.next().is_some() {
                            return AnalyzerError::new(ErrorKind::DatatypeMismatch, "subquery must return only one column").err();
                        }
                        let ty = first.unwrap_or(DataType::Unknown);
                        if *kind == SubLinkKind::Array { DataType::Array(Box::new(ty)) } else { ty }
                    }
                };
                Ok(TypedExpr::SubLink { kind: *kind, test: test.map(Box::new), query: Box::new(query), ty })
            }
            RawExpr::Collate { arg, collation } => {
                let arg = ctx.transform(arg)?;
                Ok(TypedExpr::Collate { arg: Box::new(arg), collation: collation.clone() })
            }
            RawExpr::Grouping(args) => Ok(TypedExpr::Grouping { args: Self::transform_all(ctx, args)? }),
        }
    }

    fn transform_all(ctx: &mut AnalysisContext, exprs: &[RawExpr]) -> Result<Vec<TypedExpr>, AnalyzerError> {
        exprs.iter().map(|e| ctx.transform(e)).collect()
    }

    /// Promote the types of `exprs` to one, as COALESCE, CASE and friends need.
    pub fn common_type(construct: &str, exprs: &[TypedExpr]) -> Result<DataType, AnalyzerError> {
        let mut common = DataType::Unknown;
        for expr in exprs {
            let ty = expr.data_type();
            common = DataType::promote(&common, &ty).ok_or_else(|| {
                AnalyzerError::new(ErrorKind::DatatypeMismatch, format!("{construct} types {common} and {ty} cannot be matched"))
            })?;
        }
        Ok(common)
    }

    fn operator_type(op: &str, left: &DataType, right: &DataType) -> Result<DataType, AnalyzerError> {
        match op.to_ascii_lowercase().as_str() {
            "=" | "<>" | "!=" | "<" | "<=" | ">" | ">=" | "and" | "or" | "like" | "ilike" | "not like" => Ok(DataType::Bool),
            "||" => Ok(DataType::Text),
            _ => match DataType::promote(left, right) {
                Some(ty) if ty.is_row_type() => Self::no_operator(op, left, right),
                Some(ty) => Ok(ty),
                None => Self::no_operator(op, left, right),
            },
        }
    }

    fn no_operator(op: &str, left: &DataType, right: &DataType) -> Result<DataType, AnalyzerError> {
        AnalyzerError::new(ErrorKind::FunctionNotFound, format!("operator does not exist: {left} {op} {right}"))
            .with_hint("No operator matches the given name and argument types. You might need to add explicit type casts.")
            .err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::{ColumnInfo, MemoryCatalog, ResultShape},
        parser::{
            analyzer::RelationExpander,
            ast::{CaseWhen, QualifiedName, SelectStmt, TypeName},
        },
    };

    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.create_table("t", vec![
            ColumnInfo::new("a", DataType::Integer),
            ColumnInfo::new("b", DataType::Text),
            ColumnInfo::new("tags", DataType::Array(Box::new(DataType::Text))),
        ]);
        catalog.create_function("lower", ResultShape::Scalar(DataType::Text), None, false);
        catalog
    }

    fn setup(catalog: &MemoryCatalog) -> AnalysisContext<'_> {
        let mut ctx = AnalysisContext::new(catalog);
        ctx.enter_child_scope();
        let id = ctx.catalog.lookup_relation(&QualifiedName::from("t")).unwrap();
        let entry = RelationExpander::base_relation(ctx.catalog.relation(id).unwrap(), None).unwrap();
        let slot = ctx.push_entry(entry).unwrap();
        ctx.push_namespace(slot, true, true, true).unwrap();
        ctx
    }

    #[test]
    fn operators_and_literals() {
        let catalog = catalog();
        let mut ctx = setup(&catalog);
        let sum = ctx.transform(&RawExpr::binary("+", RawExpr::column("a"), RawExpr::int(5_000_000_000))).unwrap();
        assert_eq!(sum.data_type(), DataType::BigInt);
        let cmp = ctx.transform(&RawExpr::binary("<", RawExpr::column("a"), RawExpr::int(1))).unwrap();
        assert_eq!(cmp.data_type(), DataType::Bool);

        let err = ctx.transform(&RawExpr::binary("-", RawExpr::column("b"), RawExpr::int(1))).unwrap_err();
        assert_eq!(err.message, "operator does not exist: text - integer");
    }

    #[test]
    fn functions_and_casts_use_the_catalog() {
        let catalog = catalog();
        let mut ctx = setup(&catalog);
        let lower = ctx.transform(&RawExpr::call("lower", vec![RawExpr::column("b")])).unwrap();
        assert_eq!(lower.data_type(), DataType::Text);

        let err = ctx.transform(&RawExpr::call("upper", vec![RawExpr::column("b"), RawExpr::int(1)])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FunctionNotFound);
        assert_eq!(err.message, "function upper(text, integer) does not exist");

        let cast = ctx.transform(&RawExpr::cast(RawExpr::column("a"), TypeName::new("bigint"))).unwrap();
        assert_eq!(cast.data_type(), DataType::BigInt);
        let err = ctx.transform(&RawExpr::cast(RawExpr::column("a"), TypeName::new("nosuch"))).unwrap_err();
        assert_eq!(err.message, "type \"nosuch\" does not exist");
    }

    #[test]
    fn constructs_promote_their_arguments() {
        let catalog = catalog();
        let mut ctx = setup(&catalog);
        let coalesce = ctx.transform(&RawExpr::coalesce(vec![RawExpr::null(), RawExpr::column("a"), RawExpr::int(5_000_000_000)])).unwrap();
        assert_eq!(coalesce.data_type(), DataType::BigInt);

        let err = ctx.transform(&RawExpr::coalesce(vec![RawExpr::column("a"), RawExpr::column("b")])).unwrap_err();
        assert_eq!(err.message, "COALESCE types integer and text cannot be matched");

        let case = RawExpr::Case {
            arg: None,
            whens: vec![CaseWhen { condition: RawExpr::boolean(true), result: RawExpr::column("b") }],
            default: Some(Box::new(RawExpr::null())),
        };
        assert_eq!(ctx.transform(&case).unwrap().data_type(), DataType::Text);

        let err = ctx.transform(&RawExpr::Array(vec![])).unwrap_err();
        assert_eq!(err.message, "cannot determine type of empty array");
    }

    #[test]
    fn subscripts_need_arrays() {
        let catalog = catalog();
        let mut ctx = setup(&catalog);
        let elem = ctx.transform(&RawExpr::subscript(RawExpr::column("tags"), RawExpr::int(1))).unwrap();
        assert_eq!(elem.data_type(), DataType::Text);

        let err = ctx.transform(&RawExpr::subscript(RawExpr::column("a"), RawExpr::int(1))).unwrap_err();
        assert_eq!(err.message, "cannot subscript type integer because it is not an array");
    }

    #[test]
    fn sublinks_see_the_outer_level() {
        let catalog = catalog();
        let mut ctx = setup(&catalog);
        let inner = SelectStmt::select_exprs(vec![RawExpr::column("a")]);
        let scalar = ctx.transform(&RawExpr::scalar_subquery(inner.clone())).unwrap();
        assert_eq!(scalar.data_type(), DataType::Integer);
        let TypedExpr::SubLink { query, .. } = &scalar else { panic!("expected sublink") };
        let var = query.target_list[0].expression.as_column().unwrap();
        assert_eq!(var.reference.levels_up, 1);

        assert_eq!(ctx.transform(&RawExpr::exists(inner.clone())).unwrap().data_type(), DataType::Bool);
        assert_eq!(
            ctx.transform(&RawExpr::array_subquery(inner)).unwrap().data_type(),
            DataType::Array(Box::new(DataType::Integer))
        );

        let two = SelectStmt::select_exprs(vec![RawExpr::column("a"), RawExpr::column("b")]);
        let err = ctx.transform(&RawExpr::scalar_subquery(two)).unwrap_err();
        assert_eq!(err.message, "subquery must return only one column");
    }
}
