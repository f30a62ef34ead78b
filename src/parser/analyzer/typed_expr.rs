use crate::{
    database::{DataType, FunctionId, TYPMOD_UNSPECIFIED},
    parser::{analyzer::{AnalyzedQuery, ResolvedRef}, ast::{Literal, MinMaxOp, SubLinkKind}},
};

/// Reference to a column (or whole row) of a range entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnVar {
    pub reference: ResolvedRef,
    pub ty: DataType,
    pub typmod: i32,
    pub location: Option<usize>,
}

impl ColumnVar {
    pub fn is_whole_row(&self) -> bool {
        self.reference.column_position.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseBranch {
    pub condition: TypedExpr,
    pub result: TypedExpr,
}

/// Expression after name resolution: every column reference is a
/// [`ColumnVar`] pointing into the scope chain and every node knows its type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedExpr {
    Column(ColumnVar),
    Const { value: Literal, ty: DataType },
    Param { number: u32, ty: DataType },
    /// Field `field_number` (1-based) of a row-valued expression
    FieldSelect { arg: Box<TypedExpr>, field_number: u32, field_name: String, ty: DataType, typmod: i32 },
    Subscript { arg: Box<TypedExpr>, index: Box<TypedExpr>, ty: DataType },
    FuncCall { function: FunctionId, name: String, args: Vec<TypedExpr>, ty: DataType, returns_set: bool },
    Cast { arg: Box<TypedExpr>, ty: DataType, typmod: i32 },
    Coalesce { args: Vec<TypedExpr>, ty: DataType },
    MinMax { op: MinMaxOp, args: Vec<TypedExpr>, ty: DataType },
    NullIf { left: Box<TypedExpr>, right: Box<TypedExpr>, ty: DataType },
    Row { args: Vec<TypedExpr>, field_names: Vec<String> },
    Array { elements: Vec<TypedExpr>, element_type: DataType },
    Case { branches: Vec<CaseBranch>, default: Option<Box<TypedExpr>>, ty: DataType },
    Op { op: String, left: Box<TypedExpr>, right: Box<TypedExpr>, ty: DataType },
    SubLink { kind: SubLinkKind, test: Option<Box<TypedExpr>>, query: Box<AnalyzedQuery>, ty: DataType },
    Collate { arg: Box<TypedExpr>, collation: String },
    Grouping { args: Vec<TypedExpr> },
}

impl TypedExpr {
    pub fn data_type(&self) -> DataType {
        match self {
            TypedExpr::Column(var) => var.ty.clone(),
            TypedExpr::Const { ty, .. }
            | TypedExpr::Param { ty, .. }
            | TypedExpr::FieldSelect { ty, .. }
            | TypedExpr::Subscript { ty, .. }
            | TypedExpr::FuncCall { ty, .. }
            | TypedExpr::Cast { ty, .. }
            | TypedExpr::Coalesce { ty, .. }
            | TypedExpr::MinMax { ty, .. }
            | TypedExpr::NullIf { ty, .. }
            | TypedExpr::Case { ty, .. }
            | TypedExpr::Op { ty, .. }
            | TypedExpr::SubLink { ty, .. } => ty.clone(),
            TypedExpr::Row { .. } => DataType::Record,
            TypedExpr::Array { element_type, .. } => DataType::Array(Box::new(element_type.clone())),
            TypedExpr::Collate { arg, .. } => arg.data_type(),
            TypedExpr::Grouping { .. } => DataType::Integer,
        }
    }

    pub fn typmod(&self) -> i32 {
        match self {
            TypedExpr::Column(var) => var.typmod,
            TypedExpr::FieldSelect { typmod, .. } | TypedExpr::Cast { typmod, .. } => *typmod,
            TypedExpr::Collate { arg, .. } => arg.typmod(),
            _ => TYPMOD_UNSPECIFIED,
        }
    }

    pub fn as_column(&self) -> Option<&ColumnVar> {
        match self {
            TypedExpr::Column(var) => Some(var),
            _ => None,
        }
    }

    /// Structural equality that ignores where in the text each column
    /// reference was written.
    pub fn same_as(&self, other: &TypedExpr) -> bool {
        let (mut a, mut b) = (self.clone(), other.clone());
        a.clear_locations();
        b.clear_locations();
        a == b
    }

    fn clear_locations(&mut self) {
        match self {
            TypedExpr::Column(var) => var.location = None,
            TypedExpr::Const { .. } | TypedExpr::Param { .. } | TypedExpr::SubLink { test: None, .. } => {}
            TypedExpr::SubLink { test: Some(arg), .. }
            | TypedExpr::FieldSelect { arg, .. }
            | TypedExpr::Cast { arg, .. }
            | TypedExpr::Collate { arg, .. } => arg.clear_locations(),
            TypedExpr::Subscript { arg: left, index: right, .. }
            | TypedExpr::NullIf { left, right, .. }
            | TypedExpr::Op { left, right, .. } => {
                left.clear_locations();
                right.clear_locations();
            }
            TypedExpr::FuncCall { args, .. }
            | TypedExpr::Coalesce { args, .. }
            | TypedExpr::MinMax { args, .. }
            | TypedExpr::Row { args, .. }
            | TypedExpr::Array { elements: args, .. }
            | TypedExpr::Grouping { args } => args.iter_mut().for_each(TypedExpr::clear_locations),
            TypedExpr::Case { branches, default, .. } => {
                for branch in branches {
                    branch.condition.clear_locations();
                    branch.result.clear_locations();
                }
                if let Some(d) = default {
                    d.clear_locations();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::analyzer::ColumnPosition;

    fn column(location: Option<usize>) -> TypedExpr {
        TypedExpr::Column(ColumnVar {
            reference: ResolvedRef::column(0, 1, ColumnPosition::User(1)),
            ty: DataType::Integer,
            typmod: TYPMOD_UNSPECIFIED,
            location,
        })
    }

    #[test]
    fn same_as_ignores_locations() {
        let one = TypedExpr::Const { value: Literal::Int(1), ty: DataType::Integer };
        let plus = |loc| TypedExpr::Op { op: "+".into(), left: Box::new(column(loc)), right: Box::new(one.clone()), ty: DataType::Integer };
        assert_ne!(plus(Some(7)), plus(Some(30)));
        assert!(plus(Some(7)).same_as(&plus(Some(30))));
        assert!(!plus(None).same_as(&column(None)));
    }
}
