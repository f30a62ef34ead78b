use serde::Serialize;

use crate::{
    database::{DataType, RelationId},
    parser::analyzer::TypedExpr,
};

/// Base table column an output column was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnOrigin {
    pub relation: RelationId,
    /// Attribute number; 0 for a whole-row reference.
    pub column: i32,
}

/// One entry of a query's target list.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub expression: TypedExpr,
    pub position: u32,
    pub display_name: Option<String>,
    /// Bookkeeping column (e.g. an ORDER BY expression), not part of the result.
    pub is_hidden: bool,
    pub origin: Option<ColumnOrigin>,
}

/// Client-facing description of a result column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultColumnDescription {
    pub name: String,
    pub position: u32,
    pub data_type: DataType,
    pub typmod: i32,
    pub origin: Option<ColumnOrigin>,
}

impl OutputColumn {
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or("?column?")
    }

    pub fn describe(&self) -> ResultColumnDescription {
        ResultColumnDescription {
            name: self.name().to_string(),
            position: self.position,
            data_type: self.expression.data_type(),
            typmod: self.expression.typmod(),
            origin: self.origin,
        }
    }
}
