use serde::{Deserialize, Serialize};

use crate::database::{DataType, FunctionId, RelationId};

/// Declared result shape of a function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum ResultShape {
    Scalar(DataType),
    /// Row type registered in the catalog
    Composite(RelationId),
    /// `record`: the caller must supply a column definition list
    GenericRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FunctionSignature {
    pub id: FunctionId,
    pub name: String,
    pub result: ResultShape,
    /// Name of the single OUT parameter, if the function declares one.
    pub out_param_name: Option<String>,
    pub returns_set: bool,
}

impl FunctionSignature {
    pub fn result_type(&self) -> DataType {
        match &self.result {
            ResultShape::Scalar(ty) => ty.clone(),
            ResultShape::Composite(id) => DataType::Composite(*id),
            ResultShape::GenericRecord => DataType::Record,
        }
    }
}
