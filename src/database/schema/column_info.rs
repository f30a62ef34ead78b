use serde::{Deserialize, Serialize};

use crate::database::{DataType, TYPMOD_UNSPECIFIED};

/// Catalog metadata for one column of a relation.
///
/// Dropped columns keep their slot so attribute numbers of later columns stay
/// stable; their name is never matched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub ty: DataType,
    pub typmod: i32,
    pub is_dropped: bool,
}

impl ColumnInfo {
    pub fn new(name: &str, ty: DataType) -> Self {
        Self { name: name.to_string(), ty, typmod: TYPMOD_UNSPECIFIED, is_dropped: false }
    }

    pub fn with_typmod(mut self, typmod: i32) -> Self {
        self.typmod = typmod;
        self
    }

    /// A dropped column placeholder.
    pub fn dropped() -> Self {
        Self { name: String::new(), ty: DataType::Unknown, typmod: TYPMOD_UNSPECIFIED, is_dropped: true }
    }
}
