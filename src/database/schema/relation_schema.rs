use serde::{Deserialize, Serialize};

use crate::database::{ColumnInfo, RelationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum RelationKind {
    Table,
    View,
    ForeignTable,
    Stream,
    /// Standalone row type with no storage
    CompositeType,
}

/// Catalog description of a relation and its columns in attribute order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RelationSchema {
    pub id: RelationId,
    pub namespace: String,
    pub name: String,
    pub kind: RelationKind,
    pub columns: Vec<ColumnInfo>,
    pub has_oids: bool,
}

impl RelationSchema {
    /// Column metadata by 1-based attribute number.
    pub fn column(&self, attnum: u32) -> Option<&ColumnInfo> {
        if attnum == 0 {
            return None;
        }
        self.columns.get(attnum as usize - 1)
    }

    /// Attribute number of a live column.
    pub fn attnum_of(&self, name: &str) -> Option<u32> {
        self.columns
            .iter()
            .position(|c| !c.is_dropped && c.name == name)
            .map(|i| i as u32 + 1)
    }

    pub fn live_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| !c.is_dropped)
    }

    /// Only plain stored tables carry system columns.
    pub fn has_system_columns(&self) -> bool {
        self.kind == RelationKind::Table
    }
}
