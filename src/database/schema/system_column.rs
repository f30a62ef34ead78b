use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::database::DataType;

/// Pseudo columns every stored table row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SystemColumn {
    Ctid,
    Oid,
    Xmin,
    Cmin,
    Xmax,
    Cmax,
    TableOid,
}

static BY_NAME: Lazy<IndexMap<&'static str, SystemColumn>> = Lazy::new(|| {
    SystemColumn::ALL.iter().map(|c| (c.name(), *c)).collect()
});

impl SystemColumn {
    pub const ALL: [SystemColumn; 7] = [
        SystemColumn::Ctid,
        SystemColumn::Oid,
        SystemColumn::Xmin,
        SystemColumn::Cmin,
        SystemColumn::Xmax,
        SystemColumn::Cmax,
        SystemColumn::TableOid,
    ];

    pub fn lookup(name: &str) -> Option<SystemColumn> {
        BY_NAME.get(name).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            SystemColumn::Ctid => "ctid",
            SystemColumn::Oid => "oid",
            SystemColumn::Xmin => "xmin",
            SystemColumn::Cmin => "cmin",
            SystemColumn::Xmax => "xmax",
            SystemColumn::Cmax => "cmax",
            SystemColumn::TableOid => "tableoid",
        }
    }

    /// Negative attribute number, distinct from every user column.
    pub fn attnum(self) -> i32 {
        match self {
            SystemColumn::Ctid => -1,
            SystemColumn::Oid => -2,
            SystemColumn::Xmin => -3,
            SystemColumn::Cmin => -4,
            SystemColumn::Xmax => -5,
            SystemColumn::Cmax => -6,
            SystemColumn::TableOid => -7,
        }
    }

    pub fn data_type(self) -> DataType {
        match self {
            SystemColumn::Ctid => DataType::Tid,
            SystemColumn::Oid | SystemColumn::TableOid => DataType::Oid,
            SystemColumn::Xmin | SystemColumn::Xmax => DataType::Xid,
            SystemColumn::Cmin | SystemColumn::Cmax => DataType::Cid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        assert_eq!(SystemColumn::lookup("ctid"), Some(SystemColumn::Ctid));
        assert_eq!(SystemColumn::lookup("tableoid").map(SystemColumn::attnum), Some(-7));
        assert_eq!(SystemColumn::lookup("rowid"), None);
    }
}
