use std::fmt::{self, Display};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::database::RelationId;

/// Type modifier value meaning "no precision/length recorded".
pub const TYPMOD_UNSPECIFIED: i32 = -1;

/// Header size folded into length-style type modifiers (`varchar(n)` stores `n + 4`).
const TYPMOD_HEADER: i32 = 4;

/// Static type of a column or expression, as far as name resolution needs it.
///
/// `Record` is the generic, shape-less row type: a value of this type has
/// fields, but which ones can only be learned by walking back to the
/// expression that produced it. `Composite` names a row type registered in the
/// catalog under a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum DataType {
    /// Untyped literal or parameter
    Unknown,
    Bool,
    SmallInt,
    Integer,
    BigInt,
    Numeric,
    Double,
    Text,
    Varchar,
    Date,
    Timestamp,
    Json,
    Oid,
    Tid,
    Xid,
    Cid,
    /// Anonymous row type
    Record,
    /// Row type of a catalog relation
    Composite(RelationId),
    Array(Box<DataType>),
}

static BUILTIN_TYPES: Lazy<IndexMap<&'static str, DataType>> = Lazy::new(|| {
    let mut m = IndexMap::new();
    m.insert("bool", DataType::Bool);
    m.insert("boolean", DataType::Bool);
    m.insert("int2", DataType::SmallInt);
    m.insert("smallint", DataType::SmallInt);
    m.insert("int", DataType::Integer);
    m.insert("int4", DataType::Integer);
    m.insert("integer", DataType::Integer);
    m.insert("int8", DataType::BigInt);
    m.insert("bigint", DataType::BigInt);
    m.insert("numeric", DataType::Numeric);
    m.insert("decimal", DataType::Numeric);
    m.insert("float8", DataType::Double);
    m.insert("double precision", DataType::Double);
    m.insert("text", DataType::Text);
    m.insert("varchar", DataType::Varchar);
    m.insert("character varying", DataType::Varchar);
    m.insert("date", DataType::Date);
    m.insert("timestamp", DataType::Timestamp);
    m.insert("json", DataType::Json);
    m.insert("oid", DataType::Oid);
    m.insert("tid", DataType::Tid);
    m.insert("xid", DataType::Xid);
    m.insert("cid", DataType::Cid);
    m.insert("record", DataType::Record);
    m
});

impl DataType {
    /// Resolve a builtin type name (case-insensitive).
    pub fn from_type_name(name: &str) -> Option<DataType> {
        BUILTIN_TYPES.get(name.to_ascii_lowercase().as_str()).cloned()
    }

    /// Numeric rank used by [`DataType::promote`]; `None` for non-numeric types.
    fn numeric_rank(&self) -> Option<u8> {
        match self {
            DataType::SmallInt => Some(1),
            DataType::Integer => Some(2),
            DataType::BigInt => Some(3),
            DataType::Numeric => Some(4),
            DataType::Double => Some(5),
            _ => None,
        }
    }

    /// Common supertype of two types, or `None` when they cannot be matched.
    ///
    /// `Unknown` yields to the other side, numeric types widen along
    /// smallint → integer → bigint → numeric → double, `varchar` widens to
    /// `text` and `date` to `timestamp`.
    pub fn promote(a: &DataType, b: &DataType) -> Option<DataType> {
        use DataType::*;
        if a == b {
            return Some(a.clone());
        }
        match (a, b) {
            (Unknown, other) | (other, Unknown) => Some(other.clone()),
            (Varchar, Text) | (Text, Varchar) => Some(Text),
            (Date, Timestamp) | (Timestamp, Date) => Some(Timestamp),
            (Array(x), Array(y)) => DataType::promote(x, y).map(|t| Array(Box::new(t))),
            (x, y) => match (x.numeric_rank(), y.numeric_rank()) {
                (Some(rx), Some(ry)) => Some(if rx >= ry { x.clone() } else { y.clone() }),
                _ => None,
            },
        }
    }

    /// True for any row-valued type, registered or anonymous.
    pub fn is_row_type(&self) -> bool {
        matches!(self, DataType::Record | DataType::Composite(_))
    }

    /// Build a length-style type modifier (`varchar(n)`).
    pub fn length_typmod(length: i32) -> i32 {
        length + TYPMOD_HEADER
    }

    /// Build a precision/scale type modifier (`numeric(p, s)`).
    pub fn numeric_typmod(precision: i32, scale: i32) -> i32 {
        ((precision << 16) | scale) + TYPMOD_HEADER
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Unknown => f.write_str("unknown"),
            DataType::Bool => f.write_str("boolean"),
            DataType::SmallInt => f.write_str("smallint"),
            DataType::Integer => f.write_str("integer"),
            DataType::BigInt => f.write_str("bigint"),
            DataType::Numeric => f.write_str("numeric"),
            DataType::Double => f.write_str("double precision"),
            DataType::Text => f.write_str("text"),
            DataType::Varchar => f.write_str("character varying"),
            DataType::Date => f.write_str("date"),
            DataType::Timestamp => f.write_str("timestamp"),
            DataType::Json => f.write_str("json"),
            DataType::Oid => f.write_str("oid"),
            DataType::Tid => f.write_str("tid"),
            DataType::Xid => f.write_str("xid"),
            DataType::Cid => f.write_str("cid"),
            DataType::Record => f.write_str("record"),
            DataType::Composite(id) => write!(f, "composite({id})"),
            DataType::Array(elem) => write!(f, "{elem}[]"),
        }
    }
}
