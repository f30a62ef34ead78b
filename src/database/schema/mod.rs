pub mod data_type;
pub use data_type::*;

pub mod column_info;
pub use column_info::*;

pub mod relation_schema;
pub use relation_schema::*;

pub mod function_shape;
pub use function_shape::*;

pub mod system_column;
pub use system_column::*;

use std::sync::Arc;

use crate::{database::RelationId, parser::ast::{QualifiedName, TypeName}};

/// Read-only view of catalog metadata consumed by the analyzer.
///
/// Every call is treated as atomic and idempotent for the duration of one
/// statement's analysis.
pub trait Catalog {
    /// Resolve a (possibly schema-qualified) relation name to its identity.
    fn lookup_relation(&self, name: &QualifiedName) -> Option<RelationId>;

    /// Relation metadata, columns in attribute order including dropped ones.
    fn relation(&self, id: RelationId) -> Option<Arc<RelationSchema>>;

    fn lookup_function(&self, name: &QualifiedName) -> Option<FunctionSignature>;

    /// Resolve a type name to its type and type modifier.
    fn lookup_type(&self, name: &TypeName) -> Option<(DataType, i32)>;
}
