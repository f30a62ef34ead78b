use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    database::{Catalog, ColumnInfo, DataType, FunctionId, FunctionSignature, RelationId, RelationKind, RelationSchema, ResultShape, TYPMOD_UNSPECIFIED},
    parser::ast::{QualifiedName, TypeName},
};

/// Catalog shared between analyses running on different threads.
pub type SharedCatalog = Arc<RwLock<MemoryCatalog>>;

const FIRST_USER_ID: u32 = 16384;

/// In-memory catalog: relations grouped by namespace, resolved through a
/// search path for unqualified names, plus a flat function registry.
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    search_path: Vec<String>,
    relations: IndexMap<RelationId, Arc<RelationSchema>>,
    by_name: IndexMap<(String, String), RelationId>,
    functions: IndexMap<String, FunctionSignature>,
    next_id: u32,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self {
            search_path: vec!["public".to_string()],
            relations: IndexMap::new(),
            by_name: IndexMap::new(),
            functions: IndexMap::new(),
            next_id: FIRST_USER_ID,
        }
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_path(mut self, namespaces: &[&str]) -> Self {
        self.search_path = namespaces.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn into_shared(self) -> SharedCatalog {
        Arc::new(RwLock::new(self))
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn default_namespace(&self) -> String {
        self.search_path.first().cloned().unwrap_or_else(|| "public".to_string())
    }

    /// Register a relation of any kind; returns its new identity.
    pub fn create_relation(&mut self, namespace: &str, name: &str, kind: RelationKind, columns: Vec<ColumnInfo>) -> RelationId {
        let id = RelationId(self.allocate_id());
        let schema = RelationSchema {
            id,
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind,
            columns,
            has_oids: false,
        };
        debug!(relation = name, namespace, id = id.0, "registering relation");
        self.by_name.insert((namespace.to_string(), name.to_string()), id);
        self.relations.insert(id, Arc::new(schema));
        id
    }

    /// Register a plain table in the first namespace of the search path.
    pub fn create_table(&mut self, name: &str, columns: Vec<ColumnInfo>) -> RelationId {
        let namespace = self.default_namespace();
        self.create_relation(&namespace, name, RelationKind::Table, columns)
    }

    pub fn create_view(&mut self, name: &str, columns: Vec<ColumnInfo>) -> RelationId {
        let namespace = self.default_namespace();
        self.create_relation(&namespace, name, RelationKind::View, columns)
    }

    pub fn create_composite_type(&mut self, name: &str, columns: Vec<ColumnInfo>) -> RelationId {
        let namespace = self.default_namespace();
        self.create_relation(&namespace, name, RelationKind::CompositeType, columns)
    }

    /// Mark a live column dropped; later attribute numbers are untouched.
    pub fn drop_column(&mut self, id: RelationId, column: &str) -> bool {
        let Some(schema) = self.relations.get_mut(&id) else {
            return false;
        };
        let schema = Arc::make_mut(schema);
        match schema.columns.iter_mut().find(|c| !c.is_dropped && c.name == column) {
            Some(col) => {
                col.is_dropped = true;
                true
            }
            None => false,
        }
    }

    pub fn set_has_oids(&mut self, id: RelationId, has_oids: bool) {
        if let Some(schema) = self.relations.get_mut(&id) {
            Arc::make_mut(schema).has_oids = has_oids;
        }
    }

    pub fn create_function(&mut self, name: &str, result: ResultShape, out_param_name: Option<&str>, returns_set: bool) -> FunctionId {
        let id = FunctionId(self.allocate_id());
        self.functions.insert(name.to_ascii_lowercase(), FunctionSignature {
            id,
            name: name.to_string(),
            result,
            out_param_name: out_param_name.map(str::to_string),
            returns_set,
        });
        id
    }

    fn resolve_relation(&self, name: &QualifiedName) -> Option<RelationId> {
        match name.schema() {
            Some(namespace) => self.by_name.get(&(namespace.to_string(), name.name().to_string())).copied(),
            None => self.search_path
                .iter()
                .find_map(|ns| self.by_name.get(&(ns.clone(), name.name().to_string())).copied()),
        }
    }

    fn resolve_type(&self, name: &TypeName) -> Option<(DataType, i32)> {
        let (base, typmod) = match DataType::from_type_name(&name.last_name()) {
            Some(ty) => {
                let typmod = match (&ty, name.typmods.as_slice()) {
                    (DataType::Varchar, [len]) => DataType::length_typmod(*len),
                    (DataType::Numeric, [p]) => DataType::numeric_typmod(*p, 0),
                    (DataType::Numeric, [p, s]) => DataType::numeric_typmod(*p, *s),
                    _ => TYPMOD_UNSPECIFIED,
                };
                (ty, typmod)
            }
            None => {
                let id = self.resolve_relation(&QualifiedName::new(name.names.clone()))?;
                (DataType::Composite(id), TYPMOD_UNSPECIFIED)
            }
        };
        let ty = (0..name.array_bounds).fold(base, |t, _| DataType::Array(Box::new(t)));
        Some((ty, typmod))
    }
}

impl Catalog for MemoryCatalog {
    fn lookup_relation(&self, name: &QualifiedName) -> Option<RelationId> {
        self.resolve_relation(name)
    }

    fn relation(&self, id: RelationId) -> Option<Arc<RelationSchema>> {
        self.relations.get(&id).cloned()
    }

    fn lookup_function(&self, name: &QualifiedName) -> Option<FunctionSignature> {
        self.functions.get(&name.name().to_ascii_lowercase()).cloned()
    }

    fn lookup_type(&self, name: &TypeName) -> Option<(DataType, i32)> {
        self.resolve_type(name)
    }
}

impl Catalog for SharedCatalog {
    fn lookup_relation(&self, name: &QualifiedName) -> Option<RelationId> {
        let guard = self.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.lookup_relation(name)
    }

    fn relation(&self, id: RelationId) -> Option<Arc<RelationSchema>> {
        let guard = self.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.relation(id)
    }

    fn lookup_function(&self, name: &QualifiedName) -> Option<FunctionSignature> {
        let guard = self.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.lookup_function(name)
    }

    fn lookup_type(&self, name: &TypeName) -> Option<(DataType, i32)> {
        let guard = self.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.lookup_type(name)
    }
}
