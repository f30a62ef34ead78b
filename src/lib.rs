pub mod parser;

pub mod database;
pub use database::{AnalyzerConfig, Catalog, DataType, MemoryCatalog, RelationId, SharedCatalog};

pub use parser::analyzer::{AnalyzedQuery, AnalyzerError, ErrorKind, QueryAnalyzer};
