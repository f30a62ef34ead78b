pub mod analyzer_error;
pub use analyzer_error::*;

pub mod resolved_ref;
pub use resolved_ref::*;

pub mod typed_expr;
pub use typed_expr::*;

pub mod output_column;
pub use output_column::*;

pub mod range_entry;
pub use range_entry::*;

pub mod scope;
pub use scope::*;

pub mod analyzed_query;
pub use analyzed_query::*;

pub mod analysis_context;
pub use analysis_context::*;

pub mod type_inference;
pub use type_inference::*;

pub mod query_analyzer;
pub use query_analyzer::*;

pub mod resolvers;
pub use resolvers::*;

#[cfg(test)]
mod _tests;
