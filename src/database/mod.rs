pub mod id_type;
pub use id_type::*;

pub mod config;
pub use config::*;

pub mod memory_catalog;
pub use memory_catalog::*;

pub mod schema;
pub use schema::*;
