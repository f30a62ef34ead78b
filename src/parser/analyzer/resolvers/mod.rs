pub mod relation_expander;
pub use relation_expander::*;

pub mod privilege_marker;
pub use privilege_marker::*;

pub mod table_resolver;
pub use table_resolver::*;

pub mod diagnostic_resolver;
pub use diagnostic_resolver::*;

pub mod column_resolver;
pub use column_resolver::*;

pub mod record_resolver;
pub use record_resolver::*;

pub mod wildcard_resolver;
pub use wildcard_resolver::*;

pub mod column_namer;
pub use column_namer::*;

pub mod target_list_resolver;
pub use target_list_resolver::*;

pub mod from_clause_resolver;
pub use from_clause_resolver::*;

pub mod cte_resolver;
pub use cte_resolver::*;

pub mod order_by_resolver;
pub use order_by_resolver::*;
