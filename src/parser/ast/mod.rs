pub mod identifier;
pub use identifier::*;

pub mod type_name;
pub use type_name::*;

pub mod literals;
pub use literals::*;

pub mod raw_expr;
pub use raw_expr::*;

pub mod from_item;
pub use from_item::*;

pub mod select_stmt;
pub use select_stmt::*;
