pub mod literal;
pub use literal::Literal;
