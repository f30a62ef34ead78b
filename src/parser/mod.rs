pub mod ast;

pub mod analyzer;
