//! Syntax building blocks: spans, tokens and the AST

pub mod ast;
pub mod span;
pub mod token;
