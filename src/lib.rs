//! Scrapscript - an interpreter for a small, purely functional
//! expression language with content-addressed imports.
//!
//! This library provides the scanner, parser, Hindley-Milner type
//! inferencer, evaluator and the yard fetchers for resolving imports
//! by SHA-256 hash.

pub mod ast;
pub mod env;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod source;
pub mod types;
pub mod yards;

pub use env::Environment;
pub use eval::Value;
pub use source::Error;
