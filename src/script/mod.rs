//! Sketch script: the language the rewriter targets
//!
//! A small JavaScript-like dialect. Source is tokenized and parsed into an
//! AST, then interpreted against the capability set only; there is no
//! dynamic evaluation of host code.

mod ast;
mod eval;
mod parser;
mod scope;
mod token;
mod value;

pub use ast::{CastKind, Program};
pub use eval::{Interpreter, Interrupt};
pub use parser::parse;
pub use scope::Scope;
pub use value::{Handle, Value};
