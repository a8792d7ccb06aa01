pub mod error;
pub mod lexer;
pub mod parser;

pub use parser::{Operator, OperatorKind, compile};
