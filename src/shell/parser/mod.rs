pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod terminate;

pub use ast::{Command, Node, RedirectMode};
pub use parser::{parse, ParseError};
