//! Language frontend: lexing, AST construction and parsing
//!
//! The pipeline is lex -> parse -> emit, with no separate semantic pass:
//! the parser resolves names and checks types as it builds each tree, and
//! hands finished function trees straight to the code generator.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
