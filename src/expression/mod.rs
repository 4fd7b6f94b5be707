//! Tokenizer and parser for free-text decision conditions such as
//! `Age >= 18 AND NOT (Status == "blocked")`.

pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Token, TokenKind, tokenize};
pub use parser::{Parser, parse};
