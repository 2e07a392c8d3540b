//! Block-structured description language: lexer, generic tree and parser.
//!
//! The parser knows nothing about cells or pins. It turns text into a tree of
//! [`Group`]s; meaning is assigned later by [`crate::library::builder`].
//!
//! # Grammar Overview
//!
//! ```text
//! file       = { statement }
//! statement  = group | attribute | complex
//! group      = identifier [ "(" [ value { "," value } ] ")" ] "{" { statement } "}"
//! attribute  = identifier ":" value ";"
//! complex    = identifier "(" [ value { "," value } ] ")" ";"
//! value      = identifier | string | number | "true" | "false"
//!
//! identifier = (letter | '_' | '$') { letter | digit | '_' | '$' | '.' }
//! string     = '"' { any_char | '\"' } '"'
//! number     = ['-' | '+'] digit* ['.' digit*] [('e'|'E') ['-'|'+'] digit+]
//! ```
//!
//! Comments are `/* ... */` and `// ...`; a backslash before a line break
//! continues the line. Groups may nest at most [`MAX_GROUP_DEPTH`] levels.
//!
//! # Example
//!
//! ```text
//! library(demo) {
//!   cell(NOT) {
//!     pin(A) { direction: input; }
//!     pin(Y) { direction: output; function: "A'"; }
//!   }
//! }
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_number, Lexer, Token, TokenKind};
pub use parser::{Parser, MAX_GROUP_DEPTH};

pub(crate) use lexer::{is_identifier_continue, is_identifier_start};

use crate::error::ParseError;

/// Parse library text into its top-level groups, recovering from errors.
pub fn parse(input: &str) -> Result<Vec<Group>, Vec<ParseError>> {
    parse_with_recovery(input, true)
}

/// Parse library text, optionally stopping at the first error.
pub fn parse_with_recovery(input: &str, recover: bool) -> Result<Vec<Group>, Vec<ParseError>> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer).with_recovery(recover);
    parser.parse()
}
