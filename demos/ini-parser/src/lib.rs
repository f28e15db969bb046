#![deny(
    unsafe_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]

//! INI Example
//!
//! A line-oriented INI grammar built on lexkit: `[section]` headers,
//! `key = value` properties, and `;`/`#` comments. Properties before the
//! first section header attach directly to the document root; every later
//! property attaches to the most recent section.
//!
//! ```text
//! ; server settings
//! [server]
//! host = example.com
//! port = 8080
//! ```

use lexkit::{Cursor, Error, Lexer, TokenKind, Tree};
use tokio_util::sync::CancellationToken;

pub mod lex;
pub mod parse;

pub use parse::Ini;

/// Token tags of the INI grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tok {
    /// End of input.
    Eof,
    /// A section name, without its surrounding brackets.
    Section,
    /// A property key.
    Key,
    /// A property value, possibly empty.
    Value,
}

impl TokenKind for Tok {
    const EOF: Self = Tok::Eof;
}

/// Parses an INI document, returning the tree and the first error.
pub fn parse_str(input: &str) -> (Tree<Ini>, Option<Error>) {
    let cancel = CancellationToken::new();
    let lexer = Lexer::new(Cursor::from(input), lex::lex_line);
    lexkit::run(&cancel, lexer, Ini::Document, parse::parse_ini)
}
