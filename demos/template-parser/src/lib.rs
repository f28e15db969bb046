#![deny(
    unsafe_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]

//! Template Language Example
//!
//! A small text-templating grammar built on lexkit: literal text
//! interleaved with `{{ variable }}` substitutions and
//! `{% if cond %}...{% else %}...{% endif %}` branches. The lexer walks
//! the input with a multi-needle scan for the opening delimiters; the
//! parser builds a tree of [`Ast`] nodes that [`render`](ast::render)
//! evaluates against a string map.
//!
//! # Syntax
//!
//! ```text
//! Hello, {% if name %}{{ name }}{% else %}stranger{% endif %}!
//! ```

use lexkit::{Cursor, Error, Lexer, TokenKind, Tree};
use tokio_util::sync::CancellationToken;

pub mod ast;
pub mod lex;
pub mod parse;

pub use ast::{render, Ast};

/// Token tags of the template grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tok {
    /// End of input.
    Eof,
    /// Literal text between actions.
    Text,
    /// `{{`
    VarOpen,
    /// `}}`
    VarClose,
    /// `{%`
    TagOpen,
    /// `%}`
    TagClose,
    /// A variable or condition name.
    Ident,
    /// `if`
    KwIf,
    /// `else`
    KwElse,
    /// `endif`
    KwEndif,
}

impl TokenKind for Tok {
    const EOF: Self = Tok::Eof;
}

/// Parses a template, returning the tree and the first error.
///
/// The tree is returned even on error, holding whatever parsed before the
/// failure.
pub fn parse_str(input: &str) -> (Tree<Ast>, Option<Error>) {
    let cancel = CancellationToken::new();
    let lexer = Lexer::new(Cursor::from(input), lex::lex_text);
    lexkit::run(&cancel, lexer, Ast::Root, parse::parse_template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_plain_text() {
        let mut lexer = Lexer::new(Cursor::from("just text"), lex::lex_text);
        let token = lexer.next_token();
        assert_eq!(token.kind, Tok::Text);
        assert_eq!(token.text, "just text");
        assert!(lexer.next_token().is_eof());
    }

    #[test]
    fn lexes_variable_action() {
        let mut lexer = Lexer::new(Cursor::from("{{ name }}"), lex::lex_text);
        let kinds: Vec<Tok> = std::iter::from_fn(|| {
            let token = lexer.next_token();
            (!token.is_eof()).then_some(token.kind)
        })
        .collect();
        assert_eq!(kinds, vec![Tok::VarOpen, Tok::Ident, Tok::VarClose]);
    }

    #[test]
    fn keywords_are_distinguished_from_idents() {
        let mut lexer = Lexer::new(Cursor::from("{% if cond %}"), lex::lex_text);
        let kinds: Vec<Tok> = std::iter::from_fn(|| {
            let token = lexer.next_token();
            (!token.is_eof()).then_some(token.kind)
        })
        .collect();
        assert_eq!(kinds, vec![Tok::TagOpen, Tok::KwIf, Tok::Ident, Tok::TagClose]);
    }

    #[test]
    fn rejects_stray_rune_inside_action() {
        let mut lexer = Lexer::new(Cursor::from("{{ a ? }}"), lex::lex_text);
        loop {
            if lexer.next_token().is_eof() {
                break;
            }
        }
        assert!(matches!(lexer.error(), Some(Error::Lex { .. })));
    }
}
