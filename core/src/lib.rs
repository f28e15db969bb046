#![deny(
    unsafe_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]

//! A concurrent framework for hand-written lexers and parsers.
//!
//! Grammars supply two kinds of state functions: lexer states that read
//! runes from a [`Cursor`] and emit [`Token`]s, and parser states that
//! consume tokens and build a [`Tree`] through a mutable node cursor. The
//! framework drives both — the lexer as a trampoline of successor states,
//! the parser as a stack of pending states — and [`run`] wires them
//! together across a bounded token queue with shared cancellation.

pub mod config;
pub mod cursor;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod position;
pub mod run;
pub mod tree;

pub use config::RunConfig;
pub use cursor::Cursor;
pub use error::Error;
pub use lexer::{Lex, LexState, Lexer};
pub use parser::{boxed, BoxParseState, ParseState, Parser, TokenSource};
pub use position::{Position, Token, TokenKind};
pub use run::{run, run_with_config};
pub use tree::{Node, NodeId, Tree};
