//! The lexer state machine driver.
//!
//! A grammar supplies [`LexState`] values; the [`Lexer`] runs them as a
//! trampoline over a [`Cursor`], collecting the tokens they emit and
//! handing them out one at a time through [`Lexer::next_token`]. Each state
//! does some amount of cursor work, emits zero or more tokens, and returns
//! either the next state or [`Lex::Stop`] to signal end of input.
//!
//! The lexer is a pull source: nothing runs until a token is requested.
//! Once the input ends — cleanly, by error, or by cancellation — every
//! subsequent `next_token` call returns the same EOF sentinel, and any
//! error is surfaced through [`Lexer::error`].

use std::collections::VecDeque;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::cursor::Cursor;
use crate::error::Error;
use crate::position::{Position, Token, TokenKind};

/// What a lexer state hands back to the driver: the next state to run, or
/// the end of input.
pub enum Lex<K: TokenKind> {
    /// Run this state next.
    Next(Box<dyn LexState<K>>),
    /// Input is exhausted; synthesize the EOF token.
    Stop,
}

impl<K: TokenKind> Lex<K> {
    /// Wraps a state (usually a plain function) as the next state to run.
    pub fn next(state: impl LexState<K> + 'static) -> Self {
        Lex::Next(Box::new(state))
    }
}

/// A unit of lexing work.
///
/// States are consumed when run, so plain functions and one-shot closures
/// both qualify through the blanket implementation; a state that should run
/// again simply returns itself via [`Lex::next`].
pub trait LexState<K: TokenKind>: Send {
    /// Reads from the cursor, emits tokens, and names what runs next.
    fn run(self: Box<Self>, lx: &mut Lexer<K>) -> Result<Lex<K>, Error>;
}

impl<K, F> LexState<K> for F
where
    K: TokenKind,
    F: FnOnce(&mut Lexer<K>) -> Result<Lex<K>, Error> + Send,
{
    fn run(self: Box<Self>, lx: &mut Lexer<K>) -> Result<Lex<K>, Error> {
        (*self)(lx)
    }
}

/// Drives a state machine over a [`Cursor`], producing a stream of tokens.
pub struct Lexer<K: TokenKind> {
    cursor: Cursor,
    queue: VecDeque<Token<K>>,
    state: Option<Box<dyn LexState<K>>>,
    /// Synthesized once input ends; returned on every call afterwards.
    eof: Option<Token<K>>,
    error: Option<Error>,
    cancel: CancellationToken,
}

impl<K: TokenKind> Lexer<K> {
    /// Creates a lexer running `initial` first.
    pub fn new(cursor: Cursor, initial: impl LexState<K> + 'static) -> Self {
        Self {
            cursor,
            queue: VecDeque::new(),
            state: Some(Box::new(initial)),
            eof: None,
            error: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Opens `path` and lexes it, attributing the path as the filename in
    /// every emitted position.
    pub fn for_file(path: impl AsRef<Path>, initial: impl LexState<K> + 'static) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let filename: Arc<str> = path.to_string_lossy().into();
        let cursor = Cursor::new(file).with_filename(filename);
        Ok(Self::new(cursor, initial))
    }

    /// Installs the cancellation token observed between state invocations.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the next token, running states as needed.
    ///
    /// After end of input the same EOF sentinel is returned on every call;
    /// a sticky error likewise terminates the stream with EOF and is
    /// surfaced through [`Lexer::error`].
    pub fn next_token(&mut self) -> Token<K> {
        loop {
            if let Some(token) = self.queue.pop_front() {
                trace!(kind = ?token.kind, text = %token.text, "lexer yields token");
                return token;
            }
            if let Some(eof) = &self.eof {
                return eof.clone();
            }
            if self.cancel.is_cancelled() {
                debug!("lexer observed cancellation");
                self.fail(Error::Cancelled);
                continue;
            }
            let Some(state) = self.state.take() else {
                self.finish();
                continue;
            };
            match state.run(self) {
                Ok(Lex::Next(next)) => self.state = Some(next),
                Ok(Lex::Stop) => {
                    debug!(pos = %self.cursor.pos(), "lexer reached end of input");
                    self.finish();
                }
                Err(error) => {
                    debug!(%error, "lexer state failed");
                    self.fail(error);
                }
            }
            // a failed read terminates lexing promptly, distinct from EOF
            if self.error.is_none() {
                if let Some(error) = self.cursor.take_error() {
                    self.fail(error);
                }
            }
        }
    }

    /// Packages the in-progress cursor text into a token and enqueues it.
    pub fn emit(&mut self, kind: K) {
        let token = self.cursor.emit(kind);
        self.queue.push_back(token);
    }

    /// Builds a lex error at the current reader position.
    pub fn lex_error(&self, message: impl Into<String>) -> Error {
        Error::Lex {
            pos: self.cursor.pos().clone(),
            message: message.into(),
        }
    }

    /// The sticky error, if lexing has failed.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Takes the sticky error, leaving the lexer terminated but errorless.
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// The underlying cursor, for operations without a delegate below.
    #[inline]
    pub fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    // Cursor delegates, so states read naturally as `lx.peek()`.

    /// See [`Cursor::peek`].
    #[inline]
    pub fn peek(&mut self) -> Option<char> {
        self.cursor.peek()
    }

    /// See [`Cursor::peek_n`].
    #[inline]
    pub fn peek_n(&mut self, n: usize) -> &[char] {
        self.cursor.peek_n(n)
    }

    /// See [`Cursor::next_rune`].
    #[inline]
    pub fn next_rune(&mut self) -> Option<char> {
        self.cursor.next_rune()
    }

    /// See [`Cursor::advance`].
    #[inline]
    pub fn advance(&mut self) -> Option<char> {
        self.cursor.advance()
    }

    /// See [`Cursor::advance_n`].
    #[inline]
    pub fn advance_n(&mut self, n: usize) -> usize {
        self.cursor.advance_n(n)
    }

    /// See [`Cursor::discard`].
    #[inline]
    pub fn discard(&mut self) -> Option<char> {
        self.cursor.discard()
    }

    /// See [`Cursor::discard_n`].
    #[inline]
    pub fn discard_n(&mut self, n: usize) -> usize {
        self.cursor.discard_n(n)
    }

    /// See [`Cursor::find`].
    #[inline]
    pub fn find<'n>(&mut self, needles: &[&'n str]) -> Option<&'n str> {
        self.cursor.find(needles)
    }

    /// See [`Cursor::discard_to`].
    #[inline]
    pub fn discard_to<'n>(&mut self, needles: &[&'n str]) -> Option<&'n str> {
        self.cursor.discard_to(needles)
    }

    /// See [`Cursor::ignore`].
    #[inline]
    pub fn ignore(&mut self) {
        self.cursor.ignore()
    }

    /// See [`Cursor::width`].
    #[inline]
    pub fn width(&self) -> usize {
        self.cursor.width()
    }

    /// See [`Cursor::current_text`].
    #[inline]
    pub fn current_text(&self) -> &str {
        self.cursor.current_text()
    }

    /// See [`Cursor::pos`].
    #[inline]
    pub fn pos(&self) -> &Position {
        self.cursor.pos()
    }

    /// See [`Cursor::token_start`].
    #[inline]
    pub fn token_start(&self) -> &Position {
        self.cursor.token_start()
    }

    fn finish(&mut self) {
        self.state = None;
        self.eof = Some(Token::eof(self.cursor.pos().clone()));
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.finish();
    }
}
