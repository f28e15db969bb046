//! The coordinator: runs a lexer and a parser concurrently.
//!
//! [`run`] spawns the lexer pull loop on its own thread and parses on the
//! calling thread, bridged by a bounded token channel. The bound is the
//! only backpressure in the pipeline: the producer blocks when the queue is
//! full, the consumer when it is empty. Tokens arrive at the parser in
//! exactly the order the lexer emitted them.
//!
//! Cancellation is a single token shared by both sides, checked between
//! state invocations. The caller's token is the external signal; `run`
//! derives a child from it so that parser completion can release a
//! still-producing lexer without the resulting "cancelled" error being
//! mistaken for a caller-requested abort.

use std::thread;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::RunConfig;
use crate::error::Error;
use crate::lexer::Lexer;
use crate::parser::{ParseState, Parser, TokenSource};
use crate::position::{Position, Token, TokenKind};
use crate::tree::Tree;

/// Token source backed by the coordinator's bounded queue.
///
/// Once the producer is gone the source synthesizes EOF at the last
/// delivered position, so the parser can always make progress.
struct QueueSource<K: TokenKind> {
    rx: mpsc::Receiver<Token<K>>,
    last_end: Position,
}

impl<K: TokenKind> TokenSource<K> for QueueSource<K> {
    fn next_token(&mut self) -> Token<K> {
        match self.rx.blocking_recv() {
            Some(token) => {
                self.last_end = token.end.clone();
                token
            }
            None => Token::eof(self.last_end.clone()),
        }
    }
}

/// Runs `lexer` and the parser rooted at `root_value` concurrently,
/// returning the tree and the first meaningful error.
///
/// The parser's error takes precedence. The lexer's error is surfaced only
/// when the parser reports none, and never when it is the expected-EOF
/// sentinel or a cancellation triggered by the parser's own completion —
/// a parser failure routinely cancels the lexer, and reporting that
/// cancellation would mask the real cause.
///
/// # Example
///
/// ```ignore
/// let cancel = CancellationToken::new();
/// let lexer = Lexer::new(Cursor::from(input), lex_text);
/// let (tree, error) = run(&cancel, lexer, Ast::Root, parse_item);
/// ```
pub fn run<V, K>(
    cancel: &CancellationToken,
    lexer: Lexer<K>,
    root_value: V,
    initial: impl ParseState<V, K> + 'static,
) -> (Tree<V>, Option<Error>)
where
    K: TokenKind + Send + 'static,
{
    run_with_config(cancel, lexer, root_value, initial, RunConfig::default())
}

/// [`run`] with an explicit [`RunConfig`].
pub fn run_with_config<V, K>(
    cancel: &CancellationToken,
    lexer: Lexer<K>,
    root_value: V,
    initial: impl ParseState<V, K> + 'static,
    config: RunConfig,
) -> (Tree<V>, Option<Error>)
where
    K: TokenKind + Send + 'static,
{
    let local = cancel.child_token();
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

    let mut lexer = lexer.with_cancel(local.clone());
    let producer = thread::Builder::new()
        .name("lexkit-lexer".into())
        .spawn(move || {
            loop {
                let token = lexer.next_token();
                let done = token.is_eof();
                if tx.blocking_send(token).is_err() {
                    // consumer is gone; whatever stopped it owns the error
                    debug!("token queue closed; lexer loop exiting");
                    break;
                }
                trace!(done, "lexer loop forwarded token");
                if done {
                    break;
                }
            }
            lexer.take_error()
        });

    let source = QueueSource {
        rx,
        last_end: Position::default(),
    };
    let mut parser = Parser::new(source, root_value).with_cancel(local.clone());
    parser.push_state(initial);
    let (tree, parse_error) = parser.parse();

    // parser completion releases a lexer still blocked on the queue
    local.cancel();

    let lex_error = match producer {
        Ok(handle) => match handle.join() {
            Ok(error) => error,
            Err(_) => Some(Error::Lex {
                pos: Position::default(),
                message: "lexer thread panicked".into(),
            }),
        },
        Err(spawn_error) => Some(Error::Read {
            pos: Position::default(),
            source: spawn_error,
        }),
    };

    let error = aggregate(parse_error, lex_error, cancel);
    debug!(error = ?error, "coordinated run finished");
    (tree, error)
}

/// Picks the error to report: parser first, then any lexer error that is
/// neither clean termination nor the cancellation we caused ourselves.
fn aggregate(
    parse_error: Option<Error>,
    lex_error: Option<Error>,
    external: &CancellationToken,
) -> Option<Error> {
    if parse_error.is_some() {
        return parse_error;
    }
    match lex_error {
        Some(error) if error.is_expected_eof() => None,
        Some(error) if error.is_cancelled() && !external.is_cancelled() => None,
        other => other,
    }
}
