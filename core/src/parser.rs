//! The parser state machine driver.
//!
//! Where the lexer trampoline follows a single successor, the parser runs a
//! *stack* of [`ParseState`]s: a state plans future work by pushing its
//! successors, then returns. The driver pops and runs states until the
//! stack empties, an error propagates, or the grammar signals that end of
//! input arrived exactly where it was allowed.
//!
//! Each state receives the [`Parser`] itself, which couples one-token
//! lookahead over a [`TokenSource`] with a mutable cursor into the
//! [`Tree`] under construction: push a child and descend, add a sibling,
//! climb to the parent, replace the current node's value in place, or
//! replace the root outright.

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::Error;
use crate::lexer::Lexer;
use crate::position::{Position, Token, TokenKind};
use crate::tree::{NodeId, Tree};

/// Anything the parser can pull tokens from.
///
/// Implemented by [`Lexer`] for direct, synchronous parsing and by the
/// coordinator's queue adapter for concurrent runs. Sources are infinite in
/// the sense that after the real stream ends they keep returning the EOF
/// sentinel.
pub trait TokenSource<K: TokenKind> {
    /// Returns the next token, or the EOF sentinel once exhausted.
    fn next_token(&mut self) -> Token<K>;
}

impl<K: TokenKind> TokenSource<K> for Lexer<K> {
    fn next_token(&mut self) -> Token<K> {
        Lexer::next_token(self)
    }
}

/// A boxed parser state, as stored on the state stack.
pub type BoxParseState<V, K> = Box<dyn ParseState<V, K>>;

/// A unit of parsing work.
///
/// States are consumed when run; plain functions and one-shot closures
/// qualify through the blanket implementation. A state that wants to run
/// again after its successors pushes itself back onto the stack.
pub trait ParseState<V, K: TokenKind>: Send {
    /// Consumes tokens, mutates the tree, and pushes successor states.
    fn run(self: Box<Self>, p: &mut Parser<V, K>) -> Result<(), Error>;
}

impl<V, K, F> ParseState<V, K> for F
where
    K: TokenKind,
    F: FnOnce(&mut Parser<V, K>) -> Result<(), Error> + Send,
{
    fn run(self: Box<Self>, p: &mut Parser<V, K>) -> Result<(), Error> {
        (*self)(p)
    }
}

/// Boxes a state for [`Parser::push_states`].
pub fn boxed<V, K: TokenKind>(state: impl ParseState<V, K> + 'static) -> BoxParseState<V, K> {
    Box::new(state)
}

/// Builds a [`Tree`] by running parse states against a token source.
pub struct Parser<V, K: TokenKind> {
    source: Box<dyn TokenSource<K> + Send>,
    peeked: Option<Token<K>>,
    stack: Vec<BoxParseState<V, K>>,
    tree: Tree<V>,
    current: NodeId,
    /// Start of the last consumed token; stamped onto new nodes.
    last_start: Position,
    cancel: CancellationToken,
}

impl<V, K: TokenKind> Parser<V, K> {
    /// Creates a parser over `source` with a tree rooted at `root_value`.
    ///
    /// The root's position is the start of input; push an initial state
    /// before calling [`Parser::parse`].
    pub fn new(source: impl TokenSource<K> + Send + 'static, root_value: V) -> Self {
        let tree = Tree::new(root_value, Position::default());
        let current = tree.root();
        Self {
            source: Box::new(source),
            peeked: None,
            stack: Vec::new(),
            tree,
            current,
            last_start: Position::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Installs the cancellation token observed between state invocations.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs states until the stack empties, an error propagates, or the
    /// grammar signals expected end of input.
    ///
    /// The tree is always returned; on error it holds whatever was built
    /// before the failure, so callers can still surface diagnostics.
    pub fn parse(mut self) -> (Tree<V>, Option<Error>) {
        loop {
            let Some(state) = self.stack.pop() else {
                debug!("parser state stack empty; parse complete");
                return (self.tree, None);
            };
            if self.cancel.is_cancelled() {
                debug!("parser observed cancellation");
                return (self.tree, Some(Error::Cancelled));
            }
            match state.run(&mut self) {
                Ok(()) => {}
                Err(error) if error.is_expected_eof() => {
                    debug!("parser reached expected end of input");
                    return (self.tree, None);
                }
                Err(error) => {
                    debug!(%error, "parser state failed");
                    return (self.tree, Some(error));
                }
            }
        }
    }

    // ----- token access -----

    /// The next token, fetched once and cached until consumed.
    pub fn peek(&mut self) -> &Token<K> {
        let source = &mut self.source;
        self.peeked.get_or_insert_with(|| {
            let token = source.next_token();
            trace!(kind = ?token.kind, "parser peeked token");
            token
        })
    }

    /// Consumes and returns the next token (the cached one, if
    /// [`Parser::peek`] fetched it). Nodes created afterwards start at this
    /// token's start position.
    pub fn next(&mut self) -> Token<K> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.source.next_token(),
        };
        trace!(kind = ?token.kind, text = %token.text, "parser consumed token");
        self.last_start = token.start.clone();
        token
    }

    // ----- state stack -----

    /// Pushes a single state to run next.
    pub fn push_state(&mut self, state: impl ParseState<V, K> + 'static) {
        self.stack.push(Box::new(state));
    }

    /// Pushes states so they run in the given order: the first element of
    /// `states` runs next, then the second, and so on.
    pub fn push_states<I>(&mut self, states: I)
    where
        I: IntoIterator<Item = BoxParseState<V, K>>,
        I::IntoIter: DoubleEndedIterator,
    {
        self.stack.extend(states.into_iter().rev());
    }

    // ----- tree cursor -----

    /// The root node.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// The current node.
    #[inline]
    pub fn current(&self) -> NodeId {
        self.current
    }

    /// The tree as built so far.
    #[inline]
    pub fn tree(&self) -> &Tree<V> {
        &self.tree
    }

    /// Creates a child under the current node and descends into it.
    pub fn push(&mut self, value: V) -> NodeId {
        let id = self
            .tree
            .push_child(self.current, value, self.last_start.clone());
        self.current = id;
        id
    }

    /// Creates a child under the current node without descending.
    pub fn add_node(&mut self, value: V) -> NodeId {
        self.tree
            .push_child(self.current, value, self.last_start.clone())
    }

    /// Creates a detached node, attached to nothing. Pair with
    /// [`Parser::set_root`].
    pub fn new_node(&mut self, value: V) -> NodeId {
        self.tree.new_node(value, self.last_start.clone())
    }

    /// Moves the current node to its parent and returns the node climbed
    /// from. At the root this is a no-op returning the root.
    pub fn climb(&mut self) -> NodeId {
        let from = self.current;
        if let Some(parent) = self.tree.parent(from) {
            self.current = parent;
        }
        from
    }

    /// Substitutes the current node's value in place, returning the
    /// previous value. Parent, children, and root status are unaffected.
    pub fn replace(&mut self, value: V) -> V {
        self.tree.replace_value(self.current, value)
    }

    /// Replaces the root outright and points the current node at it.
    pub fn set_root(&mut self, node: NodeId) {
        self.tree.set_root(node);
        self.current = node;
    }

    // ----- errors -----

    /// Builds a parse error at the start of the last consumed token.
    pub fn parse_error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            pos: self.last_start.clone(),
            message: message.into(),
        }
    }

    /// Builds the error for an unsuitable token: the distinguished
    /// unexpected-end-of-input variant when `token` is the EOF sentinel,
    /// and an ordinary parse error otherwise.
    pub fn unexpected(&self, token: &Token<K>, expected: impl Into<String>) -> Error {
        if token.is_eof() {
            Error::UnexpectedEof {
                pos: token.start.clone(),
                expected: expected.into(),
            }
        } else {
            Error::Parse {
                pos: token.start.clone(),
                message: format!("unexpected token `{}`, expected {}", token.text, expected.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tok {
        Eof,
        Word,
    }

    impl TokenKind for Tok {
        const EOF: Self = Tok::Eof;
    }

    /// Serves a fixed token list, then EOF forever.
    struct Fixed {
        tokens: std::vec::IntoIter<Token<Tok>>,
        end: Position,
    }

    impl Fixed {
        fn new(words: &[&str]) -> Self {
            let mut pos = Position::default();
            let mut tokens = Vec::new();
            for word in words {
                let start = pos.clone();
                for rune in word.chars() {
                    pos.bump(rune);
                }
                tokens.push(Token {
                    kind: Tok::Word,
                    text: (*word).to_owned(),
                    start,
                    end: pos.clone(),
                });
            }
            Self {
                tokens: tokens.into_iter(),
                end: pos,
            }
        }
    }

    impl TokenSource<Tok> for Fixed {
        fn next_token(&mut self) -> Token<Tok> {
            self.tokens
                .next()
                .unwrap_or_else(|| Token::eof(self.end.clone()))
        }
    }

    #[test]
    fn peek_caches_until_next() {
        let mut parser: Parser<&str, Tok> = Parser::new(Fixed::new(&["a", "b"]), "root");
        assert_eq!(parser.peek().text, "a");
        assert_eq!(parser.peek().text, "a");
        assert_eq!(parser.next().text, "a");
        assert_eq!(parser.peek().text, "b");
        assert_eq!(parser.next().text, "b");
        assert!(parser.next().is_eof());
    }

    #[test]
    fn nodes_start_at_last_consumed_token() {
        let mut parser: Parser<&str, Tok> = Parser::new(Fixed::new(&["ab", "cd"]), "root");
        // before any token is consumed, nodes start at the origin
        let early = parser.add_node("early");
        assert_eq!(parser.tree().get(early).start, Position::default());

        parser.next();
        parser.next();
        let late = parser.add_node("late");
        assert_eq!(parser.tree().get(late).start.offset, 2);
    }

    #[test]
    fn push_descends_and_climb_returns() {
        let mut parser: Parser<&str, Tok> = Parser::new(Fixed::new(&[]), "root");
        let child = parser.push("child");
        assert_eq!(parser.current(), child);
        let climbed_from = parser.climb();
        assert_eq!(climbed_from, child);
        assert_eq!(parser.current(), parser.root());
    }

    #[test]
    fn climb_at_root_is_noop() {
        let mut parser: Parser<&str, Tok> = Parser::new(Fixed::new(&[]), "root");
        let climbed_from = parser.climb();
        assert_eq!(climbed_from, parser.root());
        assert_eq!(parser.current(), parser.root());
    }

    #[test]
    fn replace_swaps_value_only() {
        let mut parser: Parser<&str, Tok> = Parser::new(Fixed::new(&[]), "root");
        parser.push("inner");
        parser.add_node("leaf");
        let previous = parser.replace("renamed");
        assert_eq!(previous, "inner");
        let current = parser.current();
        assert_eq!(*parser.tree().value(current), "renamed");
        assert_eq!(parser.tree().children(current).len(), 1);
    }

    #[test]
    fn set_root_moves_current() {
        let mut parser: Parser<&str, Tok> = Parser::new(Fixed::new(&[]), "root");
        let fresh = parser.new_node("fresh");
        parser.set_root(fresh);
        assert_eq!(parser.root(), fresh);
        assert_eq!(parser.current(), fresh);
    }

    #[test]
    fn push_states_run_in_listed_order() {
        let mut parser: Parser<Vec<&'static str>, Tok> = Parser::new(Fixed::new(&[]), Vec::new());
        parser.push_states([
            boxed(|p: &mut Parser<Vec<&'static str>, Tok>| {
                let root = p.root();
                p.tree.get_mut(root).value.push("first");
                Ok(())
            }),
            boxed(|p: &mut Parser<Vec<&'static str>, Tok>| {
                let root = p.root();
                p.tree.get_mut(root).value.push("second");
                Ok(())
            }),
        ]);
        let (tree, error) = parser.parse();
        assert!(error.is_none());
        assert_eq!(*tree.value(tree.root()), vec!["first", "second"]);
    }

    #[test]
    fn empty_stack_completes_immediately() {
        let parser: Parser<&str, Tok> = Parser::new(Fixed::new(&["unread"]), "root");
        let (tree, error) = parser.parse();
        assert!(error.is_none());
        assert_eq!(tree.iter().count(), 1);
    }

    #[test]
    fn expected_eof_converts_to_clean_completion() {
        fn done(p: &mut Parser<&'static str, Tok>) -> Result<(), Error> {
            let token = p.next();
            if token.is_eof() {
                Err(Error::ExpectedEof)
            } else {
                Err(p.unexpected(&token, "end of input"))
            }
        }
        let mut parser: Parser<&str, Tok> = Parser::new(Fixed::new(&[]), "root");
        parser.push_state(done);
        let (_, error) = parser.parse();
        assert!(error.is_none());
    }

    #[test]
    fn errors_return_partial_tree() {
        fn build_then_fail(p: &mut Parser<&'static str, Tok>) -> Result<(), Error> {
            p.add_node("built");
            let token = p.next();
            Err(p.unexpected(&token, "something else"))
        }
        let mut parser: Parser<&str, Tok> = Parser::new(Fixed::new(&["tok"]), "root");
        parser.push_state(build_then_fail);
        let (tree, error) = parser.parse();
        assert!(matches!(error, Some(Error::Parse { .. })));
        assert_eq!(tree.children(tree.root()).len(), 1);
    }

    #[test]
    fn unexpected_eof_is_distinguished() {
        let mut parser: Parser<&str, Tok> = Parser::new(Fixed::new(&[]), "root");
        let token = parser.next();
        let error = parser.unexpected(&token, "`}}`");
        assert!(matches!(error, Error::UnexpectedEof { .. }));
    }

    #[test]
    fn cancellation_stops_between_states() {
        let cancel = CancellationToken::new();
        let mut parser: Parser<&str, Tok> =
            Parser::new(Fixed::new(&[]), "root").with_cancel(cancel.clone());
        cancel.cancel();
        parser.push_state(|_: &mut Parser<&'static str, Tok>| Ok(()));
        let (_, error) = parser.parse();
        assert!(matches!(error, Some(Error::Cancelled)));
    }
}
