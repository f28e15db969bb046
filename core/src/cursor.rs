//! Buffered rune-level input cursor.
//!
//! [`Cursor`] wraps an arbitrary byte source and presents it as a stream of
//! runes with lookahead, while maintaining two synchronized coordinates: the
//! *reader position* (how far input has been consumed) and the *token
//! cursor* (where the current in-progress token began). The span between
//! them is exactly the in-progress token text, which [`Cursor::emit`]
//! packages into a [`Token`].
//!
//! Bytes are read in chunks and decoded incrementally as UTF-8; a partial
//! sequence at a chunk boundary is retained until the next read completes
//! it. End of input is not an error. An I/O failure or undecodable byte
//! sequence puts the cursor into a sticky error state: every subsequent
//! operation behaves as if at end of input, and the recorded error is
//! surfaced through [`Cursor::error`].

use core::fmt;
use std::collections::VecDeque;
use std::io;
use std::mem;
use std::str;
use std::sync::Arc;

use tracing::debug;

use crate::error::Error;
use crate::position::{Position, Token, TokenKind};

const DEFAULT_CHUNK_SIZE: usize = 4096;

/// A buffered rune reader over a byte source.
pub struct Cursor {
    source: Box<dyn io::Read + Send>,
    /// Scratch buffer handed to the source on each read.
    scratch: Vec<u8>,
    /// Bytes read from the source but not yet decoded. Non-empty between
    /// fills only when the chunk ended mid-sequence.
    raw: Vec<u8>,
    /// Runes decoded but not yet consumed.
    lookahead: VecDeque<char>,
    /// The in-progress token text, covering `[start, pos)`.
    text: String,
    /// Reader position: coordinate of the next unconsumed rune.
    pos: Position,
    /// Token cursor: coordinate of the first rune of the in-progress token.
    start: Position,
    source_eof: bool,
    error: Option<Error>,
}

impl Cursor {
    /// Creates a cursor over the given byte source.
    pub fn new(source: impl io::Read + Send + 'static) -> Self {
        Self {
            source: Box::new(source),
            scratch: vec![0; DEFAULT_CHUNK_SIZE],
            raw: Vec::new(),
            lookahead: VecDeque::new(),
            text: String::new(),
            pos: Position::default(),
            start: Position::default(),
            source_eof: false,
            error: None,
        }
    }

    /// Attributes a filename, copied into every position the cursor hands
    /// out from here on.
    pub fn with_filename(mut self, filename: impl Into<Arc<str>>) -> Self {
        self.set_filename(filename);
        self
    }

    /// Sets the read granularity in bytes. Values below 1 are treated as 1.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.scratch = vec![0; chunk_size.max(1)];
        self
    }

    /// Sets the attributed filename on both coordinates.
    pub fn set_filename(&mut self, filename: impl Into<Arc<str>>) {
        let filename = filename.into();
        self.pos.filename = Some(Arc::clone(&filename));
        self.start.filename = Some(filename);
    }

    /// The reader position: coordinate of the next unconsumed rune.
    #[inline]
    pub fn pos(&self) -> &Position {
        &self.pos
    }

    /// The token cursor: coordinate of the first rune of the in-progress
    /// token.
    #[inline]
    pub fn token_start(&self) -> &Position {
        &self.start
    }

    /// Width of the in-progress token in runes.
    #[inline]
    pub fn width(&self) -> usize {
        self.pos.offset - self.start.offset
    }

    /// The in-progress token text.
    #[inline]
    pub fn current_text(&self) -> &str {
        &self.text
    }

    /// The sticky error, if the cursor has failed.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Takes the sticky error, leaving the cursor failed but errorless.
    pub(crate) fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// The first unconsumed rune, without advancing. `None` at end of input
    /// or after a sticky error.
    pub fn peek(&mut self) -> Option<char> {
        self.fill(1);
        self.lookahead.front().copied()
    }

    /// Up to `n` runes of lookahead; fewer remain at end of input. The
    /// reader position does not move, and repeated calls return the same
    /// prefix until the cursor is advanced.
    pub fn peek_n(&mut self, n: usize) -> &[char] {
        self.fill(n);
        let have = self.lookahead.len().min(n);
        &self.lookahead.make_contiguous()[..have]
    }

    /// Consumes one rune into the in-progress token. The token cursor does
    /// not move.
    pub fn advance(&mut self) -> Option<char> {
        let rune = self.take_rune()?;
        self.text.push(rune);
        Some(rune)
    }

    /// Consumes up to `n` runes into the in-progress token, returning how
    /// many were actually consumed.
    pub fn advance_n(&mut self, n: usize) -> usize {
        let mut count = 0;
        while count < n && self.advance().is_some() {
            count += 1;
        }
        count
    }

    /// Reads exactly one rune, advancing the reader but not the token
    /// cursor. `None` on exhaustion.
    #[inline]
    pub fn next_rune(&mut self) -> Option<char> {
        self.advance()
    }

    /// Consumes one rune and drops it: afterwards the token cursor matches
    /// the reader position and the in-progress text is empty. The dropped
    /// rune is irretrievable.
    pub fn discard(&mut self) -> Option<char> {
        let rune = self.take_rune();
        self.ignore();
        rune
    }

    /// Consumes and drops up to `n` runes, returning how many were actually
    /// dropped. See [`Cursor::discard`].
    pub fn discard_n(&mut self, n: usize) -> usize {
        let mut count = 0;
        while count < n && self.take_rune().is_some() {
            count += 1;
        }
        self.ignore();
        count
    }

    /// Scans forward until one of `needles` is a prefix of the upcoming
    /// runes, buffering the scanned prefix into the in-progress token.
    ///
    /// The reader stops at the start of the match and the matched needle is
    /// returned. Needles are compared as rune sequences; at each position
    /// they are tested in caller-supplied order, so the first needle listed
    /// wins a tie. Returns `None`, with the remaining input consumed, when
    /// input exhausts before any needle matches; returns `None` immediately
    /// without moving when `needles` is empty or contains only empty
    /// strings.
    ///
    /// The scan tests every position independently, so needles whose proper
    /// suffix is also a prefix (`"ab"` in `"aab"`) match correctly. Cost is
    /// proportional to input length times total needle length.
    pub fn find<'n>(&mut self, needles: &[&'n str]) -> Option<&'n str> {
        self.scan(needles, true)
    }

    /// Like [`Cursor::find`], but the scanned prefix is dropped instead of
    /// buffered: the token cursor follows the reader to the start of the
    /// match and any in-progress text is cleared along the way.
    pub fn discard_to<'n>(&mut self, needles: &[&'n str]) -> Option<&'n str> {
        self.scan(needles, false)
    }

    /// Resets the token cursor to the reader position and clears the
    /// in-progress text. Idempotent.
    pub fn ignore(&mut self) {
        self.start = self.pos.clone();
        self.text.clear();
    }

    /// Packages the in-progress text into a token of the given kind, then
    /// resets the token cursor as [`Cursor::ignore`] does.
    pub fn emit<K: TokenKind>(&mut self, kind: K) -> Token<K> {
        Token {
            kind,
            text: mem::take(&mut self.text),
            start: mem::replace(&mut self.start, self.pos.clone()),
            end: self.pos.clone(),
        }
    }

    fn scan<'n>(&mut self, needles: &[&'n str], buffer: bool) -> Option<&'n str> {
        let max_runes = needles
            .iter()
            .map(|needle| needle.chars().count())
            .max()
            .unwrap_or(0);
        if max_runes == 0 {
            return None;
        }
        loop {
            self.fill(max_runes);
            for needle in needles {
                if !needle.is_empty() && self.lookahead_matches(needle) {
                    return Some(needle);
                }
            }
            let consumed = if buffer { self.advance() } else { self.discard() };
            consumed?;
        }
    }

    fn lookahead_matches(&self, needle: &str) -> bool {
        let len = needle.chars().count();
        if self.lookahead.len() < len {
            return false;
        }
        needle
            .chars()
            .zip(self.lookahead.iter())
            .all(|(want, &have)| want == have)
    }

    fn take_rune(&mut self) -> Option<char> {
        self.fill(1);
        let rune = self.lookahead.pop_front()?;
        self.pos.bump(rune);
        Some(rune)
    }

    /// Ensures `want` runes of lookahead are decoded, stopping early at end
    /// of input or on a sticky error.
    fn fill(&mut self, want: usize) {
        loop {
            if self.error.is_some() || self.lookahead.len() >= want {
                return;
            }
            let before = self.lookahead.len();
            self.decode_pending();
            if self.error.is_some() || self.lookahead.len() > before {
                continue;
            }
            if self.source_eof {
                if !self.raw.is_empty() {
                    // a trailing partial sequence can never complete
                    let pos = self.decoded_end();
                    self.fail(Error::InvalidUtf8 { pos });
                }
                return;
            }
            self.read_chunk();
        }
    }

    /// Decodes as much of `raw` as forms complete UTF-8, keeping an
    /// incomplete trailing sequence for the next chunk.
    fn decode_pending(&mut self) {
        if self.raw.is_empty() {
            return;
        }
        match str::from_utf8(&self.raw) {
            Ok(chunk) => {
                self.lookahead.extend(chunk.chars());
                self.raw.clear();
            }
            Err(err) => {
                let valid = err.valid_up_to();
                if let Ok(prefix) = str::from_utf8(&self.raw[..valid]) {
                    self.lookahead.extend(prefix.chars());
                }
                self.raw.drain(..valid);
                if err.error_len().is_some() {
                    let pos = self.decoded_end();
                    self.fail(Error::InvalidUtf8 { pos });
                }
            }
        }
    }

    fn read_chunk(&mut self) {
        loop {
            match self.source.read(&mut self.scratch) {
                Ok(0) => {
                    self.source_eof = true;
                    return;
                }
                Ok(n) => {
                    self.raw.extend_from_slice(&self.scratch[..n]);
                    return;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    let pos = self.decoded_end();
                    self.fail(Error::Read { pos, source: err });
                    return;
                }
            }
        }
    }

    /// The coordinate one past the last decoded rune, i.e. where the next
    /// byte from the source would land.
    fn decoded_end(&self) -> Position {
        let mut pos = self.pos.clone();
        for &rune in &self.lookahead {
            pos.bump(rune);
        }
        pos
    }

    fn fail(&mut self, error: Error) {
        debug!(%error, "cursor entering sticky error state");
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.source_eof = true;
        self.lookahead.clear();
        self.raw.clear();
    }
}

impl From<&str> for Cursor {
    fn from(input: &str) -> Self {
        Self::from(input.to_owned())
    }
}

impl From<String> for Cursor {
    fn from(input: String) -> Self {
        Self::new(io::Cursor::new(input.into_bytes()))
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("pos", &self.pos)
            .field("token_start", &self.start)
            .field("text", &self.text)
            .field("lookahead", &self.lookahead.len())
            .field("source_eof", &self.source_eof)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Yields its payload, then fails every read with the given kind.
    struct FailingReader {
        payload: io::Cursor<Vec<u8>>,
        kind: io::ErrorKind,
    }

    impl FailingReader {
        fn new(payload: &[u8], kind: io::ErrorKind) -> Self {
            Self {
                payload: io::Cursor::new(payload.to_vec()),
                kind,
            }
        }
    }

    impl io::Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.payload.read(buf) {
                Ok(0) => Err(io::Error::new(self.kind, "stream broke")),
                other => other,
            }
        }
    }

    #[test]
    fn peek_does_not_move() {
        let mut cursor = Cursor::from("ab");
        assert_eq!(cursor.peek(), Some('a'));
        assert_eq!(cursor.peek(), Some('a'));
        assert_eq!(cursor.pos().offset, 0);
    }

    #[test]
    fn peek_n_is_idempotent_until_advanced() {
        let mut cursor = Cursor::from("abcd");
        assert_eq!(cursor.peek_n(3), &['a', 'b', 'c']);
        assert_eq!(cursor.peek_n(3), &['a', 'b', 'c']);
        cursor.advance();
        assert_eq!(cursor.peek_n(3), &['b', 'c', 'd']);
    }

    #[test]
    fn peek_n_returns_fewer_at_eof() {
        let mut cursor = Cursor::from("ab");
        assert_eq!(cursor.peek_n(5), &['a', 'b']);
    }

    #[test]
    fn advance_buffers_and_tracks_offset() {
        let mut cursor = Cursor::from("abc");
        assert_eq!(cursor.advance(), Some('a'));
        assert_eq!(cursor.advance(), Some('b'));
        assert_eq!(cursor.current_text(), "ab");
        assert_eq!(cursor.width(), 2);
        assert_eq!(cursor.pos().offset, 2);
        assert_eq!(cursor.token_start().offset, 0);
    }

    #[test]
    fn advance_n_stops_at_eof() {
        let mut cursor = Cursor::from("abc");
        assert_eq!(cursor.advance_n(5), 3);
        assert_eq!(cursor.peek(), None);
        assert_eq!(cursor.current_text(), "abc");
    }

    #[test]
    fn advance_after_peek_k_matches_peeked_rune() {
        let mut cursor = Cursor::from("abcdef");
        let expected = cursor.peek_n(4)[3];
        cursor.advance_n(3);
        assert_eq!(cursor.peek(), Some(expected));
    }

    #[test]
    fn discard_moves_both_coordinates() {
        let mut cursor = Cursor::from("abc");
        cursor.advance();
        assert_eq!(cursor.discard(), Some('b'));
        assert_eq!(cursor.current_text(), "");
        assert_eq!(cursor.width(), 0);
        assert_eq!(cursor.token_start(), cursor.pos());
        assert_eq!(cursor.pos().offset, 2);
    }

    #[test]
    fn discard_n_reports_actual_count() {
        let mut cursor = Cursor::from("ab");
        assert_eq!(cursor.discard_n(5), 2);
        assert_eq!(cursor.token_start().offset, 2);
    }

    #[test]
    fn ignore_is_idempotent() {
        let mut cursor = Cursor::from("abc");
        cursor.advance_n(2);
        cursor.ignore();
        let start = cursor.token_start().clone();
        cursor.ignore();
        assert_eq!(cursor.token_start(), &start);
        assert_eq!(cursor.current_text(), "");
    }

    #[test]
    fn emit_captures_span_and_resets() {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Tok {
            Eof,
            Word,
        }
        impl TokenKind for Tok {
            const EOF: Self = Tok::Eof;
        }

        let mut cursor = Cursor::from("hi\n");
        cursor.advance_n(2);
        let token = cursor.emit(Tok::Word);
        assert_eq!(token.text, "hi");
        assert_eq!(token.start.offset, 0);
        assert_eq!(token.end.offset, 2);
        assert_eq!(
            token.end.offset - token.start.offset,
            token.text.chars().count()
        );
        assert_eq!(cursor.current_text(), "");
        assert_eq!(cursor.token_start(), cursor.pos());
    }

    #[test]
    fn newline_resets_column_and_bumps_line() {
        let mut cursor = Cursor::from("a\nb");
        cursor.advance_n(2);
        assert_eq!((cursor.pos().line, cursor.pos().column), (2, 1));
        cursor.advance();
        assert_eq!((cursor.pos().line, cursor.pos().column), (2, 2));
    }

    #[test]
    fn multibyte_runes_count_as_one() {
        let mut cursor = Cursor::from("世界!");
        assert_eq!(cursor.advance(), Some('世'));
        assert_eq!(cursor.pos().offset, 1);
        assert_eq!(cursor.pos().column, 2);
        assert_eq!(cursor.advance_n(2), 2);
        assert_eq!(cursor.current_text(), "世界!");
    }

    #[test]
    fn multibyte_rune_split_across_chunks() {
        // 1-byte chunks force every rune of "界" through the partial-
        // sequence path.
        let mut cursor = Cursor::new(io::Cursor::new("界x".as_bytes().to_vec())).with_chunk_size(1);
        assert_eq!(cursor.advance(), Some('界'));
        assert_eq!(cursor.advance(), Some('x'));
        assert_eq!(cursor.advance(), None);
        assert!(cursor.error().is_none());
    }

    #[test]
    fn find_stops_at_match_start() {
        let mut cursor = Cursor::from("hello{{x");
        assert_eq!(cursor.find(&["{{"]), Some("{{"));
        assert_eq!(cursor.current_text(), "hello");
        assert_eq!(cursor.pos().offset, 5);
        assert_eq!(cursor.peek(), Some('{'));
    }

    #[test]
    fn find_first_needle_wins_tie() {
        let mut cursor = Cursor::from("xx{%");
        assert_eq!(cursor.find(&["{%", "{"]), Some("{%"));
        let mut cursor = Cursor::from("xx{%");
        assert_eq!(cursor.find(&["{", "{%"]), Some("{"));
    }

    #[test]
    fn find_handles_overlapping_prefix() {
        let mut cursor = Cursor::from("aab");
        assert_eq!(cursor.find(&["ab"]), Some("ab"));
        assert_eq!(cursor.current_text(), "a");
    }

    #[test]
    fn find_exhausts_input_without_match() {
        let mut cursor = Cursor::from("abc");
        assert_eq!(cursor.find(&["zz"]), None);
        assert_eq!(cursor.current_text(), "abc");
        assert_eq!(cursor.peek(), None);
    }

    #[test]
    fn find_empty_needles_return_immediately() {
        let mut cursor = Cursor::from("abc");
        assert_eq!(cursor.find(&[]), None);
        assert_eq!(cursor.find(&["", ""]), None);
        assert_eq!(cursor.pos().offset, 0);
    }

    #[test]
    fn discard_to_drops_the_prefix() {
        let mut cursor = Cursor::from("junk[sec]");
        assert_eq!(cursor.discard_to(&["["]), Some("["));
        assert_eq!(cursor.current_text(), "");
        assert_eq!(cursor.token_start(), cursor.pos());
        assert_eq!(cursor.pos().offset, 4);
    }

    #[test]
    fn offset_counts_every_consumed_rune() {
        let mut cursor = Cursor::from("abcdef");
        cursor.advance_n(2);
        cursor.discard_n(2);
        cursor.advance();
        assert_eq!(cursor.pos().offset, 5);
    }

    #[test]
    fn empty_input_is_immediately_exhausted() {
        let mut cursor = Cursor::from("");
        assert_eq!(cursor.peek(), None);
        assert_eq!(cursor.advance(), None);
        assert!(cursor.error().is_none());
        assert_eq!((cursor.pos().line, cursor.pos().column, cursor.pos().offset), (1, 1, 0));
    }

    #[test]
    fn io_error_is_sticky_and_distinct_from_eof() {
        let reader = FailingReader::new(b"ab", io::ErrorKind::ConnectionReset);
        let mut cursor = Cursor::new(reader);
        assert_eq!(cursor.advance(), Some('a'));
        assert_eq!(cursor.advance(), Some('b'));
        // the next fill hits the failure
        assert_eq!(cursor.advance(), None);
        assert!(matches!(cursor.error(), Some(Error::Read { .. })));
        assert_eq!(cursor.peek(), None);
        assert_eq!(cursor.advance_n(3), 0);
    }

    #[test]
    fn invalid_utf8_is_sticky() {
        let mut cursor = Cursor::new(io::Cursor::new(vec![b'a', 0xFF, b'b']));
        // the whole chunk is validated up front, so the failure is already
        // sticky on the first read; the error still points at the bad rune
        assert_eq!(cursor.advance(), None);
        match cursor.error() {
            Some(Error::InvalidUtf8 { pos }) => assert_eq!(pos.offset, 1),
            other => panic!("expected InvalidUtf8, got {other:?}"),
        }
        assert_eq!(cursor.peek(), None);
    }

    #[test]
    fn truncated_sequence_at_eof_is_invalid() {
        // first two bytes of a three-byte rune
        let mut cursor = Cursor::new(io::Cursor::new(vec![0xE4, 0xB8]));
        assert_eq!(cursor.advance(), None);
        assert!(matches!(cursor.error(), Some(Error::InvalidUtf8 { .. })));
    }

    #[test]
    fn filename_is_stamped_into_positions() {
        let mut cursor = Cursor::from("x").with_filename("input.tmpl");
        cursor.advance();
        assert_eq!(cursor.pos().filename.as_deref(), Some("input.tmpl"));
        assert_eq!(cursor.token_start().filename.as_deref(), Some("input.tmpl"));
    }
}
