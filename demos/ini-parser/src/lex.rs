//! Lexer states for the INI grammar.
//!
//! [`lex_line`] dispatches on the first significant rune of each line:
//! `[` starts a section header, `;` and `#` start comments that are
//! discarded to the end of the line, and anything else is a property.
//! Interstitial whitespace never reaches the parser.

use lexkit::{Error, Lex, Lexer};

use crate::Tok;

/// Skips whitespace and comments, then dispatches on the line's shape.
pub fn lex_line(lx: &mut Lexer<Tok>) -> Result<Lex<Tok>, Error> {
    loop {
        match lx.peek() {
            None => return Ok(Lex::Stop),
            Some(' ' | '\t' | '\r' | '\n') => {
                lx.discard();
            }
            Some(';' | '#') => {
                lx.discard_to(&["\n"]);
                lx.discard();
            }
            Some('[') => return Ok(Lex::next(lex_section)),
            Some(_) => return Ok(Lex::next(lex_property)),
        }
    }
}

/// Lexes `[name]`, emitting the name only so its position points at the
/// name itself.
fn lex_section(lx: &mut Lexer<Tok>) -> Result<Lex<Tok>, Error> {
    lx.discard();
    while matches!(lx.peek(), Some(rune) if rune != ']' && rune != '\n') {
        lx.advance();
    }
    if lx.width() == 0 {
        return Err(lx.lex_error("empty section name"));
    }
    match lx.peek() {
        Some(']') => {
            lx.emit(Tok::Section);
            lx.discard();
            Ok(Lex::next(lex_line))
        }
        _ => Err(lx.lex_error("unterminated section header, expected `]`")),
    }
}

/// Lexes `key = value` up to the end of the line.
fn lex_property(lx: &mut Lexer<Tok>) -> Result<Lex<Tok>, Error> {
    while matches!(lx.peek(), Some(rune) if rune != '=' && rune != '\n' && !rune.is_whitespace())
    {
        lx.advance();
    }
    if lx.width() == 0 {
        return Err(lx.lex_error("expected a property key"));
    }
    lx.emit(Tok::Key);
    while matches!(lx.peek(), Some(' ' | '\t')) {
        lx.discard();
    }
    match lx.peek() {
        Some('=') => {
            lx.discard();
        }
        _ => return Err(lx.lex_error("expected `=` after property key")),
    }
    while matches!(lx.peek(), Some(' ' | '\t')) {
        lx.discard();
    }
    while matches!(lx.peek(), Some(rune) if rune != '\n') {
        lx.advance();
    }
    lx.emit(Tok::Value);
    Ok(Lex::next(lex_line))
}
