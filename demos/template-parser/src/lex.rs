//! Lexer states for the template grammar.
//!
//! Outside an action the lexer scans for the next opening delimiter,
//! emitting everything before it as one text token. Inside an action it
//! discards whitespace, emits identifiers and keywords, and returns to
//! text mode at the matching closing delimiter. End of input inside an
//! action is not a lex error: the EOF token is produced and the parser
//! reports what it was expecting instead.

use lexkit::{Error, Lex, Lexer};

use crate::Tok;

const LEFT_VAR: &str = "{{";
const RIGHT_VAR: &str = "}}";
const LEFT_TAG: &str = "{%";
const RIGHT_TAG: &str = "%}";

/// Lexes literal text up to the next `{{` or `{%`.
pub fn lex_text(lx: &mut Lexer<Tok>) -> Result<Lex<Tok>, Error> {
    let found = lx.find(&[LEFT_VAR, LEFT_TAG]);
    if lx.width() > 0 {
        lx.emit(Tok::Text);
    }
    match found {
        None => Ok(Lex::Stop),
        Some(open) if open == LEFT_VAR => {
            lx.advance_n(LEFT_VAR.chars().count());
            lx.emit(Tok::VarOpen);
            Ok(Lex::next(lex_action(RIGHT_VAR, Tok::VarClose)))
        }
        Some(_) => {
            lx.advance_n(LEFT_TAG.chars().count());
            lx.emit(Tok::TagOpen);
            Ok(Lex::next(lex_action(RIGHT_TAG, Tok::TagClose)))
        }
    }
}

/// Lexes the inside of an action until `close` is reached.
fn lex_action(
    close: &'static str,
    close_kind: Tok,
) -> impl FnOnce(&mut Lexer<Tok>) -> Result<Lex<Tok>, Error> + Send {
    move |lx: &mut Lexer<Tok>| {
        let close_len = close.chars().count();
        loop {
            if lx.peek_n(close_len).iter().copied().eq(close.chars()) {
                lx.advance_n(close_len);
                lx.emit(close_kind);
                return Ok(Lex::next(lex_text));
            }
            match lx.peek() {
                // the parser reports the missing delimiter
                None => return Ok(Lex::Stop),
                Some(' ' | '\t') => {
                    lx.discard();
                }
                Some(rune) if rune.is_alphanumeric() || rune == '_' => {
                    while matches!(lx.peek(), Some(rune) if rune.is_alphanumeric() || rune == '_') {
                        lx.advance();
                    }
                    let kind = match lx.current_text() {
                        "if" => Tok::KwIf,
                        "else" => Tok::KwElse,
                        "endif" => Tok::KwEndif,
                        _ => Tok::Ident,
                    };
                    lx.emit(kind);
                }
                Some(rune) => {
                    return Err(lx.lex_error(format!(
                        "unexpected rune `{rune}` inside action, expected a name or `{close}`"
                    )));
                }
            }
        }
    }
}
