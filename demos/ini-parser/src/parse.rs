//! Parser state and node values for the INI grammar.

use core::fmt;

use lexkit::{Error, Parser};

use crate::Tok;

/// What an INI tree node means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ini {
    /// The document root.
    Document,
    /// A `[section]` header; properties that follow it are its children.
    Section(String),
    /// A `key = value` line.
    Property {
        /// Left-hand side of the `=`.
        key: String,
        /// Right-hand side of the `=`, possibly empty.
        value: String,
    },
}

impl fmt::Display for Ini {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ini::Document => f.write_str("ini"),
            Ini::Section(name) => write!(f, "[{name}]"),
            Ini::Property { key, value } => write!(f, "{key} = {value}"),
        }
    }
}

/// Parses one section header or property and re-pushes itself; ends
/// cleanly at EOF.
///
/// The current node is either the root or the most recent section, so a
/// new section climbs out of the previous one before descending.
pub fn parse_ini(p: &mut Parser<Ini, Tok>) -> Result<(), Error> {
    let token = p.next();
    match token.kind {
        Tok::Eof => Err(Error::ExpectedEof),
        Tok::Section => {
            if p.current() != p.root() {
                p.climb();
            }
            p.push(Ini::Section(token.text));
            p.push_state(parse_ini);
            Ok(())
        }
        Tok::Key => {
            let key = token.text;
            p.push(Ini::Property {
                key: key.clone(),
                value: String::new(),
            });
            let value = p.next();
            if value.kind != Tok::Value {
                return Err(p.unexpected(&value, "a property value"));
            }
            p.replace(Ini::Property {
                key,
                value: value.text,
            });
            p.climb();
            p.push_state(parse_ini);
            Ok(())
        }
        Tok::Value => Err(p.unexpected(&token, "a section header or property key")),
    }
}
