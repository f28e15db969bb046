//! Parser states for the template grammar.
//!
//! Two states do the work: [`parse_template`] handles top-level content,
//! and [`parse_block`] handles content inside a branch, where `else` and
//! `endif` tags terminate the sequence. Both re-push themselves after each
//! item; a branch pushes its body state on top of the continuation, so
//! closing the branch simply returns to whatever context opened it.

use lexkit::{boxed, Error, Parser};

use crate::{Ast, Tok};

/// Parses one top-level item and re-pushes itself, until end of input.
pub fn parse_template(p: &mut Parser<Ast, Tok>) -> Result<(), Error> {
    let token = p.peek().clone();
    match token.kind {
        Tok::Eof => Ok(()),
        Tok::Text => {
            p.next();
            p.add_node(Ast::Text(token.text));
            p.push_state(parse_template);
            Ok(())
        }
        Tok::VarOpen => {
            p.next();
            parse_var(p)?;
            p.push_state(parse_template);
            Ok(())
        }
        Tok::TagOpen => {
            p.next();
            let tag = p.next();
            if tag.kind != Tok::KwIf {
                return Err(p.unexpected(&tag, "`if`"));
            }
            open_branch(p)?;
            p.push_states([boxed(parse_block), boxed(parse_template)]);
            Ok(())
        }
        _ => Err(p.unexpected(&token, "text, `{{`, or `{%`")),
    }
}

/// Parses one item inside a branch body and re-pushes itself; `else`
/// switches to the else-sequence, `endif` closes the branch and lets the
/// enclosing context resume.
fn parse_block(p: &mut Parser<Ast, Tok>) -> Result<(), Error> {
    let token = p.peek().clone();
    match token.kind {
        Tok::Eof => Err(p.unexpected(&token, "`{% else %}` or `{% endif %}`")),
        Tok::Text => {
            p.next();
            p.add_node(Ast::Text(token.text));
            p.push_state(parse_block);
            Ok(())
        }
        Tok::VarOpen => {
            p.next();
            parse_var(p)?;
            p.push_state(parse_block);
            Ok(())
        }
        Tok::TagOpen => {
            p.next();
            let tag = p.next();
            match tag.kind {
                Tok::KwIf => {
                    open_branch(p)?;
                    p.push_states([boxed(parse_block), boxed(parse_block)]);
                    Ok(())
                }
                Tok::KwElse => {
                    expect_tag_close(p)?;
                    p.climb();
                    p.push(Ast::Else);
                    p.push_state(parse_block);
                    Ok(())
                }
                Tok::KwEndif => {
                    expect_tag_close(p)?;
                    p.climb();
                    p.climb();
                    Ok(())
                }
                _ => Err(p.unexpected(&tag, "`if`, `else`, or `endif`")),
            }
        }
        _ => Err(p.unexpected(&token, "template content")),
    }
}

/// Parses `name }}` after a consumed `{{`, adding a variable node.
fn parse_var(p: &mut Parser<Ast, Tok>) -> Result<(), Error> {
    let name = p.next();
    if name.kind != Tok::Ident {
        return Err(p.unexpected(&name, "a variable name"));
    }
    p.add_node(Ast::Var(name.text));
    let close = p.next();
    if close.kind != Tok::VarClose {
        return Err(p.unexpected(&close, "`}}`"));
    }
    Ok(())
}

/// Parses `cond %}` after a consumed `{% if`, descending into a new
/// branch node and its then-sequence.
fn open_branch(p: &mut Parser<Ast, Tok>) -> Result<(), Error> {
    let cond = p.next();
    if cond.kind != Tok::Ident {
        return Err(p.unexpected(&cond, "a condition name"));
    }
    p.push(Ast::Branch);
    p.add_node(Ast::Var(cond.text));
    expect_tag_close(p)?;
    p.push(Ast::Then);
    Ok(())
}

fn expect_tag_close(p: &mut Parser<Ast, Tok>) -> Result<(), Error> {
    let close = p.next();
    if close.kind != Tok::TagClose {
        return Err(p.unexpected(&close, "`%}`"));
    }
    Ok(())
}
