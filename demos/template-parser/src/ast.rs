//! Node values of the template tree, and a small renderer over them.

use core::fmt;
use std::collections::HashMap;

use lexkit::{NodeId, Tree};

/// What a template tree node means.
///
/// A [`Ast::Branch`] node's children are, in order: the condition
/// variable, a [`Ast::Then`] sequence, and optionally an [`Ast::Else`]
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ast {
    /// The document root.
    Root,
    /// Literal text, copied to the output verbatim.
    Text(String),
    /// A variable substitution.
    Var(String),
    /// An `if`/`else`/`endif` construct.
    Branch,
    /// The taken-when-true sequence of a branch.
    Then,
    /// The taken-when-false sequence of a branch.
    Else,
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ast::Root => f.write_str("root"),
            Ast::Text(text) => write!(f, "text {text:?}"),
            Ast::Var(name) => write!(f, "var {name}"),
            Ast::Branch => f.write_str("if"),
            Ast::Then => f.write_str("then"),
            Ast::Else => f.write_str("else"),
        }
    }
}

/// Evaluates a parsed template against a variable map.
///
/// Missing variables render as empty; a branch takes its then-sequence
/// when the condition variable is present and non-empty.
pub fn render(tree: &Tree<Ast>, vars: &HashMap<String, String>) -> String {
    let mut out = String::new();
    render_sequence(tree, tree.children(tree.root()), vars, &mut out);
    out
}

fn render_sequence(tree: &Tree<Ast>, nodes: &[NodeId], vars: &HashMap<String, String>, out: &mut String) {
    for &id in nodes {
        match tree.value(id) {
            Ast::Text(text) => out.push_str(text),
            Ast::Var(name) => {
                if let Some(value) = vars.get(name) {
                    out.push_str(value);
                }
            }
            Ast::Branch => render_branch(tree, id, vars, out),
            Ast::Root | Ast::Then | Ast::Else => {}
        }
    }
}

fn render_branch(tree: &Tree<Ast>, branch: NodeId, vars: &HashMap<String, String>, out: &mut String) {
    let children = tree.children(branch);
    let truthy = children.first().is_some_and(|&cond| {
        if let Ast::Var(name) = tree.value(cond) {
            vars.get(name).is_some_and(|value| !value.is_empty())
        } else {
            false
        }
    });
    let wanted = if truthy { Ast::Then } else { Ast::Else };
    for &child in children {
        if *tree.value(child) == wanted {
            render_sequence(tree, tree.children(child), vars, out);
        }
    }
}
