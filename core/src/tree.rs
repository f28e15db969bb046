//! The parse tree.
//!
//! Nodes live in an arena owned by [`Tree`]; a [`NodeId`] is a copyable
//! index into it. Children are ordered by insertion, which reflects source
//! order, and each node's parent link is an index rather than an owning
//! reference, so the parent/child cycle costs nothing. Reachability flows
//! from the root: nodes displaced by [`Tree::set_root`] or created detached
//! and never attached stay in the arena but are ignored by iteration and
//! rendering.

use core::fmt;

use crate::position::Position;

/// Index of a node within its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A single node: a user value, the source position it started at, and its
/// place in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<V> {
    /// The grammar-defined value.
    pub value: V,
    /// Position of the token current when the node was created.
    pub start: Position,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl<V> Node<V> {
    /// The parent node, or `None` for the root and detached nodes.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in source order.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// An arena-backed tree of [`Node`]s with a distinguished root.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree<V> {
    nodes: Vec<Node<V>>,
    root: NodeId,
}

impl<V> Tree<V> {
    /// Creates a tree containing only a root with the given value.
    pub fn new(value: V, start: Position) -> Self {
        Self {
            nodes: vec![Node {
                value,
                start,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    /// The root node's id.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The node behind `id`.
    #[inline]
    pub fn get(&self, id: NodeId) -> &Node<V> {
        &self.nodes[id.0]
    }

    /// Mutable access to the node behind `id`.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node<V> {
        &mut self.nodes[id.0]
    }

    /// The value of the node behind `id`.
    #[inline]
    pub fn value(&self, id: NodeId) -> &V {
        &self.nodes[id.0].value
    }

    /// The children of `id` in source order.
    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// The parent of `id`, or `None` for the root and detached nodes.
    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Total nodes in the arena, including any that are no longer reachable
    /// from the root.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Appends a new child under `parent` and returns its id.
    pub fn push_child(&mut self, parent: NodeId, value: V, start: Position) -> NodeId {
        let id = self.alloc(value, start, Some(parent));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Creates a detached node: in the arena, but attached to nothing.
    pub fn new_node(&mut self, value: V, start: Position) -> NodeId {
        self.alloc(value, start, None)
    }

    /// Substitutes the value of `id` in place, returning the previous
    /// value. The node keeps its parent, its children, and — when it is the
    /// root — its role as root.
    pub fn replace_value(&mut self, id: NodeId, value: V) -> V {
        core::mem::replace(&mut self.nodes[id.0].value, value)
    }

    /// Makes `id` the root. If the node was attached somewhere, it is
    /// unhooked from its old parent first; the previous root stays in the
    /// arena but becomes unreachable.
    pub fn set_root(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&child| child != id);
        }
        self.root = id;
    }

    /// Depth-first, eldest-first traversal of the nodes reachable from the
    /// root.
    pub fn iter(&self) -> DepthFirst<'_, V> {
        DepthFirst {
            tree: self,
            stack: vec![self.root],
        }
    }

    fn alloc(&mut self, value: V, start: Position, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            value,
            start,
            parent,
            children: Vec::new(),
        });
        id
    }
}

/// Pre-order iterator over reachable nodes. Created by [`Tree::iter`].
#[derive(Debug)]
pub struct DepthFirst<'tree, V> {
    tree: &'tree Tree<V>,
    stack: Vec<NodeId>,
}

impl<V> Iterator for DepthFirst<'_, V> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let children = self.tree.children(id);
        self.stack.extend(children.iter().rev());
        Some(id)
    }
}

impl<V: fmt::Display> Tree<V> {
    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, prefix: &str) -> fmt::Result {
        let node = self.get(id);
        write!(f, "{} @ {}", node.value, node.start)?;
        let children = node.children();
        for (index, &child) in children.iter().enumerate() {
            let last = index + 1 == children.len();
            write!(
                f,
                "\n{}{}",
                prefix,
                if last { "└── " } else { "├── " }
            )?;
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            self.fmt_node(f, child, &child_prefix)?;
        }
        Ok(())
    }
}

/// Renders the tree one node per line, depth first, eldest to youngest,
/// with box-drawing connectors. A diagnostic aid, not a wire format.
impl<V: fmt::Display> fmt::Display for Tree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root, "")
    }
}
