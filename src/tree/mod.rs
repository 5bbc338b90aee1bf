// graftreads: Placement of sequencing reads onto a reference alignment tree.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Reference tree with attached alignment graphs.
//!
//! The tree is stored as an arena of [nodes](Node) addressed by
//! [NodeIndex]. Nodes are never removed; grafting adds new internal nodes
//! and relinks the slot of the parent.
//!
use std::collections::HashMap;

use indexmap::IndexMap;

use crate::aligner::Aligner;
use crate::graph::AlignmentGraph;
use index::Side;

pub mod index;
pub mod node;

pub use node::Node;

type E = Box<dyn std::error::Error>;

/// Index of a node in a [Tree].
pub type NodeIndex = usize;

#[derive(Debug, Clone)]
pub struct UnknownNode(pub String);

impl std::fmt::Display for UnknownNode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "No node named '{}' in the tree", self.0)
    }
}

impl std::error::Error for UnknownNode {}

// =#========================================================================#=
// TREE
// =#========================================================================#=
/// A binary tree of [nodes](Node) using the arena pattern.
///
/// The first node added becomes the root until [Tree::set_root] is called.
///
/// ## Usage
///
/// ```rust
/// use graftreads::tree::Tree;
///
/// let mut tree = Tree::new();
/// let a = tree.add_leaf("A", 0.1, None);
/// let b = tree.add_leaf("B", 0.2, None);
/// let ab = tree.add_internal("AB", (a, b), 0.0, None);
/// tree.set_root(ab);
///
/// assert_eq!(tree.to_newick(), "(A:0.1,B:0.2)AB;");
/// assert_eq!(tree.number_of_leaves(), 2);
/// ```
///
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    root_index: NodeIndex,
}

impl Tree {
    pub fn new() -> Self {
        Tree { nodes: Vec::new(), root_index: 0 }
    }

    /// Tree with a single leaf holding a reference sequence.
    pub fn single(name: &str, graph: AlignmentGraph) -> Self {
        let mut tree = Tree::new();
        tree.add_leaf(name, 0.0, Some(graph));
        tree
    }

    pub fn add_leaf(&mut self, name: &str, distance_to_parent: f64, graph: Option<AlignmentGraph>) -> NodeIndex {
        let index = self.nodes.len();
        self.nodes.push(Node {
            index,
            name: name.to_string(),
            distance_to_parent,
            graph,
            ..Default::default()
        });
        index
    }

    pub fn add_internal(
        &mut self,
        name: &str,
        children: (NodeIndex, NodeIndex),
        distance_to_parent: f64,
        graph: Option<AlignmentGraph>,
    ) -> NodeIndex {
        let index = self.nodes.len();
        self.nodes.push(Node {
            index,
            name: name.to_string(),
            distance_to_parent,
            children: Some(children),
            graph,
            ..Default::default()
        });
        self.nodes[children.0].parent = Some(index);
        self.nodes[children.1].parent = Some(index);
        index
    }

    /// Add an internal node whose graph is the alignment of its children.
    pub fn add_aligned_internal<A: Aligner + ?Sized>(
        &mut self,
        name: &str,
        children: (NodeIndex, NodeIndex),
        distance_to_parent: f64,
        aligner: &A,
    ) -> Result<NodeIndex, E> {
        let left = &self.nodes[children.0];
        let right = &self.nodes[children.1];
        let left_graph = left.graph.as_ref().ok_or(UnknownNode(left.name.clone()))?;
        let right_graph = right.graph.as_ref().ok_or(UnknownNode(right.name.clone()))?;
        let graph = aligner.align(left_graph, left.distance_to_parent, right_graph, right.distance_to_parent, None)?;
        Ok(self.add_internal(name, children, distance_to_parent, Some(graph)))
    }

    pub fn set_root(&mut self, index: NodeIndex) {
        self.root_index = index;
    }

    pub fn root(&self) -> NodeIndex {
        self.root_index
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    /// Index of the node called `name` under the root.
    pub fn find(&self, name: &str) -> Option<NodeIndex> {
        self.pre_order_iter().find(|node| node.name == name).map(|node| node.index)
    }

    pub fn nodes_by_name(&self) -> HashMap<String, NodeIndex> {
        self.pre_order_iter().map(|node| (node.name.clone(), node.index)).collect()
    }

    /// Parent of `index` and the side `index` hangs from.
    pub fn parent_of(&self, index: NodeIndex) -> Option<(NodeIndex, Side)> {
        let parent = self.nodes.get(index)?.parent?;
        let (left, _) = self.nodes[parent].children?;
        Some((parent, if left == index { Side::Left } else { Side::Right }))
    }

    /// Put `child` in the `side` slot of `parent`.
    ///
    /// The previous occupant keeps its parent pointer; it is reachable
    /// from `child` if it was grafted under it.
    pub fn replace_child(&mut self, parent: NodeIndex, side: Side, child: NodeIndex) {
        if let Some((left, right)) = self.nodes[parent].children {
            self.nodes[parent].children = Some(match side {
                Side::Left => (child, right),
                Side::Right => (left, child),
            });
            self.nodes[child].parent = Some(parent);
        }
    }

    pub fn number_of_leaves(&self) -> usize {
        self.pre_order_iter().filter(|node| node.is_leaf()).count()
    }

    /// Names of all nodes in pre-order.
    pub fn node_names(&self) -> Vec<String> {
        self.pre_order_iter().map(|node| node.name.clone()).collect()
    }

    /// Names of the internal nodes in pre-order.
    pub fn internal_node_names(&self) -> Vec<String> {
        self.pre_order_iter().filter(|node| !node.is_leaf()).map(|node| node.name.clone()).collect()
    }

    /// Names of tagged nodes grouped by tag, in pre-order.
    pub fn tagged_nodes(&self) -> IndexMap<String, Vec<String>> {
        let mut tags: IndexMap<String, Vec<String>> = IndexMap::new();
        self.pre_order_iter().for_each(|node| {
            if let Some(tag) = &node.tag {
                tags.entry(tag.clone()).or_default().push(node.name.clone());
            }
        });
        tags
    }

    /// Sides to follow from `ancestor` down to `target`.
    ///
    /// Returns `None` if `target` is not in the subtree of `ancestor`.
    pub fn path_from(&self, ancestor: NodeIndex, target: NodeIndex) -> Option<Vec<Side>> {
        let mut path: Vec<Side> = Vec::new();
        let mut current = target;
        while current != ancestor {
            let (parent, side) = self.parent_of(current)?;
            // The parent may have been relinked away from `current`.
            if self.nodes[parent].child(side) != Some(current) {
                return None;
            }
            path.push(side);
            current = parent;
        }
        path.reverse();
        Some(path)
    }

    /// Site of `target` in alignment column `column` of `node`.
    pub fn site_at_column(&self, node: NodeIndex, column: usize, target: NodeIndex) -> Option<usize> {
        let path = self.path_from(node, target)?;
        let mut current = node;
        let mut index = column;
        for side in path {
            let site = self.nodes[current].graph.as_ref()?.site_at(index)?;
            index = match side {
                Side::Left => site.children.left?,
                Side::Right => site.children.right?,
            };
            current = self.nodes[current].child(side)?;
        }
        self.nodes[current].graph.as_ref()?.site_at(index).map(|_| index)
    }

    /// State of the site of `target` in alignment column `column` of `node`.
    pub fn state_at_column(&self, node: NodeIndex, column: usize, target: NodeIndex) -> Option<usize> {
        let index = self.site_at_column(node, column, target)?;
        self.nodes[target].graph.as_ref()?.site_at(index)?.state
    }

    /// Iterate over the nodes under the root, children before parents.
    pub fn post_order_iter(&self) -> PostOrderIter<'_> {
        PostOrderIter::new(self)
    }

    /// Iterate over the nodes under the root, parents before children.
    pub fn pre_order_iter(&self) -> PreOrderIter<'_> {
        PreOrderIter::new(self)
    }

    /// Newick representation with node names and branch lengths.
    pub fn to_newick(&self) -> String {
        fn build_newick(tree: &Tree, newick: &mut String, index: NodeIndex) {
            let node = &tree.nodes[index];
            if let Some((left, right)) = node.children {
                newick.push('(');
                build_newick(tree, newick, left);
                newick.push(',');
                build_newick(tree, newick, right);
                newick.push(')');
            }
            newick.push_str(&node.name);
            if index != tree.root_index {
                newick.push(':');
                newick.push_str(&node.distance_to_parent.to_string());
            }
        }

        let mut newick = String::new();
        if !self.nodes.is_empty() {
            build_newick(self, &mut newick, self.root_index);
        }
        newick.push(';');
        newick
    }
}

impl std::ops::Index<NodeIndex> for Tree {
    type Output = Node;

    fn index(&self, index: NodeIndex) -> &Self::Output {
        &self.nodes[index]
    }
}

impl std::ops::IndexMut<NodeIndex> for Tree {
    fn index_mut(&mut self, index: NodeIndex) -> &mut Self::Output {
        &mut self.nodes[index]
    }
}

// =#========================================================================#=
// ITERATORS
// =#========================================================================#=
pub struct PostOrderIter<'a> {
    tree: &'a Tree,
    stack: Vec<(NodeIndex, bool)>,
}

impl<'a> PostOrderIter<'a> {
    fn new(tree: &'a Tree) -> Self {
        let mut stack = Vec::new();
        if !tree.is_empty() {
            stack.push((tree.root_index, false));
        }
        PostOrderIter { tree, stack }
    }
}

impl<'a> Iterator for PostOrderIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((index, children_visited)) = self.stack.pop() {
            let node = &self.tree[index];
            if children_visited || node.is_leaf() {
                return Some(node);
            }
            self.stack.push((index, true));
            if let Some((left, right)) = node.children {
                self.stack.push((right, false));
                self.stack.push((left, false));
            }
        }
        None
    }
}

pub struct PreOrderIter<'a> {
    tree: &'a Tree,
    stack: Vec<NodeIndex>,
}

impl<'a> PreOrderIter<'a> {
    fn new(tree: &'a Tree) -> Self {
        let mut stack = Vec::new();
        if !tree.is_empty() {
            stack.push(tree.root_index);
        }
        PreOrderIter { tree, stack }
    }
}

impl<'a> Iterator for PreOrderIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;
        let node = &self.tree[index];
        if let Some((left, right)) = node.children {
            self.stack.push(right);
            self.stack.push(left);
        }
        Some(node)
    }
}
