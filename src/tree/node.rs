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
use crate::graph::AlignmentGraph;
use crate::tree::index::Side;
use crate::tree::NodeIndex;

/// A vertex of a [Tree](super::Tree).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub(crate) index: NodeIndex,
    pub name: String,
    pub comment: String,
    pub distance_to_parent: f64,
    /// Tag restricting which reads may be placed on this node.
    pub tag: Option<String>,
    pub(crate) children: Option<(NodeIndex, NodeIndex)>,
    pub(crate) parent: Option<NodeIndex>,
    /// Sequence of a leaf or alignment of the subtree.
    pub graph: Option<AlignmentGraph>,
    pub left_needs_correcting: bool,
    pub right_needs_correcting: bool,
}

impl Node {
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn children(&self) -> Option<(NodeIndex, NodeIndex)> {
        self.children
    }

    pub fn child(&self, side: Side) -> Option<NodeIndex> {
        self.children.map(|(left, right)| match side {
            Side::Left => left,
            Side::Right => right,
        })
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn set_needs_correcting(&mut self, side: Side) {
        match side {
            Side::Left => self.left_needs_correcting = true,
            Side::Right => self.right_needs_correcting = true,
        }
    }

    /// Number of sites in the attached graph, 0 if there is none.
    pub fn sites_length(&self) -> usize {
        self.graph.as_ref().map(|g| g.sites_length()).unwrap_or(0)
    }
}
