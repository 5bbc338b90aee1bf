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

//! Pairwise alignment of two graphs.
//!
//! Placement and the overlap filters only need an [Aligner] that merges two
//! graphs into one, recording for every column the child sites it came from
//! and its [PathState](crate::graph::PathState). [SimpleAligner] is a
//! plain global aligner that fills this role when no model-based aligner is
//! plugged in.
//!
use crate::graph::AlignmentGraph;

pub mod simple;

pub use simple::SimpleAligner;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone)]
pub struct AlignmentFailed(pub String);

impl std::fmt::Display for AlignmentFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Alignment failed: {}", self.0)
    }
}

impl std::error::Error for AlignmentFailed {}

/// Bounds on the sites of the left graph that may be matched.
///
/// Unset bounds do not restrict the alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignmentWindow {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl AlignmentWindow {
    pub fn contains(&self, index: usize) -> bool {
        self.start.map_or(true, |s| index >= s) && self.end.map_or(true, |e| index <= e)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Align two graphs into one.
///
/// The returned graph has one site per alignment column, bounded by start
/// and stop sentinels whose children are the sentinels of the inputs.
/// Every column records the index of the site it descends from in `left`
/// and `right`, `None` where that side has a gap.
pub trait Aligner {
    fn align(
        &self,
        left: &AlignmentGraph,
        left_distance: f64,
        right: &AlignmentGraph,
        right_distance: f64,
        window: Option<AlignmentWindow>,
    ) -> Result<AlignmentGraph, E>;
}
