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

//! Alignment graphs.
//!
//! An [AlignmentGraph] is a DAG of [sites](Site) connected by weighted
//! [edges](Edge). Every graph is bounded by a start and a stop sentinel
//! at indexes `0` and `sites_length() - 1`. Graphs built from reads are
//! created with [AlignmentGraph::from_read]; graphs produced by an
//! [Aligner](crate::aligner::Aligner) additionally carry the child site
//! indexes and path state of every column.
//!
use crate::alphabet::DataType;
use crate::alphabet::UNKNOWN_CODON_STATE;
use crate::tree::index::ChildIndexTable;
use crate::tree::index::Side;

pub mod builder;
pub mod edge;
pub mod site;

pub use builder::BuildOptions;
pub use edge::Edge;
pub use edge::InputEdge;
pub use site::PathState;
pub use site::Site;
pub use site::SiteChildren;
pub use site::SiteType;

#[derive(Debug, Clone)]
pub struct EdgeOutOfRange {
    pub start: usize,
    pub end: usize,
    pub n_sites: usize,
}

impl std::fmt::Display for EdgeOutOfRange {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Edge {} -> {} is outside of a graph with {} sites", self.start, self.end, self.n_sites)
    }
}

impl std::error::Error for EdgeOutOfRange {}

#[derive(Debug, Clone)]
pub struct StaleIndexTable {
    pub expected_revision: usize,
    pub got_revision: usize,
}

impl std::fmt::Display for StaleIndexTable {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Child index table revision {} does not follow revision {}", self.got_revision, self.expected_revision)
    }
}

impl std::error::Error for StaleIndexTable {}

/// Sites and edges of one sequence or alignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentGraph {
    pub data_type: DataType,
    /// Each site holds a codon.
    pub codons: bool,
    pub gap_symbol: String,
    pub sites: Vec<Site>,
    pub edges: Vec<Edge>,
    /// Incremented every time a corrected child index table is applied.
    pub index_revision: usize,
}

impl AlignmentGraph {
    pub fn new(data_type: DataType, codons: bool) -> Self {
        AlignmentGraph {
            data_type,
            codons,
            gap_symbol: data_type.gap_symbol(codons).to_string(),
            ..Default::default()
        }
    }

    /// Total number of sites, sentinels included.
    pub fn sites_length(&self) -> usize {
        self.sites.len()
    }

    /// Number of sites that are not sentinels.
    pub fn real_sites(&self) -> usize {
        self.sites.iter().filter(|site| !site.is_sentinel()).count()
    }

    pub fn site_at(&self, index: usize) -> Option<&Site> {
        self.sites.get(index)
    }

    pub fn push_site(&mut self, site: Site) -> usize {
        self.sites.push(site);
        self.sites.len() - 1
    }

    /// Add an edge and register it at both of its sites.
    pub fn link(
        &mut self,
        start: Option<usize>,
        end: usize,
        weight: f64,
    ) -> Result<usize, EdgeOutOfRange> {
        let n_sites = self.sites.len();
        if end >= n_sites || start.is_some_and(|s| s >= n_sites) {
            return Err(EdgeOutOfRange { start: start.unwrap_or(0), end, n_sites });
        }

        self.edges.push(Edge::weighted(start, end, weight));
        let edge_index = self.edges.len() - 1;
        if let Some(s) = start {
            self.sites[s].fwd_edges.push(edge_index);
        }
        self.sites[end].bwd_edges.push(edge_index);
        Ok(edge_index)
    }

    /// Incoming edges of a site.
    pub fn incoming(&self, index: usize) -> Vec<&Edge> {
        self.sites.get(index).map(|site| {
            site.bwd_edges.iter().filter_map(|e| self.edges.get(*e)).collect()
        }).unwrap_or_default()
    }

    /// Source of the first incoming edge of a site.
    pub fn first_predecessor(&self, index: usize) -> Option<usize> {
        self.sites.get(index)
            .and_then(|site| site.first_bwd_edge())
            .and_then(|e| self.edges.get(e))
            .and_then(|edge| edge.start)
    }

    /// True if `state` is missing or the unknown state of the graph's alphabet.
    pub fn is_unknown(&self, state: Option<usize>) -> bool {
        match state {
            Some(s) if self.codons => s == UNKNOWN_CODON_STATE,
            Some(s) => s == self.data_type.unknown_state(),
            None => true,
        }
    }

    /// Number of characters in the symbol of one site.
    pub fn symbol_width(&self) -> usize {
        if self.codons { 3 } else { 1 }
    }

    /// Symbols of the real sites concatenated.
    pub fn sequence(&self) -> String {
        self.sites.iter().filter(|site| !site.is_sentinel()).map(|site| site.symbol.as_str()).collect()
    }

    /// Child site indexes of one side as a standalone table.
    pub fn child_index_table(&self, side: Side) -> ChildIndexTable {
        let entries = self.sites.iter().map(|site| match side {
            Side::Left => site.children.left,
            Side::Right => site.children.right,
        }).collect();
        ChildIndexTable { side, revision: self.index_revision, entries }
    }

    /// Replace the child site indexes of one side with `table`.
    ///
    /// The table must be one revision ahead of the graph, i.e. derived from
    /// the table currently stored.
    pub fn apply_child_index_table(&mut self, table: ChildIndexTable) -> Result<(), StaleIndexTable> {
        if table.revision != self.index_revision + 1 || table.entries.len() != self.sites.len() {
            return Err(StaleIndexTable { expected_revision: self.index_revision, got_revision: table.revision });
        }
        self.sites.iter_mut().zip(table.entries).for_each(|(site, entry)| match table.side {
            Side::Left => site.children.left = entry,
            Side::Right => site.children.right = entry,
        });
        self.index_revision = table.revision;
        Ok(())
    }
}
