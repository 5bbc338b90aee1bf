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
use crate::alphabet::DataType;
use crate::alphabet::BREAK_MARKER;
use crate::graph::AlignmentGraph;
use crate::graph::BuildOptions;
use crate::graph::InputEdge;
use crate::local::LocalHit;

type E = Box<dyn std::error::Error>;

/// Prefix of the comment token holding a read's tag.
pub const TAG_PREFIX: &str = "TID=";

/// Node a read was assigned to.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Target {
    #[default]
    Unassigned,
    Node(String),
    /// Not placed anywhere.
    Discarded,
}

/// Alignment columns of the read's ends on its target node.
///
/// For paired reads `end1` and `start2` are the columns of the last site
/// of the first mate and the first site of the second mate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSpans {
    pub start1: Option<usize>,
    pub end1: Option<usize>,
    pub start2: Option<usize>,
    pub end2: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub target: Target,
    /// Fraction of read sites identical to the target, -1 if not scored.
    pub score: f64,
    pub spans: ReadSpans,
    /// Hit of the local alignment helper on the target.
    pub local: Option<LocalHit>,
    /// Restrict the final alignment to the neighbourhood of `local`.
    pub use_local: bool,
}

impl Default for Placement {
    fn default() -> Self {
        Placement {
            target: Target::Unassigned,
            score: -1.0,
            spans: ReadSpans::default(),
            local: None,
            use_local: false,
        }
    }
}

/// A read and everything learned about it during the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadRecord {
    pub name: String,
    pub comment: String,
    pub sequence: Vec<u8>,
    pub quality: Option<Vec<u8>>,
    pub data_type: DataType,
    /// Edges for reads that are graphs themselves.
    pub edges: Vec<InputEdge>,
    pub tag: Option<String>,
    /// Bases trimmed from the start and the end.
    pub trim_start: usize,
    pub trim_end: usize,
    /// Length of the first mate of a paired read.
    pub first_read_length: Option<usize>,
    pub placement: Placement,
}

impl ReadRecord {
    pub fn new(name: &str, comment: &str, sequence: &[u8], quality: Option<&[u8]>) -> Self {
        ReadRecord {
            name: name.to_string(),
            comment: comment.to_string(),
            sequence: sequence.to_vec(),
            quality: quality.map(|q| q.to_vec()),
            tag: parse_tag(comment),
            ..Default::default()
        }
    }

    pub fn is_paired(&self) -> bool {
        self.first_read_length.is_some()
    }

    /// Number of sites the read's graph will have, sentinels excluded.
    pub fn sites_length(&self) -> usize {
        self.sequence.iter().filter(|x| **x != BREAK_MARKER).count()
    }

    /// Number of real sites in the graph of this read.
    ///
    /// With `codons` a DNA read has one site per three bases.
    pub fn graph_sites(&self, codons: bool) -> usize {
        if codons && self.data_type == DataType::Dna {
            self.sites_length().div_ceil(3)
        } else {
            self.sites_length()
        }
    }

    /// Build the graph of this read.
    pub fn graph(&self, opts: &BuildOptions) -> Result<AlignmentGraph, E> {
        let opts = BuildOptions { data_type: self.data_type, ..opts.clone() };
        AlignmentGraph::from_read(&self.sequence, self.quality.as_deref(), &self.edges, &opts)
    }

    pub fn is_discarded(&self) -> bool {
        self.placement.target == Target::Discarded
    }

    pub fn target_name(&self) -> Option<&str> {
        match &self.placement.target {
            Target::Node(name) => Some(name),
            _ => None,
        }
    }
}

/// Value of the first `TID=` token in a comment.
pub fn parse_tag(comment: &str) -> Option<String> {
    comment.split(|c: char| c.is_whitespace() || c == ';')
        .find_map(|token| token.strip_prefix(TAG_PREFIX))
        .filter(|tag| !tag.is_empty())
        .map(|tag| tag.to_string())
}
