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

//! Placing reads on the tree and grafting them in.
//!
//! [ReadsAligner] runs the whole placement:
//!
//!   1. Mates are merged or paired and read ends trimmed.
//!   2. Each read is assigned a target node ([search]).
//!   3. The reads of each target are filtered for redundancy ([overlap]).
//!   4. The remaining reads are grafted above their target one at a time
//!      ([graft]).
//!
//! Alternatively all reads are stacked at the root without a search.
//!
//! ## Usage
//!
//! ```rust
//! use graftreads::aligner::SimpleAligner;
//! use graftreads::config::Settings;
//! use graftreads::graph::{AlignmentGraph, BuildOptions};
//! use graftreads::placement::ReadsAligner;
//! use graftreads::reads::ReadRecord;
//! use graftreads::tree::Tree;
//!
//! let reference = AlignmentGraph::from_read(b"ACGTACGTAC", None, &[], &BuildOptions::default()).unwrap();
//! let mut tree = Tree::single("ref", reference);
//!
//! let reads = vec![ReadRecord::new("r1", "", b"GTACGT", None)];
//! let settings = Settings::default();
//! let aligner = SimpleAligner::default();
//!
//! let summary = ReadsAligner::new(&aligner, &settings).align(&mut tree, reads, 1).unwrap();
//!
//! assert_eq!(summary.grafted, vec!["r1".to_string()]);
//! assert_eq!(tree.to_newick(), "(ref:0.001,r1:0.1)#1#;");
//! ```
//!
use std::cmp::Ordering;
use std::collections::BTreeSet;

use log::debug;
use log::info;
use log::warn;

use crate::aligner::Aligner;
use crate::config::Settings;
use crate::local::LocalAligner;
use crate::reads::io::check_alphabet;
use crate::reads::pairing;
use crate::reads::ReadRecord;
use crate::reads::Target;
use crate::tree::Tree;
use crate::tree::UnknownNode;

pub mod graft;
pub mod overlap;
pub mod report;
pub mod search;

use graft::graft_name;
use graft::pileup_window;
use graft::GraftPoint;
use report::PlacementReport;

type E = Box<dyn std::error::Error>;

/// What happened to the reads of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementSummary {
    /// Reads after merging and pairing, with their placements.
    pub reads: Vec<ReadRecord>,
    pub report: PlacementReport,
    /// Names of the reads added to the tree, in grafting order.
    pub grafted: Vec<String>,
    /// Names of the reads that failed the overlap or identity cut-off.
    pub rejected: Vec<String>,
    /// Number of reads removed as redundant.
    pub removed: usize,
    /// Number for the next graft node name.
    pub next_graft: usize,
}

fn graft_number(name: &str) -> Option<usize> {
    name.strip_prefix('#')?.strip_suffix('#')?.parse().ok()
}

/// Order in which target nodes are processed.
///
/// Graft nodes (`#n#`) come first in numeric order, other names follow in
/// lexical order.
pub fn node_order(a: &str, b: &str) -> Ordering {
    match (graft_number(a), graft_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Places reads on a [Tree] with an [Aligner].
pub struct ReadsAligner<'a, A: Aligner + ?Sized> {
    aligner: &'a A,
    local: Option<&'a dyn LocalAligner>,
    settings: &'a Settings,
}

impl<'a, A: Aligner + ?Sized> ReadsAligner<'a, A> {
    pub fn new(aligner: &'a A, settings: &'a Settings) -> Self {
        ReadsAligner { aligner, local: None, settings }
    }

    /// Use `local` to narrow down the candidates of each read.
    pub fn with_local_aligner(mut self, local: &'a dyn LocalAligner) -> Self {
        self.local = Some(local);
        self
    }

    /// Clean, merge, trim and pair the reads.
    pub fn preprocess(&self, reads: &mut Vec<ReadRecord>) -> Result<(), E> {
        let settings = self.settings;
        check_alphabet(reads);

        if settings.overlap_pair_end {
            if settings.trim_before_merge {
                pairing::trim_read_ends(reads, settings);
            }
            let merged = pairing::merge_paired_reads(reads, self.aligner, settings)?;
            info!("Merged {} read pairs", merged);
            if settings.pair_end {
                warn!("Both merging and pairing of mates requested. Pairing of overlapping reads may cause duplicated sequence regions.");
            }
        }

        if settings.trim_read_ends {
            pairing::trim_read_ends(reads, settings);
        }

        if settings.pair_end {
            let paired = pairing::find_paired_reads(reads);
            info!("Paired {} reads", paired);
        } else {
            pairing::add_trimming_comment(reads);
        }
        Ok(())
    }

    /// Place `reads` on `tree` and graft them in.
    ///
    /// Graft nodes are numbered from `first_graft`.
    pub fn align(&self, tree: &mut Tree, mut reads: Vec<ReadRecord>, first_graft: usize) -> Result<PlacementSummary, E> {
        self.settings.validate()?;
        if tree.is_empty() {
            return Err(Box::new(UnknownNode("root".to_string())));
        }

        self.preprocess(&mut reads)?;

        let mut summary = PlacementSummary { next_graft: first_graft, ..Default::default() };
        if self.settings.stack_at_root() {
            self.stack_reads_at_root(tree, &mut reads, &mut summary)?;
        } else {
            summary.report = search::find_nodes_for_reads(tree, &mut reads, self.aligner, self.local, self.settings)?;
            if self.settings.placement_only {
                info!("Placement only; the tree is not changed");
            } else {
                self.graft_reads(tree, &reads, &mut summary)?;
            }
        }
        summary.reads = reads;
        Ok(summary)
    }

    fn stack_reads_at_root(
        &self,
        tree: &mut Tree,
        reads: &mut Vec<ReadRecord>,
        summary: &mut PlacementSummary,
    ) -> Result<(), E> {
        let settings = self.settings;
        if settings.discard_pairwise_overlapping_reads {
            summary.removed += overlap::remove_overlapping_reads(reads, self.aligner, settings)?;
        }

        let root = tree.root();
        let root_name = tree[root].name.clone();
        let mut point = GraftPoint::new(tree, root)?;

        let n_reads = reads.len();
        for (i, read) in reads.iter_mut().enumerate() {
            info!("({}/{}) aligning read: {}: {}", i + 1, n_reads, read.name, read.comment);
            let window = if settings.pileup_reads_ordered && !tree[point.current].is_leaf() {
                tree[point.current].graph.as_ref().and_then(|g| pileup_window(g, settings.pileup_offset))
            } else {
                None
            };

            let verdict = point.try_graft(tree, read, &graft_name(summary.next_graft), window, self.aligner, settings)?;
            if verdict.is_accepted() {
                summary.next_graft += 1;
                summary.grafted.push(read.name.clone());
                read.placement.target = Target::Node(root_name.clone());
            } else {
                summary.rejected.push(read.name.clone());
                read.placement.target = Target::Discarded;
            }
        }
        point.finish(tree)?;
        Ok(())
    }

    fn remove_redundant(&self, reads: &mut Vec<ReadRecord>) -> Result<usize, E> {
        let settings = self.settings;
        let removed = if settings.discard_overlapping_identical_reads {
            overlap::remove_target_overlapping_identical_reads(reads, self.aligner, settings)?
        } else if settings.discard_overlapping_reads {
            overlap::remove_target_overlapping_reads(reads, settings.pair_end)
        } else if settings.discard_pairwise_overlapping_reads {
            overlap::remove_overlapping_reads(reads, self.aligner, settings)?
        } else {
            0
        };
        Ok(removed)
    }

    fn graft_reads(&self, tree: &mut Tree, reads: &[ReadRecord], summary: &mut PlacementSummary) -> Result<(), E> {
        let settings = self.settings;
        let nodes = tree.nodes_by_name();

        let mut targets: Vec<String> = reads.iter()
            .filter_map(|read| read.target_name().map(|x| x.to_string()))
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        targets.sort_by(|a, b| node_order(a, b));

        if !settings.rank_reads_for_nodes
            && (settings.discard_overlapping_identical_reads || settings.discard_overlapping_reads) {
            warn!("Without ranking the reads for nodes, overlap between reads cannot be resolved. The flag has no effect!");
        }

        for target_name in targets.iter() {
            let mut for_this: Vec<ReadRecord> = reads.iter()
                .filter(|read| read.target_name() == Some(target_name.as_str()))
                .cloned()
                .collect();
            for_this.sort_by(|a, b| b.placement.score.partial_cmp(&a.placement.score).unwrap_or(Ordering::Equal));

            if settings.rank_reads_for_nodes {
                let removed = self.remove_redundant(&mut for_this)?;
                if removed > 0 {
                    debug!("After removing overlapping ones, for node {} reads remaining:", target_name);
                    for_this.iter().for_each(|read| debug!(" {} {}", read.name, read.placement.score));
                }
                summary.removed += removed;
            }

            let target = *nodes.get(target_name).ok_or(UnknownNode(target_name.clone()))?;
            let mut point = GraftPoint::new(tree, target)?;

            let n_reads = for_this.len();
            for (i, read) in for_this.iter().enumerate() {
                info!("({}/{}) aligning read: {}: {}", i + 1, n_reads, read.name, read.comment);
                let verdict = point.try_graft(tree, read, &graft_name(summary.next_graft), None, self.aligner, settings)?;
                if verdict.is_accepted() {
                    summary.next_graft += 1;
                    summary.grafted.push(read.name.clone());
                } else {
                    summary.rejected.push(read.name.clone());
                }
            }
            point.finish(tree)?;
        }
        Ok(())
    }
}

// Tests
#[cfg(test)]
mod tests {

    // (A:0.1,B:0.1)AB with A = ACGTACGTAC, B = TTTTGGGGCC, both tagged "t1"
    fn two_leaf_tree() -> crate::tree::Tree {
        use crate::aligner::SimpleAligner;
        use crate::graph::AlignmentGraph;
        use crate::graph::BuildOptions;
        use crate::tree::Tree;

        let opts = BuildOptions::default();
        let mut tree = Tree::new();
        let a = tree.add_leaf("A", 0.1, Some(AlignmentGraph::from_read(b"ACGTACGTAC", None, &[], &opts).unwrap()));
        let b = tree.add_leaf("B", 0.1, Some(AlignmentGraph::from_read(b"TTTTGGGGCC", None, &[], &opts).unwrap()));
        let ab = tree.add_aligned_internal("AB", (a, b), 0.0, &SimpleAligner::default()).unwrap();
        tree.set_root(ab);
        tree[a].tag = Some("t1".to_string());
        tree[b].tag = Some("t1".to_string());
        tree
    }

    #[test]
    fn target_node_order() {
        use super::node_order;

        let mut got = vec!["b", "#10#", "A", "#2#", "a", "#1#"];
        got.sort_by(|x, y| node_order(x, y));

        assert_eq!(got, vec!["#1#", "#2#", "#10#", "A", "a", "b"]);
    }

    #[test]
    fn place_and_graft_tagged_reads() {
        use super::ReadsAligner;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;

        let mut tree = two_leaf_tree();
        let reads = vec![
            ReadRecord::new("r1", "TID=t1", b"GTACGTAC", None),
            ReadRecord::new("r2", "TID=t1", b"TTTTGGGG", None),
        ];
        let settings = Settings::default();
        let aligner = SimpleAligner::default();

        let got = ReadsAligner::new(&aligner, &settings).align(&mut tree, reads, 1).unwrap();

        assert_eq!(got.grafted, vec!["r1".to_string(), "r2".to_string()]);
        assert!(got.rejected.is_empty());
        assert_eq!(got.next_graft, 3);
        assert_eq!(got.report.len(), 2);
        assert_eq!(tree.number_of_leaves(), 4);

        let first = tree.find("#1#").unwrap();
        let second = tree.find("#2#").unwrap();
        let (left, right) = tree[first].children().unwrap();
        assert_eq!(tree[left].name, "A");
        assert_eq!(tree[right].name, "r1");
        assert_eq!(tree[second].children().map(|(l, _)| tree[l].name.clone()), Some("B".to_string()));
        assert_eq!(tree[tree.root()].name, "AB");
    }

    #[test]
    fn placement_only_keeps_tree() {
        use super::ReadsAligner;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;
        use crate::reads::Target;

        let mut tree = two_leaf_tree();
        let newick = tree.to_newick();
        let reads = vec![ReadRecord::new("r1", "TID=t1", b"GTACGTAC", None)];
        let settings = Settings { placement_only: true, ..Default::default() };
        let aligner = SimpleAligner::default();

        let got = ReadsAligner::new(&aligner, &settings).align(&mut tree, reads, 1).unwrap();

        assert_eq!(got.reads[0].placement.target, Target::Node("A".to_string()));
        assert!(got.grafted.is_empty());
        assert_eq!(tree.to_newick(), newick);
    }

    #[test]
    fn discarded_read_is_not_grafted() {
        use super::ReadsAligner;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;
        use crate::reads::Target;

        let mut tree = two_leaf_tree();
        let mut bad = b"A".to_vec();
        bad.extend(std::iter::repeat(b'N').take(49));
        let reads = vec![
            ReadRecord::new("bad", "TID=t1", &bad, None),
            ReadRecord::new("good", "TID=t1", b"GTACGTAC", None),
        ];
        let settings = Settings::default();
        let aligner = SimpleAligner::default();

        let got = ReadsAligner::new(&aligner, &settings).align(&mut tree, reads, 1).unwrap();

        assert_eq!(got.reads[0].placement.target, Target::Discarded);
        assert_eq!(got.grafted, vec!["good".to_string()]);
        assert!(got.rejected.is_empty());
        assert_eq!(tree.find("bad"), None);
    }

    #[test]
    fn ranked_identical_reads_graft_once() {
        use super::ReadsAligner;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;

        let mut tree = two_leaf_tree();
        let reads = vec![
            ReadRecord::new("first", "TID=t1", b"ACGTACGT", None),
            ReadRecord::new("second", "TID=t1", b"ACGTACGT", None),
        ];
        let settings = Settings {
            rank_reads_for_nodes: true,
            discard_overlapping_identical_reads: true,
            ..Default::default()
        };
        let aligner = SimpleAligner::default();

        let got = ReadsAligner::new(&aligner, &settings).align(&mut tree, reads, 1).unwrap();

        assert_eq!(got.removed, 1);
        assert_eq!(got.grafted, vec!["first".to_string()]);
        assert_eq!(tree.find("second"), None);
    }

    #[test]
    fn stack_reads_at_root() {
        use super::ReadsAligner;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;
        use crate::reads::Target;

        let mut tree = two_leaf_tree();
        let reads = vec![
            ReadRecord::new("r1", "", b"ACGTACGT", None),
            ReadRecord::new("unknown", "", b"NNNNNNNNNNNN", None),
            ReadRecord::new("r2", "", b"ACGTACGTAC", None),
        ];
        let settings = Settings { align_reads_at_root: true, ..Default::default() };
        let aligner = SimpleAligner::default();

        let got = ReadsAligner::new(&aligner, &settings).align(&mut tree, reads, 5).unwrap();

        assert_eq!(got.grafted, vec!["r1".to_string(), "r2".to_string()]);
        assert_eq!(got.rejected, vec!["unknown".to_string()]);
        assert_eq!(got.reads[1].placement.target, Target::Discarded);
        assert_eq!(tree[tree.root()].name, "#6#");
        assert_eq!(tree.number_of_leaves(), 4);
    }

    #[test]
    fn repeated_runs_place_reads_identically() {
        use super::ReadsAligner;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::graph::AlignmentGraph;
        use crate::graph::BuildOptions;
        use crate::reads::ReadRecord;
        use crate::tree::Tree;

        // A and B are identical so every read scores a tie on them
        let opts = BuildOptions::default();
        let aligner = SimpleAligner::default();
        let mut tree = Tree::new();
        let a = tree.add_leaf("A", 0.1, Some(AlignmentGraph::from_read(b"ACGTACGTAC", None, &[], &opts).unwrap()));
        let b = tree.add_leaf("B", 0.1, Some(AlignmentGraph::from_read(b"ACGTACGTAC", None, &[], &opts).unwrap()));
        let c = tree.add_leaf("C", 0.2, Some(AlignmentGraph::from_read(b"TTTTGGGGCC", None, &[], &opts).unwrap()));
        let ab = tree.add_aligned_internal("AB", (a, b), 0.1, &aligner).unwrap();
        let root = tree.add_aligned_internal("root", (ab, c), 0.0, &aligner).unwrap();
        tree.set_root(root);
        for node in [a, b, c] {
            tree[node].tag = Some("t1".to_string());
        }

        let reads = vec![
            ReadRecord::new("r1", "TID=t1", b"GTACGTAC", None),
            ReadRecord::new("r2", "TID=t1", b"TTTTGGGG", None),
            ReadRecord::new("r3", "TID=t1", b"ACGTACGT", None),
            ReadRecord::new("r4", "TID=t1", b"GGGGCC", None),
        ];
        let settings = Settings { rank_reads_for_nodes: true, ..Default::default() };

        let mut first_tree = tree.clone();
        let mut second_tree = tree.clone();
        let first = ReadsAligner::new(&aligner, &settings).align(&mut first_tree, reads.clone(), 1).unwrap();
        let second = ReadsAligner::new(&aligner, &settings).align(&mut second_tree, reads.clone(), 1).unwrap();

        assert_eq!(first.report.lines, second.report.lines);
        assert_eq!(first.grafted, second.grafted);
        assert_eq!(first.rejected, second.rejected);
        assert_eq!(first_tree.to_newick(), second_tree.to_newick());

        // The tie goes to the same node in both runs
        let node_of = |name: &str| first.report.lines.iter().find(|line| line.read == name).map(|line| line.node.clone());
        assert_eq!(node_of("r1"), node_of("r3"));
        assert_ne!(node_of("r1"), Some("C".to_string()));
    }

    #[test]
    fn invalid_settings_are_an_error() {
        use super::ReadsAligner;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;

        let mut tree = two_leaf_tree();
        let settings = Settings { min_reads_overlap: 2.0, ..Default::default() };
        let aligner = SimpleAligner::default();

        assert!(ReadsAligner::new(&aligner, &settings).align(&mut tree, Vec::new(), 1).is_err());
    }
}
