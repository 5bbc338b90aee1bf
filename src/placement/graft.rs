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

//! Grafting reads into the tree.
//!
//! Reads placed on the same node are added one at a time. Each accepted
//! read gets a new internal node whose left child is the current
//! insertion point and whose right child is the read; the new node becomes
//! the insertion point for the next read. When all reads of the node are
//! done, [GraftPoint::finish] hangs the last graft where the node used to
//! be and corrects the parent's site indexes.
//!
use log::debug;
use log::info;

use crate::aligner::Aligner;
use crate::aligner::AlignmentWindow;
use crate::config::Settings;
use crate::graph::AlignmentGraph;
use crate::placement::overlap::check_read_alignment;
use crate::placement::overlap::measure_overlap;
use crate::placement::overlap::PlacementVerdict;
use crate::reads::ReadRecord;
use crate::tree::index::correct;
use crate::tree::index::offset_table;
use crate::tree::index::Side;
use crate::tree::NodeIndex;
use crate::tree::Tree;
use crate::tree::UnknownNode;

type E = Box<dyn std::error::Error>;

/// Branch length between a graft and its left child.
pub const GRAFT_DISTANCE: f64 = 0.001;

/// Margin added around a local hit.
const LOCAL_WINDOW_MARGIN: usize = 20;
/// Extra columns allowed per read site outside a local hit.
const LOCAL_WINDOW_MULTIPLIER: usize = 2;

/// Name of the `count`th graft node.
pub fn graft_name(count: usize) -> String {
    format!("#{}#", count)
}

/// Alignment window around the local hit of a read.
///
/// The hit is in site coordinates, `read_sites` counts the real sites of
/// the read. Bounds that fall outside `[0, target_sites]` are left open.
pub fn local_window(read: &ReadRecord, read_sites: usize, target_sites: usize) -> Option<AlignmentWindow> {
    let hit = read.placement.local.filter(|_| read.placement.use_local)?;

    let start = hit.target_start
        .checked_sub(LOCAL_WINDOW_MARGIN + hit.query_start * LOCAL_WINDOW_MULTIPLIER);
    let end = hit.target_end + LOCAL_WINDOW_MARGIN
        + read_sites.saturating_sub(hit.query_end) * LOCAL_WINDOW_MULTIPLIER;
    let end = if end > target_sites { None } else { Some(end) };

    Some(AlignmentWindow { start, end })
}

/// Alignment window starting near the first read column of `graph`.
pub fn pileup_window(graph: &AlignmentGraph, offset: usize) -> Option<AlignmentWindow> {
    let first_read_column = (1..graph.sites_length())
        .find(|i| graph.sites[*i].children.right.is_some())
        .unwrap_or(graph.sites_length());
    let start = first_read_column.checked_sub(offset)?;
    Some(AlignmentWindow { start: Some(start), end: None })
}

/// Insertion point for the reads placed on one node.
#[derive(Debug, Clone, PartialEq)]
pub struct GraftPoint {
    /// Node the reads were placed on.
    pub target: NodeIndex,
    /// Node the next read is grafted above.
    pub current: NodeIndex,
    /// Parent of `target` and the side it hangs from, before grafting.
    pub parent: Option<(NodeIndex, Side)>,
    /// Branch length left for the last graft.
    pub budget: f64,
    pub grafts: usize,
}

impl GraftPoint {
    pub fn new(tree: &Tree, target: NodeIndex) -> Result<Self, UnknownNode> {
        let node = tree.node(target).ok_or(UnknownNode(target.to_string()))?;
        Ok(GraftPoint {
            target,
            current: target,
            parent: tree.parent_of(target),
            budget: node.distance_to_parent,
            grafts: 0,
        })
    }

    /// Align `read` above the current insertion point and keep it if it
    /// overlaps the target well enough.
    ///
    /// The graft node is called `name`. Rejected reads leave the tree
    /// untouched.
    pub fn try_graft<A: Aligner + ?Sized>(
        &mut self,
        tree: &mut Tree,
        read: &ReadRecord,
        name: &str,
        window: Option<AlignmentWindow>,
        aligner: &A,
        settings: &Settings,
    ) -> Result<PlacementVerdict, E> {
        let read_graph = read.graph(&settings.build_options(read.data_type, settings.no_trimming))?;

        let current = &tree[self.current];
        let current_graph = current.graph.as_ref().ok_or(UnknownNode(current.name.clone()))?;
        let window = window.or_else(|| local_window(read, read_graph.real_sites(), current_graph.sites_length()));
        if let Some(w) = window {
            debug!("alignment window {:?}..{:?}", w.start, w.end);
        }

        let aligned = aligner.align(current_graph, GRAFT_DISTANCE, &read_graph, settings.reads_distance, window)?;

        let counts = measure_overlap(tree, self.current, self.target, &aligned, &read_graph);
        let verdict = check_read_alignment(&read.name, &counts, settings);
        if !verdict.is_accepted() {
            return Ok(verdict);
        }

        let tag = tree[self.current].tag.clone();
        tree[self.current].distance_to_parent = GRAFT_DISTANCE;
        let leaf = tree.add_leaf(&read.name, settings.reads_distance, Some(read_graph));
        tree[leaf].comment = read.comment.clone();
        tree[leaf].tag = tag.clone();
        let graft = tree.add_internal(name, (self.current, leaf), GRAFT_DISTANCE, Some(aligned));
        tree[graft].tag = tag;

        self.current = graft;
        if self.budget > GRAFT_DISTANCE {
            self.budget -= GRAFT_DISTANCE;
        }
        self.grafts += 1;
        Ok(verdict)
    }

    /// Put the last graft in place of the target.
    ///
    /// Returns the new root if the target was the root.
    pub fn finish(self, tree: &mut Tree) -> Result<Option<NodeIndex>, E> {
        tree[self.current].distance_to_parent = self.budget;
        if self.grafts == 0 {
            return Ok(None);
        }

        match self.parent {
            Some((parent, side)) => {
                tree.replace_child(parent, side, self.current);
                let changed = correct_sites_index(tree, parent, side, self.current, self.target)?;
                debug!("Parent of {} is {}; {} alignments done; site index {}",
                       tree[self.target].name, tree[parent].name, self.grafts,
                       if changed { "needs correcting" } else { "not changed" });
                Ok(None)
            },
            None => {
                info!("No parent for {} found. Assuming that this is root.", tree[self.target].name);
                tree.set_root(self.current);
                Ok(Some(self.current))
            },
        }
    }
}

/// Shift the child site indexes of `parent` after grafting above `target`.
///
/// `graft` now hangs from `side` of `parent` in place of `target`. Returns
/// true if any index moved, in which case that side of `parent` is flagged
/// for correction.
pub fn correct_sites_index(
    tree: &mut Tree,
    parent: NodeIndex,
    side: Side,
    graft: NodeIndex,
    target: NodeIndex,
) -> Result<bool, E> {
    let offsets = offset_table(tree[graft].sites_length(), |j| tree.site_at_column(graft, j, target).is_some());

    let parent_node = &mut tree[parent];
    let name = parent_node.name.clone();
    let graph = parent_node.graph.as_mut().ok_or(UnknownNode(name))?;
    let corrected = correct(&graph.child_index_table(side), &offsets)?;
    graph.apply_child_index_table(corrected.table)?;

    if corrected.changed {
        parent_node.set_needs_correcting(side);
    }
    Ok(corrected.changed)
}

// Tests
#[cfg(test)]
mod tests {

    // ((A,B)AB,C)root with A = ACGTACGT, B = ACGTTCGT, C = ACGTACGA
    fn reference_tree() -> crate::tree::Tree {
        use crate::aligner::SimpleAligner;
        use crate::graph::AlignmentGraph;
        use crate::graph::BuildOptions;
        use crate::tree::Tree;

        let opts = BuildOptions::default();
        let aligner = SimpleAligner::default();
        let mut tree = Tree::new();
        let a = tree.add_leaf("A", 0.1, Some(AlignmentGraph::from_read(b"ACGTACGT", None, &[], &opts).unwrap()));
        let b = tree.add_leaf("B", 0.1, Some(AlignmentGraph::from_read(b"ACGTTCGT", None, &[], &opts).unwrap()));
        let c = tree.add_leaf("C", 0.3, Some(AlignmentGraph::from_read(b"ACGTACGA", None, &[], &opts).unwrap()));
        let ab = tree.add_aligned_internal("AB", (a, b), 0.2, &aligner).unwrap();
        let root = tree.add_aligned_internal("root", (ab, c), 0.0, &aligner).unwrap();
        tree.set_root(root);
        tree
    }

    #[test]
    fn local_window_bounds() {
        use super::local_window;
        use crate::local::LocalHit;
        use crate::reads::ReadRecord;

        let mut read = ReadRecord::new("r", "", b"ACGT", None);
        read.placement.local = Some(LocalHit { query_start: 2, query_end: 30, target_start: 100, target_end: 128, score: 50 });

        assert_eq!(local_window(&read, 42, 500), None);

        read.placement.use_local = true;
        let got = local_window(&read, 42, 500).unwrap();
        assert_eq!(got.start, Some(76));
        assert_eq!(got.end, Some(172));

        let got = local_window(&read, 42, 150).unwrap();
        assert_eq!(got.end, None);

        read.placement.local = Some(LocalHit { query_start: 5, query_end: 30, target_start: 10, target_end: 38, score: 50 });
        assert_eq!(local_window(&read, 42, 500).unwrap().start, None);
    }

    #[test]
    fn local_window_from_helper_offsets() {
        use super::local_window;
        use crate::local::parse_hits;
        use crate::reads::ReadRecord;

        // Read sites 0..6 on characters 30..36 of the node
        let hits = parse_hits("r n 0 6 30 36 30\n");
        let mut read = ReadRecord::new("r", "", b"ACGTAC", None);
        read.placement.use_local = true;

        read.placement.local = Some(hits["n"].to_sites(1));
        let got = local_window(&read, 6, 100).unwrap();
        assert_eq!(got.start, Some(11));
        assert_eq!(got.end, Some(57));

        // Codon sites span three characters
        read.placement.local = Some(hits["n"].to_sites(3));
        let got = local_window(&read, 2, 100).unwrap();
        assert_eq!(got.start, None);
        assert_eq!(got.end, Some(33));
    }

    #[test]
    fn graft_reads_above_leaf() {
        use super::GraftPoint;
        use super::graft_name;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;
        use crate::tree::index::Side;

        let mut tree = reference_tree();
        let aligner = SimpleAligner::default();
        let settings = Settings::default();
        let a = tree.find("A").unwrap();
        let ab = tree.find("AB").unwrap();

        let mut point = GraftPoint::new(&tree, a).unwrap();
        assert_eq!(point.parent, Some((ab, Side::Left)));

        let reads = [
            ReadRecord::new("r1", "", b"GTACGT", None),
            ReadRecord::new("r2", "", b"TTTTTTTTTTTTTTTTTTTT", None),
            ReadRecord::new("r3", "", b"ACGTAC", None),
        ];
        let mut count = 1;
        let mut accepted = Vec::new();
        for read in reads.iter() {
            let verdict = point.try_graft(&mut tree, read, &graft_name(count), None, &aligner, &settings).unwrap();
            if verdict.is_accepted() {
                count += 1;
                accepted.push(read.name.clone());
            }
        }
        assert_eq!(accepted, vec!["r1", "r3"]);
        assert_eq!(point.grafts, 2);

        let last = point.current;
        let new_root = point.finish(&mut tree).unwrap();

        assert_eq!(new_root, None);
        assert_eq!(tree.parent_of(last), Some((ab, Side::Left)));
        assert_eq!(tree[last].name, "#2#");
        assert!((tree[last].distance_to_parent - 0.098).abs() < 1e-9);
        let newick = tree.to_newick();
        assert!(newick.starts_with("((((A:0.001,r1:0.1)#1#:0.001,r3:0.1)#2#:0.09"));
        assert!(newick.ends_with(",B:0.1)AB:0.2,C:0.3)root;"));
    }

    #[test]
    fn graft_with_insertion_corrects_parent_index() {
        use super::GraftPoint;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;
        use crate::tree::index::Side;

        let mut tree = reference_tree();
        let aligner = SimpleAligner::default();
        let settings = Settings::default();
        let a = tree.find("A").unwrap();
        let b = tree.find("B").unwrap();
        let ab = tree.find("AB").unwrap();
        let before = tree[ab].graph.as_ref().unwrap().child_index_table(Side::Left);

        // Read with two extra bases in the middle of A
        let read = ReadRecord::new("ins", "", b"ACGTGGACGT", None);
        let mut point = GraftPoint::new(&tree, a).unwrap();
        assert!(point.try_graft(&mut tree, &read, "#1#", None, &aligner, &settings).unwrap().is_accepted());
        let graft = point.current;
        point.finish(&mut tree).unwrap();

        let after = tree[ab].graph.as_ref().unwrap().child_index_table(Side::Left);
        assert_eq!(after.revision, before.revision + 1);
        assert!(tree[ab].left_needs_correcting);
        assert!(!tree[ab].right_needs_correcting);

        // Every corrected index still leads to the same site of A
        for (old, new) in before.entries.iter().zip(after.entries.iter()) {
            match (old, new) {
                (Some(old), Some(new)) => assert_eq!(tree.site_at_column(graft, *new, a), Some(*old)),
                (None, None) => (),
                _ => panic!("gap changed into a site"),
            }
        }
        // The other side is untouched
        assert_eq!(tree.site_at_column(ab, 1, b), Some(1));
    }

    #[test]
    fn graft_at_root_moves_root() {
        use super::GraftPoint;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;

        let mut tree = reference_tree();
        let root = tree.root();
        let mut point = GraftPoint::new(&tree, root).unwrap();
        let read = ReadRecord::new("r1", "", b"ACGTACGT", None);

        point.try_graft(&mut tree, &read, "#1#", None, &SimpleAligner::default(), &Settings::default()).unwrap();
        let graft = point.current;
        let got = point.finish(&mut tree).unwrap();

        assert_eq!(got, Some(graft));
        assert_eq!(tree.root(), graft);
        assert_eq!(tree.number_of_leaves(), 4);
    }

    #[test]
    fn rejected_read_leaves_tree_untouched() {
        use super::GraftPoint;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;

        let mut tree = reference_tree();
        let c = tree.find("C").unwrap();
        let newick = tree.to_newick();
        let mut point = GraftPoint::new(&tree, c).unwrap();
        let read = ReadRecord::new("far", "", b"TTTTTTTTTTTTTTTTTTTT", None);

        let verdict = point.try_graft(&mut tree, &read, "#1#", None, &SimpleAligner::default(), &Settings::default()).unwrap();

        assert!(!verdict.is_accepted());
        assert_eq!(point.finish(&mut tree).unwrap(), None);
        assert_eq!(tree.to_newick(), newick);
    }
}
