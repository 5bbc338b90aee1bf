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

//! Choosing the node each read is aligned against.
//!
//! Candidates are the nodes carrying the read's tag, or every (internal)
//! node of the tree. A single candidate is taken as is unless ranking is
//! requested; otherwise each candidate is aligned with the read and scored
//! by the fraction of read sites identical to the node.
//!
use std::collections::HashMap;

use indexmap::IndexMap;
use log::debug;
use log::info;
use log::warn;

use crate::aligner::Aligner;
use crate::config::CandidateMode;
use crate::config::Settings;
use crate::local::LocalAligner;
use crate::local::LocalHit;
use crate::placement::graft::GRAFT_DISTANCE;
use crate::placement::report::PlacementNote;
use crate::placement::report::PlacementReport;
use crate::placement::report::EXHAUSTIVE_TAG;
use crate::placement::report::MISSING_TAG;
use crate::reads::ReadRecord;
use crate::reads::ReadSpans;
use crate::reads::Target;
use crate::tree::NodeIndex;
use crate::tree::Tree;
use crate::tree::UnknownNode;

type E = Box<dyn std::error::Error>;

/// Reads whose best node scores below this are not placed there.
pub const MIN_PLACEMENT_SCORE: f64 = 0.05;

/// Score of a read against one node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchScore {
    /// Identical sites over all read sites.
    pub score: f64,
    pub matching: usize,
    /// Node sites covered by the read.
    pub spans: ReadSpans,
}

/// Candidate node names grouped by the tag that selects them.
///
/// Exhaustive modes put every candidate under [EXHAUSTIVE_TAG].
pub fn candidate_nodes(tree: &Tree, mode: CandidateMode) -> IndexMap<String, Vec<String>> {
    match mode {
        CandidateMode::Tagged => tree.tagged_nodes(),
        CandidateMode::EveryNode => IndexMap::from([(EXHAUSTIVE_TAG.to_string(), tree.node_names())]),
        CandidateMode::EveryInternalNode => IndexMap::from([(EXHAUSTIVE_TAG.to_string(), tree.internal_node_names())]),
    }
}

/// Align `read` against `node` and count the identical sites.
///
/// Spans are recorded as sites of `node`. A read site aligned to a gap in
/// the node takes the position of the preceding node site.
pub fn read_match_score<A: Aligner + ?Sized>(
    tree: &Tree,
    node: NodeIndex,
    read: &ReadRecord,
    aligner: &A,
    settings: &Settings,
) -> Result<MatchScore, E> {
    let target = tree.node(node).ok_or(UnknownNode(node.to_string()))?;
    let node_graph = target.graph.as_ref().ok_or(UnknownNode(target.name.clone()))?;
    let read_graph = read.graph(&settings.build_options(read.data_type, true))?;

    let aligned = aligner.align(node_graph, GRAFT_DISTANCE, &read_graph, settings.reads_distance, None)?;

    let first_length = read.first_read_length;
    let mut spans = ReadSpans::default();
    let mut matching = 0;
    let mut node_position = 0;
    let n_columns = aligned.sites_length().saturating_sub(1);
    for site in aligned.sites.iter().take(n_columns).skip(1) {
        if let Some(left) = site.children.left {
            node_position = left;
        }
        let Some(right) = site.children.right else { continue };

        match right {
            1 => spans.start1 = Some(node_position),
            r if Some(r) == first_length => spans.end1 = Some(node_position),
            r if first_length.is_some_and(|len| r == len + 1) => spans.start2 = Some(node_position),
            _ => spans.end2 = Some(node_position),
        }

        if let Some(left) = site.children.left {
            let node_state = node_graph.site_at(left).map(|s| s.state);
            let read_state = read_graph.site_at(right).map(|s| s.state);
            if node_state.is_some() && node_state == read_state {
                matching += 1;
            }
        }
    }

    let read_sites = read_graph.real_sites();
    let score = if read_sites > 0 { matching as f64 / read_sites as f64 } else { 0.0 };
    Ok(MatchScore { score, matching, spans })
}

fn attach_local_hit(read: &mut ReadRecord, hit: Option<&LocalHit>, settings: &Settings) {
    if let Some(hit) = hit {
        read.placement.local = Some(*hit);
        read.placement.use_local = settings.use_local_helper();
    }
}

/// Decide the target node of every read.
///
/// Sets `placement` of each read to a node or to [Target::Discarded] and
/// returns the placement report. Reads that cannot be matched to a searched
/// node go to the root.
pub fn find_nodes_for_reads<A: Aligner + ?Sized>(
    tree: &Tree,
    reads: &mut [ReadRecord],
    aligner: &A,
    local: Option<&dyn LocalAligner>,
    settings: &Settings,
) -> Result<PlacementReport, E> {
    let root_name = tree.node(tree.root()).map(|n| n.name.clone()).ok_or(UnknownNode("root".to_string()))?;
    let nodes = tree.nodes_by_name();
    let candidate_lists = candidate_nodes(tree, settings.candidate_mode);
    let exhaustive = settings.candidate_mode != CandidateMode::Tagged;
    let helper = local.filter(|h| settings.use_local_helper() && h.is_available());

    let mut report = PlacementReport::new();
    let n_reads = reads.len();
    for (i, read) in reads.iter_mut().enumerate() {
        read.placement = Default::default();

        let tag = if exhaustive { Some(EXHAUSTIVE_TAG.to_string()) } else { read.tag.clone() };
        let Some(tag) = tag else {
            info!("Read {} ({}/{}) has no tid. Aligned to root.", read.name, i + 1, n_reads);
            read.placement.target = Target::Node(root_name.clone());
            report.record(&read.name, &root_name, MISSING_TAG, None);
            continue;
        };

        let mut candidates: Vec<String> = candidate_lists.get(&tag).cloned().unwrap_or_default();

        let mut hits: HashMap<String, LocalHit> = HashMap::new();
        if let Some(helper) = helper {
            if !candidates.is_empty() {
                match helper.local_alignment(tree, read, &candidates) {
                    Ok(found) if found.is_empty() => {
                        info!("Read {} ({}/{}) has no local hits. Read is discarded.", read.name, i + 1, n_reads);
                        read.placement.target = Target::Discarded;
                        continue;
                    },
                    Ok(found) => {
                        candidates.retain(|name| found.contains_key(name));
                        hits = found;
                    },
                    Err(e) => warn!("Local alignment of {} failed: {}", read.name, e),
                }
            }
        }

        if candidates.is_empty() {
            warn!("Read {} ({}/{}) with the tid {} has no matching node. Aligned to root.", read.name, i + 1, n_reads, tag);
            read.placement.target = Target::Node(root_name.clone());
            report.record(&read.name, &root_name, &tag, Some(PlacementNote::NoMatch));
            continue;
        }

        if candidates.len() == 1 && !settings.rank_reads_for_nodes {
            let node = &candidates[0];
            info!("Read {} ({}/{}) with the tid {} only matches the node {}.", read.name, i + 1, n_reads, tag, node);
            read.placement.target = Target::Node(node.clone());
            attach_local_hit(read, hits.get(node), settings);
            report.record(&read.name, node, &tag, None);
            continue;
        }

        info!("Read {} ({}/{}) with TID {} matches {} nodes.", read.name, i + 1, n_reads, tag, candidates.len());
        let mut best_score = f64::NEG_INFINITY;
        let mut best: Option<(&String, MatchScore)> = None;
        for name in candidates.iter() {
            let index = *nodes.get(name).ok_or(UnknownNode(name.clone()))?;
            let scored = read_match_score(tree, index, read, aligner, settings)?;
            debug!("   {} with score {} (simple p-distance)", name, scored.score);
            if scored.score > best_score {
                best_score = scored.score;
                best = Some((name, scored));
            }
        }

        match best {
            Some((name, scored)) if scored.score >= MIN_PLACEMENT_SCORE => {
                info!("  best node {} (score {}).", name, scored.score);
                read.placement.target = Target::Node(name.clone());
                read.placement.score = scored.score;
                read.placement.spans = scored.spans;
                attach_local_hit(read, hits.get(name), settings);
                report.record(&read.name, name, &tag, None);
            },
            _ => {
                if settings.align_bad_reads_at_root {
                    info!("Best node aligns with less than 5% of identical sites. Aligning to root instead.");
                    read.placement.target = Target::Node(root_name.clone());
                    report.record(&read.name, &root_name, &tag, Some(PlacementNote::Bad));
                } else {
                    info!("Best node aligns with less than 5% of identical sites. Read is discarded.");
                    read.placement.target = Target::Discarded;
                }
            },
        }
    }
    Ok(report)
}

// Tests
#[cfg(test)]
mod tests {

    // ((A:0.1,B:0.1)AB:0.0)
    // A = ACGTACGTAC, B = TTTTGGGGCC, both tagged "t1"
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
    fn score_identical_read() {
        use super::read_match_score;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;

        let tree = two_leaf_tree();
        let a = tree.find("A").unwrap();
        let read = ReadRecord::new("r", "", b"GTACGT", None);

        let got = read_match_score(&tree, a, &read, &SimpleAligner::default(), &Settings::default()).unwrap();

        assert_eq!(got.matching, 6);
        assert_eq!(got.score, 1.0);
        assert_eq!(got.spans.start1, Some(3));
        assert_eq!(got.spans.end2, Some(8));
        assert_eq!(got.spans.end1, None);
    }

    #[test]
    fn score_records_mate_spans() {
        use super::read_match_score;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;

        let tree = two_leaf_tree();
        let a = tree.find("A").unwrap();
        let mut read = ReadRecord::new("r/p12", "", b"ACG0ACGTAC", None);
        read.first_read_length = Some(3);

        let got = read_match_score(&tree, a, &read, &SimpleAligner::default(), &Settings::default()).unwrap();

        assert_eq!(got.spans.start1, Some(1));
        assert_eq!(got.spans.end1, Some(3));
        assert!(got.spans.start2.is_some_and(|x| x > 3));
        assert_eq!(got.spans.end2, Some(10));
    }

    #[test]
    fn best_scoring_node_wins() {
        use super::find_nodes_for_reads;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;
        use crate::reads::Target;

        let tree = two_leaf_tree();
        let mut reads = vec![
            ReadRecord::new("r1", "TID=t1", b"TTTTGGGG", None),
            ReadRecord::new("r2", "TID=t1", b"ACGTACGT", None),
        ];

        let report = find_nodes_for_reads(&tree, &mut reads, &SimpleAligner::default(), None, &Settings::default()).unwrap();

        assert_eq!(reads[0].placement.target, Target::Node("B".to_string()));
        assert_eq!(reads[0].placement.score, 1.0);
        assert_eq!(reads[1].placement.target, Target::Node("A".to_string()));
        assert_eq!(report.lines[0].to_string(), "r1 B TID=t1");
    }

    #[test]
    fn untagged_and_unmatched_reads_go_to_root() {
        use super::find_nodes_for_reads;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::placement::report::PlacementNote;
        use crate::reads::ReadRecord;
        use crate::reads::Target;

        let tree = two_leaf_tree();
        let mut reads = vec![
            ReadRecord::new("r1", "", b"TTTTGGGG", None),
            ReadRecord::new("r2", "TID=t9", b"ACGTACGT", None),
        ];

        let report = find_nodes_for_reads(&tree, &mut reads, &SimpleAligner::default(), None, &Settings::default()).unwrap();

        assert_eq!(reads[0].placement.target, Target::Node("AB".to_string()));
        assert_eq!(reads[1].placement.target, Target::Node("AB".to_string()));
        assert_eq!(report.lines[0].to_string(), "r1 AB TID=NULL");
        assert_eq!(report.lines[1].note, Some(PlacementNote::NoMatch));
    }

    #[test]
    fn single_candidate_is_assigned_directly() {
        use super::find_nodes_for_reads;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;
        use crate::reads::Target;

        let mut tree = two_leaf_tree();
        let b = tree.find("B").unwrap();
        tree[b].tag = Some("t2".to_string());
        let mut reads = vec![ReadRecord::new("r1", "TID=t2", b"ACGTACGT", None)];

        find_nodes_for_reads(&tree, &mut reads, &SimpleAligner::default(), None, &Settings::default()).unwrap();

        // Not scored even though the read fits A better
        assert_eq!(reads[0].placement.target, Target::Node("B".to_string()));
        assert_eq!(reads[0].placement.score, -1.0);
    }

    #[test]
    fn poorly_matching_read_is_discarded() {
        use super::find_nodes_for_reads;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;
        use crate::reads::Target;

        let tree = two_leaf_tree();
        // 1 of 50 sites identical to the best node
        let mut seq = b"A".to_vec();
        seq.extend(std::iter::repeat(b'N').take(49));
        let mut reads = vec![ReadRecord::new("bad", "TID=t1", &seq, None)];

        let report = find_nodes_for_reads(&tree, &mut reads, &SimpleAligner::default(), None, &Settings::default()).unwrap();

        assert_eq!(reads[0].placement.target, Target::Discarded);
        assert!(report.is_empty());

        let settings = Settings { align_bad_reads_at_root: true, ..Default::default() };
        let report = find_nodes_for_reads(&tree, &mut reads, &SimpleAligner::default(), None, &settings).unwrap();

        assert_eq!(reads[0].placement.target, Target::Node("AB".to_string()));
        assert_eq!(report.lines[0].to_string(), "bad AB TID=t1 (bad)");
    }

    #[test]
    fn exhaustive_search_ignores_tags() {
        use super::find_nodes_for_reads;
        use crate::aligner::SimpleAligner;
        use crate::config::CandidateMode;
        use crate::config::Settings;
        use crate::reads::ReadRecord;
        use crate::reads::Target;

        let tree = two_leaf_tree();
        let mut reads = vec![ReadRecord::new("r1", "", b"TTTTGGGGCC", None)];
        let settings = Settings { candidate_mode: CandidateMode::EveryInternalNode, ..Default::default() };

        let report = find_nodes_for_reads(&tree, &mut reads, &SimpleAligner::default(), None, &settings).unwrap();

        assert_eq!(reads[0].placement.target, Target::Node("AB".to_string()));
        assert_eq!(report.lines[0].to_string(), "r1 AB TID=<empty>");
    }

    struct FixedHits(std::collections::HashMap<String, crate::local::LocalHit>);

    impl crate::local::LocalAligner for FixedHits {
        fn is_available(&self) -> bool {
            true
        }

        fn local_alignment(
            &self,
            _tree: &crate::tree::Tree,
            _read: &crate::reads::ReadRecord,
            candidates: &[String],
        ) -> Result<std::collections::HashMap<String, crate::local::LocalHit>, Box<dyn std::error::Error>> {
            Ok(self.0.iter().filter(|(k, _)| candidates.contains(k)).map(|(k, v)| (k.clone(), *v)).collect())
        }
    }

    #[test]
    fn local_hits_narrow_the_candidates() {
        use super::find_nodes_for_reads;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::local::LocalHit;
        use crate::reads::ReadRecord;
        use crate::reads::Target;

        let tree = two_leaf_tree();
        let hit = LocalHit { query_start: 0, query_end: 8, target_start: 0, target_end: 8, score: 40 };
        let helper = FixedHits([("B".to_string(), hit)].into_iter().collect());
        let settings = Settings { fast_placement: true, ..Default::default() };
        let mut reads = vec![ReadRecord::new("r1", "TID=t1", b"TTTTGGGG", None)];

        find_nodes_for_reads(&tree, &mut reads, &SimpleAligner::default(), Some(&helper), &settings).unwrap();

        assert_eq!(reads[0].placement.target, Target::Node("B".to_string()));
        assert_eq!(reads[0].placement.local, Some(hit));
        assert!(reads[0].placement.use_local);

        let helper = FixedHits(std::collections::HashMap::new());
        find_nodes_for_reads(&tree, &mut reads, &SimpleAligner::default(), Some(&helper), &settings).unwrap();

        assert_eq!(reads[0].placement.target, Target::Discarded);
    }
}
