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

//! Redundant reads and acceptance of a placement.
//!
//! Three filters remove reads that add nothing to the alignment:
//!
//!   - [remove_overlapping_reads] aligns every pair of reads and drops reads
//!     whose every site matches the other read.
//!   - [remove_target_overlapping_reads] drops reads whose span on their
//!     target node lies within the span of an earlier read.
//!   - [remove_target_overlapping_identical_reads] additionally requires the
//!     contained read to be identical to the other one.
//!
//! [check_read_alignment] decides whether a read aligned at its target
//! overlaps the node well enough to be kept.
//!
use log::info;
use log::warn;

use crate::aligner::Aligner;
use crate::config::Settings;
use crate::graph::AlignmentGraph;
use crate::reads::ReadRecord;
use crate::reads::ReadSpans;
use crate::tree::NodeIndex;
use crate::tree::Tree;

type E = Box<dyn std::error::Error>;

/// Outcome of [check_read_alignment].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementVerdict {
    Accepted,
    LowOverlap,
    LowIdentity,
    LowOverlapAndIdentity,
}

impl PlacementVerdict {
    pub fn is_accepted(&self) -> bool {
        *self == PlacementVerdict::Accepted
    }
}

/// Site counts of a read aligned against a reference node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignmentOverlap {
    /// Read sites in the alignment.
    pub read_length: usize,
    /// Columns with both a read and a reference site.
    pub aligned: usize,
    /// Aligned columns with identical states.
    pub matched: usize,
}

impl AlignmentOverlap {
    pub fn overlap(&self) -> f64 {
        if self.read_length == 0 { 0.0 } else { self.aligned as f64 / self.read_length as f64 }
    }

    pub fn identity(&self) -> f64 {
        if self.aligned == 0 { 0.0 } else { self.matched as f64 / self.aligned as f64 }
    }
}

/// Count the read sites of `aligned` that fall on sites of `reference`.
///
/// `aligned` is the alignment of `insertion_point` (left) and
/// `read_graph` (right). `reference` is `insertion_point` or a node below
/// it reached through left children.
pub fn measure_overlap(
    tree: &Tree,
    insertion_point: NodeIndex,
    reference: NodeIndex,
    aligned: &AlignmentGraph,
    read_graph: &AlignmentGraph,
) -> AlignmentOverlap {
    let reference_graph = tree.node(reference).and_then(|node| node.graph.as_ref());

    let mut res = AlignmentOverlap::default();
    let n_columns = aligned.sites_length().saturating_sub(1);
    for site in aligned.sites.iter().take(n_columns).skip(1) {
        let Some(read_index) = site.children.right else { continue };
        res.read_length += 1;

        let reference_index = site.children.left.and_then(|l| tree.site_at_column(insertion_point, l, reference));
        if let Some(reference_index) = reference_index {
            res.aligned += 1;
            let read_state = read_graph.site_at(read_index).and_then(|s| s.state);
            let reference_state = reference_graph.and_then(|g| g.site_at(reference_index)).and_then(|s| s.state);
            if read_state == reference_state {
                res.matched += 1;
            }
        }
    }
    res
}

/// Check the overlap of a read with its reference against the cut-offs.
///
/// Rejections are logged as warnings.
pub fn check_read_alignment(read_name: &str, counts: &AlignmentOverlap, settings: &Settings) -> PlacementVerdict {
    let overlap = counts.overlap();
    let identity = counts.identity();
    info!("  aligned positions {} [{}/{}]; identical positions {} [{}/{}]",
          overlap, counts.aligned, counts.read_length, identity, counts.matched, counts.aligned);

    let low_overlap = overlap < settings.min_reads_overlap;
    let low_identity = identity < settings.min_reads_identity;
    match (low_overlap, low_identity) {
        (false, false) => PlacementVerdict::Accepted,
        (true, true) => {
            warn!("Read {} dropped using the minimum overlap cut-off of {} and the minimum identity cut-off of {}.",
                  read_name, settings.min_reads_overlap, settings.min_reads_identity);
            PlacementVerdict::LowOverlapAndIdentity
        },
        (true, false) => {
            warn!("Read {} dropped using the minimum overlap cut-off of {}.", read_name, settings.min_reads_overlap);
            PlacementVerdict::LowOverlap
        },
        (false, true) => {
            warn!("Read {} dropped using the minimum identity cut-off of {}.", read_name, settings.min_reads_identity);
            PlacementVerdict::LowIdentity
        },
    }
}

/// Number of identical sites when `read1` and `read2` are aligned.
pub fn pairwise_matching_sites<A: Aligner + ?Sized>(
    read1: &ReadRecord,
    read2: &ReadRecord,
    aligner: &A,
    settings: &Settings,
) -> Result<usize, E> {
    let graph1 = read1.graph(&settings.build_options(read1.data_type, true))?;
    let graph2 = read2.graph(&settings.build_options(read2.data_type, true))?;
    let aligned = aligner.align(&graph2, settings.reads_distance, &graph1, settings.reads_distance, None)?;

    let n_columns = aligned.sites_length().saturating_sub(1);
    let matching = aligned.sites.iter().take(n_columns).skip(1).filter(|site| {
        match (site.children.left, site.children.right) {
            (Some(l), Some(r)) => {
                let state2 = graph2.site_at(l).map(|s| s.state);
                let state1 = graph1.site_at(r).map(|s| s.state);
                state1.is_some() && state1 == state2
            },
            _ => false,
        }
    }).count();
    Ok(matching)
}

/// Remove reads that are identical to, or contained in, another read.
///
/// Of two identical reads the later one is removed. Returns the number of
/// removed reads.
pub fn remove_overlapping_reads<A: Aligner + ?Sized>(
    reads: &mut Vec<ReadRecord>,
    aligner: &A,
    settings: &Settings,
) -> Result<usize, E> {
    info!("Removing pairwise overlapping reads.");
    let n_reads = reads.len();

    let mut i = 0;
    while i < reads.len() {
        let mut j = i + 1;
        let mut first_removed = false;
        while j < reads.len() {
            let matching = pairwise_matching_sites(&reads[i], &reads[j], aligner, settings)?;
            let length1 = reads[i].graph_sites(settings.codons);
            let length2 = reads[j].graph_sites(settings.codons);

            if matching == length1 && matching == length2 {
                info!("Reads {} and {} are identical. Read {} is deleted.", reads[i].name, reads[j].name, reads[j].name);
                reads.remove(j);
            } else if matching == length1 {
                info!("Read {} is fully embedded in read {}. Read {} is deleted.", reads[i].name, reads[j].name, reads[i].name);
                reads.remove(i);
                first_removed = true;
                break;
            } else if matching == length2 {
                info!("Read {} is fully embedded in read {}. Read {} is deleted.", reads[j].name, reads[i].name, reads[j].name);
                reads.remove(j);
            } else {
                j += 1;
            }
        }
        if !first_removed {
            i += 1;
        }
    }
    Ok(n_reads - reads.len())
}

fn within(inner: (Option<usize>, Option<usize>), outer: (Option<usize>, Option<usize>)) -> bool {
    match (inner, outer) {
        ((Some(inner_start), Some(inner_end)), (Some(outer_start), Some(outer_end))) => {
            inner_start >= outer_start && inner_end <= outer_end
        },
        _ => false,
    }
}

/// True if the span of `inner` lies within the span of `outer`.
///
/// Paired reads compare both mates separately. Spans with a missing bound
/// are never contained.
pub fn spans_within(inner: &ReadSpans, outer: &ReadSpans, paired: bool) -> bool {
    if paired {
        within((inner.start1, inner.end1), (outer.start1, outer.end1))
            && within((inner.start2, inner.end2), (outer.start2, outer.end2))
    } else {
        within((inner.start1, inner.end2), (outer.start1, outer.end2))
    }
}

/// Remove reads whose span on the target lies within an earlier read's span.
///
/// Returns the number of removed reads.
pub fn remove_target_overlapping_reads(reads: &mut Vec<ReadRecord>, paired: bool) -> usize {
    info!("Removing reads mapped at overlapping positions.");
    let n_reads = reads.len();

    let mut i = 0;
    while i < reads.len() {
        let mut j = i + 1;
        while j < reads.len() {
            if spans_within(&reads[j].placement.spans, &reads[i].placement.spans, paired) {
                info!("Read {} is fully embedded in read {}. Read {} is deleted.", reads[j].name, reads[i].name, reads[j].name);
                reads.remove(j);
            } else {
                j += 1;
            }
        }
        i += 1;
    }
    n_reads - reads.len()
}

/// Remove reads that overlap another read on the target and are identical to it.
///
/// Reads whose spans nest are aligned with each other; the contained one
/// is removed if all of its sites match. Returns the number of removed reads.
pub fn remove_target_overlapping_identical_reads<A: Aligner + ?Sized>(
    reads: &mut Vec<ReadRecord>,
    aligner: &A,
    settings: &Settings,
) -> Result<usize, E> {
    info!("Removing identical reads mapped at overlapping positions.");
    let paired = settings.pair_end;
    let n_reads = reads.len();

    let mut i = 0;
    while i < reads.len() {
        let mut j = i + 1;
        let mut first_removed = false;
        while j < reads.len() {
            let spans1 = &reads[i].placement.spans;
            let spans2 = &reads[j].placement.spans;
            if !(spans_within(spans2, spans1, paired) || spans_within(spans1, spans2, paired)) {
                j += 1;
                continue;
            }

            let matching = pairwise_matching_sites(&reads[i], &reads[j], aligner, settings)?;
            if matching == reads[j].graph_sites(settings.codons) {
                info!("Read {} is fully embedded in read {} and overlapping sites are identical. Read {} is deleted.",
                      reads[j].name, reads[i].name, reads[j].name);
                reads.remove(j);
            } else if matching == reads[i].graph_sites(settings.codons) {
                info!("Read {} is fully embedded in read {} and overlapping sites are identical. Read {} is deleted.",
                      reads[i].name, reads[j].name, reads[i].name);
                reads.remove(i);
                first_removed = true;
                break;
            } else {
                j += 1;
            }
        }
        if !first_removed {
            i += 1;
        }
    }
    Ok(n_reads - reads.len())
}

// Tests
#[cfg(test)]
mod tests {

    fn read_with_spans(name: &str, seq: &[u8], start: usize, end: usize) -> crate::reads::ReadRecord {
        use crate::reads::ReadRecord;

        let mut read = ReadRecord::new(name, "", seq, None);
        read.placement.spans.start1 = Some(start);
        read.placement.spans.end2 = Some(end);
        read
    }

    #[test]
    fn verdict_combines_both_cutoffs() {
        use super::check_read_alignment;
        use super::AlignmentOverlap;
        use super::PlacementVerdict;
        use crate::config::Settings;

        let settings = Settings::default();
        let good = AlignmentOverlap { read_length: 10, aligned: 8, matched: 8 };
        let short = AlignmentOverlap { read_length: 10, aligned: 4, matched: 4 };
        let different = AlignmentOverlap { read_length: 10, aligned: 10, matched: 2 };
        let both = AlignmentOverlap { read_length: 10, aligned: 4, matched: 1 };

        assert_eq!(check_read_alignment("r", &good, &settings), PlacementVerdict::Accepted);
        assert_eq!(check_read_alignment("r", &short, &settings), PlacementVerdict::LowOverlap);
        assert_eq!(check_read_alignment("r", &different, &settings), PlacementVerdict::LowIdentity);
        assert_eq!(check_read_alignment("r", &both, &settings), PlacementVerdict::LowOverlapAndIdentity);
        assert!(!check_read_alignment("r", &AlignmentOverlap::default(), &settings).is_accepted());
    }

    #[test]
    fn looser_cutoffs_keep_accepted_reads() {
        use super::check_read_alignment;
        use super::AlignmentOverlap;
        use crate::config::Settings;

        let counts = AlignmentOverlap { read_length: 20, aligned: 13, matched: 9 };
        let strict = Settings { min_reads_overlap: 0.6, min_reads_identity: 0.65, ..Default::default() };
        assert!(check_read_alignment("r", &counts, &strict).is_accepted());

        for (overlap, identity) in [(0.6, 0.5), (0.3, 0.65), (0.0, 0.0)] {
            let loose = Settings { min_reads_overlap: overlap, min_reads_identity: identity, ..Default::default() };
            assert!(check_read_alignment("r", &counts, &loose).is_accepted());
        }
    }

    #[test]
    fn pairwise_removes_contained_and_duplicate_reads() {
        use super::remove_overlapping_reads;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;

        let mut reads = vec![
            ReadRecord::new("inner", "", b"CGTACG", None),
            ReadRecord::new("outer", "", b"ACGTACGT", None),
            ReadRecord::new("other", "", b"TTTTGGGG", None),
            ReadRecord::new("copy", "", b"TTTTGGGG", None),
        ];
        let aligner = SimpleAligner::default();
        let settings = Settings::default();

        let got = remove_overlapping_reads(&mut reads, &aligner, &settings).unwrap();

        let names: Vec<&str> = reads.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(got, 2);
        assert_eq!(names, vec!["outer", "other"]);

        // Nothing left to remove
        assert_eq!(remove_overlapping_reads(&mut reads, &aligner, &settings).unwrap(), 0);
    }

    #[test]
    fn pairwise_ignores_break_marker() {
        use super::remove_overlapping_reads;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use crate::reads::ReadRecord;

        let mut first = ReadRecord::new("a/p12", "", b"ACGT0TTGG", None);
        first.first_read_length = Some(4);
        let mut second = ReadRecord::new("b/p12", "", b"ACGT0TTGG", None);
        second.first_read_length = Some(4);
        let mut reads = vec![first, second];

        let got = remove_overlapping_reads(&mut reads, &SimpleAligner::default(), &Settings::default()).unwrap();

        assert_eq!(got, 1);
        assert_eq!(reads[0].name, "a/p12");
    }

    #[test]
    fn span_containment() {
        use super::spans_within;
        use crate::reads::ReadSpans;

        let outer = ReadSpans { start1: Some(1), end1: Some(10), start2: Some(20), end2: Some(30) };
        let inner = ReadSpans { start1: Some(2), end1: Some(9), start2: Some(21), end2: Some(30) };
        let shifted = ReadSpans { start1: Some(2), end1: Some(9), start2: Some(21), end2: Some(31) };
        let unset = ReadSpans { start1: None, end1: Some(9), start2: Some(21), end2: Some(30) };

        assert!(spans_within(&inner, &outer, true));
        assert!(!spans_within(&outer, &inner, true));
        assert!(!spans_within(&shifted, &outer, true));
        assert!(!spans_within(&shifted, &outer, false));
        assert!(!spans_within(&unset, &outer, false));
        assert!(spans_within(&inner, &outer, false));
    }

    #[test]
    fn target_overlap_keeps_first_read() {
        use super::remove_target_overlapping_reads;

        let mut reads = vec![
            read_with_spans("long", b"ACGTACGTAC", 1, 10),
            read_with_spans("inside", b"GTAC", 3, 6),
            read_with_spans("past", b"ACGTAA", 7, 12),
        ];

        let got = remove_target_overlapping_reads(&mut reads, false);

        let names: Vec<&str> = reads.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(got, 1);
        assert_eq!(names, vec!["long", "past"]);
        assert_eq!(remove_target_overlapping_reads(&mut reads, false), 0);
    }

    #[test]
    fn identical_reads_on_target_are_reduced_to_one() {
        use super::remove_target_overlapping_identical_reads;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;

        let mut reads = vec![
            read_with_spans("first", b"ACGTACGT", 1, 8),
            read_with_spans("second", b"ACGTACGT", 1, 8),
            // Contained but different
            read_with_spans("variant", b"GTTCG", 3, 7),
        ];
        let aligner = SimpleAligner::default();
        let settings = Settings::default();

        let got = remove_target_overlapping_identical_reads(&mut reads, &aligner, &settings).unwrap();

        let names: Vec<&str> = reads.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(got, 1);
        assert_eq!(names, vec!["first", "variant"]);
        assert_eq!(remove_target_overlapping_identical_reads(&mut reads, &aligner, &settings).unwrap(), 0);
    }

    #[test]
    fn identical_filter_removes_contained_earlier_read() {
        use super::remove_target_overlapping_identical_reads;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;

        let mut reads = vec![
            read_with_spans("short", b"GTACG", 3, 7),
            read_with_spans("long", b"ACGTACGT", 1, 8),
        ];

        let got = remove_target_overlapping_identical_reads(&mut reads, &SimpleAligner::default(), &Settings::default()).unwrap();

        assert_eq!(got, 1);
        assert_eq!(reads[0].name, "long");
    }

    #[test]
    fn codon_reads_are_compared_by_sites() {
        use super::remove_overlapping_reads;
        use super::remove_target_overlapping_identical_reads;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;

        let aligner = SimpleAligner::default();
        let settings = Settings { codons: true, ..Default::default() };

        let mut reads = vec![
            read_with_spans("first", b"ATGAAACCC", 1, 3),
            read_with_spans("second", b"ATGAAACCC", 1, 3),
        ];
        assert_eq!(remove_overlapping_reads(&mut reads.clone(), &aligner, &settings).unwrap(), 1);

        assert_eq!(remove_target_overlapping_identical_reads(&mut reads, &aligner, &settings).unwrap(), 1);
        assert_eq!(reads[0].name, "first");
    }
}
