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

//! graftreads is a library and a command-line client for:
//!
//!   - Converting sequencing reads into alignment graphs with quality masking
//!     and homopolymer error edges.
//!   - Finding the node of a reference alignment tree that each read belongs
//!     to.
//!   - Removing reads that are redundant with other reads of the same node.
//!   - Grafting the accepted reads into the tree above their node.
//!   - Merging overlapping paired-end mates.
//!
//! Each node of the reference tree holds the [alignment graph](graph::AlignmentGraph)
//! of the sequences below it. Grafting a read adds a new internal node with
//! the target node and the read as its children, and shifts the child site
//! indexes stored in the parent of the target.
//!
//! ## Usage
//!
//! ### Command line
//!
//! The graftreads CLI supports the following subcommands:
//!   - `graftreads merge` merge overlapping mates in a FASTQ file.
//!   - `graftreads place` place reads on a tree built from reference sequences.
//!
//! Reads are matched to reference nodes through `TID=<tag>` tokens in the
//! read and reference comments.
//!
//! ### Rust API
//!
//! The API provides functions for operating on structs that implement [Read]
//! and/or [Write]. Finer control is available through:
//!
//!   - [AlignmentGraph](graph::AlignmentGraph): the graph of one read or node.
//!   - [Tree](tree::Tree): arena tree holding the graphs.
//!   - [ReadsAligner](placement::ReadsAligner): places reads on a [Tree](tree::Tree).
//!   - [Aligner](aligner::Aligner): the alignment primitive, with the
//!     [SimpleAligner](aligner::SimpleAligner) implementation.
//!   - [LocalAligner](local::LocalAligner): optional candidate filter backed
//!     by [exonerate](local::Exonerate).
//!
use std::io::Read;
use std::io::Write;

use log::info;

pub mod aligner;
pub mod alphabet;
pub mod config;
pub mod graph;
pub mod local;
pub mod placement;
pub mod reads;
pub mod tree;

use aligner::Aligner;
use config::Settings;
use local::LocalAligner;
use placement::PlacementSummary;
use placement::ReadsAligner;
use reads::io::check_alphabet;
use reads::io::read_reads;
use reads::io::write_reads;
use tree::Tree;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone)]
pub struct NoReferences;

impl std::fmt::Display for NoReferences {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "No reference sequences in the input")
    }
}

impl std::error::Error for NoReferences {}

/// Merge overlapping mates from [Read] and write all reads to [Write].
///
/// Mates `<base>/1` and `<base>/2` that overlap well enough are replaced by
/// one read `<base>/m12`. Other reads are written unchanged.
///
/// Returns the number of merged pairs.
///
/// ## Usage
///
/// ```rust
/// use graftreads::merge_reads_from_read_to_write;
/// use graftreads::aligner::SimpleAligner;
/// use graftreads::config::Settings;
/// use std::io::Cursor;
///
/// let input: Vec<u8> = b"@r/1 a\nACGTACGT\n+\nIIIIIIII\n@r/2 b\nACGTACGG\n+\nIIIIIII#\n".to_vec();
/// let settings = Settings { overlap_minimum: 4, overlap_identity: 0.75, ..Default::default() };
///
/// let mut output: Vec<u8> = Vec::new();
/// let merged = merge_reads_from_read_to_write(Cursor::new(input), &mut output, &SimpleAligner::default(), &settings).unwrap();
///
/// assert_eq!(merged, 1);
/// assert_eq!(output, b"@r/m12 b\nACGTACGT\n+\nIIIIIIII\n".to_vec());
/// ```
///
pub fn merge_reads_from_read_to_write<R: Read + Send, W: Write, A: Aligner + ?Sized>(
    conn_in: R,
    conn_out: &mut W,
    aligner: &A,
    settings: &Settings,
) -> Result<usize, E> {
    settings.validate()?;
    let mut reads = read_reads(conn_in)?;
    info!("Read {} reads", reads.len());

    check_alphabet(&mut reads);
    if settings.trim_before_merge {
        reads::pairing::trim_read_ends(&mut reads, settings);
    }
    let merged = reads::pairing::merge_paired_reads(&mut reads, aligner, settings)?;
    info!("Merged {} read pairs", merged);

    write_reads(&reads, conn_out)?;
    Ok(merged)
}

/// Build a reference tree from sequences in [Read].
///
/// The sequences are joined one at a time in input order, so that the
/// tree is a caterpillar `((((s1,s2)n1,s3)n2,...)`. Leaves take their tag
/// from a `TID=<tag>` token in the sequence comment and every branch has
/// length `settings.reads_distance`.
///
/// ## Usage
///
/// ```rust
/// use graftreads::reference_tree_from_read;
/// use graftreads::aligner::SimpleAligner;
/// use graftreads::config::Settings;
/// use std::io::Cursor;
///
/// let input: Vec<u8> = b">A TID=t1\nACGTACGTAC\n>B TID=t2\nACGTTCGTAC\n".to_vec();
///
/// let tree = reference_tree_from_read(Cursor::new(input), &SimpleAligner::default(), &Settings::default()).unwrap();
///
/// assert_eq!(tree.to_newick(), "(A:0.1,B:0.1)n1;");
/// assert_eq!(tree.tagged_nodes()["t2"], vec!["B".to_string()]);
/// ```
///
pub fn reference_tree_from_read<R: Read + Send, A: Aligner + ?Sized>(
    conn_in: R,
    aligner: &A,
    settings: &Settings,
) -> Result<Tree, E> {
    let mut references = read_reads(conn_in)?;
    let (data_type, _) = check_alphabet(&mut references);
    let opts = settings.build_options(data_type, true);

    let mut tree = Tree::new();
    let mut root = None;
    for (i, reference) in references.iter().enumerate() {
        let leaf = tree.add_leaf(&reference.name, settings.reads_distance, Some(reference.graph(&opts)?));
        tree[leaf].comment = reference.comment.clone();
        tree[leaf].tag = reference.tag.clone();

        root = match root {
            Some(previous) => Some(tree.add_aligned_internal(&format!("n{}", i), (previous, leaf), settings.reads_distance, aligner)?),
            None => Some(leaf),
        };
    }

    let root = root.ok_or(NoReferences)?;
    tree.set_root(root);
    info!("Built a reference tree with {} leaves", tree.number_of_leaves());
    Ok(tree)
}

/// Place reads from [Read] on `tree` and graft them in.
///
/// Graft nodes are named `#n#` starting from `first_graft`. If `local` is
/// given and available it narrows down the candidate nodes of each read.
///
/// ## Usage
///
/// ```rust
/// use graftreads::place_reads_from_read;
/// use graftreads::reference_tree_from_read;
/// use graftreads::aligner::SimpleAligner;
/// use graftreads::config::Settings;
/// use std::io::Cursor;
///
/// let references: Vec<u8> = b">A TID=t1\nACGTACGTAC\n>B TID=t2\nTTTTGGGGCC\n".to_vec();
/// let reads: Vec<u8> = b">r1 TID=t1\nGTACGTAC\n>r2 TID=t2\nTTTTGGGG\n".to_vec();
///
/// let aligner = SimpleAligner::default();
/// let settings = Settings::default();
///
/// let mut tree = reference_tree_from_read(Cursor::new(references), &aligner, &settings).unwrap();
/// let summary = place_reads_from_read(&mut tree, Cursor::new(reads), &aligner, None, &settings, 1).unwrap();
///
/// assert_eq!(summary.grafted, vec!["r1".to_string(), "r2".to_string()]);
/// assert_eq!(tree.number_of_leaves(), 4);
///
/// let mut report: Vec<u8> = Vec::new();
/// summary.report.write_to(&mut report).unwrap();
/// assert_eq!(report, b"r1 A TID=t1\nr2 B TID=t2\n".to_vec());
/// ```
///
pub fn place_reads_from_read<R: Read + Send, A: Aligner + ?Sized>(
    tree: &mut Tree,
    conn_in: R,
    aligner: &A,
    local: Option<&dyn LocalAligner>,
    settings: &Settings,
    first_graft: usize,
) -> Result<PlacementSummary, E> {
    let reads = read_reads(conn_in)?;
    info!("Read {} reads", reads.len());

    let mut reads_aligner = ReadsAligner::new(aligner, settings);
    if let Some(local) = local {
        reads_aligner = reads_aligner.with_local_aligner(local);
    }
    let summary = reads_aligner.align(tree, reads, first_graft)?;

    info!("Grafted {} reads, rejected {}, removed {} as redundant",
          summary.grafted.len(), summary.rejected.len(), summary.removed);
    Ok(summary)
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn empty_reference_is_an_error() {
        use super::reference_tree_from_read;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use std::io::Cursor;

        let input: Vec<u8> = Vec::new();
        let got = reference_tree_from_read(Cursor::new(input), &SimpleAligner::default(), &Settings::default());

        assert!(got.is_err());
    }

    #[test]
    fn caterpillar_reference_tree() {
        use super::reference_tree_from_read;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use std::io::Cursor;

        let input: Vec<u8> = b">A\nACGTACGTAC\n>B\nACGTTCGTAC\n>C\nACGAACGTAC\n".to_vec();
        let tree = reference_tree_from_read(Cursor::new(input), &SimpleAligner::default(), &Settings::default()).unwrap();

        assert_eq!(tree.to_newick(), "((A:0.1,B:0.1)n1:0.1,C:0.1)n2;");
        assert_eq!(tree.internal_node_names(), vec!["n2".to_string(), "n1".to_string()]);
    }

    #[test]
    fn merge_leaves_unpaired_reads() {
        use super::merge_reads_from_read_to_write;
        use crate::aligner::SimpleAligner;
        use crate::config::Settings;
        use std::io::Cursor;

        let input: Vec<u8> = b">x\nACGT\n".to_vec();
        let mut output: Vec<u8> = Vec::new();
        let got = merge_reads_from_read_to_write(Cursor::new(input), &mut output, &SimpleAligner::default(), &Settings::default()).unwrap();

        assert_eq!(got, 0);
        assert_eq!(output, b">x\nACGT\n".to_vec());
    }
}
