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
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use graftreads::config::CandidateMode;
use graftreads::config::Settings;

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // Merge overlapping mates
    Merge {
        // Input fastq file
        #[arg(group = "input", required = true, help = "Input reads")]
        input_file: PathBuf,

        // Output file path, gzipped if it ends in .gz
        #[arg(short = 'o', long = "output", required = true)]
        out_file: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
        #[arg(long = "silent", default_value_t = false)]
        silent: bool,
    },

    // Place reads on a reference tree
    Place {
        // Input fasta or fastq reads
        #[arg(group = "input", required = true, help = "Input reads")]
        input_file: PathBuf,

        // Reference sequences, one tree leaf each
        #[arg(short = 'r', long = "reference", required = true)]
        reference_file: PathBuf,

        // Newick output, defaults to stdout
        #[arg(short = 'o', long = "output", required = false)]
        out_file: Option<PathBuf>,

        // Placement report
        #[arg(long = "report", required = false)]
        report_file: Option<PathBuf>,

        // Reads after merging and pairing
        #[arg(long = "reads-out", required = false)]
        reads_out_file: Option<PathBuf>,

        // Local aligner used with --fast-placement and --use-local-anchors
        #[arg(long = "exonerate", default_value = "exonerate")]
        exonerate: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
        #[arg(long = "silent", default_value_t = false)]
        silent: bool,
    },
}

#[derive(Args)]
pub struct SettingsArgs {
    // Reads
    #[arg(long = "qscore-minimum", default_value_t = 10)]
    pub qscore_minimum: i32,
    #[arg(long = "no-trimming", default_value_t = false)]
    pub no_trimming: bool,
    #[arg(long = "codons", default_value_t = false)]
    pub codons: bool,
    #[arg(long = "homopolymer-correction", default_value_t = false)]
    pub homopolymer_correction: bool,
    #[arg(long = "allow-skip-low-qscore", default_value_t = false)]
    pub allow_skip_low_qscore: bool,

    // Acceptance
    #[arg(long = "min-reads-overlap", default_value_t = 0.5)]
    pub min_reads_overlap: f64,
    #[arg(long = "min-reads-identity", default_value_t = 0.5)]
    pub min_reads_identity: f64,
    #[arg(long = "reads-distance", default_value_t = 0.1)]
    pub reads_distance: f64,

    // Mates
    #[arg(long = "overlap-pair-end", default_value_t = false)]
    pub overlap_pair_end: bool,
    #[arg(long = "overlap-minimum", default_value_t = 15)]
    pub overlap_minimum: usize,
    #[arg(long = "overlap-identity", default_value_t = 0.75)]
    pub overlap_identity: f64,
    #[arg(long = "overlap-identical-minimum", default_value_t = 10)]
    pub overlap_identical_minimum: usize,
    #[arg(long = "pair-end", default_value_t = false)]
    pub pair_end: bool,
    #[arg(long = "trim-before-merge", default_value_t = false)]
    pub trim_before_merge: bool,
    #[arg(long = "trim-read-ends", default_value_t = false)]
    pub trim_read_ends: bool,
    #[arg(long = "min-trimmed-length", default_value_t = 20)]
    pub min_trimmed_length: usize,

    // Placement
    #[arg(long = "candidates", default_value = "tagged", help = "tagged, every-node or every-internal-node")]
    pub candidate_mode: CandidateMode,
    #[arg(long = "rank-reads-for-nodes", default_value_t = false)]
    pub rank_reads_for_nodes: bool,
    #[arg(long = "align-bad-reads-at-root", default_value_t = false)]
    pub align_bad_reads_at_root: bool,
    #[arg(long = "placement-only", default_value_t = false)]
    pub placement_only: bool,
    #[arg(long = "align-reads-at-root", default_value_t = false)]
    pub align_reads_at_root: bool,
    #[arg(long = "reads-pileup", default_value_t = false)]
    pub reads_pileup: bool,
    #[arg(long = "pileup-reads-ordered", default_value_t = false)]
    pub pileup_reads_ordered: bool,
    #[arg(long = "pileup-offset", default_value_t = 5)]
    pub pileup_offset: usize,

    // Redundancy
    #[arg(long = "discard-overlapping-identical-reads", default_value_t = false)]
    pub discard_overlapping_identical_reads: bool,
    #[arg(long = "discard-overlapping-reads", default_value_t = false)]
    pub discard_overlapping_reads: bool,
    #[arg(long = "discard-pairwise-overlapping-reads", default_value_t = false)]
    pub discard_pairwise_overlapping_reads: bool,

    // Local aligner
    #[arg(long = "fast-placement", default_value_t = false)]
    pub fast_placement: bool,
    #[arg(long = "use-local-anchors", default_value_t = false)]
    pub use_local_anchors: bool,
    #[arg(long = "helper-timeout", default_value_t = 300, help = "Seconds")]
    pub helper_timeout: u64,
}

impl SettingsArgs {
    pub fn to_settings(&self) -> Settings {
        Settings {
            qscore_minimum: self.qscore_minimum,
            no_trimming: self.no_trimming,
            codons: self.codons,
            homopolymer_correction: self.homopolymer_correction,
            allow_skip_low_qscore: self.allow_skip_low_qscore,
            min_reads_overlap: self.min_reads_overlap,
            min_reads_identity: self.min_reads_identity,
            reads_distance: self.reads_distance,
            overlap_pair_end: self.overlap_pair_end,
            overlap_minimum: self.overlap_minimum,
            overlap_identity: self.overlap_identity,
            overlap_identical_minimum: self.overlap_identical_minimum,
            pair_end: self.pair_end,
            trim_before_merge: self.trim_before_merge,
            trim_read_ends: self.trim_read_ends,
            min_trimmed_length: self.min_trimmed_length,
            candidate_mode: self.candidate_mode,
            rank_reads_for_nodes: self.rank_reads_for_nodes,
            align_bad_reads_at_root: self.align_bad_reads_at_root,
            placement_only: self.placement_only,
            align_reads_at_root: self.align_reads_at_root,
            reads_pileup: self.reads_pileup,
            pileup_reads_ordered: self.pileup_reads_ordered,
            pileup_offset: self.pileup_offset,
            discard_overlapping_identical_reads: self.discard_overlapping_identical_reads,
            discard_overlapping_reads: self.discard_overlapping_reads,
            discard_pairwise_overlapping_reads: self.discard_pairwise_overlapping_reads,
            fast_placement: self.fast_placement,
            use_local_anchors: self.use_local_anchors,
            helper_timeout: Duration::from_secs(self.helper_timeout),
        }
    }
}
