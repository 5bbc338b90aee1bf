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

//! Run settings.
//!
//! [Settings] collects every value the placement run reads. The command
//! line client fills it from its arguments; library users start from
//! [Settings::default] and change the fields they need.
//!
use std::time::Duration;

use crate::alphabet::DataType;
use crate::graph::BuildOptions;

/// Which tree nodes are tried for each read.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CandidateMode {
    /// Nodes carrying the read's tag.
    #[default]
    Tagged,
    EveryNode,
    EveryInternalNode,
}

impl std::str::FromStr for CandidateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tagged" => Ok(CandidateMode::Tagged),
            "every-node" => Ok(CandidateMode::EveryNode),
            "every-internal-node" => Ok(CandidateMode::EveryInternalNode),
            _ => Err(format!("'{}' is not a valid CandidateMode", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvalidSetting {
    pub name: &'static str,
    pub value: String,
}

impl std::fmt::Display for InvalidSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Invalid value {} for {}", self.value, self.name)
    }
}

impl std::error::Error for InvalidSetting {}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    // Read graphs
    pub qscore_minimum: i32,
    pub no_trimming: bool,
    pub codons: bool,
    /// Model homopolymer errors (454 data).
    pub homopolymer_correction: bool,
    pub allow_skip_low_qscore: bool,

    // Acceptance of a placement
    pub min_reads_overlap: f64,
    pub min_reads_identity: f64,
    pub reads_distance: f64,

    // Paired reads
    pub overlap_pair_end: bool,
    pub overlap_minimum: usize,
    pub overlap_identity: f64,
    pub overlap_identical_minimum: usize,
    pub pair_end: bool,
    pub trim_before_merge: bool,
    pub trim_read_ends: bool,
    pub min_trimmed_length: usize,

    // Placement
    pub candidate_mode: CandidateMode,
    pub rank_reads_for_nodes: bool,
    pub align_bad_reads_at_root: bool,
    pub placement_only: bool,
    pub align_reads_at_root: bool,
    pub reads_pileup: bool,
    pub pileup_reads_ordered: bool,
    pub pileup_offset: usize,

    // Redundancy filters
    pub discard_overlapping_identical_reads: bool,
    pub discard_overlapping_reads: bool,
    pub discard_pairwise_overlapping_reads: bool,

    // Local alignment helper
    pub fast_placement: bool,
    pub use_local_anchors: bool,
    pub helper_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            qscore_minimum: 10,
            no_trimming: false,
            codons: false,
            homopolymer_correction: false,
            allow_skip_low_qscore: false,

            min_reads_overlap: 0.5,
            min_reads_identity: 0.5,
            reads_distance: 0.1,

            overlap_pair_end: false,
            overlap_minimum: 15,
            overlap_identity: 0.75,
            overlap_identical_minimum: 10,
            pair_end: false,
            trim_before_merge: false,
            trim_read_ends: false,
            min_trimmed_length: 20,

            candidate_mode: CandidateMode::Tagged,
            rank_reads_for_nodes: false,
            align_bad_reads_at_root: false,
            placement_only: false,
            align_reads_at_root: false,
            reads_pileup: false,
            pileup_reads_ordered: false,
            pileup_offset: 5,

            discard_overlapping_identical_reads: false,
            discard_overlapping_reads: false,
            discard_pairwise_overlapping_reads: false,

            fast_placement: false,
            use_local_anchors: false,
            helper_timeout: Duration::from_secs(300),
        }
    }
}

impl Settings {
    /// Check that fractions are in [0, 1] and distances are non-negative.
    pub fn validate(&self) -> Result<(), InvalidSetting> {
        let fractions = [
            ("min_reads_overlap", self.min_reads_overlap),
            ("min_reads_identity", self.min_reads_identity),
            ("overlap_identity", self.overlap_identity),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(InvalidSetting { name, value: value.to_string() });
            }
        }
        if !(self.reads_distance >= 0.0) {
            return Err(InvalidSetting { name: "reads_distance", value: self.reads_distance.to_string() });
        }
        if self.qscore_minimum < 0 {
            return Err(InvalidSetting { name: "qscore_minimum", value: self.qscore_minimum.to_string() });
        }
        Ok(())
    }

    /// True if reads skip the search and are stacked at the root.
    pub fn stack_at_root(&self) -> bool {
        self.align_reads_at_root || self.reads_pileup
    }

    /// True if the local alignment helper should be consulted.
    pub fn use_local_helper(&self) -> bool {
        self.fast_placement || self.use_local_anchors
    }

    /// Graph construction options for reads of `data_type`.
    pub fn build_options(&self, data_type: DataType, no_trimming: bool) -> BuildOptions {
        BuildOptions {
            data_type,
            codons: self.codons,
            qscore_minimum: self.qscore_minimum,
            no_trimming,
            homopolymer: self.homopolymer_correction,
            allow_skip_low_qscore: self.allow_skip_low_qscore,
        }
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn default_settings_are_valid() {
        use super::Settings;

        let settings = Settings::default();

        assert!(settings.validate().is_ok());
        assert_eq!(settings.qscore_minimum, 10);
        assert_eq!(settings.overlap_minimum, 15);
        assert_eq!(settings.pileup_offset, 5);
    }

    #[test]
    fn validate_rejects_bad_fractions() {
        use super::Settings;

        let settings = Settings { min_reads_identity: 1.5, ..Default::default() };
        let got = settings.validate().unwrap_err();
        assert_eq!(got.name, "min_reads_identity");

        let settings = Settings { reads_distance: -0.1, ..Default::default() };
        assert!(settings.validate().is_err());

        let settings = Settings { reads_distance: f64::NAN, ..Default::default() };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn parse_candidate_mode() {
        use super::CandidateMode;

        assert_eq!("every-node".parse::<CandidateMode>().unwrap(), CandidateMode::EveryNode);
        assert_eq!("tagged".parse::<CandidateMode>().unwrap(), CandidateMode::Tagged);
        assert!("all".parse::<CandidateMode>().is_err());
    }
}
