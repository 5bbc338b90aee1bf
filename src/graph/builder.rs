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
use crate::alphabet::codon_alphabet;
use crate::alphabet::codon_state;
use crate::alphabet::DataType;
use crate::alphabet::BREAK_MARKER;
use crate::alphabet::UNKNOWN_CODON_STATE;
use crate::alphabet::UNKNOWN_CODON_SYMBOL;
use crate::graph::AlignmentGraph;
use crate::graph::InputEdge;
use crate::graph::Site;
use crate::graph::SiteType;

type E = Box<dyn std::error::Error>;

/// Phred offset of the quality strings.
pub const PHRED_OFFSET: i32 = 33;

// Edge weights of the homopolymer error model.
const HOMOPOLYMER_WEIGHT: f64 = 0.9;
const LOW_QUALITY_WEIGHT: f64 = 0.6;
const DOUBLE_SKIP_WEIGHT: f64 = 0.02;
const LONG_RUN: i32 = 5;

#[derive(Debug, Clone)]
pub struct MismatchedQuality {
    pub seq_len: usize,
    pub qual_len: usize,
}

impl std::fmt::Display for MismatchedQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Quality string has {} characters for a sequence of length {}", self.qual_len, self.seq_len)
    }
}

impl std::error::Error for MismatchedQuality {}

/// A real site without an incoming or an outgoing supplied edge.
#[derive(Debug, Clone)]
pub struct UnlinkedSite(pub usize);

impl std::fmt::Display for UnlinkedSite {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Site {} is missing an incoming or an outgoing edge", self.0)
    }
}

impl std::error::Error for UnlinkedSite {}

/// How a read is turned into an [AlignmentGraph].
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub data_type: DataType,
    /// Read DNA as codons.
    pub codons: bool,
    pub qscore_minimum: i32,
    /// Do not mask low quality sites.
    pub no_trimming: bool,
    /// Model homopolymer length errors of 454 data.
    pub homopolymer: bool,
    /// Allow skipping over a single low quality site.
    pub allow_skip_low_qscore: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            data_type: DataType::Dna,
            codons: false,
            qscore_minimum: 10,
            no_trimming: false,
            homopolymer: false,
            allow_skip_low_qscore: false,
        }
    }
}

impl AlignmentGraph {
    /// Build the graph of a read.
    ///
    /// The mode is chosen from the inputs: a non-empty quality string
    /// selects quality masking, non-empty `input_edges` select an
    /// externally supplied graph, and otherwise the read is a linear
    /// sequence of bases (or codons, if requested).
    ///
    /// ## Usage
    ///
    /// ```rust
    /// use graftreads::graph::AlignmentGraph;
    /// use graftreads::graph::BuildOptions;
    ///
    /// let graph = AlignmentGraph::from_read(b"ACG0TA", Some(b"IIIII+"), &[], &BuildOptions::default()).unwrap();
    ///
    /// // Sentinels plus one site per base
    /// assert_eq!(graph.sites_length(), 7);
    /// assert_eq!(graph.sequence(), "ACGTA");
    /// ```
    ///
    pub fn from_read(
        seq: &[u8],
        qual: Option<&[u8]>,
        input_edges: &[InputEdge],
        opts: &BuildOptions,
    ) -> Result<AlignmentGraph, E> {
        let mut graph = AlignmentGraph::new(opts.data_type, opts.codons);
        graph.sites.reserve(seq.len() + 2);
        graph.edges.reserve(seq.len() + 3);

        let start = graph.push_site(Site::sentinel(SiteType::Start));
        graph.link(None, start, 1.0)?;

        match qual {
            Some(q) if !q.is_empty() => {
                if q.len() != seq.len() {
                    return Err(Box::new(MismatchedQuality { seq_len: seq.len(), qual_len: q.len() }));
                }
                graph.push_fastq_sites(seq, q, opts)?;
            },
            _ => {
                if !input_edges.is_empty() {
                    graph.push_unlinked_sites(seq);
                    let stop = graph.push_site(Site::sentinel(SiteType::Stop));
                    input_edges.iter().try_for_each(|edge| {
                        graph.link(Some(edge.start), edge.end, edge.weight).map(|_| ())
                    })?;
                    if let Some(unlinked) = (1..stop).find(|i| graph.sites[*i].fwd_edges.is_empty() || graph.sites[*i].bwd_edges.is_empty()) {
                        return Err(Box::new(UnlinkedSite(unlinked)));
                    }
                    log::trace!("built graph with {} sites ending at {} from {} edges", graph.sites_length(), stop, input_edges.len());
                    return Ok(graph);
                } else if opts.codons && opts.data_type == DataType::Dna {
                    graph.push_codon_sites(seq)?;
                } else {
                    graph.push_default_sites(seq)?;
                }
            },
        }

        let prev = graph.sites_length() - 1;
        let stop = graph.push_site(Site::sentinel(SiteType::Stop));
        graph.link(Some(prev), stop, 1.0)?;

        Ok(graph)
    }

    fn push_default_sites(&mut self, seq: &[u8]) -> Result<(), E> {
        for (i, symbol) in seq.iter().enumerate() {
            if *symbol == BREAK_MARKER {
                continue;
            }
            let site = Site {
                site_type: break_site_type(seq, i),
                symbol: (*symbol as char).to_string(),
                state: Some(self.data_type.state_of(*symbol).unwrap_or(self.data_type.unknown_state())),
                ..Default::default()
            };
            let prev = self.sites_length() - 1;
            let cur = self.push_site(site);
            self.link(Some(prev), cur, 1.0)?;
        }
        Ok(())
    }

    fn push_codon_sites(&mut self, seq: &[u8]) -> Result<(), E> {
        let codons = codon_alphabet();
        let bases: Vec<u8> = seq.iter().filter(|x| **x != BREAK_MARKER).copied().collect();
        for triplet in bases.chunks(3) {
            let state = codon_state(&codons, triplet);
            let symbol = if state == UNKNOWN_CODON_STATE {
                UNKNOWN_CODON_SYMBOL.to_string()
            } else {
                triplet.iter().map(|x| x.to_ascii_uppercase() as char).collect()
            };
            let prev = self.sites_length() - 1;
            let cur = self.push_site(Site { symbol, state: Some(state), ..Default::default() });
            self.link(Some(prev), cur, 1.0)?;
        }
        Ok(())
    }

    fn push_unlinked_sites(&mut self, seq: &[u8]) {
        seq.iter().filter(|x| **x != BREAK_MARKER).for_each(|symbol| {
            self.push_site(Site {
                symbol: (*symbol as char).to_string(),
                state: Some(self.data_type.state_of(*symbol).unwrap_or(self.data_type.unknown_state())),
                ..Default::default()
            });
        });
    }

    fn push_fastq_sites(&mut self, seq: &[u8], qual: &[u8], opts: &BuildOptions) -> Result<(), E> {
        let threshold = if opts.no_trimming { 0 } else { opts.qscore_minimum };

        let mut in_row = 1;
        let mut prev_row = 1;
        let mut prev_state: Option<usize> = None;
        let mut site_qscore = threshold;

        for (i, symbol) in seq.iter().enumerate() {
            if *symbol == BREAK_MARKER {
                continue;
            }

            let prev_site_qscore = site_qscore;
            site_qscore = qual[i] as i32 - PHRED_OFFSET;
            let masked = site_qscore < threshold;

            let site = if masked {
                Site {
                    site_type: break_site_type(seq, i),
                    symbol: (symbol.to_ascii_lowercase() as char).to_string(),
                    state: Some(self.data_type.unknown_state()),
                    masked,
                    ..Default::default()
                }
            } else {
                Site {
                    site_type: break_site_type(seq, i),
                    symbol: (*symbol as char).to_string(),
                    state: Some(self.data_type.state_of(*symbol).unwrap_or(self.data_type.unknown_state())),
                    ..Default::default()
                }
            };
            let state = site.state;

            let prev = self.sites_length() - 1;
            let cur = self.push_site(site);

            if state == prev_state {
                in_row += 1;
                prev_row = 1;
            } else {
                prev_row = in_row;
                in_row = 1;
                prev_state = state;
            }

            let prev_low = prev_site_qscore < threshold;
            if opts.homopolymer && (prev_row > 2 || prev_low) {
                let weight = if prev_low { LOW_QUALITY_WEIGHT } else { HOMOPOLYMER_WEIGHT };
                self.link(Some(prev), cur, weight)?;

                if let Some(prev_ind) = self.first_predecessor(prev) {
                    if prev_row < LONG_RUN {
                        self.link(Some(prev_ind), cur, 1.0 - weight)?;
                    } else {
                        self.link(Some(prev_ind), cur, 1.0 - weight - DOUBLE_SKIP_WEIGHT)?;
                        if let Some(prev_prev_ind) = self.first_predecessor(prev_ind) {
                            self.link(Some(prev_prev_ind), cur, DOUBLE_SKIP_WEIGHT)?;
                        }
                    }
                }
            } else if opts.allow_skip_low_qscore && prev_low {
                self.link(Some(prev), cur, LOW_QUALITY_WEIGHT)?;
                if let Some(prev_ind) = self.first_predecessor(prev) {
                    self.link(Some(prev_ind), cur, 1.0 - LOW_QUALITY_WEIGHT)?;
                }
            } else {
                self.link(Some(prev), cur, 1.0)?;
            }
        }
        Ok(())
    }
}

/// Type of the site built from `seq[i]` given its neighbouring break markers.
fn break_site_type(seq: &[u8], i: usize) -> SiteType {
    let mut site_type = SiteType::Real;
    if i > 0 && seq[i - 1] == BREAK_MARKER {
        site_type = SiteType::BreakStop;
    }
    if seq.get(i + 1) == Some(&BREAK_MARKER) {
        site_type = SiteType::BreakStart;
    }
    site_type
}
