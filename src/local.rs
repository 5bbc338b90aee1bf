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

//! Local alignment helper for narrowing down placement candidates.
//!
//! A [LocalAligner] finds the candidate nodes a read has a local hit on,
//! and where. [Exonerate] runs the `exonerate` program for this; it is
//! checked once and skipped for the whole run if it cannot be executed.
//!
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use std::time::Instant;

use log::debug;
use log::warn;
use tempfile::TempDir;

use crate::alphabet::BREAK_MARKER;
use crate::reads::ReadRecord;
use crate::tree::Tree;

type E = Box<dyn std::error::Error>;

/// Local alignment of a read on a node's sequence.
///
/// Coordinates are end-exclusive. [parse_hits] gives 0-based character
/// offsets; [LocalAligner::local_alignment] returns them as sites, see
/// [LocalHit::to_sites].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalHit {
    pub query_start: usize,
    pub query_end: usize,
    pub target_start: usize,
    pub target_end: usize,
    pub score: i64,
}

impl LocalHit {
    /// Convert character offsets into site coordinates.
    ///
    /// Every site holds `symbol_width` characters. Query positions count
    /// read sites from 0, target positions are site indexes of the node's
    /// graph and so start after the start sentinel at 1.
    pub fn to_sites(&self, symbol_width: usize) -> LocalHit {
        let width = symbol_width.max(1);
        LocalHit {
            query_start: self.query_start / width,
            query_end: self.query_end.div_ceil(width),
            target_start: self.target_start / width + 1,
            target_end: self.target_end.div_ceil(width) + 1,
            score: self.score,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HelperTimeout(pub Duration);

impl std::fmt::Display for HelperTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Local alignment helper killed after {} seconds", self.0.as_secs())
    }
}

impl std::error::Error for HelperTimeout {}

pub trait LocalAligner {
    /// Whether the helper can be used at all.
    fn is_available(&self) -> bool;

    /// Best hit of `read` on each of the `candidates` nodes.
    ///
    /// Candidates without a hit are missing from the result.
    fn local_alignment(
        &self,
        tree: &Tree,
        read: &ReadRecord,
        candidates: &[String],
    ) -> Result<HashMap<String, LocalHit>, E>;
}

/// Runs `exonerate` on the read and the candidate sequences.
#[derive(Debug)]
pub struct Exonerate {
    pub executable: PathBuf,
    /// Allow gaps in the local alignment.
    pub gapped: bool,
    pub timeout: Duration,
    /// Directory for the per-read temporary files, system default if unset.
    pub temp_root: Option<PathBuf>,
    available: OnceLock<bool>,
}

impl Default for Exonerate {
    fn default() -> Self {
        Exonerate::new("exonerate", Duration::from_secs(300))
    }
}

impl Exonerate {
    pub fn new<P: Into<PathBuf>>(executable: P, timeout: Duration) -> Self {
        Exonerate { executable: executable.into(), gapped: true, timeout, temp_root: None, available: OnceLock::new() }
    }

    fn create_temp_dir(&self) -> Result<TempDir, E> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("graftreads_");
        let dir = match &self.temp_root {
            Some(base) => builder.tempdir_in(base)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn write_fasta(path: &Path, records: &[(String, Vec<u8>)]) -> Result<(), E> {
        let mut conn = BufWriter::new(File::create(path)?);
        for (name, seq) in records {
            writeln!(conn, ">{}", name)?;
            conn.write_all(seq)?;
            conn.write_all(b"\n")?;
        }
        conn.flush()?;
        Ok(())
    }

    fn run(&self, query: &Path, target: &Path, output: &Path) -> Result<(), E> {
        let model = if self.gapped { "affine:local" } else { "ungapped" };
        let mut child = Command::new(&self.executable)
            .args(["--model", model])
            .args(["--showalignment", "no", "--showvulgar", "no"])
            .args(["--ryo", "%qi %ti %qab %qae %tab %tae %s\n"])
            .arg("--query").arg(query)
            .arg("--target").arg(target)
            .stdout(Stdio::from(File::create(output)?))
            .stderr(Stdio::null())
            .spawn()?;

        let started = Instant::now();
        loop {
            if child.try_wait()?.is_some() {
                return Ok(());
            }
            if started.elapsed() > self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Box::new(HelperTimeout(self.timeout)));
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl LocalAligner for Exonerate {
    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let found = Command::new(&self.executable)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false);
            if !found {
                warn!("The executable for exonerate not found! The fast placement search not used!");
            }
            found
        })
    }

    fn local_alignment(
        &self,
        tree: &Tree,
        read: &ReadRecord,
        candidates: &[String],
    ) -> Result<HashMap<String, LocalHit>, E> {
        let mut widths: HashMap<String, usize> = HashMap::new();
        let targets: Vec<(String, Vec<u8>)> = candidates.iter().filter_map(|name| {
            let node = tree.find(name).and_then(|index| tree.node(index))?;
            let graph = node.graph.as_ref()?;
            widths.insert(name.clone(), graph.symbol_width());
            Some((name.clone(), graph.sequence().to_ascii_uppercase().into_bytes()))
        }).collect();
        if targets.is_empty() {
            return Ok(HashMap::new());
        }

        let query: Vec<u8> = read.sequence.iter().filter(|x| **x != BREAK_MARKER).copied().collect();

        // Removed when dropped, also on the error paths.
        let temp_dir = self.create_temp_dir()?;
        let query_path = temp_dir.path().join("query.fas");
        let target_path = temp_dir.path().join("target.fas");
        let output_path = temp_dir.path().join("hits.out");

        Exonerate::write_fasta(&query_path, &[(read.name.clone(), query)])?;
        Exonerate::write_fasta(&target_path, &targets)?;
        self.run(&query_path, &target_path, &output_path)?;
        let output = std::fs::read_to_string(&output_path)?;
        temp_dir.close()?;

        let hits: HashMap<String, LocalHit> = parse_hits(&output).into_iter()
            .filter_map(|(name, hit)| {
                let width = *widths.get(&name)?;
                Some((name, hit.to_sites(width)))
            })
            .collect();
        debug!("{} has local hits on {} of {} nodes", read.name, hits.len(), targets.len());
        Ok(hits)
    }
}

/// Parse `query target q_start q_end t_start t_end score` lines.
///
/// Keeps the highest scoring hit per target. Reverse strand coordinates
/// are reordered so that start <= end. Other lines are ignored.
pub fn parse_hits(output: &str) -> HashMap<String, LocalHit> {
    let mut hits: HashMap<String, LocalHit> = HashMap::new();
    output.lines().for_each(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 7 {
            return;
        }
        let numbers: Result<Vec<i64>, _> = fields[2..].iter().map(|x| x.parse::<i64>()).collect();
        let Ok(numbers) = numbers else { return };
        if numbers[..4].iter().any(|x| *x < 0) {
            return;
        }
        let hit = LocalHit {
            query_start: numbers[0].min(numbers[1]) as usize,
            query_end: numbers[0].max(numbers[1]) as usize,
            target_start: numbers[2].min(numbers[3]) as usize,
            target_end: numbers[2].max(numbers[3]) as usize,
            score: numbers[4],
        };
        let best = hits.entry(fields[1].to_string()).or_insert(hit);
        if hit.score > best.score {
            *best = hit;
        }
    });
    hits
}
