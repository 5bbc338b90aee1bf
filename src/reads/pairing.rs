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

//! Paired-end reads.
//!
//! Mates are recognised by the `/1` and `/2` suffixes of their names. They
//! are either merged into one read where they overlap
//! ([merge_paired_reads]) or concatenated with a break marker between them
//! ([find_paired_reads]).
//!
use log::debug;
use log::error;
use log::info;

use crate::aligner::Aligner;
use crate::alphabet::BREAK_MARKER;
use crate::config::Settings;
use crate::graph::builder::PHRED_OFFSET;
use crate::graph::PathState;
use crate::reads::record::parse_tag;
use crate::reads::ReadRecord;

type E = Box<dyn std::error::Error>;

/// Name of a first mate without its `/1` suffix.
fn first_mate_base(name: &str) -> Option<&str> {
    name.strip_suffix("/1")
}

/// Index of the first `/2` mate of `base` after `from`.
fn find_second_mate(reads: &[ReadRecord], base: &str, from: usize) -> Option<usize> {
    (from..reads.len()).find(|j| reads[*j].name.strip_suffix("/2") == Some(base))
}

fn trimming_comment(read: &ReadRecord) -> String {
    format!("P1ST{}:P1ET{}", read.trim_start, read.trim_end)
}

fn append_comment(comment: &mut String, extra: &str) {
    if !comment.is_empty() {
        comment.push(' ');
    }
    comment.push_str(extra);
}

/// Merge overlapping mates into single reads.
///
/// Each `/1` mate is aligned against the later `/2` mates with the same
/// base name. The first pair that overlaps by at least `overlap_minimum`
/// positions with identity `overlap_identity`, or is identical over at
/// least `overlap_identical_minimum` positions, is merged into
/// `<base>/m12`. Where the mates disagree the base with the strictly
/// higher quality in the first mate is kept, otherwise the second mate's.
///
/// Returns the number of merged pairs.
pub fn merge_paired_reads<A: Aligner + ?Sized>(
    reads: &mut Vec<ReadRecord>,
    aligner: &A,
    settings: &Settings,
) -> Result<usize, E> {
    let mut merged = 0;
    let mut i = 0;
    while i < reads.len() {
        let Some(base) = first_mate_base(&reads[i].name).map(|x| x.to_string()) else {
            i += 1;
            continue;
        };

        let mut next = find_second_mate(reads, &base, i + 1);
        while let Some(j) = next {
            debug!("aligning paired reads: {} and {}", reads[i].name, reads[j].name);
            if let Some(read) = merge_mates(&reads[i], &reads[j], aligner, settings)? {
                info!("Merging {} and {}: new name {}", reads[i].name, reads[j].name, read.name);
                reads[i] = read;
                reads.remove(j);
                merged += 1;
                break;
            }
            next = find_second_mate(reads, &base, j + 1);
        }
        i += 1;
    }
    Ok(merged)
}

fn merge_mates<A: Aligner + ?Sized>(
    mate1: &ReadRecord,
    mate2: &ReadRecord,
    aligner: &A,
    settings: &Settings,
) -> Result<Option<ReadRecord>, E> {
    let graph1 = mate1.graph(&settings.build_options(mate1.data_type, true))?;
    let graph2 = mate2.graph(&settings.build_options(mate2.data_type, true))?;
    let aligned = aligner.align(&graph1, settings.reads_distance, &graph2, settings.reads_distance, None)?;

    let n_columns = aligned.sites_length().saturating_sub(1);
    let mut columns: Vec<PathState> = Vec::with_capacity(n_columns);
    for site in aligned.sites.iter().take(n_columns).skip(1) {
        match site.path_state {
            Some(state @ (PathState::Matched | PathState::XGapped | PathState::YGapped)) => columns.push(state),
            _ => {
                error!("Error in pair-end merge alignment of {} and {}", mate1.name, mate2.name);
                return Ok(None);
            },
        }
    }

    let (mut x, mut y) = (0, 0);
    let mut overlap = 0;
    let mut identical = 0;
    for state in columns.iter() {
        match state {
            PathState::XGapped => x += 1,
            PathState::YGapped => y += 1,
            _ => {
                overlap += 1;
                if mate1.sequence.get(x) == mate2.sequence.get(y) {
                    identical += 1;
                }
                x += 1;
                y += 1;
            },
        }
    }
    debug!("overlap {}, identical {}", overlap, identical);

    let accept = (overlap >= settings.overlap_minimum && overlap > 0
                  && identical as f64 / overlap as f64 >= settings.overlap_identity)
        || (overlap == identical && overlap >= settings.overlap_identical_minimum);
    if !accept {
        return Ok(None);
    }

    let quals = mate1.quality.as_ref().zip(mate2.quality.as_ref());
    let mut seq: Vec<u8> = Vec::with_capacity(x + y);
    let mut qual: Vec<u8> = Vec::with_capacity(x + y);
    let (mut x, mut y) = (0, 0);
    for state in columns {
        let from_first = match state {
            PathState::XGapped => true,
            PathState::YGapped => false,
            _ => quals.is_some_and(|(q1, q2)| q1.get(x) > q2.get(y)),
        };
        let (read, pos) = if from_first { (mate1, x) } else { (mate2, y) };
        seq.extend(read.sequence.get(pos));
        if let Some(q) = &read.quality {
            qual.extend(q.get(pos));
        }
        match state {
            PathState::XGapped => x += 1,
            PathState::YGapped => y += 1,
            _ => { x += 1; y += 1; },
        }
    }

    let name = format!("{}m12", &mate1.name[..mate1.name.len() - 1]);
    Ok(Some(ReadRecord {
        name,
        comment: mate2.comment.clone(),
        sequence: seq,
        quality: quals.map(|_| qual),
        tag: parse_tag(&mate2.comment).or(mate1.tag.clone()),
        ..mate1.clone()
    }))
}

/// Join mates into one read separated by a break marker.
///
/// The joined read is called `<base>/p12`, takes the second mate's comment
/// and records the trimming of both mates in it. Reads that remain unpaired
/// get the trimming comment of a single mate.
///
/// Returns the number of pairs found.
pub fn find_paired_reads(reads: &mut Vec<ReadRecord>) -> usize {
    let mut paired = 0;
    let mut i = 0;
    while i < reads.len() {
        if let Some(base) = first_mate_base(&reads[i].name).map(|x| x.to_string()) {
            if let Some(j) = find_second_mate(reads, &base, i + 1) {
                let mate2 = reads.remove(j);
                let mate1 = &mut reads[i];
                let new_name = format!("{}/p12", base);
                info!("Pairing {} and {}: new name {}", mate1.name, mate2.name, new_name);

                mate1.name = new_name;
                mate1.comment = mate2.comment.clone();
                if mate2.tag.is_some() {
                    mate1.tag = mate2.tag.clone();
                }
                mate1.first_read_length = Some(mate1.sequence.len());
                mate1.sequence.push(BREAK_MARKER);
                mate1.sequence.extend_from_slice(&mate2.sequence);
                mate1.quality = match (mate1.quality.take(), &mate2.quality) {
                    (Some(mut q1), Some(q2)) => {
                        q1.push(BREAK_MARKER);
                        q1.extend_from_slice(q2);
                        Some(q1)
                    },
                    _ => None,
                };
                let trimming = format!("{}:P2ST{}:P2ET{}", trimming_comment(mate1), mate2.trim_start, mate2.trim_end);
                append_comment(&mut mate1.comment, &trimming);
                paired += 1;
            }
        }
        i += 1;
    }

    reads.iter_mut().filter(|read| !read.comment.contains("P1ST")).for_each(|read| {
        let trimming = trimming_comment(read);
        append_comment(&mut read.comment, &trimming);
    });
    paired
}

/// Record the trimming of single reads in their comments.
pub fn add_trimming_comment(reads: &mut [ReadRecord]) {
    reads.iter_mut().for_each(|read| {
        let trimming = trimming_comment(read);
        append_comment(&mut read.comment, &trimming);
    });
}

/// Trim bases below `qscore_minimum` from both ends of the reads.
///
/// Reads that would become shorter than `min_trimmed_length` are left as
/// they are.
pub fn trim_read_ends(reads: &mut [ReadRecord], settings: &Settings) {
    let low = |q: &u8| (*q as i32 - PHRED_OFFSET) < settings.qscore_minimum;
    reads.iter_mut().for_each(|read| {
        let Some(qual) = &read.quality else { return };
        let start = qual.iter().take_while(|q| low(*q)).count();
        let end = if start == qual.len() { 0 } else { qual.iter().rev().take_while(|q| low(*q)).count() };
        let len = qual.len();
        if start + end == 0 || len < start + end + settings.min_trimmed_length {
            return;
        }

        read.sequence = read.sequence[start..len - end].to_vec();
        read.quality = Some(qual[start..len - end].to_vec());
        read.trim_start += start;
        read.trim_end += end;
        debug!("trimmed {} with {} from start and {} from end", read.name, start, end);
    });
}
