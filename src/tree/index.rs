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

//! Site index correction after grafting.
//!
//! Grafting reads above a node inserts new columns into the alignment that
//! replaces the node. The parent's child site indexes still point at the
//! columns of the old node and are shifted with [correct] using the offsets
//! computed by [offset_table].
//!

/// Which child of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Child site indexes of one side of a node, one entry per site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildIndexTable {
    pub side: Side,
    pub revision: usize,
    pub entries: Vec<Option<usize>>,
}

/// Result of [correct].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectedIndex {
    pub table: ChildIndexTable,
    /// True if any entry moved.
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct OffsetOutOfRange {
    pub index: usize,
    pub n_offsets: usize,
}

impl std::fmt::Display for OffsetOutOfRange {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Child site index {} has no offset (table has {} entries)", self.index, self.n_offsets)
    }
}

impl std::error::Error for OffsetOutOfRange {}

/// Count the inserted columns preceding each site of the original node.
///
/// `has_site` tells whether column `j` of the new alignment contains a site
/// of the original node. Entry `k` of the result is the number of columns
/// without such a site between the `k-1`th and `k`th site of the original
/// node.
pub fn offset_table<F: Fn(usize) -> bool>(n_columns: usize, has_site: F) -> Vec<usize> {
    let mut offsets: Vec<usize> = Vec::new();
    let mut delta = 0;
    for j in 0..n_columns {
        if has_site(j) {
            offsets.push(delta);
            delta = 0;
        } else {
            delta += 1;
        }
    }
    offsets
}

/// Shift child site indexes by the accumulated offsets.
///
/// An entry pointing at site `k` of the original node is moved to
/// `k + offsets[0] + .. + offsets[k]`. Gaps stay gaps. The returned table
/// is one revision ahead of the input.
///
/// ## Usage
///
/// ```rust
/// use graftreads::tree::index::{correct, ChildIndexTable, Side};
///
/// let table = ChildIndexTable { side: Side::Left, revision: 0, entries: vec![Some(0), Some(1), None, Some(2), Some(3)] };
/// // One column inserted before site 2
/// let offsets = vec![0, 0, 1, 0];
///
/// let got = correct(&table, &offsets).unwrap();
///
/// assert_eq!(got.table.entries, vec![Some(0), Some(1), None, Some(3), Some(4)]);
/// assert_eq!(got.table.revision, 1);
/// assert!(got.changed);
/// ```
///
pub fn correct(
    table: &ChildIndexTable,
    offsets: &[usize],
) -> Result<CorrectedIndex, OffsetOutOfRange> {
    let mut prefix: Vec<usize> = Vec::with_capacity(offsets.len());
    let mut total = 0;
    offsets.iter().for_each(|x| {
        total += x;
        prefix.push(total);
    });

    let mut changed = false;
    let entries = table.entries.iter().map(|entry| {
        match entry {
            Some(k) => {
                let shift = prefix.get(*k).ok_or(OffsetOutOfRange { index: *k, n_offsets: offsets.len() })?;
                changed |= *shift > 0;
                Ok(Some(k + shift))
            },
            None => Ok(None),
        }
    }).collect::<Result<Vec<Option<usize>>, OffsetOutOfRange>>()?;

    Ok(CorrectedIndex {
        table: ChildIndexTable { side: table.side, revision: table.revision + 1, entries },
        changed,
    })
}
