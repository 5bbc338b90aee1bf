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

//! Record of where each read was sent by the placement search.
//!
//! Every line has the read name, the chosen node and the tag that selected
//! the candidates, optionally followed by a note:
//!
//! ```text
//! read_1 n12 TID=clade7
//! read_2 root TID=clade9 (no match)
//! read_3 root TID=NULL
//! ```
//!
use std::io::Write;

type E = Box<dyn std::error::Error>;

/// Written in place of the tag of reads without one.
pub const MISSING_TAG: &str = "NULL";

/// Written in place of the tag when every node was a candidate.
pub const EXHAUSTIVE_TAG: &str = "<empty>";

/// Why a read went to the root instead of a searched node.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementNote {
    /// No node carries the read's tag.
    NoMatch,
    /// The best node scored below the minimum.
    Bad,
}

impl std::fmt::Display for PlacementNote {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PlacementNote::NoMatch => write!(f, "(no match)"),
            PlacementNote::Bad => write!(f, "(bad)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementLine {
    pub read: String,
    pub node: String,
    pub tag: String,
    pub note: Option<PlacementNote>,
}

impl std::fmt::Display for PlacementLine {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {} TID={}", self.read, self.node, self.tag)?;
        if let Some(note) = self.note {
            write!(f, " {}", note)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementReport {
    pub lines: Vec<PlacementLine>,
}

impl PlacementReport {
    pub fn new() -> Self {
        PlacementReport { lines: Vec::new() }
    }

    pub fn record(&mut self, read: &str, node: &str, tag: &str, note: Option<PlacementNote>) {
        self.lines.push(PlacementLine {
            read: read.to_string(),
            node: node.to_string(),
            tag: tag.to_string(),
            note,
        });
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Write one line per recorded read to `conn`.
    pub fn write_to<W: Write>(&self, conn: &mut W) -> Result<(), E> {
        for line in self.lines.iter() {
            writeln!(conn, "{}", line)?;
        }
        conn.flush()?;
        Ok(())
    }
}
