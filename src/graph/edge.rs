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

/// Weighted transition between two sites.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Source site, `None` only for the edge entering the start sentinel.
    pub start: Option<usize>,
    pub end: usize,
    pub weight: f64,
}

impl Edge {
    pub fn new(start: Option<usize>, end: usize) -> Self {
        Edge { start, end, weight: 1.0 }
    }

    pub fn weighted(start: Option<usize>, end: usize, weight: f64) -> Self {
        Edge { start, end, weight }
    }
}

/// An edge given as input for graph-shaped reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputEdge {
    pub start: usize,
    pub end: usize,
    pub weight: f64,
}

impl std::str::FromStr for InputEdge {
    type Err = String;

    /// Parse `start,end,weight` or `start,end`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(',').collect();
        if fields.len() < 2 || fields.len() > 3 {
            return Err(format!("'{}' is not a valid InputEdge", s));
        }
        let start = fields[0].trim().parse::<usize>().map_err(|e| format!("'{}': {}", s, e))?;
        let end = fields[1].trim().parse::<usize>().map_err(|e| format!("'{}': {}", s, e))?;
        let weight = match fields.get(2) {
            Some(w) => w.trim().parse::<f64>().map_err(|e| format!("'{}': {}", s, e))?,
            None => 1.0,
        };
        Ok(InputEdge { start, end, weight })
    }
}
