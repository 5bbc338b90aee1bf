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

/// Role of a site in its graph.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SiteType {
    #[default]
    Real,
    Start,
    Stop,
    /// Last site of the first mate.
    BreakStart,
    /// First site of the second mate.
    BreakStop,
}

/// Outcome of an alignment column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    /// Both children have a site in the column.
    Matched,
    /// Only the left child has a site in the column.
    XGapped,
    /// Only the right child has a site in the column.
    YGapped,
    XSkipped,
    YSkipped,
}

#[derive(Debug, Clone)]
pub struct UnknownPathState(pub i32);

impl std::fmt::Display for UnknownPathState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Unrecognized alignment path state code {}", self.0)
    }
}

impl std::error::Error for UnknownPathState {}

impl PathState {
    /// Decode the integer codes used by aligners that report path states
    /// as numbers.
    pub fn from_code(code: i32) -> Result<PathState, UnknownPathState> {
        match code {
            0 => Ok(PathState::Matched),
            1 => Ok(PathState::XGapped),
            2 => Ok(PathState::YGapped),
            3 => Ok(PathState::XSkipped),
            4 => Ok(PathState::YSkipped),
            _ => Err(UnknownPathState(code)),
        }
    }
}

/// Indexes of the child sites an alignment column descends from.
///
/// `None` means the child has a gap in the column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteChildren {
    pub left: Option<usize>,
    pub right: Option<usize>,
}

/// One position of an [AlignmentGraph](super::AlignmentGraph).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Site {
    pub site_type: SiteType,
    /// Observed character(s), empty for sentinels.
    pub symbol: String,
    /// Index into the full alphabet, `None` for sentinels.
    pub state: Option<usize>,
    /// Low quality position stored with the unknown state.
    pub masked: bool,
    /// Outgoing edge indexes.
    pub fwd_edges: Vec<usize>,
    /// Incoming edge indexes.
    pub bwd_edges: Vec<usize>,
    pub children: SiteChildren,
    pub path_state: Option<PathState>,
}

impl Site {
    pub fn sentinel(site_type: SiteType) -> Self {
        Site { site_type, ..Default::default() }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self.site_type, SiteType::Start | SiteType::Stop)
    }

    pub fn first_bwd_edge(&self) -> Option<usize> {
        self.bwd_edges.first().copied()
    }
}
