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
use crate::aligner::Aligner;
use crate::aligner::AlignmentFailed;
use crate::aligner::AlignmentWindow;
use crate::graph::AlignmentGraph;
use crate::graph::PathState;
use crate::graph::Site;
use crate::graph::SiteChildren;
use crate::graph::SiteType;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Diagonal,
    Up,
    Left,
}

/// Global alignment of the sites of two graphs with linear gap costs.
///
/// Sites are aligned in index order; alternative edges and branch lengths
/// are ignored. Gaps at either end of the alignment cost `end_gap_score`
/// so that a short read can be aligned inside a long reference. Positions
/// with an unknown state score zero against anything.
///
/// Ties are resolved in the order match, gap in the right graph, gap in
/// the left graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleAligner {
    pub match_score: i32,
    pub mismatch_score: i32,
    pub gap_score: i32,
    pub end_gap_score: i32,
}

impl Default for SimpleAligner {
    fn default() -> Self {
        SimpleAligner {
            match_score: 2,
            mismatch_score: -2,
            gap_score: -3,
            end_gap_score: -1,
        }
    }
}

impl SimpleAligner {
    fn pair_score(&self, left: &AlignmentGraph, i: usize, right: &AlignmentGraph, j: usize) -> i32 {
        let left_state = left.sites[i].state;
        let right_state = right.sites[j].state;
        if left.is_unknown(left_state) || right.is_unknown(right_state) {
            0
        } else if left_state == right_state {
            self.match_score
        } else {
            self.mismatch_score
        }
    }
}

impl Aligner for SimpleAligner {
    fn align(
        &self,
        left: &AlignmentGraph,
        _left_distance: f64,
        right: &AlignmentGraph,
        _right_distance: f64,
        window: Option<AlignmentWindow>,
    ) -> Result<AlignmentGraph, E> {
        if left.sites_length() < 2 || right.sites_length() < 2 {
            return Err(Box::new(AlignmentFailed("input graph is missing its sentinels".to_string())));
        }
        let window = window.unwrap_or_default();

        let n = left.sites_length() - 2;
        let m = right.sites_length() - 2;
        let width = m + 1;

        let mut score = vec![0_i32; (n + 1) * width];
        let mut trace = vec![Move::Diagonal; (n + 1) * width];
        for i in 1..=n {
            score[i * width] = score[(i - 1) * width] + self.end_gap_score;
            trace[i * width] = Move::Up;
        }
        for j in 1..=m {
            score[j] = score[j - 1] + self.end_gap_score;
            trace[j] = Move::Left;
        }

        for i in 1..=n {
            for j in 1..=m {
                let diagonal = if window.contains(i) {
                    Some(score[(i - 1) * width + j - 1] + self.pair_score(left, i, right, j))
                } else {
                    None
                };
                let up = score[(i - 1) * width + j] + if j == m { self.end_gap_score } else { self.gap_score };
                let across = score[i * width + j - 1] + if i == n { self.end_gap_score } else { self.gap_score };

                let (best, step) = match diagonal {
                    Some(d) if d >= up && d >= across => (d, Move::Diagonal),
                    _ => if up >= across { (up, Move::Up) } else { (across, Move::Left) },
                };
                score[i * width + j] = best;
                trace[i * width + j] = step;
            }
        }

        let mut columns: Vec<(Option<usize>, Option<usize>, PathState)> = Vec::with_capacity(n + m);
        let (mut i, mut j) = (n, m);
        while i > 0 || j > 0 {
            match trace[i * width + j] {
                Move::Diagonal => {
                    columns.push((Some(i), Some(j), PathState::Matched));
                    i -= 1;
                    j -= 1;
                },
                Move::Up => {
                    columns.push((Some(i), None, PathState::XGapped));
                    i -= 1;
                },
                Move::Left => {
                    columns.push((None, Some(j), PathState::YGapped));
                    j -= 1;
                },
            }
        }
        columns.reverse();

        log::trace!("aligned {} and {} sites into {} columns with score {}", n, m, columns.len(), score[n * width + m]);

        let mut graph = AlignmentGraph::new(left.data_type, left.codons);
        graph.sites.reserve(columns.len() + 2);

        let start = graph.push_site(Site {
            site_type: SiteType::Start,
            children: SiteChildren { left: Some(0), right: Some(0) },
            path_state: Some(PathState::Matched),
            ..Default::default()
        });
        graph.link(None, start, 1.0)?;

        for (l, r, path_state) in columns {
            let left_site = l.and_then(|x| left.site_at(x));
            let right_site = r.and_then(|x| right.site_at(x));
            let source = match (left_site, right_site) {
                (Some(ls), Some(rs)) => {
                    if left.is_unknown(ls.state) && !right.is_unknown(rs.state) { rs } else { ls }
                },
                (Some(ls), None) => ls,
                (None, Some(rs)) => rs,
                (None, None) => return Err(Box::new(AlignmentFailed("empty alignment column".to_string()))),
            };
            let prev = graph.sites_length() - 1;
            let cur = graph.push_site(Site {
                symbol: source.symbol.clone(),
                state: source.state,
                masked: source.masked,
                children: SiteChildren { left: l, right: r },
                path_state: Some(path_state),
                ..Default::default()
            });
            graph.link(Some(prev), cur, 1.0)?;
        }

        let prev = graph.sites_length() - 1;
        let stop = graph.push_site(Site {
            site_type: SiteType::Stop,
            children: SiteChildren { left: Some(n + 1), right: Some(m + 1) },
            path_state: Some(PathState::Matched),
            ..Default::default()
        });
        graph.link(Some(prev), stop, 1.0)?;

        Ok(graph)
    }
}
