//! Balancer problem statements.
//!
//! A [`Problem`] is everything the solver needs to search for a layout: grid
//! dimensions, the number of item sources, the boundary flow pledges, the
//! per-edge capacity, feature gates, an optional mixer-network plan, and
//! optional warm-start grids. Validation happens up front; a problem that
//! passes [`Problem::validate`] can be modelled without further checks.

use std::collections::HashMap;
use std::time::Duration;

use core_grid::{Dir, inside, step};
use thiserror::Error;

/// Longest run of surface cells an underground belt may bypass, counted
/// strictly between the entrance and the exit.
pub const DEFAULT_MAX_GAP: i32 = 9;

/// Wall-clock budget applied when accept-first-feasible mode is requested
/// without an explicit limit.
pub const FEASIBLE_TIME_LIMIT: Duration = Duration::from_secs(300);

/// A fixed flow crossing one grid-boundary edge.
///
/// Values are scaled integers; a positive value enters the cell across the
/// named edge, a negative value leaves it. Inputs to the network are positive
/// pledges on border cells, outputs are negative ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pledge {
    pub x: i32,
    pub y: i32,
    pub dir: Dir,
    pub source: usize,
    pub value: i64,
}

impl Pledge {
    pub fn new(x: i32, y: i32, dir: Dir, source: usize, value: i64) -> Pledge {
        Pledge {
            x,
            y,
            dir,
            source,
            value,
        }
    }
}

/// Switches that remove a component family from the search space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureGates {
    pub disable_belt: bool,
    pub disable_underground: bool,
}

/// One mixer of a planned network: which sources it consumes and which it
/// emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixerKind {
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
}

/// An ordered list of mixer kinds, each of which must be placed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPlan {
    pub kinds: Vec<MixerKind>,
}

/// Knobs on the solving run itself, as opposed to the instance being solved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveOptions {
    /// Skip the area objective and accept any satisfying assignment.
    pub feasible_ok: bool,
    /// Run the solver portfolio across all available threads.
    pub max_parallel: bool,
    /// Single worker, fixed random seed; two runs produce identical output.
    pub deterministic: bool,
    /// Wall-clock budget. `feasible_ok` defaults this to
    /// [`FEASIBLE_TIME_LIMIT`] when unset.
    pub time_limit: Option<Duration>,
    /// Raise solver verbosity on stderr.
    pub show_progress: bool,
    /// Build the model but never invoke the solver.
    pub disable_solve: bool,
}

/// A complete problem instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub width: i32,
    pub height: i32,
    pub sources: usize,
    pub pledges: Vec<Pledge>,
    /// Per-edge capacity: the summed flow of all sources across any one cell
    /// edge stays within `[-max_flow, max_flow]`.
    pub max_flow: i64,
    /// Longest permitted underground gap; see [`DEFAULT_MAX_GAP`].
    pub max_gap: i32,
    pub gates: FeatureGates,
    pub plan: Option<NetworkPlan>,
    /// Glyph grid whose placements are pinned as hard constraints.
    pub seed: Option<String>,
    /// Glyph grids whose placements are suggested to the search.
    pub hints: Vec<String>,
    pub options: SolveOptions,
}

impl Problem {
    pub fn new(
        width: i32,
        height: i32,
        sources: usize,
        pledges: Vec<Pledge>,
        max_flow: i64,
    ) -> Problem {
        Problem {
            width,
            height,
            sources,
            pledges,
            max_flow,
            max_gap: DEFAULT_MAX_GAP,
            gates: FeatureGates::default(),
            plan: None,
            seed: None,
            hints: Vec::new(),
            options: SolveOptions::default(),
        }
    }

    /// Check the instance for malformed input. Nothing downstream of a
    /// successful validation can fail on instance data.
    pub fn validate(&self) -> Result<(), ProblemError> {
        if self.width < 1 || self.height < 1 {
            return Err(ProblemError::EmptyGrid {
                width: self.width,
                height: self.height,
            });
        }
        if self.sources == 0 {
            return Err(ProblemError::NoSources);
        }
        if self.max_flow < 1 {
            return Err(ProblemError::NonPositiveCapacity {
                max_flow: self.max_flow,
            });
        }
        if self.max_gap < 0 {
            return Err(ProblemError::NegativeGap {
                max_gap: self.max_gap,
            });
        }
        let mut seen: HashMap<(i32, i32, Dir, usize), i64> = HashMap::new();
        for pledge in &self.pledges {
            let Pledge {
                x,
                y,
                dir,
                source,
                value,
            } = *pledge;
            if !inside(x, y, self.width, self.height) {
                return Err(ProblemError::PledgeOutsideGrid {
                    x,
                    y,
                    width: self.width,
                    height: self.height,
                });
            }
            let (nx, ny) = step(x, y, dir);
            if inside(nx, ny, self.width, self.height) {
                return Err(ProblemError::PledgeNotOutward { x, y, dir });
            }
            if source >= self.sources {
                return Err(ProblemError::PledgeSourceRange {
                    source_index: source,
                    sources: self.sources,
                });
            }
            if value.abs() > self.max_flow {
                return Err(ProblemError::PledgeOverCapacity {
                    value,
                    max_flow: self.max_flow,
                });
            }
            if let Some(&first) = seen.get(&(x, y, dir, source)) {
                if first != value {
                    return Err(ProblemError::ConflictingPledges {
                        x,
                        y,
                        dir,
                        source_index: source,
                        first,
                        second: value,
                    });
                }
            } else {
                seen.insert((x, y, dir, source), value);
            }
        }
        if let Some(plan) = &self.plan {
            for (kind, mixer) in plan.kinds.iter().enumerate() {
                if mixer.inputs.is_empty() || mixer.outputs.is_empty() {
                    return Err(ProblemError::PlanEmptyKind { kind });
                }
                for &source in mixer.inputs.iter().chain(mixer.outputs.iter()) {
                    if source >= self.sources {
                        return Err(ProblemError::PlanSourceRange {
                            kind,
                            source_index: source,
                            sources: self.sources,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Pledges keyed by `(cell, direction, source)`, identical duplicates
    /// collapsed. Call only on a validated problem.
    pub fn pledge_map(&self) -> HashMap<(i32, i32, Dir, usize), i64> {
        self.pledges
            .iter()
            .map(|p| ((p.x, p.y, p.dir, p.source), p.value))
            .collect()
    }

    /// The wall-clock budget the solver should run under.
    pub fn effective_time_limit(&self) -> Option<Duration> {
        match (self.options.time_limit, self.options.feasible_ok) {
            (Some(limit), _) => Some(limit),
            (None, true) => Some(FEASIBLE_TIME_LIMIT),
            (None, false) => None,
        }
    }
}

/// Malformed instance data, rejected before any model is built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProblemError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    EmptyGrid { width: i32, height: i32 },
    #[error("a problem needs at least one source")]
    NoSources,
    #[error("edge capacity must be positive, got {max_flow}")]
    NonPositiveCapacity { max_flow: i64 },
    #[error("underground gap must be non-negative, got {max_gap}")]
    NegativeGap { max_gap: i32 },
    #[error("pledge cell ({x}, {y}) lies outside the {width}x{height} grid")]
    PledgeOutsideGrid {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    #[error("pledge at ({x}, {y}) facing {dir:?} does not cross the grid border")]
    PledgeNotOutward { x: i32, y: i32, dir: Dir },
    #[error("pledge source {source_index} out of range, problem has {sources}")]
    PledgeSourceRange { source_index: usize, sources: usize },
    #[error("pledge value {value} exceeds the edge capacity {max_flow}")]
    PledgeOverCapacity { value: i64, max_flow: i64 },
    #[error(
        "conflicting pledges at ({x}, {y}) facing {dir:?} for source {source_index}: {first} vs {second}"
    )]
    ConflictingPledges {
        x: i32,
        y: i32,
        dir: Dir,
        source_index: usize,
        first: i64,
        second: i64,
    },
    #[error("mixer plan kind {kind} references source {source_index}, problem has {sources}")]
    PlanSourceRange {
        kind: usize,
        source_index: usize,
        sources: usize,
    },
    #[error("mixer plan kind {kind} has an empty input or output set")]
    PlanEmptyKind { kind: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cell_problem() -> Problem {
        Problem::new(
            2,
            1,
            1,
            vec![
                Pledge::new(0, 0, Dir::South, 0, 1),
                Pledge::new(0, 0, Dir::North, 0, -1),
            ],
            1,
        )
    }

    #[test]
    fn valid_problem_passes() {
        assert_eq!(two_cell_problem().validate(), Ok(()));
    }

    #[test]
    fn rejects_empty_grid() {
        let problem = Problem::new(0, 3, 1, vec![], 1);
        assert!(matches!(
            problem.validate(),
            Err(ProblemError::EmptyGrid { .. })
        ));
    }

    #[test]
    fn rejects_pledge_outside_grid() {
        let mut problem = two_cell_problem();
        problem.pledges.push(Pledge::new(5, 0, Dir::North, 0, 1));
        assert!(matches!(
            problem.validate(),
            Err(ProblemError::PledgeOutsideGrid { x: 5, .. })
        ));
    }

    #[test]
    fn rejects_inward_pledge() {
        let mut problem = two_cell_problem();
        // East from (0, 0) stays inside the 2x1 grid, so this edge is not on
        // the border.
        problem.pledges.push(Pledge::new(0, 0, Dir::East, 0, 1));
        assert!(matches!(
            problem.validate(),
            Err(ProblemError::PledgeNotOutward { dir: Dir::East, .. })
        ));
    }

    #[test]
    fn rejects_pledge_over_capacity() {
        let mut problem = two_cell_problem();
        problem.pledges[0].value = 9;
        assert!(matches!(
            problem.validate(),
            Err(ProblemError::PledgeOverCapacity { value: 9, .. })
        ));
    }

    #[test]
    fn rejects_conflicting_duplicates_but_collapses_identical_ones() {
        let mut problem = two_cell_problem();
        problem.pledges.push(Pledge::new(0, 0, Dir::South, 0, 1));
        assert_eq!(problem.validate(), Ok(()));
        assert_eq!(problem.pledge_map().len(), 2);

        problem.pledges.push(Pledge::new(0, 0, Dir::South, 0, -1));
        assert!(matches!(
            problem.validate(),
            Err(ProblemError::ConflictingPledges {
                first: 1,
                second: -1,
                ..
            })
        ));
    }

    #[test]
    fn rejects_bad_plan() {
        let mut problem = two_cell_problem();
        problem.plan = Some(NetworkPlan {
            kinds: vec![MixerKind {
                inputs: vec![0],
                outputs: vec![3],
            }],
        });
        assert!(matches!(
            problem.validate(),
            Err(ProblemError::PlanSourceRange { source_index: 3, .. })
        ));
    }

    #[test]
    fn feasible_mode_defaults_the_time_limit() {
        let mut problem = two_cell_problem();
        assert_eq!(problem.effective_time_limit(), None);
        problem.options.feasible_ok = true;
        assert_eq!(problem.effective_time_limit(), Some(FEASIBLE_TIME_LIMIT));
        problem.options.time_limit = Some(Duration::from_secs(10));
        assert_eq!(
            problem.effective_time_limit(),
            Some(Duration::from_secs(10))
        );
    }
}
