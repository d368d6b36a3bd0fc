//! Layout synthesis for belt balancers.
//!
//! A [`core_problem::Problem`] is turned into a constraint model over
//! placement Booleans, a per-cell orientation, and two layers of signed
//! integer flows (surface and underground), then handed to a solver that
//! minimises the weighted component count. The satisfying assignment comes
//! back as a [`Solution`]: a grid of components plus the flows that justify
//! them.
//!
//! The model lives for exactly one solve. Build it, run [`solve`], read the
//! report, drop everything.

mod constraints;
mod driver;
mod model;
mod solution;
mod warm;

use core_problem::ProblemError;
use core_render::GlyphError;
use thiserror::Error;

pub use driver::{Outcome, SolveReport, solve};
pub use model::LayoutModel;
pub use solution::Solution;

/// Failures on the way into or out of the solver. Solver *outcomes*
/// (infeasible, unknown) are not errors; see [`Outcome`].
#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    Glyph(#[from] GlyphError),
    #[error("assignment evaluation failed: {0}")]
    Extraction(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_problem::{Pledge, Problem};
    use core_grid::Dir;
    use z3::{Config, Context};

    #[test]
    fn build_posts_a_nonempty_constraint_system() {
        let problem = Problem::new(
            2,
            2,
            1,
            vec![
                Pledge::new(0, 0, Dir::South, 0, 1),
                Pledge::new(0, 1, Dir::North, 0, -1),
            ],
            1,
        );
        let ctx = Context::new(&Config::new());
        let model = LayoutModel::build(&ctx, &problem).unwrap();
        assert_eq!(model.belt.len(), 4);
        assert_eq!(model.dir.len(), 16);
        assert_eq!(model.surface.len(), 16);
        assert_eq!(model.underground.len(), 16);
        assert!(model.clauses.len() > 100);
        assert!(model.hints.is_empty());
    }

    #[test]
    fn build_rejects_invalid_instances() {
        let problem = Problem::new(1, 1, 1, vec![Pledge::new(3, 3, Dir::North, 0, 1)], 1);
        let ctx = Context::new(&Config::new());
        assert!(matches!(
            LayoutModel::build(&ctx, &problem),
            Err(SolveError::Problem(_))
        ));
    }

    #[test]
    fn seed_pins_are_deduplicated_across_grids() {
        let mut problem = Problem::new(
            1,
            1,
            1,
            vec![
                Pledge::new(0, 0, Dir::South, 0, 1),
                Pledge::new(0, 0, Dir::North, 0, -1),
            ],
            1,
        );
        problem.seed = Some("▲".into());
        problem.hints = vec!["▲".into()];
        let ctx = Context::new(&Config::new());
        let model = LayoutModel::build(&ctx, &problem).unwrap();
        // The hint grid repeats the seeded placement, so no hint literal is
        // left to suggest.
        assert!(model.hints.is_empty());
        assert_eq!(model.pinned.len(), 2);
    }

    #[test]
    fn seed_of_the_wrong_size_is_rejected() {
        let mut problem = Problem::new(2, 1, 1, vec![], 1);
        problem.seed = Some("▲".into());
        let ctx = Context::new(&Config::new());
        assert!(matches!(
            LayoutModel::build(&ctx, &problem),
            Err(SolveError::Glyph(GlyphError::WrongSize { .. }))
        ));
    }
}
