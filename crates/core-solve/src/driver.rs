//! The solving loop: build, solve, classify, extract.
//!
//! Solver outcomes are data, never errors: an unsatisfiable model reports
//! [`Outcome::Infeasible`], an exhausted time budget reports
//! [`Outcome::Unknown`] (or [`Outcome::Feasible`] when an incumbent
//! assignment survived the cutoff).

use core_problem::Problem;
use tracing::{info, warn};
use z3::{Config, Context, Optimize, SatResult, Solver};

use crate::model::LayoutModel;
use crate::solution::{Solution, extract};
use crate::SolveError;

/// Classified result of one solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Proven minimum weighted component count.
    Optimal,
    /// A satisfying assignment with no optimality proof.
    Feasible,
    /// No layout satisfies the instance.
    Infeasible,
    /// The question was not decided within the budget.
    Unknown,
}

/// Outcome plus the extracted assignment, when one exists.
#[derive(Debug)]
pub struct SolveReport {
    pub outcome: Outcome,
    pub solution: Option<Solution>,
}

fn apply_search_params(problem: &Problem) {
    let options = &problem.options;
    if options.deterministic {
        // One worker and fixed seeds make the whole run reproducible.
        z3::set_global_param("parallel.enable", "false");
        z3::set_global_param("smt.random_seed", "42");
        z3::set_global_param("sat.random_seed", "42");
    } else if options.max_parallel {
        z3::set_global_param("parallel.enable", "true");
        z3::set_global_param("parallel.threads.max", &num_cpus::get().to_string());
    }
    if options.show_progress {
        z3::set_global_param("verbose", "1");
    }
}

/// Solve one problem instance end to end.
pub fn solve(problem: &Problem) -> Result<SolveReport, SolveError> {
    problem.validate()?;
    apply_search_params(problem);

    let mut config = Config::new();
    if let Some(limit) = problem.effective_time_limit() {
        config.set_timeout_msec(limit.as_millis() as u64);
    }
    let ctx = Context::new(&config);
    let model = LayoutModel::build(&ctx, problem)?;
    info!(
        target: "solve",
        width = problem.width,
        height = problem.height,
        sources = problem.sources,
        clauses = model.clauses.len(),
        feasible_ok = problem.options.feasible_ok,
        "model_built"
    );

    if problem.options.disable_solve {
        info!(target: "solve", "solve_disabled");
        return Ok(SolveReport {
            outcome: Outcome::Unknown,
            solution: None,
        });
    }

    let report = if problem.options.feasible_ok {
        check_feasible(&model)?
    } else {
        minimize(&model)?
    };
    info!(
        target: "solve",
        outcome = ?report.outcome,
        objective = report.solution.as_ref().and_then(Solution::objective),
        "solve_finished"
    );
    Ok(report)
}

/// Optimising mode: minimise the weighted component count; honoured hints are
/// a strictly subordinate objective, so they break ties among optima without
/// costing area.
fn minimize<'ctx>(model: &LayoutModel<'ctx>) -> Result<SolveReport, SolveError> {
    let optimizer = Optimize::new(model.ctx);
    for clause in &model.clauses {
        optimizer.assert(clause);
    }
    let cost = model.cost();
    optimizer.minimize(&cost);
    if !model.hints.is_empty() {
        let honoured = model.hint_score();
        optimizer.maximize(&honoured);
    }

    match optimizer.check(&[]) {
        SatResult::Sat => {
            let assignment = optimizer
                .get_model()
                .ok_or_else(|| SolveError::Extraction("sat outcome without a model".into()))?;
            Ok(SolveReport {
                outcome: Outcome::Optimal,
                solution: Some(extract(model, &assignment)?),
            })
        }
        SatResult::Unsat => Ok(SolveReport {
            outcome: Outcome::Infeasible,
            solution: None,
        }),
        SatResult::Unknown => match optimizer.get_model() {
            // The budget ran out but an incumbent assignment was found.
            Some(assignment) => Ok(SolveReport {
                outcome: Outcome::Feasible,
                solution: Some(extract(model, &assignment)?),
            }),
            None => Ok(SolveReport {
                outcome: Outcome::Unknown,
                solution: None,
            }),
        },
    }
}

/// Accept-first-feasible mode: no objective, any satisfying assignment
/// within the budget wins.
fn check_feasible<'ctx>(model: &LayoutModel<'ctx>) -> Result<SolveReport, SolveError> {
    if !model.hints.is_empty() {
        warn!(target: "solve", "hints are ignored in accept-first-feasible mode");
    }
    let solver = Solver::new(model.ctx);
    for clause in &model.clauses {
        solver.assert(clause);
    }
    match solver.check() {
        SatResult::Sat => {
            let assignment = solver
                .get_model()
                .ok_or_else(|| SolveError::Extraction("sat outcome without a model".into()))?;
            Ok(SolveReport {
                outcome: Outcome::Feasible,
                solution: Some(extract(model, &assignment)?),
            })
        }
        SatResult::Unsat => Ok(SolveReport {
            outcome: Outcome::Infeasible,
            solution: None,
        }),
        SatResult::Unknown => Ok(SolveReport {
            outcome: Outcome::Unknown,
            solution: None,
        }),
    }
}
