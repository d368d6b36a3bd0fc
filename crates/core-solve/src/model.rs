//! The variable model: one solver variable per placement fact and per
//! directed flow, held in flat arrays indexed by computed offsets.
//!
//! Everything is allocated once when the model is built and dropped when
//! extraction completes; nothing is mutated after solving.

use std::collections::HashSet;

use core_grid::{Dir, inside, mixer};
use core_problem::Problem;
use tracing::debug;
use z3::Context;
use z3::ast::{Bool, Int};

use crate::SolveError;

/// All decision variables of one layout search, plus the accumulated
/// constraint clauses. The solver borrows this read-only during the solve.
pub struct LayoutModel<'ctx> {
    pub(crate) ctx: &'ctx Context,
    pub(crate) width: i32,
    pub(crate) height: i32,
    pub(crate) sources: usize,
    pub(crate) max_flow: i64,
    pub(crate) max_gap: i32,
    pub(crate) kinds: usize,

    pub(crate) belt: Vec<Bool<'ctx>>,
    pub(crate) mixer: Vec<Bool<'ctx>>,
    pub(crate) tun_in: Vec<Bool<'ctx>>,
    pub(crate) tun_out: Vec<Bool<'ctx>>,
    /// Cell orientation, exactly one of four per cell.
    pub(crate) dir: Vec<Bool<'ctx>>,
    /// Per-kind mixer tags; empty unless the problem carries a network plan.
    pub(crate) mixer_kind: Vec<Bool<'ctx>>,
    /// Signed surface flow per `(cell, source, direction)`; positive enters
    /// the cell.
    pub(crate) surface: Vec<Int<'ctx>>,
    /// The bypass layer linking tunnel endpoints, same shape and sign
    /// convention as `surface`.
    pub(crate) underground: Vec<Int<'ctx>>,

    pub(crate) clauses: Vec<Bool<'ctx>>,
    /// Warm-start literals suggested (not forced) to the search.
    pub(crate) hints: Vec<Bool<'ctx>>,
    /// Variable names already pinned by a seed or hint grid.
    pub(crate) pinned: HashSet<String>,
}

pub(crate) fn belt_name(x: i32, y: i32) -> String {
    format!("belt_{x}_{y}")
}

pub(crate) fn mixer_name(x: i32, y: i32) -> String {
    format!("mixer_{x}_{y}")
}

pub(crate) fn tun_in_name(x: i32, y: i32) -> String {
    format!("tin_{x}_{y}")
}

pub(crate) fn tun_out_name(x: i32, y: i32) -> String {
    format!("tout_{x}_{y}")
}

pub(crate) fn dir_name(x: i32, y: i32, d: Dir) -> String {
    format!("dir_{x}_{y}_{}", d.index())
}

fn flow_name(layer: &str, x: i32, y: i32, s: usize, d: Dir) -> String {
    format!("{layer}_{x}_{y}_{s}_{}", d.index())
}

impl<'ctx> LayoutModel<'ctx> {
    /// Allocate the variables for `problem` and post the full constraint
    /// system, pledges, gates, and warm starts. The problem is validated
    /// first; nothing is observable from a failed build.
    pub fn build(ctx: &'ctx Context, problem: &Problem) -> Result<LayoutModel<'ctx>, SolveError> {
        problem.validate()?;

        let width = problem.width;
        let height = problem.height;
        let sources = problem.sources;
        let cells = (width * height) as usize;
        let kinds = problem.plan.as_ref().map_or(0, |p| p.kinds.len());

        let mut model = LayoutModel {
            ctx,
            width,
            height,
            sources,
            max_flow: problem.max_flow,
            max_gap: problem.max_gap,
            kinds,
            belt: Vec::with_capacity(cells),
            mixer: Vec::with_capacity(cells),
            tun_in: Vec::with_capacity(cells),
            tun_out: Vec::with_capacity(cells),
            dir: Vec::with_capacity(cells * 4),
            mixer_kind: Vec::with_capacity(cells * kinds),
            surface: Vec::with_capacity(cells * sources * 4),
            underground: Vec::with_capacity(cells * sources * 4),
            clauses: Vec::new(),
            hints: Vec::new(),
            pinned: HashSet::new(),
        };

        for y in 0..height {
            for x in 0..width {
                model.belt.push(Bool::new_const(ctx, belt_name(x, y)));
                model.mixer.push(Bool::new_const(ctx, mixer_name(x, y)));
                model.tun_in.push(Bool::new_const(ctx, tun_in_name(x, y)));
                model.tun_out.push(Bool::new_const(ctx, tun_out_name(x, y)));
                for d in core_grid::DIRECTIONS {
                    model.dir.push(Bool::new_const(ctx, dir_name(x, y, d)));
                }
                for k in 0..kinds {
                    model
                        .mixer_kind
                        .push(Bool::new_const(ctx, format!("mixkind_{x}_{y}_{k}")));
                }
                for s in 0..sources {
                    for d in core_grid::DIRECTIONS {
                        model
                            .surface
                            .push(Int::new_const(ctx, flow_name("flow", x, y, s, d)));
                        model
                            .underground
                            .push(Int::new_const(ctx, flow_name("uflow", x, y, s, d)));
                    }
                }
            }
        }

        model.post_all(problem);

        if let Some(seed) = &problem.seed {
            model.pin_grid(seed, true)?;
        }
        for hint in &problem.hints {
            model.pin_grid(hint, false)?;
        }

        debug!(
            target: "model",
            width,
            height,
            sources,
            clauses = model.clauses.len(),
            hints = model.hints.len(),
            "variables_allocated"
        );
        Ok(model)
    }

    /// Number of posted constraint clauses, pins included.
    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    pub(crate) fn cell(&self, x: i32, y: i32) -> usize {
        debug_assert!(inside(x, y, self.width, self.height));
        (y * self.width + x) as usize
    }

    pub(crate) fn belt_at(&self, x: i32, y: i32) -> &Bool<'ctx> {
        &self.belt[self.cell(x, y)]
    }

    pub(crate) fn mixer_at(&self, x: i32, y: i32) -> &Bool<'ctx> {
        &self.mixer[self.cell(x, y)]
    }

    pub(crate) fn tun_in_at(&self, x: i32, y: i32) -> &Bool<'ctx> {
        &self.tun_in[self.cell(x, y)]
    }

    pub(crate) fn tun_out_at(&self, x: i32, y: i32) -> &Bool<'ctx> {
        &self.tun_out[self.cell(x, y)]
    }

    pub(crate) fn dir_at(&self, x: i32, y: i32, d: Dir) -> &Bool<'ctx> {
        &self.dir[self.cell(x, y) * 4 + d.index()]
    }

    pub(crate) fn mixer_kind_at(&self, x: i32, y: i32, k: usize) -> &Bool<'ctx> {
        &self.mixer_kind[self.cell(x, y) * self.kinds + k]
    }

    fn flow_index(&self, x: i32, y: i32, s: usize, d: Dir) -> usize {
        debug_assert!(s < self.sources);
        (self.cell(x, y) * self.sources + s) * 4 + d.index()
    }

    pub(crate) fn surface_at(&self, x: i32, y: i32, s: usize, d: Dir) -> &Int<'ctx> {
        &self.surface[self.flow_index(x, y, s, d)]
    }

    pub(crate) fn underground_at(&self, x: i32, y: i32, s: usize, d: Dir) -> &Int<'ctx> {
        &self.underground[self.flow_index(x, y, s, d)]
    }

    pub(crate) fn int(&self, value: i64) -> Int<'ctx> {
        Int::from_i64(self.ctx, value)
    }

    pub(crate) fn truth(&self, value: bool) -> Bool<'ctx> {
        Bool::from_bool(self.ctx, value)
    }

    /// Number of true literals among `bits`, as an integer term.
    pub(crate) fn count(&self, bits: &[&Bool<'ctx>]) -> Int<'ctx> {
        let one = self.int(1);
        let zero = self.int(0);
        let terms: Vec<Int<'ctx>> = bits.iter().map(|b| b.ite(&one, &zero)).collect();
        let refs: Vec<&Int<'ctx>> = terms.iter().collect();
        Int::add(self.ctx, &refs)
    }

    fn count_all(&self, bits: &[Bool<'ctx>]) -> Int<'ctx> {
        let refs: Vec<&Bool<'ctx>> = bits.iter().collect();
        self.count(&refs)
    }

    /// `belt + 5·mixer + 2·entrance + 2·exit`, the weighted component count
    /// the optimising driver minimises.
    pub(crate) fn cost(&self) -> Int<'ctx> {
        let five = self.int(5);
        let two = self.int(2);
        let belts = self.count_all(&self.belt);
        let mixers = Int::mul(self.ctx, &[&five, &self.count_all(&self.mixer)]);
        let entrances = Int::mul(self.ctx, &[&two, &self.count_all(&self.tun_in)]);
        let exits = Int::mul(self.ctx, &[&two, &self.count_all(&self.tun_out)]);
        Int::add(self.ctx, &[&belts, &mixers, &entrances, &exits])
    }

    /// Number of honoured warm-start suggestions; maximised after the cost so
    /// hints break ties without overriding optimality.
    pub(crate) fn hint_score(&self) -> Int<'ctx> {
        self.count_all(&self.hints)
    }

    /// True when some adjacent mixer anchor claims `(x, y)` as its companion
    /// cell.
    pub(crate) fn companion_here(&self, x: i32, y: i32) -> Bool<'ctx> {
        let mut terms = Vec::new();
        for d in core_grid::DIRECTIONS {
            let (ax, ay) = mixer::anchor(x, y, d);
            if inside(ax, ay, self.width, self.height) {
                terms.push(Bool::and(
                    self.ctx,
                    &[self.mixer_at(ax, ay), self.dir_at(ax, ay, d)],
                ));
            }
        }
        if terms.is_empty() {
            return self.truth(false);
        }
        let refs: Vec<&Bool<'ctx>> = terms.iter().collect();
        Bool::or(self.ctx, &refs)
    }

    /// True when the cell hosts any component, companion cells included.
    pub(crate) fn occupied(&self, x: i32, y: i32) -> Bool<'ctx> {
        let companion = self.companion_here(x, y);
        Bool::or(
            self.ctx,
            &[
                self.belt_at(x, y),
                self.mixer_at(x, y),
                &companion,
                self.tun_in_at(x, y),
                self.tun_out_at(x, y),
            ],
        )
    }
}
