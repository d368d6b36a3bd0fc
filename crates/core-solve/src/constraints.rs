//! The constraint system tying placements to flows.
//!
//! Constraints are posted in groups; every component-behavior implication is
//! guarded by the placement Boolean and the cell orientation. Clauses are
//! accumulated on the model and asserted in one pass by the driver, so a
//! failed build leaves no solver state behind.

use core_grid::{Dir, belt_input_dirs, inside, mixer, step, tunnel};
use core_problem::Problem;
use tracing::debug;
use z3::ast::{Ast, Bool, Int};

use crate::model::LayoutModel;

impl<'ctx> LayoutModel<'ctx> {
    pub(crate) fn post_all(&mut self, problem: &Problem) {
        let mut clauses = Vec::new();
        clauses.extend(self.domain_clauses());
        clauses.extend(self.orientation_clauses());
        clauses.extend(self.exclusivity_clauses());
        clauses.extend(self.empty_cell_clauses());
        clauses.extend(self.adjacency_clauses());
        clauses.extend(self.border_clauses(problem));
        clauses.extend(self.capacity_clauses());
        clauses.extend(self.belt_clauses());
        clauses.extend(self.mixer_clauses());
        clauses.extend(self.tunnel_clauses());
        clauses.extend(self.plan_clauses(problem));
        clauses.extend(self.gate_clauses(problem));
        clauses.extend(self.pledge_clauses(problem));
        debug!(target: "model", clauses = clauses.len(), "constraints_posted");
        self.clauses = clauses;
    }

    fn cells(&self) -> impl Iterator<Item = (i32, i32)> + use<> {
        let (width, height) = (self.width, self.height);
        (0..height).flat_map(move |y| (0..width).map(move |x| (x, y)))
    }

    /// Flow variables live in `[-max_flow, max_flow]` on both layers.
    fn domain_clauses(&self) -> Vec<Bool<'ctx>> {
        let lo = self.int(-self.max_flow);
        let hi = self.int(self.max_flow);
        let mut out = Vec::new();
        for v in self.surface.iter().chain(self.underground.iter()) {
            out.push(v.ge(&lo));
            out.push(v.le(&hi));
        }
        out
    }

    /// Every cell has exactly one orientation, relevant or not.
    fn orientation_clauses(&self) -> Vec<Bool<'ctx>> {
        let one = self.int(1);
        let mut out = Vec::new();
        for (x, y) in self.cells() {
            let dirs: Vec<&Bool<'ctx>> = core_grid::DIRECTIONS
                .iter()
                .map(|&d| self.dir_at(x, y, d))
                .collect();
            out.push(self.count(&dirs)._eq(&one));
        }
        out
    }

    /// At most one of belt, mixer anchor, mixer companion, entrance, exit
    /// touches a cell. Each neighboring anchor that could claim the cell as
    /// its companion counts separately, so two mixers can never overlap.
    fn exclusivity_clauses(&self) -> Vec<Bool<'ctx>> {
        let one = self.int(1);
        let mut out = Vec::new();
        for (x, y) in self.cells() {
            let mut occupants = vec![
                self.belt_at(x, y).clone(),
                self.mixer_at(x, y).clone(),
                self.tun_in_at(x, y).clone(),
                self.tun_out_at(x, y).clone(),
            ];
            for d in core_grid::DIRECTIONS {
                let (ax, ay) = mixer::anchor(x, y, d);
                if inside(ax, ay, self.width, self.height) {
                    occupants.push(Bool::and(
                        self.ctx,
                        &[self.mixer_at(ax, ay), self.dir_at(ax, ay, d)],
                    ));
                }
            }
            let refs: Vec<&Bool<'ctx>> = occupants.iter().collect();
            out.push(self.count(&refs).le(&one));
        }
        out
    }

    /// Unoccupied cells carry no surface flow at all.
    fn empty_cell_clauses(&self) -> Vec<Bool<'ctx>> {
        let zero = self.int(0);
        let mut out = Vec::new();
        for (x, y) in self.cells() {
            let empty = self.occupied(x, y).not();
            for s in 0..self.sources {
                for d in core_grid::DIRECTIONS {
                    out.push(empty.implies(&self.surface_at(x, y, s, d)._eq(&zero)));
                }
            }
        }
        out
    }

    /// Shared edges agree: what leaves one cell enters its neighbor, on the
    /// surface and underground alike. Posted unconditionally; this is what
    /// turns per-cell contracts into a network.
    fn adjacency_clauses(&self) -> Vec<Bool<'ctx>> {
        let zero = self.int(0);
        let mut out = Vec::new();
        for (x, y) in self.cells() {
            // North and east cover each internal edge exactly once.
            for d in [Dir::North, Dir::East] {
                let (nx, ny) = step(x, y, d);
                if !inside(nx, ny, self.width, self.height) {
                    continue;
                }
                for s in 0..self.sources {
                    let surface = Int::add(
                        self.ctx,
                        &[
                            self.surface_at(x, y, s, d),
                            self.surface_at(nx, ny, s, d.opposite()),
                        ],
                    );
                    out.push(surface._eq(&zero));
                    let underground = Int::add(
                        self.ctx,
                        &[
                            self.underground_at(x, y, s, d),
                            self.underground_at(nx, ny, s, d.opposite()),
                        ],
                    );
                    out.push(underground._eq(&zero));
                }
            }
        }
        out
    }

    /// Boundary edges are closed except where a pledge opens them; the
    /// underground layer is closed everywhere at the border.
    fn border_clauses(&self, problem: &Problem) -> Vec<Bool<'ctx>> {
        let pledged = problem.pledge_map();
        let zero = self.int(0);
        let mut out = Vec::new();
        for (x, y) in self.cells() {
            for d in core_grid::DIRECTIONS {
                let (nx, ny) = step(x, y, d);
                if inside(nx, ny, self.width, self.height) {
                    continue;
                }
                for s in 0..self.sources {
                    if !pledged.contains_key(&(x, y, d, s)) {
                        out.push(self.surface_at(x, y, s, d)._eq(&zero));
                    }
                    out.push(self.underground_at(x, y, s, d)._eq(&zero));
                }
            }
        }
        out
    }

    /// The summed flow of all sources across one edge respects the belt
    /// capacity in either direction.
    fn capacity_clauses(&self) -> Vec<Bool<'ctx>> {
        let lo = self.int(-self.max_flow);
        let hi = self.int(self.max_flow);
        let mut out = Vec::new();
        for (x, y) in self.cells() {
            for d in core_grid::DIRECTIONS {
                let terms: Vec<&Int<'ctx>> = (0..self.sources)
                    .map(|s| self.surface_at(x, y, s, d))
                    .collect();
                let total = Int::add(self.ctx, &terms);
                out.push(total.ge(&lo));
                out.push(total.le(&hi));
            }
        }
        out
    }

    /// A belt conserves each source and moves it from any of three input
    /// sides out through its orientation.
    fn belt_clauses(&self) -> Vec<Bool<'ctx>> {
        let zero = self.int(0);
        let mut out = Vec::new();
        for (x, y) in self.cells() {
            for d in core_grid::DIRECTIONS {
                let placed = Bool::and(self.ctx, &[self.belt_at(x, y), self.dir_at(x, y, d)]);
                for s in 0..self.sources {
                    let around: Vec<&Int<'ctx>> = core_grid::DIRECTIONS
                        .iter()
                        .map(|&di| self.surface_at(x, y, s, di))
                        .collect();
                    out.push(placed.implies(&Int::add(self.ctx, &around)._eq(&zero)));
                    out.push(placed.implies(&self.surface_at(x, y, s, d).le(&zero)));
                    for di in belt_input_dirs(d) {
                        out.push(placed.implies(&self.surface_at(x, y, s, di).ge(&zero)));
                    }
                }
            }
        }
        out
    }

    /// A mixer spans its anchor and companion cells, conserves each source
    /// across the pair, and emits two identical outputs.
    fn mixer_clauses(&self) -> Vec<Bool<'ctx>> {
        let zero = self.int(0);
        let mut out = Vec::new();
        for (x, y) in self.cells() {
            for d in core_grid::DIRECTIONS {
                let placed = Bool::and(self.ctx, &[self.mixer_at(x, y), self.dir_at(x, y, d)]);
                if !mixer::can_place(x, y, d, self.width, self.height) {
                    out.push(placed.not());
                    continue;
                }
                let (cx, cy) = mixer::companion(x, y, d);
                let input = mixer::input_dir(d);
                let output = mixer::output_dir(d);
                for s in 0..self.sources {
                    let a_in = self.surface_at(x, y, s, input);
                    let b_in = self.surface_at(cx, cy, s, input);
                    let a_out = self.surface_at(x, y, s, output);
                    let b_out = self.surface_at(cx, cy, s, output);
                    let balance = Int::add(self.ctx, &[a_in, b_in, a_out, b_out]);
                    out.push(placed.implies(&balance._eq(&zero)));
                    out.push(placed.implies(&a_out._eq(b_out)));
                    out.push(placed.implies(&a_in.ge(&zero)));
                    out.push(placed.implies(&b_in.ge(&zero)));
                    out.push(placed.implies(&a_out.le(&zero)));
                    out.push(placed.implies(&b_out.le(&zero)));
                    for lateral in mixer::zero_dirs(d) {
                        out.push(placed.implies(&self.surface_at(x, y, s, lateral)._eq(&zero)));
                        out.push(placed.implies(&self.surface_at(cx, cy, s, lateral)._eq(&zero)));
                    }
                }
            }
        }
        out
    }

    /// Tunnel endpoints swap flow between the layers; everything else lets
    /// the underground layer pass straight through.
    fn tunnel_clauses(&self) -> Vec<Bool<'ctx>> {
        let zero = self.int(0);
        let mut out = Vec::new();
        for (x, y) in self.cells() {
            for d in core_grid::DIRECTIONS {
                let entrance = Bool::and(self.ctx, &[self.tun_in_at(x, y), self.dir_at(x, y, d)]);
                let flow_dir = tunnel::entrance_flow_dir(d);
                for s in 0..self.sources {
                    // Surface inflow dives into the underground layer.
                    let dive = Int::add(
                        self.ctx,
                        &[
                            self.surface_at(x, y, s, flow_dir),
                            self.underground_at(x, y, s, d),
                        ],
                    );
                    out.push(entrance.implies(&dive._eq(&zero)));
                    out.push(entrance.implies(&self.surface_at(x, y, s, flow_dir).ge(&zero)));
                    out.push(
                        entrance.implies(&self.underground_at(x, y, s, d.opposite())._eq(&zero)),
                    );
                    for dz in tunnel::entrance_zero_dirs(d) {
                        out.push(entrance.implies(&self.surface_at(x, y, s, dz)._eq(&zero)));
                    }
                }
                out.extend(self.crossing_pass_through(&entrance, x, y, d));
                out.push(self.pairing_clause(&entrance, x, y, d));

                let exit = Bool::and(self.ctx, &[self.tun_out_at(x, y), self.dir_at(x, y, d)]);
                for s in 0..self.sources {
                    // Underground inflow surfaces on the orientation side.
                    let surfacing = Int::add(
                        self.ctx,
                        &[
                            self.surface_at(x, y, s, d),
                            self.underground_at(x, y, s, d.opposite()),
                        ],
                    );
                    out.push(exit.implies(&surfacing._eq(&zero)));
                    out.push(exit.implies(&self.surface_at(x, y, s, d).le(&zero)));
                    out.push(exit.implies(&self.underground_at(x, y, s, d)._eq(&zero)));
                    for dz in tunnel::exit_zero_dirs(d) {
                        out.push(exit.implies(&self.surface_at(x, y, s, dz)._eq(&zero)));
                    }
                }
                out.extend(self.crossing_pass_through(&exit, x, y, d));
            }

            // Cells hosting no endpoint pass the underground layer through on
            // both axes.
            let open = Bool::and(
                self.ctx,
                &[
                    &self.tun_in_at(x, y).not(),
                    &self.tun_out_at(x, y).not(),
                ],
            );
            for axis in [Dir::North, Dir::East] {
                for s in 0..self.sources {
                    let through = Int::add(
                        self.ctx,
                        &[
                            self.underground_at(x, y, s, axis),
                            self.underground_at(x, y, s, axis.opposite()),
                        ],
                    );
                    out.push(open.implies(&through._eq(&zero)));
                }
            }
        }
        out
    }

    /// An endpoint occupies one axis of the underground layer; tunnels on the
    /// perpendicular axis still pass underneath it.
    fn crossing_pass_through(
        &self,
        endpoint: &Bool<'ctx>,
        x: i32,
        y: i32,
        d: Dir,
    ) -> Vec<Bool<'ctx>> {
        let zero = self.int(0);
        let axis = d.perpendicular()[0];
        let mut out = Vec::new();
        for s in 0..self.sources {
            let through = Int::add(
                self.ctx,
                &[
                    self.underground_at(x, y, s, axis),
                    self.underground_at(x, y, s, axis.opposite()),
                ],
            );
            out.push(endpoint.implies(&through._eq(&zero)));
        }
        out
    }

    /// An entrance must see a matching exit within the gap limit, with no
    /// other tunnel endpoint buried in between (two tunnels cannot overlap).
    fn pairing_clause(&self, entrance: &Bool<'ctx>, x: i32, y: i32, d: Dir) -> Bool<'ctx> {
        let mut options = Vec::new();
        for gap in 0..=self.max_gap {
            let (ex, ey) = tunnel::exit_cell(x, y, d, gap);
            if !inside(ex, ey, self.width, self.height) {
                break;
            }
            let mut terms = vec![
                self.tun_out_at(ex, ey).clone(),
                self.dir_at(ex, ey, d).clone(),
            ];
            for between in 0..gap {
                let (bx, by) = tunnel::exit_cell(x, y, d, between);
                terms.push(self.tun_in_at(bx, by).not());
                terms.push(self.tun_out_at(bx, by).not());
            }
            let refs: Vec<&Bool<'ctx>> = terms.iter().collect();
            options.push(Bool::and(self.ctx, &refs));
        }
        if options.is_empty() {
            return entrance.not();
        }
        let refs: Vec<&Bool<'ctx>> = options.iter().collect();
        entrance.implies(&Bool::or(self.ctx, &refs))
    }

    /// Optional mixer-network plan: every planned kind is placed exactly
    /// once, and a mixer of a given kind carries exactly the declared source
    /// streams on its input and output sides.
    fn plan_clauses(&self, problem: &Problem) -> Vec<Bool<'ctx>> {
        let Some(plan) = &problem.plan else {
            return Vec::new();
        };
        let zero = self.int(0);
        let one = self.int(1);
        let minus_one = self.int(-1);
        let mut out = Vec::new();

        for (x, y) in self.cells() {
            // A placed mixer has exactly one kind; a free cell has none.
            let kinds: Vec<&Bool<'ctx>> =
                (0..self.kinds).map(|k| self.mixer_kind_at(x, y, k)).collect();
            let tagged = self.count(&kinds);
            let placed = self.mixer_at(x, y).ite(&one, &zero);
            out.push(tagged._eq(&placed));
        }
        for k in 0..self.kinds {
            let everywhere: Vec<&Bool<'ctx>> = self
                .cells()
                .map(|(x, y)| self.mixer_kind_at(x, y, k))
                .collect();
            out.push(self.count(&everywhere)._eq(&one));
        }

        for (x, y) in self.cells() {
            for d in core_grid::DIRECTIONS {
                if !mixer::can_place(x, y, d, self.width, self.height) {
                    continue;
                }
                let (cx, cy) = mixer::companion(x, y, d);
                let input = mixer::input_dir(d);
                let output = mixer::output_dir(d);
                for (k, kind) in plan.kinds.iter().enumerate() {
                    let tagged = Bool::and(
                        self.ctx,
                        &[self.mixer_kind_at(x, y, k), self.dir_at(x, y, d)],
                    );
                    for s in 0..self.sources {
                        let a_in = self.surface_at(x, y, s, input);
                        let b_in = self.surface_at(cx, cy, s, input);
                        let a_out = self.surface_at(x, y, s, output);
                        let b_out = self.surface_at(cx, cy, s, output);
                        if kind.inputs.contains(&s) {
                            // The declared stream must actually arrive.
                            let total = Int::add(self.ctx, &[a_in, b_in]);
                            out.push(tagged.implies(&total.ge(&one)));
                        } else {
                            out.push(tagged.implies(&a_in._eq(&zero)));
                            out.push(tagged.implies(&b_in._eq(&zero)));
                        }
                        if kind.outputs.contains(&s) {
                            let total = Int::add(self.ctx, &[a_out, b_out]);
                            out.push(tagged.implies(&total.le(&minus_one)));
                        } else {
                            out.push(tagged.implies(&a_out._eq(&zero)));
                            out.push(tagged.implies(&b_out._eq(&zero)));
                        }
                    }
                }
            }
        }
        out
    }

    /// Feature gates remove whole component families from the search space.
    fn gate_clauses(&self, problem: &Problem) -> Vec<Bool<'ctx>> {
        let mut out = Vec::new();
        if problem.gates.disable_belt {
            for b in &self.belt {
                out.push(b.not());
            }
        }
        if problem.gates.disable_underground {
            for t in self.tun_in.iter().chain(self.tun_out.iter()) {
                out.push(t.not());
            }
        }
        out
    }

    /// Each pledge pins one boundary flow exactly.
    fn pledge_clauses(&self, problem: &Problem) -> Vec<Bool<'ctx>> {
        problem
            .pledge_map()
            .into_iter()
            .map(|((x, y, d, s), value)| self.surface_at(x, y, s, d)._eq(&self.int(value)))
            .collect()
    }
}
