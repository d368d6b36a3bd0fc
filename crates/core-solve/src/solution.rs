//! Reading a satisfying assignment back out of the solver.

use core_grid::{Component, Dir, Layout, inside, mixer};
use z3::ast::{Bool, Int};

use crate::SolveError;
use crate::model::LayoutModel;

/// A solved placement plus the flow values that justify it.
#[derive(Debug, Clone)]
pub struct Solution {
    layout: Layout,
    objective: Option<i64>,
    sources: usize,
    surface: Vec<i64>,
    underground: Vec<i64>,
}

impl Solution {
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Weighted component count of this assignment.
    pub fn objective(&self) -> Option<i64> {
        self.objective
    }

    pub fn sources(&self) -> usize {
        self.sources
    }

    fn flow_index(&self, x: i32, y: i32, s: usize, d: Dir) -> usize {
        assert!(
            inside(x, y, self.layout.width(), self.layout.height()),
            "flow query outside the grid"
        );
        assert!(s < self.sources, "flow query outside the source range");
        ((y * self.layout.width() + x) as usize * self.sources + s) * 4 + d.index()
    }

    /// Signed surface flow crossing the `d` edge of `(x, y)` for source `s`;
    /// positive enters the cell.
    pub fn surface_flow(&self, x: i32, y: i32, s: usize, d: Dir) -> i64 {
        self.surface[self.flow_index(x, y, s, d)]
    }

    /// Same sign convention, underground layer.
    pub fn underground_flow(&self, x: i32, y: i32, s: usize, d: Dir) -> i64 {
        self.underground[self.flow_index(x, y, s, d)]
    }
}

fn eval_bool<'ctx>(assignment: &z3::Model<'ctx>, literal: &Bool<'ctx>) -> Result<bool, SolveError> {
    assignment
        .eval(literal, true)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| SolveError::Extraction(format!("boolean {literal:?} has no value")))
}

fn eval_int<'ctx>(assignment: &z3::Model<'ctx>, term: &Int<'ctx>) -> Result<i64, SolveError> {
    assignment
        .eval(term, true)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| SolveError::Extraction(format!("integer {term:?} has no value")))
}

/// Walk the assignment and produce one component record per cell, first
/// match wins: belt, mixer anchor, mixer companion, entrance, exit, empty.
pub(crate) fn extract<'ctx>(
    model: &LayoutModel<'ctx>,
    assignment: &z3::Model<'ctx>,
) -> Result<Solution, SolveError> {
    let mut layout = Layout::new(model.width, model.height);
    for y in 0..model.height {
        for x in 0..model.width {
            let component = classify(model, assignment, x, y)?;
            layout.set(x, y, component);
        }
    }

    let mut surface = Vec::with_capacity(model.surface.len());
    for term in &model.surface {
        surface.push(eval_int(assignment, term)?);
    }
    let mut underground = Vec::with_capacity(model.underground.len());
    for term in &model.underground {
        underground.push(eval_int(assignment, term)?);
    }
    let objective = eval_int(assignment, &model.cost())?;

    Ok(Solution {
        layout,
        objective: Some(objective),
        sources: model.sources,
        surface,
        underground,
    })
}

fn orientation<'ctx>(
    model: &LayoutModel<'ctx>,
    assignment: &z3::Model<'ctx>,
    x: i32,
    y: i32,
) -> Result<Dir, SolveError> {
    for d in core_grid::DIRECTIONS {
        if eval_bool(assignment, model.dir_at(x, y, d))? {
            return Ok(d);
        }
    }
    Err(SolveError::Extraction(format!(
        "cell ({x}, {y}) has no orientation"
    )))
}

fn classify<'ctx>(
    model: &LayoutModel<'ctx>,
    assignment: &z3::Model<'ctx>,
    x: i32,
    y: i32,
) -> Result<Component, SolveError> {
    if eval_bool(assignment, model.belt_at(x, y))? {
        return Ok(Component::Belt(orientation(model, assignment, x, y)?));
    }
    if eval_bool(assignment, model.mixer_at(x, y))? {
        return Ok(Component::MixerAnchor(orientation(model, assignment, x, y)?));
    }
    for d in core_grid::DIRECTIONS {
        let (ax, ay) = mixer::anchor(x, y, d);
        if inside(ax, ay, model.width, model.height)
            && eval_bool(assignment, model.mixer_at(ax, ay))?
            && eval_bool(assignment, model.dir_at(ax, ay, d))?
        {
            return Ok(Component::MixerCompanion(d));
        }
    }
    if eval_bool(assignment, model.tun_in_at(x, y))? {
        return Ok(Component::TunnelEntrance(orientation(model, assignment, x, y)?));
    }
    if eval_bool(assignment, model.tun_out_at(x, y))? {
        return Ok(Component::TunnelExit(orientation(model, assignment, x, y)?));
    }
    Ok(Component::Empty)
}
