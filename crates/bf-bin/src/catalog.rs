//! The balancer catalog: named problem instances ready to solve.
//!
//! Flows are scaled integers chosen so every output share stays integral;
//! the pledge ratios are what matters, not the absolute values.

use core_grid::Dir;
use core_problem::{Pledge, Problem};

pub struct CatalogEntry {
    pub name: &'static str,
    pub summary: &'static str,
    build: fn() -> Problem,
}

impl CatalogEntry {
    pub fn build(&self) -> Problem {
        (self.build)()
    }
}

const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        name: "belts_3_3",
        summary: "single stream routed across a 3x3 grid, belts only",
        build: belts_3_3,
    },
    CatalogEntry {
        name: "mixer_2_1",
        summary: "two sources mixed in a single splitter",
        build: mixer_2_1,
    },
    CatalogEntry {
        name: "balancer_2_2",
        summary: "2-2 balancer on a 2x3 grid",
        build: balancer_2_2,
    },
    CatalogEntry {
        name: "underground_2",
        summary: "two crossing streams forced through tunnels",
        build: underground_2,
    },
    CatalogEntry {
        name: "balancer_3_3",
        summary: "3-3 balancer on a 6x6 grid",
        build: balancer_3_3,
    },
    CatalogEntry {
        name: "balancer_4_4",
        summary: "4-4 balancer on a 4x8 grid",
        build: balancer_4_4,
    },
    CatalogEntry {
        name: "balancer_6_6",
        summary: "6-6 balancer on an 8x9 grid, first feasible layout",
        build: balancer_6_6,
    },
    CatalogEntry {
        name: "balancer_8_8",
        summary: "8-8 balancer on an 8x10 grid, first feasible layout",
        build: balancer_8_8,
    },
];

pub fn entries() -> &'static [CatalogEntry] {
    ENTRIES
}

pub fn build(name: &str) -> Option<Problem> {
    ENTRIES.iter().find(|e| e.name == name).map(CatalogEntry::build)
}

/// `count` inputs of `flow` each along the south border starting at `x0`,
/// one source per cell.
fn south_inputs(x0: i32, count: usize, flow: i64) -> Vec<Pledge> {
    (0..count)
        .map(|s| Pledge::new(x0 + s as i32, 0, Dir::South, s, flow))
        .collect()
}

/// `count` outputs along the north border of a grid `height` tall starting
/// at `x0`, each draining an equal share of every source.
fn north_outputs(x0: i32, count: usize, height: i32, sources: usize, share: i64) -> Vec<Pledge> {
    let mut pledges = Vec::with_capacity(count * sources);
    for i in 0..count {
        for s in 0..sources {
            pledges.push(Pledge::new(x0 + i as i32, height - 1, Dir::North, s, -share));
        }
    }
    pledges
}

fn belts_3_3() -> Problem {
    let mut problem = Problem::new(
        3,
        3,
        1,
        vec![
            Pledge::new(0, 0, Dir::South, 0, 1),
            Pledge::new(0, 2, Dir::North, 0, -1),
        ],
        1,
    );
    problem.gates.disable_underground = true;
    problem
}

fn mixer_2_1() -> Problem {
    let mut pledges = south_inputs(0, 2, 2);
    pledges.extend(north_outputs(0, 2, 1, 2, 1));
    Problem::new(2, 1, 2, pledges, 2)
}

fn balancer_2_2() -> Problem {
    let mut pledges = south_inputs(0, 2, 2);
    pledges.extend(north_outputs(0, 2, 3, 2, 1));
    Problem::new(2, 3, 2, pledges, 2)
}

fn underground_2() -> Problem {
    Problem::new(
        5,
        6,
        2,
        vec![
            Pledge::new(2, 0, Dir::South, 0, 1),
            Pledge::new(3, 0, Dir::South, 1, 1),
            Pledge::new(3, 5, Dir::North, 0, -1),
            Pledge::new(2, 5, Dir::North, 1, -1),
        ],
        1,
    )
}

fn balancer_3_3() -> Problem {
    let mut pledges = south_inputs(0, 3, 24);
    pledges.extend(north_outputs(1, 3, 6, 3, 8));
    Problem::new(6, 6, 3, pledges, 24)
}

fn balancer_4_4() -> Problem {
    let mut pledges = south_inputs(0, 4, 16);
    pledges.extend(north_outputs(0, 4, 8, 4, 4));
    Problem::new(4, 8, 4, pledges, 16)
}

fn balancer_6_6() -> Problem {
    let mut pledges = south_inputs(2, 6, 24);
    pledges.extend(north_outputs(2, 6, 9, 6, 4));
    let mut problem = Problem::new(8, 9, 6, pledges, 24);
    problem.options.feasible_ok = true;
    problem
}

fn balancer_8_8() -> Problem {
    let mut pledges = south_inputs(0, 8, 8);
    pledges.extend(north_outputs(0, 8, 10, 8, 1));
    let mut problem = Problem::new(8, 10, 8, pledges, 8);
    problem.options.feasible_ok = true;
    problem
}
