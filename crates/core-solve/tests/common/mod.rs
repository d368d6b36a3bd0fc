#![allow(dead_code)] // Shared across several integration tests; each binary uses a subset.

use core_grid::{Component, DIRECTIONS, Dir, belt_input_dirs, inside, mixer, step, tunnel};
use core_problem::Problem;
use core_solve::Solution;

/// Check every law a satisfying assignment must obey: exclusivity and mixer
/// pairing, adjacency and border closure on both layers, capacity, component
/// flow contracts, tunnel coupling, pass-through, and pledge satisfaction.
pub fn assert_invariants(problem: &Problem, solution: &Solution) {
    let layout = solution.layout();
    let (w, h) = (layout.width(), layout.height());
    let pledged = problem.pledge_map();

    for y in 0..h {
        for x in 0..w {
            let component = layout.get(x, y);

            match component {
                Component::MixerAnchor(d) => {
                    let (cx, cy) = mixer::companion(x, y, d);
                    assert!(inside(cx, cy, w, h), "mixer at ({x}, {y}) hangs off the grid");
                    assert_eq!(
                        layout.get(cx, cy),
                        Component::MixerCompanion(d),
                        "mixer at ({x}, {y}) lacks its companion"
                    );
                }
                Component::MixerCompanion(d) => {
                    let (ax, ay) = mixer::anchor(x, y, d);
                    assert_eq!(
                        layout.get(ax, ay),
                        Component::MixerAnchor(d),
                        "companion at ({x}, {y}) lacks its anchor"
                    );
                }
                _ => {}
            }

            for s in 0..problem.sources {
                for d in DIRECTIONS {
                    let f = solution.surface_flow(x, y, s, d);
                    let u = solution.underground_flow(x, y, s, d);
                    let (nx, ny) = step(x, y, d);
                    if inside(nx, ny, w, h) {
                        assert_eq!(
                            f + solution.surface_flow(nx, ny, s, d.opposite()),
                            0,
                            "surface edge ({x}, {y}) {d:?} disagrees with its neighbor"
                        );
                        assert_eq!(
                            u + solution.underground_flow(nx, ny, s, d.opposite()),
                            0,
                            "underground edge ({x}, {y}) {d:?} disagrees with its neighbor"
                        );
                    } else {
                        let expected = pledged.get(&(x, y, d, s)).copied().unwrap_or(0);
                        assert_eq!(
                            f, expected,
                            "border edge ({x}, {y}) {d:?} source {s} broke its pledge"
                        );
                        assert_eq!(u, 0, "underground reaches the border at ({x}, {y}) {d:?}");
                    }
                    if component == Component::Empty {
                        assert_eq!(f, 0, "empty cell ({x}, {y}) carries surface flow");
                    }
                }
            }

            for d in DIRECTIONS {
                let total: i64 = (0..problem.sources)
                    .map(|s| solution.surface_flow(x, y, s, d))
                    .sum();
                assert!(
                    total.abs() <= problem.max_flow,
                    "edge ({x}, {y}) {d:?} exceeds capacity: {total}"
                );
            }

            match component {
                Component::Belt(d) => assert_belt(problem, solution, x, y, d),
                Component::MixerAnchor(d) => assert_mixer(problem, solution, x, y, d),
                Component::TunnelEntrance(d) => {
                    assert_entrance(problem, solution, x, y, d);
                    assert_paired_exit(problem, solution, x, y, d);
                }
                Component::TunnelExit(d) => assert_exit(problem, solution, x, y, d),
                Component::Empty | Component::MixerCompanion(_) => {}
            }

            if !matches!(
                component,
                Component::TunnelEntrance(_) | Component::TunnelExit(_)
            ) {
                for s in 0..problem.sources {
                    for axis in [Dir::North, Dir::East] {
                        assert_eq!(
                            solution.underground_flow(x, y, s, axis)
                                + solution.underground_flow(x, y, s, axis.opposite()),
                            0,
                            "underground does not pass through ({x}, {y})"
                        );
                    }
                }
            }
        }
    }

    assert_cost_consistent(solution);
}

fn assert_belt(problem: &Problem, solution: &Solution, x: i32, y: i32, d: Dir) {
    for s in 0..problem.sources {
        let around: i64 = DIRECTIONS
            .iter()
            .map(|&di| solution.surface_flow(x, y, s, di))
            .sum();
        assert_eq!(around, 0, "belt at ({x}, {y}) does not conserve source {s}");
        assert!(solution.surface_flow(x, y, s, d) <= 0);
        for di in belt_input_dirs(d) {
            assert!(solution.surface_flow(x, y, s, di) >= 0);
        }
    }
}

fn assert_mixer(problem: &Problem, solution: &Solution, x: i32, y: i32, d: Dir) {
    let (cx, cy) = mixer::companion(x, y, d);
    let input = mixer::input_dir(d);
    for s in 0..problem.sources {
        let a_in = solution.surface_flow(x, y, s, input);
        let b_in = solution.surface_flow(cx, cy, s, input);
        let a_out = solution.surface_flow(x, y, s, d);
        let b_out = solution.surface_flow(cx, cy, s, d);
        assert_eq!(a_in + b_in + a_out + b_out, 0, "mixer at ({x}, {y}) leaks source {s}");
        assert_eq!(a_out, b_out, "mixer at ({x}, {y}) emits uneven outputs for source {s}");
        assert!(a_in >= 0 && b_in >= 0 && a_out <= 0);
        for lateral in mixer::zero_dirs(d) {
            assert_eq!(solution.surface_flow(x, y, s, lateral), 0);
            assert_eq!(solution.surface_flow(cx, cy, s, lateral), 0);
        }
    }
}

fn assert_entrance(problem: &Problem, solution: &Solution, x: i32, y: i32, d: Dir) {
    let flow_dir = tunnel::entrance_flow_dir(d);
    for s in 0..problem.sources {
        assert_eq!(
            solution.surface_flow(x, y, s, flow_dir),
            -solution.underground_flow(x, y, s, d),
            "entrance at ({x}, {y}) does not dive source {s}"
        );
        assert_eq!(solution.underground_flow(x, y, s, d.opposite()), 0);
        for dz in tunnel::entrance_zero_dirs(d) {
            assert_eq!(solution.surface_flow(x, y, s, dz), 0);
        }
    }
}

fn assert_exit(problem: &Problem, solution: &Solution, x: i32, y: i32, d: Dir) {
    for s in 0..problem.sources {
        assert_eq!(
            solution.surface_flow(x, y, s, d),
            -solution.underground_flow(x, y, s, d.opposite()),
            "exit at ({x}, {y}) does not surface source {s}"
        );
        assert_eq!(solution.underground_flow(x, y, s, d), 0);
        for dz in tunnel::exit_zero_dirs(d) {
            assert_eq!(solution.surface_flow(x, y, s, dz), 0);
        }
    }
}

/// A matching exit lies within the gap limit and no other tunnel endpoint
/// sits strictly between the pair.
fn assert_paired_exit(problem: &Problem, solution: &Solution, x: i32, y: i32, d: Dir) {
    let layout = solution.layout();
    for gap in 0..=problem.max_gap {
        let (ex, ey) = tunnel::exit_cell(x, y, d, gap);
        if !inside(ex, ey, layout.width(), layout.height()) {
            break;
        }
        match layout.get(ex, ey) {
            Component::TunnelExit(exit_dir) if exit_dir == d => return,
            Component::TunnelEntrance(_) | Component::TunnelExit(_) => break,
            _ => {}
        }
    }
    panic!("entrance at ({x}, {y}) facing {d:?} has no reachable exit");
}

/// Component census of a layout: belts, mixers, entrances, exits.
pub fn census(solution: &Solution) -> (usize, usize, usize, usize) {
    let layout = solution.layout();
    (
        layout.count(|c| matches!(c, Component::Belt(_))),
        layout.count(|c| matches!(c, Component::MixerAnchor(_))),
        layout.count(|c| matches!(c, Component::TunnelEntrance(_))),
        layout.count(|c| matches!(c, Component::TunnelExit(_))),
    )
}

/// The reported objective matches the weighted component count of the
/// extracted layout.
pub fn assert_cost_consistent(solution: &Solution) {
    let (belts, mixers, entrances, exits) = census(solution);
    let expected = belts as i64 + 5 * mixers as i64 + 2 * entrances as i64 + 2 * exits as i64;
    assert_eq!(solution.objective(), Some(expected));
}
