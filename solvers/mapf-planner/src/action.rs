//! C8: target-cell to action translation, plus the follow-check cascade.

use std::collections::HashMap;

use mapf_core::{Action, Cell, Orientation};

use crate::grid::Grid;

/// Translate one agent's `(prev_location, orientation, next_target)` into
/// the single action that would carry it there, ignoring any other agent.
/// The follow-check pass (see [`resolve_follow_safety`]) may still demote
/// this to `Wait` afterward.
pub fn project_action(grid: &Grid, prev_location: Cell, orientation: Orientation, next_target: Cell) -> Action {
    if next_target == prev_location {
        return Action::Wait;
    }

    let Some(dir) = grid.direction_between(prev_location, next_target) else {
        // Not adjacent: shouldn't happen for a well-formed PIBT output, but
        // waiting in place is always safe.
        return Action::Wait;
    };
    let facing = crate::grid::Direction::from_orientation(orientation);

    if dir == facing {
        Action::Forward
    } else if dir == facing.clockwise() {
        Action::ClockwiseRotate
    } else if dir == facing.counter_clockwise() {
        Action::CounterClockwiseRotate
    } else {
        // 180 degrees: two rotations needed either way, pick one
        // deterministically.
        Action::ClockwiseRotate
    }
}

/// Demote a trailing agent's `Forward` to `Wait` when the agent ahead of it
/// isn't actually vacating its cell this tick. Two adjacent agents both
/// choosing `Forward` into the lead agent's cell is only safe if the lead
/// agent moves; since demotion can cascade (the leader's leader might also
/// be staying put), this is a memoized DFS over the `prev_location → agent`
/// map rather than a single linear pass.
pub fn resolve_follow_safety(actions: &mut [Action], prev_locations: &[Cell], next_targets: &[Cell]) {
    let occupant_of: HashMap<Cell, usize> =
        prev_locations.iter().enumerate().map(|(i, &loc)| (loc, i)).collect();

    let mut resolved = vec![false; actions.len()];

    fn settle(
        agent: usize,
        actions: &mut [Action],
        prev_locations: &[Cell],
        next_targets: &[Cell],
        occupant_of: &HashMap<Cell, usize>,
        resolved: &mut [bool],
        visiting: &mut [bool],
    ) -> Action {
        if resolved[agent] {
            return actions[agent];
        }
        if actions[agent] != Action::Forward {
            resolved[agent] = true;
            return actions[agent];
        }
        if visiting[agent] {
            // A rotation cycle (agents forming a closed loop) is not a
            // follow dependency; leave it as Forward.
            resolved[agent] = true;
            return actions[agent];
        }
        visiting[agent] = true;

        let target = next_targets[agent];
        if let Some(&leader) = occupant_of.get(&target) {
            if leader != agent {
                let leader_action = settle(
                    leader,
                    actions,
                    prev_locations,
                    next_targets,
                    occupant_of,
                    resolved,
                    visiting,
                );
                if leader_action != Action::Forward {
                    actions[agent] = Action::Wait;
                }
            }
        }

        visiting[agent] = false;
        resolved[agent] = true;
        actions[agent]
    }

    let mut visiting = vec![false; actions.len()];
    for agent in 0..actions.len() {
        settle(
            agent,
            actions,
            prev_locations,
            next_targets,
            &occupant_of,
            &mut resolved,
            &mut visiting,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    fn open_grid(rows: u32, cols: u32) -> Grid {
        Grid::from_obstacle_mask(rows, cols, &vec![false; (rows * cols) as usize])
    }

    #[test]
    fn same_cell_is_wait() {
        let grid = open_grid(3, 3);
        assert_eq!(project_action(&grid, 4, Orientation::East, 4), Action::Wait);
    }

    #[test]
    fn forward_when_facing_target() {
        let grid = open_grid(1, 5);
        assert_eq!(project_action(&grid, 0, Orientation::East, 1), Action::Forward);
    }

    #[test]
    fn clockwise_rotate_toward_south_when_facing_east() {
        let grid = open_grid(3, 3);
        // loc 4 center, facing east; loc 7 is south of it.
        assert_eq!(project_action(&grid, 4, Orientation::East, 7), Action::ClockwiseRotate);
    }

    #[test]
    fn counter_clockwise_rotate_toward_north_when_facing_east() {
        let grid = open_grid(3, 3);
        // loc 4 center, facing east; loc 1 is north of it.
        assert_eq!(project_action(&grid, 4, Orientation::East, 1), Action::CounterClockwiseRotate);
    }

    #[test]
    fn about_face_resolves_to_clockwise() {
        let grid = open_grid(1, 5);
        // Facing east but target is west: 180 degrees.
        assert_eq!(project_action(&grid, 2, Orientation::East, 1), Action::ClockwiseRotate);
    }

    #[test]
    fn trailing_forward_demoted_when_leader_waits() {
        // Leader at cell 1 waits (stays put); follower at cell 0 wanted to
        // move Forward into cell 1.
        let mut actions = vec![Action::Forward, Action::Wait];
        let prev_locations = vec![0, 1];
        let next_targets = vec![1, 1];
        resolve_follow_safety(&mut actions, &prev_locations, &next_targets);
        assert_eq!(actions[0], Action::Wait);
    }

    #[test]
    fn trailing_forward_preserved_when_leader_moves() {
        let mut actions = vec![Action::Forward, Action::Forward];
        let prev_locations = vec![0, 1];
        let next_targets = vec![1, 2];
        resolve_follow_safety(&mut actions, &prev_locations, &next_targets);
        assert_eq!(actions[0], Action::Forward);
        assert_eq!(actions[1], Action::Forward);
    }

    #[test]
    fn cascades_through_a_three_agent_chain() {
        // 0 -> 1 -> 2, all Forward, but agent 2 is actually Waiting.
        let mut actions = vec![Action::Forward, Action::Forward, Action::Wait];
        let prev_locations = vec![0, 1, 2];
        let next_targets = vec![1, 2, 2];
        resolve_follow_safety(&mut actions, &prev_locations, &next_targets);
        assert_eq!(actions[1], Action::Wait);
        assert_eq!(actions[0], Action::Wait);
    }
}
