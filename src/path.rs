use std::collections::HashSet;

use crate::agent::QTable;
use crate::grid::{Action, Grid, Pos};

/// Greedily walk the learned table from start, returning the route the agent
/// currently believes optimal
///
/// This is a read-only projection of the policy, not a real episode: traps and
/// bonuses are not triggered, and nothing is mutated. The walk stops when the
/// target (or any terminal cell) is reached, when a position repeats, when the
/// best move is blocked, when a state has never been visited, or after
/// `max_steps`. With an untrained table this returns just the start position.
pub fn extract(grid: &Grid, table: &QTable, allowed: &[Action], max_steps: usize) -> Vec<Pos> {
    let mut pos = grid.start();
    let mut path = vec![pos];
    let mut visited = HashSet::from([pos]);

    for _ in 0..max_steps {
        if !table.contains(pos) {
            break;
        }
        let Some(action) = table.best_action(pos, allowed) else {
            break;
        };
        let (next, blocked) = grid.probe(pos, action);
        if blocked {
            // a well-trained table never prefers a wall, but the guard keeps
            // degenerate tables from spinning in place
            break;
        }
        path.push(next);
        if grid.cell(next).is_terminal() || !visited.insert(next) {
            break;
        }
        pos = next;
    }

    path
}

/// Step budget for [`extract`]: generous enough for any simple route
pub fn step_budget(grid: &Grid) -> usize {
    (grid.width() * grid.height() * 4) as usize
}
