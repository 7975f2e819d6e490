use log::warn;
use rand::seq::{IteratorRandom, SliceRandom};
use rand::{thread_rng, Rng};

use crate::error::Result;
use crate::grid::{Cell, Grid, Pos};

/// Attempts at a fresh carve before falling back to a guaranteed corridor
const MAX_ATTEMPTS: usize = 8;

/// Produces random solvable wall layouts via randomized depth-first carving
///
/// Start is placed at the top-left corner and target at the bottom-right, both
/// connected to the carved body. Every returned grid passes a flood-fill
/// solvability check.
#[derive(Clone, Debug)]
pub struct MazeGenerator {
    /// Fraction of interior cells considered for extra loop openings, so the
    /// maze is not a perfect tree
    loop_fraction: f64,
}

impl Default for MazeGenerator {
    fn default() -> Self {
        Self { loop_fraction: 0.1 }
    }
}

impl MazeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loop_fraction(fraction: f64) -> Self {
        Self {
            loop_fraction: fraction.clamp(0.0, 1.0),
        }
    }

    /// Generate a solvable maze of the given dimensions
    ///
    /// Grids too small to carve (a side below 4) degrade to the cleared
    /// layout, which is trivially solvable.
    pub fn generate(&self, width: i32, height: i32) -> Result<Grid> {
        if width < 4 || height < 4 {
            return Grid::new(width, height);
        }

        for _ in 0..MAX_ATTEMPTS {
            let grid = Grid::from_rows(width, height, self.carve(width, height))?;
            if grid.target_reachable() {
                return Ok(grid);
            }
        }

        // Practically unreachable given the corner connections, but the
        // solvability guarantee must not depend on luck.
        warn!("maze carving produced unsolvable layouts; punching a corridor");
        let mut rows = self.carve(width, height);
        for x in 1..width as usize {
            rows[0][x] = Cell::Empty;
        }
        for y in 1..(height - 1) as usize {
            rows[y][width as usize - 1] = Cell::Empty;
        }
        Grid::from_rows(width, height, rows)
    }

    /// Randomized-DFS carve over the odd lattice, plus loop openings and the
    /// corner connections
    fn carve(&self, width: i32, height: i32) -> Vec<Vec<Cell>> {
        let (w, h) = (width as usize, height as usize);
        let mut rng = thread_rng();
        let mut rows = vec![vec![Cell::Wall; w]; h];

        rows[1][1] = Cell::Empty;
        let mut stack = vec![Pos::new(1, 1)];
        let mut visited = std::collections::HashSet::from([(1, 1)]);
        while let Some(&cur) = stack.last() {
            let neighbors: Vec<(i32, i32)> = [(0, 2), (0, -2), (2, 0), (-2, 0)]
                .iter()
                .map(|&(dx, dy)| (cur.x + dx, cur.y + dy))
                .filter(|&(nx, ny)| {
                    nx > 0 && nx < width - 1 && ny > 0 && ny < height - 1
                })
                .filter(|n| !visited.contains(n))
                .collect();

            match neighbors.choose(&mut rng) {
                Some(&(nx, ny)) => {
                    // knock out the wall between the two lattice cells
                    let (mx, my) = ((cur.x + nx) / 2, (cur.y + ny) / 2);
                    rows[my as usize][mx as usize] = Cell::Empty;
                    rows[ny as usize][nx as usize] = Cell::Empty;
                    visited.insert((nx, ny));
                    stack.push(Pos::new(nx, ny));
                }
                None => {
                    stack.pop();
                }
            }
        }

        let openings = ((width * height) as f64 * self.loop_fraction) as usize;
        for _ in 0..openings {
            let x = rng.gen_range(1..w - 1);
            let y = rng.gen_range(1..h - 1);
            if rows[y][x] != Cell::Wall {
                continue;
            }
            let open_neighbors = [(0i32, 1i32), (0, -1), (1, 0), (-1, 0)]
                .iter()
                .filter(|&&(dx, dy)| {
                    rows[(y as i32 + dy) as usize][(x as i32 + dx) as usize] == Cell::Empty
                })
                .count();
            if open_neighbors >= 2 {
                rows[y][x] = Cell::Empty;
            }
        }

        // connect the start corner to the carved body
        rows[0][0] = Cell::Start;
        rows[0][1] = Cell::Empty;
        rows[1][1] = Cell::Empty;

        // and the target corner, from both sides
        rows[h - 1][w - 1] = Cell::Target;
        rows[h - 2][w - 1] = Cell::Empty;
        rows[h - 3][w - 1] = Cell::Empty;
        rows[h - 1][w - 2] = Cell::Empty;
        rows[h - 1][w - 3] = Cell::Empty;

        rows
    }
}

/// Pick a uniformly random empty interior cell, if any
///
/// Handy for tests and for sprinkling traps or bonuses over a fresh maze.
pub fn random_empty_cell(grid: &Grid) -> Option<Pos> {
    let mut rng = thread_rng();
    (0..grid.height())
        .flat_map(|y| (0..grid.width()).map(move |x| Pos::new(x, y)))
        .filter(|&p| grid.cell(p) == Cell::Empty)
        .choose(&mut rng)
}
