use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use strum::VariantArray;

use crate::error::{Error, Result};

/// Smallest supported grid side length.
pub const MIN_DIM: i32 = 3;
/// Largest supported grid side length.
pub const MAX_DIM: i32 = 500;

/// Bonus value assumed when a cell is painted as a bare `"bonus"` without an
/// explicit amount.
pub const DEFAULT_BONUS_VALUE: f64 = 20.0;

/// A cell position, bounds-checked against the owning [`Grid`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The four discrete moves, in fixed tie-break priority order
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, VariantArray, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
}

impl Action {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

/// One grid cell
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Cell {
    Empty,
    Wall,
    Start,
    Target,
    Trap,
    Bonus(f64),
}

impl Cell {
    /// Whether entering this cell ends the episode
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Target | Self::Trap)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::Wall => f.write_str("wall"),
            Self::Start => f.write_str("start"),
            Self::Target => f.write_str("target"),
            Self::Trap => f.write_str("trap"),
            Self::Bonus(v) => write!(f, "bonus:{v}"),
        }
    }
}

impl FromStr for Cell {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let cell = match s {
            "empty" => Self::Empty,
            "wall" => Self::Wall,
            "start" => Self::Start,
            "target" => Self::Target,
            "trap" => Self::Trap,
            "bonus" => Self::Bonus(DEFAULT_BONUS_VALUE),
            other => match other.strip_prefix("bonus:") {
                Some(v) => Self::Bonus(
                    v.parse::<f64>()
                        .map_err(|_| Error::UnknownCell(other.to_owned()))?,
                ),
                None => return Err(Error::UnknownCell(other.to_owned())),
            },
        };
        Ok(cell)
    }
}

// Cells travel as the visualizer's legacy strings ("empty", "wall",
// "bonus:20", ...) rather than as a tagged object.
impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Reward parameters applied mechanically by [`Grid::step`]
///
/// The controller derives this from the active hyperparameters and reward
/// strategy, so shaping policy stays out of the grid.
#[derive(Clone, Copy, Debug)]
pub struct RewardSpec {
    pub step_penalty: f64,
    pub target_reward: f64,
    pub trap_penalty: f64,
    pub bonus_multiplier: f64,
    pub bonus_floor: f64,
}

/// Outcome of a single transition
#[derive(Clone, Copy, Debug)]
pub struct Transition {
    pub next: Pos,
    pub reward: f64,
    pub terminal: bool,
    /// The move was blocked by a wall or the boundary; the agent stayed put
    pub blocked: bool,
    pub entered: Cell,
}

/// The grid world: cell layout plus a pristine copy used to respawn collected
/// bonuses at episode boundaries
///
/// Invariant: the grid always holds exactly one [`Cell::Start`] and one
/// [`Cell::Target`]; every constructor and edit path preserves this.
#[derive(Clone, Debug)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    initial: Vec<Cell>,
}

impl Grid {
    /// Construct an all-empty grid with start and target at opposite corners
    pub fn new(width: i32, height: i32) -> Result<Self> {
        validate_dims(width, height)?;
        let mut cells = vec![Cell::Empty; (width * height) as usize];
        cells[0] = Cell::Start;
        cells[(width * height - 1) as usize] = Cell::Target;
        Ok(Self {
            width,
            height,
            initial: cells.clone(),
            cells,
        })
    }

    /// Construct a grid from row-major cell rows, enforcing shape and the
    /// exactly-one start/target invariant
    pub fn from_rows(width: i32, height: i32, rows: Vec<Vec<Cell>>) -> Result<Self> {
        validate_dims(width, height)?;
        if rows.len() != height as usize || rows.iter().any(|r| r.len() != width as usize) {
            return Err(Error::MalformedGrid { width, height });
        }
        let cells: Vec<Cell> = rows.into_iter().flatten().collect();

        let starts = cells.iter().filter(|c| **c == Cell::Start).count();
        if starts != 1 {
            return Err(Error::StartCount(starts));
        }
        let targets = cells.iter().filter(|c| **c == Cell::Target).count();
        if targets != 1 {
            return Err(Error::TargetCount(targets));
        }

        Ok(Self {
            width,
            height,
            initial: cells.clone(),
            cells,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    fn idx(&self, pos: Pos) -> usize {
        (pos.y * self.width + pos.x) as usize
    }

    /// Cell at `pos`; out-of-bounds reads as a wall
    pub fn cell(&self, pos: Pos) -> Cell {
        if self.in_bounds(pos) {
            self.cells[self.idx(pos)]
        } else {
            Cell::Wall
        }
    }

    /// Row-major view of the live cells
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| self.cells[(y * self.width + x) as usize])
                    .collect()
            })
            .collect()
    }

    /// Position of the start cell
    pub fn start(&self) -> Pos {
        self.find(Cell::Start).unwrap_or(Pos::new(0, 0))
    }

    /// Position of the target cell
    pub fn target(&self) -> Pos {
        self.find(Cell::Target)
            .unwrap_or(Pos::new(self.width - 1, self.height - 1))
    }

    fn find(&self, needle: Cell) -> Option<Pos> {
        self.cells.iter().position(|c| *c == needle).map(|i| Pos {
            x: i as i32 % self.width,
            y: i as i32 / self.width,
        })
    }

    /// Paint a cell, updating both the live grid and the pristine copy
    ///
    /// Painting a second start or target moves it (the previous cell becomes
    /// empty). Overwriting the only start or target is rejected.
    pub fn paint(&mut self, pos: Pos, cell: Cell) -> Result<()> {
        if !self.in_bounds(pos) {
            return Err(Error::OutOfBounds(pos));
        }
        let old = self.cells[self.idx(pos)];
        if old == cell {
            return Ok(());
        }
        match old {
            Cell::Start => return Err(Error::ProtectedCell("start")),
            Cell::Target => return Err(Error::ProtectedCell("target")),
            _ => {}
        }
        if cell == Cell::Start {
            if let Some(prev) = self.find(Cell::Start) {
                self.set_both(prev, Cell::Empty);
            }
        }
        if cell == Cell::Target {
            if let Some(prev) = self.find(Cell::Target) {
                self.set_both(prev, Cell::Empty);
            }
        }
        self.set_both(pos, cell);
        Ok(())
    }

    fn set_both(&mut self, pos: Pos, cell: Cell) {
        let i = self.idx(pos);
        self.cells[i] = cell;
        self.initial[i] = cell;
    }

    /// Restore the live grid from the pristine copy, respawning bonuses
    pub fn reset_to_initial(&mut self) {
        self.cells.copy_from_slice(&self.initial);
    }

    /// Whether the destination of `action` from `pos` is enterable
    pub fn can_move(&self, pos: Pos, action: Action) -> bool {
        !self.probe(pos, action).1
    }

    /// Destination of `action` from `pos` without side effects
    ///
    /// **Returns** `(dest, blocked)`; a blocked move leaves the agent at `pos`.
    pub fn probe(&self, pos: Pos, action: Action) -> (Pos, bool) {
        let (dx, dy) = action.delta();
        let dest = Pos::new(pos.x + dx, pos.y + dy);
        if !self.in_bounds(dest) || self.cell(dest) == Cell::Wall {
            (pos, true)
        } else {
            (dest, false)
        }
    }

    /// Whether no allowed action can leave `pos`
    pub fn is_stuck(&self, pos: Pos, allowed: &[Action]) -> bool {
        !allowed.iter().any(|&a| self.can_move(pos, a))
    }

    /// Execute one transition from `pos`
    ///
    /// A blocked move (wall or boundary) keeps the agent in place and still
    /// costs the step penalty. Entering a bonus cell collects it: the live
    /// cell converts to empty and the shaped bonus value is added to the
    /// reward. The penalty is always applied; terminal cells add their reward
    /// on top of it.
    pub fn step(&mut self, pos: Pos, action: Action, rewards: &RewardSpec) -> Transition {
        let (dest, blocked) = self.probe(pos, action);
        if blocked {
            return Transition {
                next: pos,
                reward: rewards.step_penalty,
                terminal: false,
                blocked: true,
                entered: Cell::Wall,
            };
        }

        let entered = self.cell(dest);
        let mut reward = rewards.step_penalty;
        let mut terminal = false;
        match entered {
            Cell::Target => {
                reward += rewards.target_reward;
                terminal = true;
            }
            Cell::Trap => {
                reward += rewards.trap_penalty;
                terminal = true;
            }
            Cell::Bonus(v) => {
                reward += (v * rewards.bonus_multiplier).max(rewards.bonus_floor);
                // Collected: live cell only, the pristine copy respawns it
                let i = self.idx(dest);
                self.cells[i] = Cell::Empty;
            }
            _ => {}
        }

        Transition {
            next: dest,
            reward,
            terminal,
            blocked: false,
            entered,
        }
    }

    /// Flood fill from start; true if the target is reachable without passing
    /// through a wall or a trap
    pub fn target_reachable(&self) -> bool {
        let start = self.start();
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(pos) = queue.pop_front() {
            for &action in Action::VARIANTS {
                let (dest, blocked) = self.probe(pos, action);
                if blocked || !seen.insert(dest) {
                    continue;
                }
                match self.cell(dest) {
                    Cell::Target => return true,
                    // Entering a trap ends the episode, so paths through it
                    // do not count
                    Cell::Trap => {}
                    _ => queue.push_back(dest),
                }
            }
        }
        false
    }
}

fn validate_dims(width: i32, height: i32) -> Result<()> {
    if !(MIN_DIM..=MAX_DIM).contains(&width) || !(MIN_DIM..=MAX_DIM).contains(&height) {
        return Err(Error::InvalidDimensions { width, height });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewards() -> RewardSpec {
        RewardSpec {
            step_penalty: -1.0,
            target_reward: 100.0,
            trap_penalty: -100.0,
            bonus_multiplier: 1.0,
            bonus_floor: 0.0,
        }
    }

    #[test]
    fn default_layout_has_corners() {
        let grid = Grid::new(5, 5).unwrap();
        assert_eq!(grid.cell(Pos::new(0, 0)), Cell::Start);
        assert_eq!(grid.cell(Pos::new(4, 4)), Cell::Target);
        assert_eq!(grid.start(), Pos::new(0, 0));
        assert_eq!(grid.target(), Pos::new(4, 4));
    }

    #[test]
    fn dimension_limits_enforced() {
        assert!(Grid::new(2, 5).is_err(), "too narrow");
        assert!(Grid::new(5, 501).is_err(), "too tall");
        assert!(Grid::new(3, 3).is_ok(), "smallest allowed");
    }

    #[test]
    fn bump_stays_in_place_and_costs_penalty() {
        let mut grid = Grid::new(5, 5).unwrap();
        let t = grid.step(Pos::new(0, 0), Action::Up, &rewards());
        assert!(t.blocked, "boundary blocks the move");
        assert_eq!(t.next, Pos::new(0, 0), "agent stays put");
        assert_eq!(t.reward, -1.0, "step penalty still applies");
        assert!(!t.terminal);
    }

    #[test]
    fn target_adds_reward_on_top_of_penalty() {
        let mut grid = Grid::new(5, 5).unwrap();
        let t = grid.step(Pos::new(3, 4), Action::Right, &rewards());
        assert!(t.terminal);
        assert_eq!(t.reward, 99.0, "penalty plus target reward");
    }

    #[test]
    fn trap_is_terminal() {
        let mut grid = Grid::new(5, 5).unwrap();
        grid.paint(Pos::new(1, 0), Cell::Trap).unwrap();
        let t = grid.step(Pos::new(0, 0), Action::Right, &rewards());
        assert!(t.terminal);
        assert_eq!(t.reward, -101.0);
    }

    #[test]
    fn bonus_collects_once_and_respawns_on_reset() {
        let mut grid = Grid::new(5, 5).unwrap();
        grid.paint(Pos::new(1, 0), Cell::Bonus(20.0)).unwrap();

        let t = grid.step(Pos::new(0, 0), Action::Right, &rewards());
        assert_eq!(t.reward, 19.0, "penalty plus bonus value");
        assert_eq!(grid.cell(Pos::new(1, 0)), Cell::Empty, "bonus collected");

        let t = grid.step(Pos::new(0, 0), Action::Right, &rewards());
        assert_eq!(t.reward, -1.0, "bonus is one-time");

        grid.reset_to_initial();
        assert_eq!(
            grid.cell(Pos::new(1, 0)),
            Cell::Bonus(20.0),
            "bonus respawned from pristine copy"
        );
    }

    #[test]
    fn shaped_bonus_uses_multiplier_and_floor() {
        let mut grid = Grid::new(5, 5).unwrap();
        grid.paint(Pos::new(1, 0), Cell::Bonus(10.0)).unwrap();
        let spec = RewardSpec {
            step_penalty: -0.1,
            bonus_multiplier: 2.5,
            bonus_floor: 50.0,
            ..rewards()
        };
        let t = grid.step(Pos::new(0, 0), Action::Right, &spec);
        assert_eq!(t.reward, -0.1 + 50.0, "floor dominates 2.5 * 10");
    }

    #[test]
    fn paint_cannot_remove_last_start_or_target() {
        let mut grid = Grid::new(5, 5).unwrap();
        assert!(grid.paint(Pos::new(0, 0), Cell::Wall).is_err());
        assert!(grid.paint(Pos::new(4, 4), Cell::Empty).is_err());
        // still intact
        assert_eq!(grid.cell(Pos::new(0, 0)), Cell::Start);
        assert_eq!(grid.cell(Pos::new(4, 4)), Cell::Target);
    }

    #[test]
    fn painting_second_start_moves_it() {
        let mut grid = Grid::new(5, 5).unwrap();
        grid.paint(Pos::new(2, 2), Cell::Start).unwrap();
        assert_eq!(grid.cell(Pos::new(2, 2)), Cell::Start);
        assert_eq!(grid.cell(Pos::new(0, 0)), Cell::Empty, "old start demoted");
        assert_eq!(grid.start(), Pos::new(2, 2));
    }

    #[test]
    fn from_rows_enforces_invariants() {
        let rows = |s: Cell, t: Cell| {
            vec![
                vec![s, Cell::Empty, Cell::Empty],
                vec![Cell::Empty, Cell::Empty, Cell::Empty],
                vec![Cell::Empty, Cell::Empty, t],
            ]
        };
        assert!(Grid::from_rows(3, 3, rows(Cell::Start, Cell::Target)).is_ok());
        assert!(
            matches!(
                Grid::from_rows(3, 3, rows(Cell::Empty, Cell::Target)),
                Err(Error::StartCount(0))
            ),
            "missing start rejected"
        );
        assert!(
            matches!(
                Grid::from_rows(3, 3, rows(Cell::Start, Cell::Empty)),
                Err(Error::TargetCount(0))
            ),
            "missing target rejected"
        );
    }

    #[test]
    fn reachability_respects_walls_and_traps() {
        let mut grid = Grid::new(3, 3).unwrap();
        assert!(grid.target_reachable(), "open grid is solvable");

        // wall off the target corner entirely
        grid.paint(Pos::new(1, 2), Cell::Wall).unwrap();
        grid.paint(Pos::new(2, 1), Cell::Wall).unwrap();
        assert!(!grid.target_reachable(), "walled-off target unreachable");

        // a trap gate does not count as a path
        grid.paint(Pos::new(1, 2), Cell::Trap).unwrap();
        assert!(!grid.target_reachable(), "trap does not open a path");

        grid.paint(Pos::new(1, 2), Cell::Empty).unwrap();
        assert!(grid.target_reachable());
    }

    #[test]
    fn stuck_detection() {
        let mut grid = Grid::new(4, 3).unwrap();
        grid.paint(Pos::new(1, 0), Cell::Wall).unwrap();
        grid.paint(Pos::new(0, 1), Cell::Wall).unwrap();
        assert!(grid.is_stuck(Pos::new(0, 0), Action::VARIANTS));
        assert!(!grid.is_stuck(Pos::new(2, 2), Action::VARIANTS));
        assert!(
            grid.is_stuck(Pos::new(2, 0), &[Action::Left]),
            "restricted action set can strand the agent"
        );
    }

    #[test]
    fn cell_wire_strings_round_trip() {
        for (cell, s) in [
            (Cell::Empty, "empty"),
            (Cell::Wall, "wall"),
            (Cell::Start, "start"),
            (Cell::Target, "target"),
            (Cell::Trap, "trap"),
            (Cell::Bonus(20.0), "bonus:20"),
        ] {
            assert_eq!(cell.to_string(), s);
            assert_eq!(s.parse::<Cell>().unwrap(), cell);
        }
        assert_eq!(
            "bonus".parse::<Cell>().unwrap(),
            Cell::Bonus(DEFAULT_BONUS_VALUE),
            "bare bonus gets the default value"
        );
        assert_eq!("bonus:2.5".parse::<Cell>().unwrap(), Cell::Bonus(2.5));
        assert!("lava".parse::<Cell>().is_err());
    }
}
