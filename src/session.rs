use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::agent::{ActionValues, QTable, TabularAgent};
use crate::config::{Algorithm, Hyperparameters, RewardStrategy};
use crate::ds::RingBuffer;
use crate::error::{Error, Result};
use crate::grid::{Action, Cell, Grid, Pos, RewardSpec};
use crate::maze::MazeGenerator;
use crate::path;

/// Trailing learning-curve points retained for charting
pub const CURVE_CAPACITY: usize = 1000;

/// Safety cap on steps within a single turbo episode; a capped episode still
/// produces its learning-curve point
pub const MAX_EPISODE_STEPS: u32 = 100_000;

/// Default auto-play cadence
pub const DEFAULT_SPEED_MS: u64 = 100;

// COLLECT_ALL_REWARDS shaping: mild step cost, bonuses boosted well above it
const COLLECT_STEP_PENALTY: f64 = -0.1;
const COLLECT_BONUS_MULTIPLIER: f64 = 2.5;
const COLLECT_BONUS_FLOOR: f64 = 50.0;

/// Result classification of a single [`Session::step`]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The episode goes on
    Continue,
    /// This step ended the episode; bookkeeping (curve point, episode index,
    /// epsilon decay) has been applied
    Terminal,
    /// The agent was returned to start and bonuses respawned
    Reset,
}

/// Final tallies of a completed episode
#[derive(Clone, Copy, Debug, Serialize)]
pub struct EpisodeSummary {
    pub reward: f64,
    pub steps: u32,
}

/// One point of the learning curve, appended per completed episode
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct LearningCurvePoint {
    pub episode: u32,
    pub reward: f64,
    pub steps: u32,
}

/// Everything a consumer needs to render the effect of one step
#[derive(Clone, Debug)]
pub struct StepOutcome {
    pub status: StepStatus,
    /// The table entry this step rewrote
    pub q_update: Option<(Pos, ActionValues)>,
    /// A bonus cell that was just collected (reverted to empty)
    pub collected: Option<Pos>,
    /// Present when `status` is `Terminal` or `Reset`
    pub episode_done: Option<EpisodeSummary>,
    /// The episode was ended because the agent had no viable move
    pub stuck: bool,
}

/// One simulation: grid, agent, episode state, and the run/pause/speed flags
/// that govern the boundary clock
///
/// The session is created on `setup` (there is no idle half-configured state)
/// and every command funnels through `&mut self`, so serializing commands at
/// the boundary is the only locking required. The auto-play clock itself lives
/// at the boundary: it repeatedly calls [`Session::step`] while
/// [`Session::is_running`] holds, sleeping [`Session::speed_ms`] between
/// invocations, and must stop itself when a step returns an error.
#[derive(Clone, Debug)]
pub struct Session {
    grid: Grid,
    agent: TabularAgent,
    hp: Hyperparameters,
    pos: Pos,
    episode: u32,
    steps: u32,
    total_reward: f64,
    awaiting_reset: bool,
    curve: RingBuffer<LearningCurvePoint>,
    running: bool,
    speed_ms: u64,
}

impl Session {
    /// Configure a fresh simulation
    ///
    /// Validates the hyperparameters and grid (the grid constructors already
    /// enforce dimensions and the single start/target invariant; reachability
    /// is checked here) and starts paused at episode 0 with an empty table.
    pub fn new(grid: Grid, hp: Hyperparameters) -> Result<Self> {
        hp.validate()?;
        if !grid.target_reachable() {
            return Err(Error::TargetUnreachable);
        }
        info!(
            "session configured: {}x{} grid, {:?}, alpha={} gamma={} epsilon={}",
            grid.width(),
            grid.height(),
            hp.algorithm,
            hp.alpha,
            hp.gamma,
            hp.epsilon,
        );
        let pos = grid.start();
        Ok(Self {
            agent: TabularAgent::new(&hp),
            grid,
            hp,
            pos,
            episode: 0,
            steps: 0,
            total_reward: 0.0,
            awaiting_reset: false,
            curve: RingBuffer::new(CURVE_CAPACITY),
            running: false,
            speed_ms: DEFAULT_SPEED_MS,
        })
    }

    /// Reconfigure from scratch: full reset of table, episode state, and
    /// curve. The playback speed survives.
    pub fn setup(&mut self, grid: Grid, hp: Hyperparameters) -> Result<()> {
        let speed_ms = self.speed_ms;
        *self = Self::new(grid, hp)?;
        self.speed_ms = speed_ms;
        Ok(())
    }

    /// Hot-swap hyperparameters mid-run
    ///
    /// The Q-table, agent position, and episode counters are untouched; the
    /// new epsilon is applied since the control UI drives it directly.
    pub fn update_config(&mut self, hp: Hyperparameters) -> Result<()> {
        hp.validate()?;
        self.agent.set_epsilon(hp.epsilon);
        self.hp = hp;
        Ok(())
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hp
    }

    pub fn q_table(&self) -> &QTable {
        self.agent.q_table()
    }

    pub fn agent_pos(&self) -> Pos {
        self.pos
    }

    pub fn episode(&self) -> u32 {
        self.episode
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    pub fn epsilon(&self) -> f64 {
        self.agent.epsilon()
    }

    /// Learning-curve window, oldest first
    pub fn learning_curve(&self) -> impl Iterator<Item = &LearningCurvePoint> {
        self.curve.iter()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn speed_ms(&self) -> u64 {
        self.speed_ms
    }

    /// Let the boundary clock drive steps
    pub fn play(&mut self) {
        self.running = true;
    }

    /// Suppress the boundary clock; synchronous commands stay available
    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn set_speed(&mut self, ms: u64) {
        self.speed_ms = ms.max(1);
    }

    /// Execute exactly one agent action
    ///
    /// If the previous step ended the episode this call instead performs the
    /// episode reset (agent home, bonuses respawned, counters zeroed) and
    /// reports [`StepStatus::Reset`].
    pub fn step(&mut self) -> Result<StepOutcome> {
        if self.awaiting_reset {
            let summary = EpisodeSummary {
                reward: self.total_reward,
                steps: self.steps,
            };
            self.begin_episode();
            return Ok(StepOutcome {
                status: StepStatus::Reset,
                q_update: None,
                collected: None,
                episode_done: Some(summary),
                stuck: false,
            });
        }
        self.execute_step()
    }

    /// Run `episodes` full episodes synchronously with the current
    /// hyperparameters, without intermediate visible state
    ///
    /// Returns one curve point per episode, including episodes stopped by
    /// [`MAX_EPISODE_STEPS`]. Afterwards the grid and counters are restored
    /// for the UI and auto-play is left paused.
    pub fn turbo(&mut self, episodes: u32) -> Result<Vec<LearningCurvePoint>> {
        self.running = false;
        let mut batch = Vec::with_capacity(episodes as usize);
        for _ in 0..episodes {
            self.begin_episode();
            loop {
                let outcome = self.execute_step()?;
                if outcome.status == StepStatus::Terminal {
                    break;
                }
                if self.steps >= MAX_EPISODE_STEPS {
                    self.finish_episode();
                    break;
                }
            }
            // finish_episode pushed the point; mirror it into the batch
            batch.push(LearningCurvePoint {
                episode: self.episode,
                reward: self.total_reward,
                steps: self.steps,
            });
        }
        info!(
            "turbo finished: {} episodes, epsilon now {:.4}",
            episodes,
            self.epsilon()
        );
        self.begin_episode();
        Ok(batch)
    }

    /// Paint one cell; rejected while auto-play is running
    pub fn paint_cell(&mut self, pos: Pos, cell: Cell) -> Result<()> {
        self.ensure_editable()?;
        self.grid.paint(pos, cell)
    }

    /// Replace the grid with a freshly generated maze of the same dimensions
    ///
    /// A new world invalidates learned values: the table, epsilon, episode
    /// counters, and curve are reset.
    pub fn generate_maze(&mut self) -> Result<()> {
        self.ensure_editable()?;
        let grid = MazeGenerator::new().generate(self.grid.width(), self.grid.height())?;
        info!("generated {}x{} maze", grid.width(), grid.height());
        self.install_grid(grid);
        Ok(())
    }

    /// Reset to the all-empty layout with start and target at opposite corners
    pub fn clear_map(&mut self) -> Result<()> {
        self.ensure_editable()?;
        let grid = Grid::new(self.grid.width(), self.grid.height())?;
        self.install_grid(grid);
        Ok(())
    }

    /// The greedy route the agent currently believes optimal
    pub fn optimal_path(&self) -> Vec<Pos> {
        path::extract(
            &self.grid,
            self.agent.q_table(),
            &self.hp.allowed_actions,
            path::step_budget(&self.grid),
        )
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.running {
            warn!("rejected grid edit while running");
            return Err(Error::EditWhileRunning);
        }
        Ok(())
    }

    fn install_grid(&mut self, grid: Grid) {
        self.grid = grid;
        self.agent.reset(&self.hp);
        self.episode = 0;
        self.curve.clear();
        self.begin_episode();
    }

    fn begin_episode(&mut self) {
        self.grid.reset_to_initial();
        self.pos = self.grid.start();
        self.total_reward = 0.0;
        self.steps = 0;
        self.awaiting_reset = false;
    }

    /// Episode-boundary bookkeeping for the episode that just ended
    fn finish_episode(&mut self) -> EpisodeSummary {
        let summary = EpisodeSummary {
            reward: self.total_reward,
            steps: self.steps,
        };
        self.episode += 1;
        self.curve.push(LearningCurvePoint {
            episode: self.episode,
            reward: summary.reward,
            steps: summary.steps,
        });
        self.agent.decay_epsilon(&self.hp);
        self.awaiting_reset = true;
        summary
    }

    /// Select, transition, learn: the core of both manual and turbo stepping
    fn execute_step(&mut self) -> Result<StepOutcome> {
        let pos = self.pos;
        if !self.grid.in_bounds(pos) {
            // invariant violation; abort this operation, prior state stands
            return Err(Error::OutOfBounds(pos));
        }

        // A walled-in agent ends the episode with the trap penalty rather
        // than looping forever.
        if self.grid.is_stuck(pos, &self.hp.allowed_actions) {
            let fallback = self.hp.allowed_actions.first().copied().unwrap_or(Action::Up);
            self.agent
                .update(pos, fallback, self.hp.trap_penalty, pos, None, true, &self.hp);
            self.total_reward += self.hp.trap_penalty;
            let summary = self.finish_episode();
            return Ok(StepOutcome {
                status: StepStatus::Terminal,
                q_update: Some((pos, self.agent.q_table().values(pos))),
                collected: None,
                episode_done: Some(summary),
                stuck: true,
            });
        }

        let action = self.agent.select_action(pos, &self.hp.allowed_actions);
        let rewards = self.reward_spec();
        let t = self.grid.step(pos, action, &rewards);
        let next_action = (!t.terminal && self.hp.algorithm == Algorithm::Sarsa)
            .then(|| self.agent.select_action(t.next, &self.hp.allowed_actions));
        self.agent
            .update(pos, action, t.reward, t.next, next_action, t.terminal, &self.hp);

        self.pos = t.next;
        self.steps += 1;
        self.total_reward += t.reward;

        let collected = matches!(t.entered, Cell::Bonus(_)).then_some(t.next);
        let q_update = Some((pos, self.agent.q_table().values(pos)));

        if t.terminal {
            let summary = self.finish_episode();
            Ok(StepOutcome {
                status: StepStatus::Terminal,
                q_update,
                collected,
                episode_done: Some(summary),
                stuck: false,
            })
        } else {
            Ok(StepOutcome {
                status: StepStatus::Continue,
                q_update,
                collected,
                episode_done: None,
                stuck: false,
            })
        }
    }

    /// Effective reward parameters for the active strategy
    ///
    /// Shaping lives here rather than in the grid: `COLLECT_ALL_REWARDS`
    /// softens the step cost and boosts bonuses so routing through them pays.
    fn reward_spec(&self) -> RewardSpec {
        match self.hp.reward_strategy {
            RewardStrategy::MinimizeSteps => RewardSpec {
                step_penalty: self.hp.step_penalty,
                target_reward: self.hp.target_reward,
                trap_penalty: self.hp.trap_penalty,
                bonus_multiplier: 1.0,
                bonus_floor: f64::NEG_INFINITY,
            },
            RewardStrategy::CollectAllRewards => RewardSpec {
                step_penalty: COLLECT_STEP_PENALTY,
                target_reward: self.hp.target_reward,
                trap_penalty: self.hp.trap_penalty,
                bonus_multiplier: COLLECT_BONUS_MULTIPLIER,
                bonus_floor: COLLECT_BONUS_FLOOR,
            },
        }
    }
}
