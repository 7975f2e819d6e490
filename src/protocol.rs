//! Wire types for the live-update channel and the request/response surface.
//!
//! Everything here is transport-agnostic: the embedding server decides how
//! snapshots, per-tick deltas, and inbound control commands travel (WebSocket,
//! SSE, a test harness, ...). State always lives server-side in the
//! [`Session`]; a client that reconnects simply requests a fresh
//! [`Snapshot`] and resumes merging deltas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::{ActionValues, QTable};
use crate::config::Hyperparameters;
use crate::error::Result;
use crate::grid::{Cell, Grid, Pos};
use crate::session::{
    EpisodeSummary, LearningCurvePoint, Session, StepOutcome, StepStatus, DEFAULT_SPEED_MS,
};

/// Q-table entries keyed by `"x,y"` strings, as the visualizer merges them
pub type QTableWire = BTreeMap<String, ActionValues>;

fn pos_key(pos: Pos) -> String {
    format!("{},{}", pos.x, pos.y)
}

/// Full table in wire form
pub fn q_table_wire(table: &QTable) -> QTableWire {
    table
        .entries()
        .iter()
        .map(|(&pos, &values)| (pos_key(pos), values))
        .collect()
}

/// Single-entry sparse delta in wire form
pub fn q_delta_wire(pos: Pos, values: ActionValues) -> QTableWire {
    BTreeMap::from([(pos_key(pos), values)])
}

/// Serializable grid layout
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub width: i32,
    pub height: i32,
    pub cells: Vec<Vec<Cell>>,
}

impl From<&Grid> for GridSnapshot {
    fn from(grid: &Grid) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            cells: grid.rows(),
        }
    }
}

impl GridSnapshot {
    pub fn into_grid(self) -> Result<Grid> {
        Grid::from_rows(self.width, self.height, self.cells)
    }
}

/// The full simulation state, served on `get_state` and after `setup`
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub env: GridSnapshot,
    pub agent_pos: Pos,
    pub q_table: QTableWire,
    pub episode: u32,
    pub steps: u32,
    pub total_reward: f64,
    pub epsilon: f64,
}

impl Snapshot {
    pub fn capture(session: &Session) -> Self {
        Self {
            env: session.grid().into(),
            agent_pos: session.agent_pos(),
            q_table: q_table_wire(session.q_table()),
            episode: session.episode(),
            steps: session.steps(),
            total_reward: session.total_reward(),
            epsilon: session.epsilon(),
        }
    }
}

/// Body of the `setup` operation: dimensions, optional explicit layout, and
/// the hyperparameters flattened alongside (absent fields take defaults)
#[derive(Debug, Deserialize)]
pub struct SetupRequest {
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub cells: Option<Vec<Vec<Cell>>>,
    #[serde(flatten)]
    pub params: Hyperparameters,
}

impl SetupRequest {
    /// Resolve into a validated grid and hyperparameter set
    pub fn into_parts(self) -> Result<(Grid, Hyperparameters)> {
        let grid = match self.cells {
            Some(rows) => Grid::from_rows(self.width, self.height, rows)?,
            None => Grid::new(self.width, self.height)?,
        };
        Ok((grid, self.params))
    }
}

/// Inbound control messages on the streaming channel
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlCommand {
    Play,
    Pause,
    SetSpeed {
        #[serde(default = "default_speed")]
        speed: u64,
    },
}

fn default_speed() -> u64 {
    DEFAULT_SPEED_MS
}

/// Decode a channel message into a [`ControlCommand`]
pub fn decode_command(text: &str) -> Result<ControlCommand> {
    Ok(serde_json::from_str(text)?)
}

/// Server-to-client push messages
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Update(Box<TickUpdate>),
    /// Fatal to the current operation; the client must stop its auto-play loop
    Error { message: String },
}

/// Per-tick incremental state: the client merges `q_delta` by key and applies
/// `grid_update`/`full_grid` to its local grid copy
#[derive(Debug, Serialize)]
pub struct TickUpdate {
    pub agent_pos: Pos,
    pub episode: u32,
    pub steps: u32,
    pub total_reward: f64,
    pub epsilon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q_delta: Option<QTableWire>,
    /// A single cell reverted to empty (a collected bonus)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_update: Option<Pos>,
    /// Authoritative grid override, e.g. after an edit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_grid: Option<GridSnapshot>,
    /// The episode boundary was crossed; the client restores bonus cells from
    /// its own pristine copy instead of a full resync
    pub respawn_bonuses: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_done: Option<EpisodeSummary>,
}

impl Event {
    /// The per-step update event for a just-executed [`Session::step`]
    pub fn update(session: &Session, outcome: &StepOutcome) -> Self {
        Self::Update(Box::new(TickUpdate {
            agent_pos: session.agent_pos(),
            episode: session.episode(),
            steps: session.steps(),
            total_reward: session.total_reward(),
            epsilon: session.epsilon(),
            q_delta: outcome.q_update.map(|(pos, values)| q_delta_wire(pos, values)),
            grid_update: outcome.collected,
            full_grid: None,
            respawn_bonuses: outcome.status == StepStatus::Reset,
            episode_done: match outcome.status {
                StepStatus::Terminal => outcome.episode_done,
                _ => None,
            },
        }))
    }

    /// An update carrying the authoritative grid, for after edits
    pub fn full_grid(session: &Session) -> Self {
        Self::Update(Box::new(TickUpdate {
            agent_pos: session.agent_pos(),
            episode: session.episode(),
            steps: session.steps(),
            total_reward: session.total_reward(),
            epsilon: session.epsilon(),
            q_delta: None,
            grid_update: None,
            full_grid: Some(session.grid().into()),
            respawn_bonuses: false,
            episode_done: None,
        }))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Acknowledgement for operations with no richer payload
#[derive(Debug, Serialize)]
pub struct Ack {
    pub status: &'static str,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok",
            message: message.into(),
        }
    }
}

/// Result of the `step` operation
#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub status: StepStatus,
    /// Final reward of the episode that was just closed out by a reset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_reward: Option<f64>,
}

impl From<&StepOutcome> for StepResponse {
    fn from(outcome: &StepOutcome) -> Self {
        Self {
            status: outcome.status,
            episode_reward: match outcome.status {
                StepStatus::Reset => outcome.episode_done.map(|s| s.reward),
                _ => None,
            },
        }
    }
}

/// Result of the `turbo` operation
#[derive(Debug, Serialize)]
pub struct TurboResponse {
    pub status: &'static str,
    pub curve: Vec<LearningCurvePoint>,
    pub env: GridSnapshot,
}

impl TurboResponse {
    pub fn new(curve: Vec<LearningCurvePoint>, session: &Session) -> Self {
        Self {
            status: "done",
            curve,
            env: session.grid().into(),
        }
    }
}

/// Result of `generate_maze` and `clear_map`
#[derive(Debug, Serialize)]
pub struct GridResponse {
    pub status: &'static str,
    pub env: GridSnapshot,
}

impl GridResponse {
    pub fn ok(session: &Session) -> Self {
        Self {
            status: "ok",
            env: session.grid().into(),
        }
    }
}

/// Result of the `get_path` operation
#[derive(Debug, Serialize)]
pub struct PathResponse {
    pub path: Vec<Pos>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Action;

    fn session() -> Session {
        let mut grid = Grid::new(3, 3).unwrap();
        grid.paint(Pos::new(1, 0), Cell::Target).unwrap();
        let hp = Hyperparameters {
            epsilon: 0.0,
            allowed_actions: vec![Action::Right],
            ..Default::default()
        };
        Session::new(grid, hp).unwrap()
    }

    #[test]
    fn snapshot_shape_matches_the_client_contract() {
        let mut session = session();
        session.step().unwrap();

        let json = serde_json::to_value(Snapshot::capture(&session)).unwrap();
        assert_eq!(json["env"]["width"], 3);
        assert_eq!(json["env"]["cells"][0][1], "target", "cells travel as strings");
        assert_eq!(json["agent_pos"]["x"], 1);
        assert_eq!(json["episode"], 1);
        assert!(
            json["q_table"].get("0,0").is_some(),
            "table keys are x,y strings"
        );
        assert!(json["q_table"]["0,0"].get("RIGHT").is_some());
    }

    #[test]
    fn terminal_update_carries_delta_and_episode_done() {
        let mut session = session();
        let outcome = session.step().unwrap();

        let json = serde_json::to_value(Event::update(&session, &outcome)).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["respawn_bonuses"], false);
        assert_eq!(json["episode_done"]["reward"], 99.0);
        assert_eq!(json["episode_done"]["steps"], 1);
        assert!(json["q_delta"]["0,0"].is_object());
        assert!(json.get("full_grid").is_none(), "omitted when absent");
    }

    #[test]
    fn reset_update_signals_bonus_respawn() {
        let mut session = session();
        session.step().unwrap();
        let outcome = session.step().unwrap();
        assert_eq!(outcome.status, StepStatus::Reset);

        let json = serde_json::to_value(Event::update(&session, &outcome)).unwrap();
        assert_eq!(json["respawn_bonuses"], true);
        assert!(json.get("q_delta").is_none());
        assert!(
            json.get("episode_done").is_none(),
            "the terminal tick already reported it"
        );
        assert_eq!(json["steps"], 0, "counters already zeroed");
    }

    #[test]
    fn error_event_shape() {
        let json = serde_json::to_value(Event::error("boom")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "boom");
    }

    #[test]
    fn control_commands_decode() {
        assert_eq!(
            decode_command(r#"{"action":"play"}"#).unwrap(),
            ControlCommand::Play
        );
        assert_eq!(
            decode_command(r#"{"action":"pause"}"#).unwrap(),
            ControlCommand::Pause
        );
        assert_eq!(
            decode_command(r#"{"action":"set_speed","speed":40}"#).unwrap(),
            ControlCommand::SetSpeed { speed: 40 }
        );
        assert_eq!(
            decode_command(r#"{"action":"set_speed"}"#).unwrap(),
            ControlCommand::SetSpeed {
                speed: DEFAULT_SPEED_MS
            },
            "missing speed falls back to the default cadence"
        );
        assert!(decode_command("not json").is_err());
        assert!(decode_command(r#"{"action":"warp"}"#).is_err());
    }

    #[test]
    fn setup_request_parses_flattened_hyperparameters() {
        let req: SetupRequest = serde_json::from_str(
            r#"{
                "width": 3, "height": 3,
                "cells": [
                    ["start", "empty", "empty"],
                    ["empty", "wall", "bonus:20"],
                    ["empty", "empty", "target"]
                ],
                "alpha": 0.5, "algorithm": "SARSA"
            }"#,
        )
        .unwrap();
        let (grid, hp) = req.into_parts().unwrap();
        assert_eq!(grid.cell(Pos::new(2, 1)), Cell::Bonus(20.0));
        assert_eq!(hp.alpha, 0.5);
        assert_eq!(hp.gamma, 0.9, "unspecified fields take defaults");

        let req: SetupRequest = serde_json::from_str(r#"{"width": 8, "height": 8}"#).unwrap();
        let (grid, _) = req.into_parts().unwrap();
        assert_eq!(grid.cell(Pos::new(0, 0)), Cell::Start, "default layout");
    }

    #[test]
    fn full_grid_update_overrides_the_layout() {
        let mut session = session();
        session.paint_cell(Pos::new(0, 2), Cell::Trap).unwrap();
        let json = serde_json::to_value(Event::full_grid(&session)).unwrap();
        assert_eq!(json["full_grid"]["cells"][2][0], "trap");
    }

    #[test]
    fn step_response_reports_episode_reward_on_reset() {
        let mut session = session();
        let terminal = session.step().unwrap();
        let json = serde_json::to_value(StepResponse::from(&terminal)).unwrap();
        assert_eq!(json["status"], "terminal");
        assert!(json.get("episode_reward").is_none());

        let reset = session.step().unwrap();
        let json = serde_json::to_value(StepResponse::from(&reset)).unwrap();
        assert_eq!(json["status"], "reset");
        assert_eq!(json["episode_reward"], 99.0);
    }

    #[test]
    fn turbo_and_grid_responses() {
        let mut session = session();
        let curve = session.turbo(5).unwrap();
        let json = serde_json::to_value(TurboResponse::new(curve, &session)).unwrap();
        assert_eq!(json["status"], "done");
        assert_eq!(json["curve"].as_array().unwrap().len(), 5);
        assert_eq!(json["curve"][0]["episode"], 1);
        assert_eq!(json["env"]["height"], 3);

        let json = serde_json::to_value(GridResponse::ok(&session)).unwrap();
        assert_eq!(json["status"], "ok");
    }
}
