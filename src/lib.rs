//! Simulation core for an interactive grid-world RL visualizer: a tabular
//! agent (Q-learning or SARSA) learns a user-editable grid while the session
//! emits snapshots and per-tick deltas for a remote client.

/// Tabular agent and Q-table
pub mod agent;

/// Hyperparameters and their validation
pub mod config;

/// Data structures
pub mod ds;

/// Crate error type
pub mod error;

/// Exploration policy
pub mod exploration;

/// Grid world: cells, actions, transitions, rewards
pub mod grid;

/// Random solvable maze generation
pub mod maze;

/// Greedy optimal-path extraction from the learned table
pub mod path;

/// Wire types for snapshots, deltas, and control commands
pub mod protocol;

/// The training controller
pub mod session;

pub use error::{Error, Result};
pub use session::Session;
