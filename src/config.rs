use serde::{Deserialize, Serialize};
use strum::VariantArray;

use crate::error::{Error, Result};
use crate::grid::Action;

/// Tabular update rule
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Algorithm {
    /// Off-policy: bootstrap from the best next action
    #[serde(rename = "Q-Learning")]
    QLearning,
    /// On-policy: bootstrap from the action actually chosen next
    #[serde(rename = "SARSA")]
    Sarsa,
}

/// What the agent is rewarded for
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum RewardStrategy {
    /// Reach the target in as few steps as possible; bonuses score but do not
    /// steer the shaping
    #[serde(rename = "minimize_steps")]
    MinimizeSteps,
    /// Shaped rewards that push the agent through remaining bonus cells
    #[serde(rename = "collect_all")]
    CollectAllRewards,
}

/// The full hyperparameter set for a simulation
///
/// Terminal reward magnitudes are part of the configuration rather than
/// hard-coded, since they are policy choices of the visualization.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    /// Learning rate, in `[0, 1]`
    pub alpha: f64,
    /// Discount factor, in `[0, 1]`
    pub gamma: f64,
    /// Initial exploration probability, in `[0, 1]`
    pub epsilon: f64,
    /// Multiplicative per-episode epsilon decay, in `(0, 1]`
    pub epsilon_decay: f64,
    /// Exploration floor, in `[0, 1]`
    pub min_epsilon: f64,
    /// Reward per non-terminal step, typically negative
    pub step_penalty: f64,
    /// Added on top of the step penalty when the target is reached
    pub target_reward: f64,
    /// Added on top of the step penalty when a trap is entered; also the
    /// penalty for an episode ended by a walled-in agent
    pub trap_penalty: f64,
    pub algorithm: Algorithm,
    #[serde(alias = "strategy")]
    pub reward_strategy: RewardStrategy,
    /// Non-empty subset of the four moves offered to the agent
    pub allowed_actions: Vec<Action>,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon: 0.2,
            epsilon_decay: 0.995,
            min_epsilon: 0.01,
            step_penalty: -1.0,
            target_reward: 100.0,
            trap_penalty: -100.0,
            algorithm: Algorithm::QLearning,
            reward_strategy: RewardStrategy::MinimizeSteps,
            allowed_actions: Action::VARIANTS.to_vec(),
        }
    }
}

impl Hyperparameters {
    /// Check every field against its documented range
    pub fn validate(&self) -> Result<()> {
        interval("alpha", self.alpha, 0.0, 1.0)?;
        interval("gamma", self.gamma, 0.0, 1.0)?;
        interval("epsilon", self.epsilon, 0.0, 1.0)?;
        interval("min_epsilon", self.min_epsilon, 0.0, 1.0)?;
        interval("epsilon_decay", self.epsilon_decay, f64::EPSILON, 1.0)?;
        if self.allowed_actions.is_empty() {
            return Err(Error::NoAllowedActions);
        }
        Ok(())
    }
}

fn interval(name: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_nan() || value < min || value > max {
        return Err(Error::HyperparameterRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}
