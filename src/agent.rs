use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use strum::VariantArray;

use crate::config::{Algorithm, Hyperparameters};
use crate::exploration::{Choice, EpsilonGreedy};
use crate::grid::{Action, Pos};

/// Action values for one state; always total over the four actions, default 0
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct ActionValues {
    #[serde(rename = "UP")]
    pub up: f64,
    #[serde(rename = "DOWN")]
    pub down: f64,
    #[serde(rename = "LEFT")]
    pub left: f64,
    #[serde(rename = "RIGHT")]
    pub right: f64,
}

impl Index<Action> for ActionValues {
    type Output = f64;

    fn index(&self, action: Action) -> &Self::Output {
        match action {
            Action::Up => &self.up,
            Action::Down => &self.down,
            Action::Left => &self.left,
            Action::Right => &self.right,
        }
    }
}

impl IndexMut<Action> for ActionValues {
    fn index_mut(&mut self, action: Action) -> &mut Self::Output {
        match action {
            Action::Up => &mut self.up,
            Action::Down => &mut self.down,
            Action::Left => &mut self.left,
            Action::Right => &mut self.right,
        }
    }
}

/// Sparse action-value table keyed by position
///
/// Entries are created lazily on first update; an absent entry reads as
/// all-zero. The table never shrinks except through [`QTable::clear`].
#[derive(Clone, Debug, Default)]
pub struct QTable {
    entries: HashMap<Pos, ActionValues>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, pos: Pos) -> bool {
        self.entries.contains_key(&pos)
    }

    /// Values for `pos`; absent entries read as all-zero
    pub fn values(&self, pos: Pos) -> ActionValues {
        self.entries.get(&pos).copied().unwrap_or_default()
    }

    pub fn entries(&self) -> &HashMap<Pos, ActionValues> {
        &self.entries
    }

    pub fn set(&mut self, pos: Pos, action: Action, value: f64) {
        self.entries.entry(pos).or_default()[action] = value;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Best action for `pos` restricted to `allowed`, breaking ties by the
    /// fixed priority order UP, DOWN, LEFT, RIGHT
    pub fn best_action(&self, pos: Pos, allowed: &[Action]) -> Option<Action> {
        let values = self.values(pos);
        let mut best: Option<(Action, f64)> = None;
        for &action in Action::VARIANTS {
            if !allowed.contains(&action) {
                continue;
            }
            let v = values[action];
            // strict comparison keeps the first of tied maxima
            if best.map_or(true, |(_, bv)| v > bv) {
                best = Some((action, v));
            }
        }
        best.map(|(a, _)| a)
    }

    /// Maximum value at `pos` over `allowed`; 0 for an empty action set
    pub fn best_value(&self, pos: Pos, allowed: &[Action]) -> f64 {
        if allowed.is_empty() {
            return 0.0;
        }
        let values = self.values(pos);
        allowed
            .iter()
            .map(|&a| values[a])
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// A tabular agent applying Q-learning or SARSA updates to a [`QTable`]
#[derive(Clone, Debug)]
pub struct TabularAgent {
    q_table: QTable,
    exploration: EpsilonGreedy,
}

impl TabularAgent {
    pub fn new(hp: &Hyperparameters) -> Self {
        Self {
            q_table: QTable::new(),
            exploration: EpsilonGreedy::new(hp.epsilon),
        }
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    pub fn epsilon(&self) -> f64 {
        self.exploration.epsilon()
    }

    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.exploration.set_epsilon(epsilon);
    }

    /// Choose an action at `pos`: explore uniformly over `allowed` with
    /// probability epsilon, otherwise exploit the table
    pub fn select_action(&self, pos: Pos, allowed: &[Action]) -> Action {
        match self.exploration.choose() {
            Choice::Explore => allowed
                .iter()
                .copied()
                .choose(&mut rand::thread_rng())
                .expect("There is always at least one allowed action"),
            Choice::Exploit => self
                .q_table
                .best_action(pos, allowed)
                .expect("There is always at least one allowed action"),
        }
    }

    /// Apply one update for the transition `(state, action) -> next`
    ///
    /// Q-learning bootstraps from the best allowed action at `next`; SARSA
    /// bootstraps from `next_action`, the action actually chosen next. For a
    /// terminal transition the bootstrap term is zero.
    pub fn update(
        &mut self,
        state: Pos,
        action: Action,
        reward: f64,
        next: Pos,
        next_action: Option<Action>,
        terminal: bool,
        hp: &Hyperparameters,
    ) {
        let q = self.q_table.values(state)[action];
        let bootstrap = if terminal {
            0.0
        } else {
            match hp.algorithm {
                Algorithm::QLearning => self.q_table.best_value(next, &hp.allowed_actions),
                Algorithm::Sarsa => match next_action {
                    Some(a) => self.q_table.values(next)[a],
                    // next action unavailable (e.g. action set changed
                    // mid-run): fall back to the off-policy target
                    None => self.q_table.best_value(next, &hp.allowed_actions),
                },
            }
        };
        let updated = q + hp.alpha * (reward + hp.gamma * bootstrap - q);
        self.q_table.set(state, action, updated);
    }

    /// Decay epsilon after a completed episode
    pub fn decay_epsilon(&mut self, hp: &Hyperparameters) {
        self.exploration.decay(hp.epsilon_decay, hp.min_epsilon);
    }

    /// Full reset: wipe the table and re-seed epsilon
    pub fn reset(&mut self, hp: &Hyperparameters) {
        self.q_table.clear();
        self.exploration.set_epsilon(hp.epsilon);
    }
}
