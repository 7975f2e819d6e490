use rand::{thread_rng, Rng};

/// Exploration policy result
pub enum Choice {
    Explore,
    Exploit,
}

/// Epsilon greedy exploration with a stateful, per-episode multiplicative
/// decay
///
/// A time-indexed decay curve cannot absorb mid-run hyperparameter hot-swaps,
/// so the policy holds the current epsilon directly and the controller
/// re-seeds it on configuration changes.
#[derive(Clone, Debug)]
pub struct EpsilonGreedy {
    epsilon: f64,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    /// Invoke the policy for the current step
    pub fn choose(&self) -> Choice {
        if thread_rng().gen::<f64>() < self.epsilon {
            Choice::Explore
        } else {
            Choice::Exploit
        }
    }

    /// Apply one episode of decay: `epsilon = max(floor, epsilon * rate)`
    pub fn decay(&mut self, rate: f64, floor: f64) {
        if self.epsilon > floor {
            self.epsilon = (self.epsilon * rate).max(floor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_epsilon_always_exploits() {
        let policy = EpsilonGreedy::new(0.0);
        for _ in 0..100 {
            assert!(matches!(policy.choose(), Choice::Exploit));
        }
    }

    #[test]
    fn one_epsilon_always_explores() {
        let policy = EpsilonGreedy::new(1.0);
        for _ in 0..100 {
            assert!(matches!(policy.choose(), Choice::Explore));
        }
    }

    #[test]
    fn decay_is_multiplicative_with_floor() {
        let mut policy = EpsilonGreedy::new(1.0);
        for _ in 0..10 {
            policy.decay(0.5, 1e-4);
        }
        assert!((policy.epsilon() - (0.5f64).powi(10)).abs() < 1e-12);

        for _ in 0..20 {
            policy.decay(0.5, 1e-4);
        }
        assert_eq!(policy.epsilon(), 1e-4, "floor holds");
    }
}
