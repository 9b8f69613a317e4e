use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

fn default_mini_batch_size() -> usize {
    10
}

fn default_learning_rate() -> f64 {
    3.0
}

fn default_use_test_data() -> bool {
    true
}

/// Hyperparameters of one training run.
///
/// # Fields
/// - `epochs`: full passes over the training data
/// - `mini_batch_size`: pairs per gradient step; the last batch of an epoch
///   may be shorter
/// - `learning_rate`: SGD step size (η)
/// - `use_test_data`: evaluate on the test partition after every epoch
/// - `seed`: seeds the run's shuffling RNG; recorded in model metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    #[serde(default = "default_mini_batch_size")]
    pub mini_batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_use_test_data")]
    pub use_test_data: bool,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl TrainingConfig {
    /// Creates a config that evaluates on test data and has no seed.
    pub fn new(epochs: usize, mini_batch_size: usize, learning_rate: f64) -> Self {
        TrainingConfig {
            epochs,
            mini_batch_size,
            learning_rate,
            use_test_data: true,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn without_test_data(mut self) -> Self {
        self.use_test_data = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be greater than 0".into()));
        }
        if self.mini_batch_size == 0 {
            return Err(Error::InvalidConfig("mini_batch_size must be greater than 0".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}
