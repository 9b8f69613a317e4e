use serde::{Deserialize, Serialize};

use crate::train::TrainingConfig;

/// Optional annotations saved next to a model archive.
/// All fields are Option<> so archives saved without a run deserialize cleanly,
/// and unknown fields written by other tools are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelMetadata {
    /// Hyperparameters of the run that produced the weights.
    #[serde(default)]
    pub training_config: Option<TrainingConfig>,
    /// Test accuracy (percent) after the last epoch.
    #[serde(default)]
    pub final_accuracy: Option<f64>,
}

impl ModelMetadata {
    pub fn new(training_config: TrainingConfig, final_accuracy: Option<f64>) -> Self {
        ModelMetadata { training_config: Some(training_config), final_accuracy }
    }
}
