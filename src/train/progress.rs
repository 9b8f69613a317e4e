use serde::{Serialize, Deserialize};

/// Per-epoch progress record.
///
/// One value is produced at the end of every completed epoch. The evaluation
/// fields are only set when the run evaluates on test data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingProgress {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Correctly classified test pairs.
    pub test_accuracy: Option<usize>,
    /// Size of the test partition.
    pub test_total: Option<usize>,
    /// `test_accuracy / test_total` as a percentage.
    pub accuracy_percent: Option<f64>,
}

impl TrainingProgress {
    pub fn new(epoch: usize, total_epochs: usize) -> Self {
        TrainingProgress {
            epoch,
            total_epochs,
            test_accuracy: None,
            test_total: None,
            accuracy_percent: None,
        }
    }

    pub fn with_evaluation(mut self, correct: usize, total: usize) -> Self {
        self.test_accuracy = Some(correct);
        self.test_total = Some(total);
        if total > 0 {
            self.accuracy_percent = Some(correct as f64 / total as f64 * 100.0);
        }
        self
    }
}

/// An item of a training stream: one progress record per epoch, then the
/// completion sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    Progress(TrainingProgress),
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluation_sets_percentage() {
        let p = TrainingProgress::new(1, 3).with_evaluation(9, 12);
        assert_eq!(p.accuracy_percent, Some(75.0));
    }

    #[test]
    fn unevaluated_epochs_serialize_nulls() {
        let json = serde_json::to_value(TrainingProgress::new(2, 5)).unwrap();
        assert_eq!(json["epoch"], 2);
        assert!(json["test_accuracy"].is_null());
    }
}
