use std::time::Duration;

use log::info;

use crate::data::DataPair;
use crate::math::Matrix;
use crate::network::NetworkModel;
use crate::train::journal::{DeltaStats, TrainingJournal};
use crate::train::progress::TrainingProgress;
use crate::train::train_config::TrainingConfig;
use crate::train::trainer::Trainer;

/// Mini-batches between two `mini_batch` journal entries.
pub const BATCH_LOG_INTERVAL: usize = 100;

/// A trainer that records what the wrapped trainer does.
///
/// Every operation is forwarded to `inner`; around it the journal receives
/// epoch boundaries, the parameter change of every
/// [`BATCH_LOG_INTERVAL`]-th mini-batch, a weight snapshot per epoch and the
/// run's total duration.
pub struct LoggedTrainer<T: Trainer> {
    inner: T,
    journal: TrainingJournal,
    epoch: usize,
    batch_idx: usize,
    // Parameters before the batch currently being journaled.
    before: Option<(Vec<Matrix>, Vec<Matrix>)>,
}

impl<T: Trainer> LoggedTrainer<T> {
    pub fn new(inner: T, journal: TrainingJournal) -> Self {
        LoggedTrainer { inner, journal, epoch: 0, batch_idx: 0, before: None }
    }

    pub fn journal(&self) -> &TrainingJournal {
        &self.journal
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_parts(self) -> (T, TrainingJournal) {
        (self.inner, self.journal)
    }
}

fn deltas(after: &[Matrix], before: &[Matrix]) -> Vec<Matrix> {
    after.iter().zip(before).map(|(a, b)| a - b).collect()
}

impl<T: Trainer> Trainer for LoggedTrainer<T> {
    fn shuffle(&mut self, order: &mut [usize]) {
        self.inner.shuffle(order);
    }

    fn update_mini_batch(&mut self, model: &mut NetworkModel, batch: &[&DataPair], learning_rate: f64) {
        if self.batch_idx % BATCH_LOG_INTERVAL == 0 {
            self.before = Some((model.weights().to_vec(), model.biases().to_vec()));
        }
        self.inner.update_mini_batch(model, batch, learning_rate);
    }

    fn batch_finished(&mut self, model: &NetworkModel, batch_idx: usize, batch_len: usize) {
        self.batch_idx = batch_idx + 1;
        if let Some((old_weights, old_biases)) = self.before.take() {
            let stats = DeltaStats::from_deltas(
                &deltas(model.weights(), &old_weights),
                &deltas(model.biases(), &old_biases),
            );
            self.journal.mini_batch(self.epoch, batch_idx, batch_len, stats);
        }
        self.inner.batch_finished(model, batch_idx, batch_len);
    }

    fn evaluate(&self, model: &NetworkModel, data: &[DataPair]) -> usize {
        self.inner.evaluate(model, data)
    }

    fn run_started(&mut self, config: &TrainingConfig, train_len: usize) {
        info!("training with journal {}", self.journal.path().display());
        self.inner.run_started(config, train_len);
    }

    fn epoch_started(&mut self, epoch: usize, total_epochs: usize) {
        self.epoch = epoch;
        self.batch_idx = 0;
        self.journal.epoch_start(epoch, total_epochs);
        self.inner.epoch_started(epoch, total_epochs);
    }

    fn epoch_finished(&mut self, model: &NetworkModel, progress: &TrainingProgress, elapsed: Duration) {
        self.journal.weights_snapshot(progress.epoch, model.weights(), model.biases());
        self.journal.epoch_end(progress.epoch, progress.test_accuracy, progress.test_total, elapsed);

        if let (Some(correct), Some(total), Some(pct)) =
            (progress.test_accuracy, progress.test_total, progress.accuracy_percent)
        {
            info!(
                "epoch {}/{}: {:.2}% accuracy ({}/{})",
                progress.epoch, progress.total_epochs, pct, correct, total
            );
        } else {
            info!("epoch {}/{} complete", progress.epoch, progress.total_epochs);
        }
        self.inner.epoch_finished(model, progress, elapsed);
    }

    fn run_finished(&mut self, history: &[TrainingProgress], elapsed: Duration) {
        self.journal.training_complete(elapsed);
        if let Some(summary) = self.journal.summary() {
            info!(
                "training complete after {} epochs, final accuracy {:?}, journal {}",
                summary.total_epochs,
                summary.final_accuracy,
                summary.log_file.display()
            );
        }
        self.inner.run_finished(history, elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::train::journal::{read_journal, JournalEntry};
    use crate::train::trainer::SgdTrainer;
    use rand::{rngs::StdRng, SeedableRng};

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("neurite-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn journal_records_the_run() {
        let dir = temp_dir("logged-trainer");
        let journal = TrainingJournal::create(&dir).unwrap();
        let mut trainer = LoggedTrainer::new(SgdTrainer::seeded(3), journal);

        let mut net = NetworkModel::with_rng(vec![2, 3, 2], Activation::Sigmoid, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let data: Vec<DataPair> = (0..5)
            .map(|i| DataPair::labelled(vec![i as f64 / 5.0, 1.0 - i as f64 / 5.0], i % 2, 2))
            .collect();
        let config = TrainingConfig::new(2, 2, 1.0);
        trainer.train(&mut net, &data, Some(&data), &config, |_| {});

        let entries = read_journal(trainer.journal().path()).unwrap();
        let kinds: Vec<&str> = entries.iter().map(|e| match e {
            JournalEntry::EpochStart { .. } => "epoch_start",
            JournalEntry::MiniBatch { .. } => "mini_batch",
            JournalEntry::WeightSnapshot { .. } => "weight_snapshot",
            JournalEntry::EpochEnd { .. } => "epoch_end",
            JournalEntry::TrainingComplete { .. } => "training_complete",
        }).collect();
        assert_eq!(
            kinds,
            vec![
                "epoch_start", "mini_batch", "weight_snapshot", "epoch_end",
                "epoch_start", "mini_batch", "weight_snapshot", "epoch_end",
                "training_complete",
            ]
        );

        let summary = trainer.journal().summary().unwrap();
        assert_eq!(summary.total_epochs, 2);
        assert!(summary.final_accuracy.is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn wrapper_trains_like_the_inner_trainer() {
        let dir = temp_dir("logged-same-weights");
        let data: Vec<DataPair> = (0..6)
            .map(|i| DataPair::labelled(vec![i as f64, 1.0], i % 2, 2))
            .collect();
        let config = TrainingConfig::new(3, 4, 0.5).without_test_data();
        let init = NetworkModel::with_rng(vec![2, 2], Activation::Sigmoid, &mut StdRng::seed_from_u64(6))
            .unwrap();

        let mut plain = init.clone();
        SgdTrainer::seeded(9).train(&mut plain, &data, None, &config, |_| {});

        let mut logged = init;
        let journal = TrainingJournal::create(&dir).unwrap();
        LoggedTrainer::new(SgdTrainer::seeded(9), journal).train(&mut logged, &data, None, &config, |_| {});

        assert_eq!(plain, logged);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
