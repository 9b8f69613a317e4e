use std::ops::Range;
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::activation::ActivationFns;
use crate::data::DataPair;
use crate::math::{argmax, Matrix};
use crate::network::{classify, NetworkModel};
use crate::train::access::ModelAccess;
use crate::train::cost::QuadraticCost;
use crate::train::progress::TrainingProgress;
use crate::train::train_config::TrainingConfig;

/// Parameter gradients, shape-matched to a network's weights and biases.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub weights: Vec<Matrix>,
    pub biases: Vec<Matrix>,
}

impl Gradients {
    pub fn zeros_like(model: &NetworkModel) -> Gradients {
        Gradients {
            weights: model.weights().iter().map(|w| Matrix::zeros(w.rows, w.cols)).collect(),
            biases: model.biases().iter().map(|b| Matrix::zeros(b.rows, b.cols)).collect(),
        }
    }

    pub fn accumulate(&mut self, other: &Gradients) {
        for (acc, g) in self.weights.iter_mut().zip(&other.weights) {
            *acc += g;
        }
        for (acc, g) in self.biases.iter_mut().zip(&other.biases) {
            *acc += g;
        }
    }
}

/// Contiguous mini-batch partition of `len` items; the last range may be
/// shorter. `size` must be at least 1.
pub fn mini_batches(len: usize, size: usize) -> impl Iterator<Item = Range<usize>> {
    assert!(size > 0, "mini-batch size must be at least 1");
    (0..len).step_by(size).map(move |start| start..(start + size).min(len))
}

/// Gradient of the quadratic cost for a single pair.
pub fn backprop(model: &NetworkModel, input: &[f64], target: &[f64]) -> Gradients {
    let ActivationFns { apply, derivative } = model.fns();
    let layers = model.weights().len();

    // Forward pass, keeping every weighted input and activation.
    let mut activations = Vec::with_capacity(layers + 1);
    let mut zs = Vec::with_capacity(layers);
    activations.push(Matrix::column(input.to_vec()));
    for l in 0..layers {
        let z = model.weighted_input(l, &activations[l]);
        activations.push(z.map(apply));
        zs.push(z);
    }

    // δ_L = (a_L - y) ⊙ σ'(z_L)
    let y = Matrix::column(target.to_vec());
    let mut delta = QuadraticCost::derivative(&activations[layers], &y)
        .hadamard(&zs[layers - 1].map(derivative));

    let mut nabla_w = Vec::with_capacity(layers);
    let mut nabla_b = Vec::with_capacity(layers);
    let mut l = layers - 1;
    loop {
        nabla_w.push(&delta * &activations[l].transpose());
        if l == 0 {
            nabla_b.push(delta);
            break;
        }
        // δ_{l-1} = (W_lᵀ · δ_l) ⊙ σ'(z_{l-1})
        let next = (&model.weights()[l].transpose() * &delta).hadamard(&zs[l - 1].map(derivative));
        nabla_b.push(std::mem::replace(&mut delta, next));
        l -= 1;
    }
    nabla_w.reverse();
    nabla_b.reverse();

    Gradients { weights: nabla_w, biases: nabla_b }
}

/// One SGD step over `batch`: gradients are summed over the whole batch before
/// any parameter moves.
pub fn update_mini_batch(model: &mut NetworkModel, batch: &[&DataPair], learning_rate: f64) {
    if batch.is_empty() {
        return;
    }
    let mut sum = Gradients::zeros_like(model);
    for pair in batch {
        sum.accumulate(&backprop(model, &pair.input, &pair.target));
    }

    let step = learning_rate / batch.len() as f64;
    for (w, nw) in model.weights.iter_mut().zip(&sum.weights) {
        w.sub_scaled(nw, step);
    }
    for (b, nb) in model.biases.iter_mut().zip(&sum.biases) {
        b.sub_scaled(nb, step);
    }
}

/// Number of pairs whose most activated output matches the target's hot index.
pub fn evaluate(model: &NetworkModel, data: &[DataPair]) -> usize {
    data.iter()
        .filter(|pair| classify(&model.feedforward(&pair.input)) == argmax(&pair.target))
        .count()
}

/// Mean quadratic cost over `data`.
pub fn total_cost(model: &NetworkModel, data: &[DataPair]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let total: f64 = data.iter()
        .map(|pair| QuadraticCost::cost(model.feedforward(&pair.input).as_slice(), &pair.target))
        .sum();
    total / data.len() as f64
}

/// The mini-batch SGD driver.
///
/// Implementors supply the shuffle and the per-batch update; the provided
/// [`Trainer::train`] runs the epoch loop and calls the lifecycle hooks, which
/// default to doing nothing.
pub trait Trainer {
    /// Permutes the visiting order for the next epoch.
    fn shuffle(&mut self, order: &mut [usize]);

    fn update_mini_batch(&mut self, model: &mut NetworkModel, batch: &[&DataPair], learning_rate: f64);

    fn evaluate(&self, model: &NetworkModel, data: &[DataPair]) -> usize {
        evaluate(model, data)
    }

    fn run_started(&mut self, _config: &TrainingConfig, _train_len: usize) {}

    fn epoch_started(&mut self, _epoch: usize, _total_epochs: usize) {}

    /// Runs inside the same critical section as the update it follows, so
    /// `model` is the network exactly as that mini-batch left it.
    fn batch_finished(&mut self, _model: &NetworkModel, _batch_idx: usize, _batch_len: usize) {}

    fn epoch_finished(&mut self, _model: &NetworkModel, _progress: &TrainingProgress, _elapsed: Duration) {}

    fn run_finished(&mut self, _history: &[TrainingProgress], _elapsed: Duration) {}

    /// Trains for `config.epochs` epochs, calling `on_progress` once per
    /// completed epoch, and returns every progress record.
    ///
    /// The network is touched only through `model`, once per mini-batch and
    /// once per evaluation.
    fn train<M, F>(
        &mut self,
        model: &mut M,
        data: &[DataPair],
        test_data: Option<&[DataPair]>,
        config: &TrainingConfig,
        mut on_progress: F,
    ) -> Vec<TrainingProgress>
    where
        Self: Sized,
        M: ModelAccess + ?Sized,
        F: FnMut(&TrainingProgress),
    {
        let run_start = Instant::now();
        let test_data = if config.use_test_data { test_data } else { None };
        self.run_started(config, data.len());

        let mut order: Vec<usize> = (0..data.len()).collect();
        let mut history = Vec::new();

        for epoch in 1..=config.epochs {
            let epoch_start = Instant::now();
            self.epoch_started(epoch, config.epochs);
            self.shuffle(&mut order);

            for (batch_idx, range) in mini_batches(order.len(), config.mini_batch_size).enumerate() {
                let batch: Vec<&DataPair> = order[range].iter().map(|&i| &data[i]).collect();
                model.update(|m| {
                    self.update_mini_batch(m, &batch, config.learning_rate);
                    self.batch_finished(m, batch_idx, batch.len());
                });
            }

            let mut progress = TrainingProgress::new(epoch, config.epochs);
            if let Some(test) = test_data {
                let correct = model.read(|m| self.evaluate(m, test));
                progress = progress.with_evaluation(correct, test.len());
            }

            let elapsed = epoch_start.elapsed();
            model.read(|m| self.epoch_finished(m, &progress, elapsed));
            debug!("epoch {}/{} done in {:?}", epoch, config.epochs, elapsed);

            on_progress(&progress);
            history.push(progress);
        }

        self.run_finished(&history, run_start.elapsed());
        history
    }
}

/// Plain mini-batch SGD with a caller-chosen RNG for shuffling.
pub struct SgdTrainer<R: Rng = StdRng> {
    rng: R,
}

impl<R: Rng> SgdTrainer<R> {
    pub fn new(rng: R) -> Self {
        SgdTrainer { rng }
    }
}

impl SgdTrainer<StdRng> {
    /// Reproducible shuffling.
    pub fn seeded(seed: u64) -> Self {
        SgdTrainer::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        SgdTrainer::new(StdRng::from_entropy())
    }

    /// Seeded when `config.seed` is set, entropy-backed otherwise.
    pub fn for_config(config: &TrainingConfig) -> Self {
        match config.seed {
            Some(seed) => SgdTrainer::seeded(seed),
            None => SgdTrainer::from_entropy(),
        }
    }
}

impl<R: Rng> Trainer for SgdTrainer<R> {
    fn shuffle(&mut self, order: &mut [usize]) {
        order.shuffle(&mut self.rng);
    }

    fn update_mini_batch(&mut self, model: &mut NetworkModel, batch: &[&DataPair], learning_rate: f64) {
        update_mini_batch(model, batch, learning_rate);
    }

    fn run_started(&mut self, config: &TrainingConfig, train_len: usize) {
        info!(
            "training on {} pairs: {} epochs, mini-batch {}, learning rate {}",
            train_len, config.epochs, config.mini_batch_size, config.learning_rate
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;

    fn pair(input: &[f64], target: &[f64]) -> DataPair {
        DataPair::new(input.to_vec(), target.to_vec())
    }

    #[test]
    fn seven_pairs_in_threes() {
        let sizes: Vec<usize> = mini_batches(7, 3).map(|r| r.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(mini_batches(0, 4).count(), 0);
        assert_eq!(mini_batches(4, 10).collect::<Vec<_>>(), vec![0..4]);
    }

    #[test]
    fn gradient_shapes_match_parameters() {
        let net = NetworkModel::with_rng(vec![3, 4, 2], Activation::Sigmoid, &mut StdRng::seed_from_u64(4))
            .unwrap();
        let g = backprop(&net, &[0.1, 0.5, 0.9], &[1.0, 0.0]);
        for (gw, w) in g.weights.iter().zip(net.weights()) {
            assert_eq!(gw.shape(), w.shape());
        }
        for (gb, b) in g.biases.iter().zip(net.biases()) {
            assert_eq!(gb.shape(), b.shape());
        }
    }

    #[test]
    fn backprop_agrees_with_finite_differences() {
        let net = NetworkModel::with_rng(vec![2, 3, 2], Activation::Sigmoid, &mut StdRng::seed_from_u64(11))
            .unwrap();
        let x = [0.3, -0.7];
        let y = [0.0, 1.0];
        let g = backprop(&net, &x, &y);
        let cost = |m: &NetworkModel| QuadraticCost::cost(m.feedforward(&x).as_slice(), &y);
        let h = 1e-6;

        for layer in 0..2 {
            let (rows, cols) = net.weights()[layer].shape();
            for r in 0..rows {
                for c in 0..cols {
                    let mut plus = net.clone();
                    let v = plus.weights[layer].get(r, c);
                    plus.weights[layer].set(r, c, v + h);
                    let mut minus = net.clone();
                    minus.weights[layer].set(r, c, v - h);
                    let numeric = (cost(&plus) - cost(&minus)) / (2.0 * h);
                    let analytic = g.weights[layer].get(r, c);
                    assert!((numeric - analytic).abs() < 1e-6, "w[{layer}][{r},{c}]: {numeric} vs {analytic}");
                }
                let mut plus = net.clone();
                let v = plus.biases[layer].get(r, 0);
                plus.biases[layer].set(r, 0, v + h);
                let mut minus = net.clone();
                minus.biases[layer].set(r, 0, v - h);
                let numeric = (cost(&plus) - cost(&minus)) / (2.0 * h);
                assert!((numeric - g.biases[layer].get(r, 0)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn one_step_lowers_cost() {
        let mut net = NetworkModel::with_rng(vec![2, 4, 2], Activation::Sigmoid, &mut StdRng::seed_from_u64(8))
            .unwrap();
        let data = vec![pair(&[1.0, 0.0], &[0.0, 1.0])];
        let before = total_cost(&net, &data);
        let batch: Vec<&DataPair> = data.iter().collect();
        update_mini_batch(&mut net, &batch, 0.5);
        assert!(total_cost(&net, &data) < before);
    }

    #[test]
    fn identity_network_evaluates_correctly() {
        let net = NetworkModel::from_parts(
            vec![2, 2],
            Activation::ReLU,
            vec![Matrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap()],
            vec![Matrix::zeros(2, 1)],
        )
        .unwrap();
        assert_eq!(evaluate(&net, &[pair(&[1.0, 0.0], &[1.0, 0.0])]), 1);
        assert_eq!(evaluate(&net, &[pair(&[1.0, 0.0], &[0.0, 1.0])]), 0);
    }

    #[test]
    fn train_reports_every_epoch() {
        let mut net = NetworkModel::with_rng(vec![2, 3, 2], Activation::Sigmoid, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let data = vec![
            pair(&[0.0, 1.0], &[0.0, 1.0]),
            pair(&[1.0, 0.0], &[1.0, 0.0]),
            pair(&[0.9, 0.1], &[1.0, 0.0]),
        ];
        let config = TrainingConfig::new(4, 2, 1.0).with_seed(1);
        let mut seen = Vec::new();
        let history = SgdTrainer::seeded(1).train(&mut net, &data, Some(&data), &config, |p| seen.push(p.epoch));
        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].test_total, Some(3));
        assert!(history[3].accuracy_percent.is_some());
    }

    #[test]
    fn skipping_test_data_leaves_evaluation_empty() {
        let mut net = NetworkModel::with_rng(vec![2, 2], Activation::Sigmoid, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let data = vec![pair(&[0.0, 1.0], &[0.0, 1.0])];
        let config = TrainingConfig::new(1, 1, 1.0).without_test_data();
        let history = SgdTrainer::seeded(2).train(&mut net, &data, Some(&data), &config, |_| {});
        assert_eq!(history[0].test_accuracy, None);
    }

    struct CountingTrainer {
        inner: SgdTrainer,
        batches: Vec<(usize, usize)>,
    }

    impl Trainer for CountingTrainer {
        fn shuffle(&mut self, order: &mut [usize]) {
            self.inner.shuffle(order);
        }

        fn update_mini_batch(&mut self, model: &mut NetworkModel, batch: &[&DataPair], learning_rate: f64) {
            self.inner.update_mini_batch(model, batch, learning_rate);
        }

        fn batch_finished(&mut self, _model: &NetworkModel, batch_idx: usize, batch_len: usize) {
            self.batches.push((batch_idx, batch_len));
        }
    }

    #[test]
    fn batch_hook_sees_every_mini_batch() {
        let mut net = NetworkModel::with_rng(vec![2, 2], Activation::Sigmoid, &mut StdRng::seed_from_u64(5))
            .unwrap();
        let data: Vec<DataPair> = (0..5).map(|i| pair(&[i as f64, 1.0], &[1.0, 0.0])).collect();
        let config = TrainingConfig::new(2, 2, 0.5).without_test_data();
        let mut trainer = CountingTrainer { inner: SgdTrainer::seeded(4), batches: Vec::new() };
        trainer.train(&mut net, &data, None, &config, |_| {});
        assert_eq!(trainer.batches, vec![(0, 2), (1, 2), (2, 1), (0, 2), (1, 2), (2, 1)]);
    }
}
