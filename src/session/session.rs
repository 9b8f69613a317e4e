use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::codec::{self, ModelMetadata};
use crate::data::{self, DataPair, Mnist, Partition, Sample};
use crate::error::{Error, Resource, Result};
use crate::network::{NetworkModel, NetworkState, Prediction};
use crate::session::guard::TrainingGuard;
use crate::session::stream::{RunRecord, TrainingJob, TrainingStream};
use crate::train::TrainingConfig;

/// Every layer's activation for one input, the input layer included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerActivations {
    pub activations: Vec<Vec<f64>>,
    pub layer_sizes: Vec<usize>,
}

type SharedModel = Arc<RwLock<NetworkModel>>;

/// The current network, the loaded dataset and the single training run
/// allowed at a time.
///
/// A session starts idle. [`TrainingSession::start_train`] moves it to
/// training until the returned stream's worker finishes; replacing the network
/// meanwhile is a `Conflict`. Reads are served throughout, between
/// mini-batches.
pub struct TrainingSession {
    network: RwLock<Option<SharedModel>>,
    dataset: RwLock<Option<Arc<Mnist>>>,
    training: Arc<AtomicBool>,
    rng: Mutex<StdRng>,
    journal_dir: Option<PathBuf>,
    last_run: Arc<Mutex<Option<RunRecord>>>,
}

impl Default for TrainingSession {
    fn default() -> Self {
        TrainingSession::new()
    }
}

impl TrainingSession {
    /// Session drawing initial weights and unseeded shuffles from OS entropy.
    pub fn new() -> Self {
        TrainingSession::with_rng(StdRng::from_entropy())
    }

    /// Session whose network initialization and shuffling are reproducible.
    pub fn seeded(seed: u64) -> Self {
        TrainingSession::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        TrainingSession {
            network: RwLock::new(None),
            dataset: RwLock::new(None),
            training: Arc::new(AtomicBool::new(false)),
            rng: Mutex::new(rng),
            journal_dir: None,
            last_run: Arc::new(Mutex::new(None)),
        }
    }

    /// Runs started from now on write a training journal under `dir`.
    pub fn with_journal_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.journal_dir = Some(dir.into());
        self
    }

    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Acquire)
    }

    pub fn has_network(&self) -> bool {
        self.network.read().is_some()
    }

    fn current(&self) -> Result<SharedModel> {
        self.network.read().clone().ok_or(Error::Unavailable(Resource::Network))
    }

    /// Installs `model` unless a run is in progress.
    fn replace(&self, model: NetworkModel) -> Result<NetworkState> {
        let mut slot = self.network.write();
        if self.is_training() {
            return Err(Error::Conflict("cannot replace the network while training".into()));
        }
        let state = model.state();
        *slot = Some(Arc::new(RwLock::new(model)));
        Ok(state)
    }

    /// Replaces the current network with a freshly initialized one.
    pub fn create_network(&self, sizes: Vec<usize>, activation: Activation) -> Result<NetworkState> {
        let model = NetworkModel::with_rng(sizes, activation, &mut *self.rng.lock())?;
        info!("created network {:?} ({})", model.sizes(), activation);
        self.replace(model)
    }

    pub fn network_state(&self) -> Result<NetworkState> {
        Ok(self.current()?.read().state())
    }

    /// Copy of the current network.
    pub fn snapshot(&self) -> Result<NetworkModel> {
        Ok(self.current()?.read().clone())
    }

    fn check_input(model: &NetworkModel, input: &[f64]) -> Result<()> {
        if input.len() != model.input_size() {
            return Err(Error::InvalidInput(format!(
                "expected {} input values, got {}",
                model.input_size(),
                input.len()
            )));
        }
        Ok(())
    }

    pub fn predict(&self, input: &[f64]) -> Result<Prediction> {
        let shared = self.current()?;
        let model = shared.read();
        TrainingSession::check_input(&model, input)?;
        Ok(model.predict(input))
    }

    pub fn activations(&self, input: &[f64]) -> Result<LayerActivations> {
        let shared = self.current()?;
        let model = shared.read();
        TrainingSession::check_input(&model, input)?;
        Ok(LayerActivations {
            activations: model.all_activations(input).into_iter().map(|m| m.into_vec()).collect(),
            layer_sizes: model.sizes().to_vec(),
        })
    }

    pub fn set_dataset(&self, mnist: Mnist) {
        *self.dataset.write() = Some(Arc::new(mnist));
    }

    pub fn dataset(&self) -> Option<Arc<Mnist>> {
        self.dataset.read().clone()
    }

    /// `count` random images of one partition.
    pub fn samples(&self, partition: Partition, count: usize) -> Result<Vec<Sample>> {
        let mnist = self.dataset().ok_or(Error::Unavailable(Resource::Dataset))?;
        Ok(data::sample(mnist.partition(partition), count, &mut *self.rng.lock()))
    }

    /// History and accuracy of the most recent completed run.
    pub fn last_run(&self) -> Option<RunRecord> {
        self.last_run.lock().clone()
    }

    /// Claims the session for a run of `config` on the current network and
    /// dataset. The run itself starts when the stream is first polled.
    ///
    /// Pair widths are checked on the first pair of each partition used.
    pub fn start_train(&self, mut config: TrainingConfig) -> Result<TrainingStream> {
        config.validate()?;

        // The slot stays read-locked until the flag is claimed.
        let slot = self.network.read();
        let model = slot.clone().ok_or(Error::Unavailable(Resource::Network))?;
        let data = self.dataset().ok_or(Error::Unavailable(Resource::Dataset))?;

        let (inputs, outputs) = {
            let m = model.read();
            (m.input_size(), m.output_size())
        };
        let mut firsts: Vec<&DataPair> = data.training.first().into_iter().collect();
        if config.use_test_data {
            firsts.extend(data.test.first());
        }
        for pair in firsts {
            if pair.input.len() != inputs || pair.target.len() != outputs {
                return Err(Error::InvalidInput(format!(
                    "dataset pairs are {}→{} but the network is {}→{}",
                    pair.input.len(),
                    pair.target.len(),
                    inputs,
                    outputs
                )));
            }
        }

        let guard = TrainingGuard::acquire(&self.training)?;
        drop(slot);

        if config.seed.is_none() {
            config.seed = Some(self.rng.lock().gen());
        }
        info!(
            "training started: {} epochs on {} pairs, seed {:?}",
            config.epochs,
            data.training.len(),
            config.seed
        );

        Ok(TrainingStream::new(TrainingJob {
            guard,
            model,
            data,
            config,
            journal_dir: self.journal_dir.clone(),
            last_run: Arc::clone(&self.last_run),
        }))
    }

    /// Writes the current network to `path`, with the last run's metadata.
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let model = self.snapshot()?;
        let metadata = self.last_run().map(|run| ModelMetadata::new(run.config, run.final_accuracy));
        codec::save(&model, path, metadata.as_ref())
    }

    /// Loads the archive at `path` as the current network.
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<(NetworkState, Option<ModelMetadata>)> {
        let path = path.as_ref();
        let (model, metadata) = codec::load(path)?;
        let state = self.replace(model)?;
        info!("loaded model from {}", path.display());
        Ok((state, metadata))
    }

    /// Installs an already loaded model, e.g. one fetched from a store.
    pub fn install(&self, model: NetworkModel) -> Result<NetworkState> {
        self.replace(model)
    }
}
