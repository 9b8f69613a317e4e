use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use flate2::read::GzDecoder;
use log::{info, warn};
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::data::fetch::{Fetch, HttpFetcher};
use crate::data::idx::parse_idx_pair;
use crate::data::pair::DataPair;
use crate::error::{Error, Result};
use crate::math::argmax;

pub const MNIST_BASE_URL: &str = "https://storage.googleapis.com/cvdf-datasets/mnist/";
pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte.gz";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte.gz";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte.gz";
pub const TEST_LABELS: &str = "t10k-labels-idx1-ubyte.gz";

/// Digits 0-9.
pub const CLASSES: usize = 10;
/// 28 × 28 pixels.
pub const PIXELS: usize = 784;
/// Trailing training images held out for validation.
pub const VALIDATION_SIZE: usize = 10_000;
/// Images in the test partition.
pub const TEST_SIZE: usize = 10_000;

/// The three MNIST partitions, every target one-hot.
#[derive(Debug, Clone, Default)]
pub struct Mnist {
    pub training: Vec<DataPair>,
    pub validation: Vec<DataPair>,
    pub test: Vec<DataPair>,
}

/// Names a partition in requests such as `GET /mnist/samples?dataset=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Train,
    Validation,
    Test,
}

impl FromStr for Partition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Partition::Train),
            "validation" => Ok(Partition::Validation),
            "test" => Ok(Partition::Test),
            _ => Err(Error::InvalidInput(
                "invalid dataset, use 'train', 'validation', or 'test'".into(),
            )),
        }
    }
}

impl Mnist {
    pub fn partition(&self, which: Partition) -> &[DataPair] {
        match which {
            Partition::Train => &self.training,
            Partition::Validation => &self.validation,
            Partition::Test => &self.test,
        }
    }
}

/// One dataset image for display: flattened pixels and its digit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub pixels: Vec<f64>,
    pub label: usize,
}

/// `min(count, data.len())` distinct pairs chosen uniformly at random.
pub fn sample<R: Rng + ?Sized>(data: &[DataPair], count: usize, rng: &mut R) -> Vec<Sample> {
    let amount = count.min(data.len());
    rand::seq::index::sample(rng, data.len(), amount)
        .into_iter()
        .map(|i| Sample {
            pixels: data[i].input.clone(),
            label: argmax(&data[i].target),
        })
        .collect()
}

/// Loads MNIST from a local cache of the four IDX gzip files, downloading
/// whatever is missing.
pub struct MnistLoader {
    data_dir: PathBuf,
    base_url: String,
    validation_size: usize,
    fetcher: Box<dyn Fetch>,
}

impl MnistLoader {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        MnistLoader {
            data_dir: data_dir.into(),
            base_url: MNIST_BASE_URL.to_owned(),
            validation_size: VALIDATION_SIZE,
            fetcher: Box::new(HttpFetcher::new()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_fetcher<F: Fetch + 'static>(mut self, fetcher: F) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    pub fn with_validation_size(mut self, validation_size: usize) -> Self {
        self.validation_size = validation_size;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn load(&self) -> Result<Mnist> {
        let train_images = self.read_cached(TRAIN_IMAGES)?;
        let train_labels = self.read_cached(TRAIN_LABELS)?;
        let test_images = self.read_cached(TEST_IMAGES)?;
        let test_labels = self.read_cached(TEST_LABELS)?;

        let mut training = parse_idx_pair(&train_images, &train_labels, CLASSES)?;
        let test = parse_idx_pair(&test_images, &test_labels, CLASSES)?;
        let split = training.len() - self.validation_size.min(training.len());
        let validation = training.split_off(split);

        info!(
            "MNIST loaded: {} training, {} validation, {} test pairs",
            training.len(),
            validation.len(),
            test.len()
        );
        Ok(Mnist { training, validation, test })
    }

    /// Path of `file` in the cache, downloading it first if absent.
    fn ensure_cached(&self, file: &str) -> Result<PathBuf> {
        let path = self.data_dir.join(file);
        if path.exists() {
            return Ok(path);
        }

        fs::create_dir_all(&self.data_dir)
            .map_err(|e| Error::dataset(format!("cannot create {}", self.data_dir.display()), e))?;

        let url = format!("{}{}", self.base_url, file);
        info!("downloading {}", url);
        let bytes = self.fetcher
            .fetch(&url)
            .map_err(|e| Error::dataset(format!("failed to download {url}"), e))?;

        // The cache only ever holds complete files.
        let partial = self.data_dir.join(format!("{file}.part"));
        fs::write(&partial, &bytes)
            .and_then(|_| fs::rename(&partial, &path))
            .map_err(|e| Error::dataset(format!("cannot write {}", path.display()), e))?;
        Ok(path)
    }

    fn read_cached(&self, file: &str) -> Result<Vec<u8>> {
        let path = self.ensure_cached(file)?;
        let compressed = fs::File::open(&path)
            .map_err(|e| Error::dataset(format!("cannot open {}", path.display()), e))?;
        let mut bytes = Vec::new();
        if let Err(e) = GzDecoder::new(compressed).read_to_end(&mut bytes) {
            // Corrupt copies leave the cache.
            if let Err(rm) = fs::remove_file(&path) {
                warn!("cannot remove corrupt {}: {}", path.display(), rm);
            }
            return Err(Error::dataset(format!("cannot decompress {}", path.display()), e));
        }
        Ok(bytes)
    }
}
