use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::codec::{self, ModelMetadata};
use crate::error::{Error, Result};
use crate::network::NetworkModel;
use crate::store::card::model_card;
use crate::store::directory::BlobStore;
use crate::train::journal::now_ms;
use crate::train::TrainingConfig;

pub const ARCHIVE_EXT: &str = "safetensors";

/// Architecture block of a published model's JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    pub sizes: Vec<usize>,
    pub activation: String,
}

/// Test-set figures of a published model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub test_accuracy: f64,
    pub test_samples: usize,
}

/// `{name}.json` as written by [`ModelHub::publish`].
///
/// Carries `training_config` and `final_accuracy` under the sidecar names, so a
/// fetched copy also reads back as [`ModelMetadata`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedModel {
    pub name: String,
    pub description: String,
    pub architecture: Architecture,
    pub training_config: Option<TrainingConfig>,
    pub final_accuracy: Option<f64>,
    pub performance: Option<Performance>,
    pub created_at_ms: u64,
}

/// Files a publish wrote, by role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub model: String,
    pub metadata: String,
    pub readme: Option<String>,
}

/// Named models in a [`BlobStore`], with a local cache for fetched archives.
pub struct ModelHub {
    store: Box<dyn BlobStore>,
    cache_dir: PathBuf,
}

impl ModelHub {
    pub fn new<S: BlobStore + 'static, P: Into<PathBuf>>(store: S, cache_dir: P) -> Self {
        ModelHub { store: Box::new(store), cache_dir: cache_dir.into() }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Local path of the cached archive for `name`.
    pub fn cached_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{name}.{ARCHIVE_EXT}"))
    }

    /// Copies `name` into the cache unless already there, then loads it.
    pub fn fetch(&self, name: &str) -> Result<(NetworkModel, Option<ModelMetadata>)> {
        let archive = self.cached_path(name);
        if archive.exists() {
            info!("model {} found in cache", name);
        } else {
            let bytes = self.store
                .get(&format!("{name}.{ARCHIVE_EXT}"))?
                .ok_or_else(|| Error::ModelNotFound(name.to_owned()))?;
            fs::create_dir_all(&self.cache_dir)?;
            fs::write(&archive, bytes)?;
            if let Some(json) = self.store.get(&format!("{name}.json"))? {
                fs::write(codec::sidecar_path(&archive), json)?;
            }
            info!("model {} fetched into {}", name, self.cache_dir.display());
        }
        codec::load(&archive)
    }

    /// Publishes the archive at `path` (and its sidecar, if any) as `name`.
    ///
    /// The README model card is only written when an accuracy is known:
    /// `accuracy` if given, else the sidecar's `final_accuracy`.
    pub fn publish<P: AsRef<Path>>(
        &self,
        path: P,
        name: &str,
        description: &str,
        accuracy: Option<f64>,
    ) -> Result<Published> {
        let path = path.as_ref();
        let (model, metadata) = codec::load(path)?;
        let accuracy = accuracy.or_else(|| metadata.as_ref().and_then(|m| m.final_accuracy));

        let published = PublishedModel {
            name: name.to_owned(),
            description: description.to_owned(),
            architecture: Architecture {
                sizes: model.sizes().to_vec(),
                activation: model.activation().to_string(),
            },
            training_config: metadata.as_ref().and_then(|m| m.training_config.clone()),
            final_accuracy: accuracy,
            performance: accuracy.map(|test_accuracy| Performance {
                test_accuracy,
                test_samples: crate::data::mnist::TEST_SIZE,
            }),
            created_at_ms: now_ms(),
        };
        let json = serde_json::to_vec_pretty(&published)
            .map_err(|e| Error::InvalidModelFormat(e.to_string()))?;

        let model_file = format!("{name}.{ARCHIVE_EXT}");
        let metadata_file = format!("{name}.json");
        self.store.put(&model_file, &codec::encode(&model)?)?;
        self.store.put(&metadata_file, &json)?;

        let readme = match accuracy {
            Some(acc) => {
                let card = model_card(
                    name,
                    description,
                    model.sizes(),
                    model.activation().as_str(),
                    metadata.as_ref(),
                    acc,
                );
                self.store.put("README.md", card.as_bytes())?;
                Some("README.md".to_owned())
            }
            None => {
                warn!("no accuracy known for {}, skipping model card", name);
                None
            }
        };

        info!("published {} from {}", name, path.display());
        Ok(Published { model: model_file, metadata: metadata_file, readme })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::store::directory::DirectoryStore;
    use rand::{rngs::StdRng, SeedableRng};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("neurite-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn publish_then_fetch_round_trip() {
        let dir = temp_dir("hub-round-trip");
        let net = NetworkModel::with_rng(vec![3, 4, 2], Activation::Sigmoid, &mut StdRng::seed_from_u64(9))
            .unwrap();
        let local = dir.join("work").join("trained.safetensors");
        let meta = ModelMetadata::new(TrainingConfig::new(2, 5, 1.5).with_seed(4), Some(88.0));
        codec::save(&net, &local, Some(&meta)).unwrap();

        let hub = ModelHub::new(DirectoryStore::new(dir.join("remote")), dir.join("cache"));
        let published = hub.publish(&local, "digits", "test model", None).unwrap();
        assert_eq!(published.model, "digits.safetensors");
        assert_eq!(published.readme.as_deref(), Some("README.md"));
        assert!(dir.join("remote").join("README.md").exists());

        let info: PublishedModel =
            serde_json::from_slice(&fs::read(dir.join("remote").join("digits.json")).unwrap()).unwrap();
        assert_eq!(info.architecture.sizes, vec![3, 4, 2]);
        assert_eq!(info.final_accuracy, Some(88.0));

        let (fetched, fetched_meta) = hub.fetch("digits").unwrap();
        assert_eq!(fetched, net);
        assert_eq!(fetched_meta, Some(meta));
        assert!(hub.cached_path("digits").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn publish_without_accuracy_skips_card() {
        let dir = temp_dir("hub-no-card");
        let net = NetworkModel::with_rng(vec![2, 2], Activation::ReLU, &mut StdRng::seed_from_u64(1)).unwrap();
        let local = dir.join("plain.safetensors");
        codec::save(&net, &local, None).unwrap();

        let hub = ModelHub::new(DirectoryStore::new(dir.join("remote")), dir.join("cache"));
        let published = hub.publish(&local, "plain", "", None).unwrap();
        assert_eq!(published.readme, None);
        assert!(!dir.join("remote").join("README.md").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn fetching_unknown_model_is_not_found() {
        let dir = temp_dir("hub-missing");
        let hub = ModelHub::new(DirectoryStore::new(dir.join("remote")), dir.join("cache"));
        assert!(matches!(hub.fetch("ghost"), Err(Error::ModelNotFound(_))));
    }
}
