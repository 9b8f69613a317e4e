use std::env;
use std::io;
use std::path::PathBuf;

use neurite::data::mnist::MNIST_BASE_URL;
use neurite::{DirectoryStore, ModelHub};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;

/// Server settings read from the environment.
///
/// | variable         | default                         |
/// |------------------|---------------------------------|
/// | `HOST`           | `127.0.0.1`                     |
/// | `PORT`           | `8000`                          |
/// | `DATA_DIR`       | `data`                          |
/// | `MODEL_DIR`      | `models`                        |
/// | `HUB_DIR`        | unset (no model store)          |
/// | `JOURNAL_DIR`    | unset (no training journal)     |
/// | `MNIST_BASE_URL` | the public MNIST mirror         |
/// | `DEFAULT_MODEL`  | unset                           |
/// | `SEED`           | unset (entropy)                 |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub model_dir: PathBuf,
    pub hub_dir: Option<PathBuf>,
    pub journal_dir: Option<PathBuf>,
    pub mnist_base_url: String,
    pub default_model: Option<String>,
    pub seed: Option<u64>,
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> io::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{name}={raw}: {e}"))),
        None => Ok(None),
    }
}

impl ServerConfig {
    pub fn from_env() -> io::Result<ServerConfig> {
        Ok(ServerConfig {
            host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned()),
            port: parse_var("PORT")?.unwrap_or(DEFAULT_PORT),
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data")),
            model_dir: var("MODEL_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("models")),
            hub_dir: var("HUB_DIR").map(PathBuf::from),
            journal_dir: var("JOURNAL_DIR").map(PathBuf::from),
            mnist_base_url: var("MNIST_BASE_URL").unwrap_or_else(|| MNIST_BASE_URL.to_owned()),
            default_model: var("DEFAULT_MODEL"),
            seed: parse_var("SEED")?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The published-model store, caching fetched models under
    /// `MODEL_DIR/cache`.
    pub fn hub(&self) -> Option<ModelHub> {
        let root = self.hub_dir.as_ref()?;
        Some(ModelHub::new(DirectoryStore::new(root.clone()), self.model_dir.join("cache")))
    }

    /// Archive path of a model saved under `name`.
    pub fn model_path(&self, name: &str) -> PathBuf {
        self.model_dir.join(format!("{name}.safetensors"))
    }
}
