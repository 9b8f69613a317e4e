pub mod activation;
pub mod codec;
pub mod data;
pub mod error;
pub mod math;
pub mod network;
pub mod session;
pub mod store;
pub mod train;

// Convenience re-exports
pub use activation::Activation;
pub use codec::ModelMetadata;
pub use data::{DataPair, Mnist, MnistLoader, Partition};
pub use error::{Error, Resource, Result};
pub use math::Matrix;
pub use network::{NetworkModel, NetworkState, Prediction};
pub use session::{StreamPoll, TrainingSession, TrainingStream};
pub use store::{DirectoryStore, ModelHub};
pub use train::{SgdTrainer, Trainer, TrainingConfig, TrainingEvent, TrainingProgress};
