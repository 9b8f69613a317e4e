pub mod artifact;
pub mod network;

pub use artifact::{ModelArtifact, NetworkState};
pub use network::{classify, NetworkModel, Prediction};
