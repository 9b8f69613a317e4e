use serde::{Serialize, Deserialize};

use crate::activation::Activation;
use crate::math::Matrix;

/// Serialized form of a network: architecture plus every parameter.
///
/// `activation` is kept as the raw token so that an archive written by another
/// tool with an unknown activation is rejected when converted back into a
/// `NetworkModel`, not while reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub sizes: Vec<usize>,
    pub activation: String,
    pub num_layers: usize,
    pub weights: Vec<Matrix>,
    pub biases: Vec<Matrix>,
}

/// JSON view returned by `GET /network/state` and `POST /network/create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkState {
    pub sizes: Vec<usize>,
    pub activation: Activation,
    pub weights: Vec<Vec<Vec<f64>>>,
    pub biases: Vec<Vec<Vec<f64>>>,
}
