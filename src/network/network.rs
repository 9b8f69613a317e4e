use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::{Activation, ActivationFns};
use crate::error::{Error, Result};
use crate::math::{argmax, Matrix};
use crate::network::artifact::{ModelArtifact, NetworkState};

/// A fully-connected feedforward network.
///
/// Layer `i` maps `sizes[i]` inputs to `sizes[i + 1]` outputs through
/// `weights[i]` (`sizes[i+1] × sizes[i]`) and `biases[i]` (`sizes[i+1] × 1`).
/// The architecture is fixed at construction; only the trainer changes the
/// parameters.
#[derive(Debug, Clone)]
pub struct NetworkModel {
    sizes: Vec<usize>,
    activation: Activation,
    fns: ActivationFns,
    pub(crate) weights: Vec<Matrix>,
    pub(crate) biases: Vec<Matrix>,
}

/// Classification read-out of one forward pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_digit: usize,
    pub confidence: f64,
    pub probabilities: Vec<f64>,
}

fn check_sizes(sizes: &[usize]) -> Result<()> {
    if sizes.len() < 2 {
        return Err(Error::InvalidArchitecture(format!(
            "network must have at least 2 layers, got {}",
            sizes.len()
        )));
    }
    if let Some(i) = sizes.iter().position(|&s| s == 0) {
        return Err(Error::InvalidArchitecture(format!("layer {i} has zero width")));
    }
    Ok(())
}

impl NetworkModel {
    /// Builds a network with standard-normal weights and biases drawn from OS
    /// entropy.
    pub fn new(sizes: Vec<usize>, activation: Activation) -> Result<NetworkModel> {
        NetworkModel::with_rng(sizes, activation, &mut rand::thread_rng())
    }

    /// Builds a network drawing every parameter from `rng`; a seeded RNG makes
    /// the initialization reproducible.
    pub fn with_rng<R: Rng + ?Sized>(
        sizes: Vec<usize>,
        activation: Activation,
        rng: &mut R,
    ) -> Result<NetworkModel> {
        check_sizes(&sizes)?;
        let mut weights = Vec::with_capacity(sizes.len() - 1);
        let mut biases = Vec::with_capacity(sizes.len() - 1);
        for pair in sizes.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            weights.push(Matrix::standard_normal(fan_out, fan_in, rng));
            biases.push(Matrix::standard_normal(fan_out, 1, rng));
        }
        Ok(NetworkModel {
            sizes,
            activation,
            fns: activation.fns(),
            weights,
            biases,
        })
    }

    /// Assembles a network from explicit parameters, checking every shape.
    pub fn from_parts(
        sizes: Vec<usize>,
        activation: Activation,
        weights: Vec<Matrix>,
        biases: Vec<Matrix>,
    ) -> Result<NetworkModel> {
        check_sizes(&sizes)?;
        let layers = sizes.len() - 1;
        if weights.len() != layers || biases.len() != layers {
            return Err(Error::InvalidModelFormat(format!(
                "expected {layers} weight and bias entries, got {} and {}",
                weights.len(),
                biases.len()
            )));
        }
        for (i, pair) in sizes.windows(2).enumerate() {
            if weights[i].shape() != (pair[1], pair[0]) {
                return Err(Error::InvalidModelFormat(format!(
                    "weight_{i} has shape {:?}, expected {:?}",
                    weights[i].shape(),
                    (pair[1], pair[0])
                )));
            }
            if biases[i].shape() != (pair[1], 1) {
                return Err(Error::InvalidModelFormat(format!(
                    "bias_{i} has shape {:?}, expected {:?}",
                    biases[i].shape(),
                    (pair[1], 1)
                )));
            }
        }
        Ok(NetworkModel {
            sizes,
            activation,
            fns: activation.fns(),
            weights,
            biases,
        })
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub(crate) fn fns(&self) -> ActivationFns {
        self.fns
    }

    pub fn weights(&self) -> &[Matrix] {
        &self.weights
    }

    pub fn biases(&self) -> &[Matrix] {
        &self.biases
    }

    pub fn num_layers(&self) -> usize {
        self.sizes.len()
    }

    pub fn input_size(&self) -> usize {
        self.sizes[0]
    }

    pub fn output_size(&self) -> usize {
        self.sizes[self.sizes.len() - 1]
    }

    /// `z = W·a + b` for layer `layer`.
    pub(crate) fn weighted_input(&self, layer: usize, a: &Matrix) -> Matrix {
        &(&self.weights[layer] * a) + &self.biases[layer]
    }

    /// Forward pass. `input` must have `sizes[0]` entries; the result is a
    /// `sizes[-1] × 1` column.
    pub fn feedforward(&self, input: &[f64]) -> Matrix {
        let apply = self.fns.apply;
        let mut a = Matrix::column(input.to_vec());
        for layer in 0..self.weights.len() {
            a = self.weighted_input(layer, &a).map(apply);
        }
        a
    }

    /// Every layer's activation, the input column included.
    pub fn all_activations(&self, input: &[f64]) -> Vec<Matrix> {
        let apply = self.fns.apply;
        let mut activations = Vec::with_capacity(self.sizes.len());
        activations.push(Matrix::column(input.to_vec()));
        for layer in 0..self.weights.len() {
            let z = self.weighted_input(layer, &activations[layer]);
            activations.push(z.map(apply));
        }
        activations
    }

    pub fn predict(&self, input: &[f64]) -> Prediction {
        let output = self.feedforward(input);
        let predicted_digit = output.argmax();
        Prediction {
            predicted_digit,
            confidence: output.get(predicted_digit, 0),
            probabilities: output.into_vec(),
        }
    }

    pub fn to_artifact(&self) -> ModelArtifact {
        ModelArtifact {
            sizes: self.sizes.clone(),
            activation: self.activation.as_str().to_owned(),
            num_layers: self.sizes.len(),
            weights: self.weights.clone(),
            biases: self.biases.clone(),
        }
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<NetworkModel> {
        let activation: Activation = artifact.activation.parse()?;
        if artifact.sizes.len() < 2 || artifact.sizes.len() != artifact.num_layers {
            return Err(Error::InvalidModelFormat(format!(
                "sizes {:?} do not describe {} layers",
                artifact.sizes, artifact.num_layers
            )));
        }
        NetworkModel::from_parts(artifact.sizes, activation, artifact.weights, artifact.biases)
            .map_err(|e| match e {
                Error::InvalidArchitecture(msg) => Error::InvalidModelFormat(msg),
                other => other,
            })
    }

    /// Nested-row view of the parameters for JSON responses.
    pub fn state(&self) -> NetworkState {
        NetworkState {
            sizes: self.sizes.clone(),
            activation: self.activation,
            weights: self.weights.iter().map(Matrix::to_rows).collect(),
            biases: self.biases.iter().map(Matrix::to_rows).collect(),
        }
    }
}

impl PartialEq for NetworkModel {
    fn eq(&self, other: &Self) -> bool {
        self.sizes == other.sizes
            && self.activation == other.activation
            && self.weights == other.weights
            && self.biases == other.biases
    }
}

/// Index of the most activated output.
pub fn classify(output: &Matrix) -> usize {
    argmax(output.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn identity_relu() -> NetworkModel {
        NetworkModel::from_parts(
            vec![2, 2],
            Activation::ReLU,
            vec![Matrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap()],
            vec![Matrix::zeros(2, 1)],
        )
        .unwrap()
    }

    #[test]
    fn too_few_layers_is_rejected() {
        for sizes in [vec![], vec![10]] {
            let err = NetworkModel::new(sizes, Activation::Sigmoid).unwrap_err();
            assert!(matches!(err, Error::InvalidArchitecture(_)));
        }
    }

    #[test]
    fn shapes_follow_sizes() {
        let net = NetworkModel::with_rng(vec![4, 3, 2], Activation::Sigmoid, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(net.weights()[0].shape(), (3, 4));
        assert_eq!(net.weights()[1].shape(), (2, 3));
        assert_eq!(net.biases()[1].shape(), (2, 1));
    }

    #[test]
    fn feedforward_output_matches_last_layer() {
        let mut rng = StdRng::seed_from_u64(5);
        for sizes in [vec![1, 1], vec![3, 5, 2], vec![6, 4, 4, 9]] {
            let net = NetworkModel::with_rng(sizes.clone(), Activation::ReLU, &mut rng).unwrap();
            let out = net.feedforward(&vec![0.5; sizes[0]]);
            assert_eq!(out.shape(), (*sizes.last().unwrap(), 1));
        }
    }

    #[test]
    fn identity_network_passes_input_through() {
        let net = identity_relu();
        assert_eq!(net.feedforward(&[1.0, 0.0]).as_slice(), &[1.0, 0.0]);
        let p = net.predict(&[0.2, 0.7]);
        assert_eq!(p.predicted_digit, 1);
        assert_eq!(p.confidence, 0.7);
    }

    #[test]
    fn all_activations_include_input() {
        let net = NetworkModel::with_rng(vec![3, 4, 2], Activation::Sigmoid, &mut StdRng::seed_from_u64(2))
            .unwrap();
        let acts = net.all_activations(&[0.1, 0.2, 0.3]);
        assert_eq!(acts.len(), 3);
        assert_eq!(acts[0].as_slice(), &[0.1, 0.2, 0.3]);
        assert_eq!(acts[2], net.feedforward(&[0.1, 0.2, 0.3]));
    }

    #[test]
    fn artifact_round_trip_is_exact() {
        let net = NetworkModel::with_rng(vec![5, 3, 2], Activation::ReLU, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let back = NetworkModel::from_artifact(net.to_artifact()).unwrap();
        assert_eq!(back, net);
    }

    #[test]
    fn artifact_with_unknown_activation_is_rejected() {
        let mut artifact = identity_relu().to_artifact();
        artifact.activation = "tanh".into();
        assert!(matches!(
            NetworkModel::from_artifact(artifact),
            Err(Error::InvalidModelFormat(_))
        ));
    }

    #[test]
    fn artifact_with_wrong_shape_is_rejected() {
        let mut artifact = identity_relu().to_artifact();
        artifact.biases[0] = Matrix::zeros(3, 1);
        assert!(matches!(
            NetworkModel::from_artifact(artifact),
            Err(Error::InvalidModelFormat(_))
        ));
    }

    #[test]
    fn state_nests_rows() {
        let state = identity_relu().state();
        assert_eq!(state.weights[0], vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(state.biases[0], vec![vec![0.0], vec![0.0]]);
    }
}
