use serde::{Serialize, Deserialize};

/// One labelled example: an input vector and its one-hot target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPair {
    pub input: Vec<f64>,
    pub target: Vec<f64>,
}

impl DataPair {
    pub fn new(input: Vec<f64>, target: Vec<f64>) -> DataPair {
        DataPair { input, target }
    }

    /// Pair with a one-hot target of length `classes` for `label`.
    pub fn labelled(input: Vec<f64>, label: usize, classes: usize) -> DataPair {
        DataPair { input, target: one_hot(label, classes) }
    }
}

/// One-hot encode `label` into a vector of length `classes`.
pub fn one_hot(label: usize, classes: usize) -> Vec<f64> {
    let mut v = vec![0.0; classes];
    if label < classes {
        v[label] = 1.0;
    }
    v
}
