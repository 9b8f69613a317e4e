use serde::{Serialize, Deserialize};
use std::f64::consts::E;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Activation applied after every dense layer.
///
/// Serialized as the lowercase tokens `"sigmoid"` and `"relu"`; the same tokens
/// are stored in model archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Sigmoid,
    ReLU,
}

/// The element-wise function pair a network uses in its forward and backward
/// passes, resolved once from an [`Activation`].
#[derive(Clone, Copy)]
pub struct ActivationFns {
    pub apply: fn(f64) -> f64,
    pub derivative: fn(f64) -> f64,
}

impl fmt::Debug for ActivationFns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationFns").finish_non_exhaustive()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + E.powf(-x))
}

fn sigmoid_prime(x: f64) -> f64 {
    let fx = sigmoid(x);
    fx * (1.0 - fx)
}

fn relu(x: f64) -> f64 {
    if x > 0.0 { x } else { 0.0 }
}

// Subgradient at zero is taken as 0.
fn relu_prime(x: f64) -> f64 {
    if x > 0.0 { 1.0 } else { 0.0 }
}

impl Activation {
    pub fn fns(self) -> ActivationFns {
        match self {
            Activation::Sigmoid => ActivationFns { apply: sigmoid, derivative: sigmoid_prime },
            Activation::ReLU => ActivationFns { apply: relu, derivative: relu_prime },
        }
    }

    pub fn function(self, x: f64) -> f64 {
        (self.fns().apply)(x)
    }

    pub fn derivative(self, x: f64) -> f64 {
        (self.fns().derivative)(x)
    }

    /// Token used in archives and JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::ReLU => "relu",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sigmoid" => Ok(Activation::Sigmoid),
            "relu" => Ok(Activation::ReLU),
            other => Err(Error::InvalidModelFormat(format!("unknown activation '{other}'"))),
        }
    }
}
