use crate::math::Matrix;

/// Quadratic cost `C = ½‖a - y‖²`.
pub struct QuadraticCost;

impl QuadraticCost {
    pub fn cost(output: &[f64], target: &[f64]) -> f64 {
        0.5 * output.iter().zip(target.iter())
            .map(|(a, y)| (a - y).powi(2))
            .sum::<f64>()
    }

    /// Per-output gradient: `a - y`.
    pub fn derivative(output: &Matrix, target: &Matrix) -> Matrix {
        output - target
    }
}
