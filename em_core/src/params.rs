use ndarray::Array2;

/// One authoritative parameter set for a latent-cause model.
///
/// Value type: the driver hands an immutable `ModelParams` into every
/// E-step call and replaces it wholesale after the M-step. No in-place
/// mutation crosses an iteration boundary, which keeps the "all workers
/// identical" invariant easy to reason about.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    /// Dictionary of generative fields, D×H (one column per cause).
    pub weights: Array2<f64>,
    /// Prior probability that a single cause is active.
    pub pi: f64,
    /// Observation noise scale.
    pub sigma: f64,
}

impl ModelParams {
    pub fn new(weights: Array2<f64>, pi: f64, sigma: f64) -> Self {
        Self { weights, pi, sigma }
    }

    /// (D, H) — observed and latent dimensionality.
    pub fn dims(&self) -> (usize, usize) {
        self.weights.dim()
    }

    /// True when every entry of every parameter is finite.
    pub fn is_finite(&self) -> bool {
        self.pi.is_finite() && self.sigma.is_finite() && self.weights.iter().all(|v| v.is_finite())
    }

    /// Named flat view of each parameter symbol, in a fixed order.
    ///
    /// This is the representation the results sink records per iteration.
    pub fn symbols(&self) -> Vec<(&'static str, Vec<f64>)> {
        vec![
            ("W", self.weights.iter().copied().collect()),
            ("pi", vec![self.pi]),
            ("sigma", vec![self.sigma]),
        ]
    }
}
