use ndarray::Array2;

use crate::EmError;

/// Per-worker running totals of posterior-weighted sufficient statistics.
///
/// Reset at the start of each iteration, filled over the local shard,
/// then merged elementwise across workers into the single global
/// accumulator consumed by exactly one M-step.
///
/// `wp` and `wq` are the numerator / denominator accumulators for the
/// dictionary update; their shapes are chosen by the model variant
/// (H×D and H×H for superposition models, H×D twice for the max-rule
/// winner statistics).
#[derive(Debug, Clone, PartialEq)]
pub struct SuffStats {
    wp: Array2<f64>,
    wq: Array2<f64>,
    pi_sum: f64,
    sigma_sum: f64,
    points: f64,
    free_energy: f64,
}

impl SuffStats {
    /// Creates a zeroed accumulator with the given `wp`/`wq` shapes.
    pub fn zeros(wp_shape: (usize, usize), wq_shape: (usize, usize)) -> Self {
        Self {
            wp: Array2::zeros(wp_shape),
            wq: Array2::zeros(wq_shape),
            pi_sum: 0.0,
            sigma_sum: 0.0,
            points: 0.0,
            free_energy: 0.0,
        }
    }

    pub fn wp(&self) -> &Array2<f64> {
        &self.wp
    }

    pub fn wq(&self) -> &Array2<f64> {
        &self.wq
    }

    pub fn wp_mut(&mut self) -> &mut Array2<f64> {
        &mut self.wp
    }

    pub fn wq_mut(&mut self) -> &mut Array2<f64> {
        &mut self.wq
    }

    pub fn pi_sum(&self) -> f64 {
        self.pi_sum
    }

    pub fn sigma_sum(&self) -> f64 {
        self.sigma_sum
    }

    /// Number of data points that contributed.
    pub fn points(&self) -> f64 {
        self.points
    }

    /// Sum of per-point truncated log-sum-exp terms (free-energy estimate).
    pub fn free_energy(&self) -> f64 {
        self.free_energy
    }

    pub fn add_pi(&mut self, value: f64) {
        self.pi_sum += value;
    }

    pub fn add_sigma(&mut self, value: f64) {
        self.sigma_sum += value;
    }

    pub fn add_point(&mut self) {
        self.points += 1.0;
    }

    pub fn add_free_energy(&mut self, value: f64) {
        self.free_energy += value;
    }

    /// Zeroes every accumulator, keeping the shapes.
    pub fn reset(&mut self) {
        self.wp.fill(0.0);
        self.wq.fill(0.0);
        self.pi_sum = 0.0;
        self.sigma_sum = 0.0;
        self.points = 0.0;
        self.free_energy = 0.0;
    }

    /// Elementwise sum of another accumulator into this one.
    ///
    /// # Errors
    /// Returns `EmError::Shape` if the accumulators disagree on shape.
    pub fn merge(&mut self, other: &SuffStats) -> Result<(), EmError> {
        if self.wp.dim() != other.wp.dim() || self.wq.dim() != other.wq.dim() {
            return Err(EmError::Shape {
                what: "sufficient statistics",
                got: other.flat_len(),
                expected: self.flat_len(),
            });
        }

        self.wp += &other.wp;
        self.wq += &other.wq;
        self.pi_sum += other.pi_sum;
        self.sigma_sum += other.sigma_sum;
        self.points += other.points;
        self.free_energy += other.free_energy;
        Ok(())
    }

    /// Length of the flat reduction payload for this shape.
    pub fn flat_len(&self) -> usize {
        self.wp.len() + self.wq.len() + 4
    }

    /// Serializes every accumulator into one `Vec<f64>` so a whole
    /// iteration reduces in a single collective call.
    pub fn flatten(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.flat_len());
        out.extend(self.wp.iter().copied());
        out.extend(self.wq.iter().copied());
        out.push(self.pi_sum);
        out.push(self.sigma_sum);
        out.push(self.points);
        out.push(self.free_energy);
        out
    }

    /// Overwrites this accumulator from a flat reduction payload.
    ///
    /// # Errors
    /// Returns `EmError::Shape` if the payload length does not match.
    pub fn unflatten(&mut self, flat: &[f64]) -> Result<(), EmError> {
        if flat.len() != self.flat_len() {
            return Err(EmError::Shape {
                what: "reduced statistics payload",
                got: flat.len(),
                expected: self.flat_len(),
            });
        }

        let (wp, rest) = flat.split_at(self.wp.len());
        let (wq, tail) = rest.split_at(self.wq.len());

        for (dst, src) in self.wp.iter_mut().zip(wp) {
            *dst = *src;
        }
        for (dst, src) in self.wq.iter_mut().zip(wq) {
            *dst = *src;
        }

        self.pi_sum = tail[0];
        self.sigma_sum = tail[1];
        self.points = tail[2];
        self.free_energy = tail[3];
        Ok(())
    }

    /// True when every accumulated value is finite.
    pub fn is_finite(&self) -> bool {
        self.pi_sum.is_finite()
            && self.sigma_sum.is_finite()
            && self.free_energy.is_finite()
            && self.wp.iter().all(|v| v.is_finite())
            && self.wq.iter().all(|v| v.is_finite())
    }
}
