use std::num::NonZeroUsize;

use ca_models::VariantSpec;
use em_core::ConfigError;

/// Everything one training run needs to know, as a parameter-file
/// collaborator would supply it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainingConfig {
    /// Latent dimensionality H (number of causes).
    pub latents: NonZeroUsize,
    /// Preselection width Hprime: causes kept per data point. Values
    /// above H degenerate to exact enumeration.
    pub hprime: NonZeroUsize,
    /// Maximum number of simultaneously active causes per state.
    pub gamma: NonZeroUsize,
    /// Preselection budget K: cap on candidate states per data point.
    pub states_budget: NonZeroUsize,
    /// Relative free-energy improvement below which an iteration counts
    /// as converged.
    pub tolerance: f64,
    /// Consecutive converged iterations required to stop.
    pub patience: NonZeroUsize,
    /// Iteration budget.
    pub max_iterations: NonZeroUsize,
    /// Seed for parameter initialization (and, with [`Self::shuffle`],
    /// shard shuffling).
    pub seed: u64,
    /// When set, shuffles point indices reproducibly before sharding.
    pub shuffle: Option<u64>,
    /// Which of the six model families to train.
    pub variant: VariantSpec,
    /// Number of cooperating workers.
    pub workers: NonZeroUsize,
}

impl TrainingConfig {
    /// Validates option combinations before any worker starts.
    ///
    /// # Errors
    /// Returns `ConfigError` for impossible combinations, e.g.
    /// `gamma > Hprime` or a non-finite tolerance.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gamma.get() > self.hprime.get() {
            return Err(ConfigError::GammaExceedsHprime {
                gamma: self.gamma.get(),
                hprime: self.hprime.get(),
            });
        }

        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }

        if let VariantSpec::Dsc { values } = &self.variant {
            if values.is_empty() {
                return Err(ConfigError::EmptyValueSet);
            }
            if let Some(&bad) = values.iter().find(|v| !v.is_finite() || **v == 0.0) {
                return Err(ConfigError::InvalidValueSet(bad));
            }
        }

        Ok(())
    }

    /// Effective preselection width for H causes.
    pub fn effective_hprime(&self, h: usize) -> usize {
        self.hprime.get().min(h)
    }

    /// Effective truncation order, never above the preselection width.
    pub fn effective_gamma(&self, h: usize) -> usize {
        self.gamma.get().min(self.effective_hprime(h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(v: usize) -> NonZeroUsize {
        NonZeroUsize::new(v).unwrap()
    }

    fn base() -> TrainingConfig {
        TrainingConfig {
            latents: nz(4),
            hprime: nz(3),
            gamma: nz(2),
            states_budget: nz(64),
            tolerance: 1e-6,
            patience: nz(2),
            max_iterations: nz(50),
            seed: 0,
            shuffle: None,
            variant: VariantSpec::Bsc,
            workers: nz(2),
        }
    }

    #[test]
    fn accepts_a_sane_config() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_gamma_above_hprime() {
        let mut cfg = base();
        cfg.gamma = nz(4);
        cfg.hprime = nz(3);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::GammaExceedsHprime { gamma: 4, hprime: 3 })
        ));
    }

    #[test]
    fn rejects_non_finite_tolerance() {
        let mut cfg = base();
        cfg.tolerance = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_degenerate_dsc_values() {
        let mut cfg = base();
        cfg.variant = VariantSpec::Dsc { values: vec![0.0] };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn effective_widths_clamp_to_h() {
        let mut cfg = base();
        cfg.hprime = nz(10);
        cfg.gamma = nz(9);
        assert_eq!(cfg.effective_hprime(4), 4);
        assert_eq!(cfg.effective_gamma(4), 4);
    }

    #[test]
    fn roundtrips_through_serde() {
        let cfg = base();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TrainingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
