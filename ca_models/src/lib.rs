mod bsc;
mod dsc;
mod gsc;
mod linear;
mod mca;
mod mmca;
pub mod preselect;
mod tsc;

pub use bsc::Bsc;
pub use dsc::Dsc;
pub use gsc::Gsc;
pub use mca::Mca;
pub use mmca::Mmca;
pub use tsc::Tsc;

use em_core::{CausesModel, ConfigError};

/// Selects one of the six probabilistic model families.
///
/// Serde-able so a parameter-file collaborator can carry it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "model")]
pub enum VariantSpec {
    /// Binary Sparse Coding: binary latents, linear superposition.
    Bsc,
    /// Gaussian Sparse Coding: spike-and-slab latents, linear superposition.
    Gsc,
    /// Maximal Causes Analysis: non-negative fields, max combination.
    Mca,
    /// Maximum-Magnitude Causes Analysis: signed fields, |max| combination.
    Mmca,
    /// Ternary Sparse Coding: {-1, 0, +1} latents, linear superposition.
    Tsc,
    /// Discrete Sparse Coding: latents from a finite non-zero value set.
    Dsc { values: Vec<f64> },
}

impl VariantSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            VariantSpec::Bsc => "bsc",
            VariantSpec::Gsc => "gsc",
            VariantSpec::Mca => "mca",
            VariantSpec::Mmca => "mmca",
            VariantSpec::Tsc => "tsc",
            VariantSpec::Dsc { .. } => "dsc",
        }
    }
}

/// Builds the concrete model variant for the given dimensions.
///
/// # Errors
/// Returns `ConfigError` for variant-specific invalid configuration
/// (currently only a degenerate DSC value set).
pub fn from_spec(
    spec: &VariantSpec,
    d: usize,
    h: usize,
    gamma: usize,
) -> Result<Box<dyn CausesModel>, ConfigError> {
    Ok(match spec {
        VariantSpec::Bsc => Box::new(Bsc::new(d, h, gamma)),
        VariantSpec::Gsc => Box::new(Gsc::new(d, h, gamma)),
        VariantSpec::Mca => Box::new(Mca::new(d, h, gamma)),
        VariantSpec::Mmca => Box::new(Mmca::new(d, h, gamma)),
        VariantSpec::Tsc => Box::new(Tsc::new(d, h, gamma)),
        VariantSpec::Dsc { values } => Box::new(Dsc::new(d, h, gamma, values.clone())?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_spec_builds_every_variant() {
        let specs = [
            VariantSpec::Bsc,
            VariantSpec::Gsc,
            VariantSpec::Mca,
            VariantSpec::Mmca,
            VariantSpec::Tsc,
            VariantSpec::Dsc {
                values: vec![1.0, 2.0],
            },
        ];

        for spec in &specs {
            let model = from_spec(spec, 4, 3, 2).unwrap();
            assert_eq!(model.dims(), (4, 3));
            assert_eq!(model.gamma(), 2);
        }
    }

    #[test]
    fn dsc_rejects_empty_value_set() {
        let spec = VariantSpec::Dsc { values: vec![] };
        assert!(from_spec(&spec, 4, 3, 2).is_err());
    }

    #[test]
    fn spec_roundtrips_through_serde() {
        let spec = VariantSpec::Dsc {
            values: vec![1.0, -1.0, 2.0],
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: VariantSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
