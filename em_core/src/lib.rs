mod data;
mod error;
pub mod linalg;
pub mod math;
mod model;
mod params;
mod state;
mod stats;

pub use data::{DataError, DataSet};
pub use error::{ConfigError, EmError};
pub use model::CausesModel;
pub use params::ModelParams;
pub use state::{Activation, CandidateState, enumerate_subsets};
pub use stats::SuffStats;
