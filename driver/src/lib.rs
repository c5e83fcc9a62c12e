mod config;
mod error;
pub mod estep;
mod session;
mod sink;
mod worker;

pub use config::TrainingConfig;
pub use error::DriverError;
pub use session::{AbortHandle, RunOutcome, RunReport, Session};
pub use sink::{MemorySink, NullSink, ResultsSink, Snapshot};
