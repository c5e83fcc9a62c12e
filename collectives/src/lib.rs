mod comm;
mod error;
mod partition;

pub use comm::{CommGroup, Communicator};
pub use error::{CollectiveError, Poison};
pub use partition::{partition, partition_shuffled};
