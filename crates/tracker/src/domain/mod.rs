//! Fulfillment-center domain rules: roles, batches and status derivation.

pub mod batches;
pub mod roles;
pub mod status;

pub use batches::{Batch, InvalidBatch};
pub use roles::{InvalidRole, Role};
pub use status::{BatchProgress, BatchStatus, OperationStatus};
