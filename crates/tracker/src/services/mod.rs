//! Business logic for the tracker.

pub mod auth;
pub mod batches;
pub mod operations;
pub mod session_cleanup;

pub use auth::{AuthOutcome, AuthService, AuthServiceError};
pub use batches::{BatchService, BatchServiceError};
pub use operations::{OperationService, OperationServiceError};
pub use session_cleanup::{SessionCleanupConfig, spawn_session_cleanup_service};
