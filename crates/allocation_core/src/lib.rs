//! Core persistence and domain logic for batch allocation.
//! This crate maps the `Batch` aggregate to SQLite and owns allocation rules.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::batch::{allocate, Batch, ModelValidationError, OrderLine, OutOfStock};
pub use repo::batch_repo::{BatchRepository, RepoError, RepoResult, SqliteBatchRepository};
pub use repo::fake_repo::FakeBatchRepository;
pub use service::allocation_service::{AllocationService, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
