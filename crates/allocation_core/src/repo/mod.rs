//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the aggregate-oriented `BatchRepository` contract.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Batch::validate()` before persistence.
//! - Repository APIs return a semantic `NotFound` error in addition to DB
//!   transport errors.

pub mod batch_repo;
pub mod fake_repo;
