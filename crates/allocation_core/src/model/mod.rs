//! Allocation domain model.
//!
//! # Responsibility
//! - Define the `Batch` aggregate and the `OrderLine` value object.
//! - Keep allocation rules storage-agnostic so repositories can replay them.

pub mod batch;
