//! Allocation use-case service.
//!
//! # Responsibility
//! - Register batches and allocate order lines through a `BatchRepository`.
//!
//! # Invariants
//! - The service never commits; the caller owns the transaction that the
//!   repository writes into.
//! - An order line is only allocated against batches of its own SKU.

use crate::model::batch::{self, Batch, OrderLine, OutOfStock};
use crate::repo::batch_repo::{BatchRepository, RepoError};
use chrono::NaiveDate;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for allocation use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// No known batch carries this SKU.
    InvalidSku(String),
    /// Batches exist for the SKU but none has enough stock.
    OutOfStock(String),
    /// Target batch does not exist.
    BatchNotFound(String),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between allocation and persistence.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSku(sku) => write!(f, "invalid sku {sku}"),
            Self::OutOfStock(sku) => write!(f, "out of stock for sku {sku}"),
            Self::BatchNotFound(reference) => write!(f, "batch not found: {reference}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent allocation state: {details}")
            }
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(reference) => Self::BatchNotFound(reference),
            other => Self::Repo(other),
        }
    }
}

impl From<OutOfStock> for ServiceError {
    fn from(value: OutOfStock) -> Self {
        Self::OutOfStock(value.0)
    }
}

/// Use-case service wrapper around a batch repository.
pub struct AllocationService<R: BatchRepository> {
    repo: R,
}

impl<R: BatchRepository> AllocationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new batch with no allocations.
    ///
    /// Adding a reference that already exists leaves the stored batch as is.
    pub fn add_batch(
        &self,
        reference: impl Into<String>,
        sku: impl Into<String>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> ServiceResult<()> {
        let batch = Batch::new(reference, sku, purchased_quantity, eta);
        self.repo.add(&batch)?;
        Ok(())
    }

    /// Allocates an order line to the earliest batch that can take it.
    ///
    /// # Contract
    /// - Returns the chosen batch reference.
    /// - Fails with `InvalidSku` when no batch carries `sku`.
    /// - Fails with `OutOfStock` when every matching batch is exhausted.
    pub fn allocate(
        &self,
        orderid: impl Into<String>,
        sku: impl Into<String>,
        qty: u32,
    ) -> ServiceResult<String> {
        let line = OrderLine::new(orderid, sku, qty);
        let mut candidates: Vec<Batch> = self
            .repo
            .list()?
            .into_iter()
            .filter(|batch| batch.sku == line.sku)
            .collect();
        if candidates.is_empty() {
            warn!("event=allocate module=service status=error error_code=invalid_sku");
            return Err(ServiceError::InvalidSku(line.sku));
        }

        let reference = match batch::allocate(line, &mut candidates) {
            Ok(reference) => reference,
            Err(err) => {
                warn!("event=allocate module=service status=error error_code=out_of_stock");
                return Err(err.into());
            }
        };

        let chosen = candidates
            .iter()
            .find(|batch| batch.reference == reference)
            .ok_or(ServiceError::InconsistentState(
                "allocated batch missing from candidates",
            ))?;
        self.repo.add(chosen)?;

        info!(
            "event=allocate module=service status=ok candidates={}",
            candidates.len()
        );
        Ok(reference)
    }

    /// Gets one batch with its allocations.
    pub fn get_batch(&self, reference: &str) -> ServiceResult<Batch> {
        Ok(self.repo.get(reference)?)
    }
}
