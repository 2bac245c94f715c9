//! Batch aggregate and order line value object.
//!
//! # Responsibility
//! - Define the in-memory shape persisted by batch repositories.
//! - Own the allocation rules that repositories replay on rehydration.
//!
//! # Invariants
//! - `reference` is the batch identity; equality and hashing use it alone.
//! - An order line is held at most once per batch.
//! - Allocating never drives `available_quantity` below zero.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Customer demand for a quantity of one SKU.
///
/// Value object: two lines with the same order id, sku and quantity are the
/// same line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    pub orderid: String,
    pub sku: String,
    pub qty: u32,
}

impl OrderLine {
    pub fn new(orderid: impl Into<String>, sku: impl Into<String>, qty: u32) -> Self {
        Self {
            orderid: orderid.into(),
            sku: sku.into(),
            qty,
        }
    }
}

/// A lot of purchased stock that order lines are allocated against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Stable unique identity across all batches.
    pub reference: String,
    pub sku: String,
    pub purchased_quantity: u32,
    /// Expected arrival. `None` means the stock is already in the warehouse.
    pub eta: Option<NaiveDate>,
    #[serde(default)]
    allocations: HashSet<OrderLine>,
}

impl Batch {
    /// Creates a batch with no allocations.
    pub fn new(
        reference: impl Into<String>,
        sku: impl Into<String>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            purchased_quantity,
            eta,
            allocations: HashSet::new(),
        }
    }

    /// Allocates `line` to this batch when [`Batch::can_allocate`] allows it.
    ///
    /// Lines that cannot be allocated are ignored. Allocating a line that is
    /// already held is a no-op.
    pub fn allocate(&mut self, line: OrderLine) {
        if self.can_allocate(&line) {
            self.allocations.insert(line);
        }
    }

    /// Removes `line` from this batch if it is allocated here.
    pub fn deallocate(&mut self, line: &OrderLine) {
        self.allocations.remove(line);
    }

    pub fn allocated_quantity(&self) -> u32 {
        self.allocations.iter().map(|line| line.qty).sum()
    }

    pub fn available_quantity(&self) -> u32 {
        self.purchased_quantity.saturating_sub(self.allocated_quantity())
    }

    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == line.sku && self.available_quantity() >= line.qty
    }

    /// Returns the order lines currently allocated to this batch.
    pub fn allocations(&self) -> &HashSet<OrderLine> {
        &self.allocations
    }

    /// Validates identity and allocated lines before persistence.
    ///
    /// # Errors
    /// - Blank `reference` or `sku`.
    /// - Any allocated line with blank `orderid`/`sku` or zero `qty`.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.reference.trim().is_empty() {
            return Err(ModelValidationError::BlankReference);
        }
        if self.sku.trim().is_empty() {
            return Err(ModelValidationError::BlankSku {
                reference: self.reference.clone(),
            });
        }
        for line in &self.allocations {
            if line.orderid.trim().is_empty() {
                return Err(ModelValidationError::BlankOrderId {
                    reference: self.reference.clone(),
                });
            }
            if line.qty == 0 {
                return Err(ModelValidationError::ZeroQuantity {
                    orderid: line.orderid.clone(),
                });
            }
        }
        Ok(())
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Batch {}

impl Hash for Batch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

/// Allocates `line` to the earliest batch able to take it.
///
/// Batches without an ETA (in stock) come first, then by ascending ETA.
/// Batches with equal ETA keep their input order.
///
/// Returns the chosen batch reference.
///
/// # Errors
/// - [`OutOfStock`] when no batch can take the line.
pub fn allocate(line: OrderLine, batches: &mut [Batch]) -> Result<String, OutOfStock> {
    let chosen = batches
        .iter_mut()
        .filter(|batch| batch.can_allocate(&line))
        // `None` sorts before any date, so in-stock batches win.
        .min_by_key(|batch| batch.eta);

    match chosen {
        Some(batch) => {
            let reference = batch.reference.clone();
            batch.allocate(line);
            Ok(reference)
        }
        None => Err(OutOfStock(line.sku)),
    }
}

/// No batch has enough stock of the SKU for the requested line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutOfStock(pub String);

impl Display for OutOfStock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "out of stock for sku {}", self.0)
    }
}

impl Error for OutOfStock {}

/// Model-level validation failure raised before writes and after reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    BlankReference,
    BlankSku { reference: String },
    BlankOrderId { reference: String },
    ZeroQuantity { orderid: String },
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankReference => write!(f, "batch reference cannot be blank"),
            Self::BlankSku { reference } => write!(f, "batch `{reference}` has a blank sku"),
            Self::BlankOrderId { reference } => {
                write!(f, "batch `{reference}` holds an order line with a blank orderid")
            }
            Self::ZeroQuantity { orderid } => {
                write!(f, "order line `{orderid}` must have a positive quantity")
            }
        }
    }
}

impl Error for ModelValidationError {}

#[cfg(test)]
mod tests {
    use super::{Batch, OrderLine};
    use chrono::NaiveDate;

    #[test]
    fn can_allocate_requires_matching_sku_and_enough_stock() {
        let batch = Batch::new("batch-001", "ELEGANT-LAMP", 2, None);

        assert!(batch.can_allocate(&OrderLine::new("order-1", "ELEGANT-LAMP", 2)));
        assert!(!batch.can_allocate(&OrderLine::new("order-1", "ELEGANT-LAMP", 3)));
        assert!(!batch.can_allocate(&OrderLine::new("order-1", "UNCOMFORTABLE-CHAIR", 1)));
    }

    #[test]
    fn available_quantity_saturates_at_zero() {
        let mut batch = Batch::new("batch-001", "SMALL-TABLE", 20, None);
        batch.allocate(OrderLine::new("order-1", "SMALL-TABLE", 20));

        assert_eq!(batch.available_quantity(), 0);
        batch.purchased_quantity = 5;
        assert_eq!(batch.available_quantity(), 0);
    }

    #[test]
    fn equality_uses_reference_only() {
        let first = Batch::new("batch-001", "SMALL-TABLE", 20, None);
        let second = Batch::new(
            "batch-001",
            "BLUE-VASE",
            3,
            NaiveDate::from_ymd_opt(2026, 1, 1),
        );
        assert_eq!(first, second);
    }
}
