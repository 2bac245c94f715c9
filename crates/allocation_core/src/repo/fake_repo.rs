//! In-memory batch repository.
//!
//! Mirrors the SQLite repository's insert-if-absent semantics so services
//! can be exercised without a database. Order lines are deduplicated on full
//! `OrderLine` equality, the same `(orderid, sku, qty)` identity the SQLite
//! repository uses for `order_lines` rows.

use crate::model::batch::{Batch, OrderLine};
use crate::repo::batch_repo::{BatchRepository, RepoError, RepoResult};
use std::cell::RefCell;

#[derive(Debug)]
struct StoredBatch {
    header: Batch,
    lines: Vec<OrderLine>,
}

/// `BatchRepository` backed by a vector in insertion order.
#[derive(Debug, Default)]
pub struct FakeBatchRepository {
    batches: RefCell<Vec<StoredBatch>>,
}

impl FakeBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store by adding each batch in order.
    pub fn with_batches(batches: impl IntoIterator<Item = Batch>) -> RepoResult<Self> {
        let repo = Self::new();
        for batch in batches {
            repo.add(&batch)?;
        }
        Ok(repo)
    }
}

impl BatchRepository for FakeBatchRepository {
    fn add(&self, batch: &Batch) -> RepoResult<()> {
        batch.validate()?;

        let mut batches = self.batches.borrow_mut();
        let position = match batches
            .iter()
            .position(|stored| stored.header.reference == batch.reference)
        {
            Some(position) => position,
            None => {
                batches.push(StoredBatch {
                    header: Batch::new(
                        batch.reference.clone(),
                        batch.sku.clone(),
                        batch.purchased_quantity,
                        batch.eta,
                    ),
                    lines: Vec::new(),
                });
                batches.len() - 1
            }
        };

        let stored = &mut batches[position];
        for line in batch.allocations() {
            if !stored.lines.contains(line) {
                stored.lines.push(line.clone());
            }
        }
        Ok(())
    }

    fn get(&self, reference: &str) -> RepoResult<Batch> {
        self.batches
            .borrow()
            .iter()
            .find(|stored| stored.header.reference == reference)
            .map(rehydrate)
            .ok_or_else(|| RepoError::NotFound(reference.to_string()))
    }

    fn list(&self) -> RepoResult<Vec<Batch>> {
        Ok(self.batches.borrow().iter().map(rehydrate).collect())
    }
}

fn rehydrate(stored: &StoredBatch) -> Batch {
    let mut batch = stored.header.clone();
    for line in &stored.lines {
        batch.allocate(line.clone());
    }
    batch
}
