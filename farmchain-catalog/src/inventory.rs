use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use farmchain_core::TradeError;

use crate::product::ProductCatalog;

/// Stock counters for one catalog item
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockLevel {
    pub available: u64,
    pub sold: u64,
}

impl StockLevel {
    /// Reserve `qty` out of the available pool.
    pub fn take(&mut self, qty: u64) -> Result<(), InventoryError> {
        if self.available < qty {
            return Err(InventoryError::InsufficientQuantity {
                requested: qty,
                available: self.available,
            });
        }
        self.available -= qty;
        Ok(())
    }

    pub fn put_back(&mut self, qty: u64) -> Result<(), InventoryError> {
        self.available = self
            .available
            .checked_add(qty)
            .ok_or(InventoryError::Overflow)?;
        Ok(())
    }

    /// Count a delivered reservation as sold. `available` was already reduced.
    pub fn record_sale(&mut self, qty: u64) -> Result<(), InventoryError> {
        self.sold = self.sold.checked_add(qty).ok_or(InventoryError::Overflow)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Catalog item not found: {0}")]
    NotFound(Uuid),

    #[error("Insufficient quantity: requested {requested}, available {available}")]
    InsufficientQuantity { requested: u64, available: u64 },

    #[error("Stock counter overflow")]
    Overflow,

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<InventoryError> for TradeError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound(id) => TradeError::NotFound(format!("catalog item {}", id)),
            InventoryError::InsufficientQuantity { requested, available } => {
                TradeError::InsufficientQuantity { requested, available }
            }
            InventoryError::Overflow => TradeError::Validation(err.to_string()),
            InventoryError::Unavailable(msg) => TradeError::Storage(msg),
        }
    }
}

/// Reservation bookkeeping on top of the catalog's atomic counters.
///
/// Only the order coordinator calls this. Whether a given order's
/// reservation may still be restored is tracked on the order itself, so
/// every method here is a single counter update.
#[derive(Clone)]
pub struct InventoryLedger {
    catalog: Arc<dyn ProductCatalog>,
}

impl InventoryLedger {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<dyn ProductCatalog> {
        &self.catalog
    }

    /// Take `qty` out of the item's available pool for a new order
    pub async fn reserve(&self, item_id: Uuid, qty: u32) -> Result<StockLevel, InventoryError> {
        let stock = self.catalog.decrement_available(item_id, u64::from(qty)).await?;
        debug!(%item_id, qty, available = stock.available, "Reserved stock");
        Ok(stock)
    }

    /// Return a cancelled order's reservation to the pool
    pub async fn restore(&self, item_id: Uuid, qty: u32) -> Result<StockLevel, InventoryError> {
        let stock = self.catalog.increment_available(item_id, u64::from(qty)).await?;
        info!(%item_id, qty, available = stock.available, "Restored reserved stock");
        Ok(stock)
    }

    /// Convert a delivered order's reservation into a sale
    pub async fn mark_sold(&self, item_id: Uuid, qty: u32) -> Result<StockLevel, InventoryError> {
        let stock = self.catalog.increment_sold(item_id, u64::from(qty)).await?;
        info!(%item_id, qty, sold = stock.sold, "Recorded sale");
        Ok(stock)
    }
}
