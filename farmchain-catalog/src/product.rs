use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::inventory::{InventoryError, StockLevel};

/// A tradable lot listed by a producer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub owner_id: String,
    pub owner_address: String,
    pub name: String,
    pub category: String,
    pub grade: Option<String>,
    pub images: Vec<String>,
    /// Unit of measure for quantities (kg, quintal, crate, ...)
    pub unit: String,
    /// Minor currency units per unit of measure
    pub price_per_unit: i64,
    pub currency: String,
    pub is_active: bool,
    pub stock: StockLevel,
}

impl CatalogItem {
    /// Capture the fields an order must keep even if the listing is edited later.
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            item_id: self.id,
            name: self.name.clone(),
            category: self.category.clone(),
            grade: self.grade.clone(),
            images: self.images.clone(),
        }
    }
}

/// Immutable copy of catalog fields taken at order time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub item_id: Uuid,
    pub name: String,
    pub category: String,
    pub grade: Option<String>,
    pub images: Vec<String>,
}

/// Product catalog service. Listing CRUD lives elsewhere; the trade core only
/// reads items and moves their stock counters.
///
/// Counter updates must be single atomic operations in the backing store,
/// never a read followed by a write from application code.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_item(&self, id: Uuid) -> Result<Option<CatalogItem>, InventoryError>;

    /// Decrement `available` by `qty` only if at least `qty` is available.
    async fn decrement_available(&self, id: Uuid, qty: u64) -> Result<StockLevel, InventoryError>;

    async fn increment_available(&self, id: Uuid, qty: u64) -> Result<StockLevel, InventoryError>;

    async fn increment_sold(&self, id: Uuid, qty: u64) -> Result<StockLevel, InventoryError>;
}

/// In-process catalog used by tests and local development
#[derive(Default)]
pub struct MemoryCatalog {
    items: Mutex<HashMap<Uuid, CatalogItem>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, item: CatalogItem) {
        self.items.lock().await.insert(item.id, item);
    }

    /// Edit listing fields the way the catalog service would (used to check snapshots).
    pub async fn rename(&self, id: Uuid, name: &str) {
        if let Some(item) = self.items.lock().await.get_mut(&id) {
            item.name = name.to_string();
        }
    }

    async fn update_stock<F>(&self, id: Uuid, f: F) -> Result<StockLevel, InventoryError>
    where
        F: FnOnce(&mut StockLevel) -> Result<(), InventoryError> + Send,
    {
        let mut items = self.items.lock().await;
        let item = items.get_mut(&id).ok_or(InventoryError::NotFound(id))?;
        f(&mut item.stock)?;
        Ok(item.stock)
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn get_item(&self, id: Uuid) -> Result<Option<CatalogItem>, InventoryError> {
        Ok(self.items.lock().await.get(&id).cloned())
    }

    async fn decrement_available(&self, id: Uuid, qty: u64) -> Result<StockLevel, InventoryError> {
        self.update_stock(id, |stock| stock.take(qty)).await
    }

    async fn increment_available(&self, id: Uuid, qty: u64) -> Result<StockLevel, InventoryError> {
        self.update_stock(id, |stock| stock.put_back(qty)).await
    }

    async fn increment_sold(&self, id: Uuid, qty: u64) -> Result<StockLevel, InventoryError> {
        self.update_stock(id, |stock| stock.record_sale(qty)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tomatoes(available: u64) -> CatalogItem {
        CatalogItem {
            id: Uuid::new_v4(),
            owner_id: "farmer-1".to_string(),
            owner_address: "0xfarmer".to_string(),
            name: "Roma Tomatoes".to_string(),
            category: "vegetables".to_string(),
            grade: Some("A".to_string()),
            images: vec!["ipfs://tomato".to_string()],
            unit: "kg".to_string(),
            price_per_unit: 50,
            currency: "INR".to_string(),
            is_active: true,
            stock: StockLevel { available, sold: 0 },
        }
    }

    #[tokio::test]
    async fn test_snapshot_survives_listing_edit() {
        let catalog = MemoryCatalog::new();
        let item = tomatoes(10);
        let snapshot = item.snapshot();
        catalog.insert(item.clone()).await;

        catalog.rename(item.id, "Cherry Tomatoes").await;

        let edited = catalog.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(edited.name, "Cherry Tomatoes");
        assert_eq!(snapshot.name, "Roma Tomatoes");
    }

    #[tokio::test]
    async fn test_decrement_is_conditional() {
        let catalog = MemoryCatalog::new();
        let item = tomatoes(5);
        catalog.insert(item.clone()).await;

        let result = catalog.decrement_available(item.id, 6).await;
        assert!(matches!(
            result,
            Err(InventoryError::InsufficientQuantity { requested: 6, available: 5 })
        ));

        let stock = catalog.decrement_available(item.id, 5).await.unwrap();
        assert_eq!(stock.available, 0);
    }
}
