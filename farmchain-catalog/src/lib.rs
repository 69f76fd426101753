pub mod product;
pub mod inventory;

pub use product::{CatalogItem, MemoryCatalog, ProductCatalog, ProductSnapshot};
pub use inventory::{InventoryError, InventoryLedger, StockLevel};
