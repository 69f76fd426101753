use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use farmchain_catalog::{CatalogItem, InventoryError, ProductCatalog, StockLevel};

/// Read side of the catalog plus atomic stock counter updates.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn apply(&self, id: Uuid, sql: &str, qty: u64) -> Result<StockLevel, InventoryError> {
        let qty = i64::try_from(qty).map_err(|_| InventoryError::Overflow)?;
        let row: Option<StockRow> = sqlx::query_as(sql)
            .bind(id)
            .bind(qty)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match &e {
                // numeric_value_out_of_range
                sqlx::Error::Database(db) if db.code().as_deref() == Some("22003") => {
                    InventoryError::Overflow
                }
                _ => unavailable(e),
            })?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(InventoryError::NotFound(id)),
        }
    }
}

fn unavailable(err: sqlx::Error) -> InventoryError {
    InventoryError::Unavailable(err.to_string())
}

#[derive(sqlx::FromRow)]
struct StockRow {
    available: i64,
    sold: i64,
}

impl From<StockRow> for StockLevel {
    fn from(row: StockRow) -> Self {
        StockLevel {
            available: row.available.max(0) as u64,
            sold: row.sold.max(0) as u64,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    owner_id: String,
    owner_address: String,
    name: String,
    category: String,
    grade: Option<String>,
    images: Value,
    unit: String,
    price_per_unit: i64,
    currency: String,
    is_active: bool,
    available: i64,
    sold: i64,
}

impl TryFrom<ItemRow> for CatalogItem {
    type Error = InventoryError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let images = serde_json::from_value(row.images).map_err(|e| {
            tracing::warn!(item_id = %row.id, "Malformed images column: {}", e);
            InventoryError::Unavailable(format!("catalog item {} has malformed images: {}", row.id, e))
        })?;
        Ok(CatalogItem {
            id: row.id,
            owner_id: row.owner_id,
            owner_address: row.owner_address,
            name: row.name,
            category: row.category,
            grade: row.grade,
            images,
            unit: row.unit,
            price_per_unit: row.price_per_unit,
            currency: row.currency,
            is_active: row.is_active,
            stock: StockLevel {
                available: row.available.max(0) as u64,
                sold: row.sold.max(0) as u64,
            },
        })
    }
}

#[async_trait]
impl ProductCatalog for PgCatalog {
    async fn get_item(&self, id: Uuid) -> Result<Option<CatalogItem>, InventoryError> {
        let row: Option<ItemRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, owner_address, name, category, grade, images, unit,
                   price_per_unit, currency, is_active, available, sold
            FROM catalog_items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(CatalogItem::try_from).transpose()
    }

    async fn decrement_available(&self, id: Uuid, qty: u64) -> Result<StockLevel, InventoryError> {
        let requested = qty;
        let qty = i64::try_from(qty).map_err(|_| InventoryError::Overflow)?;

        // Conditional decrement: the row is only touched when enough stock remains.
        let row: Option<StockRow> = sqlx::query_as(
            r#"
            UPDATE catalog_items
            SET available = available - $2
            WHERE id = $1 AND available >= $2
            RETURNING available, sold
            "#,
        )
        .bind(id)
        .bind(qty)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        if let Some(row) = row {
            return Ok(row.into());
        }

        let current: Option<(i64,)> =
            sqlx::query_as("SELECT available FROM catalog_items WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

        match current {
            Some((available,)) => Err(InventoryError::InsufficientQuantity {
                requested,
                available: available.max(0) as u64,
            }),
            None => Err(InventoryError::NotFound(id)),
        }
    }

    async fn increment_available(&self, id: Uuid, qty: u64) -> Result<StockLevel, InventoryError> {
        self.apply(
            id,
            "UPDATE catalog_items SET available = available + $2 WHERE id = $1 RETURNING available, sold",
            qty,
        )
        .await
    }

    async fn increment_sold(&self, id: Uuid, qty: u64) -> Result<StockLevel, InventoryError> {
        self.apply(
            id,
            "UPDATE catalog_items SET sold = sold + $2 WHERE id = $1 RETURNING available, sold",
            qty,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(images: Value) -> ItemRow {
        ItemRow {
            id: Uuid::new_v4(),
            owner_id: "farmer-3".to_string(),
            owner_address: "0xfarmer".to_string(),
            name: "Basmati Rice".to_string(),
            category: "grains".to_string(),
            grade: None,
            images,
            unit: "kg".to_string(),
            price_per_unit: 90,
            currency: "INR".to_string(),
            is_active: true,
            available: 12,
            sold: -1,
        }
    }

    #[test]
    fn test_item_row_conversion() {
        let item = CatalogItem::try_from(row(json!(["ipfs://rice-1", "ipfs://rice-2"]))).unwrap();
        assert_eq!(item.images.len(), 2);
        assert_eq!(item.stock, StockLevel { available: 12, sold: 0 });

        let err = CatalogItem::try_from(row(json!({ "cover": "ipfs://rice" }))).unwrap_err();
        assert!(matches!(err, InventoryError::Unavailable(_)));
    }
}
