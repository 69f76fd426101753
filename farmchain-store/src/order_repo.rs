use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};

use farmchain_core::{TradeError, TradeResult};
use farmchain_order::{Order, OrderQuery, OrderRepository, OutboxRecord};
use farmchain_shared::OrderEvent;

use crate::database::{is_unique_violation, storage_error};

/// Orders stored as JSONB documents with a version column for
/// compare-and-swap updates. Outbox rows share the order's transaction.
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_document(order: &Order) -> TradeResult<Value> {
    serde_json::to_value(order).map_err(|e| TradeError::Storage(format!("encode order: {}", e)))
}

fn from_document(document: Value) -> TradeResult<Order> {
    serde_json::from_value(document).map_err(|e| TradeError::Storage(format!("decode order: {}", e)))
}

async fn append_events(
    tx: &mut Transaction<'_, Postgres>,
    events: &[OrderEvent],
) -> TradeResult<()> {
    for event in events {
        let payload = serde_json::to_value(event)
            .map_err(|e| TradeError::Storage(format!("encode event: {}", e)))?;
        sqlx::query(
            "INSERT INTO order_outbox (event_id, order_id, event_type, payload) VALUES ($1, $2, $3, $4)",
        )
        .bind(event.id)
        .bind(&event.order_id)
        .bind(event.name())
        .bind(payload)
        .execute(&mut **tx)
        .await
        .map_err(storage_error)?;
    }
    Ok(())
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert_order(&self, order: &Order, events: &[OrderEvent]) -> TradeResult<()> {
        let document = to_document(order)?;
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, version, status, buyer_id, seller_id, created_at, updated_at, document)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&order.id)
        .bind(order.version as i64)
        .bind(order.status.as_str())
        .bind(&order.buyer.user_id)
        .bind(&order.seller.user_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(document)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                TradeError::Conflict(format!("order {} already exists", order.id))
            } else {
                storage_error(e)
            }
        })?;

        append_events(&mut tx, events).await?;
        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }

    async fn get_order(&self, id: &str) -> TradeResult<Option<Order>> {
        let row = sqlx::query("SELECT document FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        match row {
            Some(row) => {
                let document: Value = row.try_get("document").map_err(storage_error)?;
                Ok(Some(from_document(document)?))
            }
            None => Ok(None),
        }
    }

    async fn update_order(
        &self,
        order: &Order,
        expected_version: u64,
        events: &[OrderEvent],
    ) -> TradeResult<()> {
        let document = to_document(order)?;
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET version = $3, status = $4, updated_at = $5, document = $6
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(&order.id)
        .bind(expected_version as i64)
        .bind(order.version as i64)
        .bind(order.status.as_str())
        .bind(order.updated_at)
        .bind(document)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM orders WHERE id = $1")
                .bind(&order.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_error)?
                .is_some();
            return Err(if exists {
                TradeError::Conflict(format!("order {} was modified concurrently", order.id))
            } else {
                TradeError::NotFound(format!("order {}", order.id))
            });
        }

        append_events(&mut tx, events).await?;
        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }

    async fn list_orders(&self, query: &OrderQuery) -> TradeResult<Vec<Order>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT document FROM orders WHERE TRUE");
        if let Some(buyer) = &query.buyer_id {
            builder.push(" AND buyer_id = ").push_bind(buyer.clone());
        }
        if let Some(seller) = &query.seller_id {
            builder.push(" AND seller_id = ").push_bind(seller.clone());
        }
        if let Some(party) = &query.party_id {
            builder
                .push(" AND (buyer_id = ")
                .push_bind(party.clone())
                .push(" OR seller_id = ")
                .push_bind(party.clone())
                .push(")");
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }
        builder.push(" OFFSET ").push_bind(query.offset as i64);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        rows.into_iter()
            .map(|row| {
                let document: Value = row.try_get("document").map_err(storage_error)?;
                from_document(document)
            })
            .collect()
    }

    async fn unpublished_events(&self, limit: usize) -> TradeResult<Vec<OutboxRecord>> {
        let rows = sqlx::query(
            "SELECT sequence, payload FROM order_outbox WHERE published_at IS NULL ORDER BY sequence LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.into_iter()
            .map(|row| {
                let sequence: i64 = row.try_get("sequence").map_err(storage_error)?;
                let payload: Value = row.try_get("payload").map_err(storage_error)?;
                let event: OrderEvent = serde_json::from_value(payload)
                    .map_err(|e| TradeError::Storage(format!("decode event {}: {}", sequence, e)))?;
                Ok(OutboxRecord { sequence, event })
            })
            .collect()
    }

    async fn mark_published(&self, sequences: &[i64]) -> TradeResult<()> {
        if sequences.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE order_outbox SET published_at = NOW() WHERE sequence = ANY($1)")
            .bind(sequences)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}
