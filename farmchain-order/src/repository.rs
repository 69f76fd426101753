use async_trait::async_trait;
use std::sync::Arc;

use farmchain_core::{TradeError, TradeResult};
use farmchain_shared::OrderEvent;

use crate::locks::OrderLocks;
use crate::models::{Order, OrderStatus};

/// Filter for listing orders. `party_id` matches either side of the trade.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    pub buyer_id: Option<String>,
    pub seller_id: Option<String>,
    pub party_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl OrderQuery {
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(buyer) = &self.buyer_id {
            if !order.is_buyer(buyer) {
                return false;
            }
        }
        if let Some(seller) = &self.seller_id {
            if !order.is_seller(seller) {
                return false;
            }
        }
        if let Some(party) = &self.party_id {
            if !order.is_party(party) {
                return false;
            }
        }
        self.status.map_or(true, |status| order.status == status)
    }
}

/// An event waiting in the outbox
#[derive(Debug, Clone)]
pub struct OutboxRecord {
    pub sequence: i64,
    pub event: OrderEvent,
}

/// Durable order storage. Implementations write the order and its events
/// in one atomic unit.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &Order, events: &[OrderEvent]) -> TradeResult<()>;

    async fn get_order(&self, id: &str) -> TradeResult<Option<Order>>;

    /// Persist `order` only if the stored version still equals
    /// `expected_version`; otherwise fail with `Conflict`.
    async fn update_order(
        &self,
        order: &Order,
        expected_version: u64,
        events: &[OrderEvent],
    ) -> TradeResult<()>;

    /// Newest first
    async fn list_orders(&self, query: &OrderQuery) -> TradeResult<Vec<Order>>;

    async fn unpublished_events(&self, limit: usize) -> TradeResult<Vec<OutboxRecord>>;

    async fn mark_published(&self, sequences: &[i64]) -> TradeResult<()>;
}

/// Repository access with per-order serialisation of read-modify-write.
#[derive(Clone)]
pub struct OrderStore {
    repo: Arc<dyn OrderRepository>,
    locks: OrderLocks,
}

impl OrderStore {
    pub fn new(repo: Arc<dyn OrderRepository>) -> Self {
        Self {
            repo,
            locks: OrderLocks::new(),
        }
    }

    pub fn repository(&self) -> &Arc<dyn OrderRepository> {
        &self.repo
    }

    pub async fn load(&self, order_id: &str) -> TradeResult<Order> {
        self.repo
            .get_order(order_id)
            .await?
            .ok_or_else(|| TradeError::NotFound(format!("order {}", order_id)))
    }

    /// Load, mutate and save one order under its lock. If `f` fails nothing
    /// is written. The save is a version compare-and-swap, so a writer in
    /// another process surfaces here as `Conflict`.
    pub async fn mutate<R, F>(&self, order_id: &str, f: F) -> TradeResult<(Order, R)>
    where
        F: FnOnce(&mut Order) -> TradeResult<(R, Vec<OrderEvent>)> + Send,
        R: Send,
    {
        let _guard = self.locks.lock(order_id).await;
        let mut order = self.load(order_id).await?;
        let expected = order.version;
        let (value, events) = f(&mut order)?;
        order.version = expected + 1;
        self.repo.update_order(&order, expected, &events).await?;
        Ok((order, value))
    }
}
