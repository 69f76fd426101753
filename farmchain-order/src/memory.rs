use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use farmchain_core::{TradeError, TradeResult};
use farmchain_shared::OrderEvent;

use crate::models::Order;
use crate::repository::{OrderQuery, OrderRepository, OutboxRecord};

#[derive(Default)]
struct State {
    orders: HashMap<String, Order>,
    outbox: Vec<(OutboxRecord, bool)>,
    next_sequence: i64,
}

impl State {
    fn append(&mut self, events: &[OrderEvent]) {
        for event in events {
            self.next_sequence += 1;
            self.outbox.push((
                OutboxRecord {
                    sequence: self.next_sequence,
                    event: event.clone(),
                },
                false,
            ));
        }
    }
}

/// In-process order repository for tests and local development
#[derive(Default)]
pub struct MemoryOrderRepository {
    state: Mutex<State>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event ever written, published or not
    pub async fn all_events(&self) -> Vec<OrderEvent> {
        self.state
            .lock()
            .await
            .outbox
            .iter()
            .map(|(record, _)| record.event.clone())
            .collect()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn insert_order(&self, order: &Order, events: &[OrderEvent]) -> TradeResult<()> {
        let mut state = self.state.lock().await;
        if state.orders.contains_key(&order.id) {
            return Err(TradeError::Conflict(format!("order {} already exists", order.id)));
        }
        state.orders.insert(order.id.clone(), order.clone());
        state.append(events);
        Ok(())
    }

    async fn get_order(&self, id: &str) -> TradeResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(id).cloned())
    }

    async fn update_order(
        &self,
        order: &Order,
        expected_version: u64,
        events: &[OrderEvent],
    ) -> TradeResult<()> {
        let mut state = self.state.lock().await;
        let stored = state
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| TradeError::NotFound(format!("order {}", order.id)))?;
        if stored.version != expected_version {
            return Err(TradeError::Conflict(format!(
                "order {} was modified concurrently",
                order.id
            )));
        }
        *stored = order.clone();
        state.append(events);
        Ok(())
    }

    async fn list_orders(&self, query: &OrderQuery) -> TradeResult<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| query.matches(order))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(orders.into_iter().skip(query.offset).take(limit).collect())
    }

    async fn unpublished_events(&self, limit: usize) -> TradeResult<Vec<OutboxRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .outbox
            .iter()
            .filter(|(_, published)| !published)
            .take(limit)
            .map(|(record, _)| record.clone())
            .collect())
    }

    async fn mark_published(&self, sequences: &[i64]) -> TradeResult<()> {
        let mut state = self.state.lock().await;
        for (record, published) in state.outbox.iter_mut() {
            if sequences.contains(&record.sequence) {
                *published = true;
            }
        }
        Ok(())
    }
}
