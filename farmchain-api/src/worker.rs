use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

use farmchain_core::TradeResult;
use farmchain_order::OrderRepository;
use farmchain_store::EventPublisher;

use crate::metrics::TradeMetrics;

const BATCH_SIZE: usize = 100;

/// Publish one batch of outbox entries in sequence order.
///
/// Stops at the first publish failure so later events of the same order
/// are never delivered ahead of it; the failed entry is retried next pass.
pub async fn relay_once(
    repo: &dyn OrderRepository,
    publisher: &dyn EventPublisher,
    metrics: &TradeMetrics,
) -> TradeResult<usize> {
    let pending = repo.unpublished_events(BATCH_SIZE).await?;
    if pending.is_empty() {
        return Ok(0);
    }

    let mut published = Vec::with_capacity(pending.len());
    for record in &pending {
        if let Err(e) = publisher.publish(&record.event).await {
            error!(sequence = record.sequence, order_id = %record.event.order_id, "Failed to publish order event: {}", e);
            break;
        }
        published.push(record.sequence);
    }

    repo.mark_published(&published).await?;
    metrics.record_relayed(published.len());
    debug!(count = published.len(), "Relayed outbox events");
    Ok(published.len())
}

/// Drains the order outbox forever.
pub async fn start_outbox_relay(
    repo: Arc<dyn OrderRepository>,
    publisher: Arc<dyn EventPublisher>,
    metrics: TradeMetrics,
    every: Duration,
) {
    info!("Outbox relay started, polling every {:?}", every);
    let mut ticker = interval(every);

    loop {
        ticker.tick().await;
        if let Err(e) = relay_once(repo.as_ref(), publisher.as_ref(), &metrics).await {
            error!("Outbox relay pass failed: {}", e);
        }
    }
}
