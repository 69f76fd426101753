use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use farmchain_core::{ErrorKind, TradeResult};
use farmchain_order::Order;

/// Trade counters exported at `/metrics`.
#[derive(Clone)]
pub struct TradeMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    transitions_total: IntCounterVec,
    ledger_failures_total: IntCounterVec,
    outbox_relayed_total: IntCounter,
}

impl TradeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "farmchain_order_transitions_total",
                "Committed order mutations by resulting status",
            ),
            &["status"],
        )?;
        let ledger_failures_total = IntCounterVec::new(
            Opts::new(
                "farmchain_ledger_failures_total",
                "Settlement ledger calls that failed, by operation",
            ),
            &["operation"],
        )?;
        let outbox_relayed_total = IntCounter::new(
            "farmchain_outbox_relayed_total",
            "Order events published from the outbox",
        )?;

        registry.register(Box::new(transitions_total.clone()))?;
        registry.register(Box::new(ledger_failures_total.clone()))?;
        registry.register(Box::new(outbox_relayed_total.clone()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                transitions_total,
                ledger_failures_total,
                outbox_relayed_total,
            }),
        })
    }

    /// Count the outcome of an order-mutating operation.
    pub fn observe(&self, operation: &str, result: &TradeResult<Order>) {
        match result {
            Ok(order) => self
                .inner
                .transitions_total
                .with_label_values(&[order.status.as_str()])
                .inc(),
            Err(err) if err.kind() == ErrorKind::ExternalLedgerError => self
                .inner
                .ledger_failures_total
                .with_label_values(&[operation])
                .inc(),
            Err(_) => {}
        }
    }

    pub fn record_relayed(&self, count: usize) {
        self.inner.outbox_relayed_total.inc_by(count as u64);
    }

    pub fn relayed(&self) -> u64 {
        self.inner.outbox_relayed_total.get()
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.inner.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
