use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use farmchain_core::{Caller, Clock, TradeError, TradeResult};
use farmchain_shared::{OrderEvent, OrderEventKind};

use crate::escrow::{require_funds_held, EscrowGateway, LedgerCall};
use crate::machine::{ensure_unclaimed, OrderStateMachine};
use crate::models::{DisputeRecord, DisputeStatus, Order, OrderStatus, PaymentStatus, PendingSettlement};
use crate::repository::OrderStore;

/// Open a dispute on a delivered order. Only one dispute per order, ever.
pub(crate) fn open_dispute(
    order: &mut Order,
    reason: &str,
    raised_by: &str,
    now: DateTime<Utc>,
) -> TradeResult<Vec<OrderEvent>> {
    if order.dispute.is_disputed {
        return Err(TradeError::InvalidState(
            "a dispute has already been raised for this order".to_string(),
        ));
    }
    if order.status != OrderStatus::Delivered {
        return Err(TradeError::invalid_transition(order.status, OrderStatus::Disputed));
    }

    order.dispute = DisputeRecord {
        is_disputed: true,
        reason: Some(reason.to_string()),
        raised_by: Some(raised_by.to_string()),
        raised_at: Some(now),
        status: Some(DisputeStatus::Open),
        ..DisputeRecord::default()
    };
    let raised = OrderEvent::new(
        &order.id,
        OrderEventKind::DisputeRaised {
            raised_by: raised_by.to_string(),
            reason: reason.to_string(),
        },
    );
    let (_, status_changed) = OrderStateMachine::enter(
        order,
        OrderStatus::Disputed,
        raised_by,
        format!("Dispute raised: {}", reason),
        None,
        now,
    );
    Ok(vec![raised, status_changed])
}

fn check_resolvable(order: &Order) -> TradeResult<()> {
    if !order.dispute.is_outstanding() {
        return Err(TradeError::InvalidState(
            "dispute is not open or under review".to_string(),
        ));
    }
    Ok(())
}

/// Settle the dispute record and re-enter the main lifecycle.
fn apply_resolution(
    order: &mut Order,
    resolution: &str,
    refund_buyer: bool,
    resolver: &str,
    transaction_ref: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<OrderEvent> {
    order.dispute.status = Some(DisputeStatus::Resolved);
    order.dispute.resolution = Some(resolution.to_string());
    order.dispute.resolved_by = Some(resolver.to_string());
    order.dispute.resolved_at = Some(now);
    order.dispute.refund_buyer = Some(refund_buyer);

    let escrow_id = order.payment.escrow_id.clone().unwrap_or_default();
    let mut events = Vec::new();
    if let Some(tx) = transaction_ref {
        order.payment.transaction_ref = Some(tx.to_string());
    }

    let target = if refund_buyer {
        order.payment.status = PaymentStatus::Refunded;
        order.payment.refunded_at = Some(now);
        events.push(OrderEvent::new(
            &order.id,
            OrderEventKind::PaymentRefunded {
                escrow_id,
                transaction_ref: transaction_ref.unwrap_or_default().to_string(),
            },
        ));
        OrderStatus::Refunded
    } else {
        if let Some(tx) = transaction_ref {
            order.payment.status = PaymentStatus::Completed;
            order.payment.paid_at = Some(now);
            events.push(OrderEvent::new(
                &order.id,
                OrderEventKind::PaymentReleased {
                    escrow_id,
                    transaction_ref: tx.to_string(),
                },
            ));
        }
        OrderStatus::Delivered
    };

    events.push(OrderEvent::new(
        &order.id,
        OrderEventKind::DisputeResolved {
            resolved_by: resolver.to_string(),
            refund_buyer,
        },
    ));
    let (_, status_changed) = OrderStateMachine::enter(
        order,
        target,
        resolver,
        format!("Dispute resolved: {}", resolution),
        None,
        now,
    );
    events.push(status_changed);
    events
}

/// The dispute sub-workflow: `none -> open -> under_review -> resolved`.
/// A disputed order only leaves `disputed` through `resolve`.
#[derive(Clone)]
pub struct DisputeResolver {
    store: OrderStore,
    gateway: EscrowGateway,
    clock: Arc<dyn Clock>,
}

impl DisputeResolver {
    pub fn new(store: OrderStore, gateway: EscrowGateway, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            gateway,
            clock,
        }
    }

    pub async fn raise(&self, caller: &Caller, order_id: &str, reason: &str) -> TradeResult<Order> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TradeError::Validation("a dispute reason is required".to_string()));
        }
        let now = self.clock.now();
        let (order, ()) = self
            .store
            .mutate(order_id, |order| {
                if !order.is_party(&caller.user_id) {
                    return Err(TradeError::Forbidden(
                        "only the buyer or seller can raise a dispute".to_string(),
                    ));
                }
                ensure_unclaimed(order)?;
                let events = open_dispute(order, reason, &caller.user_id, now)?;
                Ok(((), events))
            })
            .await?;
        info!(order_id, raised_by = %caller.user_id, "Dispute raised");
        Ok(order)
    }

    pub async fn review(&self, caller: &Caller, order_id: &str) -> TradeResult<Order> {
        if !caller.is_admin() {
            return Err(TradeError::Forbidden("only an admin can review disputes".to_string()));
        }
        let now = self.clock.now();
        let (order, ()) = self
            .store
            .mutate(order_id, |order| {
                ensure_unclaimed(order)?;
                if order.dispute.status != Some(DisputeStatus::Open) {
                    return Err(TradeError::InvalidState(
                        "only an open dispute can be taken under review".to_string(),
                    ));
                }
                order.dispute.status = Some(DisputeStatus::UnderReview);
                order.updated_at = now;
                Ok(((), Vec::new()))
            })
            .await?;
        info!(order_id, reviewer = %caller.user_id, "Dispute under review");
        Ok(order)
    }

    /// Admin decision. With funds still in escrow the ledger settles them;
    /// if they were already released the decision can only favour the seller
    /// and is recorded locally.
    pub async fn resolve(
        &self,
        caller: &Caller,
        order_id: &str,
        resolution: &str,
        refund_buyer: bool,
    ) -> TradeResult<Order> {
        if !caller.is_admin() {
            return Err(TradeError::Forbidden("only an admin can resolve disputes".to_string()));
        }
        let resolution = resolution.trim();
        if resolution.is_empty() {
            return Err(TradeError::Validation("a resolution is required".to_string()));
        }

        let current = self.store.load(order_id).await?;
        let claimed_by_us =
            current.pending_settlement == Some(PendingSettlement::ResolveDispute { refund_buyer });

        let order = if current.payment.funds_held() || claimed_by_us {
            let (order, ()) = self
                .gateway
                .settle(
                    order_id,
                    LedgerCall::ResolveDispute(refund_buyer),
                    |order, _| {
                        check_resolvable(order)?;
                        require_funds_held(order)
                    },
                    |order, receipt, now| {
                        let events = apply_resolution(
                            order,
                            resolution,
                            refund_buyer,
                            &caller.user_id,
                            Some(&receipt.transaction_ref),
                            now,
                        );
                        Ok(((), events))
                    },
                )
                .await?;
            order
        } else {
            let now = self.clock.now();
            let (order, ()) = self
                .store
                .mutate(order_id, |order| {
                    ensure_unclaimed(order)?;
                    check_resolvable(order)?;
                    if order.payment.funds_held() {
                        return Err(TradeError::Conflict(
                            "escrow state changed while resolving; retry".to_string(),
                        ));
                    }
                    if refund_buyer {
                        warn!(order_id = %order.id, "Refund requested but escrow funds are no longer held");
                        return Err(TradeError::InvalidState(
                            "escrow funds are no longer held; the buyer cannot be refunded".to_string(),
                        ));
                    }
                    let events =
                        apply_resolution(order, resolution, false, &caller.user_id, None, now);
                    Ok(((), events))
                })
                .await?;
            order
        };

        info!(
            order_id,
            resolver = %caller.user_id,
            refund_buyer,
            status = %order.status,
            "Dispute resolved"
        );
        Ok(order)
    }
}
