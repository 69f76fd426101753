use chrono::{DateTime, Utc};
use serde::Deserialize;

use farmchain_core::{Caller, TradeError, TradeResult};
use farmchain_shared::{OrderEvent, OrderEventKind};

use crate::models::{Order, OrderStatus, ReservationState};

/// Carrier details recorded when the seller ships.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShipmentDetails {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub target: OrderStatus,
    pub note: Option<String>,
    pub location: Option<String>,
    pub shipment: Option<ShipmentDetails>,
}

impl TransitionRequest {
    pub fn to(target: OrderStatus) -> Self {
        Self {
            target,
            note: None,
            location: None,
            shipment: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Inventory work that must follow a committed status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    None,
    Restore,
    MarkSold,
}

#[derive(Debug)]
pub struct TransitionOutcome {
    pub effect: StockEffect,
    pub events: Vec<OrderEvent>,
}

/// Enforces the order lifecycle. Stateless: every method works on an
/// order the caller has loaded and will persist.
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Who may request `target`. Parties other than buyer and seller are
    /// never allowed; the buyer only withdraws or disputes.
    pub fn authorize(order: &Order, caller: &Caller, target: OrderStatus) -> TradeResult<()> {
        if caller.is_admin() || order.is_seller(&caller.user_id) {
            return Ok(());
        }
        if order.is_buyer(&caller.user_id) {
            return match target {
                OrderStatus::Cancelled if order.status.is_buyer_cancellable() => Ok(()),
                OrderStatus::Disputed => Ok(()),
                _ => Err(TradeError::Forbidden(format!(
                    "buyer cannot move order to {}",
                    target
                ))),
            };
        }
        Err(TradeError::Forbidden(
            "not a party to this order".to_string(),
        ))
    }

    /// Apply an ordinary table transition requested by `caller`.
    ///
    /// Disputes are raised through the dispute workflow, and a cancellation
    /// while escrow funds are held must go through the escrow gateway first;
    /// both are rejected here.
    pub fn transition(
        order: &mut Order,
        caller: &Caller,
        request: &TransitionRequest,
        now: DateTime<Utc>,
    ) -> TradeResult<TransitionOutcome> {
        let target = request.target;
        if !order.status.can_transition_to(target) {
            return Err(TradeError::invalid_transition(order.status, target));
        }
        Self::authorize(order, caller, target)?;

        match target {
            OrderStatus::Disputed => {
                return Err(TradeError::InvalidState(
                    "disputes are raised with a reason through the dispute workflow".to_string(),
                ))
            }
            OrderStatus::PaymentCompleted if order.payment.escrow_id.is_none() => {
                return Err(TradeError::InvalidState(
                    "payment cannot complete before an escrow exists".to_string(),
                ))
            }
            OrderStatus::Cancelled if order.payment.funds_held() => {
                return Err(TradeError::InvalidState(
                    "escrow funds are held; cancellation must refund them first".to_string(),
                ))
            }
            _ => {}
        }
        if request.shipment.is_some() && target != OrderStatus::Shipped {
            return Err(TradeError::Validation(
                "shipment details are only accepted when shipping".to_string(),
            ));
        }

        if let Some(shipment) = &request.shipment {
            if let Some(carrier) = &shipment.carrier {
                order.delivery.carrier = Some(carrier.clone());
            }
            if let Some(tracking) = &shipment.tracking_number {
                order.delivery.tracking_number = Some(tracking.clone());
            }
        }

        let note = request
            .note
            .clone()
            .unwrap_or_else(|| format!("Status updated to {}", target));
        let (effect, event) = Self::enter(
            order,
            target,
            &caller.user_id,
            note,
            request.location.clone(),
            now,
        );
        Ok(TransitionOutcome {
            effect,
            events: vec![event],
        })
    }

    /// Record entry into `target` with its bookkeeping. Performs no
    /// legality or authorization checks; every caller does its own.
    pub(crate) fn enter(
        order: &mut Order,
        target: OrderStatus,
        actor: &str,
        note: impl Into<String>,
        location: Option<String>,
        now: DateTime<Utc>,
    ) -> (StockEffect, OrderEvent) {
        let from = order.status;
        order.record_status(target, actor, note, location, now);

        let effect = match target {
            OrderStatus::Cancelled if order.reservation == ReservationState::Held => {
                order.reservation = ReservationState::Restored;
                StockEffect::Restore
            }
            OrderStatus::Delivered => {
                if order.delivery.actual_date.is_none() {
                    order.delivery.actual_date = Some(now);
                }
                if order.reservation == ReservationState::Held {
                    order.reservation = ReservationState::Sold;
                    StockEffect::MarkSold
                } else {
                    StockEffect::None
                }
            }
            _ => StockEffect::None,
        };

        let event = OrderEvent::new(
            &order.id,
            OrderEventKind::StatusChanged {
                from: from.as_str().to_string(),
                to: target.as_str().to_string(),
                actor: actor.to_string(),
            },
        );
        (effect, event)
    }
}

/// Reject any mutation while a ledger operation is in flight for the order.
pub fn ensure_unclaimed(order: &Order) -> TradeResult<()> {
    match order.pending_settlement {
        Some(op) => Err(TradeError::Conflict(format!(
            "order {} has a {} settlement in progress",
            order.id,
            op.name()
        ))),
        None => Ok(()),
    }
}
