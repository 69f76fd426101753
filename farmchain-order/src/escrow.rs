use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use farmchain_core::{
    Caller, Clock, EscrowView, LedgerError, LedgerReceipt, SettlementLedger, TradeError,
    TradeResult,
};
use farmchain_shared::{OrderEvent, OrderEventKind};

use crate::dispute::open_dispute;
use crate::machine::{ensure_unclaimed, OrderStateMachine, StockEffect};
use crate::models::{Order, OrderStatus, PaymentRecord, PaymentStatus, PendingSettlement};
use crate::repository::OrderStore;

/// A call against the settlement ledger, as claimed on an order.
#[derive(Debug, Clone)]
pub(crate) enum LedgerCall {
    CreateEscrow,
    Release,
    Refund,
    RequestRefund(String),
    CancelWithinGrace,
    ResolveDispute(bool),
}

impl LedgerCall {
    fn marker(&self) -> PendingSettlement {
        match self {
            LedgerCall::CreateEscrow => PendingSettlement::CreateEscrow,
            LedgerCall::Release => PendingSettlement::Release,
            LedgerCall::Refund => PendingSettlement::Refund,
            LedgerCall::RequestRefund(_) => PendingSettlement::RequestRefund,
            LedgerCall::CancelWithinGrace => PendingSettlement::CancelWithinGrace,
            LedgerCall::ResolveDispute(refund_buyer) => PendingSettlement::ResolveDispute {
                refund_buyer: *refund_buyer,
            },
        }
    }
}

/// Local payment record next to the ledger's own view of the escrow.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentDetails {
    pub order_id: String,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub currency: String,
    pub payment: PaymentRecord,
    pub ledger: Option<EscrowView>,
    pub warning: Option<String>,
}

/// Translates order payment intents into settlement-ledger calls and
/// writes the confirmations back onto the order.
///
/// The ledger is never awaited while the order lock is held. Each operation
/// first claims the order (a `pending_settlement` marker, nothing else
/// changes), calls the ledger, then either applies the receipt or drops the
/// claim. A failed call therefore leaves the order as it was.
#[derive(Clone)]
pub struct EscrowGateway {
    ledger: Arc<dyn SettlementLedger>,
    store: OrderStore,
    clock: Arc<dyn Clock>,
    grace_period: Duration,
}

impl EscrowGateway {
    pub fn new(
        ledger: Arc<dyn SettlementLedger>,
        store: OrderStore,
        clock: Arc<dyn Clock>,
        grace_period: Duration,
    ) -> Self {
        Self {
            ledger,
            store,
            clock,
            grace_period,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Lock the order total into escrow for the seller.
    pub async fn create_escrow(&self, caller: &Caller, order_id: &str) -> TradeResult<Order> {
        let (order, ()) = self
            .settle(
                order_id,
                LedgerCall::CreateEscrow,
                |order, _| {
                    if !order.is_buyer(&caller.user_id) {
                        return Err(TradeError::Forbidden(
                            "only the buyer can fund the escrow".to_string(),
                        ));
                    }
                    if !matches!(
                        order.status,
                        OrderStatus::Confirmed | OrderStatus::PaymentInitiated
                    ) {
                        return Err(TradeError::invalid_transition(
                            order.status,
                            OrderStatus::PaymentInitiated,
                        ));
                    }
                    if order.payment.status == PaymentStatus::Completed {
                        return Err(TradeError::InvalidState(
                            "payment already completed".to_string(),
                        ));
                    }
                    if order.payment.escrow_id.is_some() {
                        return Err(TradeError::InvalidState(
                            "an escrow already exists for this order".to_string(),
                        ));
                    }
                    Ok(())
                },
                |order, receipt, now| {
                    order.payment.escrow_id = Some(receipt.escrow_id.clone());
                    order.payment.transaction_ref = Some(receipt.transaction_ref.clone());
                    order.payment.escrow_created_at = Some(now);
                    order.updated_at = now;
                    let mut events = vec![OrderEvent::new(
                        &order.id,
                        OrderEventKind::EscrowCreated {
                            escrow_id: receipt.escrow_id.clone(),
                            transaction_ref: receipt.transaction_ref.clone(),
                        },
                    )];
                    if order.status == OrderStatus::Confirmed {
                        let (_, event) = OrderStateMachine::enter(
                            order,
                            OrderStatus::PaymentInitiated,
                            &caller.user_id,
                            "Escrow created",
                            None,
                            now,
                        );
                        events.push(event);
                    }
                    Ok(((), events))
                },
            )
            .await?;
        Ok(order)
    }

    /// Pay the held funds out to the seller once the goods are delivered.
    pub async fn release(&self, caller: &Caller, order_id: &str) -> TradeResult<Order> {
        let (order, ()) = self
            .settle(
                order_id,
                LedgerCall::Release,
                |order, _| {
                    if !caller.is_admin() && !order.is_buyer(&caller.user_id) {
                        return Err(TradeError::Forbidden(
                            "only the buyer or an admin can release payment".to_string(),
                        ));
                    }
                    if order.status != OrderStatus::Delivered {
                        return Err(TradeError::InvalidState(format!(
                            "payment can only be released for delivered orders (order is {})",
                            order.status
                        )));
                    }
                    if order.payment.status == PaymentStatus::Completed {
                        return Err(TradeError::InvalidState(
                            "payment already released".to_string(),
                        ));
                    }
                    require_funds_held(order)
                },
                |order, receipt, now| {
                    order.payment.status = PaymentStatus::Completed;
                    order.payment.paid_at = Some(now);
                    order.payment.transaction_ref = Some(receipt.transaction_ref.clone());
                    order.updated_at = now;
                    let event = OrderEvent::new(
                        &order.id,
                        OrderEventKind::PaymentReleased {
                            escrow_id: receipt.escrow_id.clone(),
                            transaction_ref: receipt.transaction_ref.clone(),
                        },
                    );
                    Ok(((), vec![event]))
                },
            )
            .await?;
        Ok(order)
    }

    /// Buyer withdraws inside the grace window; the escrow is reversed and
    /// the order cancelled.
    pub async fn cancel_within_grace(
        &self,
        caller: &Caller,
        order_id: &str,
        reason: Option<String>,
    ) -> TradeResult<(Order, StockEffect)> {
        let grace_period = self.grace_period;
        self.settle(
            order_id,
            LedgerCall::CancelWithinGrace,
            |order, now| {
                if !order.is_buyer(&caller.user_id) {
                    return Err(TradeError::Forbidden(
                        "only the buyer can cancel the escrow".to_string(),
                    ));
                }
                if !order.status.is_buyer_cancellable() {
                    return Err(TradeError::invalid_transition(
                        order.status,
                        OrderStatus::Cancelled,
                    ));
                }
                require_funds_held(order)?;
                // A held claim already passed the deadline check when it was taken
                if order.pending_settlement == Some(PendingSettlement::CancelWithinGrace) {
                    return Ok(());
                }
                let created = order.payment.escrow_created_at.ok_or_else(|| {
                    TradeError::InvalidState("escrow creation time is unknown".to_string())
                })?;
                let deadline = created + grace_period;
                if now > deadline {
                    return Err(TradeError::GracePeriodExpired { deadline });
                }
                Ok(())
            },
            |order, receipt, now| {
                let note = reason
                    .clone()
                    .unwrap_or_else(|| "Cancelled by buyer within escrow grace period".to_string());
                Ok(refund_and_enter_cancelled(order, receipt, &caller.user_id, note, now))
            },
        )
        .await
    }

    /// Seller or admin cancels while funds are held; the buyer is refunded
    /// through the ledger before the order is cancelled.
    pub async fn refund_and_cancel(
        &self,
        caller: &Caller,
        order_id: &str,
        note: Option<String>,
    ) -> TradeResult<(Order, StockEffect)> {
        self.settle(
            order_id,
            LedgerCall::Refund,
            |order, _| {
                if !caller.is_admin() && !order.is_seller(&caller.user_id) {
                    return Err(TradeError::Forbidden(
                        "only the seller or an admin can refund the escrow".to_string(),
                    ));
                }
                if !order.status.can_transition_to(OrderStatus::Cancelled) {
                    return Err(TradeError::invalid_transition(
                        order.status,
                        OrderStatus::Cancelled,
                    ));
                }
                require_funds_held(order)
            },
            |order, receipt, now| {
                let note = note
                    .clone()
                    .unwrap_or_else(|| "Cancelled by seller; escrow refunded".to_string());
                Ok(refund_and_enter_cancelled(order, receipt, &caller.user_id, note, now))
            },
        )
        .await
    }

    /// Buyer contests a delivered order before release. The ledger marks
    /// the escrow contested and a dispute is opened; the refund itself is
    /// only settled by dispute resolution.
    pub async fn request_refund(
        &self,
        caller: &Caller,
        order_id: &str,
        reason: &str,
    ) -> TradeResult<Order> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TradeError::Validation("a refund reason is required".to_string()));
        }
        let (order, ()) = self
            .settle(
                order_id,
                LedgerCall::RequestRefund(reason.to_string()),
                |order, _| {
                    if !order.is_buyer(&caller.user_id) {
                        return Err(TradeError::Forbidden(
                            "only the buyer can request a refund".to_string(),
                        ));
                    }
                    if order.dispute.is_disputed {
                        return Err(TradeError::InvalidState(
                            "a dispute has already been raised for this order".to_string(),
                        ));
                    }
                    if order.status != OrderStatus::Delivered {
                        return Err(TradeError::InvalidState(format!(
                            "refunds can only be requested for delivered orders (order is {})",
                            order.status
                        )));
                    }
                    require_funds_held(order)
                },
                |order, _, now| {
                    let events = open_dispute(order, reason, &caller.user_id, now)?;
                    Ok(((), events))
                },
            )
            .await?;
        Ok(order)
    }

    /// Read-only payment view. A ledger failure degrades to the local record.
    pub async fn payment_details(&self, caller: &Caller, order_id: &str) -> TradeResult<PaymentDetails> {
        let order = self.store.load(order_id).await?;
        if !order.can_view(caller) {
            return Err(TradeError::Forbidden("not a party to this order".to_string()));
        }

        let (ledger, warning) = match order.payment.escrow_id.as_deref() {
            Some(escrow_id) => match self.ledger.get_escrow(escrow_id).await {
                Ok(view) => (Some(view), None),
                Err(err) => {
                    warn!(order_id, error = %err, "Could not read escrow from ledger");
                    (None, Some(format!("ledger details unavailable: {}", err)))
                }
            },
            None => (None, None),
        };

        Ok(PaymentDetails {
            order_id: order.id,
            status: order.status,
            total_amount: order.terms.total_amount,
            currency: order.terms.currency,
            payment: order.payment,
            ledger,
            warning,
        })
    }

    /// Claim, call the ledger unlocked, then apply or roll back the claim.
    ///
    /// Re-issuing the operation that holds the claim is allowed and relies
    /// on the ledger's idempotence; any other operation sees `Conflict`.
    pub(crate) async fn settle<P, A, R>(
        &self,
        order_id: &str,
        call: LedgerCall,
        precheck: P,
        apply: A,
    ) -> TradeResult<(Order, R)>
    where
        P: FnOnce(&Order, DateTime<Utc>) -> TradeResult<()> + Send,
        A: FnOnce(&mut Order, &LedgerReceipt, DateTime<Utc>) -> TradeResult<(R, Vec<OrderEvent>)>
            + Send,
        R: Send,
    {
        let marker = call.marker();
        let now = self.clock.now();
        let (claimed, ()) = self
            .store
            .mutate(order_id, |order| {
                if order.pending_settlement != Some(marker) {
                    ensure_unclaimed(order)?;
                }
                precheck(order, now)?;
                order.pending_settlement = Some(marker);
                Ok(((), Vec::new()))
            })
            .await?;

        match self.invoke(&call, &claimed).await {
            Ok(receipt) => {
                let now = self.clock.now();
                let (order, value) = self
                    .store
                    .mutate(order_id, |order| {
                        if order.pending_settlement != Some(marker) {
                            return Err(TradeError::Conflict(format!(
                                "settlement claim on order {} was lost",
                                order.id
                            )));
                        }
                        order.pending_settlement = None;
                        apply(order, &receipt, now)
                    })
                    .await?;
                info!(
                    order_id,
                    operation = marker.name(),
                    escrow_id = %receipt.escrow_id,
                    transaction_ref = %receipt.transaction_ref,
                    status = %order.status,
                    "Settlement applied"
                );
                Ok((order, value))
            }
            Err(err) => {
                error!(order_id, operation = marker.name(), error = %err, "Settlement ledger call failed");
                let released = self
                    .store
                    .mutate(order_id, |order| {
                        if order.pending_settlement == Some(marker) {
                            order.pending_settlement = None;
                        }
                        Ok(((), Vec::new()))
                    })
                    .await;
                if let Err(release_err) = released {
                    warn!(order_id, error = %release_err, "Settlement claim left in place; re-issue the operation");
                }
                Err(err.into())
            }
        }
    }

    async fn invoke(&self, call: &LedgerCall, order: &Order) -> Result<LedgerReceipt, LedgerError> {
        match call {
            LedgerCall::CreateEscrow => {
                self.ledger
                    .create_escrow(
                        &order.id,
                        order.seller.settlement_address.inner(),
                        order.terms.total_amount,
                    )
                    .await
            }
            LedgerCall::Release => self.ledger.release(escrow_id(order)?).await,
            LedgerCall::Refund => self.ledger.refund(escrow_id(order)?).await,
            LedgerCall::RequestRefund(reason) => {
                self.ledger.request_refund(escrow_id(order)?, reason).await
            }
            LedgerCall::CancelWithinGrace => self.ledger.cancel(escrow_id(order)?).await,
            LedgerCall::ResolveDispute(refund_buyer) => {
                self.ledger
                    .resolve_dispute(escrow_id(order)?, *refund_buyer)
                    .await
            }
        }
    }
}

fn escrow_id(order: &Order) -> Result<&str, LedgerError> {
    order
        .payment
        .escrow_id
        .as_deref()
        .ok_or_else(|| LedgerError::Rejected(format!("order {} has no escrow", order.id)))
}

pub(crate) fn require_funds_held(order: &Order) -> TradeResult<()> {
    if order.payment.funds_held() {
        Ok(())
    } else {
        Err(TradeError::InvalidState(
            "no escrow funds are held for this order".to_string(),
        ))
    }
}

fn refund_and_enter_cancelled(
    order: &mut Order,
    receipt: &LedgerReceipt,
    actor: &str,
    note: String,
    now: DateTime<Utc>,
) -> (StockEffect, Vec<OrderEvent>) {
    order.payment.status = PaymentStatus::Refunded;
    order.payment.refunded_at = Some(now);
    order.payment.transaction_ref = Some(receipt.transaction_ref.clone());
    let refunded = OrderEvent::new(
        &order.id,
        OrderEventKind::PaymentRefunded {
            escrow_id: receipt.escrow_id.clone(),
            transaction_ref: receipt.transaction_ref.clone(),
        },
    );
    let (effect, status_changed) =
        OrderStateMachine::enter(order, OrderStatus::Cancelled, actor, note, None, now);
    (effect, vec![refunded, status_changed])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimEscrowState {
    Held,
    Contested,
    Released,
    Refunded,
}

impl SimEscrowState {
    fn as_str(&self) -> &'static str {
        match self {
            SimEscrowState::Held => "held",
            SimEscrowState::Contested => "contested",
            SimEscrowState::Released => "released",
            SimEscrowState::Refunded => "refunded",
        }
    }
}

struct SimEscrow {
    order_id: String,
    seller_address: String,
    amount: i64,
    state: SimEscrowState,
    created_at: DateTime<Utc>,
    receipts: HashMap<&'static str, LedgerReceipt>,
}

#[derive(Default)]
struct SimState {
    escrows: HashMap<String, SimEscrow>,
    by_order: HashMap<String, String>,
    failures: VecDeque<LedgerError>,
    offline: bool,
    calls: usize,
    block: u64,
}

impl SimState {
    fn admit(&mut self) -> Result<(), LedgerError> {
        self.calls += 1;
        if self.offline {
            return Err(LedgerError::Unavailable("simulated ledger is offline".to_string()));
        }
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn receipt(&mut self, escrow_id: &str) -> LedgerReceipt {
        self.block += 1;
        LedgerReceipt {
            escrow_id: escrow_id.to_string(),
            transaction_ref: format!("0x{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
            block_number: Some(self.block),
        }
    }

    fn advance(
        &mut self,
        escrow_id: &str,
        operation: &'static str,
        allowed: &[SimEscrowState],
        next: SimEscrowState,
    ) -> Result<LedgerReceipt, LedgerError> {
        self.admit()?;
        let current = {
            let escrow = self
                .escrows
                .get(escrow_id)
                .ok_or_else(|| LedgerError::Rejected(format!("unknown escrow {}", escrow_id)))?;
            if let Some(receipt) = escrow.receipts.get(operation) {
                return Ok(receipt.clone());
            }
            escrow.state
        };
        if !allowed.contains(&current) {
            return Err(LedgerError::Rejected(format!(
                "cannot {} an escrow that is {}",
                operation,
                current.as_str()
            )));
        }
        let receipt = self.receipt(escrow_id);
        if let Some(escrow) = self.escrows.get_mut(escrow_id) {
            escrow.state = next;
            escrow.receipts.insert(operation, receipt.clone());
        }
        Ok(receipt)
    }
}

/// In-process stand-in for the escrow contract, for development and tests.
/// Failures can be injected to exercise the gateway's error paths.
#[derive(Default)]
pub struct SimulatedLedger {
    state: Mutex<SimState>,
    latency: std::time::Duration,
}

impl SimulatedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: std::time::Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Queue an error returned by the next ledger call
    pub async fn fail_next(&self, err: LedgerError) {
        self.state.lock().await.failures.push_back(err);
    }

    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    pub async fn calls(&self) -> usize {
        self.state.lock().await.calls
    }

    pub async fn escrow_state(&self, escrow_id: &str) -> Option<&'static str> {
        self.state
            .lock()
            .await
            .escrows
            .get(escrow_id)
            .map(|escrow| escrow.state.as_str())
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl SettlementLedger for SimulatedLedger {
    async fn create_escrow(
        &self,
        order_id: &str,
        seller_address: &str,
        amount: i64,
    ) -> Result<LedgerReceipt, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock().await;
        state.admit()?;
        if amount <= 0 {
            return Err(LedgerError::Rejected("escrow amount must be positive".to_string()));
        }
        if let Some(existing) = state.by_order.get(order_id).cloned() {
            if let Some(receipt) = state
                .escrows
                .get(&existing)
                .and_then(|escrow| escrow.receipts.get("create"))
            {
                return Ok(receipt.clone());
            }
        }
        let escrow_id = format!("esc-{}", Uuid::new_v4().simple());
        let receipt = state.receipt(&escrow_id);
        let mut receipts = HashMap::new();
        receipts.insert("create", receipt.clone());
        state.escrows.insert(
            escrow_id.clone(),
            SimEscrow {
                order_id: order_id.to_string(),
                seller_address: seller_address.to_string(),
                amount,
                state: SimEscrowState::Held,
                created_at: Utc::now(),
                receipts,
            },
        );
        state.by_order.insert(order_id.to_string(), escrow_id);
        Ok(receipt)
    }

    async fn release(&self, escrow_id: &str) -> Result<LedgerReceipt, LedgerError> {
        self.delay().await;
        self.state.lock().await.advance(
            escrow_id,
            "release",
            &[SimEscrowState::Held],
            SimEscrowState::Released,
        )
    }

    async fn refund(&self, escrow_id: &str) -> Result<LedgerReceipt, LedgerError> {
        self.delay().await;
        self.state.lock().await.advance(
            escrow_id,
            "refund",
            &[SimEscrowState::Held, SimEscrowState::Contested],
            SimEscrowState::Refunded,
        )
    }

    async fn request_refund(
        &self,
        escrow_id: &str,
        _reason: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        self.delay().await;
        self.state.lock().await.advance(
            escrow_id,
            "request_refund",
            &[SimEscrowState::Held],
            SimEscrowState::Contested,
        )
    }

    async fn cancel(&self, escrow_id: &str) -> Result<LedgerReceipt, LedgerError> {
        self.delay().await;
        self.state.lock().await.advance(
            escrow_id,
            "cancel",
            &[SimEscrowState::Held],
            SimEscrowState::Refunded,
        )
    }

    async fn resolve_dispute(
        &self,
        escrow_id: &str,
        refund_buyer: bool,
    ) -> Result<LedgerReceipt, LedgerError> {
        self.delay().await;
        let next = if refund_buyer {
            SimEscrowState::Refunded
        } else {
            SimEscrowState::Released
        };
        self.state.lock().await.advance(
            escrow_id,
            "resolve",
            &[SimEscrowState::Held, SimEscrowState::Contested],
            next,
        )
    }

    async fn get_escrow(&self, escrow_id: &str) -> Result<EscrowView, LedgerError> {
        self.delay().await;
        let mut state = self.state.lock().await;
        state.admit()?;
        let escrow = state
            .escrows
            .get(escrow_id)
            .ok_or_else(|| LedgerError::Rejected(format!("unknown escrow {}", escrow_id)))?;
        Ok(EscrowView {
            escrow_id: escrow_id.to_string(),
            order_id: escrow.order_id.clone(),
            seller_address: escrow.seller_address.clone(),
            amount: escrow.amount,
            state: escrow.state.as_str().to_string(),
            created_at: Some(escrow.created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_create_is_keyed_by_order() {
        let ledger = SimulatedLedger::new();
        let first = ledger.create_escrow("ORD-1", "0xfarmer", 500).await.unwrap();
        let second = ledger.create_escrow("ORD-1", "0xfarmer", 500).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.escrow_state(&first.escrow_id).await, Some("held"));
    }

    #[tokio::test]
    async fn test_simulated_release_is_idempotent() {
        let ledger = SimulatedLedger::new();
        let escrow = ledger.create_escrow("ORD-2", "0xfarmer", 500).await.unwrap();
        let first = ledger.release(&escrow.escrow_id).await.unwrap();
        let again = ledger.release(&escrow.escrow_id).await.unwrap();
        assert_eq!(first, again);

        let err = ledger.refund(&escrow.escrow_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_simulated_failure_injection() {
        let ledger = SimulatedLedger::new();
        ledger
            .fail_next(LedgerError::Unavailable("rpc timeout".to_string()))
            .await;
        assert!(ledger.create_escrow("ORD-3", "0xfarmer", 100).await.is_err());
        assert!(ledger.create_escrow("ORD-3", "0xfarmer", 100).await.is_ok());

        ledger.set_offline(true).await;
        assert!(matches!(
            ledger.get_escrow("esc-missing").await,
            Err(LedgerError::Unavailable(_))
        ));
        assert_eq!(ledger.calls().await, 3);
    }

    #[tokio::test]
    async fn test_simulated_contested_escrow_resolves() {
        let ledger = SimulatedLedger::new();
        let escrow = ledger.create_escrow("ORD-4", "0xfarmer", 900).await.unwrap();
        ledger
            .request_refund(&escrow.escrow_id, "rotten on arrival")
            .await
            .unwrap();
        assert!(ledger.release(&escrow.escrow_id).await.is_err());
        ledger.resolve_dispute(&escrow.escrow_id, true).await.unwrap();
        assert_eq!(ledger.escrow_state(&escrow.escrow_id).await, Some("refunded"));
    }
}
