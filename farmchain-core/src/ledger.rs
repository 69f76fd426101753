use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confirmation that the external settlement ledger accepted a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerReceipt {
    /// Escrow the transaction acted on (assigned by the ledger on creation)
    pub escrow_id: String,
    pub transaction_ref: String,
    pub block_number: Option<u64>,
}

/// The ledger's own view of an escrow, used for read-only payment details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EscrowView {
    pub escrow_id: String,
    pub order_id: String,
    pub seller_address: String,
    pub amount: i64,
    pub state: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("ledger rejected transaction: {0}")]
    Rejected(String),

    #[error("unexpected ledger response: {0}")]
    Malformed(String),
}

/// Client for the external settlement ledger (escrow contract).
///
/// Every call is a network round-trip that returns only after the
/// underlying transaction is accepted. Implementations must treat
/// `create_escrow` as keyed by `order_id`, and `release`/`refund`/
/// `resolve_dispute` as idempotent for an unchanged escrow id, so that a
/// caller may safely re-issue an operation whose outcome it never saw.
#[async_trait]
pub trait SettlementLedger: Send + Sync {
    /// Lock `amount` from the buyer into escrow payable to `seller_address`.
    async fn create_escrow(
        &self,
        order_id: &str,
        seller_address: &str,
        amount: i64,
    ) -> Result<LedgerReceipt, LedgerError>;

    /// Pay held funds out to the seller.
    async fn release(&self, escrow_id: &str) -> Result<LedgerReceipt, LedgerError>;

    /// Seller-side return of held funds to the buyer.
    async fn refund(&self, escrow_id: &str) -> Result<LedgerReceipt, LedgerError>;

    /// Buyer flags the escrow as contested; funds stay held.
    async fn request_refund(
        &self,
        escrow_id: &str,
        reason: &str,
    ) -> Result<LedgerReceipt, LedgerError>;

    /// Buyer-side reversal inside the cancellation window.
    async fn cancel(&self, escrow_id: &str) -> Result<LedgerReceipt, LedgerError>;

    /// Final settlement of a contested escrow.
    async fn resolve_dispute(
        &self,
        escrow_id: &str,
        refund_buyer: bool,
    ) -> Result<LedgerReceipt, LedgerError>;

    async fn get_escrow(&self, escrow_id: &str) -> Result<EscrowView, LedgerError>;
}
