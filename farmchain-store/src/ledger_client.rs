use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use farmchain_core::{EscrowView, LedgerError, LedgerReceipt, SettlementLedger};

/// HTTP gateway in front of the escrow contract.
///
/// Every write returns once the gateway has the transaction accepted; the
/// gateway keys escrow creation by order id so retries are safe.
#[derive(Clone)]
pub struct HttpLedgerClient {
    client: Client,
    base_url: Url,
}

#[derive(Serialize)]
struct CreateEscrowBody<'a> {
    order_id: &'a str,
    seller_address: &'a str,
    amount: i64,
}

#[derive(Serialize)]
struct ReasonBody<'a> {
    reason: &'a str,
}

#[derive(Serialize)]
struct ResolveBody {
    refund_buyer: bool,
}

impl HttpLedgerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| LedgerError::Unavailable(format!("invalid ledger url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(LedgerError::Unavailable(format!("ledger url {} cannot be a base", base_url)));
        }
        Ok(Self { client, base_url })
    }

    /// Append path segments to the base url. Each segment is percent-encoded,
    /// so an escrow id can never change the route.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, LedgerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LedgerError::Unavailable(format!("ledger url {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<LedgerReceipt, LedgerError> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "Submitting ledger transaction");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        decode(response).await
    }
}

fn classify(status: StatusCode, body: String) -> LedgerError {
    if status.is_client_error() {
        LedgerError::Rejected(format!("{}: {}", status, body))
    } else {
        LedgerError::Unavailable(format!("{}: {}", status, body))
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, LedgerError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, "Ledger gateway returned an error");
        return Err(classify(status, body));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| LedgerError::Malformed(e.to_string()))
}

#[async_trait]
impl SettlementLedger for HttpLedgerClient {
    async fn create_escrow(
        &self,
        order_id: &str,
        seller_address: &str,
        amount: i64,
    ) -> Result<LedgerReceipt, LedgerError> {
        self.post(
            &["escrows"],
            &CreateEscrowBody {
                order_id,
                seller_address,
                amount,
            },
        )
        .await
    }

    async fn release(&self, escrow_id: &str) -> Result<LedgerReceipt, LedgerError> {
        self.post(&["escrows", escrow_id, "release"], &serde_json::json!({}))
            .await
    }

    async fn refund(&self, escrow_id: &str) -> Result<LedgerReceipt, LedgerError> {
        self.post(&["escrows", escrow_id, "refund"], &serde_json::json!({}))
            .await
    }

    async fn request_refund(
        &self,
        escrow_id: &str,
        reason: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        self.post(
            &["escrows", escrow_id, "request-refund"],
            &ReasonBody { reason },
        )
        .await
    }

    async fn cancel(&self, escrow_id: &str) -> Result<LedgerReceipt, LedgerError> {
        self.post(&["escrows", escrow_id, "cancel"], &serde_json::json!({}))
            .await
    }

    async fn resolve_dispute(
        &self,
        escrow_id: &str,
        refund_buyer: bool,
    ) -> Result<LedgerReceipt, LedgerError> {
        self.post(
            &["escrows", escrow_id, "resolve"],
            &ResolveBody { refund_buyer },
        )
        .await
    }

    async fn get_escrow(&self, escrow_id: &str) -> Result<EscrowView, LedgerError> {
        let url = self.endpoint(&["escrows", escrow_id])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        decode(response).await
    }
}
