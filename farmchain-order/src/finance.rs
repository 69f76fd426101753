use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Order, OrderStatus, PaymentStatus};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatusTotals {
    pub count: u64,
    pub total_amount: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PaymentTotals {
    /// Completed payments made as buyer
    pub sent: i64,
    /// Completed payments received as seller, net of platform fees
    pub received: i64,
    pub platform_fees: i64,
    /// Orders of either side whose escrow has not yet settled
    pub pending_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct OrderStats {
    pub as_buyer: BTreeMap<String, StatusTotals>,
    pub as_seller: BTreeMap<String, StatusTotals>,
    pub payments: PaymentTotals,
}

/// Platform fee and per-user trade summaries
pub struct FinancialManager {
    fee_bps: u32,
}

impl FinancialManager {
    pub fn new(fee_bps: u32) -> Self {
        Self { fee_bps }
    }

    /// Fee in minor units, rounded down
    pub fn platform_fee(&self, total_amount: i64) -> i64 {
        let fee = i128::from(total_amount) * i128::from(self.fee_bps) / 10_000;
        fee as i64
    }

    pub fn summarize(&self, user_id: &str, orders: &[Order]) -> OrderStats {
        let mut stats = OrderStats::default();

        for order in orders {
            let key = order.status.as_str().to_string();
            let completed = order.payment.status == PaymentStatus::Completed;
            let pending = order.payment.escrow_id.is_some()
                && order.payment.status == PaymentStatus::Pending
                && order.status != OrderStatus::Cancelled;

            if order.is_buyer(user_id) {
                let totals = stats.as_buyer.entry(key.clone()).or_default();
                totals.count += 1;
                totals.total_amount += order.terms.total_amount;
                if completed {
                    stats.payments.sent += order.terms.total_amount;
                }
            }
            if order.is_seller(user_id) {
                let totals = stats.as_seller.entry(key).or_default();
                totals.count += 1;
                totals.total_amount += order.terms.total_amount;
                if completed {
                    let fee = self.platform_fee(order.terms.total_amount);
                    stats.payments.received += order.terms.total_amount - fee;
                    stats.payments.platform_fees += fee;
                }
            }
            if pending && order.is_party(user_id) {
                stats.payments.pending_count += 1;
            }
        }

        stats
    }
}

impl Default for FinancialManager {
    fn default() -> Self {
        Self::new(200)
    }
}
