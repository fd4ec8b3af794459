//! Realized profit and cost-of-goods-sold
//!
//! One global chronological replay: the company's entire log is sorted
//! once by `(date, seq)` and every position's FIFO layer list is carried
//! concurrently. Each `SALES` outward entry realizes the value consumed
//! from its position's layers as COGS. The layer arithmetic is the same
//! routine the FIFO valuation engine uses; this module exists purely to
//! batch the computation across all items in one pass for reporting.

use crate::types::{FifoLayer, StockKey, Transaction, VoucherType};
use crate::valuation::apply_to_layers;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Realized cost and profit for one sale line
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitLine {
    /// Ledger entry the sale line posted
    pub tx_id: Uuid,
    /// Sales voucher
    pub voucher_id: Uuid,
    /// Business date
    pub date: NaiveDate,
    /// Position sold from
    #[serde(flatten)]
    pub key: StockKey,
    /// Quantity sold (positive)
    pub qty_sold: Decimal,
    /// Sale value
    pub revenue: Decimal,
    /// Value consumed from the position's FIFO layers
    pub cogs: Decimal,
    /// `revenue - cogs`
    pub profit: Decimal,
}

/// Profit report over a company's full history
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitStatement {
    /// One row per sale line, in replay order
    pub lines: Vec<ProfitLine>,
    /// Sum of sale values
    pub total_revenue: Decimal,
    /// Sum of realized costs
    pub total_cogs: Decimal,
    /// `total_revenue - total_cogs`
    pub total_profit: Decimal,
}

/// Replay the full log once and realize COGS per sale line
pub fn profit_statement(log: &[Transaction]) -> ProfitStatement {
    let mut ordered: Vec<&Transaction> = log.iter().collect();
    ordered.sort_by_key(|tx| (tx.date, tx.seq));

    let mut layers: HashMap<StockKey, Vec<FifoLayer>> = HashMap::new();
    let mut lines = Vec::new();
    let mut total_revenue = Decimal::ZERO;
    let mut total_cogs = Decimal::ZERO;

    for tx in ordered {
        let consumed = {
            let position = layers.entry(tx.stock_key()).or_default();
            apply_to_layers(position, tx)
        };

        if tx.voucher_type == VoucherType::Sales && tx.qty < Decimal::ZERO {
            let revenue = tx.value.abs();
            total_revenue += revenue;
            total_cogs += consumed;
            lines.push(ProfitLine {
                tx_id: tx.tx_id,
                voucher_id: tx.voucher_id,
                date: tx.date,
                key: tx.stock_key(),
                qty_sold: -tx.qty,
                revenue,
                cogs: consumed,
                profit: revenue - consumed,
            });
        }
    }

    ProfitStatement {
        lines,
        total_revenue,
        total_cogs,
        total_profit: total_revenue - total_cogs,
    }
}
