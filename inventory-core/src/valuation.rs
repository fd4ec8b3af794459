//! Cost valuation engines
//!
//! Five engines over the same ordered replay slice: FIFO layers,
//! weighted-average, last-purchase, standard-cost, and market-price. All
//! of them are pure reads; layer state is rebuilt from scratch on every
//! query and discarded afterwards.
//!
//! The weighted-average engine averages over the entire inward history in
//! range, while the FIFO engine collapses to a current-layer average at
//! every physical reset. The two are distinct valuation policies and can
//! legitimately disagree; both are reported side by side in the snapshot.

use crate::stock::ordered_for_key;
use crate::types::{FifoLayer, LayerSource, StockKey, Transaction, VoucherType};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Layers at or below this quantity are dropped after consumption.
fn epsilon() -> Decimal {
    Decimal::new(1, 9)
}

/// Apply one ordered transaction to a position's layer list, returning the
/// value consumed from the layers (zero for inward entries and resets).
///
/// A physical stocktake collapses all current layers into one
/// quantity-weighted average rate and discards them; per-layer cost
/// identity is deliberately lost at every reset. With no surviving layer
/// quantity the count's own rate is the only cost evidence and is used
/// as-is.
pub(crate) fn apply_to_layers(layers: &mut Vec<FifoLayer>, tx: &Transaction) -> Decimal {
    if tx.is_floor() {
        let total_qty: Decimal = layers.iter().map(|l| l.qty).sum();
        let total_value: Decimal = layers.iter().map(|l| l.value()).sum();
        let rate = if total_qty > epsilon() {
            total_value / total_qty
        } else {
            tx.rate
        };

        layers.clear();
        if tx.qty > Decimal::ZERO {
            layers.push(FifoLayer {
                qty: tx.qty,
                rate,
                source: LayerSource::Physical,
            });
        }
        return Decimal::ZERO;
    }

    if tx.qty > Decimal::ZERO {
        layers.push(FifoLayer {
            qty: tx.qty,
            rate: tx.rate,
            source: LayerSource::Voucher(tx.voucher_id),
        });
        return Decimal::ZERO;
    }

    // Outward: consume oldest-first until the demand or the layers run out.
    let mut demand = -tx.qty;
    let mut consumed = Decimal::ZERO;
    while demand > Decimal::ZERO && !layers.is_empty() {
        let take = layers[0].qty.min(demand);
        consumed += take * layers[0].rate;
        layers[0].qty -= take;
        demand -= take;
        if layers[0].qty <= epsilon() {
            layers.remove(0);
        }
    }
    consumed
}

/// Build the FIFO layer list for one ordered replay slice
pub fn fifo_layers(ordered: &[&Transaction]) -> Vec<FifoLayer> {
    let mut layers = Vec::new();
    for tx in ordered {
        apply_to_layers(&mut layers, tx);
    }
    layers
}

/// Closing quantity and FIFO value of a layer list
pub fn fifo_position(layers: &[FifoLayer]) -> (Decimal, Decimal) {
    let qty = layers.iter().map(|l| l.qty).sum();
    let value = layers.iter().map(|l| l.value()).sum();
    (qty, value)
}

/// Lifetime weighted-average cost over inward transactions in range:
/// `Σ(qty·rate) / Σqty`, zero with no inward history.
pub fn weighted_average_cost(ordered: &[&Transaction]) -> Decimal {
    let mut total_qty = Decimal::ZERO;
    let mut total_value = Decimal::ZERO;
    for tx in ordered.iter().filter(|tx| tx.qty > Decimal::ZERO) {
        total_qty += tx.qty;
        total_value += tx.qty * tx.rate;
    }
    if total_qty > Decimal::ZERO {
        total_value / total_qty
    } else {
        Decimal::ZERO
    }
}

/// Rate of the most recent inward purchase-side transaction
/// (`PURCHASE` or `RECEIPT_NOTE`), zero if none.
pub fn last_purchase_rate(ordered: &[&Transaction]) -> Decimal {
    ordered
        .iter()
        .rev()
        .find(|tx| {
            tx.qty > Decimal::ZERO
                && matches!(
                    tx.voucher_type,
                    VoucherType::Purchase | VoucherType::ReceiptNote
                )
        })
        .map(|tx| tx.rate)
        .unwrap_or(Decimal::ZERO)
}

/// One entry of an item's effective-dated rate table (item master data)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateEntry {
    /// Date the rate takes effect
    pub from_date: NaiveDate,
    /// Rate per unit
    pub rate: Decimal,
}

/// Latest table entry with `from_date <= as_of` (no cutoff: latest
/// overall), zero with no applicable entry.
pub fn effective_rate(table: &[RateEntry], as_of: Option<NaiveDate>) -> Decimal {
    table
        .iter()
        .filter(|entry| as_of.map_or(true, |cutoff| entry.from_date <= cutoff))
        .max_by_key(|entry| entry.from_date)
        .map(|entry| entry.rate)
        .unwrap_or(Decimal::ZERO)
}

/// How the market-price engine derives its rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketMode {
    /// Effective-dated market rate table
    RateTable,
    /// Rate of the most recent sale
    LastSale,
    /// Quantity-weighted average sale rate in range
    AverageSale,
}

impl Default for MarketMode {
    fn default() -> Self {
        MarketMode::RateTable
    }
}

/// Market-price rate for one position under the configured mode
pub fn market_price_rate(
    table: &[RateEntry],
    ordered: &[&Transaction],
    mode: MarketMode,
    as_of: Option<NaiveDate>,
) -> Decimal {
    match mode {
        MarketMode::RateTable => effective_rate(table, as_of),
        MarketMode::LastSale => ordered
            .iter()
            .rev()
            .find(|tx| tx.voucher_type == VoucherType::Sales && tx.qty < Decimal::ZERO)
            .map(|tx| tx.rate)
            .unwrap_or(Decimal::ZERO),
        MarketMode::AverageSale => {
            let mut total_qty = Decimal::ZERO;
            let mut total_value = Decimal::ZERO;
            for tx in ordered
                .iter()
                .filter(|tx| tx.voucher_type == VoucherType::Sales && tx.qty < Decimal::ZERO)
            {
                total_qty += -tx.qty;
                total_value += -tx.qty * tx.rate;
            }
            if total_qty > Decimal::ZERO {
                total_value / total_qty
            } else {
                Decimal::ZERO
            }
        }
    }
}

/// Rate tables and mode configured for an item in the (external) master
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRates {
    /// Standard-cost rate table
    #[serde(default)]
    pub standard: Vec<RateEntry>,
    /// Market-price rate table
    #[serde(default)]
    pub market: Vec<RateEntry>,
    /// Market-price derivation mode
    #[serde(default)]
    pub market_mode: MarketMode,
}

/// One position valued under every method simultaneously, so a caller
/// can select the method configured for the item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationSnapshot {
    /// Position valued
    pub key: StockKey,
    /// Cutoff date, if the query was "as of"
    pub as_of: Option<NaiveDate>,
    /// Closing quantity (sum of surviving FIFO layers)
    pub qty: Decimal,
    /// FIFO closing value
    pub fifo_value: Decimal,
    /// Lifetime weighted-average cost per unit
    pub weighted_average_rate: Decimal,
    /// Closing quantity at the weighted-average rate
    pub weighted_average_value: Decimal,
    /// Most recent purchase-side rate
    pub last_purchase_rate: Decimal,
    /// Closing quantity at the last-purchase rate
    pub last_purchase_value: Decimal,
    /// Effective standard-cost rate
    pub standard_cost_rate: Decimal,
    /// Closing quantity at the standard-cost rate
    pub standard_cost_value: Decimal,
    /// Market-price rate under the configured mode
    pub market_rate: Decimal,
    /// Closing quantity at the market rate
    pub market_value: Decimal,
}

/// Run all five engines over one ordered load for one position
pub fn snapshot(
    log: &[Transaction],
    key: &StockKey,
    as_of: Option<NaiveDate>,
    rates: &ItemRates,
) -> ValuationSnapshot {
    let ordered = ordered_for_key(log, key, as_of);
    let layers = fifo_layers(&ordered);
    let (qty, fifo_value) = fifo_position(&layers);

    let weighted_average_rate = weighted_average_cost(&ordered);
    let last_purchase = last_purchase_rate(&ordered);
    let standard = effective_rate(&rates.standard, as_of);
    let market = market_price_rate(&rates.market, &ordered, rates.market_mode, as_of);

    ValuationSnapshot {
        key: key.clone(),
        as_of,
        qty,
        fifo_value,
        weighted_average_rate,
        weighted_average_value: qty * weighted_average_rate,
        last_purchase_rate: last_purchase,
        last_purchase_value: qty * last_purchase,
        standard_cost_rate: standard,
        standard_cost_value: qty * standard,
        market_rate: market,
        market_value: qty * market,
    }
}
