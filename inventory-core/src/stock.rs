//! Transaction shaping and stock reconstruction
//!
//! Stock quantity is never stored: it is reconstructed on demand by
//! replaying the ordered log for one `(item, godown, batch)` position. A
//! `PHYSICAL`/`ABSOLUTE` entry is an authoritative floor as of its place in
//! the order; entries before it are superseded, `DELTA` entries after it
//! accumulate on top of it.

use crate::types::{
    MovementLine, StockKey, Transaction, TxMode, VoucherType,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Voucher-level fields shared by every entry derived from one voucher
#[derive(Debug, Clone)]
pub struct VoucherMeta {
    /// Voucher type, which fixes the entry mode
    pub voucher_type: VoucherType,
    /// Voucher document id
    pub voucher_id: Uuid,
    /// Tracking number carried onto provisional-voucher entries
    pub tracking_no: Option<String>,
    /// Business date
    pub date: NaiveDate,
}

/// Stock on hand for one position, as returned by
/// [`compute_stock_for_all_items`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRow {
    /// Position
    #[serde(flatten)]
    pub key: StockKey,
    /// Reconstructed quantity
    pub qty: Decimal,
}

/// Outbound quantity a posting needs on hand before it may append
#[derive(Debug, Clone)]
pub struct StockRequirement {
    /// Position the quantity leaves from
    pub key: StockKey,
    /// Total outbound quantity across the voucher's lines for this position
    pub required: Decimal,
}

/// Shape one voucher line into a signed ledger entry.
///
/// `signed_qty` already carries the voucher type's sign convention. The
/// mode is `Absolute` iff the voucher is `PHYSICAL`; the value defaults to
/// `signed_qty * rate` unless the line supplies one, in which case the
/// supplied magnitude takes the sign of the quantity.
pub fn create_transaction(
    meta: &VoucherMeta,
    line: &MovementLine,
    signed_qty: Decimal,
) -> Transaction {
    let mode = if meta.voucher_type == VoucherType::Physical {
        TxMode::Absolute
    } else {
        TxMode::Delta
    };

    let value = match line.value {
        Some(explicit) if signed_qty < Decimal::ZERO => -explicit.abs(),
        Some(explicit) => explicit.abs(),
        None => signed_qty * line.rate,
    };

    Transaction {
        tx_id: Uuid::now_v7(),
        seq: 0, // stamped by the store at append time
        voucher_type: meta.voucher_type,
        voucher_id: meta.voucher_id,
        tracking_no: meta.tracking_no.clone(),
        item_id: line.item_id.clone(),
        batch_id: line.batch_id.clone(),
        godown_id: line.godown_id.clone(),
        qty: signed_qty,
        rate: line.rate,
        value,
        date: meta.date,
        mode,
        created_at: Utc::now(),
    }
}

/// Load the replay slice for one position: filter the log to the exact
/// triple, optionally truncate to `date <= as_of`, and order by
/// `(date, seq)`.
pub fn ordered_for_key<'a>(
    log: &'a [Transaction],
    key: &StockKey,
    as_of: Option<NaiveDate>,
) -> Vec<&'a Transaction> {
    let mut entries: Vec<&Transaction> = log
        .iter()
        .filter(|tx| tx.matches_key(key))
        .filter(|tx| as_of.map_or(true, |cutoff| tx.date <= cutoff))
        .collect();
    entries.sort_by_key(|tx| (tx.date, tx.seq));
    entries
}

fn stock_from_ordered(ordered: &[&Transaction]) -> Decimal {
    // The latest floor wins; everything before it is superseded.
    let (floor, after_anchor) = match ordered.iter().rposition(|tx| tx.is_floor()) {
        Some(anchor) => (ordered[anchor].qty, anchor + 1),
        None => (Decimal::ZERO, 0),
    };

    floor
        + ordered[after_anchor..]
            .iter()
            .filter(|tx| tx.mode == TxMode::Delta)
            .map(|tx| tx.qty)
            .sum::<Decimal>()
}

/// Reconstruct stock on hand for one position over the full log.
///
/// Unknown identifiers produce an empty replay slice and therefore a stock
/// of zero; no existence validation happens here.
pub fn compute_stock(log: &[Transaction], key: &StockKey) -> Decimal {
    stock_from_ordered(&ordered_for_key(log, key, None))
}

/// Reconstruct stock on hand for one position as of a cutoff date
/// (inclusive).
pub fn compute_stock_as_of(log: &[Transaction], key: &StockKey, as_of: NaiveDate) -> Decimal {
    stock_from_ordered(&ordered_for_key(log, key, Some(as_of)))
}

/// Reconstruct stock for every position present in the log: one row per
/// distinct `(item, godown, batch)` triple, each computed by the identical
/// floor-and-deltas replay.
pub fn compute_stock_for_all_items(log: &[Transaction]) -> Vec<StockRow> {
    let mut groups: HashMap<StockKey, Vec<&Transaction>> = HashMap::new();
    for tx in log {
        groups.entry(tx.stock_key()).or_default().push(tx);
    }

    let mut rows: Vec<StockRow> = groups
        .into_iter()
        .map(|(key, mut entries)| {
            entries.sort_by_key(|tx| (tx.date, tx.seq));
            StockRow {
                qty: stock_from_ordered(&entries),
                key,
            }
        })
        .collect();

    rows.sort_by(|a, b| a.key.cmp(&b.key));
    rows
}
