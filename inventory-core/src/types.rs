//! Core types for the stock ledger
//!
//! All types are designed for:
//! - Stable JSON serialization (the desktop app reads these files directly)
//! - Exact arithmetic (Decimal for quantities, rates, and values)
//! - Replay determinism (ordering is `(date, seq)`, never wall-clock)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Business voucher type.
///
/// The voucher type decides both the sign convention of derived ledger
/// entries and whether an entry is an absolute stocktake or a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherType {
    /// Inward purchase invoice
    Purchase,
    /// Outward sales invoice
    Sales,
    /// Components consumed, finished goods and by-products produced
    Manufacturing,
    /// Godown-to-godown transfer with optional wastage
    StockJournal,
    /// Physical stock count (authoritative floor)
    Physical,
    /// Miscellaneous inward movement
    MaterialIn,
    /// Miscellaneous outward movement
    MaterialOut,
    /// Provisional inward note, finalized later by a Purchase
    ReceiptNote,
    /// Provisional outward note, finalized later by a Sales
    DeliveryNote,
}

impl fmt::Display for VoucherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoucherType::Purchase => "PURCHASE",
            VoucherType::Sales => "SALES",
            VoucherType::Manufacturing => "MANUFACTURING",
            VoucherType::StockJournal => "STOCK_JOURNAL",
            VoucherType::Physical => "PHYSICAL",
            VoucherType::MaterialIn => "MATERIAL_IN",
            VoucherType::MaterialOut => "MATERIAL_OUT",
            VoucherType::ReceiptNote => "RECEIPT_NOTE",
            VoucherType::DeliveryNote => "DELIVERY_NOTE",
        };
        write!(f, "{}", name)
    }
}

/// Transaction mode.
///
/// `Absolute` entries are stocktakes: the quantity is an authoritative
/// floor as of the entry's position in the ordered log. `Delta` entries
/// accumulate on top of the nearest preceding floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxMode {
    /// Stocktake floor (`PHYSICAL` vouchers only)
    Absolute,
    /// Ordinary signed movement
    Delta,
}

/// Identity of a stock position.
///
/// Stock is tracked per `(item, godown, batch)`; a `None` batch matches
/// only entries whose batch is also `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockKey {
    /// Stock item identifier (owned by the item master)
    pub item_id: String,
    /// Storage location identifier (owned by the godown master)
    pub godown_id: String,
    /// Optional lot identifier (owned by the batch master)
    pub batch_id: Option<String>,
}

impl StockKey {
    /// Create a new position key
    pub fn new(
        item_id: impl Into<String>,
        godown_id: impl Into<String>,
        batch_id: Option<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            godown_id: godown_id.into(),
            batch_id,
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.batch_id {
            Some(batch) => write!(f, "{}/{}/{}", self.item_id, self.godown_id, batch),
            None => write!(f, "{}/{}", self.item_id, self.godown_id),
        }
    }
}

/// One immutable entry in the append-only stock ledger.
///
/// Transactions are created once and never mutated or deleted; the log is
/// the single source of truth for stock quantities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub tx_id: Uuid,

    /// Monotonic sequence number, assigned by the store at append time.
    /// Replay order is `(date, seq)`.
    #[serde(default)]
    pub seq: u64,

    /// Type of the voucher this entry was derived from
    pub voucher_type: VoucherType,

    /// Voucher document this entry belongs to
    pub voucher_id: Uuid,

    /// Tracking number, present on provisional-voucher entries
    #[serde(default)]
    pub tracking_no: Option<String>,

    /// Stock item
    pub item_id: String,

    /// Lot, if the item is batch-tracked
    #[serde(default)]
    pub batch_id: Option<String>,

    /// Storage location
    pub godown_id: String,

    /// Signed quantity (inward positive, outward negative; stocktakes
    /// are non-negative)
    pub qty: Decimal,

    /// Cost or price per unit
    pub rate: Decimal,

    /// Line value; defaults to `qty * rate` at creation
    pub value: Decimal,

    /// Business date of the voucher
    pub date: NaiveDate,

    /// `Absolute` iff `voucher_type` is `Physical`
    pub mode: TxMode,

    /// Audit timestamp
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Position this entry moves
    pub fn stock_key(&self) -> StockKey {
        StockKey {
            item_id: self.item_id.clone(),
            godown_id: self.godown_id.clone(),
            batch_id: self.batch_id.clone(),
        }
    }

    /// Whether this entry belongs to the exact `(item, godown, batch)`
    /// triple. A `None` batch matches only `None`.
    pub fn matches_key(&self, key: &StockKey) -> bool {
        self.item_id == key.item_id
            && self.godown_id == key.godown_id
            && self.batch_id == key.batch_id
    }

    /// Whether this entry is a stocktake floor
    pub fn is_floor(&self) -> bool {
        self.voucher_type == VoucherType::Physical && self.mode == TxMode::Absolute
    }
}

/// Ordinary movement line as authored on a voucher.
///
/// Quantities are authored non-negative; the posting layer applies the
/// voucher type's sign convention when deriving ledger entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementLine {
    /// Stock item
    pub item_id: String,
    /// Storage location
    pub godown_id: String,
    /// Lot, if batch-tracked
    #[serde(default)]
    pub batch_id: Option<String>,
    /// Quantity as authored (non-negative)
    pub qty: Decimal,
    /// Rate per unit
    pub rate: Decimal,
    /// Explicit line value; `qty * rate` when absent
    #[serde(default)]
    pub value: Option<Decimal>,
}

impl MovementLine {
    /// Position this line refers to
    pub fn stock_key(&self) -> StockKey {
        StockKey {
            item_id: self.item_id.clone(),
            godown_id: self.godown_id.clone(),
            batch_id: self.batch_id.clone(),
        }
    }
}

/// Role of a stock-journal line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalRole {
    /// Consumed from (outward)
    Source,
    /// Produced into (inward)
    Destination,
    /// Lost in transfer (outward, never sufficiency-checked)
    Wastage,
}

/// Stock-journal line: a movement tagged with its transfer role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalLine {
    /// Transfer role
    pub role: JournalRole,
    /// The movement itself
    #[serde(flatten)]
    pub line: MovementLine,
}

/// Physical stocktake line: the counted quantity for one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountLine {
    /// Stock item
    pub item_id: String,
    /// Storage location
    pub godown_id: String,
    /// Lot, if batch-tracked
    #[serde(default)]
    pub batch_id: Option<String>,
    /// Counted quantity (non-negative)
    pub qty: Decimal,
    /// Valuation rate for the counted stock
    pub rate: Decimal,
}

/// Typed voucher body, one variant per voucher type.
///
/// Each variant carries exactly the fields its voucher type requires;
/// there is no open line-item map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "voucherType",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum VoucherBody {
    /// Inward purchase; with a tracking number it finalizes a Receipt Note
    Purchase {
        /// Receipt Note being finalized, if any
        tracking_no: Option<String>,
        /// Inward lines
        lines: Vec<MovementLine>,
    },
    /// Outward sale; with a tracking number it finalizes a Delivery Note
    Sales {
        /// Delivery Note being finalized, if any
        tracking_no: Option<String>,
        /// Outward lines
        lines: Vec<MovementLine>,
    },
    /// Provisional inward note; stock moves now, Purchase finalizes later
    ReceiptNote {
        /// Tracking number created by this note
        tracking_no: String,
        /// Inward lines
        lines: Vec<MovementLine>,
    },
    /// Provisional outward note; stock moves now, Sales finalizes later
    DeliveryNote {
        /// Tracking number created by this note
        tracking_no: String,
        /// Outward lines
        lines: Vec<MovementLine>,
    },
    /// Miscellaneous inward movement
    MaterialIn {
        /// Inward lines
        lines: Vec<MovementLine>,
    },
    /// Miscellaneous outward movement
    MaterialOut {
        /// Outward lines
        lines: Vec<MovementLine>,
    },
    /// Production: components consumed, goods and by-products produced
    Manufacturing {
        /// Consumed components (outward)
        components: Vec<MovementLine>,
        /// Finished goods (inward)
        outputs: Vec<MovementLine>,
        /// By-products and recovered scrap (inward)
        byproducts: Vec<MovementLine>,
    },
    /// Transfer between positions with optional wastage
    StockJournal {
        /// Role-tagged lines
        lines: Vec<JournalLine>,
    },
    /// Physical stocktake
    Physical {
        /// Counted positions
        lines: Vec<CountLine>,
    },
}

impl VoucherBody {
    /// Voucher type of this body
    pub fn voucher_type(&self) -> VoucherType {
        match self {
            VoucherBody::Purchase { .. } => VoucherType::Purchase,
            VoucherBody::Sales { .. } => VoucherType::Sales,
            VoucherBody::ReceiptNote { .. } => VoucherType::ReceiptNote,
            VoucherBody::DeliveryNote { .. } => VoucherType::DeliveryNote,
            VoucherBody::MaterialIn { .. } => VoucherType::MaterialIn,
            VoucherBody::MaterialOut { .. } => VoucherType::MaterialOut,
            VoucherBody::Manufacturing { .. } => VoucherType::Manufacturing,
            VoucherBody::StockJournal { .. } => VoucherType::StockJournal,
            VoucherBody::Physical { .. } => VoucherType::Physical,
        }
    }
}

/// Business voucher document.
///
/// A voucher carries no stock truth of its own; each qualifying line item
/// produces exactly one ledger [`Transaction`] when posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    /// Unique voucher ID
    pub voucher_id: Uuid,

    /// Human-facing voucher number
    pub voucher_no: String,

    /// Business date
    pub date: NaiveDate,

    /// Party ledger reference (external accounting master)
    #[serde(default)]
    pub party_id: Option<String>,

    /// Free-text narration for the UI
    #[serde(default)]
    pub narration: Option<String>,

    /// Typed body with the line items
    #[serde(flatten)]
    pub body: VoucherBody,

    /// Audit timestamp
    pub created_at: DateTime<Utc>,
}

impl Voucher {
    /// Voucher type of this document
    pub fn voucher_type(&self) -> VoucherType {
        self.body.voucher_type()
    }
}

/// Tracking record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingStatus {
    /// Provisional voucher posted, final voucher pending
    Open,
    /// Final voucher received; stock must not move again
    Closed,
}

/// Link between a provisional voucher and its eventual final voucher.
///
/// Created `Open` when a Receipt/Delivery Note posts; transitions
/// `Open` → `Closed` exactly once, when the matching final voucher
/// references the same tracking number. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingNumber {
    /// Tracking number (unique per company)
    pub tracking_no: String,

    /// Provisional voucher that moved the stock
    pub source_voucher: Uuid,

    /// Final voucher that closed the number, once known
    #[serde(default)]
    pub target_voucher: Option<Uuid>,

    /// Lifecycle status
    pub status: TrackingStatus,

    /// Audit timestamp
    pub created_at: DateTime<Utc>,
}

impl TrackingNumber {
    /// Whether the final voucher is still pending
    pub fn is_open(&self) -> bool {
        self.status == TrackingStatus::Open
    }
}

/// Origin of a FIFO cost layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerSource {
    /// Inward voucher that created the layer
    Voucher(Uuid),
    /// Collapsed remainder of a physical stocktake reset
    Physical,
}

/// Ephemeral FIFO cost layer.
///
/// Layers are rebuilt from scratch on every valuation query by replaying
/// the log; there is no cached or materialized layer state.
#[derive(Debug, Clone, PartialEq)]
pub struct FifoLayer {
    /// Remaining quantity in the layer
    pub qty: Decimal,
    /// Cost per unit
    pub rate: Decimal,
    /// Where the layer came from
    pub source: LayerSource,
}

impl FifoLayer {
    /// Remaining value of the layer
    pub fn value(&self) -> Decimal {
        self.qty * self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voucher_type_wire_names() {
        let json = serde_json::to_string(&VoucherType::ReceiptNote).unwrap();
        assert_eq!(json, "\"RECEIPT_NOTE\"");
        let json = serde_json::to_string(&VoucherType::Physical).unwrap();
        assert_eq!(json, "\"PHYSICAL\"");
    }

    #[test]
    fn test_voucher_body_tagged_by_type() {
        let body = VoucherBody::Purchase {
            tracking_no: None,
            lines: vec![MovementLine {
                item_id: "item-1".to_string(),
                godown_id: "main".to_string(),
                batch_id: None,
                qty: Decimal::from(10),
                rate: Decimal::from(5),
                value: None,
            }],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["voucherType"], "PURCHASE");
        assert_eq!(json["lines"][0]["itemId"], "item-1");

        let back: VoucherBody = serde_json::from_value(json).unwrap();
        assert_eq!(back.voucher_type(), VoucherType::Purchase);
    }

    #[test]
    fn test_transaction_wire_shape() {
        let tx = Transaction {
            tx_id: Uuid::now_v7(),
            seq: 7,
            voucher_type: VoucherType::Sales,
            voucher_id: Uuid::now_v7(),
            tracking_no: None,
            item_id: "item-1".to_string(),
            batch_id: Some("B-01".to_string()),
            godown_id: "main".to_string(),
            qty: Decimal::from(-4),
            rate: Decimal::from(5),
            value: Decimal::from(-20),
            date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            mode: TxMode::Delta,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["voucherType"], "SALES");
        assert_eq!(json["mode"], "DELTA");
        assert_eq!(json["itemId"], "item-1");
        assert_eq!(json["date"], "2025-04-01");

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back.seq, 7);
        assert_eq!(back.qty, tx.qty);
    }

    #[test]
    fn test_matches_key_null_batch() {
        let tx = Transaction {
            tx_id: Uuid::now_v7(),
            seq: 1,
            voucher_type: VoucherType::Purchase,
            voucher_id: Uuid::now_v7(),
            tracking_no: None,
            item_id: "item-1".to_string(),
            batch_id: None,
            godown_id: "main".to_string(),
            qty: Decimal::from(10),
            rate: Decimal::from(5),
            value: Decimal::from(50),
            date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            mode: TxMode::Delta,
            created_at: Utc::now(),
        };

        assert!(tx.matches_key(&StockKey::new("item-1", "main", None)));
        assert!(!tx.matches_key(&StockKey::new("item-1", "main", Some("B-01".to_string()))));
    }

    #[test]
    fn test_tracking_lifecycle_flags() {
        let mut rec = TrackingNumber {
            tracking_no: "DN-1".to_string(),
            source_voucher: Uuid::now_v7(),
            target_voucher: None,
            status: TrackingStatus::Open,
            created_at: Utc::now(),
        };
        assert!(rec.is_open());

        rec.status = TrackingStatus::Closed;
        rec.target_voucher = Some(Uuid::now_v7());
        assert!(!rec.is_open());
    }
}
