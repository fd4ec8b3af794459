//! Main ledger orchestration layer
//!
//! Ties the store, posting planner, stock reconstruction, and valuation
//! engines into a high-level API consumed by the desktop app's thin HTTP
//! controllers.
//!
//! # Example
//!
//! ```no_run
//! use inventory_core::{Config, InventoryLedger};
//!
//! #[tokio::main]
//! async fn main() -> inventory_core::Result<()> {
//!     let config = Config::default();
//!     let ledger = InventoryLedger::open(config)?;
//!
//!     // Post a voucher
//!     // let receipt = ledger.post_voucher("acme", voucher).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::config::Config;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::posting::{self, TrackingAction};
use crate::profit::{self, ProfitStatement};
use crate::stock::{self, StockRow};
use crate::store::LedgerStore;
use crate::types::{StockKey, TrackingNumber, Transaction, Voucher};
use crate::valuation::{self, ItemRates, ValuationSnapshot};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Outcome of one voucher posting
#[derive(Debug, Clone)]
pub struct PostingReceipt {
    /// Voucher that was persisted
    pub voucher_id: Uuid,
    /// Ledger entries appended, with sequence numbers stamped
    pub transactions: Vec<Transaction>,
    /// Whether this posting closed a tracking number
    pub tracking_closed: bool,
}

/// Main ledger interface
#[derive(Debug)]
pub struct InventoryLedger {
    /// Store with the serialized write paths
    store: Arc<LedgerStore>,

    /// Metrics collector (if enabled)
    metrics: Option<Metrics>,

    /// Configuration
    config: Config,
}

impl InventoryLedger {
    /// Open the ledger with configuration
    pub fn open(config: Config) -> Result<Self> {
        let store = Arc::new(LedgerStore::open(&config)?);

        Ok(Self {
            store,
            metrics: None,
            config,
        })
    }

    /// Enable metrics collection
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Configuration the ledger was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Post a business voucher: derive its ledger entries, run the
    /// tracking transition, verify outbound sufficiency, and persist the
    /// voucher document together with the appended entries.
    ///
    /// Any rejection (validation or stock shortfall) persists nothing.
    pub async fn post_voucher(&self, company: &str, voucher: Voucher) -> Result<PostingReceipt> {
        let plan = match posting::plan(&voucher) {
            Ok(plan) => plan,
            Err(e) => {
                self.note_rejection();
                return Err(e);
            }
        };

        // Fail fast on a duplicate number before anything is appended; the
        // store re-checks under its own lock.
        if let TrackingAction::Create { tracking_no } = &plan.tracking {
            if self.store.get_tracking(company, tracking_no)?.is_some() {
                self.note_rejection();
                return Err(Error::DuplicateTracking(tracking_no.clone()));
            }
        }

        let appended = match self
            .store
            .append_checked(company, plan.transactions, &plan.requirements)
            .await
        {
            Ok(txs) => txs,
            Err(e) => {
                self.note_rejection();
                return Err(e);
            }
        };

        let mut tracking_closed = false;
        match &plan.tracking {
            TrackingAction::Create { tracking_no } => {
                self.store
                    .create_tracking(company, tracking_no, voucher.voucher_id)
                    .await?;
            }
            TrackingAction::Close { tracking_no } => {
                tracking_closed = self
                    .store
                    .close_tracking(company, tracking_no, voucher.voucher_id)
                    .await?;
                if tracking_closed {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_tracking_closed();
                    }
                }
            }
            TrackingAction::None => {}
        }

        self.store.save_voucher(company, &voucher).await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_posting(appended.len());
        }

        tracing::info!(
            company,
            voucher_type = %voucher.voucher_type(),
            voucher_no = %voucher.voucher_no,
            appended = appended.len(),
            tracking_closed,
            "Voucher posted"
        );

        Ok(PostingReceipt {
            voucher_id: voucher.voucher_id,
            transactions: appended,
            tracking_closed,
        })
    }

    /// Persist a voucher document together with caller-derived ledger
    /// entries, skipping plan derivation and sufficiency checks. The
    /// entries are appended first; sequence numbers are stamped.
    pub async fn save_voucher_with_transactions(
        &self,
        company: &str,
        voucher: &Voucher,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<Transaction>> {
        let appended = self.store.append(company, transactions).await?;
        self.store.save_voucher(company, voucher).await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_posting(appended.len());
        }

        Ok(appended)
    }

    // Stock reads (lock-free)

    /// Read a company's full transaction log
    pub fn transactions(&self, company: &str) -> Result<Vec<Transaction>> {
        self.store.read_log(company)
    }

    /// Reconstruct stock on hand for one position
    pub fn compute_stock(&self, company: &str, key: &StockKey) -> Result<Decimal> {
        let log = self.store.read_log(company)?;
        Ok(stock::compute_stock(&log, key))
    }

    /// Reconstruct stock on hand for one position as of a date (inclusive)
    pub fn compute_stock_as_of(
        &self,
        company: &str,
        key: &StockKey,
        as_of: NaiveDate,
    ) -> Result<Decimal> {
        let log = self.store.read_log(company)?;
        Ok(stock::compute_stock_as_of(&log, key, as_of))
    }

    /// Reconstruct stock for every position present in the log
    pub fn compute_stock_for_all_items(&self, company: &str) -> Result<Vec<StockRow>> {
        let log = self.store.read_log(company)?;
        Ok(stock::compute_stock_for_all_items(&log))
    }

    /// Value one position under every method simultaneously
    pub fn valuation_snapshot(
        &self,
        company: &str,
        key: &StockKey,
        as_of: Option<NaiveDate>,
        rates: &ItemRates,
    ) -> Result<ValuationSnapshot> {
        let started = Instant::now();
        let log = self.store.read_log(company)?;
        let snapshot = valuation::snapshot(&log, key, as_of, rates);

        if let Some(metrics) = &self.metrics {
            metrics.record_valuation_duration(started.elapsed().as_secs_f64());
        }

        Ok(snapshot)
    }

    /// Realized COGS and profit per sale line over the full history
    pub fn profit_statement(&self, company: &str) -> Result<ProfitStatement> {
        let started = Instant::now();
        let log = self.store.read_log(company)?;
        let statement = profit::profit_statement(&log);

        if let Some(metrics) = &self.metrics {
            metrics.record_valuation_duration(started.elapsed().as_secs_f64());
        }

        Ok(statement)
    }

    // Documents and tracking

    /// Get a voucher document by id
    pub fn get_voucher(&self, company: &str, voucher_id: Uuid) -> Result<Voucher> {
        self.store.get_voucher(company, voucher_id)
    }

    /// List all voucher documents for a company
    pub fn list_vouchers(&self, company: &str) -> Result<Vec<Voucher>> {
        self.store.list_vouchers(company)
    }

    /// Create an OPEN tracking record outside a posting
    pub async fn create_tracking(
        &self,
        company: &str,
        tracking_no: &str,
        source_voucher: Uuid,
    ) -> Result<TrackingNumber> {
        self.store
            .create_tracking(company, tracking_no, source_voucher)
            .await
    }

    /// Close a tracking record outside a posting; missing or already
    /// closed is a no-op
    pub async fn close_tracking(
        &self,
        company: &str,
        tracking_no: &str,
        target_voucher: Uuid,
    ) -> Result<bool> {
        self.store
            .close_tracking(company, tracking_no, target_voucher)
            .await
    }

    /// Get a tracking record by number
    pub fn get_tracking(&self, company: &str, tracking_no: &str) -> Result<Option<TrackingNumber>> {
        self.store.get_tracking(company, tracking_no)
    }

    /// List all tracking records for a company
    pub fn list_tracking(&self, company: &str) -> Result<Vec<TrackingNumber>> {
        self.store.list_tracking(company)
    }

    fn note_rejection(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_rejection();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CountLine, MovementLine, VoucherBody};
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_ledger() -> (InventoryLedger, TempDir) {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();
        (InventoryLedger::open(config).unwrap(), temp)
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn line(qty: i64, rate: i64) -> MovementLine {
        MovementLine {
            item_id: "item-1".to_string(),
            godown_id: "main".to_string(),
            batch_id: None,
            qty: Decimal::from(qty),
            rate: Decimal::from(rate),
            value: None,
        }
    }

    fn voucher(no: &str, day: u32, body: VoucherBody) -> Voucher {
        Voucher {
            voucher_id: Uuid::now_v7(),
            voucher_no: no.to_string(),
            date: date(day),
            party_id: None,
            narration: None,
            body,
            created_at: Utc::now(),
        }
    }

    fn key() -> StockKey {
        StockKey::new("item-1", "main", None)
    }

    #[tokio::test]
    async fn test_purchase_then_sale() {
        let (ledger, _temp) = test_ledger();

        ledger
            .post_voucher(
                "acme",
                voucher(
                    "PUR-001",
                    1,
                    VoucherBody::Purchase {
                        tracking_no: None,
                        lines: vec![line(10, 5)],
                    },
                ),
            )
            .await
            .unwrap();

        let receipt = ledger
            .post_voucher(
                "acme",
                voucher(
                    "SAL-001",
                    2,
                    VoucherBody::Sales {
                        tracking_no: None,
                        lines: vec![line(4, 9)],
                    },
                ),
            )
            .await
            .unwrap();

        assert_eq!(receipt.transactions.len(), 1);
        assert_eq!(ledger.compute_stock("acme", &key()).unwrap(), Decimal::from(6));
        assert_eq!(ledger.list_vouchers("acme").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_posting_persists_nothing() {
        let (ledger, _temp) = test_ledger();

        let result = ledger
            .post_voucher(
                "acme",
                voucher(
                    "SAL-001",
                    1,
                    VoucherBody::Sales {
                        tracking_no: None,
                        lines: vec![line(4, 9)],
                    },
                ),
            )
            .await;

        assert!(matches!(result, Err(Error::InsufficientStock { .. })));
        assert!(ledger.transactions("acme").unwrap().is_empty());
        assert!(ledger.list_vouchers("acme").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manufacturing_shortfall_rejects_whole_voucher() {
        let (ledger, _temp) = test_ledger();

        let mut steel = line(2, 10);
        steel.item_id = "steel".to_string();
        ledger
            .post_voucher(
                "acme",
                voucher(
                    "PUR-001",
                    1,
                    VoucherBody::Purchase {
                        tracking_no: None,
                        lines: vec![steel],
                    },
                ),
            )
            .await
            .unwrap();

        let mut components = line(4, 10);
        components.item_id = "steel".to_string();
        let mut outputs = line(1, 50);
        outputs.item_id = "widget".to_string();

        let result = ledger
            .post_voucher(
                "acme",
                voucher(
                    "MFG-001",
                    2,
                    VoucherBody::Manufacturing {
                        components: vec![components],
                        outputs: vec![outputs],
                        byproducts: vec![],
                    },
                ),
            )
            .await;

        assert!(matches!(result, Err(Error::InsufficientStock { .. })));
        // No partial commit: neither outputs nor components moved.
        assert_eq!(ledger.transactions("acme").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tracking_lifecycle() {
        let (ledger, _temp) = test_ledger();

        ledger
            .post_voucher(
                "acme",
                voucher(
                    "PUR-001",
                    1,
                    VoucherBody::Purchase {
                        tracking_no: None,
                        lines: vec![line(10, 5)],
                    },
                ),
            )
            .await
            .unwrap();

        let note = ledger
            .post_voucher(
                "acme",
                voucher(
                    "DN-001",
                    2,
                    VoucherBody::DeliveryNote {
                        tracking_no: "DN-1".to_string(),
                        lines: vec![line(4, 9)],
                    },
                ),
            )
            .await
            .unwrap();
        assert_eq!(note.transactions.len(), 1);
        assert_eq!(ledger.compute_stock("acme", &key()).unwrap(), Decimal::from(6));

        let sales = ledger
            .post_voucher(
                "acme",
                voucher(
                    "SAL-001",
                    3,
                    VoucherBody::Sales {
                        tracking_no: Some("DN-1".to_string()),
                        lines: vec![line(4, 9)],
                    },
                ),
            )
            .await
            .unwrap();

        // Stock already moved with the note; the final posts nothing.
        assert!(sales.transactions.is_empty());
        assert!(sales.tracking_closed);
        assert_eq!(ledger.compute_stock("acme", &key()).unwrap(), Decimal::from(6));

        let record = ledger.get_tracking("acme", "DN-1").unwrap().unwrap();
        assert!(!record.is_open());
        assert_eq!(record.target_voucher, Some(sales.voucher_id));
    }

    #[tokio::test]
    async fn test_duplicate_delivery_note_rejected() {
        let (ledger, _temp) = test_ledger();

        ledger
            .post_voucher(
                "acme",
                voucher(
                    "PUR-001",
                    1,
                    VoucherBody::Purchase {
                        tracking_no: None,
                        lines: vec![line(10, 5)],
                    },
                ),
            )
            .await
            .unwrap();

        for no in ["DN-001", "DN-002"] {
            let result = ledger
                .post_voucher(
                    "acme",
                    voucher(
                        no,
                        2,
                        VoucherBody::DeliveryNote {
                            tracking_no: "DN-1".to_string(),
                            lines: vec![line(2, 9)],
                        },
                    ),
                )
                .await;
            if no == "DN-001" {
                result.unwrap();
            } else {
                assert!(matches!(result, Err(Error::DuplicateTracking(_))));
            }
        }

        // The rejected second note moved no stock.
        assert_eq!(ledger.compute_stock("acme", &key()).unwrap(), Decimal::from(8));
    }

    #[tokio::test]
    async fn test_physical_count_resets_stock() {
        let (ledger, _temp) = test_ledger();

        ledger
            .post_voucher(
                "acme",
                voucher(
                    "PUR-001",
                    1,
                    VoucherBody::Purchase {
                        tracking_no: None,
                        lines: vec![line(10, 5)],
                    },
                ),
            )
            .await
            .unwrap();

        ledger
            .post_voucher(
                "acme",
                voucher(
                    "PHY-001",
                    2,
                    VoucherBody::Physical {
                        lines: vec![CountLine {
                            item_id: "item-1".to_string(),
                            godown_id: "main".to_string(),
                            batch_id: None,
                            qty: Decimal::from(3),
                            rate: Decimal::from(5),
                        }],
                    },
                ),
            )
            .await
            .unwrap();

        assert_eq!(ledger.compute_stock("acme", &key()).unwrap(), Decimal::from(3));
        // Before the count the purchase quantity still stands.
        assert_eq!(
            ledger.compute_stock_as_of("acme", &key(), date(1)).unwrap(),
            Decimal::from(10)
        );
    }

    #[tokio::test]
    async fn test_snapshot_and_profit_from_posted_history() {
        let (ledger, _temp) = test_ledger();

        ledger
            .post_voucher(
                "acme",
                voucher(
                    "PUR-001",
                    1,
                    VoucherBody::Purchase {
                        tracking_no: None,
                        lines: vec![line(10, 5)],
                    },
                ),
            )
            .await
            .unwrap();
        ledger
            .post_voucher(
                "acme",
                voucher(
                    "SAL-001",
                    2,
                    VoucherBody::Sales {
                        tracking_no: None,
                        lines: vec![line(4, 9)],
                    },
                ),
            )
            .await
            .unwrap();

        let snap = ledger
            .valuation_snapshot("acme", &key(), None, &ItemRates::default())
            .unwrap();
        assert_eq!(snap.qty, Decimal::from(6));
        assert_eq!(snap.fifo_value, Decimal::from(30));

        let statement = ledger.profit_statement("acme").unwrap();
        assert_eq!(statement.total_revenue, Decimal::from(36));
        assert_eq!(statement.total_cogs, Decimal::from(20));
        assert_eq!(statement.total_profit, Decimal::from(16));
    }

    #[tokio::test]
    async fn test_metrics_track_postings() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();
        let metrics = Metrics::new().unwrap();
        let ledger = InventoryLedger::open(config).unwrap().with_metrics(metrics.clone());

        ledger
            .post_voucher(
                "acme",
                voucher(
                    "PUR-001",
                    1,
                    VoucherBody::Purchase {
                        tracking_no: None,
                        lines: vec![line(10, 5)],
                    },
                ),
            )
            .await
            .unwrap();

        let result = ledger
            .post_voucher(
                "acme",
                voucher(
                    "SAL-001",
                    2,
                    VoucherBody::Sales {
                        tracking_no: None,
                        lines: vec![line(40, 9)],
                    },
                ),
            )
            .await;
        assert!(result.is_err());

        assert_eq!(metrics.postings_total.get(), 1);
        assert_eq!(metrics.transactions_total.get(), 1);
        assert_eq!(metrics.postings_rejected_total.get(), 1);
    }
}
