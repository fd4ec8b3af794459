//! JSON-backed ledger store
//!
//! # Layout
//!
//! One subdirectory per company under the configured data dir:
//!
//! - `transactions.log` - append-only JSON-lines transaction log
//! - `vouchers.json`    - voucher documents (full rewrite, atomic replace)
//! - `tracking.json`    - tracking number records (same discipline)
//!
//! Mutations for one `(company, collection)` key are serialized through
//! [`WriteQueues`]; reads take no lock and may observe a concurrent
//! rewrite's result (last-write-wins, not snapshot-isolated). The
//! voucher-document write and the transaction-log append are two
//! separately-locked operations: a crash between them can leave one
//! without the other. Acceptable for a single-user desktop process.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::{Collection, WriteQueues};
use crate::stock::{self, StockRequirement};
use crate::types::{TrackingNumber, TrackingStatus, Transaction, Voucher};
use chrono::Utc;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const LOG_FILE: &str = "transactions.log";
const VOUCHERS_FILE: &str = "vouchers.json";
const TRACKING_FILE: &str = "tracking.json";

/// Per-company file store with serialized write paths.
#[derive(Debug)]
pub struct LedgerStore {
    root: PathBuf,
    pretty_documents: bool,
    fsync_appends: bool,
    queues: WriteQueues,
    /// Next sequence number per company, recovered lazily from the log.
    /// Only touched while holding the company's transactions slot.
    next_seq: DashMap<String, u64>,
}

impl LedgerStore {
    /// Open the store rooted at the configured data directory
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        tracing::info!(data_dir = %config.data_dir.display(), "Opened ledger store");

        Ok(Self {
            root: config.data_dir.clone(),
            pretty_documents: config.persistence.pretty_documents,
            fsync_appends: config.persistence.fsync_appends,
            queues: WriteQueues::new(),
            next_seq: DashMap::new(),
        })
    }

    fn company_dir(&self, company: &str) -> PathBuf {
        self.root.join(company)
    }

    fn log_path(&self, company: &str) -> PathBuf {
        self.company_dir(company).join(LOG_FILE)
    }

    fn vouchers_path(&self, company: &str) -> PathBuf {
        self.company_dir(company).join(VOUCHERS_FILE)
    }

    fn tracking_path(&self, company: &str) -> PathBuf {
        self.company_dir(company).join(TRACKING_FILE)
    }

    // Transaction log

    /// Read a company's full transaction log. Lock-free.
    ///
    /// A torn final line (an append interrupted mid-write) is dropped with
    /// a warning; a malformed line anywhere earlier is an error.
    pub fn read_log(&self, company: &str) -> Result<Vec<Transaction>> {
        let path = self.log_path(company);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();

        let mut log = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            match serde_json::from_str::<Transaction>(line) {
                Ok(tx) => log.push(tx),
                Err(e) if i + 1 == lines.len() => {
                    tracing::warn!(
                        company,
                        error = %e,
                        "Dropping torn tail line from transaction log"
                    );
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(log)
    }

    /// Append transactions to a company's log, stamping sequence numbers.
    /// Serialized per `(company, transactions)`.
    pub async fn append(&self, company: &str, txs: Vec<Transaction>) -> Result<Vec<Transaction>> {
        if txs.is_empty() {
            return Ok(txs);
        }
        let _slot = self.queues.acquire(company, Collection::Transactions).await;
        self.write_entries(company, txs, None)
    }

    /// Verify stock requirements against the current log and append in the
    /// same critical section, so check-and-post cannot interleave with
    /// another posting to the same company. A shortfall appends nothing.
    pub async fn append_checked(
        &self,
        company: &str,
        txs: Vec<Transaction>,
        requirements: &[StockRequirement],
    ) -> Result<Vec<Transaction>> {
        let _slot = self.queues.acquire(company, Collection::Transactions).await;

        let log = self.read_log(company)?;
        for req in requirements {
            let available = stock::compute_stock(&log, &req.key);
            if available < req.required {
                return Err(Error::InsufficientStock {
                    item_id: req.key.item_id.clone(),
                    godown_id: req.key.godown_id.clone(),
                    batch_id: req.key.batch_id.clone(),
                    requested: req.required,
                    available,
                });
            }
        }

        if txs.is_empty() {
            return Ok(txs);
        }
        self.write_entries(company, txs, Some(&log))
    }

    /// Stamp sequence numbers and append. Caller holds the transactions
    /// slot for this company.
    fn write_entries(
        &self,
        company: &str,
        mut txs: Vec<Transaction>,
        known_log: Option<&[Transaction]>,
    ) -> Result<Vec<Transaction>> {
        let mut next = match self.next_seq.get(company) {
            Some(entry) => *entry.value(),
            None => {
                let highest = match known_log {
                    Some(log) => log.iter().map(|tx| tx.seq).max(),
                    None => self.read_log(company)?.iter().map(|tx| tx.seq).max(),
                };
                highest.map_or(1, |seq| seq + 1)
            }
        };

        for tx in &mut txs {
            tx.seq = next;
            next += 1;
        }

        let mut payload = String::with_capacity(txs.len() * 256);
        for tx in &txs {
            payload.push_str(&serde_json::to_string(tx)?);
            payload.push('\n');
        }

        fs::create_dir_all(self.company_dir(company))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(company))?;
        file.write_all(payload.as_bytes())?;
        if self.fsync_appends {
            file.sync_all()?;
        }

        self.next_seq.insert(company.to_string(), next);

        tracing::debug!(company, count = txs.len(), "Transactions appended");

        Ok(txs)
    }

    // Voucher documents

    /// Insert or replace a voucher document. Serialized per
    /// `(company, vouchers)`.
    pub async fn save_voucher(&self, company: &str, voucher: &Voucher) -> Result<()> {
        let _slot = self.queues.acquire(company, Collection::Vouchers).await;

        let path = self.vouchers_path(company);
        let mut all: Vec<Voucher> = self.read_documents(&path)?;
        match all.iter_mut().find(|v| v.voucher_id == voucher.voucher_id) {
            Some(slot) => *slot = voucher.clone(),
            None => all.push(voucher.clone()),
        }
        self.replace_documents(&path, &all)
    }

    /// Get a voucher document by id
    pub fn get_voucher(&self, company: &str, voucher_id: Uuid) -> Result<Voucher> {
        let all: Vec<Voucher> = self.read_documents(&self.vouchers_path(company))?;
        all.into_iter()
            .find(|v| v.voucher_id == voucher_id)
            .ok_or_else(|| Error::VoucherNotFound(voucher_id.to_string()))
    }

    /// List all voucher documents for a company
    pub fn list_vouchers(&self, company: &str) -> Result<Vec<Voucher>> {
        self.read_documents(&self.vouchers_path(company))
    }

    // Tracking numbers

    /// Create an `OPEN` tracking record for a provisional voucher.
    /// Duplicate tracking numbers are rejected.
    pub async fn create_tracking(
        &self,
        company: &str,
        tracking_no: &str,
        source_voucher: Uuid,
    ) -> Result<TrackingNumber> {
        let _slot = self.queues.acquire(company, Collection::Tracking).await;

        let path = self.tracking_path(company);
        let mut all: Vec<TrackingNumber> = self.read_documents(&path)?;
        if all.iter().any(|t| t.tracking_no == tracking_no) {
            return Err(Error::DuplicateTracking(tracking_no.to_string()));
        }

        let record = TrackingNumber {
            tracking_no: tracking_no.to_string(),
            source_voucher,
            target_voucher: None,
            status: TrackingStatus::Open,
            created_at: Utc::now(),
        };
        all.push(record.clone());
        self.replace_documents(&path, &all)?;

        tracing::info!(company, tracking_no, "Tracking number created");

        Ok(record)
    }

    /// Close a tracking record, stamping the final voucher. Returns whether
    /// a close happened: a missing or already-closed number is a no-op and
    /// callers must check existence themselves before relying on it.
    pub async fn close_tracking(
        &self,
        company: &str,
        tracking_no: &str,
        target_voucher: Uuid,
    ) -> Result<bool> {
        let _slot = self.queues.acquire(company, Collection::Tracking).await;

        let path = self.tracking_path(company);
        let mut all: Vec<TrackingNumber> = self.read_documents(&path)?;

        match all
            .iter_mut()
            .find(|t| t.tracking_no == tracking_no && t.is_open())
        {
            Some(record) => {
                record.status = TrackingStatus::Closed;
                record.target_voucher = Some(target_voucher);
                self.replace_documents(&path, &all)?;
                tracing::info!(company, tracking_no, "Tracking number closed");
                Ok(true)
            }
            None => {
                tracing::warn!(
                    company,
                    tracking_no,
                    "Tracking close was a no-op (missing or already closed)"
                );
                Ok(false)
            }
        }
    }

    /// Get a tracking record by number
    pub fn get_tracking(&self, company: &str, tracking_no: &str) -> Result<Option<TrackingNumber>> {
        let all: Vec<TrackingNumber> = self.read_documents(&self.tracking_path(company))?;
        Ok(all.into_iter().find(|t| t.tracking_no == tracking_no))
    }

    /// List all tracking records for a company
    pub fn list_tracking(&self, company: &str) -> Result<Vec<TrackingNumber>> {
        self.read_documents(&self.tracking_path(company))
    }

    // Document helpers

    fn read_documents<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// Full rewrite via temp file + rename, so a crash mid-write leaves
    /// the previous file intact.
    fn replace_documents<T: Serialize>(&self, path: &Path, items: &[T]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = if self.pretty_documents {
            serde_json::to_string_pretty(items)?
        } else {
            serde_json::to_string(items)?
        };
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
