//! Voucher posting: business documents to signed ledger entries
//!
//! Each voucher-creating operation signs its line quantities per its own
//! semantic: inbound movements positive (Purchase, Receipt Note,
//! Manufacturing outputs and by-products, Material In, Stock Journal
//! DESTINATION), outbound negative (Sales, Delivery Note, Manufacturing
//! components, Material Out, Stock Journal SOURCE and WASTAGE), physical
//! counts non-negative and absolute.
//!
//! The two-stage flow: a provisional voucher (Receipt/Delivery Note)
//! carrying a tracking number posts real entries immediately. The later
//! final voucher (Purchase/Sales) either references the same tracking
//! number, posting zero entries and closing it, or carries none and
//! posts its own entries directly, subject to outbound sufficiency.

use crate::error::{Error, Result};
use crate::stock::{create_transaction, StockRequirement, VoucherMeta};
use crate::types::{
    JournalRole, MovementLine, StockKey, Transaction, Voucher, VoucherBody,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// What the tracking state machine must do for one posting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingAction {
    /// Voucher does not participate in tracking
    None,
    /// Provisional voucher: create an OPEN record
    Create {
        /// Number to create
        tracking_no: String,
    },
    /// Final voucher referencing a provisional one: close the record,
    /// post no entries
    Close {
        /// Number to close
        tracking_no: String,
    },
}

/// Everything a posting needs persisted, derived before any write
#[derive(Debug)]
pub struct PostingPlan {
    /// Ledger entries to append (empty for tracking-closing finals)
    pub transactions: Vec<Transaction>,
    /// Outbound sufficiency checks, aggregated per position
    pub requirements: Vec<StockRequirement>,
    /// Tracking transition to perform
    pub tracking: TrackingAction,
}

/// Derive the posting plan for a voucher. Pure: no IO, no existence
/// validation of item/godown/batch identifiers (callers own that).
pub fn plan(voucher: &Voucher) -> Result<PostingPlan> {
    let mut builder = PlanBuilder::new(VoucherMeta {
        voucher_type: voucher.voucher_type(),
        voucher_id: voucher.voucher_id,
        tracking_no: None,
        date: voucher.date,
    });

    let tracking = match &voucher.body {
        VoucherBody::Purchase { tracking_no: Some(tno), .. }
        | VoucherBody::Sales { tracking_no: Some(tno), .. } => {
            // Stock already moved when the provisional note posted.
            ensure_tracking_no(tno)?;
            TrackingAction::Close {
                tracking_no: tno.clone(),
            }
        }

        VoucherBody::Purchase { tracking_no: None, lines } => {
            builder.inbound(lines)?;
            TrackingAction::None
        }

        VoucherBody::Sales { tracking_no: None, lines } => {
            builder.outbound(lines, true)?;
            TrackingAction::None
        }

        VoucherBody::ReceiptNote { tracking_no, lines } => {
            ensure_tracking_no(tracking_no)?;
            builder.meta.tracking_no = Some(tracking_no.clone());
            builder.inbound(lines)?;
            TrackingAction::Create {
                tracking_no: tracking_no.clone(),
            }
        }

        VoucherBody::DeliveryNote { tracking_no, lines } => {
            ensure_tracking_no(tracking_no)?;
            builder.meta.tracking_no = Some(tracking_no.clone());
            builder.outbound(lines, true)?;
            TrackingAction::Create {
                tracking_no: tracking_no.clone(),
            }
        }

        VoucherBody::MaterialIn { lines } => {
            builder.inbound(lines)?;
            TrackingAction::None
        }

        VoucherBody::MaterialOut { lines } => {
            builder.outbound(lines, true)?;
            TrackingAction::None
        }

        VoucherBody::Manufacturing {
            components,
            outputs,
            byproducts,
        } => {
            builder.outbound(components, true)?;
            builder.inbound(outputs)?;
            builder.inbound(byproducts)?;
            TrackingAction::None
        }

        VoucherBody::StockJournal { lines } => {
            for journal in lines {
                match journal.role {
                    JournalRole::Source => {
                        builder.outbound(std::slice::from_ref(&journal.line), true)?
                    }
                    JournalRole::Wastage => {
                        builder.outbound(std::slice::from_ref(&journal.line), false)?
                    }
                    JournalRole::Destination => {
                        builder.inbound(std::slice::from_ref(&journal.line))?
                    }
                }
            }
            TrackingAction::None
        }

        VoucherBody::Physical { lines } => {
            for count in lines {
                ensure_non_negative(count.qty, &count.item_id)?;
                let line = MovementLine {
                    item_id: count.item_id.clone(),
                    godown_id: count.godown_id.clone(),
                    batch_id: count.batch_id.clone(),
                    qty: count.qty,
                    rate: count.rate,
                    value: None,
                };
                builder
                    .transactions
                    .push(create_transaction(&builder.meta, &line, count.qty));
            }
            TrackingAction::None
        }
    };

    Ok(builder.finish(tracking))
}

struct PlanBuilder {
    meta: VoucherMeta,
    transactions: Vec<Transaction>,
    required: HashMap<StockKey, Decimal>,
}

impl PlanBuilder {
    fn new(meta: VoucherMeta) -> Self {
        Self {
            meta,
            transactions: Vec::new(),
            required: HashMap::new(),
        }
    }

    fn inbound(&mut self, lines: &[MovementLine]) -> Result<()> {
        for line in lines {
            ensure_non_negative(line.qty, &line.item_id)?;
            self.transactions
                .push(create_transaction(&self.meta, line, line.qty));
        }
        Ok(())
    }

    fn outbound(&mut self, lines: &[MovementLine], check: bool) -> Result<()> {
        for line in lines {
            ensure_non_negative(line.qty, &line.item_id)?;
            self.transactions
                .push(create_transaction(&self.meta, line, -line.qty));
            if check {
                *self.required.entry(line.stock_key()).or_insert(Decimal::ZERO) += line.qty;
            }
        }
        Ok(())
    }

    fn finish(self, tracking: TrackingAction) -> PostingPlan {
        let mut requirements: Vec<StockRequirement> = self
            .required
            .into_iter()
            .map(|(key, required)| StockRequirement { key, required })
            .collect();
        requirements.sort_by(|a, b| a.key.cmp(&b.key));

        PostingPlan {
            transactions: self.transactions,
            requirements,
            tracking,
        }
    }
}

fn ensure_non_negative(qty: Decimal, item_id: &str) -> Result<()> {
    if qty < Decimal::ZERO {
        return Err(Error::InvalidVoucher(format!(
            "negative quantity authored for item {}",
            item_id
        )));
    }
    Ok(())
}

fn ensure_tracking_no(tracking_no: &str) -> Result<()> {
    if tracking_no.trim().is_empty() {
        return Err(Error::InvalidVoucher("blank tracking number".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CountLine, JournalLine, TxMode};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
    }

    fn line(item: &str, qty: i64, rate: i64) -> MovementLine {
        MovementLine {
            item_id: item.to_string(),
            godown_id: "main".to_string(),
            batch_id: None,
            qty: Decimal::from(qty),
            rate: Decimal::from(rate),
            value: None,
        }
    }

    fn voucher(body: VoucherBody) -> Voucher {
        Voucher {
            voucher_id: Uuid::now_v7(),
            voucher_no: "V-001".to_string(),
            date: date(),
            party_id: None,
            narration: None,
            body,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_purchase_posts_inbound() {
        let plan = plan(&voucher(VoucherBody::Purchase {
            tracking_no: None,
            lines: vec![line("item-1", 10, 5)],
        }))
        .unwrap();

        assert_eq!(plan.transactions.len(), 1);
        assert_eq!(plan.transactions[0].qty, Decimal::from(10));
        assert_eq!(plan.transactions[0].mode, TxMode::Delta);
        assert!(plan.requirements.is_empty());
        assert_eq!(plan.tracking, TrackingAction::None);
    }

    #[test]
    fn test_sales_posts_outbound_with_requirement() {
        let plan = plan(&voucher(VoucherBody::Sales {
            tracking_no: None,
            lines: vec![line("item-1", 4, 5), line("item-1", 2, 5)],
        }))
        .unwrap();

        assert_eq!(plan.transactions.len(), 2);
        assert!(plan.transactions.iter().all(|tx| tx.qty < Decimal::ZERO));
        // Requirements aggregate per position.
        assert_eq!(plan.requirements.len(), 1);
        assert_eq!(plan.requirements[0].required, Decimal::from(6));
    }

    #[test]
    fn test_final_with_tracking_posts_nothing() {
        let plan = plan(&voucher(VoucherBody::Sales {
            tracking_no: Some("DN-1".to_string()),
            lines: vec![line("item-1", 4, 5)],
        }))
        .unwrap();

        assert!(plan.transactions.is_empty());
        assert!(plan.requirements.is_empty());
        assert_eq!(
            plan.tracking,
            TrackingAction::Close {
                tracking_no: "DN-1".to_string()
            }
        );
    }

    #[test]
    fn test_delivery_note_moves_stock_and_creates_tracking() {
        let plan = plan(&voucher(VoucherBody::DeliveryNote {
            tracking_no: "DN-1".to_string(),
            lines: vec![line("item-1", 4, 5)],
        }))
        .unwrap();

        assert_eq!(plan.transactions.len(), 1);
        assert_eq!(plan.transactions[0].qty, Decimal::from(-4));
        assert_eq!(
            plan.transactions[0].tracking_no.as_deref(),
            Some("DN-1")
        );
        assert_eq!(plan.requirements.len(), 1);
        assert_eq!(
            plan.tracking,
            TrackingAction::Create {
                tracking_no: "DN-1".to_string()
            }
        );
    }

    #[test]
    fn test_manufacturing_groups() {
        let plan = plan(&voucher(VoucherBody::Manufacturing {
            components: vec![line("steel", 4, 10)],
            outputs: vec![line("widget", 2, 30)],
            byproducts: vec![line("scrap", 1, 2)],
        }))
        .unwrap();

        assert_eq!(plan.transactions.len(), 3);
        assert_eq!(plan.transactions[0].qty, Decimal::from(-4));
        assert_eq!(plan.transactions[1].qty, Decimal::from(2));
        assert_eq!(plan.transactions[2].qty, Decimal::from(1));
        // Only components are sufficiency-checked.
        assert_eq!(plan.requirements.len(), 1);
        assert_eq!(plan.requirements[0].key.item_id, "steel");
    }

    #[test]
    fn test_stock_journal_roles() {
        let mut source = line("item-1", 5, 10);
        source.godown_id = "factory".to_string();
        let mut destination = line("item-1", 4, 10);
        destination.godown_id = "shop".to_string();
        let mut wastage = line("item-1", 1, 10);
        wastage.godown_id = "factory".to_string();

        let plan = plan(&voucher(VoucherBody::StockJournal {
            lines: vec![
                JournalLine {
                    role: JournalRole::Source,
                    line: source,
                },
                JournalLine {
                    role: JournalRole::Destination,
                    line: destination,
                },
                JournalLine {
                    role: JournalRole::Wastage,
                    line: wastage,
                },
            ],
        }))
        .unwrap();

        let signs: Vec<bool> = plan
            .transactions
            .iter()
            .map(|tx| tx.qty > Decimal::ZERO)
            .collect();
        assert_eq!(signs, vec![false, true, false]);

        // Pre-check covers SOURCE lines only, not wastage.
        assert_eq!(plan.requirements.len(), 1);
        assert_eq!(plan.requirements[0].key.godown_id, "factory");
        assert_eq!(plan.requirements[0].required, Decimal::from(5));
    }

    #[test]
    fn test_physical_count_is_absolute() {
        let plan = plan(&voucher(VoucherBody::Physical {
            lines: vec![CountLine {
                item_id: "item-1".to_string(),
                godown_id: "main".to_string(),
                batch_id: None,
                qty: Decimal::from(3),
                rate: Decimal::from(12),
            }],
        }))
        .unwrap();

        assert_eq!(plan.transactions[0].mode, TxMode::Absolute);
        assert_eq!(plan.transactions[0].qty, Decimal::from(3));
        assert!(plan.requirements.is_empty());
    }

    #[test]
    fn test_negative_authored_qty_rejected() {
        let result = plan(&voucher(VoucherBody::Purchase {
            tracking_no: None,
            lines: vec![line("item-1", -10, 5)],
        }));
        assert!(matches!(result, Err(Error::InvalidVoucher(_))));

        let result = plan(&voucher(VoucherBody::Physical {
            lines: vec![CountLine {
                item_id: "item-1".to_string(),
                godown_id: "main".to_string(),
                batch_id: None,
                qty: Decimal::from(-3),
                rate: Decimal::from(12),
            }],
        }));
        assert!(matches!(result, Err(Error::InvalidVoucher(_))));
    }

    #[test]
    fn test_blank_tracking_number_rejected() {
        let result = plan(&voucher(VoucherBody::ReceiptNote {
            tracking_no: "  ".to_string(),
            lines: vec![line("item-1", 10, 5)],
        }));
        assert!(matches!(result, Err(Error::InvalidVoucher(_))));
    }
}
