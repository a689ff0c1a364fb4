//! `stockwatch-detection`
//!
//! Rule-based anomaly detection over stock ledger entries.
//!
//! Detection is pure: it reads an entry, the item state after the entry and
//! the prior ledger, and proposes candidates. It never mutates domain state;
//! persisting anomaly records is the ledger service's job.

pub mod aggregator;
pub mod config;
pub mod detector;
pub mod error;
pub mod rules;

pub use aggregator::{AnomalyAggregator, GroupedAnomalies};
pub use config::{AuctionWindow, DetectionConfig, SuddenChangeConfig};
pub use detector::{AnomalyCandidate, DetectionContext, Detector, DetectorSet};
pub use error::DetectionError;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;

    use stockwatch_core::{Aggregate, AggregateId, OwnerId};
    use stockwatch_inventory::{
        ChangeType, InventoryCommand, InventoryEvent, InventoryItem, InventoryItemId, LedgerEntry,
        LedgerEntryId, MutationSource, RecordMutation, RegisterItem, UnitOfMeasure,
    };

    use crate::config::DetectionConfig;
    use crate::detector::DetectionContext;

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    pub fn config() -> DetectionConfig {
        DetectionConfig::default()
    }

    pub fn context<'a>(
        entry: &'a LedgerEntry,
        item: &'a InventoryItem,
        history: &'a [LedgerEntry],
        config: &'a DetectionConfig,
    ) -> DetectionContext<'a> {
        DetectionContext {
            entry,
            item,
            history,
            config,
        }
    }

    pub fn item_with_thresholds(
        unit: UnitOfMeasure,
        stock: Decimal,
        safety: Option<Decimal>,
        reorder: Option<Decimal>,
    ) -> InventoryItem {
        let owner_id = OwnerId::new();
        let item_id = InventoryItemId::new(AggregateId::new());
        let mut item = InventoryItem::empty(item_id);
        let events = item
            .handle(&InventoryCommand::RegisterItem(RegisterItem {
                owner_id,
                item_id,
                product_id: "yellowtail".to_string(),
                unit,
                unit_price: None,
                safety_stock_quantity: safety,
                reorder_point: reorder,
                occurred_at: t0(),
            }))
            .unwrap();
        events.iter().for_each(|e| item.apply(e));
        if stock > Decimal::ZERO {
            // Seed an hour back so it stays outside the duplicate window.
            record(&mut item, ChangeType::In, stock, None, t0() - chrono::Duration::hours(1));
        }
        item
    }

    pub fn item_with(unit: UnitOfMeasure, stock: Decimal) -> InventoryItem {
        item_with_thresholds(unit, stock, None, None)
    }

    /// Decide and apply one mutation, returning the written entry.
    pub fn record(
        item: &mut InventoryItem,
        change_type: ChangeType,
        quantity: Decimal,
        unit_price: Option<Decimal>,
        at: DateTime<Utc>,
    ) -> LedgerEntry {
        let cmd = InventoryCommand::RecordMutation(RecordMutation {
            owner_id: item.owner_id().unwrap(),
            item_id: item.id_typed(),
            entry_id: LedgerEntryId::new(),
            change_type,
            quantity,
            source: MutationSource::Manual,
            memo: None,
            unit_price,
            total_amount: None,
            actor: None,
            occurred_at: at,
        });
        let events = item.handle(&cmd).unwrap();
        events.iter().for_each(|e| item.apply(e));
        events
            .into_iter()
            .find_map(|e| match e {
                InventoryEvent::StockMutated(m) => Some(m.entry),
                _ => None,
            })
            .unwrap()
    }

    pub fn mutate_at(
        unit: UnitOfMeasure,
        stock: Decimal,
        change_type: ChangeType,
        quantity: Decimal,
        at: DateTime<Utc>,
    ) -> (InventoryItem, LedgerEntry) {
        let mut item = item_with(unit, stock);
        let entry = record(&mut item, change_type, quantity, None, at);
        (item, entry)
    }

    pub fn mutate(
        unit: UnitOfMeasure,
        stock: Decimal,
        change_type: ChangeType,
        quantity: Decimal,
    ) -> (InventoryItem, LedgerEntry) {
        mutate_at(unit, stock, change_type, quantity, t0())
    }

    pub fn mutate_with_thresholds(
        unit: UnitOfMeasure,
        stock: Decimal,
        safety: Option<Decimal>,
        reorder: Option<Decimal>,
        change_type: ChangeType,
        quantity: Decimal,
    ) -> (InventoryItem, LedgerEntry) {
        let mut item = item_with_thresholds(unit, stock, safety, reorder);
        let entry = record(&mut item, change_type, quantity, None, t0());
        (item, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use rust_decimal_macros::dec;
    use stockwatch_inventory::{AnomalyType, ChangeType, Severity, UnitOfMeasure};

    #[test]
    fn all_detectors_run_in_fixed_order() {
        let cfg = config();
        // 100 kg down to -20 kg at noon: negative, sudden (120%), low stock.
        let (item, entry) = mutate(UnitOfMeasure::Kg, dec!(100), ChangeType::Out, dec!(120));
        let hits = DetectorSet::default().evaluate(&context(&entry, &item, &[], &cfg));
        let types: Vec<_> = hits.iter().map(|c| c.anomaly_type).collect();
        assert_eq!(
            types,
            vec![AnomalyType::NegativeStock, AnomalyType::SuddenChange, AnomalyType::LowStock]
        );

        let grouped = AnomalyAggregator::smart_group(hits).unwrap();
        assert_eq!(grouped.primary.severity, Severity::Critical);
        assert_eq!(grouped.primary.detector_version, "negative-stock@1");
        assert_eq!(grouped.total_count, 3);
    }

    #[test]
    fn subset_is_normalised_to_evaluation_order() {
        let set = DetectorSet::only([Detector::PriceConsistency, Detector::NegativeStock, Detector::NegativeStock]);
        assert_eq!(set.detectors(), &[Detector::NegativeStock, Detector::PriceConsistency]);
    }

    #[test]
    fn versions_are_distinct() {
        let mut versions: Vec<_> = Detector::ALL.iter().map(|d| d.version()).collect();
        versions.sort();
        versions.dedup();
        assert_eq!(versions.len(), Detector::ALL.len());
    }

    #[test]
    fn overridden_config_changes_outcome() {
        let mut cfg = config();
        cfg.small_quantity_cuts.insert(UnitOfMeasure::Kg, dec!(100));
        let (item, entry) = mutate(UnitOfMeasure::Kg, dec!(100), ChangeType::Out, dec!(80));
        let hits = DetectorSet::default().evaluate(&context(&entry, &item, &[], &cfg));
        assert!(hits.iter().all(|c| c.anomaly_type != AnomalyType::SuddenChange));
    }
}
