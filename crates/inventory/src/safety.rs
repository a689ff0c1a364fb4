//! Low-stock threshold policy.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::item::InventoryItem;
use crate::unit::UnitOfMeasure;

/// Which rule produced a threshold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSource {
    /// Explicit `safety_stock_quantity` on the item.
    SafetyStock,
    /// Explicit `reorder_point` on the item.
    ReorderPoint,
    /// Per-unit default from the table.
    UnitDefault,
    /// `stock_quantity * ratio` exceeded the unit default.
    Proportional,
    /// Unit missing from the table; the global fallback applied.
    Fallback,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyThreshold {
    pub value: Decimal,
    pub source: ThresholdSource,
}

/// Computes the quantity at or below which an item counts as under-stocked.
///
/// First match wins: explicit safety stock, explicit reorder point, then
/// `max(unit default, stock * ratio)` so high-volume items keep a
/// proportionally larger margin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyStockPolicy {
    /// Entries given in a config document are laid over the built-in table.
    #[serde(deserialize_with = "merge_unit_defaults")]
    pub unit_defaults: BTreeMap<UnitOfMeasure, Decimal>,
    pub fallback: Decimal,
    pub ratio: Decimal,
}

fn builtin_unit_defaults() -> BTreeMap<UnitOfMeasure, Decimal> {
    [
        (UnitOfMeasure::Box, 20),
        (UnitOfMeasure::Kg, 50),
        (UnitOfMeasure::Piece, 10),
        (UnitOfMeasure::Bag, 5),
        (UnitOfMeasure::Item, 20),
        (UnitOfMeasure::Bucket, 5),
        (UnitOfMeasure::Pack, 10),
    ]
    .into_iter()
    .map(|(unit, qty)| (unit, Decimal::from(qty)))
    .collect()
}

fn merge_unit_defaults<'de, D>(deserializer: D) -> Result<BTreeMap<UnitOfMeasure, Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<UnitOfMeasure, Decimal>::deserialize(deserializer)?;
    let mut table = builtin_unit_defaults();
    table.extend(overrides);
    Ok(table)
}

impl Default for SafetyStockPolicy {
    fn default() -> Self {
        Self {
            unit_defaults: builtin_unit_defaults(),
            fallback: Decimal::from(20),
            ratio: Decimal::new(15, 2),
        }
    }
}

impl SafetyStockPolicy {
    pub fn compute_threshold(&self, item: &InventoryItem) -> SafetyThreshold {
        if let Some(value) = item.safety_stock_quantity() {
            return SafetyThreshold {
                value,
                source: ThresholdSource::SafetyStock,
            };
        }
        if let Some(value) = item.reorder_point() {
            return SafetyThreshold {
                value,
                source: ThresholdSource::ReorderPoint,
            };
        }

        let (base, base_source) = match self.unit_defaults.get(item.unit()) {
            Some(v) => (*v, ThresholdSource::UnitDefault),
            None => (self.fallback, ThresholdSource::Fallback),
        };
        // An overflowing product (absurd ratio) keeps the base value.
        match item.stock_quantity().checked_mul(self.ratio) {
            Some(proportional) if proportional > base => SafetyThreshold {
                value: proportional,
                source: ThresholdSource::Proportional,
            },
            _ => SafetyThreshold {
                value: base,
                source: base_source,
            },
        }
    }
}
