//! Detection tuning, injected rather than hard-coded so tests and
//! deployments can override every threshold.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use stockwatch_inventory::{SafetyStockPolicy, UnitOfMeasure};

use crate::error::DetectionError;

const MAX_DUPLICATE_WINDOW_SECS: i64 = 7 * 24 * 60 * 60;

/// Rate thresholds for the sudden-change rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuddenChangeConfig {
    /// `rate >= high_rate` is HIGH (MEDIUM inside the auction window).
    pub high_rate: Decimal,
    /// `medium_rate <= rate < high_rate` is MEDIUM.
    pub medium_rate: Decimal,
}

impl Default for SuddenChangeConfig {
    fn default() -> Self {
        Self {
            high_rate: Decimal::new(8, 1),
            medium_rate: Decimal::new(5, 1),
        }
    }
}

/// Daily hours during which large swings are expected (market auctions).
///
/// Half-open `[start_hour, end_hour)` in local time at `utc_offset_minutes`.
/// `start_hour > end_hour` wraps past midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionWindow {
    pub enabled: bool,
    pub start_hour: u32,
    pub end_hour: u32,
    pub utc_offset_minutes: i32,
}

impl Default for AuctionWindow {
    fn default() -> Self {
        Self {
            enabled: true,
            start_hour: 3,
            end_hour: 9,
            utc_offset_minutes: 0,
        }
    }
}

impl AuctionWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if !self.enabled || self.start_hour == self.end_hour {
            return false;
        }
        let hour = match FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)) {
            Some(offset) => at.with_timezone(&offset).hour(),
            None => {
                warn!(
                    utc_offset_minutes = self.utc_offset_minutes,
                    "auction window offset out of range; using UTC"
                );
                at.hour()
            }
        };

        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// All knobs the detector set reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Moves smaller than this (per unit) never count as sudden. Entries in a
    /// config document are laid over the built-in table.
    #[serde(deserialize_with = "merge_small_quantity_cuts")]
    pub small_quantity_cuts: BTreeMap<UnitOfMeasure, Decimal>,
    pub default_small_quantity_cut: Decimal,
    pub safety_stock: SafetyStockPolicy,
    pub sudden_change: SuddenChangeConfig,
    pub auction_window: AuctionWindow,
    /// Look-back for duplicate entries.
    pub duplicate_window_secs: i64,
    /// Allowed gap between `unit_price * |change|` and `total_amount`.
    pub price_tolerance: Decimal,
}

fn builtin_small_quantity_cuts() -> BTreeMap<UnitOfMeasure, Decimal> {
    [
        (UnitOfMeasure::Box, 5),
        (UnitOfMeasure::Kg, 10),
        (UnitOfMeasure::Piece, 3),
        (UnitOfMeasure::Bag, 2),
        (UnitOfMeasure::Item, 5),
        (UnitOfMeasure::Bucket, 2),
        (UnitOfMeasure::Pack, 3),
    ]
    .into_iter()
    .map(|(unit, cut)| (unit, Decimal::from(cut)))
    .collect()
}

fn merge_small_quantity_cuts<'de, D>(deserializer: D) -> Result<BTreeMap<UnitOfMeasure, Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<UnitOfMeasure, Decimal>::deserialize(deserializer)?;
    let mut table = builtin_small_quantity_cuts();
    table.extend(overrides);
    Ok(table)
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            small_quantity_cuts: builtin_small_quantity_cuts(),
            default_small_quantity_cut: Decimal::from(5),
            safety_stock: SafetyStockPolicy::default(),
            sudden_change: SuddenChangeConfig::default(),
            auction_window: AuctionWindow::default(),
            duplicate_window_secs: 180,
            price_tolerance: Decimal::new(1, 2),
        }
    }
}

impl DetectionConfig {
    /// Parse a JSON document; omitted fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, DetectionError> {
        let cfg: Self = serde_json::from_str(raw).map_err(|e| DetectionError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        let sc = &self.sudden_change;
        if sc.medium_rate <= Decimal::ZERO || sc.medium_rate > sc.high_rate {
            return Err(DetectionError::InvalidConfig(format!(
                "sudden_change rates must satisfy 0 < medium_rate <= high_rate (got {} / {})",
                sc.medium_rate, sc.high_rate
            )));
        }
        let aw = &self.auction_window;
        if aw.start_hour > 23 || aw.end_hour > 24 {
            return Err(DetectionError::InvalidConfig(
                "auction_window hours must be within 0..=23 (end may be 24)".to_string(),
            ));
        }
        if FixedOffset::east_opt(aw.utc_offset_minutes.saturating_mul(60)).is_none() {
            return Err(DetectionError::InvalidConfig(format!(
                "auction_window utc_offset_minutes out of range: {}",
                aw.utc_offset_minutes
            )));
        }
        if !(0..=MAX_DUPLICATE_WINDOW_SECS).contains(&self.duplicate_window_secs) {
            return Err(DetectionError::InvalidConfig(format!(
                "duplicate_window_secs must be within 0..={MAX_DUPLICATE_WINDOW_SECS}"
            )));
        }
        if self.price_tolerance < Decimal::ZERO {
            return Err(DetectionError::InvalidConfig(
                "price_tolerance cannot be negative".to_string(),
            ));
        }
        if self.safety_stock.ratio < Decimal::ZERO {
            return Err(DetectionError::InvalidConfig(
                "safety_stock.ratio cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Small-quantity cut for `unit`, falling back to the default for unlisted units.
    pub fn small_quantity_cut(&self, unit: &UnitOfMeasure) -> Decimal {
        match self.small_quantity_cuts.get(unit) {
            Some(cut) => *cut,
            None => {
                debug!(unit = %unit, fallback = %self.default_small_quantity_cut, "no small-quantity cut for unit");
                self.default_small_quantity_cut
            }
        }
    }

    pub fn duplicate_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.duplicate_window_secs.clamp(0, MAX_DUPLICATE_WINDOW_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at_hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, 30, 0).unwrap()
    }

    #[test]
    fn default_window_is_three_to_nine() {
        let w = AuctionWindow::default();
        assert!(!w.contains(at_hour(2)));
        assert!(w.contains(at_hour(3)));
        assert!(w.contains(at_hour(8)));
        assert!(!w.contains(at_hour(9)));
    }

    #[test]
    fn window_respects_offset_and_wraparound() {
        let w = AuctionWindow {
            enabled: true,
            start_hour: 22,
            end_hour: 4,
            utc_offset_minutes: 9 * 60,
        };
        // 14:30 UTC is 23:30 at +09:00.
        assert!(w.contains(at_hour(14)));
        // 20:30 UTC is 05:30 at +09:00.
        assert!(!w.contains(at_hour(20)));
    }

    #[test]
    fn disabled_window_never_matches() {
        let w = AuctionWindow {
            enabled: false,
            ..AuctionWindow::default()
        };
        assert!(!w.contains(at_hour(5)));
    }

    #[test]
    fn unlisted_unit_uses_default_cut() {
        let cfg = DetectionConfig::default();
        assert_eq!(cfg.small_quantity_cut(&UnitOfMeasure::Kg), dec!(10));
        assert_eq!(cfg.small_quantity_cut(&UnitOfMeasure::Other("tray".into())), dec!(5));
    }

    #[test]
    fn json_overrides_merge_with_defaults() {
        let cfg = DetectionConfig::from_json(
            r#"{
                "small_quantity_cuts": { "kg": 25 },
                "safety_stock": { "unit_defaults": { "box": 30 } },
                "auction_window": { "start_hour": 4 }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.small_quantity_cut(&UnitOfMeasure::Kg), dec!(25));
        assert_eq!(cfg.small_quantity_cut(&UnitOfMeasure::Piece), dec!(3));
        assert_eq!(cfg.small_quantity_cut(&UnitOfMeasure::Bag), dec!(2));
        assert_eq!(cfg.safety_stock.unit_defaults.get(&UnitOfMeasure::Box), Some(&dec!(30)));
        assert_eq!(cfg.safety_stock.unit_defaults.get(&UnitOfMeasure::Kg), Some(&dec!(50)));
        assert_eq!(cfg.auction_window.start_hour, 4);
        assert_eq!(cfg.auction_window.end_hour, 9);
        assert_eq!(cfg.duplicate_window_secs, 180);
    }

    #[test]
    fn invalid_rates_are_rejected() {
        let err = DetectionConfig::from_json(
            r#"{ "sudden_change": { "high_rate": 0.4, "medium_rate": 0.5 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, DetectionError::InvalidConfig(_)));
    }
}
