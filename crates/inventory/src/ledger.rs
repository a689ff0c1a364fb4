//! Stock ledger entries: the immutable record of every quantity mutation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockwatch_core::{DomainError, DomainResult, OwnerId, UserId};

use crate::anomaly::AnomalyType;
use crate::item::InventoryItemId;
use crate::unit::UnitOfMeasure;

/// Ledger entry identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerEntryId(pub Uuid);

impl LedgerEntryId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for LedgerEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for LedgerEntryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Kind of stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Goods received.
    In,
    /// Goods shipped or consumed.
    Out,
    /// Metadata-only correction (unit price etc.); quantity does not move.
    Adjust,
}

impl ChangeType {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        match raw.trim().to_lowercase().as_str() {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "adjust" => Ok(Self::Adjust),
            other => Err(DomainError::validation(format!(
                "change type must be one of in, out, adjust (got '{other}')"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::Adjust => "adjust",
        }
    }

    pub fn moves_quantity(self) -> bool {
        !matches!(self, Self::Adjust)
    }
}

/// Where a mutation came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MutationSource {
    #[default]
    Manual,
    Order,
    Payment,
    Other,
}

impl MutationSource {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        match raw.trim().to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "order" => Ok(Self::Order),
            "payment" => Ok(Self::Payment),
            "other" => Ok(Self::Other),
            other => Err(DomainError::validation(format!("unknown mutation source '{other}'"))),
        }
    }
}

/// Result of the per-type ledger arithmetic.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Movement {
    /// Signed change stored on the entry.
    pub change: Decimal,
    pub before: Decimal,
    pub after: Decimal,
}

impl Movement {
    /// Compute before/after from the current stock.
    ///
    /// `out` is never clamped at zero: a negative `after` is a finding for the
    /// detectors, not something the ledger hides.
    pub fn compute(change_type: ChangeType, quantity: Decimal, current: Decimal) -> DomainResult<Self> {
        let change = match change_type {
            ChangeType::In => quantity,
            ChangeType::Out => -quantity,
            ChangeType::Adjust => Decimal::ZERO,
        };
        let after = current
            .checked_add(change)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        Ok(Self {
            change,
            before: current,
            after,
        })
    }
}

/// One immutable stock mutation.
///
/// The anomaly stamp (`is_anomaly`, `anomaly_type`, `anomaly_score`) is filled
/// from the primary detector hit before the entry is written, so the stored
/// fact never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub change_type: ChangeType,
    pub change: Decimal,
    pub before_quantity: Decimal,
    pub after_quantity: Decimal,
    pub unit: UnitOfMeasure,
    pub unit_price: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub source: MutationSource,
    pub actor: Option<UserId>,
    pub memo: Option<String>,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub is_anomaly: bool,
    #[serde(default)]
    pub anomaly_type: Option<AnomalyType>,
    #[serde(default)]
    pub anomaly_score: Option<f64>,
}

impl LedgerEntry {
    /// Absolute quantity moved.
    pub fn magnitude(&self) -> Decimal {
        self.change.abs()
    }

    /// `after - before` must equal the signed change for every change type.
    pub fn is_balanced(&self) -> bool {
        self.after_quantity - self.before_quantity == self.change
    }

    /// Record the primary anomaly on the entry.
    pub fn stamp(&mut self, anomaly_type: AnomalyType, score: f64) {
        self.is_anomaly = true;
        self.anomaly_type = Some(anomaly_type);
        self.anomaly_score = Some(score);
    }
}
