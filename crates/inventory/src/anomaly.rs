//! Persisted anomaly records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockwatch_core::{DomainError, DomainResult, OwnerId, UserId};

use crate::item::InventoryItemId;
use crate::ledger::LedgerEntryId;

/// Anomaly record identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnomalyId(pub Uuid);

impl AnomalyId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AnomalyId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for AnomalyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for AnomalyId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("AnomalyId: {e}")))
    }
}

/// The five rule families.
///
/// Declaration order is the detector evaluation order, which is the
/// tie-break when two hits share a severity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    NegativeStock,
    SuddenChange,
    LowStock,
    DuplicateInput,
    PriceConsistency,
}

impl AnomalyType {
    pub const ALL: [AnomalyType; 5] = [
        AnomalyType::NegativeStock,
        AnomalyType::SuddenChange,
        AnomalyType::LowStock,
        AnomalyType::DuplicateInput,
        AnomalyType::PriceConsistency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NegativeStock => "negative_stock",
            Self::SuddenChange => "sudden_change",
            Self::LowStock => "low_stock",
            Self::DuplicateInput => "duplicate_input",
            Self::PriceConsistency => "price_consistency",
        }
    }

    pub fn parse(raw: &str) -> DomainResult<Self> {
        let needle = raw.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| DomainError::validation(format!("unknown anomaly type '{raw}'")))
    }

    /// Position in the fixed detector order.
    pub fn evaluation_rank(self) -> usize {
        self as usize
    }
}

/// Ordinal urgency, `Low < Medium < High < Critical`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn parse(raw: &str) -> DomainResult<Self> {
        match raw.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(DomainError::validation(format!("unknown severity '{raw}'"))),
        }
    }
}

/// One detector hit, persisted against the ledger entry that triggered it.
///
/// Immutable apart from the one-way unresolved → resolved transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub id: AnomalyId,
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub entry_id: LedgerEntryId,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub confidence: f64,
    pub description: String,
    pub recommended_action: String,
    pub detector_version: String,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_by: Option<UserId>,
}

impl AnomalyRecord {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_totally_ordered() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn evaluation_rank_follows_detector_order() {
        let ranks: Vec<usize> = AnomalyType::ALL.iter().map(|t| t.evaluation_rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn anomaly_type_parses_its_wire_name() {
        for t in AnomalyType::ALL {
            assert_eq!(AnomalyType::parse(t.as_str()).unwrap(), t);
        }
        assert!(AnomalyType::parse("fraud").is_err());
    }
}
