//! Versioned detector registry.
//!
//! Each rule is a tagged variant with its own version tag. The tag stamped on
//! an anomaly record names the exact heuristic revision that produced it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use stockwatch_inventory::{AnomalyType, InventoryItem, LedgerEntry, Severity};

use crate::config::DetectionConfig;
use crate::rules;

/// Everything a detector may look at. Detectors are pure over this.
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    /// The entry just decided (not yet stamped).
    pub entry: &'a LedgerEntry,
    /// Item state after the entry has been applied.
    pub item: &'a InventoryItem,
    /// Ledger entries written before `entry`, oldest first.
    pub history: &'a [LedgerEntry],
    pub config: &'a DetectionConfig,
}

/// A detector's proposed flag, before ranking and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyCandidate {
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub confidence: f64,
    pub description: String,
    pub recommended_action: String,
    pub detector_version: String,
}

impl AnomalyCandidate {
    pub(crate) fn new(
        detector: Detector,
        severity: Severity,
        confidence: f64,
        description: impl Into<String>,
        recommended_action: impl Into<String>,
    ) -> Self {
        Self {
            anomaly_type: detector.anomaly_type(),
            severity,
            confidence,
            description: description.into(),
            recommended_action: recommended_action.into(),
            detector_version: detector.version().to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    NegativeStock,
    SuddenChange,
    LowStock,
    DuplicateInput,
    PriceConsistency,
}

impl Detector {
    /// Fixed evaluation order.
    pub const ALL: [Detector; 5] = [
        Detector::NegativeStock,
        Detector::SuddenChange,
        Detector::LowStock,
        Detector::DuplicateInput,
        Detector::PriceConsistency,
    ];

    pub fn anomaly_type(self) -> AnomalyType {
        match self {
            Detector::NegativeStock => AnomalyType::NegativeStock,
            Detector::SuddenChange => AnomalyType::SuddenChange,
            Detector::LowStock => AnomalyType::LowStock,
            Detector::DuplicateInput => AnomalyType::DuplicateInput,
            Detector::PriceConsistency => AnomalyType::PriceConsistency,
        }
    }

    pub fn version(self) -> &'static str {
        match self {
            Detector::NegativeStock => "negative-stock@1",
            Detector::SuddenChange => "sudden-change@1",
            Detector::LowStock => "low-stock@1",
            Detector::DuplicateInput => "duplicate-input@1",
            Detector::PriceConsistency => "price-consistency@1",
        }
    }

    pub fn detect(self, ctx: &DetectionContext<'_>) -> Option<AnomalyCandidate> {
        match self {
            Detector::NegativeStock => rules::negative_stock::detect(ctx),
            Detector::SuddenChange => rules::sudden_change::detect(ctx),
            Detector::LowStock => rules::low_stock::detect(ctx),
            Detector::DuplicateInput => rules::duplicate_input::detect(ctx),
            Detector::PriceConsistency => rules::price_consistency::detect(ctx),
        }
    }
}

/// The detectors run on every mutation, always in [`Detector::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorSet {
    detectors: Vec<Detector>,
}

impl Default for DetectorSet {
    fn default() -> Self {
        Self {
            detectors: Detector::ALL.to_vec(),
        }
    }
}

impl DetectorSet {
    /// Restrict to a subset. Order is normalised to the fixed evaluation order.
    pub fn only(detectors: impl IntoIterator<Item = Detector>) -> Self {
        let mut detectors: Vec<Detector> = detectors.into_iter().collect();
        detectors.sort();
        detectors.dedup();
        Self { detectors }
    }

    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    /// Run every detector; each yields at most one candidate.
    pub fn evaluate(&self, ctx: &DetectionContext<'_>) -> Vec<AnomalyCandidate> {
        let mut out = Vec::new();
        for detector in &self.detectors {
            if let Some(candidate) = detector.detect(ctx) {
                debug!(
                    entry = %ctx.entry.id,
                    detector = detector.version(),
                    severity = candidate.severity.as_str(),
                    "detector fired"
                );
                out.push(candidate);
            }
        }
        out
    }
}
