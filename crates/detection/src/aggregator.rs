//! Ranks simultaneous detector hits into one headline plus detail.

use serde::{Deserialize, Serialize};

use crate::detector::AnomalyCandidate;

/// One dominant alert and the remaining hits in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedAnomalies {
    pub primary: AnomalyCandidate,
    pub secondary: Vec<AnomalyCandidate>,
    pub total_count: usize,
    pub has_secondary: bool,
}

impl GroupedAnomalies {
    /// Every candidate, primary first.
    pub fn iter(&self) -> impl Iterator<Item = &AnomalyCandidate> {
        std::iter::once(&self.primary).chain(self.secondary.iter())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AnomalyAggregator;

impl AnomalyAggregator {
    /// Severity descending, ties by detector evaluation order.
    /// Returns `None` when nothing fired.
    pub fn smart_group(mut candidates: Vec<AnomalyCandidate>) -> Option<GroupedAnomalies> {
        if candidates.is_empty() {
            return None;
        }

        candidates.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.anomaly_type.evaluation_rank().cmp(&b.anomaly_type.evaluation_rank()))
        });

        let total_count = candidates.len();
        let mut ranked = candidates.into_iter();
        let primary = ranked.next()?;
        let secondary: Vec<_> = ranked.collect();

        Some(GroupedAnomalies {
            primary,
            has_secondary: !secondary.is_empty(),
            secondary,
            total_count,
        })
    }
}
