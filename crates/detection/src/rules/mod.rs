//! One module per detection rule. Each exposes
//! `detect(&DetectionContext) -> Option<AnomalyCandidate>`.

pub mod duplicate_input;
pub mod low_stock;
pub mod negative_stock;
pub mod price_consistency;
pub mod sudden_change;
