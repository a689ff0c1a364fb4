use rust_decimal::Decimal;

use stockwatch_inventory::Severity;

use crate::detector::{AnomalyCandidate, DetectionContext, Detector};

/// Large movements relative to the stock on hand before the mutation.
///
/// Movements below the unit's small-quantity cut are ignored regardless of
/// rate. Inside the auction window a HIGH swing is downgraded to MEDIUM.
pub fn detect(ctx: &DetectionContext<'_>) -> Option<AnomalyCandidate> {
    let entry = ctx.entry;
    if entry.before_quantity <= Decimal::ZERO {
        return None;
    }

    let magnitude = entry.magnitude();
    if magnitude < ctx.config.small_quantity_cut(&entry.unit) {
        return None;
    }

    // Out of range only when the prior stock is vanishingly small.
    let rate = magnitude.checked_div(entry.before_quantity).unwrap_or(Decimal::MAX);
    let thresholds = &ctx.config.sudden_change;

    let (severity, confidence, note) = if rate >= thresholds.high_rate {
        if ctx.config.auction_window.contains(entry.occurred_at) {
            (Severity::Medium, 0.8, " during the auction window")
        } else {
            (Severity::High, 0.9, "")
        }
    } else if rate >= thresholds.medium_rate {
        (Severity::Medium, 0.8, "")
    } else {
        return None;
    };

    let percent = match rate.checked_mul(Decimal::ONE_HUNDRED) {
        Some(p) => p.round_dp(1).normalize().to_string(),
        None => "well over 100".to_string(),
    };
    Some(AnomalyCandidate::new(
        Detector::SuddenChange,
        severity,
        confidence,
        format!(
            "{} of {} moved {} ({}% of {} on hand){}",
            entry.change_type.as_str(),
            ctx.item.product_id(),
            entry.unit.format_quantity(magnitude),
            percent,
            entry.unit.format_quantity(entry.before_quantity),
            note,
        ),
        "Confirm the quantity with whoever entered it; large swings are often a misplaced digit.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use stockwatch_inventory::{ChangeType, UnitOfMeasure};

    fn run_at(hour: u32, quantity: Decimal) -> Option<AnomalyCandidate> {
        let cfg = config();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, hour, 15, 0).unwrap();
        let (item, entry) = mutate_at(UnitOfMeasure::Kg, dec!(100), ChangeType::Out, quantity, at);
        detect(&context(&entry, &item, &[], &cfg))
    }

    #[test]
    fn eighty_percent_outside_window_is_high() {
        let hit = run_at(12, dec!(80)).unwrap();
        assert_eq!(hit.severity, Severity::High);
        assert_eq!(hit.confidence, 0.9);
        assert!(hit.description.contains("80 kg"));
    }

    #[test]
    fn eighty_percent_inside_window_is_downgraded() {
        let hit = run_at(5, dec!(80)).unwrap();
        assert_eq!(hit.severity, Severity::Medium);
        assert_eq!(hit.confidence, 0.8);
    }

    #[test]
    fn mid_rate_is_medium() {
        let hit = run_at(12, dec!(60)).unwrap();
        assert_eq!(hit.severity, Severity::Medium);
    }

    #[test]
    fn below_medium_rate_is_silent() {
        assert!(run_at(12, dec!(40)).is_none());
    }

    #[test]
    fn below_small_quantity_cut_is_silent() {
        let cfg = config();
        let (item, entry) = mutate(UnitOfMeasure::Kg, dec!(10), ChangeType::Out, dec!(8));
        // rate 0.8, but 8 kg is under the 10 kg cut
        assert!(detect(&context(&entry, &item, &[], &cfg)).is_none());
    }

    #[test]
    fn no_prior_stock_is_skipped() {
        let cfg = config();
        let (item, entry) = mutate(UnitOfMeasure::Box, dec!(0), ChangeType::In, dec!(50));
        assert!(detect(&context(&entry, &item, &[], &cfg)).is_none());
    }

    #[test]
    fn huge_rate_over_tiny_stock_does_not_overflow() {
        let cfg = config();
        let (item, entry) = mutate(
            UnitOfMeasure::Kg,
            dec!(0.00000000000000000001),
            ChangeType::In,
            dec!(100000000),
        );
        let hit = detect(&context(&entry, &item, &[], &cfg)).unwrap();
        assert_eq!(hit.severity, Severity::High);
        assert!(hit.description.contains("well over 100%"));
    }
}
