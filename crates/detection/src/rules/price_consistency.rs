use rust_decimal::Decimal;
use tracing::warn;

use stockwatch_inventory::Severity;

use crate::detector::{AnomalyCandidate, DetectionContext, Detector};

pub fn detect(ctx: &DetectionContext<'_>) -> Option<AnomalyCandidate> {
    let entry = ctx.entry;
    let (unit_price, total) = (entry.unit_price?, entry.total_amount?);

    if unit_price <= Decimal::ZERO {
        return Some(flag(
            format!("unit price {} is not positive", unit_price.normalize()),
        ));
    }

    let magnitude = entry.magnitude();
    let Some(expected) = unit_price.checked_mul(magnitude) else {
        warn!(entry = %entry.id, "unit_price * quantity overflowed; flagging as inconsistent");
        return Some(flag(format!("unit price {} times quantity overflows", unit_price.normalize())));
    };

    let diff = (expected - total.abs()).abs();
    if diff <= ctx.config.price_tolerance {
        return None;
    }

    Some(flag(format!(
        "total {} does not match {} x {} = {} (off by {})",
        total.normalize(),
        unit_price.normalize(),
        entry.unit.format_quantity(magnitude),
        expected.normalize(),
        diff.normalize(),
    )))
}

fn flag(description: String) -> AnomalyCandidate {
    AnomalyCandidate::new(
        Detector::PriceConsistency,
        Severity::Medium,
        0.7,
        description,
        "Re-check the unit price and total on the source document.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use rust_decimal_macros::dec;
    use stockwatch_inventory::{ChangeType, UnitOfMeasure};

    fn entry_with(price: Option<Decimal>, total: Option<Decimal>) -> Option<AnomalyCandidate> {
        let cfg = config();
        let (item, mut entry) = mutate(UnitOfMeasure::Box, dec!(100), ChangeType::Out, dec!(10));
        entry.unit_price = price;
        entry.total_amount = total;
        detect(&context(&entry, &item, &[], &cfg))
    }

    #[test]
    fn matching_total_passes() {
        assert!(entry_with(Some(dec!(1000)), Some(dec!(10000))).is_none());
    }

    #[test]
    fn mismatched_total_is_medium() {
        let hit = entry_with(Some(dec!(1000)), Some(dec!(10050))).unwrap();
        assert_eq!((hit.severity, hit.confidence), (Severity::Medium, 0.7));
        assert!(hit.description.contains("off by 50"));
    }

    #[test]
    fn within_tolerance_passes() {
        assert!(entry_with(Some(dec!(1000)), Some(dec!(10000.01))).is_none());
    }

    #[test]
    fn non_positive_price_is_flagged() {
        assert!(entry_with(Some(dec!(0)), Some(dec!(0))).is_some());
    }

    #[test]
    fn missing_either_side_is_skipped() {
        assert!(entry_with(Some(dec!(1000)), None).is_none());
        assert!(entry_with(None, Some(dec!(10050))).is_none());
    }
}
