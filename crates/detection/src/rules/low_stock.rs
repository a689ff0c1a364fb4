use rust_decimal::Decimal;

use stockwatch_inventory::Severity;

use crate::detector::{AnomalyCandidate, DetectionContext, Detector};

pub fn detect(ctx: &DetectionContext<'_>) -> Option<AnomalyCandidate> {
    let threshold = ctx.config.safety_stock.compute_threshold(ctx.item);
    let stock = ctx.item.stock_quantity();
    if stock > threshold.value {
        return None;
    }

    let (severity, confidence) = if stock <= threshold.value / Decimal::TWO {
        (Severity::High, 0.8)
    } else {
        (Severity::Medium, 0.7)
    };

    let unit = ctx.item.unit();
    Some(AnomalyCandidate::new(
        Detector::LowStock,
        severity,
        confidence,
        format!(
            "{} is at {}, at or below the safety threshold of {}",
            ctx.item.product_id(),
            unit.format_quantity(stock),
            unit.format_quantity(threshold.value),
        ),
        "Place a replenishment order or raise the threshold if it no longer fits demand.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use rust_decimal_macros::dec;
    use stockwatch_inventory::{ChangeType, UnitOfMeasure};

    #[test]
    fn explicit_safety_stock_wins_over_reorder_point() {
        let cfg = config();
        let (item, entry) = mutate_with_thresholds(
            UnitOfMeasure::Box,
            dec!(45),
            Some(dec!(30)),
            Some(dec!(50)),
            ChangeType::Out,
            dec!(5),
        );
        assert_eq!(item.stock_quantity(), dec!(40));
        assert_eq!(cfg.safety_stock.compute_threshold(&item).value, dec!(30));
        assert!(detect(&context(&entry, &item, &[], &cfg)).is_none());
    }

    #[test]
    fn at_threshold_is_medium_and_half_is_high() {
        let cfg = config();
        let (item, entry) =
            mutate_with_thresholds(UnitOfMeasure::Box, dec!(40), Some(dec!(30)), None, ChangeType::Out, dec!(10));
        let hit = detect(&context(&entry, &item, &[], &cfg)).unwrap();
        assert_eq!((hit.severity, hit.confidence), (Severity::Medium, 0.7));

        let (item, entry) =
            mutate_with_thresholds(UnitOfMeasure::Box, dec!(40), Some(dec!(30)), None, ChangeType::Out, dec!(25));
        let hit = detect(&context(&entry, &item, &[], &cfg)).unwrap();
        assert_eq!((hit.severity, hit.confidence), (Severity::High, 0.8));
    }

    #[test]
    fn unit_default_applies_without_thresholds() {
        let cfg = config();
        // kg default is 50; 47.5 * 0.15 stays below it.
        let (item, entry) = mutate(UnitOfMeasure::Kg, dec!(60), ChangeType::Out, dec!(12.5));
        let hit = detect(&context(&entry, &item, &[], &cfg)).unwrap();
        assert!(hit.description.contains("47.5 kg"));
        assert!(hit.description.contains("50 kg"));
    }
}
