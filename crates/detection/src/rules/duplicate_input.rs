use stockwatch_inventory::{LedgerEntry, Severity};

use crate::detector::{AnomalyCandidate, DetectionContext, Detector};

/// Same kind, size and price posted again shortly after.
///
/// `history` holds entries already in the item's stream, so a duplicate
/// sharing this entry's timestamp still counts as earlier.
pub fn detect(ctx: &DetectionContext<'_>) -> Option<AnomalyCandidate> {
    let entry = ctx.entry;
    if !entry.change_type.moves_quantity() {
        return None;
    }

    let window_start = entry.occurred_at - ctx.config.duplicate_window();
    let earlier = ctx
        .history
        .iter()
        .rev()
        .filter(|prior| prior.id != entry.id)
        .filter(|prior| prior.occurred_at >= window_start && prior.occurred_at <= entry.occurred_at)
        .find(|prior| same_posting(prior, entry))?;

    let seconds = (entry.occurred_at - earlier.occurred_at).num_seconds();
    Some(AnomalyCandidate::new(
        Detector::DuplicateInput,
        Severity::Medium,
        0.6,
        format!(
            "identical {} of {} was recorded {}s earlier (entry {})",
            entry.change_type.as_str(),
            entry.unit.format_quantity(entry.magnitude()),
            seconds,
            earlier.id,
        ),
        "Check whether the same slip was entered twice and reverse one of the entries.",
    ))
}

fn same_posting(prior: &LedgerEntry, entry: &LedgerEntry) -> bool {
    prior.item_id == entry.item_id
        && prior.change_type == entry.change_type
        && prior.magnitude() == entry.magnitude()
        && prior.unit_price == entry.unit_price
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use stockwatch_inventory::{ChangeType, UnitOfMeasure};

    fn pair(gap: Duration, second_price: rust_decimal::Decimal) -> Option<AnomalyCandidate> {
        let cfg = config();
        let mut item = item_with(UnitOfMeasure::Box, dec!(100));
        let first = record(&mut item, ChangeType::Out, dec!(5), Some(dec!(1000)), t0());
        let history = item.entries().to_vec();
        let second = record(&mut item, ChangeType::Out, dec!(5), Some(second_price), t0() + gap);
        assert_ne!(first.id, second.id);
        detect(&context(&second, &item, &history, &cfg))
    }

    #[test]
    fn two_minutes_apart_is_flagged() {
        let hit = pair(Duration::minutes(2), dec!(1000)).unwrap();
        assert_eq!((hit.severity, hit.confidence), (Severity::Medium, 0.6));
    }

    #[test]
    fn five_minutes_apart_is_not() {
        assert!(pair(Duration::minutes(5), dec!(1000)).is_none());
    }

    #[test]
    fn different_price_is_not_a_duplicate() {
        assert!(pair(Duration::minutes(1), dec!(1100)).is_none());
    }

    #[test]
    fn same_timestamp_counts_as_earlier() {
        assert!(pair(Duration::zero(), dec!(1000)).is_some());
    }

    #[test]
    fn adjust_is_never_checked() {
        let cfg = config();
        let mut item = item_with(UnitOfMeasure::Box, dec!(10));
        record(&mut item, ChangeType::Adjust, dec!(0), None, t0());
        let history = item.entries().to_vec();
        let second = record(&mut item, ChangeType::Adjust, dec!(0), None, t0());
        assert!(detect(&context(&second, &item, &history, &cfg)).is_none());
    }
}
