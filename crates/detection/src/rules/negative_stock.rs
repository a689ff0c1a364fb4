use rust_decimal::Decimal;

use stockwatch_inventory::Severity;

use crate::detector::{AnomalyCandidate, DetectionContext, Detector};

pub fn detect(ctx: &DetectionContext<'_>) -> Option<AnomalyCandidate> {
    let stock = ctx.item.stock_quantity();
    if stock >= Decimal::ZERO {
        return None;
    }

    let unit = ctx.item.unit();
    Some(AnomalyCandidate::new(
        Detector::NegativeStock,
        Severity::Critical,
        1.0,
        format!(
            "stock for {} went negative: {} after {} {}",
            ctx.item.product_id(),
            unit.format_quantity(stock),
            ctx.entry.change_type.as_str(),
            unit.format_quantity(ctx.entry.magnitude()),
        ),
        "Count the physical stock and post an adjustment; check for an unrecorded receipt.",
    ))
}
