//! Units of measure and quantity rendering.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use stockwatch_core::DomainError;

/// Unit an item is stocked in.
///
/// Known units drive the per-unit detection tables. Anything else is kept
/// verbatim as `Other` and falls back to the configured defaults.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UnitOfMeasure {
    Box,
    Kg,
    Piece,
    Bag,
    Item,
    Bucket,
    Pack,
    Other(String),
}

impl UnitOfMeasure {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let s = raw.trim().to_lowercase();
        let unit = match s.as_str() {
            "" => return Err(DomainError::validation("unit cannot be empty")),
            "box" | "boxes" => Self::Box,
            "kg" | "kgs" | "kilogram" | "kilograms" => Self::Kg,
            "piece" | "pieces" | "pc" | "pcs" => Self::Piece,
            "bag" | "bags" => Self::Bag,
            "item" | "items" | "ea" => Self::Item,
            "bucket" | "buckets" => Self::Bucket,
            "pack" | "packs" => Self::Pack,
            _ => Self::Other(s),
        };
        Ok(unit)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Box => "box",
            Self::Kg => "kg",
            Self::Piece => "piece",
            Self::Bag => "bag",
            Self::Item => "item",
            Self::Bucket => "bucket",
            Self::Pack => "pack",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Counted units render as whole numbers; weights and unknown units keep decimals.
    pub fn is_discrete(&self) -> bool {
        !matches!(self, Self::Kg | Self::Other(_))
    }

    /// Human-readable quantity, e.g. `"12 box"` or `"12.5 kg"`.
    ///
    /// Only for descriptions. Stored numerics are never rounded.
    pub fn format_quantity(&self, quantity: Decimal) -> String {
        format!("{} {}", self.render_number(quantity), self.as_str())
    }

    pub fn render_number(&self, quantity: Decimal) -> Decimal {
        if self.is_discrete() {
            quantity
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .normalize()
        } else {
            quantity.normalize()
        }
    }
}

impl fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for UnitOfMeasure {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UnitOfMeasure> for String {
    fn from(value: UnitOfMeasure) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_accepts_aliases_and_keeps_unknown_units() {
        assert_eq!(UnitOfMeasure::parse(" KG ").unwrap(), UnitOfMeasure::Kg);
        assert_eq!(UnitOfMeasure::parse("pcs").unwrap(), UnitOfMeasure::Piece);
        assert_eq!(
            UnitOfMeasure::parse("Crate").unwrap(),
            UnitOfMeasure::Other("crate".to_string())
        );
        assert!(UnitOfMeasure::parse("   ").is_err());
    }

    #[test]
    fn discrete_units_render_as_integers() {
        assert_eq!(UnitOfMeasure::Box.format_quantity(dec!(12.5)), "13 box");
        assert_eq!(UnitOfMeasure::Pack.format_quantity(dec!(-3.0)), "-3 pack");
    }

    #[test]
    fn continuous_units_keep_precision() {
        assert_eq!(UnitOfMeasure::Kg.format_quantity(dec!(12.50)), "12.5 kg");
        assert_eq!(UnitOfMeasure::Kg.format_quantity(dec!(80.000)), "80 kg");
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&UnitOfMeasure::Bucket).unwrap();
        assert_eq!(json, "\"bucket\"");
        let back: UnitOfMeasure = serde_json::from_str("\"tray\"").unwrap();
        assert_eq!(back, UnitOfMeasure::Other("tray".to_string()));
    }
}
