use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use stockwatch_core::DomainError;
use stockwatch_detection::GroupedAnomalies;
use stockwatch_infra::projections::{AnomalyQuery, AnomalyScope, AnomalySummary, InventoryItemView};
use stockwatch_infra::{LedgerFilter, MutationOutcome, MutationRequest, RegisterItemRequest};
use stockwatch_inventory::{
    AnomalyRecord, AnomalyType, ChangeType, InventoryItemId, ItemStatus, LedgerEntry, MutationSource,
    SafetyThreshold, Severity, UnitOfMeasure,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterItemBody {
    pub product_id: String,
    pub unit: String,
    pub unit_price: Option<Decimal>,
    pub safety_stock_quantity: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    pub status: Option<String>,
}

impl RegisterItemBody {
    pub fn into_request(self) -> Result<RegisterItemRequest, DomainError> {
        let mut request = RegisterItemRequest::new(self.product_id, UnitOfMeasure::parse(&self.unit)?);
        request.unit_price = self.unit_price;
        request.safety_stock_quantity = self.safety_stock_quantity;
        request.reorder_point = self.reorder_point;
        if let Some(status) = self.status.as_deref() {
            request.status = ItemStatus::parse(status)?;
        }
        Ok(request)
    }
}

#[derive(Debug, Deserialize)]
pub struct MutationBody {
    pub change_type: String,
    pub quantity: Decimal,
    pub source: Option<String>,
    pub memo: Option<String>,
    pub unit_price: Option<Decimal>,
    pub total_amount: Option<Decimal>,
}

impl MutationBody {
    pub fn into_request(self) -> Result<MutationRequest, DomainError> {
        let mut request = MutationRequest::new(ChangeType::parse(&self.change_type)?, self.quantity);
        if let Some(source) = self.source.as_deref() {
            request.source = MutationSource::parse(source)?;
        }
        request.memo = self.memo;
        request.unit_price = self.unit_price;
        request.total_amount = self.total_amount;
        Ok(request)
    }
}

/// Both fields are written as given; omitting one clears it.
#[derive(Debug, Deserialize)]
pub struct ThresholdsBody {
    pub safety_stock_quantity: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct QuantityBody {
    pub quantity: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerParams {
    pub change_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub anomalies_only: bool,
    pub limit: Option<usize>,
}

impl LedgerParams {
    pub fn into_filter(self) -> Result<LedgerFilter, DomainError> {
        Ok(LedgerFilter {
            change_type: self.change_type.as_deref().map(ChangeType::parse).transpose()?,
            since: self.since,
            until: self.until,
            anomalies_only: self.anomalies_only,
            limit: self.limit,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AnomalyParams {
    pub item_id: Option<String>,
    pub anomaly_type: Option<String>,
    pub min_severity: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AnomalyParams {
    pub fn into_query(self) -> Result<AnomalyQuery, DomainError> {
        let scope = match self.item_id.as_deref() {
            Some(raw) => AnomalyScope::Item(raw.parse::<InventoryItemId>()?),
            None => AnomalyScope::Owner,
        };
        Ok(AnomalyQuery {
            scope,
            anomaly_type: self.anomaly_type.as_deref().map(AnomalyType::parse).transpose()?,
            min_severity: self.min_severity.as_deref().map(Severity::parse).transpose()?,
            since: self.since,
            limit: self.limit,
        })
    }
}

// -------------------------
// Response mapping
// -------------------------

// Quantities and money leave the API as JSON numbers. Events keep the exact
// decimal string.
fn number(value: Decimal) -> JsonValue {
    value.to_f64().map_or(JsonValue::Null, JsonValue::from)
}

fn opt_number(value: Option<Decimal>) -> JsonValue {
    value.map_or(JsonValue::Null, number)
}

pub fn item_to_json(view: InventoryItemView) -> JsonValue {
    let stock_display = view.unit.format_quantity(view.stock_quantity);
    json!({
        "id": view.item_id.to_string(),
        "product_id": view.product_id,
        "unit": view.unit.as_str(),
        "stock_quantity": number(view.stock_quantity),
        "stock_display": stock_display,
        "ordered_quantity": number(view.ordered_quantity),
        "available_quantity": number(view.available_quantity),
        "safety_stock_quantity": opt_number(view.safety_stock_quantity),
        "reorder_point": opt_number(view.reorder_point),
        "unit_price": opt_number(view.unit_price),
        "total_amount": opt_number(view.total_amount),
        "status": view.status.as_str(),
        "entry_count": view.entry_count,
        "unresolved_anomalies": view.unresolved_anomalies,
        "updated_at": view.updated_at,
    })
}

pub fn entry_to_json(entry: &LedgerEntry) -> JsonValue {
    json!({
        "id": entry.id.to_string(),
        "item_id": entry.item_id.to_string(),
        "change_type": entry.change_type.as_str(),
        "change": number(entry.change),
        "before_quantity": number(entry.before_quantity),
        "after_quantity": number(entry.after_quantity),
        "unit": entry.unit.as_str(),
        "unit_price": opt_number(entry.unit_price),
        "total_amount": opt_number(entry.total_amount),
        "source": entry.source,
        "actor": entry.actor.map(|a| a.to_string()),
        "memo": entry.memo,
        "occurred_at": entry.occurred_at,
        "is_anomaly": entry.is_anomaly,
        "anomaly_type": entry.anomaly_type.map(|t| t.as_str()),
        "anomaly_score": entry.anomaly_score,
    })
}

pub fn anomaly_to_json(record: &AnomalyRecord) -> JsonValue {
    json!({
        "id": record.id.to_string(),
        "item_id": record.item_id.to_string(),
        "entry_id": record.entry_id.to_string(),
        "anomaly_type": record.anomaly_type.as_str(),
        "severity": record.severity.as_str(),
        "confidence": record.confidence,
        "description": record.description,
        "recommended_action": record.recommended_action,
        "detector_version": record.detector_version,
        "detected_at": record.detected_at,
        "resolved_at": record.resolved_at,
        "resolved_by": record.resolved_by.map(|u| u.to_string()),
    })
}

fn grouping_to_json(grouping: &GroupedAnomalies) -> JsonValue {
    json!({
        "primary": grouping.primary.anomaly_type.as_str(),
        "severity": grouping.primary.severity.as_str(),
        "secondary": grouping
            .secondary
            .iter()
            .map(|c| c.anomaly_type.as_str())
            .collect::<Vec<_>>(),
        "total_count": grouping.total_count,
        "has_secondary": grouping.has_secondary,
    })
}

pub fn outcome_to_json(outcome: &MutationOutcome) -> JsonValue {
    json!({
        "entry": entry_to_json(&outcome.entry),
        "anomalies": outcome.anomalies.iter().map(anomaly_to_json).collect::<Vec<_>>(),
        "grouping": outcome.grouping.as_ref().map(grouping_to_json),
    })
}

pub fn summary_to_json(summary: &AnomalySummary) -> JsonValue {
    let by_type: serde_json::Map<String, JsonValue> = summary
        .by_type
        .iter()
        .map(|(t, n)| (t.as_str().to_string(), json!(n)))
        .collect();
    let by_severity: serde_json::Map<String, JsonValue> = summary
        .by_severity
        .iter()
        .map(|(s, n)| (s.as_str().to_string(), json!(n)))
        .collect();
    json!({
        "unresolved": summary.unresolved,
        "by_type": by_type,
        "by_severity": by_severity,
    })
}

pub fn threshold_to_json(item_id: InventoryItemId, threshold: &SafetyThreshold) -> JsonValue {
    json!({
        "item_id": item_id.to_string(),
        "value": number(threshold.value),
        "source": threshold.source,
    })
}
