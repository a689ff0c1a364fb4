use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockwatch_core::OwnerId;
use stockwatch_events::EventEnvelope;
use stockwatch_inventory::{AnomalyId, AnomalyRecord, AnomalyType, InventoryEvent, InventoryItemId, Severity};

use super::{replay_order, ProjectionError, StreamCursors};
use crate::read_model::OwnerStore;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AnomalyScope {
    #[default]
    Owner,
    Item(InventoryItemId),
}

/// Filter for unresolved anomaly listings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnomalyQuery {
    pub scope: AnomalyScope,
    pub anomaly_type: Option<AnomalyType>,
    pub min_severity: Option<Severity>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AnomalyQuery {
    fn matches(&self, record: &AnomalyRecord) -> bool {
        if record.is_resolved() {
            return false;
        }
        if let AnomalyScope::Item(item_id) = self.scope {
            if record.item_id != item_id {
                return false;
            }
        }
        if self.anomaly_type.is_some_and(|t| t != record.anomaly_type) {
            return false;
        }
        if self.min_severity.is_some_and(|s| record.severity < s) {
            return false;
        }
        if self.since.is_some_and(|since| record.detected_at < since) {
            return false;
        }
        true
    }
}

/// Unresolved counts for one owner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub unresolved: usize,
    pub by_type: BTreeMap<AnomalyType, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

/// Anomaly record read model, keyed by anomaly id.
#[derive(Debug)]
pub struct AnomalyProjection<S>
where
    S: OwnerStore<AnomalyId, AnomalyRecord>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> AnomalyProjection<S>
where
    S: OwnerStore<AnomalyId, AnomalyRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::default(),
        }
    }

    pub fn get(&self, owner_id: OwnerId, anomaly_id: &AnomalyId) -> Option<AnomalyRecord> {
        self.store.get(owner_id, anomaly_id)
    }

    /// Unresolved records, newest first; ties by severity (desc) then detector order.
    pub fn list_unresolved(&self, owner_id: OwnerId, query: &AnomalyQuery) -> Vec<AnomalyRecord> {
        let mut records: Vec<_> = self
            .store
            .list(owner_id)
            .into_iter()
            .filter(|r| query.matches(r))
            .collect();

        records.sort_by(|a, b| {
            b.detected_at
                .cmp(&a.detected_at)
                .then_with(|| b.severity.cmp(&a.severity))
                .then_with(|| a.anomaly_type.evaluation_rank().cmp(&b.anomaly_type.evaluation_rank()))
        });
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        records
    }

    pub fn summary(&self, owner_id: OwnerId) -> AnomalySummary {
        let mut summary = AnomalySummary::default();
        for record in self.store.list(owner_id).into_iter().filter(|r| !r.is_resolved()) {
            summary.unresolved += 1;
            *summary.by_type.entry(record.anomaly_type).or_default() += 1;
            *summary.by_severity.entry(record.severity).or_default() += 1;
        }
        summary
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let owner_id = envelope.owner_id();
        self.cursors.apply(envelope, |event| {
            match event {
                InventoryEvent::AnomalyRecorded(e) => {
                    self.store.upsert(owner_id, e.record.id, e.record);
                }
                InventoryEvent::AnomalyResolved(e) => {
                    if let Some(mut record) = self.store.get(owner_id, &e.anomaly_id) {
                        record.resolved_at = Some(e.occurred_at);
                        record.resolved_by = e.resolved_by;
                        self.store.upsert(owner_id, e.anomaly_id, record);
                    }
                }
                _ => {}
            }
            Ok(())
        })
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.clear();
        self.store.clear_all();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        replay_order(&mut envs);
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
