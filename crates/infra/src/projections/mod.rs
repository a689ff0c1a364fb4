//! Projections (read model builders).
//!
//! Projections consume committed envelopes and maintain disposable read
//! models. They are:
//! - rebuildable from the event store
//! - owner-isolated
//! - idempotent per stream, so re-delivering an envelope is harmless

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use stockwatch_core::{AggregateId, OwnerId};
use stockwatch_events::EventEnvelope;
use stockwatch_inventory::InventoryEvent;

pub mod anomalies;
pub mod inventory_stock;

pub use anomalies::{AnomalyProjection, AnomalyQuery, AnomalyScope, AnomalySummary};
pub use inventory_stock::{InventoryItemView, InventoryStockProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize inventory event: {0}")]
    Deserialize(String),

    #[error("owner isolation violation: {0}")]
    OwnerIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    owner_id: OwnerId,
    aggregate_id: AggregateId,
}

/// Last applied sequence number per stream.
#[derive(Debug, Default)]
pub(crate) struct StreamCursors {
    inner: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    /// Apply `f` to the decoded event unless the envelope was already seen.
    ///
    /// The first envelope of a stream may carry any positive sequence number;
    /// after that increments must be exactly one.
    pub(crate) fn apply<F>(&self, envelope: &EventEnvelope<JsonValue>, f: F) -> Result<(), ProjectionError>
    where
        F: FnOnce(InventoryEvent) -> Result<(), ProjectionError>,
    {
        let key = CursorKey {
            owner_id: envelope.owner_id(),
            aggregate_id: envelope.aggregate_id(),
        };
        let seq = envelope.sequence_number();

        let mut cursors = match self.inner.write() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        let last = cursors.get(&key).copied().unwrap_or(0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let event = decode(envelope)?;
        f(event)?;
        cursors.insert(key, seq);
        Ok(())
    }

    pub(crate) fn clear(&self) {
        match self.inner.write() {
            Ok(mut c) => c.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

/// Decode an envelope payload and check it belongs to the envelope's stream.
fn decode(envelope: &EventEnvelope<JsonValue>) -> Result<InventoryEvent, ProjectionError> {
    let event: InventoryEvent = serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

    let (owner_id, item_id) = event.scope();
    if owner_id != envelope.owner_id() {
        return Err(ProjectionError::OwnerIsolation(
            "event owner_id does not match envelope owner_id".to_string(),
        ));
    }
    if item_id.0 != envelope.aggregate_id() {
        return Err(ProjectionError::OwnerIsolation(
            "event item_id does not match envelope aggregate_id".to_string(),
        ));
    }
    Ok(event)
}

/// Deterministic replay order: owner, aggregate, sequence.
pub(crate) fn replay_order(envelopes: &mut [EventEnvelope<JsonValue>]) {
    envelopes.sort_by_key(|e| {
        (
            *e.owner_id().as_uuid().as_bytes(),
            *e.aggregate_id().as_uuid().as_bytes(),
            e.sequence_number(),
        )
    });
}
