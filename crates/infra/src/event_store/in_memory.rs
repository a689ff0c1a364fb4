use std::collections::HashMap;
use std::sync::RwLock;

use stockwatch_core::{AggregateId, ExpectedVersion, OwnerId};

use super::r#trait::{validate_batch, EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    owner_id: OwnerId,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }
        validate_batch(&events)?;

        let key = StreamKey {
            owner_id: events[0].owner_id,
            aggregate_id: events[0].aggregate_id,
        };
        let aggregate_type = events[0].aggregate_type.clone();

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        let stream = streams.entry(key).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            committed.push(StoredEvent {
                event_id: e.event_id,
                owner_id: e.owner_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            });
            next += 1;
        }
        stream.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(
        &self,
        owner_id: OwnerId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey { owner_id, aggregate_id };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }

    fn load_all(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(streams
            .values()
            .filter(|s| s.first().is_some_and(|e| e.aggregate_type == aggregate_type))
            .flat_map(|s| s.iter().cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event(owner_id: OwnerId, aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            owner_id,
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.happened".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn sequence_numbers_start_at_one_and_increase() {
        let store = InMemoryEventStore::new();
        let (owner, agg) = (OwnerId::new(), AggregateId::new());

        let first = store
            .append(vec![event(owner, agg, "t"), event(owner, agg, "t")], ExpectedVersion::Exact(0))
            .unwrap();
        assert_eq!(first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(), vec![1, 2]);

        let next = store.append(vec![event(owner, agg, "t")], ExpectedVersion::Exact(2)).unwrap();
        assert_eq!(next[0].sequence_number, 3);
        assert_eq!(store.load_stream(owner, agg).unwrap().len(), 3);
    }

    #[test]
    fn stale_version_is_a_concurrency_error_and_writes_nothing() {
        let store = InMemoryEventStore::new();
        let (owner, agg) = (OwnerId::new(), AggregateId::new());
        store.append(vec![event(owner, agg, "t")], ExpectedVersion::Exact(0)).unwrap();

        let err = store
            .append(vec![event(owner, agg, "t"), event(owner, agg, "t")], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert_eq!(store.load_stream(owner, agg).unwrap().len(), 1);
    }

    #[test]
    fn mixed_owner_batch_is_rejected() {
        let store = InMemoryEventStore::new();
        let agg = AggregateId::new();
        let err = store
            .append(
                vec![event(OwnerId::new(), agg, "t"), event(OwnerId::new(), agg, "t")],
                ExpectedVersion::Exact(0),
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::OwnerIsolation(_)));
    }

    #[test]
    fn streams_are_isolated_by_owner() {
        let store = InMemoryEventStore::new();
        let agg = AggregateId::new();
        let (a, b) = (OwnerId::new(), OwnerId::new());
        store.append(vec![event(a, agg, "t")], ExpectedVersion::Exact(0)).unwrap();
        assert!(store.load_stream(b, agg).unwrap().is_empty());
    }

    #[test]
    fn load_all_filters_by_aggregate_type() {
        let store = InMemoryEventStore::new();
        let owner = OwnerId::new();
        store.append(vec![event(owner, AggregateId::new(), "a")], ExpectedVersion::Exact(0)).unwrap();
        store.append(vec![event(owner, AggregateId::new(), "b")], ExpectedVersion::Exact(0)).unwrap();
        assert_eq!(store.load_all("a").unwrap().len(), 1);
    }
}
