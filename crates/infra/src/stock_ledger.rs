//! Stock ledger service.
//!
//! Runs every operation on an item as one unit against the item's event
//! stream:
//!
//! ```text
//! lock item
//!   ↓
//! 1. load stream (owner-scoped) and validate ordering
//!   ↓
//! 2. rehydrate InventoryItem
//!   ↓
//! 3. decide events (for mutations: ledger entry, detectors, grouping, stamp)
//!   ↓
//! 4. append the whole batch with ExpectedVersion::Exact
//!   ↓
//! 5. fold committed envelopes into the read models
//! ```
//!
//! The stream is the only source of truth. A mutation, its stamp and every
//! anomaly record land in one append, so either all of them exist or none do.
//! Detection reads prior ledger entries under the same lock, so two identical
//! submissions racing each other still see one another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use stockwatch_core::{Aggregate, AggregateId, Clock, DomainError, ExpectedVersion, OwnerId, UserId};
use stockwatch_events::EventEnvelope;
use stockwatch_detection::{AnomalyAggregator, DetectionConfig, DetectionContext, DetectorSet, GroupedAnomalies};
use stockwatch_inventory::{
    AnomalyId, AnomalyRecord, AnomalyRecorded, ChangeStatus, ChangeType, InventoryCommand, InventoryEvent,
    InventoryItem, InventoryItemId, ItemStatus, LedgerEntry, LedgerEntryId, MutationSource, RecordMutation,
    RegisterItem, ReleaseReservation, ReserveStock, ResolveAnomaly, SafetyThreshold, StockMutated,
    UnitOfMeasure, UpdateThresholds,
};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
use crate::projections::{
    replay_order, AnomalyProjection, AnomalyQuery, AnomalyScope, AnomalySummary, InventoryItemView,
    InventoryStockProjection,
};
use crate::read_model::InMemoryOwnerStore;

/// Aggregate type tag on every inventory item stream.
pub const INVENTORY_ITEM: &str = "inventory.item";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    /// Another writer moved the stream and retries ran out.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    #[error("owner isolation violation: {0}")]
    OwnerIsolation(String),

    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error("event store failure: {0}")]
    Store(EventStoreError),
}

impl LedgerError {
    /// Whether the whole operation can be retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Concurrency(_) | LedgerError::Store(EventStoreError::Backend(_))
        )
    }
}

impl From<EventStoreError> for LedgerError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => LedgerError::Concurrency(msg),
            EventStoreError::OwnerIsolation(msg) => LedgerError::OwnerIsolation(msg),
            other => LedgerError::Store(other),
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => LedgerError::Validation(msg),
            DomainError::InvalidId(msg) => LedgerError::Validation(msg),
            DomainError::InvariantViolation(msg) => LedgerError::Validation(msg),
            DomainError::NotFound => LedgerError::NotFound,
            DomainError::Conflict(msg) => LedgerError::Conflict(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockLedgerConfig {
    /// Reload-and-retry attempts after an optimistic concurrency conflict.
    pub max_retries: u32,
}

impl Default for StockLedgerConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterItemRequest {
    pub product_id: String,
    pub unit: UnitOfMeasure,
    pub unit_price: Option<Decimal>,
    pub safety_stock_quantity: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    pub status: ItemStatus,
}

impl RegisterItemRequest {
    pub fn new(product_id: impl Into<String>, unit: UnitOfMeasure) -> Self {
        Self {
            product_id: product_id.into(),
            unit,
            unit_price: None,
            safety_stock_quantity: None,
            reorder_point: None,
            status: ItemStatus::Active,
        }
    }
}

/// Input to [`StockLedger::append_mutation`].
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub change_type: ChangeType,
    /// Must be positive for `in`/`out`; ignored for `adjust`.
    pub quantity: Decimal,
    pub source: MutationSource,
    pub memo: Option<String>,
    pub unit_price: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub actor: Option<UserId>,
}

impl MutationRequest {
    pub fn new(change_type: ChangeType, quantity: Decimal) -> Self {
        Self {
            change_type,
            quantity,
            source: MutationSource::Manual,
            memo: None,
            unit_price: None,
            total_amount: None,
            actor: None,
        }
    }
}

/// The written entry, every anomaly record it produced, and the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub entry: LedgerEntry,
    /// Primary first, then secondary in rank order.
    pub anomalies: Vec<AnomalyRecord>,
    pub grouping: Option<GroupedAnomalies>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LedgerFilter {
    pub change_type: Option<ChangeType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub anomalies_only: bool,
    pub limit: Option<usize>,
}

impl LedgerFilter {
    fn matches(&self, entry: &LedgerEntry) -> bool {
        self.change_type.is_none_or(|t| t == entry.change_type)
            && self.since.is_none_or(|s| entry.occurred_at >= s)
            && self.until.is_none_or(|u| entry.occurred_at <= u)
            && (!self.anomalies_only || entry.is_anomaly)
    }
}

pub type ItemViews = InventoryStockProjection<InMemoryOwnerStore<InventoryItemId, InventoryItemView>>;
pub type AnomalyViews = AnomalyProjection<InMemoryOwnerStore<AnomalyId, AnomalyRecord>>;

type ItemKey = (OwnerId, InventoryItemId);

pub struct StockLedger<S> {
    store: S,
    clock: Arc<dyn Clock>,
    detection: DetectionConfig,
    detectors: DetectorSet,
    config: StockLedgerConfig,
    items: ItemViews,
    anomalies: AnomalyViews,
    locks: Mutex<HashMap<ItemKey, Arc<Mutex<()>>>>,
    registry: Mutex<()>,
    /// Commits hold it shared; a read-model rebuild holds it exclusively.
    rebuild_gate: RwLock<()>,
}

impl<S> std::fmt::Debug for StockLedger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger")
            .field("detectors", &self.detectors)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn read<T>(gate: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match gate.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write<T>(gate: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match gate.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl<S> StockLedger<S>
where
    S: EventStore,
{
    pub fn new(store: S, clock: Arc<dyn Clock>, detection: DetectionConfig) -> Self {
        Self {
            store,
            clock,
            detection,
            detectors: DetectorSet::default(),
            config: StockLedgerConfig::default(),
            items: InventoryStockProjection::new(InMemoryOwnerStore::new()),
            anomalies: AnomalyProjection::new(InMemoryOwnerStore::new()),
            locks: Mutex::new(HashMap::new()),
            registry: Mutex::new(()),
            rebuild_gate: RwLock::new(()),
        }
    }

    pub fn with_config(mut self, config: StockLedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_detectors(mut self, detectors: DetectorSet) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn detection_config(&self) -> &DetectionConfig {
        &self.detection
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ---- commands ----------------------------------------------------------

    /// Create an item with zero stock. `(owner, product_id)` is unique.
    #[instrument(skip(self, request), fields(owner = %owner_id, product = %request.product_id))]
    pub fn register_item(
        &self,
        owner_id: OwnerId,
        request: RegisterItemRequest,
    ) -> Result<InventoryItemView, LedgerError> {
        let _registry = lock(&self.registry);

        let product_id = request.product_id.trim();
        if let Some(existing) = self.items.find_by_product(owner_id, product_id) {
            return Err(LedgerError::Conflict(format!(
                "product '{product_id}' is already registered as item {}",
                existing.item_id
            )));
        }

        let item_id = InventoryItemId::new(AggregateId::new());
        let view = self.execute(owner_id, item_id, |item, now| {
            let mut events = item.handle(&InventoryCommand::RegisterItem(RegisterItem {
                owner_id,
                item_id,
                product_id: product_id.to_string(),
                unit: request.unit.clone(),
                unit_price: request.unit_price,
                safety_stock_quantity: request.safety_stock_quantity,
                reorder_point: request.reorder_point,
                occurred_at: now,
            }))?;

            let registered = fold(item, &events);
            events.extend(registered.handle(&InventoryCommand::ChangeStatus(ChangeStatus {
                owner_id,
                item_id,
                status: request.status,
                occurred_at: now,
            }))?);

            let view = InventoryItemView::from_item(owner_id, &fold(item, &events));
            Ok((events, view))
        })?;

        info!(item = %item_id, unit = %view.unit, "item registered");
        Ok(view)
    }

    /// Record one stock mutation and run detection over it.
    #[instrument(
        skip(self, request),
        fields(owner = %owner_id, item = %item_id, change_type = request.change_type.as_str())
    )]
    pub fn append_mutation(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
        request: MutationRequest,
    ) -> Result<MutationOutcome, LedgerError> {
        let outcome = self.execute(owner_id, item_id, |item, now| {
            let decided = item.handle(&InventoryCommand::RecordMutation(RecordMutation {
                owner_id,
                item_id,
                entry_id: LedgerEntryId::new(),
                change_type: request.change_type,
                quantity: request.quantity,
                source: request.source,
                memo: request.memo.clone(),
                unit_price: request.unit_price,
                total_amount: request.total_amount,
                actor: request.actor,
                occurred_at: now,
            }))?;

            let Some(mut entry) = decided.iter().find_map(|e| match e {
                InventoryEvent::StockMutated(m) => Some(m.entry.clone()),
                _ => None,
            }) else {
                return Err(LedgerError::Validation("mutation produced no ledger entry".to_string()));
            };

            let after = fold(item, &decided);
            let candidates = self.detectors.evaluate(&DetectionContext {
                entry: &entry,
                item: &after,
                history: item.entries(),
                config: &self.detection,
            });
            let grouping = AnomalyAggregator::smart_group(candidates);

            let mut anomalies = Vec::new();
            if let Some(grouped) = &grouping {
                entry.stamp(grouped.primary.anomaly_type, grouped.primary.confidence);
                anomalies = grouped
                    .iter()
                    .map(|c| AnomalyRecord {
                        id: AnomalyId::new(),
                        owner_id,
                        item_id,
                        entry_id: entry.id,
                        anomaly_type: c.anomaly_type,
                        severity: c.severity,
                        confidence: c.confidence,
                        description: c.description.clone(),
                        recommended_action: c.recommended_action.clone(),
                        detector_version: c.detector_version.clone(),
                        detected_at: now,
                        resolved_at: None,
                        resolved_by: None,
                    })
                    .collect();
            }

            let mut events = Vec::with_capacity(1 + anomalies.len());
            events.push(InventoryEvent::StockMutated(StockMutated { entry: entry.clone() }));
            events.extend(
                anomalies
                    .iter()
                    .cloned()
                    .map(|record| InventoryEvent::AnomalyRecorded(AnomalyRecorded { record })),
            );

            Ok((events, MutationOutcome { entry, anomalies, grouping }))
        })?;

        let entry = &outcome.entry;
        info!(
            entry = %entry.id,
            change = %entry.change,
            before = %entry.before_quantity,
            after = %entry.after_quantity,
            anomalies = outcome.anomalies.len(),
            "stock mutation recorded"
        );
        if let Some(grouped) = &outcome.grouping {
            warn!(
                entry = %entry.id,
                primary = grouped.primary.anomaly_type.as_str(),
                severity = grouped.primary.severity.as_str(),
                total = grouped.total_count,
                "anomaly detected"
            );
        }
        Ok(outcome)
    }

    /// Demand recorded elsewhere (order placed). Moves `ordered_quantity` only.
    pub fn reserve(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
        quantity: Decimal,
    ) -> Result<InventoryItemView, LedgerError> {
        self.update(owner_id, item_id, |now| {
            InventoryCommand::ReserveStock(ReserveStock {
                owner_id,
                item_id,
                quantity,
                occurred_at: now,
            })
        })
    }

    /// Order cancelled, or its shipment booked as an `out`.
    pub fn release_reservation(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
        quantity: Decimal,
    ) -> Result<InventoryItemView, LedgerError> {
        self.update(owner_id, item_id, |now| {
            InventoryCommand::ReleaseReservation(ReleaseReservation {
                owner_id,
                item_id,
                quantity,
                occurred_at: now,
            })
        })
    }

    /// Set or clear the explicit thresholds.
    pub fn update_thresholds(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
        safety_stock_quantity: Option<Decimal>,
        reorder_point: Option<Decimal>,
    ) -> Result<InventoryItemView, LedgerError> {
        self.update(owner_id, item_id, |now| {
            InventoryCommand::UpdateThresholds(UpdateThresholds {
                owner_id,
                item_id,
                safety_stock_quantity,
                reorder_point,
                occurred_at: now,
            })
        })
    }

    pub fn change_status(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
        status: ItemStatus,
    ) -> Result<InventoryItemView, LedgerError> {
        self.update(owner_id, item_id, |now| {
            InventoryCommand::ChangeStatus(ChangeStatus {
                owner_id,
                item_id,
                status,
                occurred_at: now,
            })
        })
    }

    /// Mark an anomaly resolved. One-way: a second acknowledgement is a conflict.
    #[instrument(skip(self), fields(owner = %owner_id, anomaly = %anomaly_id))]
    pub fn acknowledge_anomaly(
        &self,
        owner_id: OwnerId,
        anomaly_id: AnomalyId,
        actor: Option<UserId>,
    ) -> Result<AnomalyRecord, LedgerError> {
        let record = self.anomalies.get(owner_id, &anomaly_id).ok_or(LedgerError::NotFound)?;

        let resolved = self.execute(owner_id, record.item_id, |item, now| {
            let events = item.handle(&InventoryCommand::ResolveAnomaly(ResolveAnomaly {
                owner_id,
                item_id: record.item_id,
                anomaly_id,
                resolved_by: actor,
                occurred_at: now,
            }))?;
            let resolved = fold(item, &events).anomaly(anomaly_id).cloned().ok_or(LedgerError::NotFound)?;
            Ok((events, resolved))
        })?;

        info!(item = %resolved.item_id, anomaly_type = resolved.anomaly_type.as_str(), "anomaly acknowledged");
        Ok(resolved)
    }

    // ---- queries -----------------------------------------------------------

    pub fn get_item(&self, owner_id: OwnerId, item_id: InventoryItemId) -> Result<InventoryItemView, LedgerError> {
        self.items.get(owner_id, &item_id).ok_or(LedgerError::NotFound)
    }

    pub fn list_items(&self, owner_id: OwnerId) -> Vec<InventoryItemView> {
        self.items.list(owner_id)
    }

    /// Current low-stock threshold, for display.
    pub fn compute_safety_threshold(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
    ) -> Result<SafetyThreshold, LedgerError> {
        let (item, _) = self.load(owner_id, item_id)?;
        ensure_registered(&item)?;
        Ok(self.detection.safety_stock.compute_threshold(&item))
    }

    /// Ledger entries, newest first.
    pub fn ledger_history(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let (item, _) = self.load(owner_id, item_id)?;
        ensure_registered(&item)?;

        let entries = item
            .entries()
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(entries)
    }

    pub fn list_unresolved_anomalies(
        &self,
        owner_id: OwnerId,
        query: &AnomalyQuery,
    ) -> Result<Vec<AnomalyRecord>, LedgerError> {
        if let AnomalyScope::Item(item_id) = query.scope {
            if self.items.get(owner_id, &item_id).is_none() {
                return Err(LedgerError::NotFound);
            }
        }
        Ok(self.anomalies.list_unresolved(owner_id, query))
    }

    pub fn anomaly_summary(&self, owner_id: OwnerId) -> AnomalySummary {
        self.anomalies.summary(owner_id)
    }

    /// Rebuild both read models from the event store. Returns the number of
    /// events replayed.
    ///
    /// Commits through this ledger wait for the rebuild. Events appended to the
    /// store by other writers meanwhile are picked up by a catch-up pass.
    pub fn rebuild_read_models(&self) -> Result<usize, LedgerError> {
        let _gate = write(&self.rebuild_gate);

        let events = self.store.load_all(INVENTORY_ITEM)?;
        let count = events.len();
        let envelopes: Vec<_> = events.iter().map(StoredEvent::to_envelope).collect();

        self.items
            .rebuild_from_scratch(envelopes.clone())
            .map_err(|e| LedgerError::Deserialize(e.to_string()))?;
        self.anomalies
            .rebuild_from_scratch(envelopes)
            .map_err(|e| LedgerError::Deserialize(e.to_string()))?;

        let mut tail: Vec<_> = self
            .store
            .load_all(INVENTORY_ITEM)?
            .iter()
            .map(StoredEvent::to_envelope)
            .collect();
        replay_order(&mut tail);
        for envelope in &tail {
            self.project(envelope)?;
        }

        info!(events = count, caught_up = tail.len().saturating_sub(count), "read models rebuilt");
        Ok(count)
    }

    // ---- pipeline ----------------------------------------------------------

    /// Single-command update returning the resulting item view.
    fn update(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
        command: impl Fn(DateTime<Utc>) -> InventoryCommand,
    ) -> Result<InventoryItemView, LedgerError> {
        self.execute(owner_id, item_id, |item, now| {
            let events = item.handle(&command(now))?;
            let view = InventoryItemView::from_item(owner_id, &fold(item, &events));
            Ok((events, view))
        })
    }

    /// Lock the item, then load → decide → append, retrying on conflict.
    ///
    /// `decide` may run more than once; it must derive everything from the
    /// item and timestamp it is given.
    fn execute<T>(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
        mut decide: impl FnMut(&InventoryItem, DateTime<Utc>) -> Result<(Vec<InventoryEvent>, T), LedgerError>,
    ) -> Result<T, LedgerError> {
        let key = (owner_id, item_id);
        let item_lock = self.item_lock(key);
        let result = {
            let _guard = lock(&item_lock);
            self.run_locked(owner_id, item_id, &mut decide)
        };
        self.release_item_lock(key, item_lock);
        result
    }

    fn run_locked<T>(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
        decide: &mut impl FnMut(&InventoryItem, DateTime<Utc>) -> Result<(Vec<InventoryEvent>, T), LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut attempt = 0u32;
        loop {
            let (item, version) = self.load(owner_id, item_id)?;
            let (events, out) = decide(&item, self.clock.now())?;
            if events.is_empty() {
                return Ok(out);
            }

            match self.commit(owner_id, item_id, version, &events) {
                Ok(()) => return Ok(out),
                Err(LedgerError::Concurrency(msg)) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(owner = %owner_id, item = %item_id, attempt, %msg, "stream moved, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn item_lock(&self, key: ItemKey) -> Arc<Mutex<()>> {
        lock(&self.locks).entry(key).or_default().clone()
    }

    /// Drop the table entry once no other caller holds or waits on it.
    fn release_item_lock(&self, key: ItemKey, item_lock: Arc<Mutex<()>>) {
        let mut locks = lock(&self.locks);
        // One reference in the table, one here.
        if Arc::strong_count(&item_lock) == 2 {
            locks.remove(&key);
        }
    }

    #[cfg(test)]
    pub(crate) fn lock_table_len(&self) -> usize {
        lock(&self.locks).len()
    }

    fn load(&self, owner_id: OwnerId, item_id: InventoryItemId) -> Result<(InventoryItem, u64), LedgerError> {
        let history = self.store.load_stream(owner_id, item_id.0)?;
        validate_loaded_stream(owner_id, item_id.0, &history)?;
        let version = history.last().map(|e| e.sequence_number).unwrap_or(0);

        let events = history
            .into_iter()
            .map(|stored| {
                serde_json::from_value::<InventoryEvent>(stored.payload)
                    .map_err(|e| LedgerError::Deserialize(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((InventoryItem::rehydrate(item_id, &events), version))
    }

    fn commit(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
        version: u64,
        events: &[InventoryEvent],
    ) -> Result<(), LedgerError> {
        let uncommitted = events
            .iter()
            .map(|ev| UncommittedEvent::from_typed(owner_id, item_id.0, INVENTORY_ITEM, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let _gate = read(&self.rebuild_gate);
        let committed = self.store.append(uncommitted, ExpectedVersion::Exact(version))?;
        debug!(owner = %owner_id, item = %item_id, events = committed.len(), "events committed");

        // Read models are disposable; a failure here never fails the commit.
        for stored in &committed {
            if let Err(e) = self.project(&stored.to_envelope()) {
                warn!(owner = %owner_id, item = %item_id, error = %e, "read models behind the stream, resyncing");
                if let Err(e) = self.resync_stream(owner_id, item_id) {
                    error!(owner = %owner_id, item = %item_id, error = %e, "read model resync failed");
                }
                break;
            }
        }
        Ok(())
    }

    fn project(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), LedgerError> {
        self.items
            .apply_envelope(envelope)
            .map_err(|e| LedgerError::Deserialize(format!("item projection: {e}")))?;
        self.anomalies
            .apply_envelope(envelope)
            .map_err(|e| LedgerError::Deserialize(format!("anomaly projection: {e}")))
    }

    /// Replay one stream in order; envelopes already applied are skipped.
    fn resync_stream(&self, owner_id: OwnerId, item_id: InventoryItemId) -> Result<(), LedgerError> {
        for stored in self.store.load_stream(owner_id, item_id.0)? {
            self.project(&stored.to_envelope())?;
        }
        Ok(())
    }
}

/// State after applying `events` to a copy of `item`.
fn fold(item: &InventoryItem, events: &[InventoryEvent]) -> InventoryItem {
    let mut next = item.clone();
    events.iter().for_each(|e| next.apply(e));
    next
}

fn ensure_registered(item: &InventoryItem) -> Result<(), LedgerError> {
    if item.is_registered() {
        Ok(())
    } else {
        Err(LedgerError::NotFound)
    }
}

fn validate_loaded_stream(
    owner_id: OwnerId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), LedgerError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.owner_id != owner_id {
            return Err(LedgerError::OwnerIsolation(format!(
                "loaded stream contains wrong owner_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(LedgerError::OwnerIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(LedgerError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}
