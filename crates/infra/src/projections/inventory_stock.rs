use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockwatch_core::OwnerId;
use stockwatch_events::EventEnvelope;
use stockwatch_inventory::{InventoryEvent, InventoryItem, InventoryItemId, ItemStatus, UnitOfMeasure};

use super::{replay_order, ProjectionError, StreamCursors};
use crate::read_model::OwnerStore;

/// Current state of one item, as served to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItemView {
    pub item_id: InventoryItemId,
    pub owner_id: OwnerId,
    pub product_id: String,
    pub unit: UnitOfMeasure,
    pub stock_quantity: Decimal,
    pub ordered_quantity: Decimal,
    /// `stock_quantity - ordered_quantity`, display only.
    pub available_quantity: Decimal,
    pub safety_stock_quantity: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub status: ItemStatus,
    pub entry_count: u64,
    pub unresolved_anomalies: u64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItemView {
    /// Snapshot straight from aggregate state.
    pub fn from_item(owner_id: OwnerId, item: &InventoryItem) -> Self {
        Self {
            item_id: item.id_typed(),
            owner_id,
            product_id: item.product_id().to_string(),
            unit: item.unit().clone(),
            stock_quantity: item.stock_quantity(),
            ordered_quantity: item.ordered_quantity(),
            available_quantity: item.available_quantity(),
            safety_stock_quantity: item.safety_stock_quantity(),
            reorder_point: item.reorder_point(),
            unit_price: item.unit_price(),
            total_amount: item.total_amount(),
            status: item.status(),
            entry_count: item.entries().len() as u64,
            unresolved_anomalies: item.anomalies().iter().filter(|a| !a.is_resolved()).count() as u64,
            updated_at: item.updated_at().unwrap_or_default(),
        }
    }

    fn refresh_derived(&mut self) {
        self.available_quantity = self.stock_quantity.saturating_sub(self.ordered_quantity);
        self.total_amount = self.unit_price.and_then(|p| p.checked_mul(self.stock_quantity));
    }
}

/// Item state read model.
#[derive(Debug)]
pub struct InventoryStockProjection<S>
where
    S: OwnerStore<InventoryItemId, InventoryItemView>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> InventoryStockProjection<S>
where
    S: OwnerStore<InventoryItemId, InventoryItemView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::default(),
        }
    }

    pub fn get(&self, owner_id: OwnerId, item_id: &InventoryItemId) -> Option<InventoryItemView> {
        self.store.get(owner_id, item_id)
    }

    /// All items of an owner, ordered by product id.
    pub fn list(&self, owner_id: OwnerId) -> Vec<InventoryItemView> {
        let mut items = self.store.list(owner_id);
        items.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        items
    }

    pub fn find_by_product(&self, owner_id: OwnerId, product_id: &str) -> Option<InventoryItemView> {
        self.store
            .list(owner_id)
            .into_iter()
            .find(|v| v.product_id == product_id)
    }

    /// Fold one committed envelope into the read model. Replays are ignored.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let owner_id = envelope.owner_id();
        self.cursors.apply(envelope, |event| {
            self.fold(owner_id, event);
            Ok(())
        })
    }

    /// Clear everything and replay the given envelopes.
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

    fn fold(&self, owner_id: OwnerId, event: InventoryEvent) {
        if let InventoryEvent::ItemRegistered(e) = &event {
            let mut view = InventoryItemView {
                item_id: e.item_id,
                owner_id,
                product_id: e.product_id.clone(),
                unit: e.unit.clone(),
                stock_quantity: Decimal::ZERO,
                ordered_quantity: Decimal::ZERO,
                available_quantity: Decimal::ZERO,
                safety_stock_quantity: e.safety_stock_quantity,
                reorder_point: e.reorder_point,
                unit_price: e.unit_price,
                total_amount: None,
                status: ItemStatus::Active,
                entry_count: 0,
                unresolved_anomalies: 0,
                updated_at: e.occurred_at,
            };
            view.refresh_derived();
            self.store.upsert(owner_id, e.item_id, view);
            return;
        }

        let (_, item_id) = event.scope();
        // Events for an item whose registration was never seen are dropped.
        let Some(mut view) = self.store.get(owner_id, &item_id) else {
            return;
        };

        match event {
            InventoryEvent::ItemRegistered(_) => {}
            InventoryEvent::StockMutated(e) => {
                view.stock_quantity = e.entry.after_quantity;
                if let Some(price) = e.entry.unit_price {
                    view.unit_price = Some(price);
                }
                view.entry_count += 1;
                view.updated_at = e.entry.occurred_at;
            }
            InventoryEvent::AnomalyRecorded(_) => {
                view.unresolved_anomalies += 1;
            }
            InventoryEvent::AnomalyResolved(_) => {
                view.unresolved_anomalies = view.unresolved_anomalies.saturating_sub(1);
            }
            InventoryEvent::ThresholdsUpdated(e) => {
                view.safety_stock_quantity = e.safety_stock_quantity;
                view.reorder_point = e.reorder_point;
                view.updated_at = e.occurred_at;
            }
            InventoryEvent::ItemStatusChanged(e) => {
                view.status = e.status;
                view.updated_at = e.occurred_at;
            }
            InventoryEvent::StockReserved(e) => {
                view.ordered_quantity = view.ordered_quantity.saturating_add(e.quantity);
                view.updated_at = e.occurred_at;
            }
            InventoryEvent::ReservationReleased(e) => {
                view.ordered_quantity = view.ordered_quantity.saturating_sub(e.quantity);
                view.updated_at = e.occurred_at;
            }
        }

        view.refresh_derived();
        self.store.upsert(owner_id, item_id, view);
    }
}
