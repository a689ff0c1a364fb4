use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwatch_core::{Aggregate, AggregateId, AggregateRoot, DomainError, OwnerId, UserId};
use stockwatch_events::Event;

use crate::anomaly::{AnomalyId, AnomalyRecord};
use crate::ledger::{ChangeType, LedgerEntry, LedgerEntryId, Movement, MutationSource};
use crate::unit::UnitOfMeasure;

/// Inventory item identifier (owner-scoped via `owner_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(pub AggregateId);

impl InventoryItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InventoryItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for InventoryItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<AggregateId>().map(Self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Active,
    Inactive,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::Inactive => "inactive",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ItemStatus::Active),
            "inactive" => Ok(ItemStatus::Inactive),
            other => Err(DomainError::validation(format!("unknown item status '{other}'"))),
        }
    }
}

/// Aggregate root: InventoryItem.
///
/// Current stock is the fold of the item's ledger; nothing else writes it.
/// `ordered_quantity` is a separate reservation counter moved only by
/// reserve/release.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryItem {
    id: InventoryItemId,
    owner_id: Option<OwnerId>,
    product_id: String,
    unit: UnitOfMeasure,
    stock_quantity: Decimal,
    ordered_quantity: Decimal,
    safety_stock_quantity: Option<Decimal>,
    reorder_point: Option<Decimal>,
    unit_price: Option<Decimal>,
    total_amount: Option<Decimal>,
    status: ItemStatus,
    updated_at: Option<DateTime<Utc>>,
    entries: Vec<LedgerEntry>,
    anomalies: Vec<AnomalyRecord>,
    version: u64,
    created: bool,
}

impl InventoryItem {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: InventoryItemId) -> Self {
        Self {
            id,
            owner_id: None,
            product_id: String::new(),
            unit: UnitOfMeasure::Item,
            stock_quantity: Decimal::ZERO,
            ordered_quantity: Decimal::ZERO,
            safety_stock_quantity: None,
            reorder_point: None,
            unit_price: None,
            total_amount: None,
            status: ItemStatus::Active,
            updated_at: None,
            entries: Vec::new(),
            anomalies: Vec::new(),
            version: 0,
            created: false,
        }
    }

    /// Rebuild state by folding events in order.
    pub fn rehydrate<'a>(id: InventoryItemId, events: impl IntoIterator<Item = &'a InventoryEvent>) -> Self {
        let mut item = Self::empty(id);
        for e in events {
            item.apply(e);
        }
        item
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.id
    }

    pub fn owner_id(&self) -> Option<OwnerId> {
        self.owner_id
    }

    pub fn is_registered(&self) -> bool {
        self.created
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn unit(&self) -> &UnitOfMeasure {
        &self.unit
    }

    pub fn stock_quantity(&self) -> Decimal {
        self.stock_quantity
    }

    pub fn ordered_quantity(&self) -> Decimal {
        self.ordered_quantity
    }

    /// Stock not yet promised to open orders. Display only.
    pub fn available_quantity(&self) -> Decimal {
        self.stock_quantity.saturating_sub(self.ordered_quantity)
    }

    pub fn safety_stock_quantity(&self) -> Option<Decimal> {
        self.safety_stock_quantity
    }

    pub fn reorder_point(&self) -> Option<Decimal> {
        self.reorder_point
    }

    pub fn unit_price(&self) -> Option<Decimal> {
        self.unit_price
    }

    pub fn total_amount(&self) -> Option<Decimal> {
        self.total_amount
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Full ledger, oldest first.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn anomalies(&self) -> &[AnomalyRecord] {
        &self.anomalies
    }

    pub fn anomaly(&self, id: AnomalyId) -> Option<&AnomalyRecord> {
        self.anomalies.iter().find(|a| a.id == id)
    }
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterItem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterItem {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub product_id: String,
    pub unit: UnitOfMeasure,
    pub unit_price: Option<Decimal>,
    pub safety_stock_quantity: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordMutation (one ledger entry).
///
/// `quantity` must be positive for `in`/`out` and is ignored for `adjust`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMutation {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub entry_id: LedgerEntryId,
    pub change_type: ChangeType,
    pub quantity: Decimal,
    pub source: MutationSource,
    pub memo: Option<String>,
    pub unit_price: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateThresholds. `None` clears the explicit value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateThresholds {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub safety_stock_quantity: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub status: ItemStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock (order placed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseReservation (order cancelled, or shipped and booked as `out`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseReservation {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResolveAnomaly (manual acknowledgement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveAnomaly {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub anomaly_id: AnomalyId,
    pub resolved_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InventoryCommand {
    RegisterItem(RegisterItem),
    RecordMutation(RecordMutation),
    UpdateThresholds(UpdateThresholds),
    ChangeStatus(ChangeStatus),
    ReserveStock(ReserveStock),
    ReleaseReservation(ReleaseReservation),
    ResolveAnomaly(ResolveAnomaly),
}

/// Event: ItemRegistered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRegistered {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub product_id: String,
    pub unit: UnitOfMeasure,
    pub unit_price: Option<Decimal>,
    pub safety_stock_quantity: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockMutated. Carries the complete ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMutated {
    pub entry: LedgerEntry,
}

/// Event: AnomalyRecorded (one per detector hit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecorded {
    pub record: AnomalyRecord,
}

/// Event: AnomalyResolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResolved {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub anomaly_id: AnomalyId,
    pub resolved_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ThresholdsUpdated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsUpdated {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub safety_stock_quantity: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemStatusChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStatusChanged {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub status: ItemStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReserved {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationReleased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationReleased {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemRegistered(ItemRegistered),
    StockMutated(StockMutated),
    AnomalyRecorded(AnomalyRecorded),
    AnomalyResolved(AnomalyResolved),
    ThresholdsUpdated(ThresholdsUpdated),
    ItemStatusChanged(ItemStatusChanged),
    StockReserved(StockReserved),
    ReservationReleased(ReservationReleased),
}

impl InventoryEvent {
    /// Owner and item the event belongs to.
    pub fn scope(&self) -> (OwnerId, InventoryItemId) {
        match self {
            InventoryEvent::ItemRegistered(e) => (e.owner_id, e.item_id),
            InventoryEvent::StockMutated(e) => (e.entry.owner_id, e.entry.item_id),
            InventoryEvent::AnomalyRecorded(e) => (e.record.owner_id, e.record.item_id),
            InventoryEvent::AnomalyResolved(e) => (e.owner_id, e.item_id),
            InventoryEvent::ThresholdsUpdated(e) => (e.owner_id, e.item_id),
            InventoryEvent::ItemStatusChanged(e) => (e.owner_id, e.item_id),
            InventoryEvent::StockReserved(e) => (e.owner_id, e.item_id),
            InventoryEvent::ReservationReleased(e) => (e.owner_id, e.item_id),
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemRegistered(_) => "inventory.item.registered",
            InventoryEvent::StockMutated(_) => "inventory.item.stock_mutated",
            InventoryEvent::AnomalyRecorded(_) => "inventory.item.anomaly_recorded",
            InventoryEvent::AnomalyResolved(_) => "inventory.item.anomaly_resolved",
            InventoryEvent::ThresholdsUpdated(_) => "inventory.item.thresholds_updated",
            InventoryEvent::ItemStatusChanged(_) => "inventory.item.status_changed",
            InventoryEvent::StockReserved(_) => "inventory.item.stock_reserved",
            InventoryEvent::ReservationReleased(_) => "inventory.item.reservation_released",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemRegistered(e) => e.occurred_at,
            InventoryEvent::StockMutated(e) => e.entry.occurred_at,
            InventoryEvent::AnomalyRecorded(e) => e.record.detected_at,
            InventoryEvent::AnomalyResolved(e) => e.occurred_at,
            InventoryEvent::ThresholdsUpdated(e) => e.occurred_at,
            InventoryEvent::ItemStatusChanged(e) => e.occurred_at,
            InventoryEvent::StockReserved(e) => e.occurred_at,
            InventoryEvent::ReservationReleased(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemRegistered(e) => {
                self.id = e.item_id;
                self.owner_id = Some(e.owner_id);
                self.product_id = e.product_id.clone();
                self.unit = e.unit.clone();
                self.unit_price = e.unit_price;
                self.safety_stock_quantity = e.safety_stock_quantity;
                self.reorder_point = e.reorder_point;
                self.stock_quantity = Decimal::ZERO;
                self.ordered_quantity = Decimal::ZERO;
                self.total_amount = e.unit_price.map(|_| Decimal::ZERO);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            InventoryEvent::StockMutated(e) => {
                let entry = &e.entry;
                self.stock_quantity = entry.after_quantity;
                if let Some(price) = entry.unit_price {
                    self.unit_price = Some(price);
                }
                self.total_amount = self.unit_price.and_then(|p| p.checked_mul(self.stock_quantity));
                self.updated_at = Some(entry.occurred_at);
                self.entries.push(entry.clone());
            }
            InventoryEvent::AnomalyRecorded(e) => {
                self.anomalies.push(e.record.clone());
            }
            InventoryEvent::AnomalyResolved(e) => {
                if let Some(record) = self.anomalies.iter_mut().find(|a| a.id == e.anomaly_id) {
                    record.resolved_at = Some(e.occurred_at);
                    record.resolved_by = e.resolved_by;
                }
            }
            InventoryEvent::ThresholdsUpdated(e) => {
                self.safety_stock_quantity = e.safety_stock_quantity;
                self.reorder_point = e.reorder_point;
                self.updated_at = Some(e.occurred_at);
            }
            InventoryEvent::ItemStatusChanged(e) => {
                self.status = e.status;
                self.updated_at = Some(e.occurred_at);
            }
            InventoryEvent::StockReserved(e) => {
                self.ordered_quantity += e.quantity;
                self.updated_at = Some(e.occurred_at);
            }
            InventoryEvent::ReservationReleased(e) => {
                self.ordered_quantity -= e.quantity;
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::RegisterItem(cmd) => self.handle_register(cmd),
            InventoryCommand::RecordMutation(cmd) => self.handle_mutation(cmd),
            InventoryCommand::UpdateThresholds(cmd) => self.handle_thresholds(cmd),
            InventoryCommand::ChangeStatus(cmd) => self.handle_status(cmd),
            InventoryCommand::ReserveStock(cmd) => self.handle_reserve(cmd),
            InventoryCommand::ReleaseReservation(cmd) => self.handle_release(cmd),
            InventoryCommand::ResolveAnomaly(cmd) => self.handle_resolve(cmd),
        }
    }
}

impl InventoryItem {
    fn ensure_registered(&self, owner_id: OwnerId, item_id: InventoryItemId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.owner_id != Some(owner_id) {
            return Err(DomainError::invariant("owner mismatch"));
        }
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }
        if cmd.product_id.trim().is_empty() {
            return Err(DomainError::validation("product_id cannot be empty"));
        }
        validate_threshold("safety_stock_quantity", cmd.safety_stock_quantity)?;
        validate_threshold("reorder_point", cmd.reorder_point)?;

        Ok(vec![InventoryEvent::ItemRegistered(ItemRegistered {
            owner_id: cmd.owner_id,
            item_id: cmd.item_id,
            product_id: cmd.product_id.trim().to_string(),
            unit: cmd.unit.clone(),
            unit_price: cmd.unit_price,
            safety_stock_quantity: cmd.safety_stock_quantity,
            reorder_point: cmd.reorder_point,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mutation(&self, cmd: &RecordMutation) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.owner_id, cmd.item_id)?;

        if self.status == ItemStatus::Inactive {
            return Err(DomainError::validation("item is inactive"));
        }
        if cmd.change_type.moves_quantity() && cmd.quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "quantity must be positive for '{}'",
                cmd.change_type.as_str()
            )));
        }

        let quantity = if cmd.change_type.moves_quantity() {
            cmd.quantity
        } else {
            Decimal::ZERO
        };
        let movement = Movement::compute(cmd.change_type, quantity, self.stock_quantity)?;

        let total_amount = match (cmd.total_amount, cmd.unit_price) {
            (Some(total), _) => Some(total),
            (None, Some(price)) if cmd.change_type.moves_quantity() => Some(
                price
                    .checked_mul(quantity)
                    .ok_or_else(|| DomainError::validation("total amount overflow"))?,
            ),
            _ => None,
        };

        let memo = cmd
            .memo
            .as_ref()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        Ok(vec![InventoryEvent::StockMutated(StockMutated {
            entry: LedgerEntry {
                id: cmd.entry_id,
                owner_id: cmd.owner_id,
                item_id: cmd.item_id,
                change_type: cmd.change_type,
                change: movement.change,
                before_quantity: movement.before,
                after_quantity: movement.after,
                unit: self.unit.clone(),
                unit_price: cmd.unit_price,
                total_amount,
                source: cmd.source,
                actor: cmd.actor,
                memo,
                occurred_at: cmd.occurred_at,
                is_anomaly: false,
                anomaly_type: None,
                anomaly_score: None,
            },
        })])
    }

    fn handle_thresholds(&self, cmd: &UpdateThresholds) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.owner_id, cmd.item_id)?;
        validate_threshold("safety_stock_quantity", cmd.safety_stock_quantity)?;
        validate_threshold("reorder_point", cmd.reorder_point)?;

        if cmd.safety_stock_quantity == self.safety_stock_quantity && cmd.reorder_point == self.reorder_point {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::ThresholdsUpdated(ThresholdsUpdated {
            owner_id: cmd.owner_id,
            item_id: cmd.item_id,
            safety_stock_quantity: cmd.safety_stock_quantity,
            reorder_point: cmd.reorder_point,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_status(&self, cmd: &ChangeStatus) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.owner_id, cmd.item_id)?;
        if cmd.status == self.status {
            return Ok(vec![]);
        }
        Ok(vec![InventoryEvent::ItemStatusChanged(ItemStatusChanged {
            owner_id: cmd.owner_id,
            item_id: cmd.item_id,
            status: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.owner_id, cmd.item_id)?;
        if cmd.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("reservation quantity must be positive"));
        }
        if self.ordered_quantity.checked_add(cmd.quantity).is_none() {
            return Err(DomainError::validation("reservation overflow"));
        }
        Ok(vec![InventoryEvent::StockReserved(StockReserved {
            owner_id: cmd.owner_id,
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseReservation) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.owner_id, cmd.item_id)?;
        if cmd.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("release quantity must be positive"));
        }
        if cmd.quantity > self.ordered_quantity {
            return Err(DomainError::validation(format!(
                "cannot release {} (only {} reserved)",
                cmd.quantity, self.ordered_quantity
            )));
        }
        Ok(vec![InventoryEvent::ReservationReleased(ReservationReleased {
            owner_id: cmd.owner_id,
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_resolve(&self, cmd: &ResolveAnomaly) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.owner_id, cmd.item_id)?;
        let record = self.anomaly(cmd.anomaly_id).ok_or_else(DomainError::not_found)?;
        if record.is_resolved() {
            return Err(DomainError::conflict("anomaly already resolved"));
        }
        Ok(vec![InventoryEvent::AnomalyResolved(AnomalyResolved {
            owner_id: cmd.owner_id,
            item_id: cmd.item_id,
            anomaly_id: cmd.anomaly_id,
            resolved_by: cmd.resolved_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn validate_threshold(name: &str, value: Option<Decimal>) -> Result<(), DomainError> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(DomainError::validation(format!("{name} cannot be negative"))),
        _ => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn mutation(item: &InventoryItem, change_type: ChangeType, quantity: Decimal) -> RecordMutation {
        RecordMutation {
            owner_id: item.owner_id().unwrap(),
            item_id: item.id_typed(),
            entry_id: LedgerEntryId::new(),
            change_type,
            quantity,
            source: MutationSource::Manual,
            memo: None,
            unit_price: None,
            total_amount: None,
            actor: None,
            occurred_at: t0(),
        }
    }

    fn record(item: &mut InventoryItem, cmd: RecordMutation) -> LedgerEntry {
        let events = item.handle(&InventoryCommand::RecordMutation(cmd)).unwrap();
        events.iter().for_each(|e| item.apply(e));
        match &events[0] {
            InventoryEvent::StockMutated(e) => e.entry.clone(),
            other => panic!("Expected StockMutated, got {other:?}"),
        }
    }

    #[test]
    fn register_rejects_blank_product_and_duplicates() {
        let item = item_with(UnitOfMeasure::Box, Decimal::ZERO, None, None);
        let cmd = RegisterItem {
            owner_id: item.owner_id().unwrap(),
            item_id: item.id_typed(),
            product_id: "mackerel".into(),
            unit: UnitOfMeasure::Box,
            unit_price: None,
            safety_stock_quantity: None,
            reorder_point: None,
            occurred_at: t0(),
        };
        let err = item.handle(&InventoryCommand::RegisterItem(cmd.clone())).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let fresh = InventoryItem::empty(InventoryItemId::new(AggregateId::new()));
        let blank = RegisterItem {
            product_id: "  ".into(),
            ..cmd
        };
        let err = fresh.handle(&InventoryCommand::RegisterItem(blank)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn mutation_on_unregistered_item_is_not_found() {
        let item = InventoryItem::empty(InventoryItemId::new(AggregateId::new()));
        let cmd = RecordMutation {
            owner_id: OwnerId::new(),
            item_id: item.id_typed(),
            entry_id: LedgerEntryId::new(),
            change_type: ChangeType::In,
            quantity: dec!(1),
            source: MutationSource::Manual,
            memo: None,
            unit_price: None,
            total_amount: None,
            actor: None,
            occurred_at: t0(),
        };
        let err = item.handle(&InventoryCommand::RecordMutation(cmd)).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn non_positive_quantity_is_rejected_for_in_and_out() {
        let item = item_with(UnitOfMeasure::Box, dec!(10), None, None);
        for change_type in [ChangeType::In, ChangeType::Out] {
            for q in [dec!(0), dec!(-3)] {
                let err = item
                    .handle(&InventoryCommand::RecordMutation(mutation(&item, change_type, q)))
                    .unwrap_err();
                assert!(matches!(err, DomainError::Validation(_)));
            }
        }
    }

    #[test]
    fn adjust_ignores_quantity_and_updates_price() {
        let mut item = item_with(UnitOfMeasure::Box, dec!(10), None, None);
        let mut cmd = mutation(&item, ChangeType::Adjust, dec!(0));
        cmd.unit_price = Some(dec!(1200));
        let entry = record(&mut item, cmd);

        assert_eq!(entry.change, dec!(0));
        assert_eq!(entry.before_quantity, dec!(10));
        assert_eq!(entry.after_quantity, dec!(10));
        assert_eq!(entry.total_amount, None);
        assert_eq!(item.unit_price(), Some(dec!(1200)));
        assert_eq!(item.total_amount(), Some(dec!(12000)));
    }

    #[test]
    fn out_below_zero_is_recorded_not_clamped() {
        let mut item = item_with(UnitOfMeasure::Box, dec!(3), None, None);
        let cmd = mutation(&item, ChangeType::Out, dec!(5));
        let entry = record(&mut item, cmd);
        assert_eq!(entry.after_quantity, dec!(-2));
        assert_eq!(item.stock_quantity(), dec!(-2));
    }

    #[test]
    fn total_amount_defaults_to_price_times_quantity() {
        let mut item = item_with(UnitOfMeasure::Box, dec!(10), None, None);
        let mut cmd = mutation(&item, ChangeType::In, dec!(4));
        cmd.unit_price = Some(dec!(2500));
        let entry = record(&mut item, cmd);
        assert_eq!(entry.total_amount, Some(dec!(10000)));

        let mut cmd = mutation(&item, ChangeType::In, dec!(4));
        cmd.unit_price = Some(dec!(2500));
        cmd.total_amount = Some(dec!(9000));
        let entry = record(&mut item, cmd);
        assert_eq!(entry.total_amount, Some(dec!(9000)));
    }

    #[test]
    fn inactive_item_rejects_mutations() {
        let mut item = item_with(UnitOfMeasure::Box, dec!(10), None, None);
        let events = item
            .handle(&InventoryCommand::ChangeStatus(ChangeStatus {
                owner_id: item.owner_id().unwrap(),
                item_id: item.id_typed(),
                status: ItemStatus::Inactive,
                occurred_at: t0(),
            }))
            .unwrap();
        events.iter().for_each(|e| item.apply(e));

        let err = item
            .handle(&InventoryCommand::RecordMutation(mutation(&item, ChangeType::In, dec!(1))))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn reservations_move_only_ordered_quantity() {
        let mut item = item_with(UnitOfMeasure::Box, dec!(10), None, None);
        let owner_id = item.owner_id().unwrap();
        let item_id = item.id_typed();

        let events = item
            .handle(&InventoryCommand::ReserveStock(ReserveStock {
                owner_id,
                item_id,
                quantity: dec!(4),
                occurred_at: t0(),
            }))
            .unwrap();
        events.iter().for_each(|e| item.apply(e));
        assert_eq!(item.ordered_quantity(), dec!(4));
        assert_eq!(item.stock_quantity(), dec!(10));
        assert_eq!(item.available_quantity(), dec!(6));

        let err = item
            .handle(&InventoryCommand::ReleaseReservation(ReleaseReservation {
                owner_id,
                item_id,
                quantity: dec!(5),
                occurred_at: t0(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let events = item
            .handle(&InventoryCommand::ReleaseReservation(ReleaseReservation {
                owner_id,
                item_id,
                quantity: dec!(4),
                occurred_at: t0(),
            }))
            .unwrap();
        events.iter().for_each(|e| item.apply(e));
        assert_eq!(item.ordered_quantity(), dec!(0));
    }

    #[test]
    fn threshold_update_is_noop_when_unchanged() {
        let item = item_with(UnitOfMeasure::Box, dec!(10), Some(dec!(5)), None);
        let events = item
            .handle(&InventoryCommand::UpdateThresholds(UpdateThresholds {
                owner_id: item.owner_id().unwrap(),
                item_id: item.id_typed(),
                safety_stock_quantity: Some(dec!(5)),
                reorder_point: None,
                occurred_at: t0(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: every recorded entry balances (`after - before == change`)
        /// and the item's stock equals the last entry's `after_quantity`.
        #[test]
        fn ledger_entries_always_balance(
            steps in prop::collection::vec((0u8..3, 1i64..100_000, 0u32..3), 1..30)
        ) {
            let mut item = item_with(UnitOfMeasure::Kg, Decimal::ZERO, None, None);

            for (kind, mantissa, scale) in steps {
                let change_type = match kind {
                    0 => ChangeType::In,
                    1 => ChangeType::Out,
                    _ => ChangeType::Adjust,
                };
                let quantity = Decimal::new(mantissa, scale);
                let before = item.stock_quantity();
                let cmd = mutation(&item, change_type, quantity);
                let entry = record(&mut item, cmd);

                prop_assert!(entry.is_balanced());
                prop_assert_eq!(entry.before_quantity, before);
                let expected = match change_type {
                    ChangeType::In => quantity,
                    ChangeType::Out => -quantity,
                    ChangeType::Adjust => Decimal::ZERO,
                };
                prop_assert_eq!(entry.change, expected);
                prop_assert_eq!(item.stock_quantity(), entry.after_quantity);
            }
        }
    }
}
