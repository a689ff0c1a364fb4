//! Inventory domain module (event-sourced).
//!
//! Business rules for stocked items and their ledger, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod anomaly;
pub mod item;
pub mod ledger;
pub mod safety;
pub mod unit;

pub use anomaly::{AnomalyId, AnomalyRecord, AnomalyType, Severity};
pub use item::{
    AnomalyRecorded, AnomalyResolved, ChangeStatus, InventoryCommand, InventoryEvent, InventoryItem,
    InventoryItemId, ItemRegistered, ItemStatus, ItemStatusChanged, RecordMutation, RegisterItem,
    ReleaseReservation, ReservationReleased, ReserveStock, ResolveAnomaly, StockMutated, StockReserved,
    ThresholdsUpdated, UpdateThresholds,
};
pub use ledger::{ChangeType, LedgerEntry, LedgerEntryId, Movement, MutationSource};
pub use safety::{SafetyStockPolicy, SafetyThreshold, ThresholdSource};
pub use unit::UnitOfMeasure;
