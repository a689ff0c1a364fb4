//! Infrastructure layer: event store, read models, projections and the
//! stock ledger service that ties them together.

pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod stock_ledger;


pub use stock_ledger::{
    LedgerError, LedgerFilter, MutationOutcome, MutationRequest, RegisterItemRequest, StockLedger,
    StockLedgerConfig, INVENTORY_ITEM,
};
