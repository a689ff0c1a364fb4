//! Owner-isolated read model storage.

pub mod owner_store;

pub use owner_store::{InMemoryOwnerStore, OwnerStore};
