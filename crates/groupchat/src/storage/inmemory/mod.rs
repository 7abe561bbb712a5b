//! In-memory storage backend for testing.
//!
//! Stores every item in an ordered map wrapped in `Arc<RwLock<_>>`. Data is
//! not persisted and is lost when the store is dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use groupchat::storage::inmemory::InMemoryStore;
//!
//! let store = InMemoryStore::new();
//! // Use store for testing...
//! ```

mod store;

#[cfg(test)]
pub use store::Fault;
pub use store::InMemoryStore;
