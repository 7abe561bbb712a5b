//! Application state shared by every request handler.
//!
//! Holds the chat service built over the storage backend selected via
//! feature flags, plus the shutdown signal used by SSE streams.

use std::sync::Arc;

use tokio::sync::broadcast;

use groupchat_core::events::ChatPubSub;
use groupchat_core::storage::ItemStore;

use crate::config::Config;
use crate::service::ChatService;

/// Shared application state.
///
/// Cloned for each request handler.
#[derive(Clone)]
pub struct AppState {
    /// Chat operations over the configured store.
    pub service: ChatService,
    /// Shutdown signal sender for SSE connections.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Creates a new AppState over the given store and event fan-out.
    fn build(store: Arc<dyn ItemStore>, pubsub: Arc<dyn ChatPubSub>, config: &Config) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let service = ChatService::new(store, pubsub, config.retry_policy())
            .with_page_sizes(config.page_size_default, config.page_size_max);

        Self {
            service,
            shutdown_tx,
        }
    }

    /// Subscribe to shutdown signal.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal all SSE connections to shut down.
    pub fn signal_shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

// ============================================================================
// Factory functions for the storage backends
// ============================================================================

#[cfg(feature = "inmemory")]
mod inmemory {
    use super::*;
    use crate::pubsub::MemoryPubSub;
    use crate::storage::InMemoryStore;

    impl AppState {
        /// Creates AppState with in-memory storage.
        /// Useful for local development without any external dependencies.
        pub async fn new(config: &Config) -> Result<Self, anyhow::Error> {
            let store = Arc::new(InMemoryStore::new());
            let pubsub = Arc::new(MemoryPubSub::with_capacity(config.event_channel_capacity));

            tracing::info!("Using in-memory storage (data is lost on restart)");

            Ok(Self::build(store, pubsub, config))
        }
    }
}

#[cfg(feature = "dynamodb")]
mod dynamodb {
    use super::*;
    use crate::pubsub::MemoryPubSub;
    use crate::storage::DynamoDbStore;

    impl AppState {
        /// Creates AppState with DynamoDB storage.
        pub async fn new(config: &Config) -> Result<Self, anyhow::Error> {
            let store = Arc::new(DynamoDbStore::connect(config.table_name.clone()).await);
            let pubsub = Arc::new(MemoryPubSub::with_capacity(config.event_channel_capacity));

            tracing::info!(table = %store.table_name(), "Using DynamoDB storage");

            Ok(Self::build(store, pubsub, config))
        }
    }
}

// ============================================================================
// Test support - provides Default implementation for unit tests
// ============================================================================
