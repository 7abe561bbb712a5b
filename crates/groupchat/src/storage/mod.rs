//! Storage backend implementations.
//!
//! This module provides concrete implementations of the `ItemStore` trait
//! defined in `groupchat_core::storage`. The backend is selected at compile
//! time via feature flags.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): ordered in-memory table, lost on restart
//! - `dynamodb`: AWS DynamoDB backend using `aws-sdk-dynamodb`
//!
//! These features are mutually exclusive - only one storage backend can be
//! enabled at a time.
//!
//! # Examples
//!
//! Build with the in-memory store (default):
//! ```bash
//! cargo build -p groupchat
//! ```
//!
//! Build with DynamoDB:
//! ```bash
//! cargo build -p groupchat --no-default-features --features dynamodb
//! ```

// Compile-time checks for mutual exclusivity
#[cfg(all(feature = "inmemory", feature = "dynamodb"))]
compile_error!(
    "Features 'inmemory' and 'dynamodb' are mutually exclusive. \
    Enable only one storage backend at a time."
);

#[cfg(not(any(feature = "inmemory", feature = "dynamodb")))]
compile_error!(
    "No storage backend selected. Enable 'inmemory' or 'dynamodb' feature. \
    Example: cargo build -p groupchat --features inmemory"
);

// The in-memory store also backs unit tests of the DynamoDB build.
#[cfg(any(test, feature = "inmemory"))]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(any(test, feature = "inmemory"))]
pub use inmemory::InMemoryStore;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbStore;
