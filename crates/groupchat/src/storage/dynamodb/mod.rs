//! DynamoDB storage backend implementation.
//!
//! This module provides a DynamoDB-based implementation of `ItemStore`
//! using `aws-sdk-dynamodb`.

mod conversions;
mod error;
mod store;

pub use store::DynamoDbStore;
