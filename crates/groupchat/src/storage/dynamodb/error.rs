//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StoreError` from `groupchat_core::storage`.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use groupchat_core::storage::{StoreError, TransactionFailure};

use super::conversions::outcomes_from_reasons;

/// Timeouts and connection failures never reached a service verdict.
fn transport_error<E, R>(err: &SdkError<E, R>) -> Option<StoreError> {
    match err {
        SdkError::TimeoutError(_) => Some(StoreError::Transient("Request timed out".to_string())),
        SdkError::DispatchFailure(_) => {
            Some(StoreError::Transient("Failed to dispatch request".to_string()))
        }
        SdkError::ResponseError(_) => {
            Some(StoreError::Transient("Malformed response".to_string()))
        }
        _ => None,
    }
}

/// Map a GetItem SDK error to StoreError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> StoreError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(_) => {
            StoreError::NotFound("Table not found".to_string())
        }
        GetItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::Transient("Throughput exceeded, please retry".to_string())
        }
        GetItemError::RequestLimitExceeded(_) => {
            StoreError::Transient("Request limit exceeded, please retry".to_string())
        }
        GetItemError::InternalServerError(_) => {
            StoreError::Transient("DynamoDB internal server error".to_string())
        }
        err => StoreError::Backend(format!("GetItem failed: {:?}", err)),
    }
}

/// Map a BatchGetItem SDK error to StoreError.
pub fn map_batch_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchGetItemError, R>,
) -> StoreError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        BatchGetItemError::ResourceNotFoundException(_) => {
            StoreError::NotFound("Table not found".to_string())
        }
        BatchGetItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::Transient("Throughput exceeded, please retry".to_string())
        }
        BatchGetItemError::RequestLimitExceeded(_) => {
            StoreError::Transient("Request limit exceeded, please retry".to_string())
        }
        BatchGetItemError::InternalServerError(_) => {
            StoreError::Transient("DynamoDB internal server error".to_string())
        }
        err => StoreError::Backend(format!("BatchGetItem failed: {:?}", err)),
    }
}

/// Map a Query SDK error to StoreError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(err: SdkError<QueryError, R>) -> StoreError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => {
            StoreError::NotFound("Table or index not found".to_string())
        }
        QueryError::ProvisionedThroughputExceededException(_) => {
            StoreError::Transient("Throughput exceeded, please retry".to_string())
        }
        QueryError::RequestLimitExceeded(_) => {
            StoreError::Transient("Request limit exceeded, please retry".to_string())
        }
        QueryError::InternalServerError(_) => {
            StoreError::Transient("DynamoDB internal server error".to_string())
        }
        err => StoreError::Backend(format!("Query failed: {:?}", err)),
    }
}

/// Map a TransactWriteItems SDK error to StoreError.
///
/// Cancellations keep the per-operation reasons, one per submitted
/// operation, so callers can tell which precondition failed.
pub fn map_transact_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<TransactWriteItemsError, R>,
    operation_count: usize,
) -> StoreError {
    if let Some(err) = transport_error(&err) {
        return err;
    }
    match err.into_service_error() {
        TransactWriteItemsError::TransactionCanceledException(e) => StoreError::TransactionCanceled(
            TransactionFailure::new(outcomes_from_reasons(
                e.cancellation_reasons(),
                operation_count,
            )),
        ),
        TransactWriteItemsError::TransactionInProgressException(_) => {
            StoreError::Transient("Transaction with this token in progress".to_string())
        }
        TransactWriteItemsError::IdempotentParameterMismatchException(_) => {
            StoreError::InvalidRequest(
                "Client token reused with different operations".to_string(),
            )
        }
        TransactWriteItemsError::ResourceNotFoundException(_) => {
            StoreError::NotFound("Table not found".to_string())
        }
        TransactWriteItemsError::ProvisionedThroughputExceededException(_) => {
            StoreError::Transient("Throughput exceeded, please retry".to_string())
        }
        TransactWriteItemsError::RequestLimitExceeded(_) => {
            StoreError::Transient("Request limit exceeded, please retry".to_string())
        }
        TransactWriteItemsError::InternalServerError(_) => {
            StoreError::Transient("DynamoDB internal server error".to_string())
        }
        err => StoreError::Backend(format!("TransactWriteItems failed: {:?}", err)),
    }
}

/// Map a request builder error to StoreError.
pub fn map_build_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::InvalidRequest(err.to_string())
}
