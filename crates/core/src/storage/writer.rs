use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;

use super::error::{ChatError, Result, StoreError};
use super::retry::{is_retryable, RetryPolicy};
use super::traits::ItemStore;
use super::transaction::{WriteBatch, WriteOperation};

/// Commits batches of conditional operations all-or-nothing.
///
/// Transient failures are retried with bounded exponential backoff, reusing
/// the batch's client token. Precondition failures are never retried and
/// surface as [`ChatError::TransactionFailed`] with per-operation outcomes.
#[derive(Clone)]
pub struct TransactionalWriter {
    store: Arc<dyn ItemStore>,
    retry: RetryPolicy,
}

impl TransactionalWriter {
    pub fn new(store: Arc<dyn ItemStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Commits the operations as one new batch.
    pub async fn write(&self, operations: Vec<WriteOperation>) -> Result<()> {
        self.commit(&WriteBatch::new(operations)).await
    }

    /// Commits a prepared batch.
    pub async fn commit(&self, batch: &WriteBatch) -> Result<()> {
        batch.validate()?;

        let attempts = AtomicUsize::new(0);
        let result = (|| async {
            attempts.fetch_add(1, Ordering::Relaxed);
            self.store.transact_write(batch).await
        })
        .retry(self.retry.backoff())
        .when(is_retryable)
        .notify(|err: &StoreError, delay: Duration| {
            tracing::warn!(
                client_token = %batch.client_token,
                operations = batch.operations.len(),
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "Retrying transaction after transient failure"
            );
        })
        .await;

        let attempts = attempts.load(Ordering::Relaxed);
        match result {
            Ok(()) => {
                tracing::debug!(
                    client_token = %batch.client_token,
                    operations = batch.operations.len(),
                    attempts,
                    "Transaction committed"
                );
                Ok(())
            }
            Err(StoreError::TransactionCanceled(failure)) if !failure.is_transient() => {
                tracing::info!(
                    client_token = %batch.client_token,
                    failed_positions = ?failure.failed_positions(),
                    %failure,
                    "Transaction canceled"
                );
                Err(ChatError::TransactionFailed(failure))
            }
            Err(err) => {
                tracing::error!(
                    client_token = %batch.client_token,
                    attempts,
                    error = %err,
                    "Transaction failed"
                );
                Err(err.into())
            }
        }
    }
}
