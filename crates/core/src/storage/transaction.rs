//! Transactional write operations and their per-operation diagnostics.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chat::ValidationError;

use super::item::{Item, PrimaryKey};

/// Maximum number of operations in one transaction.
pub const MAX_TRANSACTION_OPERATIONS: usize = 100;

/// Precondition on the item addressed by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// No item with this primary key exists.
    ItemNotExists,
    /// An item with this primary key exists.
    ItemExists,
}

impl Condition {
    /// Whether the condition holds given the presence of the item.
    pub fn holds(&self, exists: bool) -> bool {
        match self {
            Condition::ItemNotExists => !exists,
            Condition::ItemExists => exists,
        }
    }
}

/// One operation of a transactional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOperation {
    /// Writes the item, replacing any existing item with the same key.
    Put {
        item: Item,
        condition: Option<Condition>,
    },
    /// Checks a condition without writing.
    ConditionCheck { key: PrimaryKey, condition: Condition },
}

impl WriteOperation {
    /// Unconditional put.
    pub fn put(item: Item) -> Self {
        WriteOperation::Put {
            item,
            condition: None,
        }
    }

    /// Put that fails if an item with the same key already exists.
    pub fn put_new(item: Item) -> Self {
        WriteOperation::Put {
            item,
            condition: Some(Condition::ItemNotExists),
        }
    }

    /// Check that fails unless the item exists.
    pub fn require_exists(key: PrimaryKey) -> Self {
        WriteOperation::ConditionCheck {
            key,
            condition: Condition::ItemExists,
        }
    }

    /// Primary key addressed by this operation.
    pub fn key(&self) -> Result<PrimaryKey, ValidationError> {
        match self {
            WriteOperation::Put { item, .. } => PrimaryKey::from_item(item),
            WriteOperation::ConditionCheck { key, .. } => Ok(key.clone()),
        }
    }

    pub fn condition(&self) -> Option<Condition> {
        match self {
            WriteOperation::Put { condition, .. } => *condition,
            WriteOperation::ConditionCheck { condition, .. } => Some(*condition),
        }
    }
}

/// A batch of operations committed atomically.
///
/// The client token identifies one logical commit; retries of the same
/// batch reuse it so the backend can deduplicate an attempt that landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    pub operations: Vec<WriteOperation>,
    pub client_token: String,
}

impl WriteBatch {
    pub fn new(operations: Vec<WriteOperation>) -> Self {
        Self {
            operations,
            client_token: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Checks backend limits: non-empty, at most 100 operations, and no
    /// two operations on the same key.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.operations.is_empty() {
            return Err(ValidationError::InvalidTransaction(
                "no operations".to_string(),
            ));
        }
        if self.operations.len() > MAX_TRANSACTION_OPERATIONS {
            return Err(ValidationError::InvalidTransaction(format!(
                "{} operations exceed the limit of {MAX_TRANSACTION_OPERATIONS}",
                self.operations.len()
            )));
        }
        let mut seen = HashSet::with_capacity(self.operations.len());
        for operation in &self.operations {
            let key = operation.key()?;
            if !seen.insert(key.clone()) {
                return Err(ValidationError::InvalidTransaction(format!(
                    "multiple operations on {key}"
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of one operation in a canceled transaction, aligned by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "code", rename_all = "snake_case")]
pub enum OperationOutcome {
    /// The operation was not the cause of the cancellation.
    NoIssue,
    /// The operation's precondition did not hold. Never retried.
    ConditionFailed,
    /// Throttling or a concurrent transaction on the item. Retryable.
    Transient(String),
    /// Any other rejection (size limits, validation). Not retryable.
    Rejected(String),
}

impl OperationOutcome {
    /// Classifies a backend cancellation reason code.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            None | Some("None") => OperationOutcome::NoIssue,
            Some("ConditionalCheckFailed") => OperationOutcome::ConditionFailed,
            Some(
                code @ ("TransactionConflict"
                | "ThrottlingError"
                | "ProvisionedThroughputExceeded"),
            ) => OperationOutcome::Transient(code.to_string()),
            Some(code) => OperationOutcome::Rejected(code.to_string()),
        }
    }
}

/// A canceled transaction with one outcome per submitted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFailure {
    pub outcomes: Vec<OperationOutcome>,
}

impl TransactionFailure {
    pub fn new(outcomes: Vec<OperationOutcome>) -> Self {
        Self { outcomes }
    }

    /// Positions of the operations that caused the cancellation.
    pub fn failed_positions(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| **o != OperationOutcome::NoIssue)
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether the operation at `position` failed its precondition.
    pub fn condition_failed_at(&self, position: usize) -> bool {
        self.outcomes.get(position) == Some(&OperationOutcome::ConditionFailed)
    }

    /// Any precondition failure makes the transaction a domain conflict.
    pub fn is_conflict(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| *o == OperationOutcome::ConditionFailed)
    }

    /// Retryable when every cause is transient.
    pub fn is_transient(&self) -> bool {
        let mut any_transient = false;
        for outcome in &self.outcomes {
            match outcome {
                OperationOutcome::NoIssue => {}
                OperationOutcome::Transient(_) => any_transient = true,
                OperationOutcome::ConditionFailed | OperationOutcome::Rejected(_) => return false,
            }
        }
        any_transient
    }
}

impl fmt::Display for TransactionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let causes: Vec<String> = self
            .outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| match o {
                OperationOutcome::NoIssue => None,
                OperationOutcome::ConditionFailed => Some(format!("#{i}: condition failed")),
                OperationOutcome::Transient(code) | OperationOutcome::Rejected(code) => {
                    Some(format!("#{i}: {code}"))
                }
            })
            .collect();
        if causes.is_empty() {
            write!(f, "canceled without a reported cause")
        } else {
            write!(f, "{}", causes.join(", "))
        }
    }
}
