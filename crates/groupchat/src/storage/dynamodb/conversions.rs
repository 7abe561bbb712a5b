//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between SDK attribute maps and the shared
//! item model. These are testable in isolation without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::{AttributeValue as DynamoValue, CancellationReason};
use groupchat_core::storage::{
    AttributeValue, Condition, Item, OperationOutcome, PrimaryKey, StoreError, PK, SK,
};

// ============================================================================
// Attribute conversions
// ============================================================================

/// Convert a shared attribute value to its SDK form.
pub fn to_dynamo_value(value: &AttributeValue) -> DynamoValue {
    match value {
        AttributeValue::S(s) => DynamoValue::S(s.clone()),
        AttributeValue::N(n) => DynamoValue::N(n.clone()),
        AttributeValue::Bool(b) => DynamoValue::Bool(*b),
        AttributeValue::Null(b) => DynamoValue::Null(*b),
    }
}

/// Convert an SDK attribute value, rejecting types the chat table never stores.
pub fn from_dynamo_value(name: &str, value: &DynamoValue) -> Result<AttributeValue, StoreError> {
    match value {
        DynamoValue::S(s) => Ok(AttributeValue::S(s.clone())),
        DynamoValue::N(n) => Ok(AttributeValue::N(n.clone())),
        DynamoValue::Bool(b) => Ok(AttributeValue::Bool(*b)),
        DynamoValue::Null(b) => Ok(AttributeValue::Null(*b)),
        other => Err(StoreError::InvalidData(format!(
            "Unsupported attribute type for '{}': {:?}",
            name, other
        ))),
    }
}

/// Convert an item to a DynamoDB attribute map.
pub fn to_dynamo_item(item: &Item) -> HashMap<String, DynamoValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_dynamo_value(value)))
        .collect()
}

/// Convert a DynamoDB attribute map to an item.
pub fn from_dynamo_item(item: &HashMap<String, DynamoValue>) -> Result<Item, StoreError> {
    item.iter()
        .map(|(name, value)| Ok((name.clone(), from_dynamo_value(name, value)?)))
        .collect()
}

/// The `PK`/`SK` attribute map addressing a single row.
pub fn key_to_dynamo(key: &PrimaryKey) -> HashMap<String, DynamoValue> {
    HashMap::from([
        (PK.to_string(), DynamoValue::S(key.pk.clone())),
        (SK.to_string(), DynamoValue::S(key.sk.clone())),
    ])
}

// ============================================================================
// Transaction helpers
// ============================================================================

/// Condition expression enforcing a precondition on the addressed row.
pub fn condition_expression(condition: Condition) -> &'static str {
    match condition {
        Condition::ItemNotExists => "attribute_not_exists(PK)",
        Condition::ItemExists => "attribute_exists(PK)",
    }
}

/// Per-operation outcomes of a canceled transaction, in submission order.
///
/// Always one outcome per submitted operation. Positions the service gave
/// no reason for are reported as `Rejected("Unknown")`.
pub fn outcomes_from_reasons(
    reasons: &[CancellationReason],
    operation_count: usize,
) -> Vec<OperationOutcome> {
    let mut outcomes: Vec<OperationOutcome> = reasons
        .iter()
        .take(operation_count)
        .map(|reason| OperationOutcome::from_code(reason.code()))
        .collect();
    outcomes.resize(
        operation_count,
        OperationOutcome::Rejected("Unknown".to_string()),
    );
    outcomes
}
