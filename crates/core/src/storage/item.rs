//! Generic attribute model shared by every backend.
//!
//! Items are flat attribute maps, mirroring the DynamoDB item shape. The
//! serialized form of [`AttributeValue`] is externally tagged (`{"S": "x"}`)
//! like the DynamoDB JSON wire format.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::chat::ValidationError;

pub const PK: &str = "PK";
pub const SK: &str = "SK";
pub const GSI1PK: &str = "GSI1PK";
pub const GSI1SK: &str = "GSI1SK";
pub const GSI2PK: &str = "GSI2PK";
pub const GSI2SK: &str = "GSI2SK";
pub const GSI3PK: &str = "GSI3PK";
pub const GSI3SK: &str = "GSI3SK";
pub const ENTITY_TYPE: &str = "entityType";

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(String),
    Bool(bool),
    Null(bool),
}

impl AttributeValue {
    /// Returns the string payload if this is an `S` value.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::S(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::S(value.to_string())
    }
}

/// A stored row.
pub type Item = HashMap<String, AttributeValue>;

/// The composite primary key addressing a single row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub pk: String,
    pub sk: String,
}

impl PrimaryKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Reads the primary key attributes of an item.
    pub fn from_item(item: &Item) -> Result<Self, ValidationError> {
        Ok(Self {
            pk: get_string(item, PK)?,
            sk: get_string(item, SK)?,
        })
    }

    /// The key as a two-attribute map.
    pub fn to_item(&self) -> Item {
        HashMap::from([
            (PK.to_string(), AttributeValue::S(self.pk.clone())),
            (SK.to_string(), AttributeValue::S(self.sk.clone())),
        ])
    }
}

impl std::fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.pk, self.sk)
    }
}

/// The three global secondary indexes of the chat table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecondaryIndex {
    /// Groups created by a user.
    Gsi1,
    /// Messages per group.
    Gsi2,
    /// Groups a user belongs to.
    Gsi3,
}

impl SecondaryIndex {
    pub const ALL: [SecondaryIndex; 3] = [Self::Gsi1, Self::Gsi2, Self::Gsi3];

    /// Index name as provisioned on the table.
    pub fn index_name(&self) -> &'static str {
        match self {
            SecondaryIndex::Gsi1 => "groupsCreatedByUser",
            SecondaryIndex::Gsi2 => "getMessagesPerGroup",
            SecondaryIndex::Gsi3 => "groupsUserBelongTo",
        }
    }

    pub fn pk_attribute(&self) -> &'static str {
        match self {
            SecondaryIndex::Gsi1 => GSI1PK,
            SecondaryIndex::Gsi2 => GSI2PK,
            SecondaryIndex::Gsi3 => GSI3PK,
        }
    }

    pub fn sk_attribute(&self) -> &'static str {
        match self {
            SecondaryIndex::Gsi1 => GSI1SK,
            SecondaryIndex::Gsi2 => GSI2SK,
            SecondaryIndex::Gsi3 => GSI3SK,
        }
    }
}

// ============================================================================
// Attribute accessors
// ============================================================================

/// Get a required string attribute.
pub fn get_string(item: &Item, key: &str) -> Result<String, ValidationError> {
    item.get(key)
        .and_then(AttributeValue::as_s)
        .map(str::to_string)
        .ok_or_else(|| ValidationError::MissingAttribute(key.to_string()))
}

/// Get an optional string attribute.
pub fn get_optional_string(item: &Item, key: &str) -> Option<String> {
    item.get(key)
        .and_then(AttributeValue::as_s)
        .map(str::to_string)
}
