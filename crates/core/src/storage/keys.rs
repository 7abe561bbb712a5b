//! Key generation for the single-table design.
//!
//! Pure functions for generating primary and secondary-index keys. All
//! functions are sync and have no side effects. [`encode_keys`] validates
//! identifiers first; the individual key functions assume valid input.

use chrono::{DateTime, Utc};

use crate::chat::{ids::format_timestamp, validate_id, ValidationError};

use super::item::{PrimaryKey, SecondaryIndex};

// ============================================================================
// Key prefixes
// ============================================================================

pub const USER_PREFIX: &str = "USER#";
pub const GROUP_PREFIX: &str = "GROUP#";
pub const MEMBER_PREFIX: &str = "MEMBER#";
pub const MESSAGE_PREFIX: &str = "MESSAGE#";

/// A secondary-index key pair for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub index: SecondaryIndex,
    pub pk: String,
    pub sk: String,
}

/// The primary key and every applicable index key of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKeys {
    pub primary: PrimaryKey,
    pub indexes: Vec<IndexKey>,
}

/// Natural identifiers of an entity instance.
#[derive(Debug, Clone, Copy)]
pub enum KeySource<'a> {
    User {
        user_id: &'a str,
    },
    Group {
        group_id: &'a str,
        creator_id: &'a str,
        created_at: DateTime<Utc>,
    },
    Membership {
        group_id: &'a str,
        user_id: &'a str,
        joined_at: DateTime<Utc>,
    },
    Message {
        group_id: &'a str,
        message_id: &'a str,
        created_at: DateTime<Utc>,
    },
}

/// Derives the primary key and all index keys for an entity.
///
/// Deterministic; fails if any identifier is empty or malformed.
pub fn encode_keys(source: &KeySource<'_>) -> Result<EntityKeys, ValidationError> {
    match *source {
        KeySource::User { user_id } => {
            validate_id("userId", user_id)?;
            Ok(EntityKeys {
                primary: PrimaryKey::new(user_pk(user_id), user_sk(user_id)),
                indexes: Vec::new(),
            })
        }
        KeySource::Group {
            group_id,
            creator_id,
            created_at,
        } => {
            validate_id("groupId", group_id)?;
            validate_id("creatorId", creator_id)?;
            Ok(EntityKeys {
                primary: PrimaryKey::new(group_pk(group_id), group_sk(group_id)),
                indexes: vec![IndexKey {
                    index: SecondaryIndex::Gsi1,
                    pk: group_gsi1_pk(creator_id),
                    sk: group_gsi1_sk(created_at, group_id),
                }],
            })
        }
        KeySource::Membership {
            group_id,
            user_id,
            joined_at,
        } => {
            validate_id("groupId", group_id)?;
            validate_id("userId", user_id)?;
            Ok(EntityKeys {
                primary: PrimaryKey::new(membership_pk(group_id), membership_sk(user_id)),
                indexes: vec![IndexKey {
                    index: SecondaryIndex::Gsi3,
                    pk: membership_gsi3_pk(user_id),
                    sk: membership_gsi3_sk(joined_at, group_id),
                }],
            })
        }
        KeySource::Message {
            group_id,
            message_id,
            created_at,
        } => {
            validate_id("groupId", group_id)?;
            validate_id("messageId", message_id)?;
            Ok(EntityKeys {
                primary: PrimaryKey::new(message_pk(group_id), message_sk(created_at, message_id)),
                indexes: vec![IndexKey {
                    index: SecondaryIndex::Gsi2,
                    pk: message_gsi2_pk(group_id),
                    sk: message_gsi2_sk(created_at),
                }],
            })
        }
    }
}

// ============================================================================
// User keys
// ============================================================================

/// Pattern: `USER#<user_id>`
pub fn user_pk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Pattern: `USER#<user_id>` (same as PK for single-item queries)
pub fn user_sk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

// ============================================================================
// Group keys
// ============================================================================

/// Pattern: `GROUP#<group_id>`
pub fn group_pk(group_id: &str) -> String {
    format!("{GROUP_PREFIX}{group_id}")
}

/// Pattern: `GROUP#<group_id>` (same as PK for single-item queries)
pub fn group_sk(group_id: &str) -> String {
    format!("{GROUP_PREFIX}{group_id}")
}

/// GSI1 partition key for "groups created by user".
///
/// Pattern: `USER#<creator_id>`
pub fn group_gsi1_pk(creator_id: &str) -> String {
    format!("{USER_PREFIX}{creator_id}")
}

/// GSI1 sort key, chronological by creation.
///
/// Pattern: `GROUP#<created_at>#<group_id>`
pub fn group_gsi1_sk(created_at: DateTime<Utc>, group_id: &str) -> String {
    format!("{GROUP_PREFIX}{}#{group_id}", format_timestamp(created_at))
}

// ============================================================================
// Membership keys
// ============================================================================

/// Pattern: `GROUP#<group_id>`
pub fn membership_pk(group_id: &str) -> String {
    format!("{GROUP_PREFIX}{group_id}")
}

/// Pattern: `MEMBER#<user_id>`
pub fn membership_sk(user_id: &str) -> String {
    format!("{MEMBER_PREFIX}{user_id}")
}

/// GSI3 partition key for "groups a user belongs to".
///
/// Pattern: `USER#<user_id>`
pub fn membership_gsi3_pk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// GSI3 sort key, chronological by join time.
///
/// Pattern: `GROUP#<joined_at>#<group_id>`
pub fn membership_gsi3_sk(joined_at: DateTime<Utc>, group_id: &str) -> String {
    format!("{GROUP_PREFIX}{}#{group_id}", format_timestamp(joined_at))
}

// ============================================================================
// Message keys
// ============================================================================

/// Pattern: `GROUP#<group_id>`
pub fn message_pk(group_id: &str) -> String {
    format!("{GROUP_PREFIX}{group_id}")
}

/// Pattern: `MESSAGE#<created_at>#<message_id>`
pub fn message_sk(created_at: DateTime<Utc>, message_id: &str) -> String {
    format!("{MESSAGE_PREFIX}{}#{message_id}", format_timestamp(created_at))
}

/// GSI2 partition key for "messages per group".
///
/// Pattern: `GROUP#<group_id>`
pub fn message_gsi2_pk(group_id: &str) -> String {
    format!("{GROUP_PREFIX}{group_id}")
}

/// GSI2 sort key.
///
/// Pattern: `MESSAGE#<created_at>`
pub fn message_gsi2_sk(created_at: DateTime<Utc>) -> String {
    format!("{MESSAGE_PREFIX}{}", format_timestamp(created_at))
}
