//! Entity <-> item conversion.
//!
//! Pure functions for converting between attribute maps and domain types.
//! Encoding embeds the primary key, every applicable index key and an
//! `entityType` discriminator; decoding checks the discriminator and never
//! mints ids or timestamps.

use chrono::{DateTime, Utc};

use crate::chat::{
    ids::{format_timestamp, parse_timestamp},
    Group, Membership, MembershipRole, Message, User, ValidationError,
};

use super::item::{get_optional_string, get_string, AttributeValue, Item, ENTITY_TYPE, PK, SK};
use super::keys::{encode_keys, EntityKeys, KeySource};

// ============================================================================
// Entity type constants
// ============================================================================

pub const ENTITY_TYPE_USER: &str = "USER";
pub const ENTITY_TYPE_GROUP: &str = "GROUP";
pub const ENTITY_TYPE_MEMBERSHIP: &str = "MEMBERSHIP";
pub const ENTITY_TYPE_MESSAGE: &str = "MESSAGE";

/// A domain type stored as one row of the chat table.
pub trait Entity: Sized {
    /// Value of the `entityType` attribute.
    const ENTITY_TYPE: &'static str;

    /// Natural identifiers used to derive keys.
    fn key_source(&self) -> KeySource<'_>;

    /// Entity attributes, without keys or discriminator.
    fn attributes(&self) -> Item;

    /// Builds the domain value from a decoded item.
    fn from_attributes(item: &Item) -> Result<Self, ValidationError>;

    /// Primary and index keys of this instance.
    fn keys(&self) -> Result<EntityKeys, ValidationError> {
        encode_keys(&self.key_source())
    }

    /// Encodes this entity as a full item.
    fn to_item(&self) -> Result<Item, ValidationError> {
        let keys = self.keys()?;
        let mut item = self.attributes();

        // Keys
        item.insert(PK.to_string(), AttributeValue::S(keys.primary.pk));
        item.insert(SK.to_string(), AttributeValue::S(keys.primary.sk));
        for index in keys.indexes {
            item.insert(
                index.index.pk_attribute().to_string(),
                AttributeValue::S(index.pk),
            );
            item.insert(
                index.index.sk_attribute().to_string(),
                AttributeValue::S(index.sk),
            );
        }

        // Entity type
        item.insert(
            ENTITY_TYPE.to_string(),
            AttributeValue::S(Self::ENTITY_TYPE.to_string()),
        );

        Ok(item)
    }

    /// Decodes an item, checking its `entityType`.
    fn from_item(item: &Item) -> Result<Self, ValidationError> {
        let found = get_string(item, ENTITY_TYPE)?;
        if found != Self::ENTITY_TYPE {
            return Err(ValidationError::UnexpectedEntityType {
                expected: Self::ENTITY_TYPE,
                found,
            });
        }
        Self::from_attributes(item)
    }
}

// ============================================================================
// User conversions
// ============================================================================

impl Entity for User {
    const ENTITY_TYPE: &'static str = ENTITY_TYPE_USER;

    fn key_source(&self) -> KeySource<'_> {
        KeySource::User { user_id: &self.id }
    }

    fn attributes(&self) -> Item {
        let mut item = Item::new();
        item.insert("id".to_string(), AttributeValue::S(self.id.clone()));
        item.insert(
            "username".to_string(),
            AttributeValue::S(self.username.clone()),
        );
        item.insert("email".to_string(), AttributeValue::S(self.email.clone()));
        if let Some(url) = &self.profile_picture {
            item.insert("profilePicture".to_string(), AttributeValue::S(url.clone()));
        }
        item.insert(
            "createdAt".to_string(),
            AttributeValue::S(format_timestamp(self.created_at)),
        );
        item
    }

    fn from_attributes(item: &Item) -> Result<Self, ValidationError> {
        Ok(User {
            id: get_string(item, "id")?,
            username: get_string(item, "username")?,
            email: get_string(item, "email")?,
            profile_picture: get_optional_string(item, "profilePicture"),
            created_at: get_datetime(item, "createdAt")?,
        })
    }
}

// ============================================================================
// Group conversions
// ============================================================================

impl Entity for Group {
    const ENTITY_TYPE: &'static str = ENTITY_TYPE_GROUP;

    fn key_source(&self) -> KeySource<'_> {
        KeySource::Group {
            group_id: &self.id,
            creator_id: &self.creator_id,
            created_at: self.created_at,
        }
    }

    fn attributes(&self) -> Item {
        let mut item = Item::new();
        item.insert("id".to_string(), AttributeValue::S(self.id.clone()));
        item.insert("name".to_string(), AttributeValue::S(self.name.clone()));
        item.insert(
            "creatorId".to_string(),
            AttributeValue::S(self.creator_id.clone()),
        );
        item.insert(
            "createdAt".to_string(),
            AttributeValue::S(format_timestamp(self.created_at)),
        );
        item
    }

    fn from_attributes(item: &Item) -> Result<Self, ValidationError> {
        Ok(Group {
            id: get_string(item, "id")?,
            name: get_string(item, "name")?,
            creator_id: get_string(item, "creatorId")?,
            created_at: get_datetime(item, "createdAt")?,
        })
    }
}

// ============================================================================
// Membership conversions
// ============================================================================

impl Entity for Membership {
    const ENTITY_TYPE: &'static str = ENTITY_TYPE_MEMBERSHIP;

    fn key_source(&self) -> KeySource<'_> {
        KeySource::Membership {
            group_id: &self.group_id,
            user_id: &self.user_id,
            joined_at: self.joined_at,
        }
    }

    fn attributes(&self) -> Item {
        let mut item = Item::new();
        item.insert(
            "groupId".to_string(),
            AttributeValue::S(self.group_id.clone()),
        );
        item.insert("userId".to_string(), AttributeValue::S(self.user_id.clone()));
        item.insert(
            "role".to_string(),
            AttributeValue::S(self.role.as_str().to_string()),
        );
        item.insert(
            "createdAt".to_string(),
            AttributeValue::S(format_timestamp(self.joined_at)),
        );
        item
    }

    fn from_attributes(item: &Item) -> Result<Self, ValidationError> {
        Ok(Membership {
            group_id: get_string(item, "groupId")?,
            user_id: get_string(item, "userId")?,
            role: parse_role(&get_string(item, "role")?)?,
            joined_at: get_datetime(item, "createdAt")?,
        })
    }
}

// ============================================================================
// Message conversions
// ============================================================================

impl Entity for Message {
    const ENTITY_TYPE: &'static str = ENTITY_TYPE_MESSAGE;

    fn key_source(&self) -> KeySource<'_> {
        KeySource::Message {
            group_id: &self.group_id,
            message_id: &self.id,
            created_at: self.created_at,
        }
    }

    fn attributes(&self) -> Item {
        let mut item = Item::new();
        item.insert("id".to_string(), AttributeValue::S(self.id.clone()));
        item.insert(
            "groupId".to_string(),
            AttributeValue::S(self.group_id.clone()),
        );
        item.insert(
            "senderId".to_string(),
            AttributeValue::S(self.sender_id.clone()),
        );
        item.insert("text".to_string(), AttributeValue::S(self.text.clone()));
        item.insert(
            "createdAt".to_string(),
            AttributeValue::S(format_timestamp(self.created_at)),
        );
        item
    }

    fn from_attributes(item: &Item) -> Result<Self, ValidationError> {
        Ok(Message {
            id: get_string(item, "id")?,
            group_id: get_string(item, "groupId")?,
            sender_id: get_string(item, "senderId")?,
            text: get_string(item, "text")?,
            created_at: get_datetime(item, "createdAt")?,
        })
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Parse MembershipRole from string.
pub fn parse_role(s: &str) -> Result<MembershipRole, ValidationError> {
    match s {
        "owner" => Ok(MembershipRole::Owner),
        "member" => Ok(MembershipRole::Member),
        _ => Err(ValidationError::InvalidAttribute {
            name: "role".to_string(),
            reason: format!("unknown role {s}"),
        }),
    }
}

/// Get a required datetime attribute (RFC 3339 format).
fn get_datetime(item: &Item, key: &str) -> Result<DateTime<Utc>, ValidationError> {
    let s = get_string(item, key)?;
    parse_timestamp(&s).map_err(|e| ValidationError::InvalidAttribute {
        name: key.to_string(),
        reason: e.to_string(),
    })
}
