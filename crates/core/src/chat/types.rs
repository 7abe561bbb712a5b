use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids;

/// A registered chat user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a user account record. The id comes from the identity provider.
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: email.into(),
            profile_picture: None,
            created_at: ids::now(),
        }
    }

    /// Sets the profile picture URL.
    pub fn with_profile_picture(mut self, url: impl Into<String>) -> Self {
        self.profile_picture = Some(url.into());
        self
    }
}

/// A chat group. Created together with its owner's membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Creates a group with a freshly minted id.
    pub fn new(creator_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ids::new_id(),
            name: name.into(),
            creator_id: creator_id.into(),
            created_at: ids::now(),
        }
    }

    /// Replaces the id with a freshly minted one (used after an id collision).
    pub fn reminted(mut self) -> Self {
        self.id = ids::new_id();
        self
    }

    /// Sets a specific ID for this group (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets a specific creation time (useful for testing).
    ///
    /// Truncated to microseconds, the precision the store keeps.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = ids::truncate(created_at);
        self
    }
}

/// Role of a user within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Owner,
    Member,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Owner => "owner",
            MembershipRole::Member => "member",
        }
    }
}

/// A user's membership in a group. At most one per (group, user) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub group_id: String,
    pub user_id: String,
    pub role: MembershipRole,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    /// The owning membership of a newly created group.
    pub fn owner(group: &Group) -> Self {
        Self {
            group_id: group.id.clone(),
            user_id: group.creator_id.clone(),
            role: MembershipRole::Owner,
            joined_at: group.created_at,
        }
    }

    /// A regular membership joining now.
    pub fn member(group_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            user_id: user_id.into(),
            role: MembershipRole::Member,
            joined_at: ids::now(),
        }
    }

    /// Sets a specific join time (useful for testing).
    pub fn with_joined_at(mut self, joined_at: DateTime<Utc>) -> Self {
        self.joined_at = ids::truncate(joined_at);
        self
    }
}

/// A message posted to a group. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a message with a freshly minted id and timestamp.
    ///
    /// Timestamps from [`ids::now`] do not decrease within a process, so a
    /// single writer produces a monotonic message order per group. Messages
    /// minted by different processes are ordered by their wall clocks.
    pub fn new(
        group_id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: ids::new_id(),
            group_id: group_id.into(),
            sender_id: sender_id.into(),
            text: text.into(),
            created_at: ids::now(),
        }
    }

    /// Sets a specific creation time (useful for testing).
    ///
    /// Truncated to microseconds, the precision the store keeps.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = ids::truncate(created_at);
        self
    }
}

/// A membership together with its resolved group (`UserGroup.group`).
///
/// `group` is `None` only if the group row is missing, which the write
/// path never produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGroup {
    #[serde(flatten)]
    pub membership: Membership,
    pub group: Option<Group>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_membership_mirrors_group() {
        let group = Group::new("user-1", "Team");
        let membership = Membership::owner(&group);

        assert_eq!(membership.group_id, group.id);
        assert_eq!(membership.user_id, "user-1");
        assert_eq!(membership.role, MembershipRole::Owner);
        assert_eq!(membership.joined_at, group.created_at);
    }

    #[test]
    fn test_reminted_group_keeps_fields() {
        let group = Group::new("user-1", "Team");
        let reminted = group.clone().reminted();

        assert_ne!(reminted.id, group.id);
        assert_eq!(reminted.name, group.name);
        assert_eq!(reminted.created_at, group.created_at);
    }

    #[test]
    fn test_message_serializes_camel_case() {
        let message = Message::new("g1", "u2", "hi");
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["senderId"], "u2");
        assert_eq!(json["groupId"], "g1");
        assert_eq!(json["text"], "hi");
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(
            serde_json::to_string(&MembershipRole::Owner).unwrap(),
            "\"owner\""
        );
        assert_eq!(MembershipRole::Member.as_str(), "member");
    }
}
