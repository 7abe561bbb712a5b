//! API request types for chat operations.
//!
//! Pure data types shared by the HTTP layer and the handlers. Field names
//! follow the originating API (`creatorId`, `senderId`, ...).

use serde::{Deserialize, Serialize};

use crate::serde::deserialize_optional_string;

/// Request payload for `createGroup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub creator_id: String,
    pub name: String,
}

/// Request payload for `addUserToGroup`. The group id comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserToGroupRequest {
    pub user_id: String,
}

/// Request payload for `createUserAccount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserAccountRequest {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_picture: Option<String>,
}

/// Request payload for `sendMessage`. The group id comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: String,
    pub text: String,
}

/// Request payload for `typingIndicator`. The group id comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicatorRequest {
    pub user_id: String,
    #[serde(default = "default_typing")]
    pub typing: bool,
}

fn default_typing() -> bool {
    true
}

/// Query parameters for paginated reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(
        default,
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_account_blank_picture_is_none() {
        let json = r#"{"id":"u1","username":"ana","email":"ana@example.com","profilePicture":""}"#;
        let request: CreateUserAccountRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.profile_picture, None);
    }

    #[test]
    fn test_typing_defaults_to_true() {
        let request: TypingIndicatorRequest = serde_json::from_str(r#"{"userId":"u1"}"#).unwrap();
        assert!(request.typing);
    }

    #[test]
    fn test_page_query_empty_cursor() {
        let query: PageQuery = serde_json::from_str(r#"{"cursor":"","limit":5}"#).unwrap();
        assert_eq!(query.cursor, None);
        assert_eq!(query.limit, Some(5));
    }
}
