use thiserror::Error;

/// Errors raised while validating identifiers, domain fields, cursors or
/// stored items.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    EmptyIdentifier { field: &'static str },
    #[error("{field} too long (max {max} bytes)")]
    IdentifierTooLong { field: &'static str, max: usize },
    #[error("{field} has an invalid shape: {value}")]
    MalformedIdentifier { field: &'static str, value: String },
    #[error("Group name cannot be empty")]
    EmptyGroupName,
    #[error("Group name too long (max 100 characters)")]
    GroupNameTooLong,
    #[error("Message text cannot be empty")]
    EmptyMessageText,
    #[error("Message text too long (max 4000 characters)")]
    MessageTextTooLong,
    #[error("Username cannot be empty")]
    EmptyUsername,
    #[error("Username too long (max 64 characters)")]
    UsernameTooLong,
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Missing or invalid attribute: {0}")]
    MissingAttribute(String),
    #[error("Invalid attribute {name}: {reason}")]
    InvalidAttribute { name: String, reason: String },
    #[error("Expected a {expected} item, found {found}")]
    UnexpectedEntityType {
        expected: &'static str,
        found: String,
    },
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::EmptyIdentifier { field: "groupId" }.to_string(),
            "groupId cannot be empty"
        );
        assert_eq!(
            ValidationError::MalformedIdentifier {
                field: "userId",
                value: "a#b".to_string()
            }
            .to_string(),
            "userId has an invalid shape: a#b"
        );
        assert_eq!(
            ValidationError::UnexpectedEntityType {
                expected: "GROUP",
                found: "USER".to_string()
            }
            .to_string(),
            "Expected a GROUP item, found USER"
        );
    }
}
