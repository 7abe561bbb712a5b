use super::error::ValidationError;
use super::types::{Group, Message, User};

/// Maximum identifier length in bytes.
pub const MAX_ID_LEN: usize = 128;

const MAX_GROUP_NAME_LEN: usize = 100;
const MAX_MESSAGE_TEXT_LEN: usize = 4000;
const MAX_USERNAME_LEN: usize = 64;

/// Validates an identifier that will be embedded in a key.
///
/// Identifiers are ASCII alphanumerics plus `- _ . : @`. The key separator
/// `#` is rejected, which keeps the key encoding injective.
pub fn validate_id(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyIdentifier { field });
    }
    if value.len() > MAX_ID_LEN {
        return Err(ValidationError::IdentifierTooLong {
            field,
            max: MAX_ID_LEN,
        });
    }
    if !value.chars().all(is_id_char) {
        return Err(ValidationError::MalformedIdentifier {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@')
}

/// Validates a group before creation.
pub fn validate_group(group: &Group) -> Result<(), ValidationError> {
    validate_id("groupId", &group.id)?;
    validate_id("creatorId", &group.creator_id)?;
    let name = group.name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyGroupName);
    }
    if name.chars().count() > MAX_GROUP_NAME_LEN {
        return Err(ValidationError::GroupNameTooLong);
    }
    Ok(())
}

/// Validates a message before it is written.
pub fn validate_message(message: &Message) -> Result<(), ValidationError> {
    validate_id("messageId", &message.id)?;
    validate_id("groupId", &message.group_id)?;
    validate_id("senderId", &message.sender_id)?;
    if message.text.trim().is_empty() {
        return Err(ValidationError::EmptyMessageText);
    }
    if message.text.chars().count() > MAX_MESSAGE_TEXT_LEN {
        return Err(ValidationError::MessageTextTooLong);
    }
    Ok(())
}

/// Validates a user account before creation.
pub fn validate_user(user: &User) -> Result<(), ValidationError> {
    validate_id("userId", &user.id)?;
    let username = user.username.trim();
    if username.is_empty() {
        return Err(ValidationError::EmptyUsername);
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ValidationError::UsernameTooLong);
    }
    if !is_valid_email(&user.email) {
        return Err(ValidationError::InvalidEmail(user.email.clone()));
    }
    Ok(())
}

/// Loose shape check: one `@` with a non-empty local part and a dotted domain.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}
