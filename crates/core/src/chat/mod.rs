mod error;
pub mod ids;
mod operations;
mod requests;
mod types;

pub use error::ValidationError;
pub use operations::{validate_group, validate_id, validate_message, validate_user, MAX_ID_LEN};
pub use requests::{
    AddUserToGroupRequest, CreateGroupRequest, CreateUserAccountRequest, PageQuery,
    SendMessageRequest, TypingIndicatorRequest,
};
pub use types::{Group, Membership, MembershipRole, Message, User, UserGroup};
