pub mod error;
pub mod events;
pub mod groups;
pub mod health;
pub mod messages;
pub mod queries;
pub mod users;

pub use error::AppError;
