pub mod models;

pub use models::{ConversationKey, Message, Timestamp, UserId, UserIdError};
