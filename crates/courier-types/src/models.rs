use std::fmt;

use bytes::Bytes;
use thiserror::Error;

/// Wire value reserved for "no user".
pub const USER_NONE: i64 = -1;

/// Default size of the user id space.
pub const DEFAULT_MAX_USERS: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserIdError {
    #[error("user id is the none sentinel")]
    None,
    #[error("user id {id} outside 0..{max}")]
    OutOfRange { id: i64, max: u8 },
}

/// A participant identifier. Always a real user, never the none sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(u8);

impl UserId {
    /// Validate a decoded integer against the configured id space.
    pub fn new(raw: i64, max_users: u8) -> Result<Self, UserIdError> {
        if raw == USER_NONE {
            return Err(UserIdError::None);
        }
        if raw < 0 || raw >= i64::from(max_users) {
            return Err(UserIdError::OutOfRange {
                id: raw,
                max: max_users,
            });
        }
        Ok(Self(raw as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-supplied send time. Fields are taken as-is, no calendar checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamp {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl fmt::Display for Timestamp {
    /// `YYYY_MM_DD_HH_MM_SS`, zero padded. Wider values are printed in full.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}_{:02}_{:02}_{:02}_{:02}_{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// One chat message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: UserId,
    pub receiver: UserId,
    pub timestamp: Timestamp,
    pub body: Bytes,
}

impl Message {
    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(self.sender, self.receiver)
    }
}

/// Directional conversation: messages from `from` to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub from: UserId,
    pub to: UserId,
}

impl ConversationKey {
    pub fn new(from: UserId, to: UserId) -> Self {
        Self { from, to }
    }

    pub fn reversed(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}
