use std::time::Duration;

pub use courier_types::models::DEFAULT_MAX_USERS;

/// Matches the listen backlog.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Five minutes, for both the accept tick and per-connection inactivity.
pub const DEFAULT_IDLE: Duration = Duration::from_secs(5 * 60);

/// 1 MB message bodies.
pub const DEFAULT_MAX_BODY_LEN: usize = 1024 * 1024;

/// Limits applied by the relay and every connection it services.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Connections serviced at once. Extra connections are closed on accept.
    pub max_connections: usize,
    /// Size of the user id space; valid ids are `0..max_users`.
    pub max_users: u8,
    /// A connection that delivers no bytes for this long is dropped.
    pub idle_timeout: Duration,
    /// How long the accept loop waits before logging an idle tick.
    pub poll_interval: Duration,
    pub max_body_len: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_users: DEFAULT_MAX_USERS,
            idle_timeout: DEFAULT_IDLE,
            poll_interval: DEFAULT_IDLE,
            max_body_len: DEFAULT_MAX_BODY_LEN,
        }
    }
}
