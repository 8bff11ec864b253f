use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use courier_gateway::settings::{
    DEFAULT_IDLE, DEFAULT_MAX_BODY_LEN, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_USERS,
};
use courier_gateway::RelaySettings;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 1234;

pub struct Config {
    pub addr: SocketAddr,
    pub relay: RelaySettings,
}

impl Config {
    /// Read `COURIER_*` variables, falling back to defaults when unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("COURIER_HOST").unwrap_or_else(|_| DEFAULT_HOST.into());
        let port: u16 = var_or("COURIER_PORT", DEFAULT_PORT)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let relay = RelaySettings {
            max_connections: var_or("COURIER_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            max_users: var_or("COURIER_MAX_USERS", DEFAULT_MAX_USERS)?,
            idle_timeout: Duration::from_secs(var_or(
                "COURIER_IDLE_TIMEOUT_SECS",
                DEFAULT_IDLE.as_secs(),
            )?),
            poll_interval: Duration::from_secs(var_or(
                "COURIER_POLL_INTERVAL_SECS",
                DEFAULT_IDLE.as_secs(),
            )?),
            max_body_len: var_or("COURIER_MAX_BODY_BYTES", DEFAULT_MAX_BODY_LEN)?,
        };

        anyhow::ensure!(relay.max_connections > 0, "COURIER_MAX_CONNECTIONS must be positive");
        anyhow::ensure!(relay.max_users > 0, "COURIER_MAX_USERS must be positive");

        Ok(Self { addr, relay })
    }
}

fn var_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value {:?}", name, value)),
        Err(_) => Ok(default),
    }
}
