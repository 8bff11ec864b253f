//! Accept loop for the message relay.
//!
//! The listener is owned by a single loop. Each accepted socket is handed to
//! its own task, and the runtime wakes that task only when its socket is
//! ready. The set of live connections is bounded by a semaphore; the loop
//! itself is the only place connections are admitted or rejected.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use courier_store::ConversationStore;

use crate::handler::{self, Outcome};
use crate::settings::RelaySettings;

/// How long in-flight connections may keep running after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The relay: shared store plus connection limits.
#[derive(Clone)]
pub struct Relay {
    store: ConversationStore,
    settings: Arc<RelaySettings>,
    permits: Arc<Semaphore>,
}

impl Relay {
    pub fn new(store: ConversationStore, settings: RelaySettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_connections));
        Self {
            store,
            settings: Arc::new(settings),
            permits,
        }
    }

    /// Connections currently being serviced.
    pub fn active_connections(&self) -> usize {
        self.settings.max_connections - self.permits.available_permits()
    }

    /// Accept and service connections until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut tasks = JoinSet::new();

        if let Ok(addr) = listener.local_addr() {
            info!("Relay accepting connections on {}", addr);
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Relay: shutdown requested");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.admit(stream, peer, &mut tasks),
                    Err(e) => error!("Relay accept error: {}", e),
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Relay: connection task failed: {}", e);
                    }
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {
                    debug!(
                        active = self.active_connections(),
                        "Relay: no activity for {:?}",
                        self.settings.poll_interval
                    );
                }
            }
        }

        drop(listener);
        let drain = async { while tasks.join_next().await.is_some() {} };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("Relay: aborting {} connections still open", tasks.len());
            tasks.abort_all();
        }
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr, tasks: &mut JoinSet<()>) {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    "Relay: {} connections open, rejecting {}",
                    self.active_connections(),
                    peer
                );
                drop(stream);
                return;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Relay: set_nodelay failed for {}: {}", peer, e);
        }

        let conn_id = Uuid::new_v4();
        let store = self.store.clone();
        let settings = self.settings.clone();
        let span = info_span!("conn", id = %conn_id, %peer);

        tasks.spawn(
            async move {
                let _permit = permit;
                match handler::handle_connection(stream, &store, &settings).await {
                    Ok(Outcome::Stored { key, body_len }) => {
                        info!("stored {} byte message {}", body_len, key);
                    }
                    Ok(Outcome::HistorySent { key, messages, bytes }) => {
                        info!("sent history {} ({} messages, {} bytes)", key, messages, bytes);
                    }
                    Err(e) => warn!("connection aborted: {}", e),
                }
            }
            .instrument(span),
        );
    }
}
