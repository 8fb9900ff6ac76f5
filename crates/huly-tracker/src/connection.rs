//! Lazy, single-flight acquisition of the shared backend session.
//!
//! A [`ConnectionManager`] moves through
//!
//! ```text
//! Uninitialized ──acquire──▶ Establishing ──ok──▶ Ready ──release──▶ Closed
//!                                 │                                   │
//!                                 └──err──▶ Uninitialized ◀──acquire──┘
//! ```
//!
//! Only one handshake runs at a time: callers that arrive while one is in
//! flight await the same shared future and all see its outcome. A failed
//! attempt is not remembered, so the next call starts a fresh one.
//!
//! Each attempt carries a generation number. If `release` runs while an
//! attempt is in flight, the attempt's result is discarded when it lands
//! instead of resurrecting a session the caller asked to close.

use crate::backend::Backend;
use crate::config::HulyConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Performs the authentication handshake and opens a backend session.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a session for `config`.
    async fn connect(&self, config: &HulyConfig) -> Result<Arc<dyn Backend>>;
}

type AttemptOutcome = std::result::Result<Arc<dyn Backend>, Arc<str>>;
type Attempt = Shared<BoxFuture<'static, AttemptOutcome>>;

enum State {
    Uninitialized,
    Establishing { attempt: Attempt, generation: u64 },
    Ready { backend: Arc<dyn Backend>, generation: u64 },
    Closed,
}

/// Observable lifecycle phase of a [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session and no attempt yet.
    Uninitialized,
    /// A handshake is in flight.
    Establishing,
    /// A live session is cached.
    Ready,
    /// Released; the next acquire starts over.
    Closed,
}

struct Inner {
    state: State,
    generation: u64,
}

impl Inner {
    fn is_establishing(&self, generation: u64) -> bool {
        matches!(self.state, State::Establishing { generation: g, .. } if g == generation)
    }
}

/// Owns the one backend session of a process.
pub struct ConnectionManager {
    config: HulyConfig,
    connector: Arc<dyn Connector>,
    inner: Mutex<Inner>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.config.url)
            .field("workspace", &self.config.workspace)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a manager. No I/O happens until the first [`acquire`](Self::acquire).
    pub fn new(config: HulyConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            inner: Mutex::new(Inner {
                state: State::Uninitialized,
                generation: 0,
            }),
        }
    }

    /// The settings sessions are opened with.
    #[must_use]
    pub fn config(&self) -> &HulyConfig {
        &self.config
    }

    /// Current lifecycle phase.
    pub async fn state(&self) -> ConnectionState {
        match self.inner.lock().await.state {
            State::Uninitialized => ConnectionState::Uninitialized,
            State::Establishing { .. } => ConnectionState::Establishing,
            State::Ready { .. } => ConnectionState::Ready,
            State::Closed => ConnectionState::Closed,
        }
    }

    /// Return the live session, establishing it if needed.
    ///
    /// # Errors
    ///
    /// - `Error::Configuration` when no credentials are configured (checked
    ///   before any I/O)
    /// - `Error::Connection` when the handshake fails, times out, or the
    ///   manager is released while it is in flight
    pub async fn acquire(&self) -> Result<Arc<dyn Backend>> {
        if self.config.credentials.is_none() {
            return Err(Error::Configuration(
                "Either HULY_TOKEN or HULY_EMAIL and HULY_PASSWORD must be set".to_string(),
            ));
        }

        let (attempt, generation) = {
            let mut inner = self.inner.lock().await;
            match &inner.state {
                State::Ready { backend, .. } => return Ok(Arc::clone(backend)),
                State::Establishing {
                    attempt,
                    generation,
                } => (attempt.clone(), *generation),
                State::Uninitialized | State::Closed => {
                    inner.generation += 1;
                    let generation = inner.generation;
                    let attempt = self.start_attempt();
                    inner.state = State::Establishing {
                        attempt: attempt.clone(),
                        generation,
                    };
                    tracing::info!(
                        url = %self.config.url,
                        workspace = %self.config.workspace,
                        generation,
                        "Connecting to Huly"
                    );
                    (attempt, generation)
                }
            }
        };

        let outcome = attempt.await;
        let mut inner = self.inner.lock().await;

        match outcome {
            Ok(backend) => {
                let cached = match &inner.state {
                    State::Ready {
                        backend: cached,
                        generation: g,
                    } if *g == generation => Some(Arc::clone(cached)),
                    _ => None,
                };
                if let Some(cached) = cached {
                    return Ok(cached);
                }

                if inner.is_establishing(generation) {
                    inner.state = State::Ready {
                        backend: Arc::clone(&backend),
                        generation,
                    };
                    tracing::info!(generation, "Connected to Huly");
                    return Ok(backend);
                }

                drop(inner);
                tracing::warn!(generation, "Connection released while establishing");
                if let Err(e) = backend.close().await {
                    tracing::debug!(error = %e, "Closing abandoned session failed");
                }
                Err(Error::Connection(
                    "connection was released while being established".to_string(),
                ))
            }
            Err(message) => {
                if inner.is_establishing(generation) {
                    inner.state = State::Uninitialized;
                    tracing::warn!(generation, error = %message, "Connection attempt failed");
                }
                Err(Error::Connection(message.to_string()))
            }
        }
    }

    /// Close the live session, if any, and forget all state.
    ///
    /// An in-flight attempt is abandoned; its waiters get a connection error.
    ///
    /// # Errors
    ///
    /// Propagates the backend's error from closing the session. The manager
    /// is reset either way.
    pub async fn release(&self) -> Result<()> {
        let previous = {
            let mut inner = self.inner.lock().await;
            std::mem::replace(&mut inner.state, State::Closed)
        };

        match previous {
            State::Ready { backend, .. } => {
                tracing::info!("Closing Huly connection");
                backend.close().await
            }
            State::Establishing { generation, .. } => {
                tracing::info!(generation, "Abandoning in-flight connection attempt");
                Ok(())
            }
            State::Uninitialized | State::Closed => Ok(()),
        }
    }

    fn start_attempt(&self) -> Attempt {
        let connector = Arc::clone(&self.connector);
        let config = self.config.clone();

        async move {
            let timeout = config.connect_timeout;
            match tokio::time::timeout(timeout, connector.connect(&config)).await {
                Ok(Ok(backend)) => Ok(backend),
                Ok(Err(Error::Connection(message))) => Err(Arc::from(message)),
                Ok(Err(e)) => Err(Arc::from(e.to_string())),
                Err(_) => Err(Arc::from(format!(
                    "timed out after {}s",
                    timeout.as_secs_f64()
                ))),
            }
        }
        .boxed()
        .shared()
    }
}
