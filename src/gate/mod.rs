//! Lazy, single-flight initialization of the shared `Database`.
//!
//! One `InitGate` is built at startup and handed to the HTTP layer. The first
//! caller to find it uninitialized starts construction on a background task;
//! callers arriving meanwhile subscribe to the same outcome over a `watch`
//! channel and give up after the configured deadline. A failed attempt leaves
//! the gate retryable by the next caller.

pub mod connector;

pub use connector::Connector;

use crate::db::{Database, DbError};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

type Outcome = Result<Arc<Database>, Arc<DbError>>;

enum State {
    Uninitialized,
    Initializing(watch::Receiver<Option<Outcome>>),
    Ready(Arc<Database>),
    Failed(Arc<DbError>),
}

/// Observable lifecycle of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Error)]
pub enum GateError {
    /// Construction failed; a later call starts a new attempt.
    #[error("database initialization failed: {0}")]
    Init(#[source] Arc<DbError>),
    /// The caller stopped waiting; the attempt itself carries on.
    #[error("timed out after {0:?} waiting for database initialization")]
    Timeout(Duration),
    /// The construction task ended without reporting an outcome.
    #[error("database initialization was aborted")]
    Aborted,
}

#[derive(Clone)]
pub struct InitGate {
    inner: Arc<Inner>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    deadline: Duration,
    attempts: AtomicUsize,
    state: Mutex<State>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for InitGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitGate")
            .field("connector", &self.inner.connector)
            .field("deadline", &self.inner.deadline)
            .field("status", &self.status())
            .finish()
    }
}

impl InitGate {
    /// Create an uninitialized gate. `deadline` bounds how long a caller waits
    /// on an attempt started by someone else.
    pub fn new(connector: Arc<dyn Connector>, deadline: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                deadline,
                attempts: AtomicUsize::new(0),
                state: Mutex::new(State::Uninitialized),
            }),
        }
    }

    pub fn status(&self) -> GateStatus {
        match &*self.inner.lock_state() {
            State::Uninitialized => GateStatus::Uninitialized,
            State::Initializing(_) => GateStatus::Initializing,
            State::Ready(_) => GateStatus::Ready,
            State::Failed(_) => GateStatus::Failed,
        }
    }

    /// Why the last attempt failed, while the gate sits in `Failed`.
    pub fn last_error(&self) -> Option<Arc<DbError>> {
        match &*self.inner.lock_state() {
            State::Failed(e) => Some(Arc::clone(e)),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == GateStatus::Ready
    }

    /// Number of construction attempts started so far.
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Duration {
        self.inner.deadline
    }

    /// Return the shared database, initializing it first if needed.
    ///
    /// The caller that starts an attempt waits for its outcome without a
    /// deadline; every other caller waits at most `deadline`.
    ///
    /// # Errors
    /// `Init` when the attempt this caller observed failed, `Timeout` when a
    /// waiter ran out of time.
    pub async fn ready(&self) -> Result<Arc<Database>, GateError> {
        let (rx, started_here) = {
            let mut state = self.inner.lock_state();
            let pending = match &*state {
                State::Ready(db) => return Ok(Arc::clone(db)),
                State::Initializing(rx) if !is_abandoned(rx) => Some(rx.clone()),
                _ => None,
            };
            match pending {
                Some(rx) => (rx, false),
                None => (self.begin(&mut state), true),
            }
        };

        if started_here {
            return wait_for_outcome(rx).await;
        }

        let deadline = self.inner.deadline;
        match tokio::time::timeout(deadline, wait_for_outcome(rx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("Timed out after {:?} waiting for database initialization", deadline);
                Err(GateError::Timeout(deadline))
            }
        }
    }

    /// Claim the transition to `Initializing` and spawn the attempt.
    ///
    /// Runs detached so the attempt completes even if the caller that started
    /// it goes away.
    fn begin(&self, state: &mut State) -> watch::Receiver<Option<Outcome>> {
        let (tx, rx) = watch::channel(None);
        *state = State::Initializing(rx.clone());
        let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            info!(attempt, "Initializing database...");
            let outcome: Outcome = inner
                .connector
                .connect()
                .await
                .map(Arc::new)
                .map_err(Arc::new);

            *inner.lock_state() = match &outcome {
                Ok(db) => {
                    info!(backend = db.backend_name(), "Database initialized");
                    State::Ready(Arc::clone(db))
                }
                Err(e) => {
                    error!(attempt, "Error initializing database: {}", e);
                    State::Failed(Arc::clone(e))
                }
            };
            tx.send_replace(Some(outcome));
        });

        rx
    }
}

/// An attempt whose task died before reporting leaves the sender dropped and
/// no value; treat the gate as retryable.
fn is_abandoned(rx: &watch::Receiver<Option<Outcome>>) -> bool {
    rx.borrow().is_none() && rx.has_changed().is_err()
}

async fn wait_for_outcome(
    mut rx: watch::Receiver<Option<Outcome>>,
) -> Result<Arc<Database>, GateError> {
    let outcome = rx
        .wait_for(Option::is_some)
        .await
        .map_err(|_| GateError::Aborted)?;
    match &*outcome {
        Some(Ok(db)) => Ok(Arc::clone(db)),
        Some(Err(e)) => Err(GateError::Init(Arc::clone(e))),
        None => Err(GateError::Aborted),
    }
}
