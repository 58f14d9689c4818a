//! Connection pool: at most one live connection per suite.
//!
//! Connections are created on first use and reused afterwards. While a
//! connect attempt is in flight the slot holds a shared future, so late
//! callers attach to that attempt instead of starting a second one.
//! Failures are not cached: the slot is cleared and the next `acquire`
//! starts over.
//!
//! After [`ConnectionPool::close_all`] the pool is terminal and `acquire`
//! fails fast with [`SwitchboardError::PoolClosed`].

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use switchboard_core::{ConnectionStatus, Result, SwitchboardError};
use tracing::{debug, info, warn};

use crate::connection::SuiteConnection;
use crate::registry::{SuiteDescriptor, SuiteRegistry};
use crate::session::SuiteConnector;

/// Default upper bound for closing one suite
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(3000);

type PendingConnect = Shared<BoxFuture<'static, std::result::Result<Arc<SuiteConnection>, ConnectFailure>>>;

/// Clonable connect failure shared by every caller attached to an attempt
#[derive(Debug, Clone)]
struct ConnectFailure {
    suite: String,
    reason: String,
    pool_closed: bool,
}

impl From<ConnectFailure> for SwitchboardError {
    fn from(failure: ConnectFailure) -> Self {
        if failure.pool_closed {
            SwitchboardError::PoolClosed {
                suite: failure.suite,
            }
        } else {
            SwitchboardError::ConnectionError {
                suite: failure.suite,
                reason: failure.reason,
            }
        }
    }
}

enum Slot {
    Connecting {
        connection: Arc<SuiteConnection>,
        pending: PendingConnect,
    },
    Ready(Arc<SuiteConnection>),
}

impl Slot {
    fn connection(&self) -> &Arc<SuiteConnection> {
        match self {
            Slot::Connecting { connection, .. } => connection,
            Slot::Ready(connection) => connection,
        }
    }
}

#[derive(Default)]
struct PoolState {
    closed: bool,
    slots: HashMap<String, Slot>,
}

struct PoolInner {
    registry: Arc<SuiteRegistry>,
    connector: Arc<dyn SuiteConnector>,
    state: Mutex<PoolState>,
    shutdown_timeout: Duration,
}

impl PoolInner {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns every suite connection for the lifetime of the server
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

enum Acquired {
    Ready(Arc<SuiteConnection>),
    Pending(PendingConnect),
}

impl ConnectionPool {
    pub fn new(registry: Arc<SuiteRegistry>, connector: Arc<dyn SuiteConnector>) -> Self {
        Self::with_shutdown_timeout(registry, connector, DEFAULT_SHUTDOWN_TIMEOUT)
    }

    pub fn with_shutdown_timeout(
        registry: Arc<SuiteRegistry>,
        connector: Arc<dyn SuiteConnector>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                registry,
                connector,
                state: Mutex::new(PoolState::default()),
                shutdown_timeout,
            }),
        }
    }

    /// Get the ready connection for `suite`, connecting if there is none.
    pub async fn acquire(&self, suite: &str) -> Result<Arc<SuiteConnection>> {
        loop {
            let acquired = self.reserve(suite)?;
            let connection = match acquired {
                Acquired::Pending(pending) => {
                    return pending.await.map_err(SwitchboardError::from);
                }
                Acquired::Ready(connection) => connection,
            };

            if connection.is_alive().await {
                return Ok(connection);
            }
            warn!("Connection to suite '{}' went away, reconnecting", suite);
            self.invalidate(&connection).await;
        }
    }

    /// Return the ready connection, the pending attempt, or start a new one
    fn reserve(&self, suite: &str) -> Result<Acquired> {
        let descriptor = self
            .inner
            .registry
            .get(suite)
            .ok_or_else(|| SwitchboardError::UnknownTool {
                name: suite.to_string(),
            })?;

        let mut state = self.inner.state();
        if state.closed {
            return Err(SwitchboardError::PoolClosed {
                suite: descriptor.name.clone(),
            });
        }

        match state.slots.get(&descriptor.name) {
            Some(Slot::Ready(connection)) => return Ok(Acquired::Ready(connection.clone())),
            Some(Slot::Connecting { pending, .. }) => {
                debug!("Joining in-flight connect to suite '{}'", descriptor.name);
                return Ok(Acquired::Pending(pending.clone()));
            }
            None => {}
        }

        info!("Connecting to suite '{}'", descriptor.name);
        let connection = Arc::new(SuiteConnection::connecting(&descriptor.name));
        let pending = connect(
            Arc::downgrade(&self.inner),
            self.inner.connector.clone(),
            descriptor.clone(),
            connection.clone(),
        )
        .boxed()
        .shared();

        state.slots.insert(
            descriptor.name.clone(),
            Slot::Connecting {
                connection,
                pending: pending.clone(),
            },
        );
        Ok(Acquired::Pending(pending))
    }

    /// Drop a dead connection so the next `acquire` reconnects.
    ///
    /// Does nothing if the slot already holds a different connection.
    pub async fn invalidate(&self, connection: &Arc<SuiteConnection>) {
        let removed = {
            let mut state = self.inner.state();
            let is_current = matches!(
                state.slots.get(connection.suite()),
                Some(Slot::Ready(existing)) if Arc::ptr_eq(existing, connection)
            );
            is_current && state.slots.remove(connection.suite()).is_some()
        };

        if removed {
            debug!("Evicted connection to suite '{}'", connection.suite());
            close_connection(connection.clone(), self.inner.shutdown_timeout).await;
        }
    }

    /// Current status of a suite's pooled connection, `None` when absent
    pub fn status(&self, suite: &str) -> Option<ConnectionStatus> {
        self.inner
            .state()
            .slots
            .get(suite)
            .map(|slot| slot.connection().status())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state().closed
    }

    /// Close every pooled connection and make the pool terminal.
    ///
    /// Best effort: suites are closed concurrently, each bounded by the
    /// shutdown timeout, and one failure does not stop the others. In-flight
    /// connect attempts are not awaited; they close their session as soon as
    /// it arrives. Calling this again is a no-op.
    pub async fn close_all(&self) {
        let connections: Vec<Arc<SuiteConnection>> = {
            let mut state = self.inner.state();
            if state.closed {
                debug!("Connection pool already closed");
                return;
            }
            state.closed = true;
            state
                .slots
                .drain()
                .map(|(_, slot)| slot.connection().clone())
                .collect()
        };

        info!("Closing {} suite connections", connections.len());
        let shutdown_timeout = self.inner.shutdown_timeout;

        let closing: Vec<_> = connections
            .into_iter()
            .map(|connection| close_connection(connection, shutdown_timeout))
            .collect();
        join_all(closing).await;
    }
}

/// Close one connection, bounded by `shutdown_timeout`. Failures are logged.
async fn close_connection(connection: Arc<SuiteConnection>, shutdown_timeout: Duration) {
    match tokio::time::timeout(shutdown_timeout, connection.close()).await {
        Ok(Ok(())) => debug!("Closed suite '{}'", connection.suite()),
        Ok(Err(e)) => warn!("Failed to close suite '{}': {}", connection.suite(), e),
        Err(_) => warn!(
            "Closing suite '{}' timed out after {:?}",
            connection.suite(),
            shutdown_timeout
        ),
    }
}

/// One connect attempt. Runs at most once however many callers await it.
async fn connect(
    pool: Weak<PoolInner>,
    connector: Arc<dyn SuiteConnector>,
    descriptor: SuiteDescriptor,
    connection: Arc<SuiteConnection>,
) -> std::result::Result<Arc<SuiteConnection>, ConnectFailure> {
    let result = connector.connect(&descriptor).await;
    let name = descriptor.name;

    let session = match result {
        Ok(session) => session,
        Err(e) => {
            connection.advance(ConnectionStatus::Failed);
            if let Some(pool) = pool.upgrade() {
                remove_if_current(&mut pool.state(), &name, &connection);
            }
            warn!("Failed to connect to suite '{}': {}", name, e);
            let reason = match e {
                SwitchboardError::ConnectionError { reason, .. } => reason,
                other => other.to_string(),
            };
            return Err(ConnectFailure {
                suite: name,
                reason,
                pool_closed: false,
            });
        }
    };

    connection.install(session).await;

    let published = match pool.upgrade() {
        Some(pool) => publish(&mut pool.state(), &name, &connection),
        None => false,
    };

    if !published {
        debug!("Pool closed while connecting to suite '{}', closing the new session", name);
        let _ = connection.close().await;
        return Err(ConnectFailure {
            suite: name,
            reason: "connection pool closed".to_string(),
            pool_closed: true,
        });
    }

    info!("Suite '{}' connected", name);
    Ok(connection)
}

/// Promote the connecting slot to ready, unless the pool closed meanwhile
fn publish(state: &mut PoolState, name: &str, connection: &Arc<SuiteConnection>) -> bool {
    if state.closed || !connection.advance(ConnectionStatus::Ready) {
        return false;
    }
    let is_current = matches!(
        state.slots.get(name),
        Some(Slot::Connecting { connection: current, .. }) if Arc::ptr_eq(current, connection)
    );
    if is_current {
        state
            .slots
            .insert(name.to_string(), Slot::Ready(connection.clone()));
    }
    true
}

fn remove_if_current(state: &mut PoolState, name: &str, connection: &Arc<SuiteConnection>) {
    let is_current = matches!(
        state.slots.get(name),
        Some(slot) if Arc::ptr_eq(slot.connection(), connection)
    );
    if is_current {
        state.slots.remove(name);
    }
}
