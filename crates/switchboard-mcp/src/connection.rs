//! One pooled connection to a suite

use serde_json::{Map, Value};
use std::sync::{Mutex, PoisonError};
use switchboard_core::{ConnectionStatus, Result, SwitchboardError, ToolDescriptor};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::session::SuiteSession;

/// A suite connection owned by the pool.
///
/// The session sits behind an async lock, so requests on one connection
/// run one at a time and their responses can never interleave.
pub struct SuiteConnection {
    suite: String,
    status: Mutex<ConnectionStatus>,
    session: AsyncMutex<Option<Box<dyn SuiteSession>>>,
}

impl std::fmt::Debug for SuiteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiteConnection")
            .field("suite", &self.suite)
            .field("status", &self.status())
            .finish()
    }
}

impl SuiteConnection {
    /// A connection whose connect attempt has just started
    pub(crate) fn connecting(suite: &str) -> Self {
        Self {
            suite: suite.to_string(),
            status: Mutex::new(ConnectionStatus::Connecting),
            session: AsyncMutex::new(None),
        }
    }

    /// A ready connection around an existing session
    #[cfg(test)]
    pub(crate) async fn ready(suite: &str, session: Box<dyn SuiteSession>) -> Self {
        let connection = Self::connecting(suite);
        connection.install(session).await;
        connection.advance(ConnectionStatus::Ready);
        connection
    }

    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the status forward. Returns false, leaving the status as is,
    /// if the transition would go backwards.
    pub(crate) fn advance(&self, next: ConnectionStatus) -> bool {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if !status.can_advance_to(next) {
            return false;
        }
        debug!("Suite '{}' connection: {} -> {}", self.suite, *status, next);
        *status = next;
        true
    }

    pub(crate) async fn install(&self, session: Box<dyn SuiteSession>) {
        *self.session.lock().await = Some(session);
    }

    /// The suite's subtool catalog, fetched over the live session
    pub(crate) async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut slot = self.session.lock().await;
        let session = self.ready_session(&mut slot)?;
        session.list_tools().await
    }

    /// Invoke a subtool over the live session
    pub(crate) async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Value> {
        let mut slot = self.session.lock().await;
        let session = self.ready_session(&mut slot)?;
        session.call_tool(name, arguments).await
    }

    fn ready_session<'a>(
        &self,
        slot: &'a mut Option<Box<dyn SuiteSession>>,
    ) -> Result<&'a mut Box<dyn SuiteSession>> {
        match slot {
            Some(session) if self.status() == ConnectionStatus::Ready => Ok(session),
            _ => Err(SwitchboardError::connection(&self.suite, "connection is closed")),
        }
    }

    /// Whether the connection can still serve requests.
    ///
    /// A session busy with a request is assumed alive.
    pub async fn is_alive(&self) -> bool {
        if self.status() != ConnectionStatus::Ready {
            return false;
        }
        let slot = match self.session.try_lock() {
            Ok(slot) => slot,
            Err(_) => return true,
        };
        match slot.as_ref() {
            Some(session) => session.is_connected().await,
            None => false,
        }
    }

    /// Close the session, if any. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        self.advance(ConnectionStatus::Closed);

        let session = self.session.lock().await.take();
        match session {
            Some(mut session) => {
                debug!("Closing connection to suite '{}'", self.suite);
                session.close().await.map_err(|e| {
                    warn!("Error closing suite '{}': {}", self.suite, e);
                    e
                })
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockSuiteSession;

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut session = MockSuiteSession::new();
        session.expect_close().times(1).returning(|| Ok(()));
        let connection = SuiteConnection::ready("weather", Box::new(session)).await;

        connection.close().await.unwrap();
        connection.close().await.unwrap();

        assert_eq!(connection.status(), ConnectionStatus::Closed);
        assert!(!connection.is_alive().await);
        let err = connection.list_tools().await.unwrap_err();
        assert_eq!(err.kind(), "connection_error");
    }

    #[tokio::test]
    async fn test_status_never_goes_backwards() {
        let connection = SuiteConnection::connecting("weather");
        assert!(connection.advance(ConnectionStatus::Failed));
        assert!(!connection.advance(ConnectionStatus::Ready));
        assert_eq!(connection.status(), ConnectionStatus::Failed);
    }

    #[tokio::test]
    async fn test_is_alive_asks_the_session() {
        let mut session = MockSuiteSession::new();
        session.expect_is_connected().returning(|| false);
        let connection = SuiteConnection::ready("weather", Box::new(session)).await;

        assert!(!connection.is_alive().await);
    }
}
