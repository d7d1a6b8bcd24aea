//! Connection lifecycle
//!
//! Two states: Disconnected (initial) and Connected. `connect` moves to
//! Connected or stays Disconnected and reports why; `disconnect` always
//! ends in Disconnected. There is never more than one open handle.

use crate::config::ConnectionConfig;
use crate::db::Database;
use crate::db::postgres::PostgresProvider;
use crate::error::{DbError, DbResult};
use tracing::{debug, info, warn};

/// Where the manager is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Owns the single database session
pub struct ConnectionManager<D: Database = PostgresProvider> {
    handle: Option<D>,
    /// Label of the current connection, for status lines
    target: Option<String>,
}

impl<D: Database> ConnectionManager<D> {
    pub fn new() -> Self {
        Self {
            handle: None,
            target: None,
        }
    }

    /// Open a session using `config`.
    ///
    /// An already-open session is closed first. On failure the manager is
    /// left Disconnected.
    ///
    /// # Errors
    /// Returns `DbError::ConnectionFailed` when a required setting is empty,
    /// or the server is unreachable or rejects the credentials
    pub async fn connect(&mut self, config: &ConnectionConfig) -> DbResult<&D> {
        self.disconnect().await;

        config
            .validate()
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let label = config.display_name();
        info!("Connecting to {}", label);
        match D::connect(config).await {
            Ok(db) => {
                info!("Connected to {}", label);
                self.target = Some(label);
                Ok(self.handle.insert(db))
            }
            Err(e) => {
                warn!("Connection to {} failed: {}", label, e);
                Err(e)
            }
        }
    }

    /// Round-trip on the current session. `false` when there is no session
    /// or the round-trip fails; never an error.
    pub async fn test_connection(&self) -> bool {
        match self.server_version().await {
            Ok(version) => {
                debug!("Connection check ok: {}", version);
                true
            }
            Err(e) => {
                debug!("Connection check failed: {}", e);
                false
            }
        }
    }

    /// The server's version string, fetched with a round-trip
    pub async fn server_version(&self) -> DbResult<String> {
        self.handle()?.ping().await
    }

    /// Close the session if one is open. Calling it again is a no-op.
    pub async fn disconnect(&mut self) {
        if let Some(db) = self.handle.take() {
            let label = self.target.take().unwrap_or_default();
            db.close().await;
            info!("Disconnected from {}", label);
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.handle.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Label of the current connection (`db@host:port`)
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Borrow the open session
    ///
    /// # Errors
    /// Returns `DbError::NotConnected` while Disconnected
    pub fn handle(&self) -> DbResult<&D> {
        self.handle.as_ref().ok_or(DbError::NotConnected)
    }
}

impl<D: Database> Default for ConnectionManager<D> {
    fn default() -> Self {
        Self::new()
    }
}
