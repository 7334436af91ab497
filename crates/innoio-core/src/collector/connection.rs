//! Ownership of the data-source session.

use tracing::{debug, error, info};

use super::{ConnectError, Connector, Credentials, Session};
use crate::config::{Config, ConnectTarget};

/// Owns the single session to the server.
///
/// Nothing else holds the session; the sampler borrows it for the duration of
/// one query through [`ConnectionManager::session_mut`].
pub struct ConnectionManager<C: Connector> {
    connector: C,
    target: ConnectTarget,
    credentials: Credentials,
    session: Option<Box<dyn Session>>,
    last_error: Option<String>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, config: &Config) -> Self {
        Self {
            connector,
            target: config.connect_target(),
            credentials: Credentials {
                user: config.user.clone(),
                password: config.password.clone(),
            },
            session: None,
            last_error: None,
        }
    }

    /// Re-reads target and credentials. The open session, if any, is kept
    /// until the next [`connect`](Self::connect).
    pub fn reconfigure(&mut self, config: &Config) {
        self.target = config.connect_target();
        self.credentials = Credentials {
            user: config.user.clone(),
            password: config.password.clone(),
        };
    }

    /// Opens a new session, replacing any existing one.
    ///
    /// Failures are logged here; the caller only decides the backoff.
    pub fn connect(&mut self) -> Result<(), ConnectError> {
        debug!(addr = %self.target, user = %self.credentials.user, "connecting to MySQL");
        self.session = None;

        match self.connector.connect(&self.target, &self.credentials) {
            Ok(session) => {
                self.session = Some(session);
                self.last_error = None;
                info!(addr = %self.target, "connected to MySQL");
                Ok(())
            }
            Err(e) => {
                error!(addr = %self.target, error = %e, "couldn't connect to MySQL");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Drops a session that failed mid-use.
    pub fn invalidate(&mut self) {
        if self.session.take().is_some() {
            debug!("dropping broken MySQL session");
        }
    }

    /// Releases the session. Safe to call when nothing is open.
    pub fn close(&mut self) {
        match self.session.take() {
            Some(session) => {
                drop(session);
                info!(addr = %self.target, "MySQL connection closed");
            }
            None => debug!("close called without an open MySQL connection"),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_mut(&mut self) -> Option<&mut (dyn Session + 'static)> {
        self.session.as_deref_mut()
    }

    /// Last connect error message, cleared on success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
