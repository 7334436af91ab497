//! Data-source side of the collector.
//!
//! ```text
//!                  ┌────────────────────────┐
//!                  │   ConnectionManager    │  owns the session, opens/closes it
//!                  │   ┌────────────────┐   │
//!                  │   │   Connector    │   │  (trait) MysqlConnector / MockConnector
//!                  │   └───────┬────────┘   │
//!                  └───────────┼────────────┘
//!                              │ Box<dyn Session>
//!                      ┌───────▼────────┐
//!                      │    Sampler     │  one query → Snapshot
//!                      └────────────────┘
//! ```
//!
//! The [`Session`] trait is the only place where the real server is touched;
//! everything above it is exercised in tests through the [`mock`] module.

mod connection;
pub mod mock;
mod sampler;
#[cfg(feature = "mysql")]
mod server;

use std::fmt;

use crate::config::ConnectTarget;

pub use connection::ConnectionManager;
#[cfg(feature = "mysql")]
pub use server::{MysqlConnector, MysqlSession};
pub use sampler::{FILE_IO_QUERY, Sampler, entity_name};

/// Error raised while opening a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Server unreachable (refused, DNS failure, missing socket).
    Unreachable(String),
    /// Server rejected the credentials or the handshake.
    Rejected(String),
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::Unreachable(msg) => write!(f, "MySQL unreachable: {}", msg),
            ConnectError::Rejected(msg) => write!(f, "MySQL rejected connection: {}", msg),
        }
    }
}

impl std::error::Error for ConnectError {}

/// Error raised while sampling over an open (or missing) session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    /// No session is open.
    NotConnected,
    /// Query execution failed.
    QueryError(String),
    /// A returned row could not be decoded.
    RowError(String),
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::NotConnected => write!(f, "MySQL: not connected"),
            SampleError::QueryError(msg) => write!(f, "MySQL query error: {}", msg),
            SampleError::RowError(msg) => write!(f, "MySQL row error: {}", msg),
        }
    }
}

impl std::error::Error for SampleError {}

/// Login credentials passed to a [`Connector`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// One raw row of `performance_schema.file_summary_by_instance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIoRow {
    pub file_name: String,
    pub count_read: u64,
    pub count_write: u64,
    pub bytes_read: u64,
    pub bytes_write: u64,
}

/// An open connection able to fetch file I/O counters.
pub trait Session {
    /// Runs the file I/O summary query and returns the raw rows.
    fn fetch_file_io(&mut self) -> Result<Vec<FileIoRow>, SampleError>;
}

/// Opens sessions. Implementations must not retry internally.
pub trait Connector {
    fn connect(
        &self,
        target: &ConnectTarget,
        credentials: &Credentials,
    ) -> Result<Box<dyn Session>, ConnectError>;
}
