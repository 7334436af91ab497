//! MySQL session over the `mysql` crate.
//!
//! Requires `performance_schema` to be enabled on the server (MySQL >= 5.5).

use std::fmt;

use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder};

use super::{ConnectError, Connector, Credentials, FILE_IO_QUERY, FileIoRow, SampleError, Session};
use crate::config::ConnectTarget;

const DATABASE: &str = "performance_schema";

/// Opens real MySQL connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlConnector;

impl MysqlConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for MysqlConnector {
    fn connect(
        &self,
        target: &ConnectTarget,
        credentials: &Credentials,
    ) -> Result<Box<dyn Session>, ConnectError> {
        let mut opts = OptsBuilder::new()
            .user(Some(credentials.user.as_str()))
            .db_name(Some(DATABASE));
        if !credentials.password.is_empty() {
            opts = opts.pass(Some(credentials.password.as_str()));
        }
        opts = match target {
            ConnectTarget::Socket(path) => opts.socket(Some(path.as_str())),
            ConnectTarget::Tcp { host, port } => {
                opts.ip_or_hostname(Some(host.as_str())).tcp_port(*port)
            }
        };

        let conn = Conn::new(opts).map_err(classify_connect_error)?;
        Ok(Box::new(MysqlSession { conn }))
    }
}

/// An open connection to `performance_schema`.
pub struct MysqlSession {
    conn: Conn,
}

impl Session for MysqlSession {
    fn fetch_file_io(&mut self) -> Result<Vec<FileIoRow>, SampleError> {
        let rows = self
            .conn
            .query_opt::<RawRow, _>(FILE_IO_QUERY)
            .map_err(|e| SampleError::QueryError(format_mysql_error(&e)))?;
        convert_rows(rows)
    }
}

type RawRow = (String, u64, u64, u64, u64);

/// Converts typed rows, failing the whole sample on the first row whose shape
/// does not match the query's column list.
fn convert_rows<E: fmt::Debug>(
    rows: Vec<Result<RawRow, E>>,
) -> Result<Vec<FileIoRow>, SampleError> {
    rows.into_iter()
        .map(|row| {
            let (file_name, count_read, count_write, bytes_read, bytes_write) = row
                .map_err(|e| SampleError::RowError(format!("unexpected row shape: {:?}", e)))?;
            Ok(FileIoRow {
                file_name,
                count_read,
                count_write,
                bytes_read,
                bytes_write,
            })
        })
        .collect()
}

fn classify_connect_error(e: mysql::Error) -> ConnectError {
    let msg = format_mysql_error(&e);
    match e {
        mysql::Error::MySqlError(_) => ConnectError::Rejected(msg),
        _ => ConnectError::Unreachable(msg),
    }
}

/// Formats a MySQL error for logs.
fn format_mysql_error(e: &mysql::Error) -> String {
    match e {
        mysql::Error::MySqlError(server) => format!("{}: {}", server.code, server.message),
        mysql::Error::IoError(io) if io.kind() == std::io::ErrorKind::ConnectionRefused => {
            "connection refused".to_string()
        }
        mysql::Error::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
            "socket not found".to_string()
        }
        other => other.to_string(),
    }
}
