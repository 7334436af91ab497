//! Scripted data source for testing without a MySQL server.
//!
//! [`MockConnector`] hands out [`MockSession`]s that replay queued sample
//! results. Connect outcomes and sample results are shared through an `Rc`, so
//! a test keeps a handle to the script and can push more results after the
//! connector moved into an engine.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{ConnectError, Connector, Credentials, FileIoRow, SampleError, Session};
use crate::config::ConnectTarget;
use crate::model::FileIo;

/// Builds a raw row from an entity name and cumulative counters.
pub fn file_io_row(file_name: &str, io: FileIo) -> FileIoRow {
    FileIoRow {
        file_name: file_name.to_string(),
        count_read: io.count_read,
        count_write: io.count_write,
        bytes_read: io.bytes_read,
        bytes_write: io.bytes_write,
    }
}

/// A session replaying queued sample results from a [`MockScript`]. An
/// exhausted queue fails like a dropped connection.
#[derive(Debug, Default)]
pub struct MockSession {
    script: MockScript,
}

impl MockSession {
    /// A standalone session over its own script.
    pub fn new(results: Vec<Result<Vec<FileIoRow>, SampleError>>) -> Self {
        let script = MockScript::new();
        script.0.borrow_mut().samples.extend(results);
        Self { script }
    }
}

impl Session for MockSession {
    fn fetch_file_io(&mut self) -> Result<Vec<FileIoRow>, SampleError> {
        self.script.next_sample()
    }
}

#[derive(Debug, Default)]
struct Script {
    connects: VecDeque<Result<(), ConnectError>>,
    samples: VecDeque<Result<Vec<FileIoRow>, SampleError>>,
    connect_calls: Vec<ConnectTarget>,
}

/// Shared handle to a mock script.
#[derive(Debug, Clone, Default)]
pub struct MockScript(Rc<RefCell<Script>>);

impl MockScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome of the next `connect` call. Unqueued connects succeed.
    pub fn push_connect(&self, result: Result<(), ConnectError>) -> &Self {
        self.0.borrow_mut().connects.push_back(result);
        self
    }

    /// Queues a successful sample with the given rows.
    pub fn push_rows(&self, rows: Vec<FileIoRow>) -> &Self {
        self.0.borrow_mut().samples.push_back(Ok(rows));
        self
    }

    /// Queues a successful sample built from `(file name, counters)` pairs.
    pub fn push_sample(&self, files: &[(&str, FileIo)]) -> &Self {
        let rows = files
            .iter()
            .map(|(name, io)| file_io_row(name, *io))
            .collect();
        self.push_rows(rows)
    }

    /// Queues a failing sample.
    pub fn push_sample_error(&self, error: SampleError) -> &Self {
        self.0.borrow_mut().samples.push_back(Err(error));
        self
    }

    /// Targets passed to every `connect` call so far.
    pub fn connect_calls(&self) -> Vec<ConnectTarget> {
        self.0.borrow().connect_calls.clone()
    }

    pub fn pending_samples(&self) -> usize {
        self.0.borrow().samples.len()
    }

    fn next_sample(&self) -> Result<Vec<FileIoRow>, SampleError> {
        self.0
            .borrow_mut()
            .samples
            .pop_front()
            .unwrap_or_else(|| Err(SampleError::QueryError("mock script exhausted".to_string())))
    }
}

/// Connector whose sessions read from a shared [`MockScript`].
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    script: MockScript,
}

impl MockConnector {
    pub fn new(script: MockScript) -> Self {
        Self { script }
    }
}

impl Connector for MockConnector {
    fn connect(
        &self,
        target: &ConnectTarget,
        _credentials: &Credentials,
    ) -> Result<Box<dyn Session>, ConnectError> {
        let outcome = {
            let mut script = self.script.0.borrow_mut();
            script.connect_calls.push(target.clone());
            script.connects.pop_front().unwrap_or(Ok(()))
        };
        outcome?;
        Ok(Box::new(MockSession {
            script: self.script.clone(),
        }))
    }
}
