//! innoio-core — InnoDB file I/O delta collector.
//!
//! Polls `performance_schema.file_summary_by_instance` for cumulative InnoDB
//! data-file counters, turns them into per-interval deltas and emits one
//! gauge per (table, counter).
//!
//! Provides:
//! - `config` — typed configuration and collectd module block parsing
//! - `collector` — connection ownership, sampling, MySQL and mock sources
//! - `model` — snapshot and delta types
//! - `delta` — prior-state tracking and delta computation
//! - `reconnect` — countdown backoff state machine
//! - `dispatch` — gauge metrics and sinks
//! - `engine` — one poll cycle end to end, host lifecycle hooks
//!
//! With `mysql` feature (default): `collector::MysqlConnector`.

pub mod collector;
pub mod config;
pub mod delta;
pub mod dispatch;
pub mod engine;
pub mod model;
pub mod reconnect;

pub use config::{Config, ConfigEntry, ConfigError};
pub use dispatch::{GaugeMetric, MetricSink, SinkError};
pub use engine::{CycleOutcome, Engine, Lifecycle};
pub use model::{Counter, DeltaSet, FileIo, Snapshot};
