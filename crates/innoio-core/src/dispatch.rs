//! Emission of computed deltas as gauge metrics.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{Counter, DeltaSet, Snapshot};

/// Plugin name attached to every emitted metric.
pub const PLUGIN_NAME: &str = "mysql_innodb_io";

/// Metric type of every emitted metric.
pub const METRIC_TYPE: &str = "gauge";

/// A single point-in-time value for the metrics pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GaugeMetric {
    pub plugin: &'static str,
    #[serde(rename = "type")]
    pub metric_type: &'static str,
    /// `<entity>:<counter>`.
    pub type_instance: String,
    pub value: u64,
}

impl GaugeMetric {
    pub fn new(entity: &str, counter: Counter, value: u64) -> Self {
        Self {
            plugin: PLUGIN_NAME,
            metric_type: METRIC_TYPE,
            type_instance: format!("{}:{}", entity, counter.as_str()),
            value,
        }
    }
}

/// Error returned by a sink for one emission.
#[derive(Debug)]
pub enum SinkError {
    Io(std::io::Error),
    Rejected(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "sink write failed: {}", e),
            SinkError::Rejected(msg) => write!(f, "sink rejected metric: {}", msg),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io(e)
    }
}

/// Destination of emitted metrics. One call per metric, no batching.
pub trait MetricSink {
    fn emit(&mut self, metric: &GaugeMetric) -> Result<(), SinkError>;
}

impl<S: MetricSink + ?Sized> MetricSink for &mut S {
    fn emit(&mut self, metric: &GaugeMetric) -> Result<(), SinkError> {
        (**self).emit(metric)
    }
}

/// Sink that keeps every metric in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub metrics: Vec<GaugeMetric>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a value by type instance (`"t1:count_read"`).
    pub fn value_of(&self, type_instance: &str) -> Option<u64> {
        self.metrics
            .iter()
            .find(|m| m.type_instance == type_instance)
            .map(|m| m.value)
    }

    pub fn clear(&mut self) {
        self.metrics.clear();
    }
}

impl MetricSink for MemorySink {
    fn emit(&mut self, metric: &GaugeMetric) -> Result<(), SinkError> {
        self.metrics.push(metric.clone());
        Ok(())
    }
}

/// Result of one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Metrics accepted by the sink.
    pub emitted: usize,
    /// Entities skipped because they were missing from the current snapshot.
    pub skipped_entities: Vec<String>,
    /// Metrics the sink failed to accept.
    pub failed: usize,
}

/// Walks a delta set and emits one gauge per (entity, counter).
#[derive(Debug, Default)]
pub struct Dispatcher {
    verbose: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs every emitted value at debug level.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Emits `deltas`. Entities not present in `current` are skipped with a
    /// warning; a failed emission never stops the remaining ones.
    pub fn dispatch<S: MetricSink + ?Sized>(
        &self,
        deltas: &DeltaSet,
        current: &Snapshot,
        sink: &mut S,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (entity, delta) in deltas.iter() {
            if !current.contains(entity) {
                warn!(entity, "{} plugin: info key not found", PLUGIN_NAME);
                report.skipped_entities.push(entity.to_string());
                continue;
            }

            for (counter, value) in delta.iter() {
                let metric = GaugeMetric::new(entity, counter, value);
                if self.verbose {
                    debug!(type_instance = %metric.type_instance, value, "sending value");
                }
                match sink.emit(&metric) {
                    Ok(()) => report.emitted += 1,
                    Err(e) => {
                        warn!(type_instance = %metric.type_instance, error = %e, "failed to emit metric");
                        report.failed += 1;
                    }
                }
            }
        }

        report
    }
}
