//! Output sinks for the daemon.
//!
//! `PutvalSink` speaks the collectd exec plugin text protocol, so the daemon
//! can run under `<Plugin exec>`. `JsonSink` writes one JSON object per line
//! for log shippers.

use std::io::Write;

use chrono::{SecondsFormat, Utc};
use innoio_core::{GaugeMetric, MetricSink, SinkError};
use serde::Serialize;

/// collectd exec plugin `PUTVAL` lines.
pub struct PutvalSink<W: Write> {
    out: W,
    hostname: String,
    interval_secs: f64,
}

impl<W: Write> PutvalSink<W> {
    pub fn new(out: W, hostname: impl Into<String>, interval_secs: f64) -> Self {
        Self {
            out,
            hostname: hostname.into(),
            interval_secs,
        }
    }
}

/// Formats one metric as a `PUTVAL` command.
pub fn format_putval(metric: &GaugeMetric, hostname: &str, interval_secs: f64) -> String {
    format!(
        "PUTVAL \"{}/{}/{}-{}\" interval={} N:{}",
        hostname,
        metric.plugin,
        metric.metric_type,
        metric.type_instance,
        interval_secs,
        metric.value
    )
}

impl<W: Write> MetricSink for PutvalSink<W> {
    fn emit(&mut self, metric: &GaugeMetric) -> Result<(), SinkError> {
        let line = format_putval(metric, &self.hostname, self.interval_secs);
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    time: String,
    host: &'a str,
    #[serde(flatten)]
    metric: &'a GaugeMetric,
}

/// Newline-delimited JSON.
pub struct JsonSink<W: Write> {
    out: W,
    hostname: String,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W, hostname: impl Into<String>) -> Self {
        Self {
            out,
            hostname: hostname.into(),
        }
    }
}

impl<W: Write> MetricSink for JsonSink<W> {
    fn emit(&mut self, metric: &GaugeMetric) -> Result<(), SinkError> {
        let line = JsonLine {
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            host: &self.hostname,
            metric,
        };
        serde_json::to_writer(&mut self.out, &line).map_err(|e| {
            if e.is_io() {
                SinkError::Io(std::io::Error::other(e))
            } else {
                SinkError::Rejected(e.to_string())
            }
        })?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
