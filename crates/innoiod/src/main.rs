//! innoiod - InnoDB file I/O delta collector daemon.
//!
//! Polls MySQL `performance_schema` once per interval and writes per-table
//! I/O deltas to stdout, either as collectd exec plugin `PUTVAL` lines or as
//! JSON lines. Logs go to stderr.

mod sink;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use innoio_core::collector::{Connector, MysqlConnector};
use innoio_core::config::load_module_file;
use innoio_core::{Config, ConfigEntry, CycleOutcome, Engine, MetricSink};

use sink::{JsonSink, PutvalSink};

/// Output format for emitted metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// collectd exec plugin PUTVAL lines.
    Putval,
    /// One JSON object per line.
    Json,
}

/// InnoDB file I/O delta collector daemon.
#[derive(Parser)]
#[command(name = "innoiod", about = "InnoDB file I/O delta collector", version)]
struct Args {
    /// collectd-style module block with Host/Port/User/Password/Socket/Verbose.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// MySQL host (overrides the config file).
    #[arg(long)]
    host: Option<String>,

    /// MySQL port (overrides the config file).
    #[arg(long)]
    port: Option<u16>,

    /// MySQL user (overrides the config file).
    #[arg(long)]
    user: Option<String>,

    /// MySQL password (overrides the config file).
    #[arg(long, env = "MYSQL_PWD", hide_env_values = true)]
    password: Option<String>,

    /// Unix socket path; takes precedence over host/port.
    #[arg(long)]
    socket: Option<String>,

    /// Poll interval in seconds.
    #[arg(short, long, env = "COLLECTD_INTERVAL", default_value = "10", value_parser = parse_interval)]
    interval: Duration,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Putval)]
    format: Format,

    /// Host name used in PUTVAL identifiers.
    #[arg(long, env = "COLLECTD_HOSTNAME", default_value = "localhost")]
    hostname: String,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid interval '{}': {}", s, e))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("interval must be positive, got '{}'", s));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid interval '{}': {}", s, e))
}

/// Flags given on the command line, as config entries layered after the file.
fn cli_entries(args: &Args) -> Vec<ConfigEntry> {
    let mut entries = Vec::new();
    if let Some(ref host) = args.host {
        entries.push(ConfigEntry::new("Host", host.as_str()));
    }
    if let Some(port) = args.port {
        entries.push(ConfigEntry::new("Port", port.to_string()));
    }
    if let Some(ref user) = args.user {
        entries.push(ConfigEntry::new("User", user.as_str()));
    }
    if let Some(ref password) = args.password {
        entries.push(ConfigEntry::new("Password", password.as_str()));
    }
    if let Some(ref socket) = args.socket {
        entries.push(ConfigEntry::new("Socket", socket.as_str()));
    }
    entries
}

/// Initializes the tracing subscriber on stderr.
/// Default level is INFO. `Verbose true` in the config acts like -v.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["innoiod", "innoio_core"] {
        match format!("{}={}", target, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("invalid log directive for {}: {}", target, e),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Creates the engine and applies every entry, reporting an empty set.
fn build_engine<C: Connector>(connector: C, entries: &[ConfigEntry]) -> Engine<C> {
    let mut engine = Engine::new(connector, Config::default());
    engine.configure(entries);
    engine
}

fn build_sink(args: &Args) -> Box<dyn MetricSink> {
    let stdout = io::stdout();
    match args.format {
        Format::Putval => Box::new(PutvalSink::new(
            stdout,
            args.hostname.as_str(),
            args.interval.as_secs_f64(),
        )),
        Format::Json => Box::new(JsonSink::new(stdout, args.hostname.as_str())),
    }
}

fn main() {
    let args = Args::parse();

    let file_entries = match args.config.as_deref().map(load_module_file) {
        Some(Ok(entries)) => entries,
        Some(Err(e)) => {
            eprintln!("innoiod: {}", e);
            std::process::exit(2);
        }
        None => Vec::new(),
    };
    let mut entries = file_entries;
    entries.extend(cli_entries(&args));

    // Peek at Verbose before logging is up; the engine applies entries for real.
    let mut peek = Config::default();
    let _ = peek.apply(&entries);
    let verbosity = if peek.verbose { args.verbose.max(1) } else { args.verbose };
    init_logging(verbosity, args.quiet);

    info!("innoiod {} starting", env!("CARGO_PKG_VERSION"));

    let mut engine = build_engine(MysqlConnector::new(), &entries);

    if let Err(e) = engine.config().validate() {
        error!(error = %e, "no usable connection strategy");
        std::process::exit(2);
    }

    let target = engine.config().connect_target();
    info!(
        "Config: target={}, user={}, interval={:?}, format={:?}",
        target,
        engine.config().user,
        args.interval,
        args.format
    );

    if engine.connect().is_err() {
        warn!("MySQL not reachable yet, polling continues with backoff");
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let mut sink = build_sink(&args);
    let interval = args.interval;
    let mut cycles: u64 = 0;

    info!("Starting collection loop");

    while running.load(Ordering::SeqCst) {
        cycles += 1;
        match engine.poll(sink.as_mut()) {
            CycleOutcome::Dispatched(report) => {
                debug!(
                    "Cycle #{}: {} metrics emitted, {} skipped entities, {} failed",
                    cycles,
                    report.emitted,
                    report.skipped_entities.len(),
                    report.failed
                );
            }
            CycleOutcome::Skipped { remaining } => {
                debug!("Cycle #{}: backing off, {} cycles to reconnect", cycles, remaining);
            }
            CycleOutcome::ReconnectFailed(e) => {
                warn!("Cycle #{}: reconnect failed ({})", cycles, e);
            }
            CycleOutcome::SampleFailed(e) => {
                warn!("Cycle #{}: sample failed ({})", cycles, e);
            }
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutting down...");
    engine.shutdown();
    let _ = io::stdout().flush();
    info!("Shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn parse_interval_accepts_collectd_format() {
        assert_eq!(parse_interval("10"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_interval("10.000"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_interval("0.5"), Ok(Duration::from_millis(500)));
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("-1").is_err());
        assert!(parse_interval("soon").is_err());
    }

    #[test]
    fn parse_interval_rejects_out_of_range_values() {
        assert!(parse_interval("1e20").is_err());
        assert!(parse_interval("inf").is_err());
        assert!(parse_interval("NaN").is_err());

        let err = Args::try_parse_from(["innoiod", "--interval", "1e20"]);
        assert!(err.is_err());
    }

    #[test]
    fn cli_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Host \"10.0.0.10\"").unwrap();
        writeln!(file, "User \"root\"").unwrap();

        let args = Args::parse_from([
            "innoiod",
            "--config",
            file.path().to_str().unwrap(),
            "--user",
            "monitor",
            "--socket",
            "/tmp/mysql.sock",
        ]);

        let mut entries = load_module_file(args.config.as_deref().unwrap()).unwrap();
        entries.extend(cli_entries(&args));

        let mut config = Config::default();
        config.apply(&entries).unwrap();
        assert_eq!(config.host, "10.0.0.10");
        assert_eq!(config.user, "monitor");
        assert_eq!(config.socket, "/tmp/mysql.sock");
    }

    #[test]
    fn build_engine_applies_entries() {
        use innoio_core::collector::mock::{MockConnector, MockScript};

        let engine = build_engine(MockConnector::new(MockScript::new()), &[]);
        assert_eq!(engine.config(), &Config::default());

        let entries = [ConfigEntry::new("Port", "3307"), ConfigEntry::new("User", "monitor")];
        let engine = build_engine(MockConnector::new(MockScript::new()), &entries);
        assert_eq!(engine.config().port, 3307);
        assert_eq!(engine.config().user, "monitor");
    }

    #[test]
    fn default_args() {
        let args = Args::parse_from(["innoiod"]);
        assert_eq!(args.format, Format::Putval);
        assert_eq!(args.interval, Duration::from_secs(10));
        assert!(cli_entries(&args).iter().all(|e| e.key == "Password"));
    }
}
