//! Composition root: one poll cycle end to end.
//!
//! ```text
//! poll ─▶ ReconnectPolicy::gate ─┬─ Skip ─────────────────────────────▶ done
//!                                ├─ Reconnect ─▶ connect ─ fail ──────▶ done
//!                                │                  │ ok
//!                                └─ Proceed ────────┴─▶ Sampler::sample ─ fail ─▶ backoff, done
//!                                                          │ ok
//!                                                          ▼
//!                                         DeltaEngine::compute_deltas ─▶ Dispatcher::dispatch
//! ```
//!
//! No failure leaves [`Engine::poll`]; every error ends up either in a log
//! line or in a [`ReconnectPolicy`] transition.

use tracing::{debug, error, info, warn};

use crate::collector::{ConnectError, ConnectionManager, Connector, SampleError, Sampler};
use crate::config::{Config, ConfigEntry};
use crate::delta::DeltaEngine;
use crate::dispatch::{DispatchReport, Dispatcher, MetricSink};
use crate::model::Snapshot;
use crate::reconnect::{Gate, ReconnectPolicy};

/// Lifecycle hooks a host agent drives, in call order.
pub trait Lifecycle {
    /// Applies configuration before the first connect.
    fn configure(&mut self, entries: &[ConfigEntry]);
    /// Opens the initial connection. Failure starts the backoff instead of
    /// aborting startup.
    fn init(&mut self) -> Result<(), ConnectError>;
    /// Runs one scheduling tick.
    fn poll(&mut self, sink: &mut dyn MetricSink) -> CycleOutcome;
    /// Releases the connection. Later calls are no-ops.
    fn shutdown(&mut self);
}

/// What a single poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Deltas were computed and handed to the sink.
    Dispatched(DispatchReport),
    /// Backing off; `remaining` cycles until the reconnect attempt.
    Skipped { remaining: u32 },
    /// The scheduled reconnect failed; a new backoff window started.
    ReconnectFailed(ConnectError),
    /// Sampling failed; a backoff window started and nothing was dispatched.
    SampleFailed(SampleError),
}

/// Stateful delta-metric engine bound to one data source.
pub struct Engine<C: Connector> {
    config: Config,
    connection: ConnectionManager<C>,
    sampler: Sampler,
    deltas: DeltaEngine,
    policy: ReconnectPolicy,
    dispatcher: Dispatcher,
    shut_down: bool,
}

impl<C: Connector> Engine<C> {
    pub fn new(connector: C, config: Config) -> Self {
        let connection = ConnectionManager::new(connector, &config);
        let dispatcher = Dispatcher::new().with_verbose(config.verbose);
        Self {
            config,
            connection,
            sampler: Sampler::new(),
            deltas: DeltaEngine::new(),
            policy: ReconnectPolicy::new(),
            dispatcher,
            shut_down: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current reconnect countdown (0 = healthy).
    pub fn reconnect_state(&self) -> u32 {
        self.policy.state()
    }

    /// Snapshot the next cycle diffs against.
    pub fn prior(&self) -> Option<&Snapshot> {
        self.deltas.prior()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Applies configuration entries. Errors are logged, defaults are kept.
    pub fn configure(&mut self, entries: &[ConfigEntry]) {
        if let Err(e) = self.config.apply(entries) {
            error!(error = %e, "configuration error");
        }
        self.connection.reconfigure(&self.config);
        self.dispatcher.set_verbose(self.config.verbose);
        debug!(config = ?self.config, "configuration applied");
    }

    /// Opens the initial connection.
    pub fn connect(&mut self) -> Result<(), ConnectError> {
        let result = self.connection.connect();
        if result.is_ok() {
            self.policy.on_connect(&result);
        } else {
            self.policy.backoff_from_start();
            warn!(
                cycles = self.policy.state(),
                "initial connection failed, will retry after backoff"
            );
        }
        result
    }

    /// Runs one poll cycle and emits deltas into `sink`.
    pub fn poll<S: MetricSink + ?Sized>(&mut self, sink: &mut S) -> CycleOutcome {
        match self.policy.gate() {
            Gate::Proceed => {}
            Gate::Skip { remaining } => return CycleOutcome::Skipped { remaining },
            Gate::Reconnect => {
                let result = self.connection.connect();
                self.policy.on_connect(&result);
                match result {
                    Ok(()) => info!("reconnected to MySQL"),
                    Err(e) => return CycleOutcome::ReconnectFailed(e),
                }
            }
        }

        let snapshot = match self.sampler.sample_checked(self.connection.session_mut()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "couldn't sample file io, backing off");
                self.connection.invalidate();
                self.policy.on_sample_failure();
                return CycleOutcome::SampleFailed(e);
            }
        };

        let deltas = self.deltas.compute_deltas(&snapshot);
        let report = self.dispatcher.dispatch(&deltas, &snapshot, sink);

        debug!(
            entities = deltas.len(),
            emitted = report.emitted,
            skipped = report.skipped_entities.len(),
            failed = report.failed,
            "poll cycle complete"
        );
        CycleOutcome::Dispatched(report)
    }

    /// Closes the connection once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            debug!("shutdown already done");
            return;
        }
        self.shut_down = true;
        self.connection.close();
    }
}

impl<C: Connector> Lifecycle for Engine<C> {
    fn configure(&mut self, entries: &[ConfigEntry]) {
        Engine::configure(self, entries);
    }

    fn init(&mut self) -> Result<(), ConnectError> {
        Engine::connect(self)
    }

    fn poll(&mut self, sink: &mut dyn MetricSink) -> CycleOutcome {
        Engine::poll(self, sink)
    }

    fn shutdown(&mut self) {
        Engine::shutdown(self);
    }
}
