//! Countdown-based reconnect backoff.
//!
//! State is a single counter:
//! - `0` — healthy, poll normally;
//! - `1` — attempt a reconnect this cycle;
//! - `n > 1` — skip this cycle and count down.
//!
//! Any connect or sample failure sets the counter to [`BACKOFF_CYCLES`], so a
//! dead server is retried once every ten cycles instead of on every tick.

use tracing::debug;

/// Cycles to wait after a failure before the next reconnect attempt.
pub const BACKOFF_CYCLES: u32 = 10;

/// What the current cycle should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Sample with the existing session.
    Proceed,
    /// Reconnect first, then sample if that succeeded.
    Reconnect,
    /// Do nothing this cycle.
    Skip { remaining: u32 },
}

#[derive(Debug, Default)]
pub struct ReconnectPolicy {
    state: u32,
}

impl ReconnectPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides the cycle's action. Counts down while backing off.
    pub fn gate(&mut self) -> Gate {
        match self.state {
            0 => Gate::Proceed,
            1 => Gate::Reconnect,
            n => {
                self.state = n - 1;
                debug!(remaining = self.state, "reconnect backoff, skipping cycle");
                Gate::Skip {
                    remaining: self.state,
                }
            }
        }
    }

    /// Records a reconnect attempt's outcome.
    pub fn on_connect<T, E>(&mut self, result: &Result<T, E>) {
        self.state = match result {
            Ok(_) => 0,
            Err(_) => BACKOFF_CYCLES,
        };
    }

    /// Records a failed sample on an open (or missing) session.
    pub fn on_sample_failure(&mut self) {
        self.backoff_from_start();
    }

    /// Starts a full backoff window, as after a failed startup connect.
    pub fn backoff_from_start(&mut self) {
        self.state = BACKOFF_CYCLES;
    }

    pub fn state(&self) -> u32 {
        self.state
    }
}
