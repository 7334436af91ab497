//! Delta computation between consecutive snapshots.
//!
//! The engine keeps exactly one prior snapshot. Entities seen for the first
//! time report zero for every counter, so a table that appears mid-run never
//! emits its whole lifetime counter as one interval's delta.
//!
//! ## Counter resets
//!
//! `performance_schema` counters restart from zero when the server restarts
//! or the summary table is truncated. A counter lower than its prior value is
//! treated as a reset: its delta is clamped to 0 and the entity is listed in
//! [`DeltaSet::resets`]. The new value becomes the baseline as usual.

use tracing::info;

use crate::model::{Counter, DeltaSet, FileIo, Snapshot};

/// Compute u64 delta, returning `None` on counter regression.
pub fn du64(curr: u64, prev: u64) -> Option<u64> {
    curr.checked_sub(prev)
}

/// Holds the previous snapshot and turns new snapshots into deltas.
#[derive(Debug, Default)]
pub struct DeltaEngine {
    prior: Option<Snapshot>,
}

impl DeltaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes deltas for every entity in `snapshot` and makes a copy of it
    /// the new prior state. Entities absent from `snapshot` are forgotten.
    pub fn compute_deltas(&mut self, snapshot: &Snapshot) -> DeltaSet {
        let mut deltas = DeltaSet::new();

        for (entity, curr) in snapshot.iter() {
            let prev = self.prior.as_ref().and_then(|p| p.get(entity));
            let Some(prev) = prev else {
                deltas.insert(entity, FileIo::default());
                continue;
            };

            let mut delta = FileIo::default();
            let mut regressed = false;
            for counter in Counter::ALL {
                match du64(curr[counter], prev[counter]) {
                    Some(d) => delta[counter] = d,
                    None => regressed = true,
                }
            }

            if regressed {
                info!(entity, "counter reset detected, reporting zero delta");
                deltas.mark_reset(entity);
            }
            deltas.insert(entity, delta);
        }

        self.prior = Some(snapshot.clone());
        deltas
    }

    /// The snapshot the next call will diff against.
    pub fn prior(&self) -> Option<&Snapshot> {
        self.prior.as_ref()
    }

    /// Forgets the prior snapshot; the next poll is treated as the first.
    pub fn reset(&mut self) {
        self.prior = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(entities: &[(&str, FileIo)]) -> Snapshot {
        entities.iter().map(|(name, io)| (*name, *io)).collect()
    }

    #[test]
    fn test_du64() {
        assert_eq!(du64(10, 3), Some(7));
        assert_eq!(du64(3, 3), Some(0));
        assert_eq!(du64(2, 3), None);
    }

    #[test]
    fn first_sample_is_suppressed() {
        let mut engine = DeltaEngine::new();
        let deltas = engine.compute_deltas(&snap(&[
            ("t1", FileIo::new(5, 2, 100, 50)),
            ("t2", FileIo::new(u64::MAX, 1, 1, 1)),
        ]));

        assert_eq!(deltas.len(), 2);
        for (_, delta) in deltas.iter() {
            assert_eq!(*delta, FileIo::default());
        }
    }

    #[test]
    fn consecutive_samples_report_differences() {
        let mut engine = DeltaEngine::new();
        engine.compute_deltas(&snap(&[("t1", FileIo::new(5, 2, 100, 50))]));
        let deltas = engine.compute_deltas(&snap(&[("t1", FileIo::new(8, 2, 140, 50))]));

        assert_eq!(deltas.get("t1"), Some(&FileIo::new(3, 0, 40, 0)));
        assert_eq!(deltas.resets().count(), 0);
    }

    #[test]
    fn new_entity_mid_run_reports_zero() {
        let mut engine = DeltaEngine::new();
        engine.compute_deltas(&snap(&[("t1", FileIo::new(1, 1, 1, 1))]));
        let deltas = engine.compute_deltas(&snap(&[
            ("t1", FileIo::new(2, 1, 1, 1)),
            ("t2", FileIo::new(500, 500, 500, 500)),
        ]));

        assert_eq!(deltas.get("t1"), Some(&FileIo::new(1, 0, 0, 0)));
        assert_eq!(deltas.get("t2"), Some(&FileIo::default()));
    }

    #[test]
    fn dropped_entity_leaves_prior_state() {
        let mut engine = DeltaEngine::new();
        engine.compute_deltas(&snap(&[
            ("t1", FileIo::new(1, 1, 1, 1)),
            ("gone", FileIo::new(9, 9, 9, 9)),
        ]));
        let deltas = engine.compute_deltas(&snap(&[("t1", FileIo::new(2, 2, 2, 2))]));

        assert!(deltas.get("gone").is_none());
        let prior = engine.prior().unwrap();
        assert!(!prior.contains("gone"));
        assert!(prior.contains("t1"));

        // Reappearing is treated as a new entity.
        let deltas = engine.compute_deltas(&snap(&[("gone", FileIo::new(20, 20, 20, 20))]));
        assert_eq!(deltas.get("gone"), Some(&FileIo::default()));
    }

    #[test]
    fn counter_regression_is_clamped_and_flagged() {
        let mut engine = DeltaEngine::new();
        engine.compute_deltas(&snap(&[("t1", FileIo::new(100, 10, 1000, 100))]));
        let deltas = engine.compute_deltas(&snap(&[("t1", FileIo::new(4, 12, 64, 100))]));

        assert_eq!(deltas.get("t1"), Some(&FileIo::new(0, 2, 0, 0)));
        assert!(deltas.is_reset("t1"));

        // The regressed values are the new baseline.
        let deltas = engine.compute_deltas(&snap(&[("t1", FileIo::new(6, 12, 96, 100))]));
        assert_eq!(deltas.get("t1"), Some(&FileIo::new(2, 0, 32, 0)));
        assert!(!deltas.is_reset("t1"));
    }

    #[test]
    fn reset_forgets_prior() {
        let mut engine = DeltaEngine::new();
        engine.compute_deltas(&snap(&[("t1", FileIo::new(1, 1, 1, 1))]));
        engine.reset();
        assert!(engine.prior().is_none());

        let deltas = engine.compute_deltas(&snap(&[("t1", FileIo::new(9, 9, 9, 9))]));
        assert_eq!(deltas.get("t1"), Some(&FileIo::default()));
    }
}
