//! Metrics store
//!
//! The durable boundary around the engine: throttled snapshot persistence,
//! counter-baseline storage keyed by day, and archived-day history with
//! upsert semantics. State serializes to JSON so the host platform can park
//! it in whatever key-value storage it has.
//!
//! Archival is two-phase: the outgoing day is staged as a pending record
//! before the history upsert and cleared only afterwards, and a loaded
//! store replays any pending record first. A process kill between "metrics
//! reset" and "archive durably stored" therefore cannot silently lose a
//! day.

use crate::error::EngineError;
use crate::types::{DailyHistory, EngineUpdate, StepCounterBaseline, TodayMetrics};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Most recent archived days kept in history
pub const HISTORY_LIMIT: usize = 30;

/// Persist when this much time passed since the last write
const PERSIST_MAX_INTERVAL_MS: i64 = 5_000;
/// Or when at least one step accumulated and this much time passed
const PERSIST_MIN_INTERVAL_MS: i64 = 1_000;
const PERSIST_STEP_DELTA: u32 = 1;

/// Write-throttling policy for snapshot persistence.
///
/// Persist immediately when ≥5s elapsed since the last persist, or when at
/// least one step accumulated and ≥1s elapsed; otherwise batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistPolicy {
    last_persist_epoch_ms: i64,
    last_persisted_steps: u32,
}

impl PersistPolicy {
    pub fn should_persist(&self, metrics: &TodayMetrics, now_ms: i64) -> bool {
        let elapsed = now_ms - self.last_persist_epoch_ms;
        let step_delta = metrics.steps.abs_diff(self.last_persisted_steps);

        elapsed >= PERSIST_MAX_INTERVAL_MS
            || (step_delta >= PERSIST_STEP_DELTA && elapsed >= PERSIST_MIN_INTERVAL_MS)
    }

    fn mark_persisted(&mut self, metrics: &TodayMetrics, now_ms: i64) {
        self.last_persist_epoch_ms = now_ms;
        self.last_persisted_steps = metrics.steps;
    }
}

/// Store for engine output: current snapshot, baseline, and history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsStore {
    /// Last durably persisted snapshot
    metrics: Option<TodayMetrics>,
    /// Latest snapshot not yet flushed
    #[serde(skip)]
    pending_metrics: Option<TodayMetrics>,
    #[serde(skip)]
    policy: PersistPolicy,
    baseline: Option<StepCounterBaseline>,
    /// Archived day staged but not yet confirmed in history
    pending_archive: Option<DailyHistory>,
    /// Most recent archived days, newest first, keyed uniquely by day_epoch
    history: Vec<DailyHistory>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one engine update, honoring the throttle policy. Returns true
    /// when the snapshot was persisted (not just batched).
    pub fn apply_update(&mut self, update: &EngineUpdate, now_ms: i64) -> bool {
        if let Some(archived) = &update.archived_day {
            self.stage_archive(archived.to_history());
            self.commit_pending_archive();
        }

        match update.step_counter_baseline {
            Some(baseline) => self.save_baseline(baseline),
            None => {
                // a rollover or reset invalidates any stored baseline
                if update.archived_day.is_some() {
                    self.clear_baseline();
                }
            }
        }

        let persist = self.policy.should_persist(&update.metrics, now_ms);
        self.pending_metrics = Some(update.metrics.clone());
        if persist {
            self.flush(now_ms);
        }

        persist
    }

    /// Write the pending snapshot into durable state
    pub fn flush(&mut self, now_ms: i64) {
        if let Some(pending) = self.pending_metrics.take() {
            self.policy.mark_persisted(&pending, now_ms);
            self.metrics = Some(pending);
        }
    }

    /// Last persisted snapshot
    pub fn metrics(&self) -> Option<&TodayMetrics> {
        self.metrics.as_ref()
    }

    /// Baseline for `day_epoch`; stale-day baselines read as None
    pub fn step_counter_baseline(&self, day_epoch: i64) -> Option<f64> {
        self.baseline
            .filter(|b| b.day_epoch == day_epoch)
            .map(|b| b.counter_value)
    }

    pub fn save_baseline(&mut self, baseline: StepCounterBaseline) {
        self.baseline = Some(baseline);
    }

    pub fn clear_baseline(&mut self) {
        self.baseline = None;
    }

    /// Stage an outgoing day for archival. Kept until the history upsert is
    /// confirmed via [`commit_pending_archive`], surviving serialization in
    /// between.
    ///
    /// [`commit_pending_archive`]: MetricsStore::commit_pending_archive
    pub fn stage_archive(&mut self, day: DailyHistory) {
        debug!(day_epoch = day.day_epoch, steps = day.steps, "staging day for archive");
        self.pending_archive = Some(day);
    }

    /// Upsert the staged day into history and clear the staging record.
    pub fn commit_pending_archive(&mut self) {
        if let Some(day) = self.pending_archive.take() {
            self.upsert_history(day);
        }
    }

    /// Archived days, newest first
    pub fn history(&self) -> &[DailyHistory] {
        &self.history
    }

    fn upsert_history(&mut self, day: DailyHistory) {
        self.history.retain(|existing| existing.day_epoch != day.day_epoch);
        self.history.push(day);
        self.history.sort_by_key(|d| std::cmp::Reverse(d.day_epoch));
        self.history.truncate(HISTORY_LIMIT);
    }

    /// Load store state from JSON, replaying any pending archive left by a
    /// kill mid-rollover.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let mut store: Self = serde_json::from_str(json)?;
        if store.pending_archive.is_some() {
            debug!("replaying pending archive from previous session");
            store.commit_pending_archive();
        }

        if let (Some(metrics), Some(newest)) = (&store.metrics, store.history.first()) {
            if metrics.day_epoch < newest.day_epoch {
                return Err(EngineError::StoreError(format!(
                    "snapshot day {} precedes newest archived day {}",
                    metrics.day_epoch, newest.day_epoch
                )));
            }
        }

        Ok(store)
    }

    /// Serialize store state to JSON
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metrics_with_steps(day_epoch: i64, steps: u32, now_ms: i64) -> TodayMetrics {
        let mut metrics = TodayMetrics::new(day_epoch, now_ms);
        metrics.steps = steps;
        metrics
    }

    fn update_with_steps(day_epoch: i64, steps: u32, now_ms: i64) -> EngineUpdate {
        EngineUpdate {
            metrics: metrics_with_steps(day_epoch, steps, now_ms),
            step_counter_baseline: None,
            archived_day: None,
        }
    }

    #[test]
    fn test_persist_policy_thresholds() {
        let mut store = MetricsStore::new();

        // first update: 5s elapsed since epoch 0, persists
        assert!(store.apply_update(&update_with_steps(100, 1, 10_000), 10_000));

        // 500ms later with a new step: below the minimum interval, batched
        assert!(!store.apply_update(&update_with_steps(100, 2, 10_500), 10_500));

        // 1s after the last persist with a step delta: persists
        assert!(store.apply_update(&update_with_steps(100, 2, 11_000), 11_000));

        // no step change, under 5s: batched
        assert!(!store.apply_update(&update_with_steps(100, 2, 14_000), 14_000));

        // 5s since last persist, even with no steps: persists
        assert!(store.apply_update(&update_with_steps(100, 2, 16_000), 16_000));
    }

    #[test]
    fn test_flush_writes_batched_snapshot() {
        let mut store = MetricsStore::new();
        store.apply_update(&update_with_steps(100, 1, 10_000), 10_000);
        store.apply_update(&update_with_steps(100, 2, 10_200), 10_200);

        assert_eq!(store.metrics().unwrap().steps, 1);
        store.flush(10_300);
        assert_eq!(store.metrics().unwrap().steps, 2);
    }

    #[test]
    fn test_baseline_keyed_by_day() {
        let mut store = MetricsStore::new();
        store.save_baseline(StepCounterBaseline {
            day_epoch: 100,
            counter_value: 1_234.0,
        });

        assert_eq!(store.step_counter_baseline(100), Some(1_234.0));
        assert_eq!(store.step_counter_baseline(101), None);

        store.clear_baseline();
        assert_eq!(store.step_counter_baseline(100), None);
    }

    #[test]
    fn test_archive_upsert_never_duplicates() {
        let mut store = MetricsStore::new();
        let day = metrics_with_steps(100, 500, 0).to_history();

        store.stage_archive(day.clone());
        store.commit_pending_archive();
        store.stage_archive(DailyHistory { steps: 600, ..day });
        store.commit_pending_archive();

        assert_eq!(store.history().len(), 1);
        assert_eq!(store.history()[0].steps, 600);
    }

    #[test]
    fn test_history_capped_and_newest_first() {
        let mut store = MetricsStore::new();
        for day_epoch in 0..40 {
            store.stage_archive(metrics_with_steps(day_epoch, 10, 0).to_history());
            store.commit_pending_archive();
        }

        assert_eq!(store.history().len(), HISTORY_LIMIT);
        assert_eq!(store.history()[0].day_epoch, 39);
        assert_eq!(store.history().last().unwrap().day_epoch, 10);
    }

    #[test]
    fn test_pending_archive_replayed_on_load() {
        let mut store = MetricsStore::new();
        // staged but the process dies before the commit
        store.stage_archive(metrics_with_steps(100, 500, 0).to_history());

        let json = store.to_json().unwrap();
        let loaded = MetricsStore::from_json(&json).unwrap();

        assert_eq!(loaded.history().len(), 1);
        assert_eq!(loaded.history()[0].day_epoch, 100);
        assert_eq!(loaded.history()[0].steps, 500);
    }

    #[test]
    fn test_apply_update_with_rollover_archives_and_drops_baseline() {
        let mut store = MetricsStore::new();
        store.save_baseline(StepCounterBaseline {
            day_epoch: 100,
            counter_value: 1_000.0,
        });

        let update = EngineUpdate {
            metrics: metrics_with_steps(101, 0, 90_000),
            step_counter_baseline: None,
            archived_day: Some(metrics_with_steps(100, 4_000, 80_000)),
        };
        store.apply_update(&update, 90_000);

        assert_eq!(store.history().len(), 1);
        assert_eq!(store.history()[0].day_epoch, 100);
        assert_eq!(store.step_counter_baseline(100), None);
    }

    #[test]
    fn test_snapshot_behind_history_rejected() {
        let mut store = MetricsStore::new();
        store.apply_update(&update_with_steps(100, 7, 10_000), 10_000);
        store.stage_archive(metrics_with_steps(105, 500, 0).to_history());
        store.commit_pending_archive();

        let json = store.to_json().unwrap();
        assert!(matches!(
            MetricsStore::from_json(&json),
            Err(EngineError::StoreError(_))
        ));
    }

    #[test]
    fn test_round_trip_serialization() {
        let mut store = MetricsStore::new();
        store.apply_update(&update_with_steps(100, 7, 10_000), 10_000);
        store.save_baseline(StepCounterBaseline {
            day_epoch: 100,
            counter_value: 50.0,
        });

        let json = store.to_json().unwrap();
        let loaded = MetricsStore::from_json(&json).unwrap();

        assert_eq!(loaded.metrics().unwrap().steps, 7);
        assert_eq!(loaded.step_counter_baseline(100), Some(50.0));
    }
}
