//! The canonical step-tracking engine
//!
//! One engine serves every platform signal shape: cumulative hardware step
//! counters, discrete step-detector events, and raw accelerometer samples
//! (routed through [`PeakDetector`] into the same accumulator). The
//! counter/detector split that used to be two parallel implementations is a
//! single capability flag here.
//!
//! The engine is a single-writer state machine. All event methods take
//! `&mut self`, run synchronously with bounded work, and never panic on
//! sensor noise; callers invoking from multiple threads must serialize
//! access themselves.

use crate::cadence::{zone_from_cadence, CadenceTracker};
use crate::energy::CalorieEstimator;
use crate::motion::{MotionSample, PeakDetector};
use crate::stride::StrideEstimator;
use crate::types::{
    local_day_epoch, EngineUpdate, MovementZone, StepCounterBaseline, TodayMetrics, UserProfile,
};
use tracing::{debug, info};

/// Inter-step gaps outside this range contribute 0 to moving duration.
/// Below the floor is sensor chatter; above the ceiling means the app was
/// paused or the user stopped.
pub const MIN_STEP_GAP_MS: i64 = 200;
pub const MAX_STEP_GAP_MS: i64 = 3_000;

/// Streaming engine converting step signals into daily activity metrics.
///
/// Owns the canonical [`TodayMetrics`] snapshot for the current local
/// calendar day and rolls it over lazily: every inbound event first checks
/// the wall-clock day against the snapshot's `day_epoch`, and on a mismatch
/// exposes the outgoing snapshot in the update's `archived_day` before
/// resetting, so the caller can persist it.
#[derive(Debug, Clone)]
pub struct StepTrackingEngine {
    metrics: TodayMetrics,
    step_counter_baseline: Option<f64>,
    has_step_counter: bool,
    utc_offset_minutes: i32,
    last_step_timestamp_ms: Option<i64>,
    cadence: CadenceTracker,
    peak_detector: PeakDetector,
}

impl StepTrackingEngine {
    /// Create an engine resuming from persisted state.
    ///
    /// `has_step_counter` selects the step-count authority: when true, only
    /// cumulative counter samples move `steps` and detector events drive
    /// distance/zone/calories alone, avoiding double counting on devices
    /// that expose both sensors.
    pub fn new(
        initial_metrics: TodayMetrics,
        initial_baseline: Option<f64>,
        has_step_counter: bool,
    ) -> Self {
        Self {
            metrics: initial_metrics,
            step_counter_baseline: initial_baseline,
            has_step_counter,
            utc_offset_minutes: 0,
            last_step_timestamp_ms: None,
            cadence: CadenceTracker::new(),
            peak_detector: PeakDetector::new(),
        }
    }

    /// Fresh engine for the local day containing `now_ms`
    pub fn start_of_day(now_ms: i64, has_step_counter: bool) -> Self {
        let day_epoch = local_day_epoch(now_ms, 0);
        Self::new(TodayMetrics::new(day_epoch, now_ms), None, has_step_counter)
    }

    /// Fix the UTC offset used to derive the local calendar day from event
    /// wall-clock times. Defaults to UTC.
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// Current snapshot
    pub fn metrics(&self) -> &TodayMetrics {
        &self.metrics
    }

    /// Current counter baseline, if one has been established today
    pub fn step_counter_baseline(&self) -> Option<f64> {
        self.step_counter_baseline
    }

    /// Apply a cumulative step-counter sample (total steps since boot).
    ///
    /// The first sample of a day establishes the baseline and reports 0
    /// daily steps; the emitted update carries the baseline so it can be
    /// persisted before the process may be killed. Subsequent samples emit
    /// only when the daily step count actually changes.
    pub fn on_counter_sample(&mut self, total_since_boot: f64, now_ms: i64) -> Option<EngineUpdate> {
        let archived_day = self.roll_day_if_needed(now_ms);

        let mut baseline_initialized = false;
        let baseline = match self.step_counter_baseline {
            Some(value) => value,
            None => {
                self.step_counter_baseline = Some(total_since_boot);
                baseline_initialized = true;
                debug!(
                    day_epoch = self.metrics.day_epoch,
                    baseline = total_since_boot,
                    "step counter baseline established"
                );
                total_since_boot
            }
        };

        let daily_steps = ((total_since_boot - baseline) as i64).max(0) as u32;

        if daily_steps != self.metrics.steps {
            let mut next = self.metrics.clone();
            next.steps = daily_steps;
            next.last_updated_epoch_ms = now_ms;
            self.metrics = next;

            return Some(EngineUpdate {
                metrics: self.metrics.clone(),
                step_counter_baseline: self.baseline_record(),
                archived_day,
            });
        }

        if baseline_initialized || archived_day.is_some() {
            return Some(EngineUpdate {
                metrics: self.metrics.clone(),
                step_counter_baseline: self.baseline_record(),
                archived_day,
            });
        }

        None
    }

    /// Apply one discrete step event with its sensor timestamp.
    ///
    /// Classifies the step from cadence, accumulates stride distance and
    /// energy, and adds the gated inter-step delta to moving duration (and
    /// the zone accumulators when the zone matches).
    pub fn on_step_event(
        &mut self,
        timestamp_ms: i64,
        now_ms: i64,
        profile: &UserProfile,
    ) -> EngineUpdate {
        let archived_day = self.roll_day_if_needed(now_ms);
        self.apply_step(timestamp_ms, now_ms, profile, archived_day)
    }

    /// Feed one raw accelerometer sample.
    ///
    /// Runs the peak detector; an accepted peak becomes a step event with
    /// the sample's wall-clock timestamp. Returns `None` when the sample
    /// produced no observable change.
    pub fn on_motion_sample(
        &mut self,
        sample: MotionSample,
        now_ms: i64,
        profile: &UserProfile,
    ) -> Option<EngineUpdate> {
        let archived_day = self.roll_day_if_needed(now_ms);

        if self.peak_detector.on_sample(sample, now_ms) {
            return Some(self.apply_step(now_ms, now_ms, profile, archived_day));
        }

        // No step, but a day boundary still has to reach the caller.
        archived_day.map(|archived| EngineUpdate {
            metrics: self.metrics.clone(),
            step_counter_baseline: None,
            archived_day: Some(archived),
        })
    }

    /// Reset to a fresh snapshot for `day_epoch`, clearing all runtime
    /// state. The outgoing day is exposed in `archived_day` when it carried
    /// activity and belongs to a different day.
    pub fn reset_for_day(&mut self, day_epoch: i64, now_ms: i64) -> EngineUpdate {
        let outgoing = self.metrics.clone();
        let archived_day =
            (outgoing.day_epoch != day_epoch && outgoing.has_activity()).then_some(outgoing);

        self.metrics = TodayMetrics::new(day_epoch, now_ms);
        self.step_counter_baseline = None;
        self.last_step_timestamp_ms = None;
        self.cadence.clear();
        self.peak_detector.reset();

        EngineUpdate {
            metrics: self.metrics.clone(),
            step_counter_baseline: None,
            archived_day,
        }
    }

    /// Shared accumulator transition for detector- and motion-driven steps
    fn apply_step(
        &mut self,
        timestamp_ms: i64,
        now_ms: i64,
        profile: &UserProfile,
        archived_day: Option<TodayMetrics>,
    ) -> EngineUpdate {
        let cadence_spm = self.cadence.record_step(timestamp_ms);
        let zone = zone_from_cadence(cadence_spm);
        let stride_meters = StrideEstimator::estimate(profile).for_zone(zone);
        let step_kcal = CalorieEstimator::step_kcal(zone, profile, stride_meters);

        let movement_delta_ms = match self.last_step_timestamp_ms {
            Some(previous) => {
                let delta = timestamp_ms - previous;
                if (MIN_STEP_GAP_MS..=MAX_STEP_GAP_MS).contains(&delta) {
                    delta
                } else {
                    0
                }
            }
            None => 0,
        };
        self.last_step_timestamp_ms = Some(timestamp_ms);

        // Counter is authoritative for the step count when present; the
        // detector then only contributes distance, zones, and energy.
        let next_steps = if self.has_step_counter {
            self.metrics.steps
        } else {
            self.metrics.steps + 1
        };

        let mut next = self.metrics.clone();
        next.steps = next_steps;
        next.total_distance_meters += stride_meters;
        next.total_calories_kcal += step_kcal;
        next.moving_duration_ms += movement_delta_ms;
        if zone == MovementZone::Brisk {
            next.brisk_distance_meters += stride_meters;
            next.brisk_duration_ms += movement_delta_ms;
        }
        if zone == MovementZone::Running {
            next.running_distance_meters += stride_meters;
            next.running_duration_ms += movement_delta_ms;
        }
        next.last_updated_epoch_ms = now_ms;
        self.metrics = next;

        EngineUpdate {
            metrics: self.metrics.clone(),
            step_counter_baseline: self.baseline_record(),
            archived_day,
        }
    }

    /// Lazy day-rollover check, run before every inbound event. Idempotent
    /// and O(1) on the no-rollover path.
    fn roll_day_if_needed(&mut self, now_ms: i64) -> Option<TodayMetrics> {
        let today = local_day_epoch(now_ms, self.utc_offset_minutes);
        if self.metrics.day_epoch == today {
            return None;
        }

        let outgoing = self.metrics.clone();
        info!(
            from_day = outgoing.day_epoch,
            to_day = today,
            steps = outgoing.steps,
            "day rollover"
        );

        self.metrics = TodayMetrics::new(today, now_ms);
        self.step_counter_baseline = None;
        self.last_step_timestamp_ms = None;
        self.cadence.clear();
        self.peak_detector.reset();

        outgoing.has_activity().then_some(outgoing)
    }

    fn baseline_record(&self) -> Option<StepCounterBaseline> {
        self.step_counter_baseline.map(|value| StepCounterBaseline {
            day_epoch: self.metrics.day_epoch,
            counter_value: value,
        })
    }
}
