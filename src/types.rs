//! Core types for the PaceKit engine
//!
//! This module defines the values that flow through the engine: the user
//! profile, movement zones, the daily metrics snapshot, and the update
//! emitted back to the caller after each sensor event.

use serde::{Deserialize, Serialize};

/// Biological sex used for stride and weight heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Other => "other",
        }
    }
}

/// Movement zone classified from instantaneous cadence.
///
/// Ordered by cadence: `Walking < Brisk < Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementZone {
    Walking,
    Brisk,
    Running,
}

impl MovementZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementZone::Walking => "walking",
            MovementZone::Brisk => "brisk",
            MovementZone::Running => "running",
        }
    }
}

/// User anthropometry driving stride length and energy estimates.
///
/// Raw fields may hold whatever the caller handed in; every consumer reads
/// through the `normalized_*` accessors, so out-of-range values never reach
/// a computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Height in centimeters (normalized to [120, 220])
    pub height_cm: i32,
    pub sex: Sex,
    /// Multiplier applied to the estimated stride (normalized to [0.7, 1.3])
    pub stride_scale: f64,
    /// Explicit weight in kilograms; when absent, weight is estimated from
    /// height via a BMI heuristic (normalized to [30, 200])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            height_cm: 170,
            sex: Sex::Other,
            stride_scale: 1.0,
            weight_kg: None,
        }
    }
}

impl UserProfile {
    pub fn normalized_height_cm(&self) -> i32 {
        self.height_cm.clamp(120, 220)
    }

    pub fn normalized_stride_scale(&self) -> f64 {
        self.stride_scale.clamp(0.7, 1.3)
    }

    pub fn normalized_weight_kg(&self) -> Option<f64> {
        self.weight_kg.map(|w| w.clamp(30.0, 200.0))
    }
}

/// Per-zone stride lengths derived from a profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrideModel {
    pub walk_meters: f64,
    pub brisk_meters: f64,
    pub run_meters: f64,
}

impl StrideModel {
    /// Stride length for the given movement zone
    pub fn for_zone(&self, zone: MovementZone) -> f64 {
        match zone {
            MovementZone::Walking => self.walk_meters,
            MovementZone::Brisk => self.brisk_meters,
            MovementZone::Running => self.run_meters,
        }
    }
}

/// Running totals for the current local calendar day.
///
/// Every counter is non-negative and monotonically non-decreasing within a
/// single `day_epoch`. The engine replaces the whole snapshot on each
/// accepted event; readers never observe a partially updated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodayMetrics {
    /// Local calendar day as days since the Unix epoch
    pub day_epoch: i64,
    pub steps: u32,
    pub total_distance_meters: f64,
    pub total_calories_kcal: f64,
    /// Time spent moving in any zone; walking time is the residual after
    /// subtracting the zone-specific durations, not tracked separately
    pub moving_duration_ms: i64,
    pub brisk_distance_meters: f64,
    pub brisk_duration_ms: i64,
    pub running_distance_meters: f64,
    pub running_duration_ms: i64,
    pub last_updated_epoch_ms: i64,
}

impl TodayMetrics {
    /// Fresh snapshot with all counters at zero
    pub fn new(day_epoch: i64, now_ms: i64) -> Self {
        Self {
            day_epoch,
            steps: 0,
            total_distance_meters: 0.0,
            total_calories_kcal: 0.0,
            moving_duration_ms: 0,
            brisk_distance_meters: 0.0,
            brisk_duration_ms: 0,
            running_distance_meters: 0.0,
            running_duration_ms: 0,
            last_updated_epoch_ms: now_ms,
        }
    }

    /// Whether this day recorded any activity worth archiving
    pub fn has_activity(&self) -> bool {
        self.steps > 0
            || self.total_distance_meters > 0.0
            || self.total_calories_kcal > 0.0
            || self.moving_duration_ms > 0
            || self.brisk_duration_ms > 0
            || self.running_duration_ms > 0
    }

    /// Average speed over the moving duration, in meters per second
    pub fn average_speed_mps(&self) -> f64 {
        if self.moving_duration_ms > 0 {
            self.total_distance_meters / (self.moving_duration_ms as f64 / 1_000.0)
        } else {
            0.0
        }
    }

    /// Archived-day record for history storage
    pub fn to_history(&self) -> DailyHistory {
        DailyHistory {
            day_epoch: self.day_epoch,
            steps: self.steps,
            total_distance_meters: self.total_distance_meters,
            total_calories_kcal: self.total_calories_kcal,
            moving_duration_ms: self.moving_duration_ms,
            brisk_distance_meters: self.brisk_distance_meters,
            brisk_duration_ms: self.brisk_duration_ms,
            running_distance_meters: self.running_distance_meters,
            running_duration_ms: self.running_duration_ms,
        }
    }
}

/// Hardware step-counter reading at the first observation of a day.
///
/// Cumulative counters report steps since boot; subtracting this baseline
/// converts the reading into a daily delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepCounterBaseline {
    pub day_epoch: i64,
    pub counter_value: f64,
}

/// The engine's single output type, emitted at most once per input event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineUpdate {
    /// The current day's snapshot after applying the event
    pub metrics: TodayMetrics,
    /// Present when the counter baseline was established or changed and
    /// should be persisted before the process may be killed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_counter_baseline: Option<StepCounterBaseline>,
    /// Present when this event crossed a day boundary; the outgoing day's
    /// snapshot, exposed so the caller can archive it durably
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_day: Option<TodayMetrics>,
}

/// One archived day in history storage, keyed uniquely by `day_epoch`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyHistory {
    pub day_epoch: i64,
    pub steps: u32,
    pub total_distance_meters: f64,
    pub total_calories_kcal: f64,
    pub moving_duration_ms: i64,
    pub brisk_distance_meters: f64,
    pub brisk_duration_ms: i64,
    pub running_distance_meters: f64,
    pub running_duration_ms: i64,
}

/// Local calendar day (days since the Unix epoch) for a wall-clock instant
/// and a fixed UTC offset in minutes.
pub fn local_day_epoch(now_ms: i64, utc_offset_minutes: i32) -> i64 {
    (now_ms + i64::from(utc_offset_minutes) * 60_000).div_euclid(86_400_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_normalization_clamps() {
        let profile = UserProfile {
            height_cm: 300,
            sex: Sex::Male,
            stride_scale: 2.0,
            weight_kg: Some(500.0),
        };

        assert_eq!(profile.normalized_height_cm(), 220);
        assert_eq!(profile.normalized_stride_scale(), 1.3);
        assert_eq!(profile.normalized_weight_kg(), Some(200.0));

        let tiny = UserProfile {
            height_cm: 50,
            sex: Sex::Female,
            stride_scale: 0.1,
            weight_kg: Some(10.0),
        };

        assert_eq!(tiny.normalized_height_cm(), 120);
        assert_eq!(tiny.normalized_stride_scale(), 0.7);
        assert_eq!(tiny.normalized_weight_kg(), Some(30.0));
    }

    #[test]
    fn test_zone_ordering_follows_cadence() {
        assert!(MovementZone::Walking < MovementZone::Brisk);
        assert!(MovementZone::Brisk < MovementZone::Running);
    }

    #[test]
    fn test_has_activity() {
        let mut metrics = TodayMetrics::new(100, 0);
        assert!(!metrics.has_activity());

        metrics.steps = 1;
        assert!(metrics.has_activity());

        let mut duration_only = TodayMetrics::new(100, 0);
        duration_only.brisk_duration_ms = 500;
        assert!(duration_only.has_activity());
    }

    #[test]
    fn test_average_speed() {
        let mut metrics = TodayMetrics::new(100, 0);
        assert_eq!(metrics.average_speed_mps(), 0.0);

        metrics.total_distance_meters = 10.0;
        metrics.moving_duration_ms = 5_000;
        assert!((metrics.average_speed_mps() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_local_day_epoch_offsets() {
        // 1970-01-01T23:00:00Z is still day 0 in UTC but day 1 at UTC+2
        let now_ms = 23 * 3_600_000;
        assert_eq!(local_day_epoch(now_ms, 0), 0);
        assert_eq!(local_day_epoch(now_ms, 120), 1);
        // and day 0 at UTC-5 shortly after midnight UTC
        assert_eq!(local_day_epoch(86_400_000 + 3_600_000, -300), 0);
    }

    #[test]
    fn test_update_serialization_omits_empty_fields() {
        let update = EngineUpdate {
            metrics: TodayMetrics::new(100, 0),
            step_counter_baseline: None,
            archived_day: None,
        };

        let json = serde_json::to_string(&update).unwrap();
        assert!(!json.contains("step_counter_baseline"));
        assert!(!json.contains("archived_day"));
    }
}
