//! Cadence tracking and movement classification
//!
//! The tracker keeps a sliding window of recent step timestamps and computes
//! instantaneous cadence in steps per minute. The classifier maps cadence to
//! a movement zone with fixed thresholds.

use crate::types::MovementZone;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Window over which cadence is computed
pub const CADENCE_WINDOW_MS: i64 = 12_000;

/// Cadence at or above this is brisk walking
pub const BRISK_CADENCE_SPM: f64 = 120.0;

/// Cadence at or above this is running
pub const RUNNING_CADENCE_SPM: f64 = 150.0;

/// Classify a cadence into a movement zone.
///
/// Boundary values belong to the higher zone; a cadence of 0 (window not
/// yet warm) classifies as walking, never an error.
pub fn zone_from_cadence(cadence_spm: f64) -> MovementZone {
    if cadence_spm >= RUNNING_CADENCE_SPM {
        MovementZone::Running
    } else if cadence_spm >= BRISK_CADENCE_SPM {
        MovementZone::Brisk
    } else {
        MovementZone::Walking
    }
}

/// Sliding window of recent step timestamps.
///
/// O(1) amortized per step: one append plus eviction of expired entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceTracker {
    recent_step_timestamps_ms: VecDeque<i64>,
}

impl CadenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step and return the cadence over the window ending at
    /// `timestamp_ms`.
    ///
    /// Returns 0.0 until the window holds at least 3 samples, since two
    /// points cannot distinguish a stride rhythm from noise.
    pub fn record_step(&mut self, timestamp_ms: i64) -> f64 {
        self.recent_step_timestamps_ms.push_back(timestamp_ms);
        while let Some(&oldest) = self.recent_step_timestamps_ms.front() {
            if timestamp_ms - oldest > CADENCE_WINDOW_MS {
                self.recent_step_timestamps_ms.pop_front();
            } else {
                break;
            }
        }

        self.cadence_spm(timestamp_ms)
    }

    /// Cadence in steps per minute at `now_ms`, from the current window
    pub fn cadence_spm(&self, now_ms: i64) -> f64 {
        if self.recent_step_timestamps_ms.len() < 3 {
            return 0.0;
        }

        let oldest = self.recent_step_timestamps_ms[0];
        let window_seconds = ((now_ms - oldest) as f64 / 1_000.0).max(1.0);
        let step_intervals = (self.recent_step_timestamps_ms.len() - 1).max(1);

        step_intervals as f64 / window_seconds * 60.0
    }

    pub fn sample_count(&self) -> usize {
        self.recent_step_timestamps_ms.len()
    }

    /// Drop all window state (day rollover)
    pub fn clear(&mut self) {
        self.recent_step_timestamps_ms.clear();
    }
}
