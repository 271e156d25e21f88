//! Accelerometer peak detection
//!
//! Turns raw 3-axis acceleration samples into discrete step events on
//! platforms that expose no step sensor. The detector removes gravity with
//! an exponential estimate, tracks the noise floor the same way, and accepts
//! a step on each rising edge of the filtered magnitude above an adaptive
//! threshold, with a refractory period to suppress double triggers.
//!
//! Every sample is processed with O(1) work; no sample history is kept.

use serde::{Deserialize, Serialize};

/// Minimum spacing between two accepted peaks
pub const PEAK_REFRACTORY_MS: i64 = 250;

const GRAVITY_INIT: f64 = 9.81;
const GRAVITY_SMOOTHING: f64 = 0.9;
const NOISE_INIT: f64 = 1.0;
const NOISE_SMOOTHING: f64 = 0.95;
const THRESHOLD_FLOOR: f64 = 1.05;
const THRESHOLD_NOISE_GAIN: f64 = 1.35;

/// One accelerometer reading, in m/s² per axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MotionSample {
    /// 3-axis vector magnitude
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Streaming step detector over raw acceleration magnitude
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakDetector {
    gravity_estimate: f64,
    noise_estimate: f64,
    previous_filtered: f64,
    last_peak_ms: Option<i64>,
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PeakDetector {
    pub fn new() -> Self {
        Self {
            gravity_estimate: GRAVITY_INIT,
            noise_estimate: NOISE_INIT,
            previous_filtered: 0.0,
            last_peak_ms: None,
        }
    }

    /// Process one motion sample; returns true when the sample is an
    /// accepted step peak.
    ///
    /// A peak is a rising edge of the gravity-filtered magnitude through the
    /// adaptive threshold, at least [`PEAK_REFRACTORY_MS`] after the previous
    /// accepted peak. Sustained noise raises the threshold instead of
    /// producing steps.
    pub fn on_sample(&mut self, sample: MotionSample, now_ms: i64) -> bool {
        let magnitude = sample.magnitude();

        self.gravity_estimate =
            self.gravity_estimate * GRAVITY_SMOOTHING + magnitude * (1.0 - GRAVITY_SMOOTHING);
        let filtered = magnitude - self.gravity_estimate;
        self.noise_estimate =
            self.noise_estimate * NOISE_SMOOTHING + filtered.abs() * (1.0 - NOISE_SMOOTHING);

        let threshold = (self.noise_estimate * THRESHOLD_NOISE_GAIN).max(THRESHOLD_FLOOR);
        let rising_edge = filtered > threshold && self.previous_filtered <= threshold;
        let refractory_elapsed = match self.last_peak_ms {
            Some(last) => now_ms - last >= PEAK_REFRACTORY_MS,
            None => true,
        };

        self.previous_filtered = filtered;

        if rising_edge && refractory_elapsed {
            self.last_peak_ms = Some(now_ms);
            return true;
        }

        false
    }

    /// Drop all filter state (day rollover)
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn still() -> MotionSample {
        MotionSample {
            x: 0.0,
            y: 0.0,
            z: 9.81,
        }
    }

    fn spike(extra: f64) -> MotionSample {
        MotionSample {
            x: 0.0,
            y: 0.0,
            z: 9.81 + extra,
        }
    }

    #[test]
    fn test_stationary_emits_no_steps() {
        let mut detector = PeakDetector::new();
        for i in 0..200 {
            assert!(!detector.on_sample(still(), i * 20));
        }
    }

    #[test]
    fn test_clear_spike_is_detected() {
        let mut detector = PeakDetector::new();
        // settle the filters
        for i in 0..50 {
            detector.on_sample(still(), i * 20);
        }

        let mut detected = false;
        for i in 50..55 {
            if detector.on_sample(spike(8.0), i * 20) {
                detected = true;
            }
        }
        assert!(detected);
    }

    #[test]
    fn test_refractory_period_enforced() {
        let mut detector = PeakDetector::new();
        for i in 0..50 {
            detector.on_sample(still(), i * 20);
        }

        let mut peak_times: Vec<i64> = Vec::new();
        // alternate strong spikes and rest at 50 Hz for 2 seconds
        for i in 0..100 {
            let now = 1_000 + i * 20;
            let sample = if i % 2 == 0 { spike(10.0) } else { still() };
            if detector.on_sample(sample, now) {
                peak_times.push(now);
            }
        }

        assert!(!peak_times.is_empty());
        for pair in peak_times.windows(2) {
            assert!(pair[1] - pair[0] >= PEAK_REFRACTORY_MS);
        }
    }

    #[test]
    fn test_sustained_noise_raises_threshold() {
        let mut detector = PeakDetector::new();
        for i in 0..50 {
            detector.on_sample(still(), i * 20);
        }

        // constant strong vibration; after the noise estimate adapts, small
        // wobbles around the elevated floor stop registering as peaks
        let mut late_peaks = 0;
        for i in 0..500 {
            let wobble = if i % 2 == 0 { 2.0 } else { 1.8 };
            let fired = detector.on_sample(spike(wobble), 1_000 + i * 20);
            if i > 400 && fired {
                late_peaks += 1;
            }
        }
        assert_eq!(late_peaks, 0);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut detector = PeakDetector::new();
        for i in 0..100 {
            detector.on_sample(spike(5.0), i * 20);
        }

        detector.reset();
        let fresh = PeakDetector::new();
        assert_eq!(detector.gravity_estimate, fresh.gravity_estimate);
        assert_eq!(detector.noise_estimate, fresh.noise_estimate);
        assert_eq!(detector.last_peak_ms, None);
    }
}
