//! Stride length estimation
//!
//! Derives per-zone stride lengths from user anthropometry. Pure function of
//! the profile, cheap enough to call on every step.

use crate::types::{Sex, StrideModel, UserProfile};

const MALE_RATIO: f64 = 0.415;
const FEMALE_RATIO: f64 = 0.413;
const OTHER_RATIO: f64 = 0.414;

/// Stride estimator
pub struct StrideEstimator;

impl StrideEstimator {
    /// Estimate per-zone stride lengths for a profile.
    ///
    /// Walking stride is height times a sex-specific ratio, scaled by the
    /// user's stride adjustment; brisk and running strides are fixed
    /// multiples of it. All three are clamped to engine safety bounds, so
    /// `walk <= brisk <= run` always holds.
    pub fn estimate(profile: &UserProfile) -> StrideModel {
        let height_meters = f64::from(profile.normalized_height_cm()) / 100.0;
        let base_ratio = match profile.sex {
            Sex::Male => MALE_RATIO,
            Sex::Female => FEMALE_RATIO,
            Sex::Other => OTHER_RATIO,
        };

        let walk = (height_meters * base_ratio * profile.normalized_stride_scale())
            .clamp(0.45, 1.10);

        StrideModel {
            walk_meters: walk,
            brisk_meters: (walk * 1.12).clamp(0.50, 1.25),
            run_meters: (walk * 1.50).clamp(0.65, 1.80),
        }
    }
}
