//! Per-step energy estimation
//!
//! Converts a movement zone, user profile, and stride length into the
//! kilocalories burned by a single step. Weight falls back to a BMI
//! heuristic when the profile carries no explicit value, so the estimate
//! never fails.

use crate::types::{MovementZone, Sex, UserProfile};

/// Energy cost per kilogram of body weight per kilometer, by zone
fn kcal_per_kg_per_km(zone: MovementZone) -> f64 {
    match zone {
        MovementZone::Walking => 0.90,
        MovementZone::Brisk => 1.00,
        MovementZone::Running => 1.08,
    }
}

/// Calorie estimator
pub struct CalorieEstimator;

impl CalorieEstimator {
    /// Kilocalories for one step of `stride_meters` in the given zone.
    /// Always non-negative.
    pub fn step_kcal(zone: MovementZone, profile: &UserProfile, stride_meters: f64) -> f64 {
        let distance_km = stride_meters / 1_000.0;
        let weight_kg = Self::resolve_weight_kg(profile);

        (weight_kg * kcal_per_kg_per_km(zone) * distance_km).max(0.0)
    }

    /// Explicit profile weight when present, otherwise a BMI-based estimate
    /// from height, clamped to [40, 120] kg.
    pub fn resolve_weight_kg(profile: &UserProfile) -> f64 {
        if let Some(weight) = profile.normalized_weight_kg() {
            return weight;
        }

        let height_meters = f64::from(profile.normalized_height_cm()) / 100.0;
        let bmi = match profile.sex {
            Sex::Male => 22.5,
            Sex::Female => 21.5,
            Sex::Other => 22.0,
        };

        (bmi * height_meters * height_meters).clamp(40.0, 120.0)
    }
}
