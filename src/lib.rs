//! Pacekit - On-device step tracking and movement classification engine
//!
//! Pacekit turns raw step signals into daily activity metrics through a
//! deterministic pipeline: signal fusion → cadence classification → stride
//! and energy estimation → daily accumulation with lazy midnight rollover.
//!
//! ## Modules
//!
//! - **Engine**: Fuse counter, detector, and accelerometer signals into the
//!   canonical day snapshot
//! - **Store**: Throttled persistence, counter baselines, and archived-day
//!   history
//! - **History**: Rolling summaries and CSV export over archived days

pub mod cadence;
pub mod energy;
pub mod engine;
pub mod error;
pub mod history;
pub mod motion;
pub mod store;
pub mod stride;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use engine::StepTrackingEngine;
pub use error::EngineError;
pub use history::{HistoryAnalytics, HistorySummary};
pub use motion::{MotionSample, PeakDetector};
pub use store::{MetricsStore, PersistPolicy};
pub use stride::StrideEstimator;
pub use types::{
    DailyHistory, EngineUpdate, MovementZone, Sex, StepCounterBaseline, StrideModel, TodayMetrics,
    UserProfile,
};

/// Pacekit version embedded in exported payloads
pub const PACEKIT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported payloads
pub const PRODUCER_NAME: &str = "pacekit";
