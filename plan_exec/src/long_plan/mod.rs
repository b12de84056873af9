//! Longitudinal planning module

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod accel_limits;
mod arbiter;
mod fcw;
mod params;
mod speed_limit;
mod speed_smoother;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use accel_limits::*;
pub use arbiter::*;
pub use fcw::*;
pub use params::*;
pub use speed_limit::*;
pub use speed_smoother::*;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Units: (meters/second)/(kilometers/hour)
pub const KPH_TO_MS: f64 = 1.0 / 3.6;

/// Units: (meters/second)/(miles/hour)
pub const MPH_TO_MS: f64 = 0.44704;

/// Units: radians/degree
pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Radar snapshots older than this mark the radar as dead.
///
/// Units: seconds
pub const RADAR_TIMEOUT_S: f64 = 0.5;

/// Map snapshots older than this are ignored.
///
/// Units: seconds
pub const MAP_TIMEOUT_S: f64 = 10.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur while setting up or reconfiguring the
/// planner. Cyclic processing never fails.
#[derive(Debug, thiserror::Error)]
pub enum LongPlanError {
    #[error("Could not load the planner parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Invalid planner parameters: {0}")]
    InvalidParams(String),

    #[error("Could not create the planner archives: {0}")]
    ArchiveError(util::archive::ArchiveError),
}
