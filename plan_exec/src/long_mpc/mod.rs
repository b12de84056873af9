//! Longitudinal MPC module
//!
//! Two instances of [`LongMpc`] run each cycle, one anchored to the primary lead and one to the
//! secondary lead. Each owns its own solver and warm start, nothing is shared between them.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cost;
mod dyn_follow;
mod kinematic_solver;
mod lead;
mod params;
mod solver;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use cost::*;
pub use dyn_follow::*;
pub use kinematic_solver::*;
pub use lead::*;
pub use params::*;
pub use solver::*;
pub use state::*;

#[cfg(test)]
pub(crate) use solver::fixture::{ramp, FixtureSolver, SolverCall};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Time between two points of the MPC horizon.
///
/// Units: seconds
pub const DT_MPC: f64 = 0.2;

/// Number of points in a solved trajectory, including the initial state.
pub const HORIZON_LEN: usize = 21;

/// Index of the trajectory point read out as the "future" speed.
pub const FUTURE_INDEX: usize = 10;

/// Default decay constant of the lead's acceleration.
///
/// Units: 1/seconds^2
pub const LEAD_ACCEL_TAU: f64 = 1.5;

/// Minimum following time-gap.
///
/// Units: seconds
pub const TR_MIN: f64 = 0.9;

/// Maximum following time-gap.
///
/// Units: seconds
pub const TR_MAX: f64 = 2.7;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Faults raised by a solve. None of these leave the cycle, they reset the
/// MPC instance that raised them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverFault {
    #[error("The solver failed: {0}")]
    Failed(String),

    #[error("The solver returned {found} trajectory points, expected at least {expected}")]
    ShortTrajectory { expected: usize, found: usize },

    #[error("The solve took {took_s:.4} s, over the {budget_s:.4} s budget")]
    Overrun { took_s: f64, budget_s: f64 },
}
