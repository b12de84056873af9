//! Parameters structure for the longitudinal MPC

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters shared by both MPC instances.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MpcParams {
    /// Preferred following time-gap. When set this replaces the dynamic
    /// follow time-gap entirely (it is still clamped).
    ///
    /// Units: seconds
    pub following_distance_s: Option<f64>,

    /// Scale the dynamic follow time-gap by the traffic level estimated from
    /// the lead's speed history.
    pub use_traffic_level: bool,

    /// Emit a full diagnostic record for every solve.
    pub verbose: bool,

    /// Wall clock budget of a single solve, overruns are treated as faults.
    ///
    /// Units: seconds
    pub solver_budget_s: f64,
}

impl Default for MpcParams {
    fn default() -> Self {
        Self {
            following_distance_s: None,
            use_traffic_level: false,
            verbose: false,
            solver_budget_s: 0.02,
        }
    }
}
