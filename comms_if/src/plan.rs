//! # Longitudinal plan messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The longitudinal plan published once per cycle.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct Plan {
    /// Speed of the smoothed cruise profile
    ///
    /// Units: meters/second
    pub v_cruise: f64,

    /// Units: meters/second^2
    pub a_cruise: f64,

    /// Speed the controller starts this cycle from
    ///
    /// Units: meters/second
    pub v_start: f64,

    /// Units: meters/second^2
    pub a_start: f64,

    /// Speed demand for the next step
    ///
    /// Units: meters/second
    pub v_target: f64,

    /// Units: meters/second^2
    pub a_target: f64,

    /// Speed expected at the end of the look ahead window
    ///
    /// Units: meters/second
    pub v_target_future: f64,

    pub has_lead: bool,

    pub longitudinal_plan_source: PlanSource,

    /// Maximum speed allowed by the upcoming curvature
    ///
    /// Units: meters/second
    pub v_curvature: f64,

    /// The plan is slowing for an upcoming turn
    pub decel_for_turn: bool,

    pub map_valid: bool,

    /// The radar is alive and reports no fault
    pub radar_valid: bool,

    pub radar_comm_issue: bool,

    /// Time between the radar snapshot and publication
    ///
    /// Units: seconds
    pub processing_delay_s: f64,

    /// Forward collision warning raised this cycle
    pub fcw: bool,
}

/// Per solve debug record of an MPC instance, published when verbose
/// diagnostics are enabled.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct MpcDiagnostic {
    pub mpc_id: u8,

    pub x_ego: Vec<f64>,
    pub v_ego: Vec<f64>,
    pub a_ego: Vec<f64>,
    pub x_lead: Vec<f64>,
    pub v_lead: Vec<f64>,

    pub cost: f64,
    pub a_lead_tau: f64,
    pub qp_iterations: u32,

    /// Units: nanoseconds
    pub calculation_time_ns: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Which candidate plan was selected this cycle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Cruise,
    Mpc1,
    Mpc2,
}

impl Default for PlanSource {
    fn default() -> Self {
        PlanSource::Cruise
    }
}

impl std::fmt::Display for PlanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PlanSource::Cruise => "cruise",
            PlanSource::Mpc1 => "mpc1",
            PlanSource::Mpc2 => "mpc2",
        };
        write!(f, "{}", label)
    }
}
