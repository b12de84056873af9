//! # Car state messages
//!
//! Snapshots of the ego vehicle and of the driver's inputs, produced once per
//! cycle by external collaborators. The planner only ever reads these.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Estimated state of the ego vehicle.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct EgoState {
    /// Longitudinal speed
    ///
    /// Units: meters/second
    pub v_ego: f64,

    /// Longitudinal acceleration
    ///
    /// Units: meters/second^2
    pub a_ego: f64,

    /// Steering wheel angle
    ///
    /// Units: degrees
    pub steering_angle_deg: f64,

    pub left_blinker: bool,
    pub right_blinker: bool,

    pub brake_pressed: bool,
    pub gas_pressed: bool,
}

/// Cruise speed set by the driver.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct DriverSetpoint {
    /// Units: kilometers/hour
    pub v_cruise_kph: f64,
}

/// State of the downstream longitudinal controller.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct ControlState {
    pub long_control_state: LongCtrlState,

    /// Driver inattention escalation is requesting a gentle deceleration.
    pub force_decel: bool,
}

/// Output of the lateral planner which is relevant to longitudinal planning.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct LateralPlan {
    /// Steering angle the lateral planner expects to command shortly, at the
    /// road wheels.
    ///
    /// Units: degrees
    pub angle_later_deg: f64,
}

/// Request to follow a synthetic ("phantom") lead instead of the tracked one.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct PhantomCmd {
    /// Phantom following is active
    pub status: bool,

    /// Speed of the phantom lead, zero for a smooth stop.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// The phantom's command link has been lost, stop promptly.
    pub lost_connection: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// States of the longitudinal controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LongCtrlState {
    Off,
    Pid,
    Stopping,
    Starting,
}

/// Driver selected drive mode, changing acceleration and jerk envelopes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    Default,
    Sport,
    Eco,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for LongCtrlState {
    fn default() -> Self {
        LongCtrlState::Off
    }
}

impl Default for DriveMode {
    fn default() -> Self {
        DriveMode::Default
    }
}

impl LongCtrlState {
    /// The planner is engaged, i.e. the controller is tracking the plan.
    pub fn is_enabled(&self) -> bool {
        matches!(self, LongCtrlState::Pid | LongCtrlState::Stopping)
    }
}

impl EgoState {
    /// Either turn signal is on.
    pub fn blinkers(&self) -> bool {
        self.left_blinker || self.right_blinker
    }
}

impl std::fmt::Display for DriveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriveMode::Default => "dynamic",
            DriveMode::Sport => "sport",
            DriveMode::Eco => "eco",
        };
        write!(f, "{}", label)
    }
}
