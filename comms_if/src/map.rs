//! # Map messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Speed limit and curvature information from the map service.
///
/// Each `*_valid` flag gates its associated value, values behind an unset
/// flag must be ignored.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct MapData {
    pub speed_limit_valid: bool,

    /// Units: meters/second
    pub speed_limit: f64,

    pub speed_limit_ahead_valid: bool,

    /// The next, different, speed limit along the road.
    ///
    /// Units: meters/second
    pub speed_limit_ahead: f64,

    /// Units: meters
    pub speed_limit_ahead_distance: f64,

    pub curvature_valid: bool,

    /// Road curvature at the upcoming turn, sign ignored.
    ///
    /// Units: 1/meters
    pub curvature: f64,

    /// Units: meters
    pub dist_to_turn: f64,

    /// The map service considers its own output usable
    pub map_valid: bool,

    /// Time at which this snapshot was received
    ///
    /// Units: seconds, on the same clock as the cycle time
    pub rcv_time_s: f64,
}
