//! # Radar messages
//!
//! Lead vehicle tracks as produced by the radar/vision fusion.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A tracked lead vehicle.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct LeadTrack {
    /// The track is valid this cycle
    pub status: bool,

    /// Distance to the lead along the road
    ///
    /// Units: meters
    pub d_rel: f64,

    /// Absolute speed of the lead
    ///
    /// Units: meters/second
    pub v_lead: f64,

    /// Kalman filtered lead speed
    ///
    /// Units: meters/second
    pub v_lead_k: f64,

    /// Kalman filtered lead acceleration
    ///
    /// Units: meters/second^2
    pub a_lead_k: f64,

    /// Lateral offset of the lead, positive left
    ///
    /// Units: meters
    pub y_rel: f64,

    /// Lateral speed of the lead
    ///
    /// Units: meters/second
    pub v_lat: f64,

    /// Time constant of the lead's acceleration decay
    ///
    /// Units: 1/seconds^2
    pub a_lead_tau: f64,

    /// Probability that this lead should be considered for collision warning
    pub fcw: f64,
}

/// Radar snapshot for one cycle.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct RadarState {
    /// Primary lead
    pub lead_one: Option<LeadTrack>,

    /// Secondary lead
    pub lead_two: Option<LeadTrack>,

    /// Errors reported by the radar
    #[serde(default)]
    pub errors: Vec<RadarError>,

    /// Time at which this snapshot was received
    ///
    /// Units: seconds, on the same clock as the cycle time
    pub rcv_time_s: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Radar error flags
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RadarError {
    Fault,
    CommIssue,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LeadTrack {
    /// Returns the track if it is valid this cycle.
    pub fn valid(track: Option<&LeadTrack>) -> Option<&LeadTrack> {
        track.filter(|l| l.status)
    }
}

impl RadarState {
    /// The primary lead, if valid.
    pub fn lead_one(&self) -> Option<&LeadTrack> {
        LeadTrack::valid(self.lead_one.as_ref())
    }

    /// The secondary lead, if valid.
    pub fn lead_two(&self) -> Option<&LeadTrack> {
        LeadTrack::valid(self.lead_two.as_ref())
    }

    pub fn has_fault(&self) -> bool {
        self.errors.contains(&RadarError::Fault)
    }

    pub fn has_comm_issue(&self) -> bool {
        self.errors.contains(&RadarError::CommIssue)
    }
}
