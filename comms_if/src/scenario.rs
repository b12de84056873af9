//! # Scenario command module
//!
//! Scenario commands drive the simulated world which the planner replay
//! executable runs against. Each command is a JSON object with a `type` and,
//! for most types, a `payload`:
//!
//! ```json
//! {"type": "SPAWN_LEAD", "payload": {"d_rel_m": 40.0, "v_lead_ms": 15.0}}
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use serde_json::{self, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

/// Command types which do not carry a payload.
static TYPE_HAS_NO_PAYLOAD: [&str; 5] = [
    "ENGAGE",
    "DISENGAGE",
    "REMOVE_LEAD",
    "CLEAR_SPEED_LIMIT_AHEAD",
    "CLEAR_CURVATURE",
];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A command changing the simulated world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioCmd {
    /// Engage the longitudinal controller.
    Engage,

    /// Disengage the longitudinal controller.
    Disengage,

    /// Set the driver's cruise speed.
    SetCruise { v_cruise_kph: f64 },

    /// Place a lead vehicle ahead of the ego.
    SpawnLead {
        d_rel_m: f64,
        v_lead_ms: f64,
        #[serde(default)]
        a_lead_mss: f64,
    },

    /// Change the acceleration of the current lead.
    LeadAccel { a_lead_mss: f64 },

    /// Remove the lead vehicle.
    RemoveLead,

    SetBlinker { left: bool, right: bool },

    /// Set the steering wheel angle, and optionally the angle the lateral
    /// planner expects at the road wheels.
    SetSteering {
        steering_angle_deg: f64,
        #[serde(default)]
        angle_later_deg: Option<f64>,
    },

    SetSpeedLimit { speed_limit_ms: f64 },

    SetSpeedLimitAhead { speed_limit_ms: f64, distance_m: f64 },

    ClearSpeedLimitAhead,

    SetCurvature { curvature: f64, dist_to_turn_m: f64 },

    ClearCurvature,

    /// Command a phantom lead.
    Phantom {
        status: bool,
        speed_ms: f64,
        #[serde(default)]
        lost_connection: bool,
    },

    Brake { pressed: bool },

    ForceDecel { active: bool },
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum ScenarioParseError {
    #[error("Command contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Command has an invalid type ({0})")]
    InvalidType(String),

    #[error("Command of type {0} is expected to have a payload but it doesn't")]
    MissingPayload(String),

    #[error("Command of type {0} has an invalid payload: {1}")]
    InvalidPayload(String, serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScenarioCmd {
    /// Parse a command from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, ScenarioParseError> {
        let val: Value = serde_json::from_str(json_str)
            .map_err(ScenarioParseError::InvalidJson)?;

        let cmd_type = match val["type"].as_str() {
            Some(s) => s.to_string(),
            None => {
                return Err(ScenarioParseError::InvalidType(String::from(
                    "Expected \"type\" to be a string",
                )))
            }
        };

        if val["payload"].is_null() && !TYPE_HAS_NO_PAYLOAD.contains(&cmd_type.as_str()) {
            // Unknown types are reported as such rather than as missing payloads
            return match serde_json::from_value::<ScenarioCmd>(val) {
                Ok(c) => Ok(c),
                Err(_) if Self::is_known_type(&cmd_type) => {
                    Err(ScenarioParseError::MissingPayload(cmd_type))
                }
                Err(_) => Err(ScenarioParseError::InvalidType(format!(
                    "{} is not a recognised command type",
                    cmd_type
                ))),
            };
        }

        serde_json::from_value(val).map_err(|e| {
            if Self::is_known_type(&cmd_type) {
                ScenarioParseError::InvalidPayload(cmd_type.clone(), e)
            } else {
                ScenarioParseError::InvalidType(format!(
                    "{} is not a recognised command type",
                    cmd_type
                ))
            }
        })
    }

    fn is_known_type(s: &str) -> bool {
        TYPE_HAS_NO_PAYLOAD.contains(&s)
            || matches!(
                s,
                "SET_CRUISE"
                    | "SPAWN_LEAD"
                    | "LEAD_ACCEL"
                    | "SET_BLINKER"
                    | "SET_STEERING"
                    | "SET_SPEED_LIMIT"
                    | "SET_SPEED_LIMIT_AHEAD"
                    | "SET_CURVATURE"
                    | "PHANTOM"
                    | "BRAKE"
                    | "FORCE_DECEL"
            )
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_no_payload() {
        assert_eq!(
            ScenarioCmd::from_json(r#"{"type": "ENGAGE"}"#).unwrap(),
            ScenarioCmd::Engage
        );
    }

    #[test]
    fn test_parse_with_payload() {
        let cmd = ScenarioCmd::from_json(
            r#"{"type": "SPAWN_LEAD", "payload": {"d_rel_m": 40.0, "v_lead_ms": 15.0}}"#,
        )
        .unwrap();

        assert_eq!(
            cmd,
            ScenarioCmd::SpawnLead {
                d_rel_m: 40.0,
                v_lead_ms: 15.0,
                a_lead_mss: 0.0
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ScenarioCmd::from_json("{not json"),
            Err(ScenarioParseError::InvalidJson(_))
        ));
        assert!(matches!(
            ScenarioCmd::from_json(r#"{"type": 3}"#),
            Err(ScenarioParseError::InvalidType(_))
        ));
        assert!(matches!(
            ScenarioCmd::from_json(r#"{"type": "WARP"}"#),
            Err(ScenarioParseError::InvalidType(_))
        ));
        assert!(matches!(
            ScenarioCmd::from_json(r#"{"type": "SET_CRUISE"}"#),
            Err(ScenarioParseError::MissingPayload(_))
        ));
        assert!(matches!(
            ScenarioCmd::from_json(r#"{"type": "SET_CRUISE", "payload": {"kph": 3}}"#),
            Err(ScenarioParseError::InvalidPayload(_, _))
        ));
    }
}
