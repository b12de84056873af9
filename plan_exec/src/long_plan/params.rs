//! Parameters structure for LongPlan

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::LongPlanError;
use crate::long_mpc::MpcParams;
use comms_if::car::DriveMode;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for longitudinal planning.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Params {

    // ---- DRIVER PREFERENCES ----

    pub drive_mode: DriveMode,

    /// Follow the map speed limits.
    pub limit_set_speed: bool,

    /// Added to every map speed limit.
    ///
    /// Units: meters/second
    pub speed_limit_offset_ms: f64,

    /// Raise collision warnings while the controller is off.
    pub fcw_enabled: bool,

    /// Scales the total acceleration budget in turns.
    pub brake_factor: f64,

    // ---- VEHICLE ----

    /// Ratio of steering wheel angle to road wheel angle
    pub steer_ratio: f64,

    /// Units: meters
    pub wheelbase_m: f64,

    /// Acceleration the plan starts from when pulling away.
    ///
    /// Units: meters/second^2
    pub start_accel_mss: f64,

    /// Speed the plan starts from when pulling away.
    ///
    /// Units: meters/second
    pub min_can_speed_ms: f64,

    // ---- MPC ----

    pub mpc: MpcParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            drive_mode: DriveMode::Default,
            limit_set_speed: true,
            speed_limit_offset_ms: 0.0,
            fcw_enabled: false,
            brake_factor: 1.0,
            steer_ratio: 15.74,
            wheelbase_m: 2.70,
            start_accel_mss: 0.0,
            min_can_speed_ms: 0.3,
            mpc: MpcParams::default(),
        }
    }
}

impl Params {
    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), LongPlanError> {
        let positive = [
            ("brake_factor", self.brake_factor),
            ("steer_ratio", self.steer_ratio),
            ("wheelbase_m", self.wheelbase_m),
            ("mpc.solver_budget_s", self.mpc.solver_budget_s),
        ];
        for (name, value) in positive.iter() {
            if !(*value > 0.0) || !value.is_finite() {
                return Err(LongPlanError::InvalidParams(format!(
                    "{} must be positive, found {}",
                    name, value
                )));
            }
        }

        if !self.speed_limit_offset_ms.is_finite() || !self.start_accel_mss.is_finite() {
            return Err(LongPlanError::InvalidParams(String::from(
                "speed_limit_offset_ms and start_accel_mss must be finite",
            )));
        }

        if !(self.min_can_speed_ms >= 0.0) {
            return Err(LongPlanError::InvalidParams(format!(
                "min_can_speed_ms must not be negative, found {}",
                self.min_can_speed_ms
            )));
        }

        if let Some(tr) = self.mpc.following_distance_s {
            if !(tr > 0.0 && tr <= 10.0) {
                return Err(LongPlanError::InvalidParams(format!(
                    "mpc.following_distance_s must be in (0, 10] s, found {}",
                    tr
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_valid() {
        assert!(Params::default().validate().is_ok());
    }

    #[test]
    fn test_load_partial_toml() {
        let p: Params = util::params::load_from_str(
            r#"
            drive_mode = "sport"
            brake_factor = 1.2

            [mpc]
            following_distance_s = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(p.drive_mode, DriveMode::Sport);
        assert_eq!(p.brake_factor, 1.2);
        assert_eq!(p.mpc.following_distance_s, Some(1.5));
        assert!(!p.mpc.verbose);
        assert_eq!(p.wheelbase_m, Params::default().wheelbase_m);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_invalid() {
        let mut p = Params::default();
        p.wheelbase_m = 0.0;
        assert!(matches!(p.validate(), Err(LongPlanError::InvalidParams(_))));

        let mut p = Params::default();
        p.mpc.following_distance_s = Some(12.0);
        assert!(p.validate().is_err());

        let mut p = Params::default();
        p.brake_factor = f64::NAN;
        assert!(p.validate().is_err());
    }
}
