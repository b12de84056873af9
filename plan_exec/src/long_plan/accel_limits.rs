//! # Acceleration and jerk limits
//!
//! Limits are recomputed from scratch every cycle. The cruise curves give a
//! starting point, which is then narrowed by turns, driver inattention and
//! upcoming map constraints.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use super::DEG_TO_RAD;
use comms_if::car::DriveMode;
use util::maths::interp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Speed breakpoints of the cruise acceleration curves.
///
/// Units: meters/second
const A_CRUISE_BP: [f64; 5] = [0.0, 5.0, 10.0, 20.0, 55.0];

/// Units: meters/second^2
const A_CRUISE_MIN: [f64; 5] = [-0.8, -0.7, -0.6, -0.5, -0.3];

const A_CRUISE_MAX_DEFAULT: [f64; 5] = [3.5, 3.0, 1.5, 0.5, 0.3];
const A_CRUISE_MAX_ECO: [f64; 5] = [1.0, 1.5, 1.0, 0.3, 0.1];
const A_CRUISE_MAX_SPORT: [f64; 5] = [3.5, 3.5, 3.5, 3.5, 3.5];

/// Gentler curve while following a lead that pulls away.
const A_CRUISE_MAX_FOLLOWING: [f64; 5] = [1.3, 1.6, 1.2, 0.7, 0.3];

/// Total acceleration budget shared between the lateral and longitudinal
/// axes.
const A_TOTAL_MAX_BP: [f64; 3] = [0.0, 25.0, 55.0];
const A_TOTAL_MAX: [f64; 3] = [2.3, 3.0, 3.9];

/// Maximum acceleration while the driver is inattentive.
///
/// Units: meters/second^2
pub const AWARENESS_DECEL: f64 = -0.2;

/// Strongest deceleration used to meet an upcoming speed limit.
///
/// Units: meters/second^2
pub const SPEED_LIMIT_AHEAD_DECEL_MAX: f64 = -3.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Acceleration limits of one cycle.
///
/// Units: meters/second^2
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccelLimits {
    pub min: f64,
    pub max: f64,
}

/// Jerk limits of one cycle.
///
/// Units: meters/second^3
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JerkLimits {
    pub min: f64,
    pub max: f64,
}

/// Vehicle geometry used to turn a steering angle into lateral acceleration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnGeometry {
    pub steer_ratio: f64,

    /// Units: meters
    pub wheelbase_m: f64,

    /// Scales the total acceleration budget
    pub brake_factor: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AccelLimits {
    /// Cruise limits at `v_ego`.
    ///
    /// `following` selects the following curve for the maximum regardless of
    /// the drive mode.
    pub fn cruise(v_ego: f64, following: bool, mode: DriveMode) -> Self {
        let max_curve = if following {
            &A_CRUISE_MAX_FOLLOWING
        }
        else {
            match mode {
                DriveMode::Default => &A_CRUISE_MAX_DEFAULT,
                DriveMode::Sport => &A_CRUISE_MAX_SPORT,
                DriveMode::Eco => &A_CRUISE_MAX_ECO,
            }
        };

        Self {
            min: interp(v_ego, &A_CRUISE_BP, &A_CRUISE_MIN),
            max: interp(v_ego, &A_CRUISE_BP, max_curve),
        }
    }

    /// Limit the maximum to what the lateral acceleration of the current
    /// (`angle_steers_deg`) and upcoming (`angle_later_deg`) steering angles
    /// leave of the total budget.
    pub fn limit_in_turns(
        self,
        v_ego: f64,
        angle_steers_deg: f64,
        angle_later_deg: f64,
        geom: &TurnGeometry,
    ) -> Self {
        let a_total_max = interp(v_ego, &A_TOTAL_MAX_BP, &A_TOTAL_MAX) * geom.brake_factor;

        let lat_accel = |angle_deg: f64| {
            v_ego * v_ego * angle_deg.abs() * DEG_TO_RAD / (geom.steer_ratio * geom.wheelbase_m)
        };

        let max = self
            .max
            .min(a_total_max - lat_accel(angle_steers_deg))
            .min(a_total_max - lat_accel(angle_later_deg));

        Self {
            min: self.min.min(max),
            max,
        }
    }

    /// Force a smooth deceleration.
    pub fn force_decel(self) -> Self {
        let max = self.max.min(AWARENESS_DECEL);
        Self {
            min: self.min.min(max),
            max,
        }
    }

    /// Raise the minimum to at least `required`.
    pub fn require_decel(self, required: f64) -> Self {
        Self {
            min: self.min.max(required),
            max: self.max,
        }
    }

    /// Pin both limits to `accel`.
    pub fn pin(accel: f64) -> Self {
        Self {
            min: accel,
            max: accel,
        }
    }
}

impl JerkLimits {
    /// Jerk limits for the drive mode, never tighter than the acceleration
    /// limits.
    pub fn for_mode(v_ego: f64, mode: DriveMode, accel: &AccelLimits) -> Self {
        let (floor, slope, intercept) = match mode {
            DriveMode::Default => (-0.1, -0.0018, 0.2),
            DriveMode::Sport => (-0.25, -0.002, 0.4),
            DriveMode::Eco => (-0.1, -0.0015, 0.1),
        };

        Self {
            min: accel.min.min(floor),
            max: accel.max.max(slope * v_ego + intercept),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Deceleration needed to be at `v_curvature` by the time the turn
/// `dist_to_turn_m` ahead is reached. Never positive.
pub fn turn_required_decel(v_ego: f64, v_curvature: f64, dist_to_turn_m: f64) -> f64 {
    let mean_speed = ((v_ego + v_curvature) / 2.0).max(1.0);
    let time_to_turn = (dist_to_turn_m / mean_speed).max(1.0);

    ((v_curvature - v_ego) / time_to_turn).min(0.0)
}

/// Constant deceleration reaching `v_ahead` in `distance_m`, floored at
/// [`SPEED_LIMIT_AHEAD_DECEL_MAX`]. Never positive.
pub fn speed_limit_ahead_decel(v_ego: f64, v_ahead: f64, distance_m: f64) -> f64 {
    if distance_m <= 0.0 {
        return SPEED_LIMIT_AHEAD_DECEL_MAX;
    }

    ((v_ahead * v_ahead - v_ego * v_ego) / (2.0 * distance_m))
        .min(0.0)
        .max(SPEED_LIMIT_AHEAD_DECEL_MAX)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const GEOM: TurnGeometry = TurnGeometry {
        steer_ratio: 15.74,
        wheelbase_m: 2.70,
        brake_factor: 1.0,
    };

    #[test]
    fn test_cruise_curves() {
        let l = AccelLimits::cruise(10.0, false, DriveMode::Default);
        assert_eq!(l, AccelLimits { min: -0.6, max: 1.5 });

        let l = AccelLimits::cruise(10.0, false, DriveMode::Eco);
        assert_eq!(l.max, 1.0);

        let l = AccelLimits::cruise(30.0, false, DriveMode::Sport);
        assert_eq!(l.max, 3.5);

        // Following overrides the mode
        let l = AccelLimits::cruise(5.0, true, DriveMode::Sport);
        assert_eq!(l.max, 1.6);

        // Held beyond the table
        let l = AccelLimits::cruise(70.0, false, DriveMode::Default);
        assert_eq!(l, AccelLimits { min: -0.3, max: 0.3 });
    }

    #[test]
    fn test_jerk_limits() {
        let a = AccelLimits::cruise(20.0, false, DriveMode::Default);
        let j = JerkLimits::for_mode(20.0, DriveMode::Default, &a);
        assert_eq!(j.min, -0.5);
        assert_eq!(j.max, 0.5);

        // Slope term wins at low accel limits
        let a = AccelLimits { min: -0.05, max: 0.0 };
        let j = JerkLimits::for_mode(0.0, DriveMode::Sport, &a);
        assert_eq!(j, JerkLimits { min: -0.25, max: 0.4 });

        let j = JerkLimits::for_mode(0.0, DriveMode::Eco, &a);
        assert_eq!(j, JerkLimits { min: -0.1, max: 0.1 });
    }

    #[test]
    fn test_straight_road_unchanged() {
        let a = AccelLimits::cruise(10.0, false, DriveMode::Default);
        assert_eq!(a.limit_in_turns(10.0, 0.0, 0.0, &GEOM), a);
    }

    #[test]
    fn test_turn_limits_max() {
        let a = AccelLimits::cruise(25.0, false, DriveMode::Sport);
        let lat = 25.0 * 25.0 * 30.0 * DEG_TO_RAD / (15.74 * 2.70);

        // Sign of the angle is irrelevant
        let l = a.limit_in_turns(25.0, -30.0, 0.0, &GEOM);
        assert!((l.max - (3.0 - lat)).abs() < 1e-12);
        assert!(l.min <= l.max);

        // The upcoming angle limits in the same way
        let later = a.limit_in_turns(25.0, 0.0, 30.0, &GEOM);
        assert_eq!(later, l);
    }

    #[test]
    fn test_force_decel() {
        let a = AccelLimits::cruise(10.0, false, DriveMode::Default).force_decel();
        assert_eq!(a, AccelLimits { min: -0.6, max: AWARENESS_DECEL });

        let a = AccelLimits { min: 0.5, max: 1.0 }.force_decel();
        assert_eq!(a, AccelLimits::pin(AWARENESS_DECEL));
    }

    #[test]
    fn test_turn_required_decel() {
        // 100 m at a mean speed of 15 m/s
        let d = turn_required_decel(20.0, 10.0, 100.0);
        assert!((d - (-10.0 / (100.0 / 15.0))).abs() < 1e-12);

        // At least one second to the turn
        assert_eq!(turn_required_decel(20.0, 10.0, 1.0), -10.0);

        // Already slow enough
        assert_eq!(turn_required_decel(10.0, 20.0, 50.0), 0.0);

        let a = AccelLimits { min: -0.6, max: 1.0 }.require_decel(-0.2);
        assert_eq!(a.min, -0.2);
    }

    #[test]
    fn test_speed_limit_ahead_decel() {
        // 25 to 15 m/s over 200 m
        assert_eq!(speed_limit_ahead_decel(25.0, 15.0, 200.0), -1.0);

        // Floored
        assert_eq!(speed_limit_ahead_decel(30.0, 5.0, 20.0), -3.0);
        assert_eq!(speed_limit_ahead_decel(30.0, 5.0, 0.0), -3.0);

        // Never an acceleration
        assert_eq!(speed_limit_ahead_decel(10.0, 15.0, 100.0), 0.0);
    }
}
