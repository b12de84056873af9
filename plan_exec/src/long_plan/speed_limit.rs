//! # Speed limit fusion
//!
//! Combines the driver's cruise setpoint with the map speed limits and the
//! curvature of the road into the speed the cruise smoother aims for.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use comms_if::{car::DriveMode, map::MapData};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Ceiling used when no map constraint applies (200 mph).
///
/// Units: meters/second
pub const NO_CURVATURE_SPEED: f64 = 89.408;

/// Smallest curvature considered, bounding the radius.
///
/// Units: 1/meters
const MIN_CURVATURE: f64 = 1e-4;

/// Ahead limits below this (21 km/h) move the end of the ramp with the ego
/// speed.
///
/// Units: meters/second
const LOW_AHEAD_LIMIT_MS: f64 = 21.0 / 3.6;

const DIST_AT_LOW_LIMIT_M: f64 = 50.0;
const DIST_AT_LOW_LIMIT_MAX_M: f64 = 100.0;

/// Bounds of the ramp distance for low ahead limits.
///
/// Units: meters
const LOW_LIMIT_RAMP_MIN_M: f64 = 50.0;
const LOW_LIMIT_RAMP_MAX_M: f64 = 300.0;

/// The ahead limit is only ramped if the ego is at least this much below the
/// ramped value.
///
/// Units: meters/second
const RAMP_MARGIN_MS: f64 = 3.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Per-source speed ceilings of one cycle and the fused setpoint.
///
/// Sources that do not apply hold [`NO_CURVATURE_SPEED`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedTargets {
    /// Fused setpoint, the minimum of all sources
    ///
    /// Units: meters/second
    pub v_cruise_setpoint: f64,

    /// Driver's cruise setpoint
    pub v_driver: f64,

    pub v_speedlimit: f64,
    pub v_speedlimit_ahead: f64,
    pub v_curvature: f64,

    /// The curvature ceiling binds below the setpoint, limit and ego speed
    pub decel_for_turn: bool,

    /// Distance within which upcoming constraints are planned for
    ///
    /// Units: meters
    pub speed_ahead_distance: f64,

    /// Units: meters
    pub dist_to_turn: f64,

    /// Distance to the ahead limit
    ///
    /// Units: meters
    pub ahead_distance: f64,
}

/// Map speed limit settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitSettings {
    /// Follow map limits and curvature
    pub limit_set_speed: bool,

    /// Units: meters/second
    pub offset_ms: f64,

    pub drive_mode: DriveMode,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SpeedTargets {
    /// Targets with only the driver setpoint applying.
    pub fn driver_only(v_driver: f64, mode: DriveMode) -> Self {
        Self {
            v_cruise_setpoint: v_driver.min(NO_CURVATURE_SPEED),
            v_driver,
            v_speedlimit: NO_CURVATURE_SPEED,
            v_speedlimit_ahead: NO_CURVATURE_SPEED,
            v_curvature: NO_CURVATURE_SPEED,
            decel_for_turn: false,
            speed_ahead_distance: speed_ahead_distance(mode),
            dist_to_turn: 0.0,
            ahead_distance: 0.0,
        }
    }

    /// Whether the published plan reports a deceleration for a turn, which
    /// also covers slowing for a lower limit ahead.
    pub fn plan_decel_for_turn(&self, v_ego: f64) -> bool {
        self.decel_for_turn || self.v_speedlimit_ahead < self.v_speedlimit.min(v_ego + 1.0)
    }

    /// The turn is close enough to start slowing for it.
    pub fn turn_in_range(&self) -> bool {
        self.decel_for_turn && self.dist_to_turn < self.speed_ahead_distance
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Distance within which upcoming map constraints are planned for.
///
/// Units: meters
pub fn speed_ahead_distance(mode: DriveMode) -> f64 {
    match mode {
        DriveMode::Default => 250.0,
        DriveMode::Sport => 150.0,
        DriveMode::Eco => 350.0,
    }
}

/// Comfortable speed through a road of the given curvature.
///
/// Units: meters/second
pub fn curvature_speed(curvature: f64) -> f64 {
    let radius = 1.0 / curvature.abs().max(MIN_CURVATURE);

    // Lateral comfort coefficient, eased off on wide curves
    let c = if radius > 500.0 {
        0.7
    }
    else if radius > 250.0 {
        2.7 - radius / 250.0
    }
    else {
        3.0 - 13.0 / 2500.0 * radius
    };

    (c * radius).sqrt().min(NO_CURVATURE_SPEED)
}

/// Fuse the driver setpoint with the map constraints.
///
/// `map` is `None` when no valid map snapshot is available, in which case only
/// the driver setpoint applies.
pub fn fuse(
    v_driver: f64,
    v_ego: f64,
    map: Option<&MapData>,
    settings: &LimitSettings,
) -> SpeedTargets {
    let mut targets = SpeedTargets::driver_only(v_driver, settings.drive_mode);

    let map = match map {
        Some(m) if settings.limit_set_speed => m,
        _ => return targets,
    };

    targets.dist_to_turn = map.dist_to_turn;
    targets.ahead_distance = map.speed_limit_ahead_distance;

    let speed_limit = if map.speed_limit_valid {
        targets.v_speedlimit = map.speed_limit + settings.offset_ms;
        Some(map.speed_limit)
    }
    else {
        None
    };

    if map.speed_limit_ahead_valid
        && map.speed_limit_ahead_distance < targets.speed_ahead_distance
    {
        let ahead = map.speed_limit_ahead;
        let mut dist_low = DIST_AT_LOW_LIMIT_M;

        // For very low limits the ramp follows the ego speed
        if ahead < LOW_AHEAD_LIMIT_MS {
            let d = (v_ego - ahead) * 3.6 * 2.0;
            dist_low = if d < DIST_AT_LOW_LIMIT_M {
                0.0
            }
            else {
                d.min(DIST_AT_LOW_LIMIT_MAX_M)
            };

            targets.speed_ahead_distance = ((v_ego - ahead) * 3.6 * 5.0)
                .min(LOW_LIMIT_RAMP_MAX_M)
                .max(LOW_LIMIT_RAMP_MIN_M);
        }

        let sad = targets.speed_ahead_distance;
        let dist = map.speed_limit_ahead_distance;

        let limit = match speed_limit {
            Some(sl)
                if dist > dist_low
                    && v_ego + RAMP_MARGIN_MS < ahead + (sl - ahead) * dist / sad =>
            {
                ahead + (sl - ahead) * (dist - dist_low) / (sad - dist_low)
            }
            _ => ahead,
        };

        targets.v_speedlimit_ahead = limit + settings.offset_ms;
    }

    if map.curvature_valid {
        targets.v_curvature = curvature_speed(map.curvature);
    }

    targets.decel_for_turn =
        targets.v_curvature < v_driver.min(targets.v_speedlimit).min(v_ego + 1.0);

    targets.v_cruise_setpoint = v_driver
        .min(targets.v_curvature)
        .min(targets.v_speedlimit)
        .min(targets.v_speedlimit_ahead);

    targets
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
