//! # Simulated world
//!
//! A minimal one dimensional world used to replay scenarios through the
//! planner. The ego follows the plan's target acceleration while engaged, and
//! a single lead vehicle moves at constant acceleration. Map features ahead
//! of the ego approach at the ego's speed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};

// Internal
use crate::long_plan::InputData;
use comms_if::{
    car::{
        ControlState, DriverSetpoint, EgoState, LateralPlan, LongCtrlState, PhantomCmd,
    },
    map::MapData,
    plan::Plan,
    radar::{LeadTrack, RadarState},
    scenario::ScenarioCmd,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Simulation step, also the planner cycle period.
///
/// Units: seconds
pub const SIM_STEP_S: f64 = 0.05;

/// Number of steps per simulated second
pub const SIM_FREQUENCY_HZ: f64 = 1.0 / SIM_STEP_S;

/// Ego acceleration while the driver brakes.
///
/// Units: meters/second^2
const DRIVER_BRAKE_MSS: f64 = -3.0;

/// Acceleration decay constant reported for the simulated lead.
const SIM_LEAD_ACCEL_TAU: f64 = 1.5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The simulated lead vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimLead {
    /// Distance ahead of the ego
    ///
    /// Units: meters
    pub d_rel: f64,

    /// Units: meters/second
    pub v: f64,

    /// Units: meters/second^2
    pub a: f64,
}

/// State of the simulated world.
#[derive(Debug, Clone, Default)]
pub struct World {
    /// Number of steps already executed
    pub num_cycles: u64,

    /// True if this step falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Simulation elapsed time
    pub sim_time_s: f64,

    pub ego: EgoState,
    pub lead: Option<SimLead>,

    pub engaged: bool,
    pub v_cruise_kph: f64,
    pub force_decel: bool,

    /// Map snapshot, `None` until a map feature is commanded
    pub map: Option<MapData>,

    pub lat_plan: Option<LateralPlan>,
    pub phantom: Option<PhantomCmd>,

    /// Number of times the lead was passed through
    pub num_collisions: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl World {
    /// Create a world with the ego travelling at `v_ego`.
    pub fn new(v_ego: f64) -> Self {
        Self {
            ego: EgoState {
                v_ego,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Apply a scenario command.
    pub fn exec(&mut self, cmd: &ScenarioCmd) {
        debug!("t = {:.2} s: {:?}", self.sim_time_s, cmd);

        match *cmd {
            ScenarioCmd::Engage => self.engaged = true,
            ScenarioCmd::Disengage => self.engaged = false,
            ScenarioCmd::SetCruise { v_cruise_kph } => self.v_cruise_kph = v_cruise_kph,
            ScenarioCmd::SpawnLead {
                d_rel_m,
                v_lead_ms,
                a_lead_mss,
            } => {
                self.lead = Some(SimLead {
                    d_rel: d_rel_m,
                    v: v_lead_ms,
                    a: a_lead_mss,
                })
            }
            ScenarioCmd::LeadAccel { a_lead_mss } => match self.lead {
                Some(ref mut l) => l.a = a_lead_mss,
                None => warn!("LEAD_ACCEL with no lead spawned, ignoring"),
            },
            ScenarioCmd::RemoveLead => self.lead = None,
            ScenarioCmd::SetBlinker { left, right } => {
                self.ego.left_blinker = left;
                self.ego.right_blinker = right;
            }
            ScenarioCmd::SetSteering {
                steering_angle_deg,
                angle_later_deg,
            } => {
                self.ego.steering_angle_deg = steering_angle_deg;
                self.lat_plan = angle_later_deg.map(|a| LateralPlan { angle_later_deg: a });
            }
            ScenarioCmd::SetSpeedLimit { speed_limit_ms } => {
                let map = self.map_mut();
                map.speed_limit_valid = true;
                map.speed_limit = speed_limit_ms;
            }
            ScenarioCmd::SetSpeedLimitAhead {
                speed_limit_ms,
                distance_m,
            } => {
                let map = self.map_mut();
                map.speed_limit_ahead_valid = true;
                map.speed_limit_ahead = speed_limit_ms;
                map.speed_limit_ahead_distance = distance_m;
            }
            ScenarioCmd::ClearSpeedLimitAhead => {
                self.map_mut().speed_limit_ahead_valid = false;
            }
            ScenarioCmd::SetCurvature {
                curvature,
                dist_to_turn_m,
            } => {
                let map = self.map_mut();
                map.curvature_valid = true;
                map.curvature = curvature;
                map.dist_to_turn = dist_to_turn_m;
            }
            ScenarioCmd::ClearCurvature => {
                self.map_mut().curvature_valid = false;
            }
            ScenarioCmd::Phantom {
                status,
                speed_ms,
                lost_connection,
            } => {
                self.phantom = Some(PhantomCmd {
                    status,
                    speed_ms,
                    lost_connection,
                })
            }
            ScenarioCmd::Brake { pressed } => {
                self.ego.brake_pressed = pressed;

                // The driver braking disengages the controller
                if pressed && self.engaged {
                    info!("Driver braking, disengaging");
                    self.engaged = false;
                }
            }
            ScenarioCmd::ForceDecel { active } => self.force_decel = active,
        }
    }

    /// Planner inputs for the current step.
    pub fn input_data(&self) -> InputData {
        let lead_one = self.lead.map(|l| LeadTrack {
            status: true,
            d_rel: l.d_rel,
            v_lead: l.v,
            v_lead_k: l.v,
            a_lead_k: l.a,
            y_rel: 0.0,
            v_lat: 0.0,
            a_lead_tau: SIM_LEAD_ACCEL_TAU,
            fcw: 1.0,
        });

        let long_control_state = if self.engaged {
            LongCtrlState::Pid
        }
        else {
            LongCtrlState::Off
        };

        InputData {
            cycle_time_s: self.sim_time_s,
            ego: self.ego,
            radar: RadarState {
                lead_one,
                lead_two: None,
                errors: Vec::new(),
                rcv_time_s: self.sim_time_s,
            },
            map: self.map.map(|m| MapData {
                rcv_time_s: self.sim_time_s,
                ..m
            }),
            setpoint: DriverSetpoint {
                v_cruise_kph: self.v_cruise_kph,
            },
            control: ControlState {
                long_control_state,
                force_decel: self.force_decel,
            },
            lat_plan: self.lat_plan,
            phantom: self.phantom,
        }
    }

    /// Advance the world by one step under the given plan.
    pub fn step(&mut self, plan: &Plan) {
        let dt = SIM_STEP_S;

        let a_ego = if self.ego.brake_pressed {
            DRIVER_BRAKE_MSS
        }
        else if self.engaged {
            plan.a_target
        }
        else {
            0.0
        };

        let v_prev = self.ego.v_ego;
        self.ego.v_ego = (v_prev + a_ego * dt).max(0.0);
        self.ego.a_ego = (self.ego.v_ego - v_prev) / dt;
        let travelled = 0.5 * (v_prev + self.ego.v_ego) * dt;

        if let Some(ref mut lead) = self.lead {
            let v_prev = lead.v;
            lead.v = (lead.v + lead.a * dt).max(0.0);
            lead.d_rel += 0.5 * (v_prev + lead.v) * dt - travelled;

            if lead.d_rel < 0.0 {
                warn!("t = {:.2} s: collision with the lead", self.sim_time_s);
                self.num_collisions += 1;
                self.lead = None;
            }
        }

        if let Some(ref mut map) = self.map {
            map.dist_to_turn = (map.dist_to_turn - travelled).max(0.0);

            if map.speed_limit_ahead_valid {
                map.speed_limit_ahead_distance -= travelled;

                // The ahead limit is now the current one
                if map.speed_limit_ahead_distance <= 0.0 {
                    map.speed_limit_valid = true;
                    map.speed_limit = map.speed_limit_ahead;
                    map.speed_limit_ahead_valid = false;
                    map.speed_limit_ahead_distance = 0.0;
                }
            }
        }

        self.num_cycles += 1;
        self.is_1_hz_cycle = self.num_cycles % (SIM_FREQUENCY_HZ as u64) == 0;
        self.sim_time_s = self.num_cycles as f64 * SIM_STEP_S;
    }

    fn map_mut(&mut self) -> &mut MapData {
        self.map.get_or_insert(MapData {
            map_valid: true,
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
