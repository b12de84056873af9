//! Implementations for the LongPlanner state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::convert::Infallible;
use log::{debug, info, warn};
use serde::Serialize;

// Internal
use super::{
    choose_solution, fuse, future_speed, speed_limit_ahead_decel, speed_smoother,
    turn_required_decel, AccelLimits, Candidate, FcwChecker, FcwCounters, FcwInput,
    JerkLimits, LimitSettings, LongPlanError, Params, Recurrence, SpeedTargets, TurnGeometry,
    KPH_TO_MS, MAP_TIMEOUT_S, RADAR_TIMEOUT_S,
};
use crate::long_mpc::{LongMpc, LongSolver, MpcInput, MpcReport, DT_MPC};
use comms_if::{
    car::{ControlState, DriverSetpoint, EgoState, LateralPlan, LongCtrlState, PhantomCmd},
    map::MapData,
    plan::{Plan, PlanSource},
    radar::RadarState,
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The upcoming steering angle is only used above this speed.
///
/// Units: meters/second
const LATER_ANGLE_MIN_SPEED_MS: f64 = 11.0;

/// A primary lead closer than this and pulling away selects the following
/// acceleration curve.
///
/// Units: meters
const FOLLOWING_DIST_M: f64 = 45.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Longitudinal planner module state
pub struct LongPlanner<S: LongSolver> {
    params: Params,

    mpc1: LongMpc<S>,
    mpc2: LongMpc<S>,

    fcw: FcwChecker,

    /// Seed of the cruise smoother and both MPCs
    recurrence: Recurrence,

    v_cruise: f64,
    a_cruise: f64,

    v_acc: f64,
    a_acc: f64,
    v_acc_future: f64,

    source: PlanSource,

    rows: Option<(PlanRow, [MpcDiagnosticRow; 2])>,
    arch_plan: Archiver,
    arch_mpc: Archiver,
}

/// Input data to the planner, one snapshot per cycle.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Units: seconds
    pub cycle_time_s: f64,

    pub ego: EgoState,
    pub radar: RadarState,

    /// Latest map snapshot, if any has been received
    pub map: Option<MapData>,

    pub setpoint: DriverSetpoint,
    pub control: ControlState,

    pub lat_plan: Option<LateralPlan>,
    pub phantom: Option<PhantomCmd>,
}

/// Status report for planner processing.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub enabled: bool,

    pub mpc1: MpcReport,
    pub mpc2: MpcReport,

    /// Limits the cruise smoother ran with, `None` while disabled
    pub accel_limits: Option<AccelLimits>,
    pub jerk_limits: Option<JerkLimits>,

    pub targets: SpeedTargets,

    /// The plan source differs from the previous cycle
    pub source_changed: bool,

    /// The unmasked collision warning, before brake and engagement gating
    pub fcw_raw: bool,

    pub fcw_counters: FcwCounters,
}

/// Archived plan record.
#[derive(Debug, Clone, Copy, Serialize)]
struct PlanRow {
    time_s: f64,
    v_cruise: f64,
    a_cruise: f64,
    v_start: f64,
    a_start: f64,
    v_target: f64,
    a_target: f64,
    v_target_future: f64,
    has_lead: bool,
    longitudinal_plan_source: PlanSource,
    v_curvature: f64,
    decel_for_turn: bool,
    map_valid: bool,
    radar_valid: bool,
    radar_comm_issue: bool,
    processing_delay_s: f64,
    fcw: bool,
}

/// Archived per instance MPC summary.
#[derive(Debug, Clone, Copy, Serialize)]
struct MpcDiagnosticRow {
    time_s: f64,
    mpc_id: u8,
    has_lead: bool,
    new_lead: bool,
    tr_s: f64,
    cost: f64,
    qp_iterations: u32,
    solve_time_s: f64,
    v_mpc: f64,
    a_mpc: f64,
    v_mpc_future: f64,
    reset: bool,
    lead_accel_estimate_mss: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<S: LongSolver> LongPlanner<S> {
    /// Create a new planner running its MPCs on the given solvers.
    pub fn new(params: Params, solver1: S, solver2: S) -> Result<Self, LongPlanError> {
        params.validate()?;

        Ok(Self {
            mpc1: LongMpc::new(1, solver1, params.mpc.clone()),
            mpc2: LongMpc::new(2, solver2, params.mpc.clone()),
            params,
            fcw: FcwChecker::new(),
            recurrence: Recurrence::default(),
            v_cruise: 0.0,
            a_cruise: 0.0,
            v_acc: 0.0,
            a_acc: 0.0,
            v_acc_future: 0.0,
            source: PlanSource::Cruise,
            rows: None,
            arch_plan: Archiver::default(),
            arch_mpc: Archiver::default(),
        })
    }

    /// Replace the parameters between two cycles.
    ///
    /// Invalid parameters are rejected and the current ones kept. No MPC or
    /// recurrence state is reset.
    pub fn reconfigure(&mut self, params: Params) -> Result<(), LongPlanError> {
        params.validate()?;

        if params.drive_mode != self.params.drive_mode {
            info!(
                "Drive mode changed from {} to {}",
                self.params.drive_mode, params.drive_mode
            );
        }

        self.mpc1.set_params(params.mpc.clone());
        self.mpc2.set_params(params.mpc.clone());
        self.params = params;

        Ok(())
    }

    /// Run one planning cycle.
    pub fn update(&mut self, input: &InputData) -> (Plan, StatusReport) {
        let t = input.cycle_time_s;
        let ego = &input.ego;
        let v_ego = ego.v_ego;
        let mode = self.params.drive_mode;
        let long_control_state = input.control.long_control_state;
        let enabled = long_control_state.is_enabled();

        let lead_one = input.radar.lead_one();
        let lead_two = input.radar.lead_two();

        let following = lead_one
            .map(|l| l.d_rel < FOLLOWING_DIST_M && l.v_lead_k > v_ego && l.a_lead_k > 0.0)
            .unwrap_or(false);

        // ---- SPEED TARGETS ----

        let map = input
            .map
            .as_ref()
            .filter(|m| m.map_valid && t - m.rcv_time_s < MAP_TIMEOUT_S);

        let targets = fuse(
            input.setpoint.v_cruise_kph * KPH_TO_MS,
            v_ego,
            map,
            &LimitSettings {
                limit_set_speed: self.params.limit_set_speed,
                offset_ms: self.params.speed_limit_offset_ms,
                drive_mode: mode,
            },
        );
        let v_cruise_setpoint = targets.v_cruise_setpoint;

        // ---- CRUISE ----

        let mut accel_limits = None;
        let mut jerk_limits = None;

        if enabled {
            let cruise = AccelLimits::cruise(v_ego, following, mode);
            let jerk = JerkLimits::for_mode(v_ego, mode, &cruise);

            let (angle_steers, angle_later) = self.turn_angles(ego, input.lat_plan.as_ref());
            let mut accel = cruise.limit_in_turns(
                v_ego,
                angle_steers,
                angle_later,
                &TurnGeometry {
                    steer_ratio: self.params.steer_ratio,
                    wheelbase_m: self.params.wheelbase_m,
                    brake_factor: self.params.brake_factor,
                },
            );

            if input.control.force_decel {
                accel = accel.force_decel();
            }

            if targets.turn_in_range() {
                accel = accel.require_decel(turn_required_decel(
                    v_ego,
                    targets.v_curvature,
                    targets.dist_to_turn,
                ));
            }

            if targets.v_speedlimit_ahead < targets.v_speedlimit
                && self.source == PlanSource::Cruise
                && v_ego > targets.v_speedlimit_ahead
            {
                let required = speed_limit_ahead_decel(
                    v_ego,
                    targets.v_speedlimit_ahead,
                    targets.ahead_distance,
                );
                debug!("Slowing for the limit ahead at {:.2} m/s^2", required);

                accel = AccelLimits::pin(required);
                self.recurrence.a = required;
            }

            let (v, a) = speed_smoother(
                self.recurrence.v,
                self.recurrence.a,
                v_cruise_setpoint,
                &accel,
                &jerk,
                DT_MPC,
            );

            // Never plan to reverse, even when the driver is distracted
            self.v_cruise = v.max(0.0);
            self.a_cruise = a;

            accel_limits = Some(accel);
            jerk_limits = Some(jerk);
        }
        else {
            let (v, a) = if long_control_state == LongCtrlState::Starting {
                (self.params.min_can_speed_ms, self.params.start_accel_mss)
            }
            else {
                (v_ego, ego.a_ego.min(0.0))
            };

            self.v_acc = v;
            self.a_acc = a;
            self.recurrence = Recurrence::new(v, a);
            self.v_cruise = v;
            self.a_cruise = a;
        }

        // ---- MPC ----

        self.mpc1.set_cur_state(self.recurrence.v, self.recurrence.a);
        self.mpc2.set_cur_state(self.recurrence.v, self.recurrence.a);

        let phantom = input.phantom.as_ref();
        let mpc1_report = self.mpc1.update(&MpcInput {
            cycle_time_s: t,
            ego,
            lead: lead_one,
            phantom,
        });
        let mpc2_report = self.mpc2.update(&MpcInput {
            cycle_time_s: t,
            ego,
            lead: lead_two,
            phantom,
        });

        // ---- ARBITRATION ----

        let mut source_changed = false;

        if enabled {
            let candidate = |mpc: &LongMpc<S>, source| {
                if mpc.has_lead() {
                    Some(Candidate {
                        source,
                        v: mpc.v_mpc(),
                        a: mpc.a_mpc(),
                    })
                }
                else {
                    None
                }
            };

            let best = choose_solution(
                Candidate {
                    source: PlanSource::Cruise,
                    v: self.v_cruise,
                    a: self.a_cruise,
                },
                candidate(&self.mpc1, PlanSource::Mpc1),
                candidate(&self.mpc2, PlanSource::Mpc2),
            );

            if best.source != self.source {
                debug!("Plan source changed from {} to {}", self.source, best.source);
                source_changed = true;
            }

            self.source = best.source;
            self.v_acc = best.v;
            self.a_acc = best.a;
        }

        self.v_acc_future = future_speed(
            self.mpc1.v_mpc_future(),
            self.mpc2.v_mpc_future(),
            v_cruise_setpoint,
        );

        // ---- COLLISION WARNING ----

        if mpc1_report.new_lead || mpc2_report.new_lead {
            self.fcw.reset_lead(t);
        }

        let fcw_raw = match lead_one {
            Some(lead) => {
                self.fcw.update(
                    &FcwInput {
                        cycle_time_s: t,
                        v_ego,
                        a_ego: ego.a_ego,
                        blinkers: ego.blinkers(),
                        mpc_a_ego: &self.mpc1.solution().a_ego,
                    },
                    lead,
                )
            }
            None => false,
        };

        let fcw = gate_fcw(
            fcw_raw,
            ego.brake_pressed,
            long_control_state,
            self.params.fcw_enabled,
        );

        if fcw {
            info!(
                "FCW triggered at {:.2} s (min MPC accel {:.2} m/s^2) {:?}",
                t,
                self.fcw.last_fcw_a(),
                self.fcw.counters()
            );
        }

        // ---- RADAR HEALTH ----

        let processing_delay_s = t - input.radar.rcv_time_s;
        let radar_dead = processing_delay_s > RADAR_TIMEOUT_S;
        let radar_valid = !(radar_dead || input.radar.has_fault());

        if radar_dead {
            debug!("Radar snapshot is {:.3} s old", processing_delay_s);
        }

        // ---- PUBLISH ----

        let plan = Plan {
            v_cruise: self.v_cruise,
            a_cruise: self.a_cruise,
            v_start: self.recurrence.v,
            a_start: self.recurrence.a,
            v_target: self.v_acc,
            a_target: self.a_acc,
            v_target_future: self.v_acc_future,
            has_lead: self.mpc1.has_lead(),
            longitudinal_plan_source: self.source,
            v_curvature: targets.v_curvature,
            decel_for_turn: targets.plan_decel_for_turn(v_ego),
            map_valid: map.is_some(),
            radar_valid,
            radar_comm_issue: input.radar.has_comm_issue(),
            processing_delay_s,
            fcw,
        };

        self.rows = Some((
            PlanRow::new(t, &plan),
            [
                MpcDiagnosticRow::new(t, &self.mpc1, &mpc1_report),
                MpcDiagnosticRow::new(t, &self.mpc2, &mpc2_report),
            ],
        ));

        // Seed of the next cycle, one interpolation step along the plan
        self.recurrence.advance(self.a_acc);

        let report = StatusReport {
            enabled,
            mpc1: mpc1_report,
            mpc2: mpc2_report,
            accel_limits,
            jerk_limits,
            targets,
            source_changed,
            fcw_raw,
            fcw_counters: *self.fcw.counters(),
        };

        (plan, report)
    }

    /// Current and upcoming steering angles used to limit acceleration in
    /// turns. Both are ignored while signalling.
    fn turn_angles(&self, ego: &EgoState, lat_plan: Option<&LateralPlan>) -> (f64, f64) {
        if ego.blinkers() {
            return (0.0, 0.0);
        }

        let angle_later = match lat_plan {
            Some(p) if ego.v_ego > LATER_ANGLE_MIN_SPEED_MS => p.angle_later_deg,
            _ => 0.0,
        };

        (ego.steering_angle_deg, angle_later * self.params.steer_ratio)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn mpc1(&self) -> &LongMpc<S> {
        &self.mpc1
    }

    pub fn mpc2(&self) -> &LongMpc<S> {
        &self.mpc2
    }

    pub fn recurrence(&self) -> Recurrence {
        self.recurrence
    }

    pub fn source(&self) -> PlanSource {
        self.source
    }

    pub fn fcw(&self) -> &FcwChecker {
        &self.fcw
    }
}

impl<S: LongSolver> State for LongPlanner<S> {
    type InitData = &'static str;
    type InitError = LongPlanError;

    type InputData = InputData;
    type OutputData = Plan;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// Initialise the planner.
    ///
    /// Expected init data is the path to the parameter file.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        let params: Params = params::load(init_data).map_err(LongPlanError::ParamLoadError)?;
        self.reconfigure(params)?;

        self.arch_plan = Archiver::from_path(session, "long_plan/plan.csv")
            .map_err(LongPlanError::ArchiveError)?;

        if self.params.mpc.verbose {
            self.arch_mpc = Archiver::from_path(session, "long_plan/mpc.csv")
                .map_err(LongPlanError::ArchiveError)?;
        }

        info!(
            "Longitudinal planner initialised in {} mode",
            self.params.drive_mode
        );

        Ok(())
    }

    /// Perform cyclic processing of the planner.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let (plan, report) = self.update(input_data);

        if let Err(e) = self.write() {
            warn!("Could not archive the plan: {}", e);
        }

        Ok((plan, report))
    }
}

impl<S: LongSolver> Archived for LongPlanner<S> {
    fn write(&mut self) -> Result<(), ArchiveError> {
        let (plan_row, mpc_rows) = match self.rows {
            Some(r) => r,
            None => return Ok(()),
        };

        if self.arch_plan.is_init() {
            self.arch_plan.serialise(plan_row)?;
        }

        if self.arch_mpc.is_init() && self.params.mpc.verbose {
            for row in mpc_rows.iter() {
                self.arch_mpc.serialise(row)?;
            }
        }

        Ok(())
    }
}

impl PlanRow {
    fn new(time_s: f64, plan: &Plan) -> Self {
        Self {
            time_s,
            v_cruise: plan.v_cruise,
            a_cruise: plan.a_cruise,
            v_start: plan.v_start,
            a_start: plan.a_start,
            v_target: plan.v_target,
            a_target: plan.a_target,
            v_target_future: plan.v_target_future,
            has_lead: plan.has_lead,
            longitudinal_plan_source: plan.longitudinal_plan_source,
            v_curvature: plan.v_curvature,
            decel_for_turn: plan.decel_for_turn,
            map_valid: plan.map_valid,
            radar_valid: plan.radar_valid,
            radar_comm_issue: plan.radar_comm_issue,
            processing_delay_s: plan.processing_delay_s,
            fcw: plan.fcw,
        }
    }
}

impl MpcDiagnosticRow {
    fn new<S: LongSolver>(time_s: f64, mpc: &LongMpc<S>, report: &MpcReport) -> Self {
        Self {
            time_s,
            mpc_id: report.mpc_id,
            has_lead: report.has_lead,
            new_lead: report.new_lead,
            tr_s: report.tr_s,
            cost: report.cost,
            qp_iterations: report.qp_iterations,
            solve_time_s: report.solve_time_s,
            v_mpc: mpc.v_mpc(),
            a_mpc: mpc.a_mpc(),
            v_mpc_future: mpc.v_mpc_future(),
            reset: report.reset.is_some(),
            lead_accel_estimate_mss: report.lead_accel_estimate_mss,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Published collision warning for a raw checker output.
///
/// Never raised while braking, and raised while off only if `fcw_enabled`.
fn gate_fcw(
    fcw_raw: bool,
    brake_pressed: bool,
    long_control_state: LongCtrlState,
    fcw_enabled: bool,
) -> bool {
    fcw_raw && !brake_pressed && (fcw_enabled || long_control_state != LongCtrlState::Off)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
