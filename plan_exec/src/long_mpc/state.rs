//! Implementations for the LongMpc state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::time::Instant;
use log::{debug, trace, warn};
use serde::Serialize;

// Internal
use super::{
    dynamic_follow, no_lead, phantom_lead, sanitise_lead, select_cost, CostSelector, CostWeights,
    LeadGeometry, LeadHistory, LongSolver, MpcParams, MpcSolution, MpcState, SolverFault,
    FUTURE_INDEX, LEAD_ACCEL_TAU, TR_MAX, TR_MIN,
};
use comms_if::{
    car::{EgoState, PhantomCmd},
    plan::MpcDiagnostic,
    radar::LeadTrack,
};
use util::{maths::clamp, time::std_duration_to_nanos};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// A lead whose distance jumps by more than this between cycles is treated as
/// a new lead.
///
/// Units: meters
pub const LEAD_JUMP_M: f64 = 2.5;

/// A predicted lead further behind the ego than this is a crash.
///
/// Units: meters
pub const CRASH_TOLERANCE_M: f64 = -50.0;

/// Predicted speeds below this are backwards motion.
///
/// Units: meters/second
pub const BACKWARDS_TOLERANCE_MS: f64 = -0.01;

/// Minimum time between two reset log entries.
///
/// Units: seconds
pub const RESET_LOG_PERIOD_S: f64 = 5.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One longitudinal MPC instance.
pub struct LongMpc<S: LongSolver> {
    mpc_id: u8,
    solver: S,
    params: MpcParams,
    weights: CostWeights,

    /// Seed of the next solve
    cur_state: MpcState,

    track: MpcTrackState,
    new_lead: bool,
    a_lead_tau: f64,

    /// The lead followed this cycle, real or phantom
    lead_data: Option<LeadGeometry>,
    history: LeadHistory,

    cost: CostSelector,
    tr_s: f64,

    v_mpc: f64,
    a_mpc: f64,
    v_mpc_future: f64,
    solution: MpcSolution,

    last_reset_log_s: Option<f64>,
}

/// Per cycle input to an MPC instance.
#[derive(Debug, Clone, Copy)]
pub struct MpcInput<'a> {
    /// Units: seconds
    pub cycle_time_s: f64,

    pub ego: &'a EgoState,

    /// The radar track this instance follows
    pub lead: Option<&'a LeadTrack>,

    pub phantom: Option<&'a PhantomCmd>,
}

/// Report on one MPC update.
#[derive(Debug, Clone, Serialize)]
pub struct MpcReport {
    pub mpc_id: u8,

    /// A lead was acquired (or jumped) and the solver was re-seeded
    pub new_lead: bool,

    pub has_lead: bool,

    /// Units: seconds
    pub tr_s: f64,

    pub cost: f64,

    pub qp_iterations: u32,

    /// Wall clock duration of the solve
    ///
    /// Units: seconds
    pub solve_time_s: f64,

    /// Set when the instance was reset this cycle
    pub reset: Option<MpcResetCause>,

    /// The reset was logged, at most once per [`RESET_LOG_PERIOD_S`]
    pub reset_logged: bool,

    /// Lead acceleration from the speed history
    ///
    /// Units: meters/second^2
    pub lead_accel_estimate_mss: f64,

    /// Full trajectory record, only when verbose
    #[serde(skip)]
    pub diagnostic: Option<MpcDiagnostic>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Lead tracking state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum MpcTrackState {
    /// No lead is tracked
    Empty,

    /// Tracking a lead, seeded at `x_lead`
    Tracking { x_lead: f64 },
}

/// Why an instance was reset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MpcResetCause {
    /// The solved trajectory was unusable
    Trajectory {
        backwards: bool,
        crashing: bool,
        nans: bool,
    },

    /// The solver returned a fault instead of a trajectory
    Solver(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<S: LongSolver> LongMpc<S> {
    /// Create a new instance, cold starting the solver.
    pub fn new(mpc_id: u8, mut solver: S, params: MpcParams) -> Self {
        let weights = CostWeights::default();
        solver.init(&weights);

        Self {
            mpc_id,
            solver,
            params,
            weights,
            cur_state: MpcState::default(),
            track: MpcTrackState::Empty,
            new_lead: false,
            a_lead_tau: LEAD_ACCEL_TAU,
            lead_data: None,
            history: LeadHistory::new(),
            cost: CostSelector::new(),
            tr_s: 0.0,
            v_mpc: 0.0,
            a_mpc: 0.0,
            v_mpc_future: 0.0,
            solution: MpcSolution::default(),
            last_reset_log_s: None,
        }
    }

    /// Set the ego speed and acceleration the next solve starts from.
    pub fn set_cur_state(&mut self, v: f64, a: f64) {
        self.cur_state.v_ego = v;
        self.cur_state.a_ego = a;
    }

    /// Replace the parameters, effective from the next update.
    pub fn set_params(&mut self, params: MpcParams) {
        self.params = params;
    }

    /// Run one cycle of the MPC.
    pub fn update(&mut self, input: &MpcInput) -> MpcReport {
        let v_ego = input.ego.v_ego;
        let lead = input.lead.filter(|l| l.status);

        // ---- LEAD SELECTION ----

        self.cur_state.x_ego = 0.0;

        let phantom = input.phantom.filter(|p| p.status);

        let a_lead = match (phantom, lead) {
            (Some(p), _) => {
                let geom = phantom_lead(p, lead, v_ego);
                self.a_lead_tau = lead.map(|l| l.a_lead_tau).unwrap_or(LEAD_ACCEL_TAU);
                self.track_lead(geom);
                geom.a_lead
            }
            (None, Some(l)) => {
                let geom = sanitise_lead(l);
                self.a_lead_tau = l.a_lead_tau;
                self.track_lead(geom);
                geom.a_lead
            }
            (None, None) => {
                let fake = no_lead(v_ego);
                self.track = MpcTrackState::Empty;
                self.new_lead = false;
                self.lead_data = None;
                self.a_lead_tau = LEAD_ACCEL_TAU;
                self.cur_state.x_lead = fake.x_lead;
                self.cur_state.v_lead = fake.v_lead;
                fake.a_lead
            }
        };

        self.history.record(self.lead_data.map(|l| l.v_lead));

        // ---- TIME-GAP AND COST ----

        self.tr_s = match self.params.following_distance_s {
            Some(tr) => clamp(&tr, &TR_MIN, &TR_MAX),
            None => {
                let traffic_mod = if self.params.use_traffic_level {
                    self.history.traffic_level(v_ego)
                }
                else {
                    1.0
                };
                dynamic_follow(
                    v_ego,
                    self.lead_data.as_ref(),
                    input.ego.blinkers(),
                    traffic_mod,
                )
            }
        };

        let cost = select_cost(self.tr_s, v_ego, self.lead_data.as_ref());
        if self.cost.apply(cost) {
            self.solver.set_weights(&self.weights.with_distance(cost));
        }

        // ---- SOLVE ----

        let start = Instant::now();
        let result = self
            .solver
            .solve(&self.cur_state, a_lead, self.a_lead_tau, self.tr_s);
        let elapsed = start.elapsed();
        let solve_time_s = elapsed.as_secs_f64();

        let result = match result {
            Ok(_) if solve_time_s > self.params.solver_budget_s => Err(SolverFault::Overrun {
                took_s: solve_time_s,
                budget_s: self.params.solver_budget_s,
            }),
            Ok(out) if out.solution.len() <= FUTURE_INDEX => {
                Err(SolverFault::ShortTrajectory {
                    expected: FUTURE_INDEX + 1,
                    found: out.solution.len(),
                })
            }
            r => r,
        };

        let mut qp_iterations = 0;

        let reset = match result {
            Ok(out) => {
                qp_iterations = out.qp_iterations;
                self.solution = out.solution;

                // MPC points are 0.2 s apart, the planner interpolates to its
                // own step
                self.v_mpc = self.solution.v_ego[1];
                self.a_mpc = self.solution.a_ego[1];
                self.v_mpc_future = self.solution.v_ego[FUTURE_INDEX];

                let crashing = self
                    .solution
                    .x_lead
                    .iter()
                    .zip(self.solution.x_ego.iter())
                    .any(|(l, e)| l - e < CRASH_TOLERANCE_M);
                let nans = self
                    .solution
                    .v_ego
                    .iter()
                    .chain(self.solution.a_ego.iter())
                    .any(|v| v.is_nan());
                let backwards = self
                    .solution
                    .v_ego
                    .iter()
                    .any(|v| *v < BACKWARDS_TOLERANCE_MS);

                if ((backwards || crashing) && self.has_lead()) || nans {
                    Some(MpcResetCause::Trajectory {
                        backwards,
                        crashing,
                        nans,
                    })
                }
                else {
                    None
                }
            }
            Err(fault) => {
                self.solution = MpcSolution::default();
                Some(MpcResetCause::Solver(fault.to_string()))
            }
        };

        let reset_logged = match reset {
            Some(ref cause) => self.reset(input, cause),
            None => false,
        };

        trace!(
            "MPC{}: tr = {:.3}, cost = {:.3}, v = {:.3}, a = {:.3}, future = {:.3}",
            self.mpc_id,
            self.tr_s,
            cost,
            self.v_mpc,
            self.a_mpc,
            self.v_mpc_future
        );

        let diagnostic = if self.params.verbose {
            Some(self.diagnostic(qp_iterations, std_duration_to_nanos(elapsed)))
        }
        else {
            None
        };

        MpcReport {
            mpc_id: self.mpc_id,
            new_lead: self.new_lead,
            has_lead: self.has_lead(),
            tr_s: self.tr_s,
            cost,
            qp_iterations,
            solve_time_s,
            reset,
            reset_logged,
            lead_accel_estimate_mss: self.history.lead_accel_estimate(),
            diagnostic,
        }
    }

    /// Follow `geom` this cycle, re-seeding the solver if the lead is new or
    /// has jumped.
    fn track_lead(&mut self, geom: LeadGeometry) {
        self.new_lead = match self.track {
            MpcTrackState::Empty => true,
            MpcTrackState::Tracking { x_lead } => (geom.x_lead - x_lead).abs() > LEAD_JUMP_M,
        };

        if self.new_lead {
            debug!(
                "MPC{} new lead at {:.2} m, {:.2} m/s",
                self.mpc_id, geom.x_lead, geom.v_lead
            );
            self.solver
                .init_with_simulation(self.v_mpc, &geom, self.a_lead_tau);
        }

        self.track = MpcTrackState::Tracking {
            x_lead: geom.x_lead,
        };
        self.lead_data = Some(geom);
        self.cur_state.x_lead = geom.x_lead;
        self.cur_state.v_lead = geom.v_lead;
    }

    /// Hard reset the solver to the current ego speed, returning whether the
    /// reset was logged.
    fn reset(&mut self, input: &MpcInput, cause: &MpcResetCause) -> bool {
        let log_due = match self.last_reset_log_s {
            Some(t) => input.cycle_time_s > t + RESET_LOG_PERIOD_S,
            None => true,
        };
        if log_due {
            self.last_reset_log_s = Some(input.cycle_time_s);
            warn!("Longitudinal MPC{} reset: {:?}", self.mpc_id, cause);
        }

        self.solver.init(&self.weights);
        self.cost.invalidate();

        let v_ego = input.ego.v_ego;
        self.cur_state.v_ego = v_ego;
        self.cur_state.a_ego = 0.0;
        self.v_mpc = v_ego;
        self.a_mpc = input.ego.a_ego;
        self.v_mpc_future = v_ego;
        self.track = MpcTrackState::Empty;

        log_due
    }

    fn diagnostic(&self, qp_iterations: u32, calculation_time_ns: u64) -> MpcDiagnostic {
        MpcDiagnostic {
            mpc_id: self.mpc_id,
            x_ego: self.solution.x_ego.clone(),
            v_ego: self.solution.v_ego.clone(),
            a_ego: self.solution.a_ego.clone(),
            x_lead: self.solution.x_lead.clone(),
            v_lead: self.solution.v_lead.clone(),
            cost: self.solution.cost,
            a_lead_tau: self.a_lead_tau,
            qp_iterations,
            calculation_time_ns,
        }
    }

    pub fn mpc_id(&self) -> u8 {
        self.mpc_id
    }

    /// A lead (real or phantom) is being tracked.
    pub fn has_lead(&self) -> bool {
        matches!(self.track, MpcTrackState::Tracking { .. })
    }

    pub fn new_lead(&self) -> bool {
        self.new_lead
    }

    pub fn track_state(&self) -> MpcTrackState {
        self.track
    }

    /// Speed at the next MPC point.
    pub fn v_mpc(&self) -> f64 {
        self.v_mpc
    }

    /// Acceleration at the next MPC point.
    pub fn a_mpc(&self) -> f64 {
        self.a_mpc
    }

    /// Speed at the look ahead point.
    pub fn v_mpc_future(&self) -> f64 {
        self.v_mpc_future
    }

    pub fn cur_state(&self) -> &MpcState {
        &self.cur_state
    }

    pub fn solution(&self) -> &MpcSolution {
        &self.solution
    }

    pub fn tr_s(&self) -> f64 {
        self.tr_s
    }

    pub fn last_cost(&self) -> Option<f64> {
        self.cost.last_cost()
    }

    pub fn a_lead_tau(&self) -> f64 {
        self.a_lead_tau
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Cycle time of the last logged reset.
    pub fn last_reset_log_s(&self) -> Option<f64> {
        self.last_reset_log_s
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
