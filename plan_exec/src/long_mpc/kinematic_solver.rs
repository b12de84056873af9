//! # Kinematic reference solver
//!
//! A [`LongSolver`] which rolls a gap/speed feedback law forward over the
//! horizon instead of solving a QP. The law follows the lead at the requested
//! time-gap, with the gap gain scaled by the distance weight, and the result
//! is bounded in acceleration and jerk. It gives the planner realistic
//! trajectories for replays, integration tests and benchmarks.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;

use util::maths::clamp;

use super::{
    CostWeights, LeadGeometry, LongSolver, MpcSolution, MpcState, SolverFault, SolverOutput,
    DT_MPC, HORIZON_LEN,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Gap kept to a stopped lead.
///
/// Units: meters
pub const STOP_DISTANCE_M: f64 = 4.0;

const GAP_GAIN: f64 = 0.05;
const VEL_GAIN: f64 = 0.6;

/// Units: meters/second^2
const A_MIN: f64 = -3.5;
const A_MAX: f64 = 2.0;

/// Units: meters/second^3
const MAX_JERK: f64 = 5.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Reference solver, see the module documentation.
#[derive(Debug, Clone)]
pub struct KinematicSolver {
    weights: CostWeights,

    /// Number of cold starts (`init`)
    num_resets: u32,

    /// Number of lead initialisations (`init_with_simulation`)
    num_lead_inits: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for KinematicSolver {
    fn default() -> Self {
        Self {
            weights: CostWeights::default(),
            num_resets: 0,
            num_lead_inits: 0,
        }
    }
}

impl KinematicSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    pub fn num_resets(&self) -> u32 {
        self.num_resets
    }

    pub fn num_lead_inits(&self) -> u32 {
        self.num_lead_inits
    }

    /// Acceleration demanded by the feedback law at one point of the horizon.
    fn demand(&self, gap: f64, v_ego: f64, v_lead: f64, tr_s: f64) -> f64 {
        let desired_gap = STOP_DISTANCE_M + tr_s * v_ego;
        let gap_gain = GAP_GAIN * (1.0 + self.weights.distance);

        gap_gain * (gap - desired_gap) + VEL_GAIN * (v_lead - v_ego)
    }
}

impl LongSolver for KinematicSolver {
    fn init(&mut self, weights: &CostWeights) {
        self.weights = *weights;
        self.num_resets += 1;
    }

    fn set_weights(&mut self, weights: &CostWeights) {
        self.weights = *weights;
    }

    fn init_with_simulation(&mut self, v_ego: f64, lead: &LeadGeometry, a_lead_tau: f64) {
        // The rollout has no warm start to prime
        trace!(
            "Kinematic solver lead init: v_ego = {:.2}, lead = {:?}, tau = {:.2}",
            v_ego,
            lead,
            a_lead_tau
        );
        self.num_lead_inits += 1;
    }

    fn solve(
        &mut self,
        state: &MpcState,
        a_lead: f64,
        a_lead_tau: f64,
        tr_s: f64,
    ) -> Result<SolverOutput, SolverFault> {
        let seed = [
            state.x_ego,
            state.v_ego,
            state.a_ego,
            state.x_lead,
            state.v_lead,
            a_lead,
            a_lead_tau,
            tr_s,
        ];
        if seed.iter().any(|v| !v.is_finite()) {
            return Err(SolverFault::Failed(format!(
                "non-finite seed: {:?}, a_lead = {}, tau = {}, tr = {}",
                state, a_lead, a_lead_tau, tr_s
            )));
        }

        let mut sol = MpcSolution {
            x_ego: Vec::with_capacity(HORIZON_LEN),
            v_ego: Vec::with_capacity(HORIZON_LEN),
            a_ego: Vec::with_capacity(HORIZON_LEN),
            x_lead: Vec::with_capacity(HORIZON_LEN),
            v_lead: Vec::with_capacity(HORIZON_LEN),
            cost: 0.0,
        };

        let (mut x_e, mut v_e, mut a_e) = (state.x_ego, state.v_ego.max(0.0), state.a_ego);
        let (mut x_l, mut v_l) = (state.x_lead, state.v_lead.max(0.0));
        let max_step = MAX_JERK * DT_MPC;

        for k in 0..HORIZON_LEN {
            sol.x_ego.push(x_e);
            sol.v_ego.push(v_e);
            sol.a_ego.push(a_e);
            sol.x_lead.push(x_l);
            sol.v_lead.push(v_l);

            if k == HORIZON_LEN - 1 {
                break;
            }

            // Lead acceleration decays over the horizon
            let t = k as f64 * DT_MPC;
            let a_l = a_lead * (-a_lead_tau * t * t / 2.0).exp();

            // Next ego acceleration, bounded in value and rate
            let a_des = clamp(&self.demand(x_l - x_e, v_e, v_l, tr_s), &A_MIN, &A_MAX);
            let a_next = a_e + clamp(&(a_des - a_e), &-max_step, &max_step);
            let jerk = (a_next - a_e) / DT_MPC;

            // Objective contribution of this step
            let gap = x_l - x_e;
            let gap_err = gap - (STOP_DISTANCE_M + tr_s * v_e);
            let closing = (v_e - v_l).max(0.0) / gap.max(0.1);
            sol.cost += DT_MPC
                * (self.weights.distance * gap_err * gap_err
                    + self.weights.ttc * closing * closing
                    + self.weights.acceleration * a_next * a_next
                    + self.weights.jerk * jerk * jerk);

            // Integrate the ego, which cannot reverse
            x_e += v_e * DT_MPC + 0.5 * a_next * DT_MPC * DT_MPC;
            v_e += a_next * DT_MPC;
            a_e = a_next;
            if v_e < 0.0 {
                v_e = 0.0;
                a_e = a_e.max(0.0);
            }

            // Integrate the lead
            x_l += v_l * DT_MPC + 0.5 * a_l * DT_MPC * DT_MPC;
            v_l = (v_l + a_l * DT_MPC).max(0.0);
        }

        Ok(SolverOutput {
            solution: sol,
            qp_iterations: (HORIZON_LEN - 1) as u32,
        })
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
