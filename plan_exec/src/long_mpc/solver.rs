//! # Solver interface
//!
//! The numerical optimiser is an injected capability. [`LongMpc`](super::LongMpc) only ever
//! talks to it through [`LongSolver`], so any implementation (a QP solver, the reference
//! [`KinematicSolver`](super::KinematicSolver), or a test fixture) can be dropped in.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use super::SolverFault;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Weights of the MPC objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostWeights {
    /// Weight on the time-to-collision term
    pub ttc: f64,

    /// Weight on the following distance error, selected from the time-gap
    /// each cycle
    pub distance: f64,

    pub acceleration: f64,

    pub jerk: f64,
}

/// Seed state of one solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MpcState {
    /// Units: meters
    pub x_ego: f64,

    /// Units: meters/second
    pub v_ego: f64,

    /// Units: meters/second^2
    pub a_ego: f64,

    /// Units: meters
    pub x_lead: f64,

    /// Units: meters/second
    pub v_lead: f64,
}

/// Position, speed and acceleration of the lead the MPC is tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LeadGeometry {
    /// Distance ahead of the ego
    ///
    /// Units: meters
    pub x_lead: f64,

    /// Units: meters/second
    pub v_lead: f64,

    /// Units: meters/second^2
    pub a_lead: f64,
}

/// A trajectory predicted by the solver over the horizon.
///
/// Index 0 of each sequence is the seed state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MpcSolution {
    pub x_ego: Vec<f64>,
    pub v_ego: Vec<f64>,
    pub a_ego: Vec<f64>,
    pub x_lead: Vec<f64>,
    pub v_lead: Vec<f64>,

    /// Value of the objective
    pub cost: f64,
}

/// What a successful solve returns.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub solution: MpcSolution,
    pub qp_iterations: u32,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A longitudinal trajectory optimiser.
pub trait LongSolver {
    /// Cold start the solver with the given weights, discarding any warm start.
    fn init(&mut self, weights: &CostWeights);

    /// Change the objective weights, keeping the warm start.
    fn set_weights(&mut self, weights: &CostWeights);

    /// Prime the warm start by simulating the ego from `v_ego` behind a newly
    /// acquired lead.
    fn init_with_simulation(&mut self, v_ego: f64, lead: &LeadGeometry, a_lead_tau: f64);

    /// Solve over the horizon from `state`, following at time-gap `tr_s`.
    fn solve(
        &mut self,
        state: &MpcState,
        a_lead: f64,
        a_lead_tau: f64,
        tr_s: f64,
    ) -> Result<SolverOutput, SolverFault>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            ttc: 5.0,
            distance: 0.1,
            acceleration: 10.0,
            jerk: 20.0,
        }
    }
}

impl CostWeights {
    /// Copy of these weights with a different distance weight.
    pub fn with_distance(&self, distance: f64) -> Self {
        Self { distance, ..*self }
    }
}

impl MpcSolution {
    /// Number of points in the trajectory, i.e. the length of its shortest
    /// sequence.
    pub fn len(&self) -> usize {
        [
            self.x_ego.len(),
            self.v_ego.len(),
            self.a_ego.len(),
            self.x_lead.len(),
            self.v_lead.len(),
        ]
        .iter()
        .copied()
        .min()
        .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: LongSolver + ?Sized> LongSolver for Box<S> {
    fn init(&mut self, weights: &CostWeights) {
        (**self).init(weights)
    }

    fn set_weights(&mut self, weights: &CostWeights) {
        (**self).set_weights(weights)
    }

    fn init_with_simulation(&mut self, v_ego: f64, lead: &LeadGeometry, a_lead_tau: f64) {
        (**self).init_with_simulation(v_ego, lead, a_lead_tau)
    }

    fn solve(
        &mut self,
        state: &MpcState,
        a_lead: f64,
        a_lead_tau: f64,
        tr_s: f64,
    ) -> Result<SolverOutput, SolverFault> {
        (**self).solve(state, a_lead, a_lead_tau, tr_s)
    }
}

// ---------------------------------------------------------------------------
// TEST FIXTURE
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fixture {
    use std::collections::VecDeque;

    use super::*;
    use crate::long_mpc::{DT_MPC, HORIZON_LEN};

    /// A call made on the fixture solver.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum SolverCall {
        Init(CostWeights),
        SetWeights(CostWeights),
        InitWithSimulation {
            v_ego: f64,
            lead: LeadGeometry,
            a_lead_tau: f64,
        },
        Solve {
            state: MpcState,
            a_lead: f64,
            a_lead_tau: f64,
            tr_s: f64,
        },
    }

    /// A solver returning programmed results, recording every call made on it.
    ///
    /// Queued results are returned in order. Once the queue is empty every solve
    /// holds the seed speed with a lead far ahead.
    #[derive(Debug, Default)]
    pub(crate) struct FixtureSolver {
        pub queue: VecDeque<Result<SolverOutput, SolverFault>>,
        pub calls: Vec<SolverCall>,
    }

    impl FixtureSolver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&mut self, result: Result<SolverOutput, SolverFault>) {
            self.queue.push_back(result);
        }

        pub fn push_solution(&mut self, solution: MpcSolution) {
            self.push(Ok(SolverOutput {
                solution,
                qp_iterations: 3,
            }))
        }

        pub fn count<F: Fn(&SolverCall) -> bool>(&self, f: F) -> usize {
            self.calls.iter().filter(|c| f(c)).count()
        }

        pub fn num_inits(&self) -> usize {
            self.count(|c| matches!(c, SolverCall::Init(_)))
        }

        pub fn num_simulations(&self) -> usize {
            self.count(|c| matches!(c, SolverCall::InitWithSimulation { .. }))
        }

        pub fn last_solve(&self) -> Option<&SolverCall> {
            self.calls
                .iter()
                .rev()
                .find(|c| matches!(c, SolverCall::Solve { .. }))
        }
    }

    /// A constant acceleration trajectory from `v0`, with the lead holding
    /// `gap_m` ahead at the same speed.
    pub(crate) fn ramp(v0: f64, a: f64, gap_m: f64) -> MpcSolution {
        let mut sol = MpcSolution::default();
        for i in 0..HORIZON_LEN {
            let t = i as f64 * DT_MPC;
            let v = v0 + a * t;
            let x = v0 * t + 0.5 * a * t * t;
            sol.x_ego.push(x);
            sol.v_ego.push(v);
            sol.a_ego.push(a);
            sol.x_lead.push(x + gap_m);
            sol.v_lead.push(v);
        }
        sol
    }

    impl LongSolver for FixtureSolver {
        fn init(&mut self, weights: &CostWeights) {
            self.calls.push(SolverCall::Init(*weights));
        }

        fn set_weights(&mut self, weights: &CostWeights) {
            self.calls.push(SolverCall::SetWeights(*weights));
        }

        fn init_with_simulation(&mut self, v_ego: f64, lead: &LeadGeometry, a_lead_tau: f64) {
            self.calls.push(SolverCall::InitWithSimulation {
                v_ego,
                lead: *lead,
                a_lead_tau,
            });
        }

        fn solve(
            &mut self,
            state: &MpcState,
            a_lead: f64,
            a_lead_tau: f64,
            tr_s: f64,
        ) -> Result<SolverOutput, SolverFault> {
            self.calls.push(SolverCall::Solve {
                state: *state,
                a_lead,
                a_lead_tau,
                tr_s,
            });

            match self.queue.pop_front() {
                Some(r) => r,
                None => Ok(SolverOutput {
                    solution: ramp(state.v_ego, 0.0, 50.0),
                    qp_iterations: 1,
                }),
            }
        }
    }
}
