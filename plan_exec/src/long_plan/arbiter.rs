//! # Solution arbiter
//!
//! Picks the binding plan out of the cruise smoother and the two MPC
//! instances, and carries the chosen plan over to the next cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use crate::long_mpc::DT_MPC;
use comms_if::plan::PlanSource;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Speed and acceleration proposed by one source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub source: PlanSource,

    /// Units: meters/second
    pub v: f64,

    /// Units: meters/second^2
    pub a: f64,
}

/// The (speed, acceleration) seed carried from one cycle to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Recurrence {
    /// Units: meters/second
    pub v: f64,

    /// Units: meters/second^2
    pub a: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Recurrence {
    /// Interpolation step between two cycles.
    ///
    /// Units: seconds
    pub const STEP_S: f64 = 0.05;

    pub fn new(v: f64, a: f64) -> Self {
        Self { v, a }
    }

    /// Move the seed one step toward the target acceleration `a_target`, which
    /// is reached over one MPC step, integrating the speed with the
    /// trapezoidal rule.
    pub fn advance(&mut self, a_target: f64) {
        let a = self.a + (Self::STEP_S / DT_MPC) * (a_target - self.a);
        self.v += Self::STEP_S * (a + self.a) / 2.0;
        self.a = a;
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Choose the slowest candidate.
///
/// The cruise candidate always takes part, the MPC candidates only when they
/// are tracking a lead. Ties go to the earlier candidate, cruise first.
pub fn choose_solution(cruise: Candidate, mpc1: Option<Candidate>, mpc2: Option<Candidate>) -> Candidate {
    let mut best = cruise;

    for c in mpc1.iter().chain(mpc2.iter()) {
        if c.v < best.v {
            best = *c;
        }
    }

    best
}

/// Speed used by downstream safety checks, the slowest of the MPC look ahead
/// speeds and the cruise setpoint.
pub fn future_speed(v_mpc1_future: f64, v_mpc2_future: f64, v_cruise_setpoint: f64) -> f64 {
    v_mpc1_future.min(v_mpc2_future).min(v_cruise_setpoint)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn cand(source: PlanSource, v: f64, a: f64) -> Candidate {
        Candidate { source, v, a }
    }

    #[test]
    fn test_choose_slowest() {
        let cruise = cand(PlanSource::Cruise, 20.0, 0.5);
        let mpc1 = cand(PlanSource::Mpc1, 18.0, -1.0);
        let mpc2 = cand(PlanSource::Mpc2, 19.0, -0.5);

        assert_eq!(choose_solution(cruise, None, None), cruise);
        assert_eq!(choose_solution(cruise, Some(mpc1), Some(mpc2)), mpc1);
        assert_eq!(choose_solution(cruise, None, Some(mpc2)), mpc2);

        // Ties keep cruise
        let tie = cand(PlanSource::Mpc1, 20.0, -2.0);
        assert_eq!(choose_solution(cruise, Some(tie), None).source, PlanSource::Cruise);
    }

    #[test]
    fn test_future_speed() {
        assert_eq!(future_speed(15.0, 25.0, 20.0), 15.0);
        assert_eq!(future_speed(30.0, 25.0, 20.0), 20.0);
    }

    #[test]
    fn test_recurrence_step() {
        let mut r = Recurrence::new(10.0, 0.0);
        r.advance(1.0);
        assert!((r.a - 0.25).abs() < 1e-12);
        assert!((r.v - (10.0 + 0.05 * 0.125)).abs() < 1e-12);

        // Settles on a constant target
        let mut r = Recurrence::new(10.0, 0.0);
        for _ in 0..200 {
            r.advance(0.0);
        }
        assert_eq!(r, Recurrence::new(10.0, 0.0));
    }
}
