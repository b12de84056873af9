//! # Forward collision warning
//!
//! The checker watches the primary MPC's predicted accelerations together with
//! the primary lead. A warning is only raised after the lead has been seen
//! consistently in a threatening configuration for a number of cycles.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use comms_if::radar::LeadTrack;
use util::maths::interp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Lead tracks below this collision probability are not considered.
const FCW_PROB_MIN: f64 = 0.99;

/// Every counter must reach this before a warning can fire.
const COUNTER_THRESHOLD: f64 = 10.0;

/// Units: seconds
const MAX_TTC_S: f64 = 5.0;
const TTC_THRESHOLD_S: f64 = 2.5;

/// Minimum time the lead takes to decelerate to a stop in the TTC estimate.
///
/// Units: seconds
const LEAD_DECEL_TIME_S: f64 = 2.0;

/// Minimum time between two warnings.
///
/// Units: seconds
const WARNING_PERIOD_S: f64 = 5.0;

/// Units: meters/second
const V_EGO_MIN_MS: f64 = 5.0;
const V_LEAD_MAX_MIN_MS: f64 = 2.5;

/// Lateral bounds of a lead in the ego's path.
const Y_LEAD_MAX_M: f64 = 1.0;
const V_LAT_LEAD_MAX_MS: f64 = 0.4;

/// MPC accelerations below this always count as a threat.
///
/// Units: meters/second^2
const A_MPC_THRESHOLD_MSS: f64 = -3.0;

/// Braking threshold on the change of ego acceleration by lead speed.
const A_ACT_BP: [f64; 2] = [0.0, 30.0];
const A_ACT_V: [f64; 2] = [-3.0, -2.0];

/// Number of MPC points checked against the braking threshold.
const A_CHECK_POINTS: usize = 15;

/// Lead seen counter increment per cycle.
const LEAD_SEEN_INC: f64 = 0.33;

/// Blinker counter increment per cycle, reaching the threshold after 3 s at
/// 20 Hz.
const BLINKERS_INC: f64 = 10.0 / (20.0 * 3.0);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Consecutive-cycle counters of the warning conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FcwCounters {
    pub v_ego: f64,
    pub ttc: f64,
    pub v_lead_max: f64,
    pub v_ego_lead: f64,
    pub lead_seen: f64,
    pub y_lead: f64,
    pub vlat_lead: f64,
    pub blinkers: f64,
}

/// The forward collision warning checker.
#[derive(Debug, Clone, Default)]
pub struct FcwChecker {
    counters: FcwCounters,

    /// Time of the last warning
    last_fcw_time_s: Option<f64>,

    /// MPC minimum acceleration at the last warning
    last_fcw_a: f64,

    /// Highest lead speed since the lead was acquired
    v_lead_max: f64,

    /// Minimum MPC acceleration of the last update
    last_min_a: f64,

    lead_seen_t: f64,
}

/// Ego state and primary MPC prediction for one check.
#[derive(Debug, Clone, Copy)]
pub struct FcwInput<'a> {
    /// Units: seconds
    pub cycle_time_s: f64,

    /// Units: meters/second
    pub v_ego: f64,

    /// Units: meters/second^2
    pub a_ego: f64,

    pub blinkers: bool,

    /// Accelerations predicted by the primary MPC
    pub mpc_a_ego: &'a [f64],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FcwChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-arm the checker for a newly acquired lead.
    pub fn reset_lead(&mut self, cur_time_s: f64) {
        self.last_fcw_a = 0.0;
        self.v_lead_max = 0.0;
        self.lead_seen_t = cur_time_s;
        self.last_min_a = 0.0;
        self.counters = FcwCounters::default();
    }

    /// Run one check against `lead`, returning true if a warning fires.
    pub fn update(&mut self, input: &FcwInput, lead: &LeadTrack) -> bool {
        self.last_min_a = input
            .mpc_a_ego
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        self.v_lead_max = self.v_lead_max.max(lead.v_lead);

        if !(lead.fcw > FCW_PROB_MIN) {
            return false;
        }

        let ttc = calc_ttc(input.v_ego, input.a_ego, lead.d_rel, lead.v_lead, lead.a_lead_k);

        let c = &mut self.counters;
        count(&mut c.v_ego, input.v_ego > V_EGO_MIN_MS);
        count(&mut c.ttc, ttc < TTC_THRESHOLD_S);
        count(&mut c.v_lead_max, self.v_lead_max > V_LEAD_MAX_MIN_MS);
        count(&mut c.v_ego_lead, input.v_ego > lead.v_lead);
        c.lead_seen += LEAD_SEEN_INC;
        count(&mut c.y_lead, lead.y_rel.abs() < Y_LEAD_MAX_M);
        count(&mut c.vlat_lead, lead.v_lat.abs() < V_LAT_LEAD_MAX_MS);
        c.blinkers = if input.blinkers {
            0.0
        }
        else {
            c.blinkers + BLINKERS_INC
        };

        let a_thr = interp(lead.v_lead, &A_ACT_BP, &A_ACT_V);
        let a_delta = input
            .mpc_a_ego
            .iter()
            .take(A_CHECK_POINTS)
            .copied()
            .fold(f64::INFINITY, f64::min)
            - input.a_ego.min(0.0);

        let period_elapsed = match self.last_fcw_time_s {
            Some(t) => t + WARNING_PERIOD_S < input.cycle_time_s,
            None => true,
        };

        if (self.last_min_a < A_MPC_THRESHOLD_MSS || a_delta < a_thr)
            && self.counters.all_reached()
            && period_elapsed
        {
            self.last_fcw_time_s = Some(input.cycle_time_s);
            self.last_fcw_a = self.last_min_a;
            return true;
        }

        false
    }

    pub fn counters(&self) -> &FcwCounters {
        &self.counters
    }

    pub fn last_fcw_time_s(&self) -> Option<f64> {
        self.last_fcw_time_s
    }

    pub fn last_fcw_a(&self) -> f64 {
        self.last_fcw_a
    }

    /// Time the current lead was acquired.
    pub fn lead_seen_t(&self) -> f64 {
        self.lead_seen_t
    }
}

impl FcwCounters {
    fn all_reached(&self) -> bool {
        [
            self.v_ego,
            self.ttc,
            self.v_lead_max,
            self.v_ego_lead,
            self.lead_seen,
            self.y_lead,
            self.vlat_lead,
            self.blinkers,
        ]
        .iter()
        .all(|c| *c >= COUNTER_THRESHOLD)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Time to collision with the lead, capped at 5 s.
///
/// The relative acceleration is limited so the lead takes at least 2 s to
/// stop, which stops a nearly stopped lead's deceleration dominating.
pub fn calc_ttc(v_ego: f64, a_ego: f64, x_lead: f64, v_lead: f64, a_lead: f64) -> f64 {
    let v_rel = v_ego - v_lead;
    let a_rel = (a_ego - a_lead).min(v_lead / LEAD_DECEL_TIME_S);

    let delta = v_rel * v_rel + 2.0 * x_lead * a_rel;

    if delta < 0.1 || delta.sqrt() + v_rel < 0.1 {
        MAX_TTC_S
    }
    else {
        (2.0 * x_lead / (delta.sqrt() + v_rel)).min(MAX_TTC_S)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn count(counter: &mut f64, condition: bool) {
    *counter = if condition { *counter + 1.0 } else { 0.0 };
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
