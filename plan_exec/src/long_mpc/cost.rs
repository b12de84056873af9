//! # Cost selection
//!
//! Maps the following time-gap onto the distance weight of the MPC objective.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use util::maths::{clamp, interp, round_to};

use super::LeadGeometry;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const COST_TR_BP: [f64; 3] = [0.9, 1.8, 2.7];
const COST_V: [f64; 3] = [1.0, 0.1, 0.05];

/// If the measured time-gap differs from the selected one by at least this
/// much the measured gap is used instead.
///
/// Units: seconds
pub const REAL_TR_THRESHOLD_S: f64 = 0.25;

/// Above this speed an approaching lead scales the cost by the closing speed.
///
/// Units: meters/second
pub const CLOSING_FACTOR_MIN_SPEED_MS: f64 = 5.0;

const CLOSING_FACTOR_MIN: f64 = 1.0;
const CLOSING_FACTOR_MAX: f64 = 2.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Remembers the last distance weight applied to the solver.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostSelector {
    last_cost: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CostSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `cost` as the cost to apply, returning true if it differs from
    /// the last applied cost (so the solver must be primed with it).
    pub fn apply(&mut self, cost: f64) -> bool {
        if self.last_cost == Some(cost) {
            return false;
        }
        self.last_cost = Some(cost);
        true
    }

    /// Forget the last applied cost, for use when the solver has been reset.
    pub fn invalidate(&mut self) {
        self.last_cost = None;
    }

    pub fn last_cost(&self) -> Option<f64> {
        self.last_cost
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Distance weight for a time-gap.
pub fn cost_for_tr(tr_s: f64) -> f64 {
    interp(tr_s, &COST_TR_BP, &COST_V)
}

/// Select the distance weight for this cycle.
///
/// The measured gap to `lead` overrides `tr_s` when they differ by at least
/// [`REAL_TR_THRESHOLD_S`]. The cost is divided by the closing factor only
/// while the lead is approaching, so it never leaves the lookup's range.
pub fn select_cost(tr_s: f64, v_ego: f64, lead: Option<&LeadGeometry>) -> f64 {
    let mut tr = tr_s;

    let lead = match lead {
        Some(l) => l,
        None => return round_to(cost_for_tr(tr), 3),
    };

    if v_ego != 0.0 {
        let real_tr = lead.x_lead / v_ego;
        if (real_tr - tr).abs() >= REAL_TR_THRESHOLD_S {
            tr = real_tr;
        }
    }

    let approaching = lead.v_lead < v_ego;

    if approaching && v_ego > CLOSING_FACTOR_MIN_SPEED_MS {
        let factor = clamp(
            &((lead.v_lead - v_ego) / 2.0 + 1.5),
            &CLOSING_FACTOR_MIN,
            &CLOSING_FACTOR_MAX,
        );
        round_to(cost_for_tr(tr) / factor, 3)
    }
    else {
        round_to(cost_for_tr(tr), 3)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cost_monotonic() {
        assert_eq!(cost_for_tr(0.9), 1.0);
        assert_eq!(cost_for_tr(1.8), 0.1);
        assert_eq!(cost_for_tr(2.7), 0.05);

        let mut tr = 0.9;
        let mut prev = cost_for_tr(tr);
        while tr < 2.7 {
            tr += 0.05;
            let c = cost_for_tr(tr);
            assert!(c < prev);
            prev = c;
        }
    }

    #[test]
    fn test_no_lead() {
        assert_eq!(select_cost(1.8, 20.0, None), 0.1);
        assert_eq!(select_cost(1.35, 20.0, None), 0.55);
    }

    #[test]
    fn test_real_gap_overrides() {
        // At crawl speed there is no closing factor, so the raw lookup shows
        // which gap was used
        let lead = LeadGeometry {
            x_lead: 4.0,
            v_lead: 2.0,
            a_lead: 0.0,
        };

        // Measured gap 2.0 s is within the threshold of 1.8 s
        assert_eq!(select_cost(1.8, 2.0, Some(&lead)), 0.1);

        // Measured gap 0.9 s is far from 1.8 s
        let close = LeadGeometry { x_lead: 1.8, ..lead };
        assert_eq!(select_cost(1.8, 2.0, Some(&close)), 1.0);
    }

    #[test]
    fn test_lead_at_speed_raises_cost() {
        let lead = LeadGeometry {
            x_lead: 30.0,
            v_lead: 18.0,
            a_lead: 0.0,
        };
        // Measured gap 1.5 s replaces 1.9 s, closing at 2 m/s keeps the
        // factor at its floor
        assert_eq!(select_cost(1.9, 20.0, Some(&lead)), 0.4);

        // Closing at 0.5 m/s divides by 1.25
        let slow = LeadGeometry { v_lead: 19.5, ..lead };
        assert_eq!(select_cost(1.5, 20.0, Some(&slow)), 0.32);
    }

    #[test]
    fn test_lead_pulling_away_uses_lookup() {
        let lead = LeadGeometry {
            x_lead: 36.0,
            v_lead: 25.0,
            a_lead: 0.0,
        };

        // Measured gap 1.8 s, no closing factor for a lead pulling away
        assert_eq!(select_cost(1.8, 20.0, Some(&lead)), cost_for_tr(1.8));
        assert_eq!(select_cost(1.8, 20.0, Some(&lead)), 0.1);

        let close = LeadGeometry { x_lead: 18.0, ..lead };
        let cost = select_cost(1.8, 20.0, Some(&close));
        assert_eq!(cost, 1.0);
        assert!(cost <= cost_for_tr(0.9));
    }

    #[test]
    fn test_selector() {
        let mut s = CostSelector::new();
        assert!(s.apply(0.1));
        assert!(!s.apply(0.1));
        assert!(s.apply(1.1));
        assert_eq!(s.last_cost(), Some(1.1));

        s.invalidate();
        assert!(s.apply(1.1));
    }
}
