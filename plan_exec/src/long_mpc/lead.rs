//! Lead geometry for the MPC, from a radar track or a phantom command

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{car::PhantomCmd, radar::LeadTrack};
use util::maths::interp;

use super::LeadGeometry;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Lead speeds below this are treated as stopped.
///
/// Units: meters/second
pub const LEAD_STOPPED_SPEED_MS: f64 = 0.1;

/// Distance of the fake lead used to keep the solver running with no lead.
///
/// Units: meters
pub const NO_LEAD_DISTANCE_M: f64 = 50.0;

/// Speed of the fake lead over the ego speed.
///
/// Units: meters/second
pub const NO_LEAD_SPEED_OFFSET_MS: f64 = 10.0;

/// Furthest a phantom lead is placed (30 ft).
///
/// Units: meters
pub const PHANTOM_MAX_GAP_M: f64 = 9.144;

/// Lost connection stop, from standstill to 32 mph.
const LOST_SPEED_BP: [f64; 2] = [0.0, 14.3053];
/// Lost connection gap, 2 ft to 20 ft.
const LOST_GAP_M: [f64; 2] = [0.6096, 6.096];
const LOST_ACCEL_MSS: [f64; 2] = [0.0, -2.2352];
/// Lost connection lead speed below the ego (10 mph).
const LOST_SPEED_DROP_MS: f64 = 4.4704;

const SMOOTH_STOP_GAP_M: f64 = 3.75;
/// Smooth stop lead speed below the ego (3 mph).
const SMOOTH_STOP_SPEED_DROP_MS: f64 = 1.34112;
const SMOOTH_STOP_ACCEL_MSS: f64 = -0.44704;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Geometry of a real lead, with a lead that is stopped (or will be within
/// two seconds) forced to zero speed and acceleration.
pub fn sanitise_lead(lead: &LeadTrack) -> LeadGeometry {
    let mut v_lead = lead.v_lead.max(0.0);
    let mut a_lead = lead.a_lead_k;

    if v_lead < LEAD_STOPPED_SPEED_MS || -a_lead / 2.0 > v_lead {
        v_lead = 0.0;
        a_lead = 0.0;
    }

    LeadGeometry {
        x_lead: lead.d_rel,
        v_lead,
        a_lead,
    }
}

/// The fake lead far ahead of and faster than the ego.
pub fn no_lead(v_ego: f64) -> LeadGeometry {
    LeadGeometry {
        x_lead: NO_LEAD_DISTANCE_M,
        v_lead: v_ego + NO_LEAD_SPEED_OFFSET_MS,
        a_lead: 0.0,
    }
}

/// Geometry of the lead commanded by an active phantom.
///
/// A real `lead` is never ignored while the phantom moves: the phantom is
/// placed no further than it and no faster than it.
pub fn phantom_lead(cmd: &PhantomCmd, lead: Option<&LeadTrack>, v_ego: f64) -> LeadGeometry {
    if cmd.speed_ms != 0.0 {
        let (x_lead, v_lead) = match lead.filter(|l| l.status) {
            Some(l) => {
                let real = sanitise_lead(l);
                (
                    PHANTOM_MAX_GAP_M.min(real.x_lead),
                    cmd.speed_ms.min(real.v_lead),
                )
            }
            None => (PHANTOM_MAX_GAP_M, cmd.speed_ms),
        };

        LeadGeometry {
            x_lead,
            v_lead,
            a_lead: 0.0,
        }
    }
    else if cmd.lost_connection {
        LeadGeometry {
            x_lead: interp(v_ego, &LOST_SPEED_BP, &LOST_GAP_M),
            v_lead: (v_ego - LOST_SPEED_DROP_MS).max(0.0),
            a_lead: interp(v_ego, &LOST_SPEED_BP, &LOST_ACCEL_MSS),
        }
    }
    else {
        LeadGeometry {
            x_lead: SMOOTH_STOP_GAP_M,
            v_lead: (v_ego - SMOOTH_STOP_SPEED_DROP_MS).max(0.0),
            a_lead: SMOOTH_STOP_ACCEL_MSS,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn track(d_rel: f64, v_lead: f64, a_lead_k: f64) -> LeadTrack {
        LeadTrack {
            status: true,
            d_rel,
            v_lead,
            v_lead_k: v_lead,
            a_lead_k,
            a_lead_tau: 1.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_sanitise() {
        assert_eq!(
            sanitise_lead(&track(30.0, 15.0, -1.0)),
            LeadGeometry {
                x_lead: 30.0,
                v_lead: 15.0,
                a_lead: -1.0
            }
        );

        // Stopping within two seconds
        let g = sanitise_lead(&track(30.0, 1.0, -3.0));
        assert_eq!((g.v_lead, g.a_lead), (0.0, 0.0));

        // Negative speeds are stopped
        let g = sanitise_lead(&track(30.0, -1.0, 0.5));
        assert_eq!((g.v_lead, g.a_lead), (0.0, 0.0));
    }

    #[test]
    fn test_phantom_moving() {
        let cmd = PhantomCmd {
            status: true,
            speed_ms: 5.0,
            lost_connection: false,
        };

        assert_eq!(
            phantom_lead(&cmd, None, 10.0),
            LeadGeometry {
                x_lead: PHANTOM_MAX_GAP_M,
                v_lead: 5.0,
                a_lead: 0.0
            }
        );

        // A closer, slower real lead wins
        let g = phantom_lead(&cmd, Some(&track(6.0, 3.0, 0.0)), 10.0);
        assert_eq!((g.x_lead, g.v_lead), (6.0, 3.0));
    }

    #[test]
    fn test_phantom_stops() {
        let smooth = PhantomCmd {
            status: true,
            speed_ms: 0.0,
            lost_connection: false,
        };
        let g = phantom_lead(&smooth, None, 1.0);
        assert_eq!(g.x_lead, SMOOTH_STOP_GAP_M);
        assert_eq!(g.v_lead, 0.0);
        assert_eq!(g.a_lead, SMOOTH_STOP_ACCEL_MSS);

        let lost = PhantomCmd {
            lost_connection: true,
            ..smooth
        };
        let g = phantom_lead(&lost, None, 14.3053);
        assert_eq!(g.x_lead, 6.096);
        assert_eq!(g.a_lead, -2.2352);
        assert!((g.v_lead - (14.3053 - 4.4704)).abs() < 1e-12);
    }
}
