//! # Speed smoother
//!
//! Moves a (speed, acceleration) state toward a target speed over one time
//! step, following a trapezoidal acceleration profile bounded in both
//! acceleration and jerk.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::{AccelLimits, JerkLimits};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Jerk multiplier applied when the acceleration points away from the target.
const REVERSAL_JERK_FACTOR: f64 = 3.0;

const EPS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Advance `(v, a)` toward `v_target` for `ts` seconds.
///
/// The profile ramps the acceleration at the jerk limits up to a peak (capped
/// at the acceleration limit) and back down to zero as the target is reached.
/// An acceleration already outside the limits is first brought back inside
/// them.
///
/// # Outputs
/// - The new speed and acceleration.
pub fn speed_smoother(
    v: f64,
    a: f64,
    v_target: f64,
    accel: &AccelLimits,
    jerk: &JerkLimits,
    ts: f64,
) -> (f64, f64) {
    let mut v = v;
    let mut a = a;
    let mut ts = ts;

    let mut a_max = accel.max;
    let a_min = accel.min;
    let mut j_max = jerk.max;
    let mut j_min = jerk.min;

    let mut dv = v_target - v;

    // Recover faster from an acceleration opposing the target
    if dv > 0.0 && a < 0.0 {
        j_max *= REVERSAL_JERK_FACTOR;
    }
    else if dv < 0.0 && a > 0.0 {
        j_min *= REVERSAL_JERK_FACTOR;
    }

    let t_delta = out_of_limits_time(a, a_max, a_min, j_max, j_min);

    // ---- RECOVER LIMITS ----

    if ts <= t_delta {
        if a < a_min {
            return (v + ts * a + 0.5 * ts * ts * j_max, a + ts * j_max);
        }
        if a > a_max {
            return (v + ts * a + 0.5 * ts * ts * j_min, a + ts * j_min);
        }
    }

    if a > a_max {
        let dv_limit = 0.5 * (a_max * a_max - a * a) / j_min;
        dv -= dv_limit;
        v += dv_limit;
        a += t_delta * j_min;
    }
    else if a < a_min {
        let dv_limit = 0.5 * (a_min * a_min - a * a) / j_max;
        dv -= dv_limit;
        v += dv_limit;
        a += t_delta * j_max;
    }

    ts -= t_delta;

    // ---- PROFILE ----

    // Change of speed if the acceleration went straight back to zero
    let j_lim = if a >= 0.0 { j_min } else { j_max };
    let dv_min_shift = -0.5 * a * a / j_lim;

    // Mirror decelerations into accelerations
    let flipped = dv < dv_min_shift;
    if flipped {
        dv = -dv;
        v = -v;
        a = -a;
        a_max = -a_min;
        let j_max_old = j_max;
        j_max = -j_min;
        j_min = -j_max_old;
    }

    let peak_sq = (0.5 * a * a / j_max + dv + EPS) / (0.5 / j_max - 0.5 / j_min);
    let mut a_peak = if peak_sq.is_nan() || peak_sq < 0.0 {
        0.0
    }
    else {
        peak_sq.sqrt()
    };

    let t1;
    let t2;
    let t3;

    if a_peak > a_max {
        a_peak = a_max;
        t1 = (a_peak - a) / j_max;

        if a_peak <= 0.0 {
            // No acceleration available toward the target
            t2 = t1 + ts + EPS;
            t3 = t2;
        }
        else {
            let v_change = dv - 0.5 * (a_peak * a_peak - a * a) / j_max
                + 0.5 * a_peak * a_peak / j_min;

            t2 = if v_change < a_peak * ts {
                t1 + v_change / a_peak
            }
            else {
                t1 + ts
            };
            t3 = t2 - a_peak / j_min;
        }
    }
    else {
        t1 = (a_peak - a) / j_max;
        t2 = t1;
        t3 = t2 - a_peak / j_min;
    }

    // ---- INTEGRATE ----

    let dt1 = ts.min(t1);
    let dt2 = (ts.min(t2) - t1).max(0.0);
    let dt3 = (ts.min(t3) - t2).max(0.0);

    if ts > t3 {
        v += dv;
        a = 0.0;
    }
    else {
        v += a * dt1 + 0.5 * dt1 * dt1 * j_max + a_peak * dt2 + a_peak * dt3
            + 0.5 * dt3 * dt3 * j_min;
        a += j_max * dt1 + dt3 * j_min;
    }

    if flipped {
        (-v, -a)
    }
    else {
        (v, a)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Time needed to bring an out of limits acceleration back inside them.
fn out_of_limits_time(a: f64, a_max: f64, a_min: f64, j_max: f64, j_min: f64) -> f64 {
    if a > a_max {
        (a_max - a) / j_min
    }
    else if a < a_min {
        (a_min - a) / j_max
    }
    else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const ACCEL: AccelLimits = AccelLimits { min: -1.0, max: 1.0 };
    const JERK: JerkLimits = JerkLimits { min: -1.0, max: 1.0 };

    #[test]
    fn test_at_target_holds() {
        let (v, a) = speed_smoother(20.0, 0.0, 20.0, &ACCEL, &JERK, 0.2);
        assert!((v - 20.0).abs() < 1e-6);
        assert!(a.abs() < 1e-6);
    }

    #[test]
    fn test_ramps_up_at_max_jerk() {
        let (v, a) = speed_smoother(10.0, 0.0, 20.0, &ACCEL, &JERK, 0.2);
        assert!((a - 0.2).abs() < 1e-9);
        assert!((v - (10.0 + 0.5 * 0.04)).abs() < 1e-9);
    }

    #[test]
    fn test_ramps_down_at_min_jerk() {
        let (v, a) = speed_smoother(20.0, 0.0, 10.0, &ACCEL, &JERK, 0.2);
        assert!((a + 0.2).abs() < 1e-9);
        assert!((v - (20.0 - 0.5 * 0.04)).abs() < 1e-9);
    }

    #[test]
    fn test_holds_accel_limit() {
        let (v, a) = speed_smoother(10.0, 1.0, 20.0, &ACCEL, &JERK, 0.2);
        assert!((a - 1.0).abs() < 1e-9);
        assert!((v - 10.2).abs() < 1e-9);
    }

    #[test]
    fn test_recovers_out_of_limit_accel() {
        // Braking harder than allowed, eased at the (tripled) max jerk
        let (v, a) = speed_smoother(20.0, -2.0, 30.0, &ACCEL, &JERK, 0.2);
        assert!((a - (-2.0 + 0.2 * 3.0)).abs() < 1e-9);
        assert!(v < 20.0);

        // Pinned limits pull the acceleration down
        let pinned = AccelLimits::pin(-1.0);
        let (_, a) = speed_smoother(20.0, 0.0, 30.0, &pinned, &JERK, 0.2);
        assert!((a + 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_reaches_target_without_overshoot() {
        let mut v = 0.0;
        let mut a = 0.0;
        for _ in 0..400 {
            let out = speed_smoother(v, a, 15.0, &ACCEL, &JERK, 0.05);
            v = out.0;
            a = out.1;
            assert!(v <= 15.0 + 1e-6);
            assert!(a <= ACCEL.max + 1e-9 && a >= ACCEL.min - 1e-9);
        }
        assert!((v - 15.0).abs() < 1e-3);
        assert!(a.abs() < 1e-3);
    }
}
