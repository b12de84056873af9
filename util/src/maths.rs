//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Piecewise linear interpolation of `value` over the breakpoints `bp` and
/// values `v`.
///
/// Values outside the breakpoint range are held at the first or last value,
/// there is no extrapolation. `bp` must be sorted in ascending order and the
/// same length as `v`.
///
/// # Panics
/// - If `bp` is empty or the lengths of `bp` and `v` differ.
pub fn interp<T>(value: T, bp: &[T], v: &[T]) -> T
where
    T: Float
{
    assert!(
        !bp.is_empty() && bp.len() == v.len(),
        "Interpolation table must be non-empty with matching lengths"
    );

    if value.is_nan() {
        return value;
    }

    let last = bp.len() - 1;

    if value <= bp[0] {
        return v[0];
    }
    if value >= bp[last] {
        return v[last];
    }

    // Find the segment containing the value. The checks above guarantee one
    // exists.
    let mut i = 1;
    while bp[i] < value {
        i += 1;
    }

    if bp[i] == value {
        return v[i];
    }

    lin_map((bp[i - 1], bp[i]), (v[i - 1], v[i]), value)
}

/// Clamp a value between a minimum and maximum.
///
/// Unlike `f64::clamp` this does not panic if `min > max`, the maximum wins.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float
{
    let mut ret = *value;

    if ret < *min {
        ret = *min
    }
    if ret > *max {
        ret = *max
    }

    ret
}

/// Round a value to the given number of decimal places.
pub fn round_to<T>(value: T, decimals: i32) -> T
where
    T: Float
{
    match T::from(10) {
        Some(ten) => {
            let scale = ten.powi(decimals);
            (value * scale).round() / scale
        }
        None => value,
    }
}
