//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, Signed};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Limit a value to the range `[min, max]`.
///
/// Unlike `Ord::clamp` this works for floats and does not panic if
/// `min > max`, in which case `max` wins.
pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: PartialOrd + Copy
{
    let mut ret = value;

    if ret < min {
        ret = min
    }
    if ret > max {
        ret = max
    }

    ret
}

/// Limit a value to the symmetric range `[-limit, limit]`.
///
/// The sign of `limit` is ignored.
pub fn clamp_sym<T>(value: T, limit: T) -> T
where
    T: Signed + PartialOrd + Copy
{
    let limit = limit.abs();
    clamp(value, -limit, limit)
}

/// One step of an exponential moving average.
///
/// `factor` is the weight given to the new sample, so `0` holds the previous
/// value and `1` follows the input exactly. The first sample (`prev` is
/// `None`) initialises the average.
pub fn ema<T>(prev: Option<T>, input: T, factor: T) -> T
where
    T: Float
{
    match prev {
        Some(p) => (T::one() - factor) * p + factor * input,
        None => input
    }
}
