use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

/// Pivot and loop-factor epsilon.
pub const LOOP_EPSILON: Real = 1e-12;

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Loop factor of a reference product in a closed-loop system.
///
/// `t = a_ii * s_i` is the gross output of the reference process. When it
/// matches the demand within [`LOOP_EPSILON`] (or is itself zero) the factor
/// is 1; otherwise it is `demand / t`.
pub fn loop_factor(a_ii: Real, s_i: Real, demand: Real) -> Real {
    let t = a_ii * s_i;
    if (t - demand).abs() < LOOP_EPSILON || t.abs() < LOOP_EPSILON {
        return 1.0;
    }
    demand / t
}

/// Real demands: total requirements scaled by the loop factor.
pub fn real_demands(total_requirements: &[Real], loop_factor: Real) -> Vec<Real> {
    if loop_factor == 1.0 {
        return total_requirements.to_vec();
    }
    total_requirements.iter().map(|r| r * loop_factor).collect()
}

/// Dot product of two equally long slices.
pub fn dot(a: &[Real], b: &[Real]) -> Real {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
