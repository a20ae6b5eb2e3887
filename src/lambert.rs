use anyhow::{Result, bail};
use std::f64::consts::E;

/// Location of the branch point of the Lambert W function, `-1/e`.
pub const BRANCH_POINT: f64 = -1.0 / E;

const MAX_N_ITER: usize = 64;

/// Evaluate the principal real branch `W0(z)` of the Lambert W function.
///
/// `W0` is the solution `w >= -1` of `w * exp(w) = z`, which is real only for `z >= -1/e`.
/// Arguments below the branch point by no more than a few ulps of rounding are treated
/// as the branch point itself.
///
/// # Errors
/// Returns an error if `z` is not finite or lies below `-1/e`.
pub fn lambert_w0(z: f64) -> Result<f64> {
    if !z.is_finite() {
        bail!("Lambert W argument must be finite, but is {z}");
    }

    let gap = z - BRANCH_POINT;
    if gap < 0.0 {
        if gap >= -4.0 * f64::EPSILON * BRANCH_POINT.abs() {
            return Ok(-1.0);
        }
        bail!("Lambert W argument must be at least {BRANCH_POINT}, but is {z}");
    }
    if z == 0.0 {
        return Ok(0.0);
    }

    // Halley iteration on f(w) = w * exp(w) - z.
    let mut w = initial_guess(z, gap);
    for _ in 0..MAX_N_ITER {
        let exp_w = w.exp();
        let f = w * exp_w - z;
        let w_p1 = w + 1.0;
        if w_p1 == 0.0 {
            break;
        }
        let step = f / (exp_w * w_p1 - (w + 2.0) * f / (2.0 * w_p1));
        w -= step;
        if step.abs() <= 4.0 * f64::EPSILON * (1.0 + w.abs()) {
            break;
        }
    }

    Ok(w)
}

fn initial_guess(z: f64, gap: f64) -> f64 {
    if z < -0.25 {
        // Series around the branch point in p = sqrt(2 * (e * z + 1)).
        let p = (2.0 * E * gap).sqrt();
        -1.0 + p - p * p / 3.0 + 11.0 / 72.0 * p * p * p
    } else if z < 3.0 {
        z.ln_1p()
    } else {
        let l_1 = z.ln();
        let l_2 = l_1.ln();
        l_1 - l_2 + l_2 / l_1
    }
}
