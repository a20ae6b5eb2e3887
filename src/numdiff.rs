//! Finite-difference derivatives of the model.
//!
//! These serve as an independent oracle for the closed-form derivatives of
//! [`Model`]; they are not used by the searches.

use crate::config::check_num;
use crate::model::Model;
use anyhow::{Context, Result, bail};
use serde::Serialize;

/// Step of first-order differences.
pub const STEP: f64 = 1e-7;
/// Inner and outer steps of second-order differences.
pub const SECOND_STEPS: (f64, f64) = (1e-6, 1e-5);

/// Forward-difference approximation `(func(x + step) - func(x)) / step`.
pub fn forward_diff<F>(func: F, x: f64, step: f64) -> Result<f64>
where
    F: Fn(f64) -> Result<f64>,
{
    Ok((func(x + step)? - func(x)?) / step)
}

pub fn r_inf_deriv(mdl: &Model, xi: f64, step: f64) -> Result<f64> {
    forward_diff(|xi| mdl.r_inf(xi), xi, step)
}

pub fn r_inf_second_deriv(mdl: &Model, xi: f64, steps: (f64, f64)) -> Result<f64> {
    let (inner, outer) = steps;
    forward_diff(|xi| r_inf_deriv(mdl, xi, inner), xi, outer)
}

pub fn prob_deriv(mdl: &Model, xi: f64, step: f64) -> Result<f64> {
    forward_diff(|xi| mdl.prob(xi), xi, step)
}

pub fn prob_second_deriv(mdl: &Model, xi: f64, steps: (f64, f64)) -> Result<f64> {
    let (inner, outer) = steps;
    forward_diff(|xi| prob_deriv(mdl, xi, inner), xi, outer)
}

pub fn cost_deriv(mdl: &Model, xi: f64, step: f64) -> Result<f64> {
    forward_diff(|xi| mdl.cost(xi), xi, step)
}

/// Largest discrepancies between closed-form and finite-difference derivatives.
#[derive(Debug, Default, Serialize)]
pub struct CrossCheck {
    pub r_inf_deriv: f64,
    pub r_inf_second_deriv: f64,
    pub prob_deriv: f64,
    pub prob_second_deriv: f64,
    pub cost_deriv: f64,
}

impl CrossCheck {
    /// Largest discrepancy of any derivative.
    pub fn max(&self) -> f64 {
        [
            self.r_inf_deriv,
            self.r_inf_second_deriv,
            self.prob_deriv,
            self.prob_second_deriv,
            self.cost_deriv,
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }
}

/// Compare closed-form and finite-difference derivatives on the densities
/// `i / n_points` for `i` in `1..n_points`.
///
/// Discrepancies are measured relative to `max(1, |closed form|)`, so they are
/// absolute errors for small derivatives and relative errors for large ones.
/// Second derivatives use the steps `(inner, outer)` given by `second_steps`.
///
/// # Errors
/// Returns an error if `n_points < 2` or if any derivative fails or is not finite.
pub fn cross_check(mdl: &Model, n_points: usize, second_steps: (f64, f64)) -> Result<CrossCheck> {
    check_num(n_points, 2..).context("invalid number of points")?;
    let mut check = CrossCheck::default();

    for i in 1..n_points {
        let xi = i as f64 / n_points as f64;
        let ctx = || format!("failed to cross-check derivatives at density {xi}");

        let err = scaled_err(mdl.r_inf_deriv(xi), r_inf_deriv(mdl, xi, STEP)).with_context(ctx)?;
        check.r_inf_deriv = check.r_inf_deriv.max(err);

        let err = scaled_err(
            mdl.r_inf_second_deriv(xi),
            r_inf_second_deriv(mdl, xi, second_steps),
        )
        .with_context(ctx)?;
        check.r_inf_second_deriv = check.r_inf_second_deriv.max(err);

        let err = scaled_err(mdl.prob_deriv(xi), prob_deriv(mdl, xi, STEP)).with_context(ctx)?;
        check.prob_deriv = check.prob_deriv.max(err);

        let err = scaled_err(
            mdl.prob_second_deriv(xi),
            prob_second_deriv(mdl, xi, second_steps),
        )
        .with_context(ctx)?;
        check.prob_second_deriv = check.prob_second_deriv.max(err);

        let err = scaled_err(mdl.cost_deriv(xi), cost_deriv(mdl, xi, STEP)).with_context(ctx)?;
        check.cost_deriv = check.cost_deriv.max(err);

        log::debug!("cross-checked derivatives at density {xi}");
    }

    Ok(check)
}

fn scaled_err(exact: Result<f64>, approx: Result<f64>) -> Result<f64> {
    let (exact, approx) = (exact?, approx?);
    let err = (exact - approx).abs() / exact.abs().max(1.0);
    if !err.is_finite() {
        bail!("discrepancy between {exact} and {approx} is not finite");
    }
    Ok(err)
}
