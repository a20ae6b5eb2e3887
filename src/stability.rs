//! Optimal and evolutionarily stable numbers of locations.

use crate::model::Model;
use anyhow::{Context, Result, bail};
use serde::Serialize;

/// Relative density increase of a deviating individual in [`is_ess`].
const DEVIATION: f64 = 1.0001;

/// Socially optimal number of locations and its per-capita cost.
#[derive(Debug, PartialEq, Clone, Copy, Serialize)]
pub struct Optimum {
    pub n_loc: usize,
    pub cost: f64,
}

/// Find the number of locations that minimizes the uniform cost.
///
/// Walks up from one location, keeping the best count seen, and stops at the first
/// count above `2 * r_0` that does not improve on it. This assumes the cost has no
/// further minima beyond that point, which fails when the location cost is very
/// small.
///
/// # Errors
/// Returns an error if the walk passes `max_n_loc` locations without stopping.
pub fn find_optimal(mdl: &Model, max_n_loc: usize) -> Result<Optimum> {
    let r_0 = mdl.params().r_0;
    let mut opt = Optimum {
        n_loc: 1,
        cost: uniform_cost(mdl, 1)?,
    };

    for n_loc in 2..=max_n_loc {
        let cost = uniform_cost(mdl, n_loc)?;
        if cost < opt.cost {
            opt = Optimum { n_loc, cost };
        } else if n_loc as f64 > 2.0 * r_0 {
            return Ok(opt);
        }
    }

    bail!("optimum search did not converge within {max_n_loc} locations");
}

/// Whether spreading the population uniformly over `n_loc` locations is an ESS.
///
/// True for a single location, and otherwise when an individual moving to a slightly
/// denser location would not lower its cost.
pub fn is_ess(mdl: &Model, n_loc: usize) -> Result<bool> {
    check_n_loc(n_loc)?;
    if n_loc == 1 {
        return Ok(true);
    }
    let xi = 1.0 / n_loc as f64;
    Ok(mdl.cost(xi)? <= mdl.cost(xi * DEVIATION)?)
}

/// Whether spreading the population uniformly over `n_loc` locations is an altruistic ESS.
///
/// Requires that nobody wants to leave the group, `R'(xi) <= eta + C`, and that the
/// final size is locally convex, `R''(xi) > 0`.
pub fn is_alt_ess(mdl: &Model, n_loc: usize) -> Result<bool> {
    check_n_loc(n_loc)?;
    let xi = 1.0 / n_loc as f64;
    let params = mdl.params();
    let happy_together = mdl.r_inf_deriv(xi)? <= params.eta + params.cost_loc;
    if !happy_together {
        return Ok(false);
    }
    Ok(mdl.r_inf_second_deriv(xi)? > 0.0)
}

/// Price of stability: cost of the best altruistic ESS relative to the optimum.
///
/// Equals one when the optimum is itself an altruistic ESS. Otherwise walks up from
/// one location and stops at the first count above `r_0` whose cost exceeds the best
/// altruistic ESS cost found so far.
///
/// # Errors
/// Returns an error if either walk passes `max_n_loc` locations without stopping.
pub fn alt_pos(mdl: &Model, max_n_loc: usize) -> Result<f64> {
    let opt = find_optimal(mdl, max_n_loc).context("failed to find optimum")?;
    if is_alt_ess(mdl, opt.n_loc)? {
        return Ok(1.0);
    }

    let r_0 = mdl.params().r_0;
    let mut best_cost = f64::INFINITY;
    for n_loc in 1..=max_n_loc {
        let cost = uniform_cost(mdl, n_loc)?;
        if is_alt_ess(mdl, n_loc)? {
            best_cost = best_cost.min(cost);
        }
        if n_loc as f64 > r_0 && cost > best_cost {
            return Ok(best_cost / opt.cost);
        }
    }

    bail!("stable allocation search did not converge within {max_n_loc} locations");
}

fn uniform_cost(mdl: &Model, n_loc: usize) -> Result<f64> {
    mdl.uniform_cost(n_loc as f64)
        .with_context(|| format!("failed to compute cost of {n_loc} locations"))
}

fn check_n_loc(n_loc: usize) -> Result<()> {
    if n_loc == 0 {
        bail!("number of locations must be at least 1");
    }
    Ok(())
}
