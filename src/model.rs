//! Epidemic final size, infection probability and location costs.

use crate::config::check_num;
use crate::lambert::lambert_w0;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::ops::Bound::Excluded;

/// Epidemic and cost parameters of the model.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Params {
    /// Basic reproduction number of the epidemic.
    pub r_0: f64,
    /// Immunity discount.
    pub eta: f64,
    /// Fixed cost of maintaining one location.
    pub cost_loc: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            r_0: 2.0,
            eta: 0.001,
            cost_loc: 0.01,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        check_num(self.r_0, (Excluded(0.0), Excluded(f64::INFINITY)))
            .context("invalid basic reproduction number")?;
        check_num(self.eta, 0.0..1.0).context("invalid immunity discount")?;
        check_num(self.cost_loc, (Excluded(0.0), Excluded(f64::INFINITY)))
            .context("invalid location cost")?;
        Ok(())
    }
}

/// Epidemic-spread cost model.
///
/// A population of size one is spread over locations; `xi` is the fraction of the
/// population resident at one location. Every method is a pure function of its
/// arguments and of the validated [`Params`] the model was built with.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Model {
    params: Params,
}

impl Model {
    /// Create a new `Model` after validating its parameters.
    pub fn new(params: Params) -> Result<Self> {
        params.validate().context("failed to validate params")?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Final size of the epidemic at a location of density `xi`.
    ///
    /// Solves the final-size relation `xi - R = (1 - eta) * xi * exp(-r_0 * R)` in closed
    /// form, `R = xi + W0(-r_0 * (1 - eta) * xi * exp(-r_0 * xi)) / r_0`. The Lambert W
    /// argument is `-(1 - eta) * u * exp(-u)` with `u = r_0 * xi`, which never drops below
    /// `-1/e`, so the principal real branch always applies to valid parameters.
    /// The result lies in `[0, xi]`.
    pub fn r_inf(&self, xi: f64) -> Result<f64> {
        check_xi(xi)?;
        let r_0 = self.params.r_0;
        let z = -r_0 * self.susc() * xi * (-r_0 * xi).exp();
        let w = lambert_w0(z).context("failed to evaluate Lambert W")?;
        // Clamp rounding noise at the ends of the interval.
        Ok((xi + w / r_0).clamp(0.0, xi))
    }

    /// Probability that an individual at a location of density `xi` is infected.
    pub fn prob(&self, xi: f64) -> Result<f64> {
        Ok(self.r_inf(xi)? / xi)
    }

    /// Twice the probability of escaping infection.
    pub fn prob_down(&self, xi: f64) -> Result<f64> {
        Ok(2.0 * (1.0 - self.prob(xi)?))
    }

    /// First derivative of [`Model::r_inf`] by implicit differentiation.
    ///
    /// # Errors
    /// Returns an error at the epidemic threshold `r_0 * xi = 1` when `eta = 0`, where
    /// the final size has a kink.
    pub fn r_inf_deriv(&self, xi: f64) -> Result<f64> {
        let r_inf = self.r_inf(xi)?;
        let exp_term = self.susc() * (-self.params.r_0 * r_inf).exp();
        let num = 1.0 - exp_term;
        let den = 1.0 - xi * self.params.r_0 * exp_term;
        check_deriv(num / den, xi)
    }

    /// Second derivative of [`Model::r_inf`] by implicit differentiation.
    ///
    /// Fails where [`Model::r_inf_deriv`] fails.
    pub fn r_inf_second_deriv(&self, xi: f64) -> Result<f64> {
        let r_0 = self.params.r_0;
        let r_inf = self.r_inf(xi)?;
        let r_inf_deriv = self.r_inf_deriv(xi)?;
        let exp_term = self.susc() * (-r_0 * r_inf).exp();
        let den = 1.0 - xi * r_0 * exp_term;
        check_deriv(r_0 * exp_term * r_inf_deriv * (2.0 - xi * r_0 * r_inf_deriv) / den, xi)
    }

    /// `R'(xi) * exp(r_0 * R(xi))`.
    pub fn r_inf_deriv_exp(&self, xi: f64) -> Result<f64> {
        let r_inf = self.r_inf(xi)?;
        let r_inf_deriv = self.r_inf_deriv(xi)?;
        Ok(r_inf_deriv * (self.params.r_0 * r_inf).exp())
    }

    /// Factor carrying the sign of [`Model::prob_second_deriv`].
    pub fn prob_curv_factor(&self, xi: f64) -> Result<f64> {
        Ok(2.0 * self.susc() - self.r_inf_deriv_exp(xi)?)
    }

    /// First derivative of [`Model::prob`] by implicit differentiation.
    pub fn prob_deriv(&self, xi: f64) -> Result<f64> {
        let num = self.susc() * self.params.r_0 * self.prob(xi)?;
        check_deriv(num / self.prob_den(xi)?, xi)
    }

    /// Second derivative of [`Model::prob`] by implicit differentiation.
    pub fn prob_second_deriv(&self, xi: f64) -> Result<f64> {
        let r_0 = self.params.r_0;
        let num = self.susc() * r_0 * r_0 * self.prob(xi)?;
        let den = self.prob_den(xi)?.powi(2);
        check_deriv(num / den * self.prob_curv_factor(xi)?, xi)
    }

    /// Second derivative of [`Model::prob`] before substituting the first derivative.
    ///
    /// Agrees with [`Model::prob_second_deriv`] up to rounding.
    pub fn prob_second_deriv_expanded(&self, xi: f64) -> Result<f64> {
        let r_0 = self.params.r_0;
        let susc = self.susc();
        let exp = (r_0 * self.r_inf(xi)?).exp();
        let den = self.prob_den(xi)?;

        let term_1 = susc * r_0 * self.prob_deriv(xi)? / den;
        let term_2 = susc * r_0 * self.prob(xi)? / den.powi(2);
        let parens = r_0 * self.r_inf_deriv(xi)? * exp - susc * r_0;

        check_deriv(term_1 - term_2 * parens, xi)
    }

    /// Maintenance cost per individual of a location of density `xi`.
    pub fn maint_cost(&self, xi: f64) -> Result<f64> {
        check_xi(xi)?;
        Ok(self.params.cost_loc / xi)
    }

    /// Cost of an individual at a location of density `xi`.
    pub fn cost(&self, xi: f64) -> Result<f64> {
        Ok(self.prob(xi)? + self.maint_cost(xi)?)
    }

    /// [`Model::cost`] of every density in `xi_vec`.
    pub fn cost_vec(&self, xi_vec: &[f64]) -> Result<Vec<f64>> {
        xi_vec.iter().map(|&xi| self.cost(xi)).collect()
    }

    /// First derivative of [`Model::cost`].
    pub fn cost_deriv(&self, xi: f64) -> Result<f64> {
        Ok(self.prob_deriv(xi)? - self.params.cost_loc / (xi * xi))
    }

    /// Per-capita cost of spreading the population uniformly over `n_loc` locations.
    ///
    /// `n_loc` may be fractional as a continuous relaxation, but must be at least one.
    pub fn uniform_cost(&self, n_loc: f64) -> Result<f64> {
        if !(n_loc.is_finite() && n_loc >= 1.0) {
            bail!("number of locations must be at least 1, but is {n_loc}");
        }
        self.cost(1.0 / n_loc)
    }

    /// Aggregate cost of the locations with densities `xi_vec`.
    ///
    /// Sums the maintenance cost of every location and the number of infections at every
    /// location. Unlike [`Model::uniform_cost`] this is a total, not a per-capita, cost.
    pub fn total_cost(&self, xi_vec: &[f64]) -> Result<f64> {
        let mut total = self.params.cost_loc * xi_vec.len() as f64;
        for (i_loc, &xi) in xi_vec.iter().enumerate() {
            total += self
                .r_inf(xi)
                .with_context(|| format!("invalid location {i_loc}"))?;
        }
        Ok(total)
    }

    fn susc(&self) -> f64 {
        1.0 - self.params.eta
    }

    fn prob_den(&self, xi: f64) -> Result<f64> {
        let r_0 = self.params.r_0;
        let den = (r_0 * self.r_inf(xi)?).exp() - self.susc() * r_0 * xi;
        if den == 0.0 {
            bail!("infection probability is not differentiable at density {xi}");
        }
        Ok(den)
    }
}

// Implicit derivatives blow up where `r_0 * xi = 1` without immunity discount.
fn check_deriv(deriv: f64, xi: f64) -> Result<f64> {
    if !deriv.is_finite() {
        bail!("derivative at density {xi} is not finite: {deriv}");
    }
    Ok(deriv)
}

/// Check that `xi` is a valid location density.
pub fn check_xi(xi: f64) -> Result<()> {
    if !(xi > 0.0 && xi <= 1.0) {
        bail!("density must be in (0, 1], but is {xi}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn model(r_0: f64, eta: f64, cost_loc: f64) -> Model {
        Model::new(Params { r_0, eta, cost_loc }).unwrap()
    }

    fn models() -> Vec<Model> {
        vec![
            model(2.0, 0.001, 0.01),
            model(2.0, 0.05, 0.01),
            model(5.0, 0.001, 0.2),
            model(5.0, 0.05, 0.2),
            model(0.5, 0.0, 0.1),
        ]
    }

    #[test]
    fn invalid_params() {
        assert!(Model::new(Params { r_0: 0.0, ..Params::default() }).is_err());
        assert!(Model::new(Params { eta: 1.0, ..Params::default() }).is_err());
        assert!(Model::new(Params { eta: -0.1, ..Params::default() }).is_err());
        assert!(Model::new(Params { cost_loc: 0.0, ..Params::default() }).is_err());
        assert!(Model::new(Params { r_0: f64::NAN, ..Params::default() }).is_err());
    }

    #[test]
    fn r_inf_bounds() {
        for mdl in models() {
            for i in 1..=1000 {
                let xi = i as f64 / 1000.0;
                let r_inf = mdl.r_inf(xi).unwrap();
                assert!((0.0..=xi).contains(&r_inf), "r_inf({xi}) = {r_inf}");
            }
        }
    }

    #[test]
    fn r_inf_solves_final_size_relation() {
        for mdl in models() {
            let Params { r_0, eta, .. } = *mdl.params();
            for i in 1..=100 {
                let xi = i as f64 / 100.0;
                let r_inf = mdl.r_inf(xi).unwrap();
                let rhs = (1.0 - eta) * xi * (-r_0 * r_inf).exp();
                assert_abs_diff_eq!(xi - r_inf, rhs, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn r_inf_vanishes_at_low_density() {
        let mdl = Model::new(Params::default()).unwrap();
        let r_inf = mdl.r_inf(1e-12).unwrap();
        assert!(r_inf >= 0.0);
        assert!(r_inf < 1e-14);
        // Below the epidemic threshold only the immune share escapes the formula.
        assert_relative_eq!(mdl.prob(1e-9).unwrap(), 0.001, max_relative = 1e-3);
    }

    #[test]
    fn epidemic_threshold_without_discount() {
        let mdl = model(2.0, 0.0, 0.01);
        for xi in [0.5, 0.501, 0.51, 0.6] {
            let r_inf = mdl.r_inf(xi).unwrap();
            assert!((0.0..=xi).contains(&r_inf), "r_inf({xi}) = {r_inf}");
            let rhs = xi * (-2.0 * r_inf).exp();
            assert_abs_diff_eq!(xi - r_inf, rhs, epsilon = 1e-12);
        }
        assert_eq!(mdl.r_inf(0.5).unwrap(), 0.0);
        assert!(mdl.r_inf(0.6).unwrap() > 0.1);

        assert!(mdl.r_inf_deriv(0.5).is_err());
        assert!(mdl.r_inf_second_deriv(0.5).is_err());
        assert!(mdl.r_inf_deriv_exp(0.5).is_err());
        assert!(mdl.prob_curv_factor(0.5).is_err());
        assert!(mdl.prob_deriv(0.5).is_err());
        assert!(mdl.prob_second_deriv(0.5).is_err());
        assert!(mdl.prob_second_deriv_expanded(0.5).is_err());
        assert!(mdl.cost_deriv(0.5).is_err());

        for xi in [0.4, 0.49, 0.51, 0.6] {
            let derivs = [
                mdl.r_inf_deriv(xi),
                mdl.r_inf_second_deriv(xi),
                mdl.prob_deriv(xi),
                mdl.prob_second_deriv(xi),
                mdl.cost_deriv(xi),
            ];
            for deriv in derivs {
                let deriv = deriv.unwrap();
                assert!(deriv.is_finite(), "xi = {xi}: {deriv}");
            }
        }
    }

    #[test]
    fn rejects_invalid_density() {
        let mdl = Model::new(Params::default()).unwrap();
        assert!(mdl.r_inf(0.0).is_err());
        assert!(mdl.r_inf(-0.1).is_err());
        assert!(mdl.r_inf(1.5).is_err());
        assert!(mdl.r_inf(f64::NAN).is_err());
        assert!(mdl.cost(0.0).is_err());
        assert!(mdl.maint_cost(0.0).is_err());
        assert!(mdl.uniform_cost(0.0).is_err());
        assert!(mdl.uniform_cost(0.5).is_err());
        assert!(mdl.total_cost(&[0.5, 0.0]).is_err());
    }

    #[test]
    fn expanded_second_deriv_agrees() {
        for mdl in models() {
            for i in 1..100 {
                let xi = i as f64 / 100.0;
                let a = mdl.prob_second_deriv(xi).unwrap();
                let b = mdl.prob_second_deriv_expanded(xi).unwrap();
                assert_relative_eq!(a, b, epsilon = 1e-9, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn curvature_factor_gives_sign() {
        for mdl in models() {
            for i in 1..100 {
                let xi = i as f64 / 100.0;
                let curv = mdl.prob_second_deriv(xi).unwrap();
                let factor = mdl.prob_curv_factor(xi).unwrap();
                if curv.abs() > 1e-9 {
                    assert_eq!(curv > 0.0, factor > 0.0);
                }
            }
        }
    }

    #[test]
    fn costs() {
        let mdl = model(2.0, 0.001, 0.01);
        let xi = 0.25;
        let cost = mdl.cost(xi).unwrap();
        assert_abs_diff_eq!(cost, mdl.prob(xi).unwrap() + 0.04, epsilon = 1e-15);
        assert_eq!(mdl.uniform_cost(4.0).unwrap(), cost);
        assert_eq!(mdl.cost_vec(&[0.5, xi]).unwrap()[1], cost);
        for n_loc in 1..=1000 {
            let cost = mdl.uniform_cost(n_loc as f64).unwrap();
            assert!(cost.is_finite() && cost > 0.0);
        }

        let total = mdl.total_cost(&[0.5, 0.25, 0.25]).unwrap();
        let r_inf_sum = mdl.r_inf(0.5).unwrap() + 2.0 * mdl.r_inf(0.25).unwrap();
        assert_abs_diff_eq!(total, 0.03 + r_inf_sum, epsilon = 1e-12);
        assert_eq!(mdl.total_cost(&[]).unwrap(), 0.0);
    }

    #[test]
    fn prob_down() {
        let mdl = Model::new(Params::default()).unwrap();
        let prob = mdl.prob(0.7).unwrap();
        assert_relative_eq!(mdl.prob_down(0.7).unwrap(), 2.0 * (1.0 - prob));
    }

    #[test]
    fn pure_functions() {
        let mdl = model(5.0, 0.05, 0.2);
        for xi in [0.01, 0.3, 1.0] {
            assert_eq!(mdl.r_inf(xi).unwrap(), mdl.r_inf(xi).unwrap());
            assert_eq!(
                mdl.prob_second_deriv(xi).unwrap(),
                mdl.prob_second_deriv(xi).unwrap()
            );
        }
    }
}
