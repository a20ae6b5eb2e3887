use crate::config::{Config, Scenario};
use crate::model::{Model, Params};
use crate::stability::{Optimum, alt_pos, find_optimal, is_alt_ess, is_ess};
use anyhow::{Context, Result};
use rmp_serde::encode;
use serde::Serialize;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Stability analysis of a single scenario.
#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub label: String,
    pub params: Params,
    /// Socially optimal uniform allocation.
    pub optimum: Optimum,
    /// Aggregate cost of the optimal allocation.
    pub optimum_total_cost: f64,
    /// Cost of the best altruistic ESS relative to the optimum.
    pub price_of_stability: f64,
    /// Location counts whose uniform allocation is an ESS.
    pub ess_n_loc: Vec<usize>,
    /// Location counts whose uniform allocation is an altruistic ESS.
    pub alt_ess_n_loc: Vec<usize>,
}

impl ScenarioReport {
    /// Analyze a scenario, checking stability of `1..=n_loc_max` locations.
    pub fn new(scn: &Scenario, max_n_loc: usize, n_loc_max: usize) -> Result<Self> {
        let mdl = Model::new(scn.params).context("failed to construct model")?;

        let optimum = find_optimal(&mdl, max_n_loc).context("failed to find optimum")?;
        let optimum_total_cost = mdl
            .total_cost(&vec![1.0 / optimum.n_loc as f64; optimum.n_loc])
            .context("failed to compute total cost of optimum")?;
        let price_of_stability =
            alt_pos(&mdl, max_n_loc).context("failed to compute price of stability")?;

        let mut ess_n_loc = Vec::new();
        let mut alt_ess_n_loc = Vec::new();
        for n_loc in 1..=n_loc_max {
            if is_ess(&mdl, n_loc)? {
                ess_n_loc.push(n_loc);
            }
            if is_alt_ess(&mdl, n_loc)? {
                alt_ess_n_loc.push(n_loc);
            }
        }

        Ok(Self {
            label: scn.label.clone(),
            params: scn.params,
            optimum,
            optimum_total_cost,
            price_of_stability,
            ess_n_loc,
            alt_ess_n_loc,
        })
    }
}

pub struct Analyzer {
    cfg: Config,
    reports: Vec<ScenarioReport>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            reports: Vec::new(),
        }
    }

    /// Analyze every scenario of the configuration.
    pub fn analyze(&mut self) -> Result<()> {
        self.reports.clear();
        for scn in &self.cfg.scenarios {
            let report =
                ScenarioReport::new(scn, self.cfg.search.max_n_loc, self.cfg.plot.n_loc_max)
                    .with_context(|| format!("failed to analyze scenario {:?}", scn.label))?;
            log::info!(
                "{}: optimum {} locations (cost {:.6}), price of stability {:.6}",
                report.label,
                report.optimum.n_loc,
                report.optimum.cost,
                report.price_of_stability
            );
            self.reports.push(report);
        }
        Ok(())
    }

    pub fn reports(&self) -> &[ScenarioReport] {
        &self.reports
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write_named(&mut writer, &self.reports).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}
