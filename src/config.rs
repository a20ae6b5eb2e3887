use crate::model::Params;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::Bound::Excluded, ops::RangeBounds, path::Path};

/// Experiment configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Parameter sets to analyze and plot.
    pub scenarios: Vec<Scenario>,

    /// Location search parameters.
    pub search: SearchConfig,

    /// Plot parameters.
    pub plot: PlotConfig,
}

/// Labelled set of model parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Label used in logs, results and plot legends.
    pub label: String,

    #[serde(flatten)]
    pub params: Params,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Largest number of locations visited by the optimum and stability searches.
    pub max_n_loc: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Number of samples per density curve.
    pub n_points: usize,
    /// Smallest density drawn.
    pub xi_min: f64,
    /// Upper limit of the cost axis.
    pub cost_max: f64,
    /// Largest number of locations checked for stability markers.
    pub n_loc_max: usize,
    /// Largest number of locations drawn in the uniform cost plot.
    pub n_loc_cost: usize,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

impl Default for Config {
    fn default() -> Self {
        let scenario = |r_0: f64, eta: f64, cost_loc: f64| Scenario {
            label: format!("R0={r_0}, eta={eta}, C={cost_loc}"),
            params: Params { r_0, eta, cost_loc },
        };
        Self {
            scenarios: vec![
                scenario(5.0, 0.05, 0.2),
                scenario(5.0, 0.001, 0.2),
                scenario(2.0, 0.05, 0.01),
                scenario(2.0, 0.001, 0.01),
            ],
            search: SearchConfig::default(),
            plot: PlotConfig {
                n_points: 1000,
                xi_min: 0.001,
                cost_max: 2.0,
                n_loc_max: 50,
                n_loc_cost: 10,
                width: 1200,
                height: 800,
            },
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_n_loc: 100_000 }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Save a [`Config`] to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let contents = toml::to_string(self).context("failed to serialize config")?;
        fs::write(file, contents).with_context(|| format!("failed to write {file:?}"))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.scenarios.is_empty() {
            bail!("config must contain at least one scenario");
        }
        for (i_scn, scn) in self.scenarios.iter().enumerate() {
            scn.params
                .validate()
                .with_context(|| format!("invalid scenario {i_scn} ({:?})", scn.label))?;
        }

        check_num(self.search.max_n_loc, 2..).context("invalid maximum number of locations")?;

        let plot = &self.plot;
        check_num(plot.n_points, 2..1_000_000).context("invalid number of points")?;
        check_num(plot.xi_min, (Excluded(0.0), Excluded(1.0))).context("invalid minimum density")?;
        check_num(plot.cost_max, (Excluded(0.0), Excluded(f64::INFINITY)))
            .context("invalid maximum cost")?;
        check_num(plot.n_loc_max, 1..=self.search.max_n_loc)
            .context("invalid number of locations checked")?;
        check_num(plot.n_loc_cost, 1..=self.search.max_n_loc)
            .context("invalid number of locations drawn")?;
        check_num(plot.width, 100..10_000).context("invalid image width")?;
        check_num(plot.height, 100..10_000).context("invalid image height")?;

        Ok(())
    }
}

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
