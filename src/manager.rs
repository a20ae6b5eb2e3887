use crate::analysis::Analyzer;
use crate::config::Config;
use crate::model::Model;
use crate::numdiff::{SECOND_STEPS, cross_check};
use crate::plot;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Largest tolerated scaled discrepancy between closed-form and finite-difference derivatives.
///
/// Forward differences stay within `1e-3` away from the epidemic threshold and reach a few
/// `1e-3` on fine grids close to it.
const CHECK_TOL: f64 = 5e-3;

pub struct Manager {
    exp_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(exp_dir: P) -> Result<Self> {
        let exp_dir = exp_dir.as_ref().to_path_buf();

        let cfg = Config::from_file(config_file(&exp_dir)).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { exp_dir, cfg })
    }

    /// Create the experiment directory and write the default configuration into it.
    pub fn init_exp<P: AsRef<Path>>(exp_dir: P) -> Result<()> {
        let exp_dir = exp_dir.as_ref();
        fs::create_dir_all(exp_dir).with_context(|| format!("failed to create {exp_dir:?}"))?;

        let config_file = config_file(exp_dir);
        if config_file.exists() {
            bail!("{config_file:?} already exists");
        }
        Config::default()
            .to_file(&config_file)
            .context("failed to save default config")?;
        log::info!("wrote {config_file:?}");

        Ok(())
    }

    pub fn analyze_exp(&self) -> Result<()> {
        let mut analyzer = Analyzer::new(self.cfg.clone());
        analyzer.analyze().context("failed to analyze scenarios")?;

        let results_file = self.results_file();
        analyzer
            .save_results(&results_file)
            .context("failed to save results")?;
        log::info!("wrote {results_file:?}");

        Ok(())
    }

    pub fn check_exp(&self, n_points: usize) -> Result<()> {
        let mut n_failed = 0;
        for scn in &self.cfg.scenarios {
            let mdl = Model::new(scn.params).context("failed to construct model")?;
            let check = cross_check(&mdl, n_points, SECOND_STEPS)
                .with_context(|| format!("failed to check scenario {:?}", scn.label))?;
            log::info!("{}: {check:?}", scn.label);

            if check.max() > CHECK_TOL {
                log::warn!(
                    "{}: derivative discrepancy {} exceeds {CHECK_TOL}",
                    scn.label,
                    check.max()
                );
                n_failed += 1;
            }
        }

        if n_failed > 0 {
            bail!("{n_failed} scenarios failed the derivative check");
        }
        Ok(())
    }

    pub fn plot_exp(&self) -> Result<()> {
        let scenarios = &self.cfg.scenarios;
        let plot_cfg = &self.cfg.plot;

        plot::plot_r_inf(self.plot_file("r_inf"), scenarios, plot_cfg)
            .context("failed to plot final size")?;
        plot::plot_prob(self.plot_file("prob"), scenarios, plot_cfg)
            .context("failed to plot infection probability")?;
        plot::plot_cost(self.plot_file("cost"), scenarios, plot_cfg)
            .context("failed to plot cost")?;
        plot::plot_uniform_cost(self.plot_file("uniform_cost"), scenarios, plot_cfg)
            .context("failed to plot uniform cost")?;

        Ok(())
    }

    pub fn clean_exp(&self) -> Result<()> {
        let mut files = self.glob_plot_files().context("failed to glob plot files")?;
        let results_file = self.results_file();
        if results_file.exists() {
            files.push(results_file);
        }

        for file in files {
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            log::info!("removed {file:?}");
        }

        Ok(())
    }

    fn glob_plot_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.exp_dir.join("*.svg");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let files = glob(pattern)
            .context("failed to glob plot files")?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        Ok(files)
    }

    fn results_file(&self) -> PathBuf {
        self.exp_dir.join("results.msgpack")
    }

    fn plot_file(&self, name: &str) -> PathBuf {
        self.exp_dir.join(format!("{name}.svg"))
    }
}

fn config_file(exp_dir: &Path) -> PathBuf {
    exp_dir.join("config.toml")
}
