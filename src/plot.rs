use crate::config::{PlotConfig, Scenario};
use crate::model::Model;
use crate::stability::{is_alt_ess, is_ess};
use anyhow::{Context, Result, bail};
use plotters::prelude::*;
use std::{ops::Range, path::Path};

const PALETTE: [RGBColor; 4] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
];

/// Labelled sequence of points drawn as a line.
pub struct Curve {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

/// Points drawn as markers without a legend entry.
pub struct Markers {
    pub points: Vec<(f64, f64)>,
    pub shape: Shape,
    /// Index into the palette, shared with the curve they belong to.
    pub i_color: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle,
    Triangle,
}

/// Axes of a chart.
pub struct Axes {
    pub x_desc: &'static str,
    pub y_desc: &'static str,
    pub x_range: Range<f64>,
    pub y_range: Range<f64>,
}

/// Sample `func` at `n_points` evenly spaced points of `[x_min, x_max]`.
pub fn sample_curve<F>(
    func: F,
    (x_min, x_max): (f64, f64),
    n_points: usize,
) -> Result<Vec<(f64, f64)>>
where
    F: Fn(f64) -> Result<f64>,
{
    if n_points < 2 {
        bail!("number of points must be at least 2, but is {n_points}");
    }
    let dx = (x_max - x_min) / (n_points - 1) as f64;
    (0..n_points)
        .map(|i| {
            // Pin the last sample to the end of the interval.
            let x = if i == n_points - 1 { x_max } else { x_min + i as f64 * dx };
            let y = func(x).with_context(|| format!("failed to sample at {x}"))?;
            Ok((x, y))
        })
        .collect()
}

/// Draw curves and markers into an SVG file.
///
/// Points outside the y range are dropped.
pub fn draw_chart<P: AsRef<Path>>(
    file: P,
    size: (u32, u32),
    axes: &Axes,
    curves: &[Curve],
    markers: &[Markers],
) -> Result<()> {
    let file = file.as_ref();
    let in_range = |&&(_, y): &&(f64, f64)| axes.y_range.contains(&y);

    let root = SVGBackend::new(file, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(axes.x_range.clone(), axes.y_range.clone())?;

    chart
        .configure_mesh()
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .label_style(("sans-serif", 16))
        .draw()?;

    for (i_crv, crv) in curves.iter().enumerate() {
        let color = PALETTE[i_crv % PALETTE.len()];
        let points = crv.points.iter().filter(in_range).copied();
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(3)))?
            .label(crv.label.as_str())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 30, y)], color.stroke_width(3))
            });
    }

    for mkr in markers {
        let style = PALETTE[mkr.i_color % PALETTE.len()].filled();
        let points = mkr.points.iter().filter(in_range).copied();
        match mkr.shape {
            Shape::Circle => {
                chart.draw_series(points.map(|pt| Circle::new(pt, 5, style)))?;
            }
            Shape::Triangle => {
                chart.draw_series(points.map(|pt| TriangleMarker::new(pt, 8, style)))?;
            }
        }
    }

    if !curves.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(("sans-serif", 16))
            .draw()?;
    }

    root.present().with_context(|| format!("failed to write {file:?}"))?;
    log::info!("wrote {file:?}");

    Ok(())
}

/// Plot the final size of the epidemic against the density.
pub fn plot_r_inf<P: AsRef<Path>>(file: P, scenarios: &[Scenario], cfg: &PlotConfig) -> Result<()> {
    let curves = density_curves(scenarios, cfg, |mdl, xi| mdl.r_inf(xi))?;
    let axes = Axes {
        x_desc: "Population Density",
        y_desc: "Final Size",
        x_range: 0.0..1.0,
        y_range: 0.0..1.05,
    };
    draw_chart(file, (cfg.width, cfg.height), &axes, &curves, &[])
}

/// Plot the infection probability against the density.
pub fn plot_prob<P: AsRef<Path>>(file: P, scenarios: &[Scenario], cfg: &PlotConfig) -> Result<()> {
    let curves = density_curves(scenarios, cfg, |mdl, xi| mdl.prob(xi))?;
    let axes = Axes {
        x_desc: "Population Density",
        y_desc: "Infection Probability",
        x_range: 0.0..1.0,
        y_range: 0.0..1.05,
    };
    draw_chart(file, (cfg.width, cfg.height), &axes, &curves, &[])
}

/// Plot the cost against the density, marking ESS and altruistic ESS densities.
pub fn plot_cost<P: AsRef<Path>>(file: P, scenarios: &[Scenario], cfg: &PlotConfig) -> Result<()> {
    let curves = density_curves(scenarios, cfg, |mdl, xi| mdl.cost(xi))?;

    let mut markers = Vec::new();
    for (i_scn, scn) in scenarios.iter().enumerate() {
        let mdl = Model::new(scn.params)?;
        let mut ess = Vec::new();
        let mut alt_ess = Vec::new();
        for n_loc in 1..=cfg.n_loc_max {
            let xi = 1.0 / n_loc as f64;
            if is_ess(&mdl, n_loc)? {
                ess.push((xi, mdl.cost(xi)?));
            }
            if is_alt_ess(&mdl, n_loc)? {
                alt_ess.push((xi, mdl.cost(xi)?));
            }
        }
        markers.push(Markers {
            points: ess,
            shape: Shape::Circle,
            i_color: i_scn,
        });
        markers.push(Markers {
            points: alt_ess,
            shape: Shape::Triangle,
            i_color: i_scn,
        });
    }

    let axes = Axes {
        x_desc: "Population Density",
        y_desc: "Cost",
        x_range: 0.0..1.0,
        y_range: 0.0..cfg.cost_max,
    };
    draw_chart(file, (cfg.width, cfg.height), &axes, &curves, &markers)
}

/// Plot the uniform cost against the number of locations in use.
pub fn plot_uniform_cost<P: AsRef<Path>>(
    file: P,
    scenarios: &[Scenario],
    cfg: &PlotConfig,
) -> Result<()> {
    let mut curves = Vec::with_capacity(scenarios.len());
    let mut markers = Vec::with_capacity(scenarios.len());
    let mut cost_max: f64 = 0.0;
    for (i_scn, scn) in scenarios.iter().enumerate() {
        let mdl = Model::new(scn.params)?;
        let mut points = Vec::with_capacity(cfg.n_loc_cost);
        for n_loc in 1..=cfg.n_loc_cost {
            let n_loc = n_loc as f64;
            let cost = mdl.uniform_cost(n_loc)?;
            cost_max = cost_max.max(cost);
            points.push((n_loc, cost));
        }
        markers.push(Markers {
            points: points.clone(),
            shape: Shape::Circle,
            i_color: i_scn,
        });
        curves.push(Curve {
            label: scn.label.clone(),
            points,
        });
    }

    let axes = Axes {
        x_desc: "Locations in Use",
        y_desc: "Cost",
        x_range: 0.5..cfg.n_loc_cost as f64 + 0.5,
        y_range: 0.0..1.05 * cost_max,
    };
    draw_chart(file, (cfg.width, cfg.height), &axes, &curves, &markers)
}

fn density_curves<F>(scenarios: &[Scenario], cfg: &PlotConfig, func: F) -> Result<Vec<Curve>>
where
    F: Fn(&Model, f64) -> Result<f64>,
{
    let mut curves = Vec::with_capacity(scenarios.len());
    for scn in scenarios {
        let mdl = Model::new(scn.params)?;
        let points = sample_curve(|xi| func(&mdl, xi), (cfg.xi_min, 1.0), cfg.n_points)
            .with_context(|| format!("failed to sample scenario {:?}", scn.label))?;
        curves.push(Curve {
            label: scn.label.clone(),
            points,
        });
    }
    Ok(curves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use approx::assert_relative_eq;

    #[test]
    fn samples_interval() {
        let points = sample_curve(|x| Ok(2.0 * x), (0.001, 1.0), 1000).unwrap();
        assert_eq!(points.len(), 1000);
        assert_eq!(points[0], (0.001, 0.002));
        assert_eq!(points[999], (1.0, 2.0));
        assert_relative_eq!(points[1].0, 0.002);
    }

    #[test]
    fn sampling_fails_on_invalid_input() {
        assert!(sample_curve(|x| Ok(x), (0.0, 1.0), 1).is_err());
        let mdl = Model::new(Default::default()).unwrap();
        assert!(sample_curve(|xi| mdl.cost(xi), (0.0, 1.0), 10).is_err());
    }

    #[test]
    fn draws_charts() {
        let dir = std::env::temp_dir().join(format!("epiloc-plot-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut cfg = Config::default();
        cfg.plot.n_points = 50;
        cfg.plot.n_loc_max = 12;
        plot_r_inf(dir.join("r_inf.svg"), &cfg.scenarios, &cfg.plot).unwrap();
        plot_prob(dir.join("prob.svg"), &cfg.scenarios, &cfg.plot).unwrap();
        plot_cost(dir.join("cost.svg"), &cfg.scenarios, &cfg.plot).unwrap();
        plot_uniform_cost(dir.join("uniform_cost.svg"), &cfg.scenarios, &cfg.plot).unwrap();

        for name in ["r_inf.svg", "prob.svg", "cost.svg", "uniform_cost.svg"] {
            let contents = std::fs::read_to_string(dir.join(name)).unwrap();
            assert!(contents.starts_with("<svg"), "{name}");
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
