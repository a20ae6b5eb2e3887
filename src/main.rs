use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use epiloc::manager::Manager;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    exp_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Init,

    Analyze,

    Check {
        #[arg(long, default_value_t = 100)]
        n_points: usize,
    },

    Plot,

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = || Manager::new(&args.exp_dir).context("failed to construct mgr");

    match args.command {
        Command::Init => Manager::init_exp(&args.exp_dir)?,
        Command::Analyze => mgr()?.analyze_exp()?,
        Command::Check { n_points } => mgr()?.check_exp(n_points)?,
        Command::Plot => mgr()?.plot_exp()?,
        Command::Clean => mgr()?.clean_exp()?,
    }

    Ok(())
}
