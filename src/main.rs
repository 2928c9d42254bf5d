use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use simmem::sim::config::SimmemConfig;
use simmem::Simulation;

#[derive(Parser)]
#[command(version, about)]
struct SimmemArgs {
    #[arg(help = "Path to config.toml")]
    config_path: Option<PathBuf>,
    #[arg(long, help = "Override number of traffic cycles")]
    cycles: Option<u64>,
    #[arg(long, help = "Override traffic seed")]
    seed: Option<u64>,
    #[arg(long, help = "Enable log at level (0:none, 1:info, 2:debug)")]
    log: Option<u64>,
    #[arg(long, help = "Write the run report as JSON")]
    results_json: Option<PathBuf>,
}

fn init_logging(level: Option<u64>) {
    let filter = match level {
        None => {
            env_logger::init();
            return;
        }
        Some(0) => LevelFilter::Warn,
        Some(1) => LevelFilter::Info,
        Some(_) => LevelFilter::Debug,
    };
    Builder::new().filter_level(filter).init();
}

fn main() -> anyhow::Result<()> {
    let argv = SimmemArgs::parse();

    let mut config = match &argv.config_path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            SimmemConfig::from_toml(&text)
                .with_context(|| format!("cannot parse config {}", path.display()))?
        }
        None => SimmemConfig::default(),
    };

    // override toml configs with argv
    config.sim.cycles = argv.cycles.unwrap_or(config.sim.cycles);
    config.traffic.seed = argv.seed.unwrap_or(config.traffic.seed);
    if argv.results_json.is_some() {
        config.sim.results_json = argv.results_json.clone();
    }
    let log_level = argv
        .log
        .or((config.sim.log_level > 0).then_some(config.sim.log_level));
    init_logging(log_level);

    let mut sim = Simulation::new(config.clone());
    let report = sim.run();

    println!(
        "cycles {}  writes {}/{}  reads {}/{}  outstanding {}",
        report.cycles,
        report.write_delays.completed,
        report.writes_accepted,
        report.read_delays.completed,
        report.reads_accepted,
        report.outstanding
    );
    for (what, summary) in [("write", &report.write_delays), ("read", &report.read_delays)] {
        if let (Some(min), Some(max)) = (summary.min, summary.max) {
            println!("{what} delay: min {min} mean {:.2} max {max}", summary.mean);
        }
    }

    if let Some(path) = &config.sim.results_json {
        let payload = serde_json::to_string_pretty(&report).context("cannot serialize report")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
    }

    anyhow::ensure!(
        report.is_clean(),
        "ordering or delay violations: {} order, {} delay, {} unmatched",
        report.order_violations,
        report.delay_violations,
        report.unmatched_releases
    );
    Ok(())
}
