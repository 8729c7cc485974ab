//! Robo Sort entry point
//!
//! Usage: `robo-sort [config.json] [cycles]`
//!
//! Runs the configured cell (or the default one) for the given number of
//! cycles and prints each cycle's report as JSON.

use std::process::ExitCode;

use robo_sort::{MetricsCollector, SimConfig, Simulation};

fn run(config: SimConfig, cycles: u32) -> Result<(), Box<dyn std::error::Error>> {
    let mut sim = Simulation::initialize(config, MetricsCollector::new())?;
    log::info!("Running {cycles} cycle(s) with seed {}", sim.seed());

    for cycle in 1..=cycles {
        if cycle > 1 {
            sim.reset();
        }
        let summary = sim.run_cycle()?;
        let report = sim.report(&summary);

        if let Some(delta) = sim.metrics().compare_with_previous(&report) {
            log::info!(
                "Cycle {cycle}: success rate {:+.1} pts, time {:+.1}s vs previous",
                delta.success_rate_delta,
                delta.total_time_delta
            );
        }
        println!("{}", report.to_json()?);
        sim.metrics_mut().save_to_history(report);
    }

    if let Some(avg) = sim.metrics().average_metrics() {
        log::info!(
            "Average over {} cycle(s): success {:.1}%, accuracy {:.1}%, {:.1}s",
            avg.total_cycles,
            avg.success_rate,
            avg.accuracy,
            avg.total_time
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Robo Sort starting...");

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match SimConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("Could not load {path}: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => {
            log::info!("No config given, using defaults");
            SimConfig::default()
        }
    };
    let cycles = match args.next().map(|arg| arg.parse::<u32>()) {
        None => 1,
        Some(Ok(cycles)) if cycles > 0 => cycles,
        Some(_) => {
            log::error!("Cycle count must be a positive integer");
            return ExitCode::FAILURE;
        }
    };

    match run(config, cycles) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("Simulation failed: {err}");
            ExitCode::FAILURE
        }
    }
}
