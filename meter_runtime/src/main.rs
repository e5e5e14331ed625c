//! meter-sim — batch balance report for the scaling meter.
//!
//! Usage: meter-sim [runs] [config.json]
//!
//! Plays `runs` seeded runs (default 1000) of the built-in scenario under
//! each choice strategy and prints the outcome summary. A config file is
//! a partial JSON object merged over the defaults. Set RUST_LOG for logs.

use std::env;
use std::fs;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use meter_engine::config::{validate_config, MeterConfig};
use meter_engine::domain::Choice;
use meter_engine::tier::Tier;

use meter_runtime::scenario::Scenario;
use meter_runtime::simulate::{simulate_batch, BatchSummary, ChoiceStrategy};

const DEFAULT_RUNS: i64 = 1000;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let runs = match args.first() {
        Some(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("runs must be a positive integer, got {:?}", raw))?,
        None => DEFAULT_RUNS,
    };
    if runs <= 0 {
        bail!("runs must be a positive integer, got {}", runs);
    }

    let config = match args.get(1) {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path))?;
            MeterConfig::from_json_str(&raw).with_context(|| format!("parsing config {}", path))?
        }
        None => MeterConfig::default(),
    };
    let errors = validate_config(&config);
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("config: {}", error);
        }
        bail!("config has {} error(s)", errors.len());
    }

    let scenario = Scenario::builtin();
    let errors = scenario.validate();
    if !errors.is_empty() {
        bail!("built-in scenario is invalid: {}", errors.join("; "));
    }

    let strategies = [
        ChoiceStrategy::AlwaysA,
        ChoiceStrategy::AlwaysB,
        ChoiceStrategy::Sequence([Choice::A, Choice::B, Choice::A, Choice::B, Choice::A]),
        ChoiceStrategy::Random { seed: 7 },
    ];

    println!("scenario: {} ({} runs per strategy)", scenario.name, runs);
    for strategy in &strategies {
        let summary = simulate_batch(&scenario, &config, 0..runs, strategy)
            .with_context(|| format!("simulating {}", strategy))?;
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!();
    println!("== {} ==", summary.strategy);
    println!(
        "  final display: mean {:.1}  min {:.1}  max {:.1}",
        summary.mean_display, summary.min_display, summary.max_display
    );
    for tier in Tier::ALL {
        println!(
            "  {:<14} {:>6}  {:>5.1}%  {}",
            tier.label(),
            summary.tier_counts.get(&tier).copied().unwrap_or(0),
            summary.tier_share(tier) * 100.0,
            tier.ending_title()
        );
    }
    println!(
        "  unluck steps {}  (runs hit {})  perfect storms {}  rubber-band steps {}",
        summary.unluck_steps,
        summary.runs_with_unluck,
        summary.perfect_storms,
        summary.rubber_band_steps
    );
}
