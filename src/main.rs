// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use the_jury::config::consts::DEFAULT_SHUTDOWN_TIMEOUT_SECS;
use the_jury::config::{load_and_validate_config, RuntimeBuilder};
use the_jury::engine::{FanOutExecutor, MetricPipeline};
use the_jury::metrics::MetricFactory;
use the_jury::model::{EvaluationOutcome, Sample};
use the_jury::observers::TracingObserver;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load_sample(path: &str) -> anyhow::Result<Sample> {
    let text = fs::read_to_string(path).with_context(|| format!("reading sample {path}"))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing sample {path}"))
}

fn print_outcome(outcome: &EvaluationOutcome) {
    let verdict = match outcome.passed() {
        Some(true) => " ✅ pass",
        Some(false) => " ❌ fail",
        None => "",
    };
    println!(
        "📊 {}: {:.4}{} ({:?})",
        outcome.metric_name, outcome.aggregated_score, verdict, outcome.total_duration
    );
    for (backend, score) in &outcome.per_backend_scores {
        println!("   • {backend}: {score:.4}");
    }
    for event in &outcome.exclusions {
        println!(
            "   ⚠️  {} excluded at stage '{}' ({}): {}",
            event.backend_id,
            event.failed_stage_name,
            event.failed_stage_index,
            event.cause.as_deref().unwrap_or("no result")
        );
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <config.yaml> <sample.yaml>", args[0]);
        eprintln!("Example: {} configs/jury.yaml configs/sample.yaml", args[0]);
        bail!("expected a config file and a sample file");
    }

    let config = load_and_validate_config(&args[1])?;
    let sample = Arc::new(load_sample(&args[2])?);
    if config.metrics.is_empty() {
        bail!("{} configures no metrics", args[1]);
    }

    let (pool, backends) = RuntimeBuilder::from_config(&config)?;
    let pipeline = MetricPipeline::new(FanOutExecutor::new(Arc::clone(&pool), backends))
        .with_observer(Arc::new(TracingObserver::new()));

    println!("⚖️  The Jury");
    println!("═══════════════════════════════════");
    println!("Config: {}", args[1]);
    println!("Sample: {}", args[2]);
    println!();

    let start = Instant::now();
    let mut handles = Vec::with_capacity(config.metrics.len());
    for (name, metric_config) in &config.metrics {
        let metric = MetricFactory::create(name, metric_config)
            .with_context(|| format!("creating metric '{name}'"))?;
        handles.push(pipeline.evaluate_deferred_detailed(
            metric,
            Arc::new(metric_config.clone()),
            Arc::clone(&sample),
        ));
    }

    let mut failures = 0;
    for handle in handles {
        let metric = handle.metric().to_string();
        match pool.block_on(handle) {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => {
                failures += 1;
                eprintln!("❌ {metric}: {e}");
            }
        }
    }

    println!();
    println!("Evaluated {} metrics in {:?}", config.metrics.len(), start.elapsed());

    pool.shutdown_blocking(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS));

    if failures > 0 {
        bail!("{failures} metric(s) produced no score");
    }
    Ok(())
}
