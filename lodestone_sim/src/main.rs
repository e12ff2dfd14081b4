//! Lodestone Simulator CLI
//!
//! Run deterministic magnet scenarios with one host and any number of observers.

use clap::Parser;
use lodestone_core::{ConfigStore, PhysicalConstants};
use lodestone_sim::scenarios::ScenarioId;
use lodestone_sim::{ScenarioResult, ScenarioRunner};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Lodestone Deterministic Simulation CLI
#[derive(Parser, Debug)]
#[command(name = "lodestone-sim")]
#[command(about = "Run deterministic magnet simulations for Lodestone", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,
    
    /// Number of observer participants besides the host
    #[arg(short, long, default_value = "2")]
    observers: usize,
    
    /// Scenario to run (attraction, repulsion, diagonal_cull, toggle_relay, gauss_relay, partition, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,
    
    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,
    
    /// Simulation duration in seconds (scenarios may run longer if they need to)
    #[arg(short, long, default_value = "10")]
    duration: f64,
    
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
    
    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
    
    /// Export simulation frames to a JSON file
    #[arg(long)]
    export: Option<String>,
    
    /// Physical constants file (created with defaults if missing)
    #[arg(short, long)]
    config: Option<String>,
}

fn summary_json(results: &[ScenarioResult], failed: usize) -> serde_json::Value {
    serde_json::json!({
        "total": results.len(),
        "passed": results.len() - failed,
        "failed": failed,
        "results": results.iter().map(|r| {
            serde_json::json!({
                "scenario": r.scenario.name(),
                "seed": r.seed,
                "passed": r.passed,
                "ticks": r.total_ticks,
                "time_secs": r.final_time_secs,
                "failure_reason": r.failure_reason,
                "metrics": {
                    "messages_sent": r.metrics.messages_sent,
                    "messages_delivered": r.metrics.messages_delivered,
                    "messages_partitioned": r.metrics.messages_partitioned,
                    "messages_lost": r.metrics.messages_lost,
                    "pole_changes": r.metrics.pole_changes,
                    "gauss_transitions": r.metrics.gauss_transitions,
                    "pairs_applied": r.metrics.pairs_applied,
                    "max_force": r.metrics.max_force,
                },
            })
        }).collect::<Vec<_>>(),
    })
}

fn main() {
    let args = Args::parse();
    
    // Initialize logging; --verbose wins over RUST_LOG
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
    
    if !args.json {
        info!("Lodestone Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
    
    let constants = match &args.config {
        Some(path) => ConfigStore::load_or_create(path).unwrap_or_else(|e| {
            error!("{}", e);
            std::process::exit(1);
        }),
        None => PhysicalConstants::default(),
    };
    
    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            eprintln!("Available scenarios: {}, all", names.join(", "));
            std::process::exit(1);
        })]
    };
    
    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };
    
    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }
        
        info!("Running with export to: {}", export_path);
        
        let runner = ScenarioRunner::new(base_seed, args.observers)
            .with_duration(args.duration)
            .with_constants(constants);
        let (result, export) = runner.run_with_export(scenarios[0]);
        
        if let Err(e) = export.write_to_file(export_path) {
            error!("Failed to write export: {:?}", e);
            std::process::exit(1);
        }
        info!("Exported {} frames to {}", export.frames.len(), export_path);
        
        if result.passed {
            info!("✓ {} (seed={}) PASSED", scenarios[0].name(), base_seed);
        } else {
            error!(
                "✗ {} FAILED: {}",
                scenarios[0].name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        return;
    }
    
    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;
    
    // Run simulations
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        
        let runner = ScenarioRunner::new(seed, args.observers)
            .with_duration(args.duration)
            .with_constants(constants);
        
        for scenario in &scenarios {
            let result = runner.run(*scenario);
            
            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            
            if !result.passed {
                failed_count += 1;
            }
            
            all_results.push(result);
        }
    }
    
    // Summary
    let total = all_results.len();
    
    if args.json {
        match serde_json::to_string_pretty(&summary_json(&all_results, failed_count)) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            
            // List failed seeds
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }
    
    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
