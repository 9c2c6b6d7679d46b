use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use memo_simulator::models::{Design, SimulationConfig};
use memo_simulator::runner::SimulationRunner;
use memo_simulator::stats::SimulationStats;

/// Memoization design simulator CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of worker threads issuing requests
    #[arg(short, long, default_value = "8")]
    threads: usize,

    /// Number of distinct keys
    #[arg(short, long, default_value = "1000")]
    keys: u64,

    /// Requests issued per worker thread
    #[arg(short, long, default_value = "10000")]
    requests: usize,

    /// Time each computation takes, in microseconds
    #[arg(long, default_value = "200")]
    latency_us: u64,

    /// Fraction of keys whose computation fails (0.0 - 1.0)
    #[arg(long, default_value = "0.01")]
    failure_rate: f64,

    /// Fraction of requests whose caller gives up after half the latency (0.0 - 1.0)
    #[arg(long, default_value = "0.0")]
    cancel_rate: f64,

    /// Percentage of traffic that goes to popular keys
    #[arg(long, default_value = "80")]
    popular_traffic: u8,

    /// Percentage of keys that are popular
    #[arg(long, default_value = "20")]
    popular_keys: u8,

    /// Designs to simulate (memo, global-lock, racy-map, moka)
    /// If not provided, all designs will be used
    #[arg(short, long, value_name = "DESIGNS", num_args = 1.., value_delimiter = ',')]
    designs: Option<Vec<String>>,

    /// Maximum cached entries (unbounded when omitted)
    #[arg(short, long)]
    capacity: Option<usize>,

    /// Number of segments for the memoizer's store (default: based on CPU count)
    #[arg(long)]
    segments: Option<usize>,

    /// Seed for the workload generator
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Export results to CSV file
    #[arg(long, value_name = "PATH")]
    output_csv: Option<PathBuf>,
}

/// Resolve design names, falling back to every design
fn parse_designs(names: Option<&[String]>) -> Vec<Design> {
    let Some(names) = names.filter(|names| !names.is_empty()) else {
        return Design::all();
    };

    let mut designs = Vec::new();
    for name in names {
        match name.parse::<Design>() {
            Ok(design) if !designs.contains(&design) => designs.push(design),
            Ok(_) => {}
            Err(err) => println!("Warning: {err}, skipping"),
        }
    }
    if designs.is_empty() {
        println!("No valid designs selected, using all available designs");
        Design::all()
    } else {
        designs
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let defaults = SimulationConfig::default();

    let config = SimulationConfig {
        threads: args.threads,
        keys: args.keys,
        requests_per_thread: args.requests,
        latency: Duration::from_micros(args.latency_us),
        failure_rate: args.failure_rate,
        cancel_rate: args.cancel_rate,
        popular_traffic_percent: args.popular_traffic,
        popular_keys_percent: args.popular_keys,
        designs: parse_designs(args.designs.as_deref()),
        capacity: args.capacity,
        segments: args.segments.unwrap_or(defaults.segments),
        seed: args.seed,
    };

    println!("Memoization Simulation");
    println!("======================");
    println!("Worker threads: {}", config.threads);
    println!("Distinct keys: {}", config.keys);
    println!("Requests per thread: {}", config.requests_per_thread);
    println!("Compute latency: {:?}", config.latency);
    println!(
        "Failure rate: {:.2}, cancel rate: {:.2}",
        config.failure_rate, config.cancel_rate
    );
    match config.capacity {
        Some(capacity) => println!("Cache capacity: {capacity} entries"),
        None => println!("Cache capacity: unbounded"),
    }
    println!("Memoizer segments: {}", config.segments);
    println!(
        "Designs: {:?}",
        config.designs.iter().map(|d| d.as_str()).collect::<Vec<_>>()
    );

    let runner = SimulationRunner::new(config.clone());
    let result = runner.run()?;
    println!("\nSimulation completed in {:.2?}", result.duration);

    let stats = SimulationStats::from_result(&result, &config);
    stats.print_summary();
    stats.print_comparison();

    if let Some(path) = args.output_csv {
        stats.export_csv(&path)?;
        println!("\nResults exported to {}", path.display());
    }

    Ok(())
}
