// Data models for memoization simulation

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Memoization designs compared by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Design {
    /// `memo_rs::Memoizer`: per-key coalescing, fine-grained locking
    Memo,
    /// One `Mutex<lru::LruCache>` held across the computation
    GlobalLock,
    /// Check-then-act over `moka::sync::Cache` (get, compute, insert)
    RacyMap,
    /// `moka::sync::Cache::try_get_with` (coalescing, external crate for comparison)
    Moka,
}

impl Design {
    pub fn as_str(&self) -> &'static str {
        match self {
            Design::Memo => "memo",
            Design::GlobalLock => "global-lock",
            Design::RacyMap => "racy-map",
            Design::Moka => "moka",
        }
    }

    /// Get all available designs
    pub fn all() -> Vec<Design> {
        vec![
            Design::Memo,
            Design::GlobalLock,
            Design::RacyMap,
            Design::Moka,
        ]
    }
}

impl fmt::Display for Design {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Design {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memo" => Ok(Design::Memo),
            "global-lock" | "global" | "lock" => Ok(Design::GlobalLock),
            "racy-map" | "racy" => Ok(Design::RacyMap),
            "moka" => Ok(Design::Moka),
            other => Err(format!("unknown design '{other}'")),
        }
    }
}

/// Configuration for a simulation run
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Worker threads issuing requests
    pub threads: usize,
    /// Number of distinct keys
    pub keys: u64,
    /// Requests issued per worker thread
    pub requests_per_thread: usize,
    /// Time each computation takes
    pub latency: Duration,
    /// Fraction of keys whose computation fails
    pub failure_rate: f64,
    /// Fraction of requests abandoned by their caller
    pub cancel_rate: f64,
    /// Percentage of traffic that goes to popular keys
    pub popular_traffic_percent: u8,
    /// Percentage of keys considered popular
    pub popular_keys_percent: u8,
    /// Designs to simulate
    pub designs: Vec<Design>,
    /// Maximum cached entries (None = unbounded)
    pub capacity: Option<usize>,
    /// Segment count for the memoizer's store
    pub segments: usize,
    /// Seed for the workload generator
    pub seed: u64,
}

impl SimulationConfig {
    /// How long an abandoning caller is willing to wait
    pub fn patience(&self) -> Duration {
        self.latency / 2
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            keys: 1_000,
            requests_per_thread: 10_000,
            latency: Duration::from_micros(200),
            failure_rate: 0.01,
            cancel_rate: 0.0,
            popular_traffic_percent: 80,
            popular_keys_percent: 20,
            designs: Design::all(),
            capacity: None,
            segments: memo_rs::config::default_segment_count(),
            seed: 42,
        }
    }
}

/// Statistics for one design
#[derive(Debug, Default, Clone)]
pub struct DesignStats {
    /// Requests issued by callers
    pub requests: u64,
    /// Times the compute function actually ran
    pub invocations: u64,
    /// Invocations beyond the first for a key
    pub duplicate_invocations: u64,
    /// Requests answered with a computation failure
    pub failures: u64,
    /// Requests abandoned by their caller
    pub cancellations: u64,
    /// Wall-clock time for the whole run
    pub wall_time: Duration,
    /// Per-request latency
    pub latency: OpLatencyStats,
}

impl DesignStats {
    /// Requests completed per second of wall time
    pub fn throughput(&self) -> f64 {
        let secs = self.wall_time.as_secs_f64();
        if secs > 0.0 {
            self.requests as f64 / secs
        } else {
            0.0
        }
    }

    /// Invocations as a percentage of requests
    pub fn invocation_rate(&self) -> f64 {
        if self.requests > 0 {
            (self.invocations as f64 / self.requests as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Latency statistics for the request path
#[derive(Debug, Clone, Default)]
pub struct OpLatencyStats {
    /// Total time spent (nanoseconds)
    pub total_ns: u64,
    /// Number of operations
    pub count: u64,
    /// Minimum latency (nanoseconds)
    pub min_ns: u64,
    /// Maximum latency (nanoseconds)
    pub max_ns: u64,
    /// Latency percentiles
    pub percentiles: LatencyPercentiles,
}

impl OpLatencyStats {
    /// Calculate average latency in nanoseconds
    pub fn avg_ns(&self) -> f64 {
        if self.count > 0 {
            self.total_ns as f64 / self.count as f64
        } else {
            0.0
        }
    }
}

/// Latency percentiles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyPercentiles {
    pub p50_ns: u64,
    pub p90_ns: u64,
    pub p99_ns: u64,
    pub p999_ns: u64,
}

/// CSV export row for simulation results
#[derive(Debug, Serialize)]
pub struct CsvResultRow {
    pub design: String,
    pub threads: usize,
    pub keys: u64,
    pub requests: u64,
    pub invocations: u64,
    pub duplicate_invocations: u64,
    pub failures: u64,
    pub cancellations: u64,
    pub wall_time_ms: u64,
    pub throughput: f64,
    pub avg_latency_ns: f64,
    pub min_latency_ns: u64,
    pub max_latency_ns: u64,
    pub p50_ns: u64,
    pub p90_ns: u64,
    pub p99_ns: u64,
    pub p999_ns: u64,
}
